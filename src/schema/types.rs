//! Schema constructs: fields, object types, interfaces, unions, enums and scalars

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Map, Value};

use super::TypeRef;
use crate::definition::{
    ArgConfig, EnumConfig, FieldConfig, FieldSpec, InterfaceConfig, ScalarConfig, TypeConfig,
    UnionConfig,
};
use crate::error::{Result, SchemaError};
use crate::plugin::PluginPipeline;

/// Reference to a resolver implementation, e.g. `crud::read`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResolverRef(pub String);

impl ResolverRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Fields
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Argument {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            default_value: None,
            description: None,
        }
    }

    fn from_config(name: &str, config: &ArgConfig) -> Self {
        match config {
            ArgConfig::Type(type_ref) => Self::new(name, type_ref.clone()),
            ArgConfig::Detailed(spec) => Self {
                name: name.to_string(),
                type_ref: spec.type_ref.clone(),
                default_value: spec.default_value.clone(),
                description: spec.description.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub args: IndexMap<String, Argument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver: Option<ResolverRef>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub resolver_context: Map<String, Value>,
    /// Source property when it differs from the field name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(skip_serializing_if = "PluginPipeline::is_empty")]
    pub plugins: PluginPipeline,
}

impl Field {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            args: IndexMap::new(),
            description: None,
            resolver: None,
            resolver_context: Map::new(),
            property: None,
            plugins: PluginPipeline::new(),
        }
    }

    /// Build a field whose type must be stated explicitly
    ///
    /// Returns `None` for fields switched off with `false`.
    pub fn from_config(name: &str, config: &FieldConfig, path: &str) -> Result<Option<Self>> {
        let missing_type =
            || SchemaError::config(path, format!("Field {} needs an explicit type", name));
        match config {
            FieldConfig::Excluded => Ok(None),
            FieldConfig::Introspect => Err(missing_type()),
            FieldConfig::Type(type_ref) => Ok(Some(Self::new(name, type_ref.clone()))),
            FieldConfig::Detailed(spec) => {
                if spec.fields.is_some() || spec.operations.is_some() {
                    return Err(SchemaError::config(
                        path,
                        "`fields` and `operations` are only allowed on model relation fields",
                    ));
                }
                let type_ref = spec.type_ref.clone().ok_or_else(missing_type)?;
                let mut field = Self::new(name, type_ref);
                field.apply_spec(spec);
                Ok(Some(field))
            }
        }
    }

    /// Apply everything a spec sets except its type and nested model config
    pub fn apply_spec(&mut self, spec: &FieldSpec) {
        for (name, arg) in &spec.args {
            self.add_arg(Argument::from_config(name, arg));
        }
        if let Some(description) = &spec.description {
            self.description = Some(description.clone());
        }
        if let Some(resolver) = &spec.resolver {
            self.resolver = Some(ResolverRef::new(resolver.clone()));
        }
        for (key, value) in &spec.resolver_context {
            self.resolver_context.insert(key.clone(), value.clone());
        }
        if let Some(property) = &spec.property {
            self.property = Some(property.clone());
        }
        self.plugins.merge_plugins(&spec.plugins);
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverRef) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_arg(mut self, arg: Argument) -> Self {
        self.add_arg(arg);
        self
    }

    pub fn add_arg(&mut self, arg: Argument) {
        self.args.insert(arg.name.clone(), arg);
    }

    /// The source property this field reads
    pub fn property_name(&self) -> &str {
        self.property.as_deref().unwrap_or(&self.name)
    }

    /// Layer `other` over this field; set attributes on `other` win
    pub fn merge(&mut self, other: &Field) {
        self.type_ref = other.type_ref.clone();
        for arg in other.args.values() {
            self.add_arg(arg.clone());
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        if other.resolver.is_some() {
            self.resolver = other.resolver.clone();
        }
        for (key, value) in &other.resolver_context {
            self.resolver_context.insert(key.clone(), value.clone());
        }
        if other.property.is_some() {
            self.property = other.property.clone();
        }
        self.plugins.merge(&other.plugins);
    }
}

fn fields_from_config(
    fields: &IndexMap<String, FieldConfig>,
    path: &str,
) -> Result<IndexMap<String, Field>> {
    let mut built = IndexMap::with_capacity(fields.len());
    for (name, config) in fields {
        let field_path = format!("{}.fields.{}", path, name);
        crate::naming::assert_valid_name(name, &field_path)?;
        if let Some(field) = Field::from_config(name, config, &field_path)? {
            built.insert(name.clone(), field);
        }
    }
    Ok(built)
}

// =============================================================================
// Object Types
// =============================================================================

/// An object or input object type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub input: bool,
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub interfaces: IndexSet<String>,
    pub fields: IndexMap<String, Field>,
    #[serde(skip_serializing_if = "PluginPipeline::is_empty")]
    pub plugins: PluginPipeline,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input: false,
            interfaces: IndexSet::new(),
            fields: IndexMap::new(),
            plugins: PluginPipeline::new(),
        }
    }

    pub fn input(name: impl Into<String>) -> Self {
        Self {
            input: true,
            ..Self::new(name)
        }
    }

    pub fn from_config(name: &str, config: &TypeConfig) -> Result<Self> {
        let path = format!("types.{}", name);
        Ok(Self {
            name: name.to_string(),
            description: config.description.clone(),
            input: config.input,
            interfaces: config.interfaces.iter().cloned().collect(),
            fields: fields_from_config(&config.fields, &path)?,
            plugins: PluginPipeline::from_map(&config.plugins),
        })
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.add_field(field);
        self
    }

    /// Add or replace a field, keeping the position of a replaced field
    pub fn add_field(&mut self, field: Field) {
        self.fields.insert(field.name.clone(), field);
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        self.fields.shift_remove(name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.get_mut(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Layer `other` over this type
    ///
    /// Incoming fields replace same-named fields in place, plugin bindings
    /// merge, and other attributes are taken from `other` when it sets them.
    pub fn merge(&mut self, other: &ObjectType) {
        for field in other.fields.values() {
            self.add_field(field.clone());
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        self.input |= other.input;
        self.interfaces.extend(other.interfaces.iter().cloned());
        self.plugins.merge(&other.plugins);
    }
}

// =============================================================================
// Interfaces, Unions, Enums, Scalars
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: IndexMap<String, Field>,
    #[serde(skip_serializing_if = "PluginPipeline::is_empty")]
    pub plugins: PluginPipeline,
}

impl InterfaceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            plugins: PluginPipeline::new(),
        }
    }

    pub fn from_config(name: &str, config: &InterfaceConfig) -> Result<Self> {
        let path = format!("interfaces.{}", name);
        Ok(Self {
            name: name.to_string(),
            description: config.description.clone(),
            fields: fields_from_config(&config.fields, &path)?,
            plugins: PluginPipeline::from_map(&config.plugins),
        })
    }

    pub fn merge(&mut self, other: &InterfaceType) {
        for field in other.fields.values() {
            self.fields.insert(field.name.clone(), field.clone());
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        self.plugins.merge(&other.plugins);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub types: IndexSet<String>,
    #[serde(skip_serializing_if = "PluginPipeline::is_empty")]
    pub plugins: PluginPipeline,
}

impl UnionType {
    pub fn new<I, S>(name: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            types: types.into_iter().map(Into::into).collect(),
            plugins: PluginPipeline::new(),
        }
    }

    pub fn from_config(name: &str, config: &UnionConfig) -> Self {
        Self {
            description: config.description.clone(),
            plugins: PluginPipeline::from_map(&config.plugins),
            ..Self::new(name, config.types.iter().cloned())
        }
    }

    pub fn merge(&mut self, other: &UnionType) {
        self.types.extend(other.types.iter().cloned());
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        self.plugins.merge(&other.plugins);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    /// Internal value, defaulting to the value name
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub values: IndexMap<String, EnumValue>,
}

impl EnumType {
    pub fn from_config(name: &str, config: &EnumConfig) -> Result<Self> {
        let mut values = IndexMap::with_capacity(config.values.0.len());
        for (value_name, value) in &config.values.0 {
            crate::naming::assert_valid_name(value_name, &format!("enums.{}.values", name))?;
            values.insert(
                value_name.clone(),
                EnumValue {
                    value: value
                        .value
                        .clone()
                        .unwrap_or_else(|| Value::String(value_name.clone())),
                    description: value.description.clone(),
                },
            );
        }
        Ok(Self {
            name: name.to_string(),
            description: config.description.clone(),
            values,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specified_by: Option<String>,
}

impl ScalarType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            specified_by: None,
        }
    }

    pub fn from_config(name: &str, config: &ScalarConfig) -> Self {
        Self {
            name: name.to_string(),
            description: config.description.clone(),
            specified_by: config.specified_by.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginMap;
    use serde_json::json;

    fn post(fields: &[(&str, &str)]) -> ObjectType {
        fields.iter().fold(ObjectType::new("Post"), |ty, (name, ty_ref)| {
            ty.with_field(Field::new(*name, ty_ref.parse().unwrap()))
        })
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut ty = post(&[("id", "ID!"), ("title", "String")]);
        ty.description = Some("A post".to_string());
        ty.interfaces.insert("Node".to_string());
        let plugins: PluginMap = serde_json::from_value(json!({"paginate": {"limit": 10}})).unwrap();
        ty.plugins.set_plugins(&plugins);

        let mut merged = ty.clone();
        merged.merge(&ty);
        assert_eq!(merged, ty);
    }

    #[test]
    fn test_merge_layers_fields() {
        let mut first = post(&[("id", "ID!"), ("title", "String")]);
        let second = post(&[("title", "String!"), ("body", "String")]);
        first.merge(&second);

        assert_eq!(first.field_names().collect::<Vec<_>>(), vec!["id", "title", "body"]);
        assert_eq!(first.field("title").unwrap().type_ref.to_string(), "String!");
    }

    #[test]
    fn test_merge_keeps_unset_description() {
        let mut first = post(&[("id", "ID")]);
        first.description = Some("kept".to_string());
        first.merge(&post(&[("id", "ID")]));
        assert_eq!(first.description.as_deref(), Some("kept"));
    }

    #[test]
    fn test_type_from_config() {
        let config: TypeConfig = serde_json::from_value(json!({
            "fields": {
                "id": "ID!",
                "posts": {"type": "[Post]", "args": {"limit": {"type": "Int", "defaultValue": 10}}},
                "hidden": false,
            },
            "interfaces": ["Node"],
        }))
        .unwrap();
        let ty = ObjectType::from_config("Author", &config).unwrap();
        assert_eq!(ty.field_names().collect::<Vec<_>>(), vec!["id", "posts"]);
        assert_eq!(ty.field("posts").unwrap().args["limit"].default_value, Some(json!(10)));
        assert!(ty.interfaces.contains("Node"));
    }

    #[test]
    fn test_type_field_needs_type() {
        let config: TypeConfig =
            serde_json::from_value(json!({"fields": {"title": true}})).unwrap();
        let err = ObjectType::from_config("Post", &config).unwrap_err();
        assert!(matches!(err, SchemaError::Config { ref path, .. } if path == "types.Post.fields.title"));
    }

    #[test]
    fn test_nested_model_keys_rejected_outside_models() {
        let config: TypeConfig = serde_json::from_value(json!({"fields": {
            "author": {"type": "String", "fields": {"bogus": true}},
        }}))
        .unwrap();
        let err = ObjectType::from_config("Post", &config).unwrap_err();
        assert!(matches!(err, SchemaError::Config { ref path, .. } if path == "types.Post.fields.author"));

        let query: FieldConfig =
            serde_json::from_value(json!({"type": "[Post]", "operations": {"read": true}})).unwrap();
        assert!(Field::from_config("posts", &query, "queries.posts").is_err());
    }

    #[test]
    fn test_union_merge_unions_members() {
        let mut first = UnionType::new("Result", ["Post"]);
        first.merge(&UnionType::new("Result", ["Comment", "Post"]));
        assert_eq!(first.types.iter().collect::<Vec<_>>(), vec!["Post", "Comment"]);
    }
}
