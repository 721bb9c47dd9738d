//! Schema Definition
//!
//! Typed records for a merged configuration tree. The tree produced by the
//! [`ConfigLoader`](crate::loader::ConfigLoader) is parsed exactly once into a
//! [`SchemaConfig`]; downstream stages never look at raw maps again.
//!
//! Every parse failure is reported as a [`SchemaError::Config`] carrying the
//! dotted path of the offending entry (`models.Article.fields`).

use indexmap::IndexMap;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};
use crate::naming::assert_valid_name;
use crate::plugin::PluginMap;
use crate::schema::TypeRef;

/// Wildcards accepted for "every field" / "every operation"
pub const WILDCARDS: [&str; 2] = ["*", "all"];

/// Top-level sections of a schema config
pub const SECTIONS: [&str; 10] = [
    "defaults",
    "types",
    "queries",
    "mutations",
    "models",
    "interfaces",
    "unions",
    "enums",
    "scalars",
    "builders",
];

fn is_wildcard(value: &str) -> bool {
    WILDCARDS.contains(&value)
}

/// Deserialize a value, tagging failures with a config path
pub fn parse_value<T: DeserializeOwned>(value: &Value, path: &str) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|e| SchemaError::config(path, e.to_string()))
}

// =============================================================================
// Fields
// =============================================================================

/// Configuration of a single field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldConfig {
    /// `true`: ask the model provider for the type
    Introspect,
    /// `false`: leave the field out
    Excluded,
    /// A bare type reference string
    Type(TypeRef),
    Detailed(Box<FieldSpec>),
}

impl FieldConfig {
    pub fn spec(&self) -> Option<&FieldSpec> {
        match self {
            FieldConfig::Detailed(spec) => Some(spec),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for FieldConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(true) | Value::Null => Ok(FieldConfig::Introspect),
            Value::Bool(false) => Ok(FieldConfig::Excluded),
            Value::String(raw) => raw
                .parse()
                .map(FieldConfig::Type)
                .map_err(de::Error::custom),
            value @ Value::Object(_) => FieldSpec::deserialize(value)
                .map(|spec| FieldConfig::Detailed(Box::new(spec)))
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "field config must be a type, a map, true or false, got {}",
                other
            ))),
        }
    }
}

/// Full field configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub type_ref: Option<TypeRef>,
    #[serde(default)]
    pub args: IndexMap<String, ArgConfig>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resolver: Option<String>,
    #[serde(default)]
    pub resolver_context: Map<String, Value>,
    /// Source property when it differs from the field name
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub plugins: PluginMap,
    /// Nested model fields, for relation fields
    #[serde(default)]
    pub fields: Option<FieldsConfig>,
    /// Nested model operations, for relation fields
    #[serde(default)]
    pub operations: Option<OperationsConfig>,
}

/// A field argument
#[derive(Debug, Clone, PartialEq)]
pub enum ArgConfig {
    Type(TypeRef),
    Detailed(ArgSpec),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ArgSpec {
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl<'de> Deserialize<'de> for ArgConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(raw) => raw.parse().map(ArgConfig::Type).map_err(de::Error::custom),
            value @ Value::Object(_) => ArgSpec::deserialize(value)
                .map(ArgConfig::Detailed)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "argument config must be a type or a map, got {}",
                other
            ))),
        }
    }
}

/// The `fields:` entry of a model
#[derive(Debug, Clone, PartialEq)]
pub enum FieldsConfig {
    /// Every field the provider knows about
    All,
    Map(IndexMap<String, FieldConfig>),
}

impl Default for FieldsConfig {
    fn default() -> Self {
        FieldsConfig::Map(IndexMap::new())
    }
}

impl<'de> Deserialize<'de> for FieldsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) if is_wildcard(&s) => Ok(FieldsConfig::All),
            Value::Null => Ok(FieldsConfig::default()),
            // A plain list of names introspects each field
            Value::Array(names) => names
                .into_iter()
                .map(|name| match name {
                    Value::String(name) => Ok((name, FieldConfig::Introspect)),
                    other => Err(de::Error::custom(format!(
                        "field lists must contain field names, got {}",
                        other
                    ))),
                })
                .collect::<std::result::Result<IndexMap<_, _>, _>>()
                .map(FieldsConfig::Map),
            value @ Value::Object(_) => IndexMap::<String, FieldConfig>::deserialize(value)
                .map(FieldsConfig::Map)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "fields must be \"*\" or a map of field names to config, got {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Configuration of one generated operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OperationConfig {
    /// Overrides the generated operation name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub plugins: PluginMap,
    /// Fields left out of generated input types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationSetting {
    Enabled(OperationConfig),
    Disabled,
}

impl<'de> Deserialize<'de> for OperationSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(true) | Value::Null => Ok(OperationSetting::Enabled(OperationConfig::default())),
            Value::Bool(false) => Ok(OperationSetting::Disabled),
            value @ Value::Object(_) => OperationConfig::deserialize(value)
                .map(OperationSetting::Enabled)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "operation config must be a map of config or true, got {}",
                other
            ))),
        }
    }
}

/// The `operations:` entry of a model
#[derive(Debug, Clone, PartialEq)]
pub enum OperationsConfig {
    All,
    Map(IndexMap<String, OperationSetting>),
}

impl<'de> Deserialize<'de> for OperationsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) if is_wildcard(&s) => Ok(OperationsConfig::All),
            Value::Null => Ok(OperationsConfig::Map(IndexMap::new())),
            Value::Array(ids) => ids
                .into_iter()
                .map(|id| match id {
                    Value::String(id) => Ok((id, OperationSetting::Enabled(OperationConfig::default()))),
                    other => Err(de::Error::custom(format!(
                        "operation lists must contain operation identifiers, got {}",
                        other
                    ))),
                })
                .collect::<std::result::Result<IndexMap<_, _>, _>>()
                .map(OperationsConfig::Map),
            value @ Value::Object(_) => IndexMap::<String, OperationSetting>::deserialize(value)
                .map(OperationsConfig::Map)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "operations must be \"*\" or a map of operation identifiers to config, got {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Constructs
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeConfig {
    #[serde(default)]
    pub fields: IndexMap<String, FieldConfig>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub plugins: PluginMap,
    /// Declares an input object
    #[serde(default)]
    pub input: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceConfig {
    #[serde(default)]
    pub fields: IndexMap<String, FieldConfig>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub plugins: PluginMap,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnionConfig {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub plugins: PluginMap,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumConfig {
    pub values: EnumValues,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumValueConfig {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Enum values keyed by name, from either a list or a map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumValues(pub IndexMap<String, EnumValueConfig>);

impl<'de> Deserialize<'de> for EnumValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut values = IndexMap::new();
        match Value::deserialize(deserializer)? {
            Value::Array(names) => {
                for name in names {
                    match name {
                        Value::String(name) => {
                            values.insert(name, EnumValueConfig::default());
                        }
                        other => {
                            return Err(de::Error::custom(format!(
                                "enum value lists must contain names, got {}",
                                other
                            )))
                        }
                    }
                }
            }
            Value::Object(entries) => {
                for (name, entry) in entries {
                    let config = match entry {
                        value @ Value::Object(_) => {
                            EnumValueConfig::deserialize(value).map_err(de::Error::custom)?
                        }
                        scalar => EnumValueConfig {
                            value: Some(scalar),
                            description: None,
                        },
                    };
                    values.insert(name, config);
                }
            }
            other => {
                return Err(de::Error::custom(format!(
                    "enum values must be a list or a map, got {}",
                    other
                )))
            }
        }
        Ok(EnumValues(values))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ScalarConfig {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub specified_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    #[serde(default)]
    pub fields: Option<FieldsConfig>,
    #[serde(default)]
    pub operations: Option<OperationsConfig>,
    #[serde(default)]
    pub plugins: PluginMap,
}

// =============================================================================
// Defaults
// =============================================================================

/// The free-form `defaults:` section
///
/// Paths are given as slices so model identifiers containing dots or
/// backslashes can be used as keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults(Value);

impl Defaults {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.0, |node, key| node.as_object()?.get(*key))
    }

    /// Default plugins registered at `path`, or none
    pub fn plugins(&self, path: &[&str]) -> Result<PluginMap> {
        match self.get(path) {
            Some(value) if !value.is_null() => {
                parse_value(value, &format!("defaults.{}", path.join(".")))
            }
            _ => Ok(PluginMap::new()),
        }
    }

    /// Default plugins for models sourced from `class`
    pub fn model_plugins(&self, class: &str) -> Result<PluginMap> {
        self.plugins(&["models", class, "plugins"])
    }

    /// Default plugins for a generated operation
    pub fn operation_plugins(&self, operation: &str) -> Result<PluginMap> {
        self.plugins(&["operations", operation, "plugins"])
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

// =============================================================================
// Schema Config
// =============================================================================

/// A fully parsed schema configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaConfig {
    pub defaults: Defaults,
    pub types: IndexMap<String, TypeConfig>,
    pub queries: IndexMap<String, FieldConfig>,
    pub mutations: IndexMap<String, FieldConfig>,
    /// Keyed by source class identifier
    pub models: IndexMap<String, ModelConfig>,
    pub interfaces: IndexMap<String, InterfaceConfig>,
    pub unions: IndexMap<String, UnionConfig>,
    pub enums: IndexMap<String, EnumConfig>,
    pub scalars: IndexMap<String, ScalarConfig>,
    /// Identifiers of schema updaters run before any other plugin
    pub builders: Vec<String>,
}

impl SchemaConfig {
    /// Parse a merged configuration tree
    pub fn from_tree(tree: &Value) -> Result<Self> {
        let root = match tree {
            Value::Object(root) => root,
            Value::Null => return Ok(Self::default()),
            _ => return Err(SchemaError::config("<root>", "Schema config must be a map of sections")),
        };

        for key in root.keys() {
            if !SECTIONS.contains(&key.as_str()) {
                return Err(SchemaError::config(
                    key,
                    format!("Unknown section. Allowed sections are: {}", SECTIONS.join(", ")),
                ));
            }
        }

        let defaults = match root.get("defaults") {
            None | Some(Value::Null) => Defaults::default(),
            Some(value @ Value::Object(_)) => Defaults::new(value.clone()),
            Some(_) => return Err(SchemaError::config("defaults", "Defaults must be a map")),
        };

        let builders = match root.get("builders") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => parse_value(value, "builders")?,
        };

        let config = Self {
            defaults,
            types: parse_section(root, "types", true)?,
            queries: parse_section(root, "queries", true)?,
            mutations: parse_section(root, "mutations", true)?,
            // Model keys are source class identifiers, not GraphQL names
            models: parse_section(root, "models", false)?,
            interfaces: parse_section(root, "interfaces", true)?,
            unions: parse_section(root, "unions", true)?,
            enums: parse_section(root, "enums", true)?,
            scalars: parse_section(root, "scalars", true)?,
            builders,
        };

        for (section, fields) in [("queries", &config.queries), ("mutations", &config.mutations)] {
            for (name, field) in fields {
                if matches!(field, FieldConfig::Introspect) {
                    return Err(SchemaError::config(
                        format!("{}.{}", section, name),
                        "Operations outside models need an explicit type",
                    ));
                }
            }
        }

        Ok(config)
    }
}

fn parse_section<T: DeserializeOwned>(
    root: &Map<String, Value>,
    section: &str,
    validate_names: bool,
) -> Result<IndexMap<String, T>> {
    let entries = match root.get(section) {
        None | Some(Value::Null) => return Ok(IndexMap::new()),
        Some(Value::Array(items)) if items.is_empty() => return Ok(IndexMap::new()),
        Some(Value::Object(entries)) => entries,
        Some(_) => {
            return Err(SchemaError::config(
                section,
                "Must be key value pairs of names to configurations. Did you include an indexed array in your config?",
            ))
        }
    };

    let empty = Value::Object(Map::new());
    let mut parsed = IndexMap::with_capacity(entries.len());
    for (name, entry) in entries {
        let path = format!("{}.{}", section, name);
        if validate_names {
            assert_valid_name(name, &path)?;
        }
        let entry = if entry.is_null() { &empty } else { entry };
        parsed.insert(name.clone(), parse_value(entry, &path)?);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginSetting;
    use serde_json::json;

    #[test]
    fn test_parses_every_section() {
        let tree = json!({
            "types": {"Post": {"fields": {"title": "String!", "id": {"type": "ID!"}}}},
            "queries": {"posts": {"type": "[Post!]!", "resolver": "posts::all"}},
            "mutations": {"ping": "String"},
            "models": {"App\\Model\\Article": {"fields": "*", "operations": ["read"]}},
            "interfaces": {"Node": {"fields": {"id": "ID!"}}},
            "unions": {"Result": {"types": ["Post"]}},
            "enums": {"Status": {"values": ["DRAFT", "LIVE"]}},
            "scalars": {"Date": null},
            "builders": ["registerDates"],
        });
        let config = SchemaConfig::from_tree(&tree).unwrap();

        assert_eq!(config.types["Post"].fields.len(), 2);
        assert_eq!(
            config.queries["posts"].spec().unwrap().resolver.as_deref(),
            Some("posts::all")
        );
        assert_eq!(config.mutations["ping"], FieldConfig::Type(TypeRef::named("String")));
        assert_eq!(config.models["App\\Model\\Article"].fields, Some(FieldsConfig::All));
        assert_eq!(config.enums["Status"].values.0.len(), 2);
        assert!(config.scalars.contains_key("Date"));
        assert_eq!(config.builders, vec!["registerDates"]);
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let err = SchemaConfig::from_tree(&json!({"tpyes": {}})).unwrap_err();
        assert!(matches!(err, SchemaError::Config { ref path, .. } if path == "tpyes"));
    }

    #[test]
    fn test_unknown_entry_key_names_path() {
        let tree = json!({"types": {"Post": {"fields": {}, "colour": "red"}}});
        let err = SchemaConfig::from_tree(&tree).unwrap_err();
        assert!(matches!(err, SchemaError::Config { ref path, .. } if path == "types.Post"));
    }

    #[test]
    fn test_indexed_array_section_is_rejected() {
        let err = SchemaConfig::from_tree(&json!({"types": ["Post"]})).unwrap_err();
        assert!(err.to_string().contains("indexed array"));
    }

    #[test]
    fn test_invalid_type_name_is_rejected() {
        let err = SchemaConfig::from_tree(&json!({"types": {"Bad Name": {}}})).unwrap_err();
        assert!(matches!(err, SchemaError::Config { ref path, .. } if path == "types.Bad Name"));
    }

    #[test]
    fn test_enum_requires_values() {
        let err = SchemaConfig::from_tree(&json!({"enums": {"Status": {}}})).unwrap_err();
        assert!(err.to_string().contains("values"));
    }

    #[test]
    fn test_enum_value_map_forms() {
        let tree = json!({"enums": {"Status": {"values": {
            "DRAFT": "draft",
            "LIVE": {"value": "live", "description": "Published"},
        }}}});
        let config = SchemaConfig::from_tree(&tree).unwrap();
        let values = &config.enums["Status"].values.0;
        assert_eq!(values["DRAFT"].value, Some(json!("draft")));
        assert_eq!(values["LIVE"].description.as_deref(), Some("Published"));
    }

    #[test]
    fn test_query_needs_explicit_type() {
        let err = SchemaConfig::from_tree(&json!({"queries": {"posts": true}})).unwrap_err();
        assert!(matches!(err, SchemaError::Config { ref path, .. } if path == "queries.posts"));
    }

    #[test]
    fn test_model_field_forms() {
        let tree = json!({"models": {"Article": {
            "fields": {"title": true, "secret": false, "author": {"fields": ["name"]}},
            "operations": {"read": true, "delete": false, "update": {"exclude": ["slug"]}},
            "plugins": {"versioning": false},
        }}});
        let config = SchemaConfig::from_tree(&tree).unwrap();
        let model = &config.models["Article"];

        let Some(FieldsConfig::Map(fields)) = &model.fields else {
            panic!("expected field map");
        };
        assert_eq!(fields["title"], FieldConfig::Introspect);
        assert_eq!(fields["secret"], FieldConfig::Excluded);
        assert!(matches!(
            fields["author"].spec().unwrap().fields,
            Some(FieldsConfig::Map(ref nested)) if nested.contains_key("name")
        ));

        let Some(OperationsConfig::Map(operations)) = &model.operations else {
            panic!("expected operation map");
        };
        assert_eq!(operations["delete"], OperationSetting::Disabled);
        assert!(matches!(
            operations["update"],
            OperationSetting::Enabled(ref op) if op.exclude == vec!["slug"]
        ));
        assert_eq!(model.plugins["versioning"], PluginSetting::Disabled);
    }

    #[test]
    fn test_defaults_lookup() {
        let tree = json!({"defaults": {
            "models": {"App\\Model\\Article": {"plugins": {"inheritance": true}}},
            "operations": {"read": {"plugins": {"paginate": {"limit": 25}}}},
        }});
        let config = SchemaConfig::from_tree(&tree).unwrap();
        assert!(config
            .defaults
            .model_plugins("App\\Model\\Article")
            .unwrap()
            .contains_key("inheritance"));
        assert!(config.defaults.model_plugins("Other").unwrap().is_empty());
        assert!(config
            .defaults
            .operation_plugins("read")
            .unwrap()
            .contains_key("paginate"));
    }
}
