//! Type Registry
//!
//! [`Schema`] owns every construct of one build: object types, models,
//! interfaces, unions, enums, scalars and the root query / mutation fields.
//! Adding a construct whose name is already taken merges the two instead of
//! failing; uniqueness across namespaces is only checked by
//! [`Schema::validate`].

pub mod model_type;
mod type_ref;
mod types;
pub mod validate;

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

pub use model_type::ModelType;
pub use type_ref::{TypeRef, TypeRefParseError};
pub use types::{
    Argument, EnumType, EnumValue, Field, InterfaceType, ObjectType, ResolverRef, ScalarType,
    UnionType,
};

use crate::model::ModelProvider;

/// Name of the synthetic query root
pub const QUERY_TYPE: &str = "Query";

/// Name of the synthetic mutation root
pub const MUTATION_TYPE: &str = "Mutation";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    schema_key: String,
    pub(crate) types: IndexMap<String, ObjectType>,
    pub(crate) models: IndexMap<String, ModelType>,
    pub(crate) interfaces: IndexMap<String, InterfaceType>,
    pub(crate) unions: IndexMap<String, UnionType>,
    pub(crate) enums: IndexMap<String, EnumType>,
    pub(crate) scalars: IndexMap<String, ScalarType>,
    /// Folded into the query root by [`Schema::finalize`]
    #[serde(skip)]
    pub(crate) queries: IndexMap<String, Field>,
    /// Folded into the mutation root by [`Schema::finalize`]
    #[serde(skip)]
    pub(crate) mutations: IndexMap<String, Field>,
}

impl Schema {
    pub fn new(schema_key: impl Into<String>) -> Self {
        Self {
            schema_key: schema_key.into(),
            types: IndexMap::new(),
            models: IndexMap::new(),
            interfaces: IndexMap::new(),
            unions: IndexMap::new(),
            enums: IndexMap::new(),
            scalars: IndexMap::new(),
            queries: IndexMap::new(),
            mutations: IndexMap::new(),
        }
    }

    pub fn schema_key(&self) -> &str {
        &self.schema_key
    }

    // =========================================================================
    // Object types
    // =========================================================================

    /// Register a type, merging into an existing type of the same name
    pub fn add_type(&mut self, ty: ObjectType) {
        match self.types.get_mut(&ty.name) {
            Some(existing) => existing.merge(&ty),
            None => {
                self.types.insert(ty.name.clone(), ty);
            }
        }
    }

    pub fn get_type(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    pub fn get_type_mut(&mut self, name: &str) -> Option<&mut ObjectType> {
        self.types.get_mut(name)
    }

    pub fn remove_type(&mut self, name: &str) -> Option<ObjectType> {
        self.types.shift_remove(name)
    }

    pub fn find_or_make_type(&mut self, name: &str) -> &mut ObjectType {
        self.types
            .entry(name.to_string())
            .or_insert_with(|| ObjectType::new(name))
    }

    pub fn types(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values()
    }

    // =========================================================================
    // Models
    // =========================================================================

    /// Register a model, merging into an existing model of the same name
    pub fn add_model(&mut self, model: ModelType) {
        match self.models.get_mut(model.name()) {
            Some(existing) => existing.absorb(&model),
            None => {
                self.models.insert(model.name().to_string(), model);
            }
        }
    }

    pub fn get_model(&self, name: &str) -> Option<&ModelType> {
        self.models.get(name)
    }

    pub fn get_model_mut(&mut self, name: &str) -> Option<&mut ModelType> {
        self.models.get_mut(name)
    }

    pub fn model_for_class(&self, class: &str) -> Option<&ModelType> {
        self.models.values().find(|model| model.source_class() == class)
    }

    pub fn model_for_class_mut(&mut self, class: &str) -> Option<&mut ModelType> {
        self.models
            .values_mut()
            .find(|model| model.source_class() == class)
    }

    pub fn find_or_make_model(&mut self, provider: Arc<dyn ModelProvider>) -> &mut ModelType {
        self.models
            .entry(provider.type_name())
            .or_insert_with(|| ModelType::new(provider))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelType> {
        self.models.values()
    }

    // =========================================================================
    // Interfaces, unions, enums, scalars
    // =========================================================================

    pub fn add_interface(&mut self, interface: InterfaceType) {
        match self.interfaces.get_mut(&interface.name) {
            Some(existing) => existing.merge(&interface),
            None => {
                self.interfaces.insert(interface.name.clone(), interface);
            }
        }
    }

    pub fn get_interface(&self, name: &str) -> Option<&InterfaceType> {
        self.interfaces.get(name)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceType> {
        self.interfaces.values()
    }

    pub fn add_union(&mut self, union: UnionType) {
        match self.unions.get_mut(&union.name) {
            Some(existing) => existing.merge(&union),
            None => {
                self.unions.insert(union.name.clone(), union);
            }
        }
    }

    pub fn get_union(&self, name: &str) -> Option<&UnionType> {
        self.unions.get(name)
    }

    pub fn unions(&self) -> impl Iterator<Item = &UnionType> {
        self.unions.values()
    }

    /// Register an enum, replacing any enum of the same name
    pub fn add_enum(&mut self, enum_type: EnumType) {
        self.enums.insert(enum_type.name.clone(), enum_type);
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumType> {
        self.enums.values()
    }

    /// Register a scalar, replacing any scalar of the same name
    pub fn add_scalar(&mut self, scalar: ScalarType) {
        self.scalars.insert(scalar.name.clone(), scalar);
    }

    pub fn get_scalar(&self, name: &str) -> Option<&ScalarType> {
        self.scalars.get(name)
    }

    pub fn scalars(&self) -> impl Iterator<Item = &ScalarType> {
        self.scalars.values()
    }

    // =========================================================================
    // Root fields
    // =========================================================================

    pub fn add_query(&mut self, field: Field) {
        self.queries.insert(field.name.clone(), field);
    }

    pub fn get_query(&self, name: &str) -> Option<&Field> {
        self.queries.get(name)
    }

    pub fn queries(&self) -> impl Iterator<Item = &Field> {
        self.queries.values()
    }

    pub fn add_mutation(&mut self, field: Field) {
        self.mutations.insert(field.name.clone(), field);
    }

    pub fn get_mutation(&self, name: &str) -> Option<&Field> {
        self.mutations.get(name)
    }

    pub fn mutations(&self) -> impl Iterator<Item = &Field> {
        self.mutations.values()
    }

    /// Whether any namespace holds `name`
    pub fn has_named_type(&self, name: &str) -> bool {
        crate::naming::is_internal_type(name)
            || self.types.contains_key(name)
            || self.models.contains_key(name)
            || self.interfaces.contains_key(name)
            || self.unions.contains_key(name)
            || self.enums.contains_key(name)
            || self.scalars.contains_key(name)
    }

    /// Fold plain types into same-named models and build the root types
    ///
    /// The query root always exists; the mutation root only when there is at
    /// least one mutation.
    pub fn finalize(&mut self) {
        let model_names: Vec<String> = self.models.keys().cloned().collect();
        for name in model_names {
            if let Some(plain) = self.types.shift_remove(&name) {
                if let Some(model) = self.models.get_mut(&name) {
                    model.absorb_type(&plain);
                }
            }
        }

        let query = self
            .queries
            .values()
            .cloned()
            .fold(ObjectType::new(QUERY_TYPE), ObjectType::with_field);
        self.add_type(query);

        if !self.mutations.is_empty() {
            let mutation = self
                .mutations
                .values()
                .cloned()
                .fold(ObjectType::new(MUTATION_TYPE), ObjectType::with_field);
            self.add_type(mutation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(name: &str, fields: &[&str]) -> ObjectType {
        fields.iter().fold(ObjectType::new(name), |ty, field| {
            ty.with_field(Field::new(*field, TypeRef::named("String")))
        })
    }

    #[test]
    fn test_add_type_merges() {
        let mut schema = Schema::new("default");
        schema.add_type(typed("Post", &["title"]));
        schema.add_type(typed("Post", &["body"]));
        let post = schema.get_type("Post").unwrap();
        assert_eq!(post.field_names().collect::<Vec<_>>(), vec!["title", "body"]);
    }

    #[test]
    fn test_enums_replace_on_collision() {
        let mut schema = Schema::new("default");
        let first: crate::definition::EnumConfig =
            serde_json::from_value(serde_json::json!({"values": ["A"]})).unwrap();
        let second: crate::definition::EnumConfig =
            serde_json::from_value(serde_json::json!({"values": ["B"]})).unwrap();
        schema.add_enum(EnumType::from_config("Status", &first).unwrap());
        schema.add_enum(EnumType::from_config("Status", &second).unwrap());
        assert_eq!(
            schema.get_enum("Status").unwrap().values.keys().collect::<Vec<_>>(),
            vec!["B"]
        );
    }

    #[test]
    fn test_find_or_make_type() {
        let mut schema = Schema::new("default");
        schema
            .find_or_make_type("Post")
            .add_field(Field::new("title", TypeRef::named("String")));
        schema
            .find_or_make_type("Post")
            .add_field(Field::new("body", TypeRef::named("String")));
        assert_eq!(schema.get_type("Post").unwrap().fields.len(), 2);
    }

    #[test]
    fn test_finalize_builds_roots() {
        let mut schema = Schema::new("default");
        schema.add_query(Field::new("ping", TypeRef::named("String")));
        schema.finalize();
        assert!(schema.get_type(QUERY_TYPE).unwrap().has_field("ping"));
        assert!(schema.get_type(MUTATION_TYPE).is_none());

        schema.add_mutation(Field::new("pong", TypeRef::named("String")));
        schema.finalize();
        assert!(schema.get_type(MUTATION_TYPE).unwrap().has_field("pong"));
    }
}
