//! Model types
//!
//! A [`ModelType`] is an object type backed by a data-model provider. Besides
//! fields it carries deferred operation declarations, which only turn into
//! query and mutation fields when [`ModelType::operations`] is called.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::{Field, ObjectType};
use crate::definition::OperationConfig;
use crate::error::{invariant, Result, SchemaError};
use crate::model::{ModelOperation, ModelProvider, OperationCreator};
use crate::plugin::PluginPipeline;

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelType {
    #[serde(flatten)]
    object: ObjectType,
    source_class: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    operations: IndexMap<String, OperationConfig>,
    #[serde(skip)]
    blacklist: Vec<String>,
    #[serde(skip)]
    provider: Arc<dyn ModelProvider>,
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.object.name)
            .field("source_class", &self.source_class)
            .field("fields", &self.object.fields.keys().collect::<Vec<_>>())
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
            && self.source_class == other.source_class
            && self.operations == other.operations
            && self.blacklist == other.blacklist
    }
}

impl ModelType {
    /// An empty model type named after the provider's type name
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            object: ObjectType::new(provider.type_name()),
            source_class: provider.source_class().to_string(),
            operations: IndexMap::new(),
            blacklist: provider
                .blacklisted_fields()
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.object.name
    }

    pub fn source_class(&self) -> &str {
        &self.source_class
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn as_object(&self) -> &ObjectType {
        &self.object
    }

    /// The plain object type this model renders as
    pub fn into_object(self) -> ObjectType {
        self.object
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.object.description = Some(description.into());
    }

    pub fn plugins(&self) -> &PluginPipeline {
        &self.object.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginPipeline {
        &mut self.object.plugins
    }

    pub fn is_blacklisted(&self, field: &str) -> bool {
        self.blacklist.contains(&field.to_lowercase())
    }

    /// Add or replace a field, refusing blacklisted names
    pub fn add_field(&mut self, field: Field) -> Result<()> {
        invariant!(
            !self.is_blacklisted(&field.name),
            "Field {} is not allowed on {}",
            field.name,
            self.source_class
        );
        self.object.add_field(field);
        Ok(())
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        self.object.remove_field(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.object.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.object.field(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.object.field_mut(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.object.has_field(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.object.field_names()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    pub fn add_operation(&mut self, identifier: impl Into<String>, config: OperationConfig) {
        self.operations.insert(identifier.into(), config);
    }

    pub fn remove_operation(&mut self, identifier: &str) -> Option<OperationConfig> {
        self.operations.shift_remove(identifier)
    }

    /// Layer `config` over an operation that is already declared
    pub fn update_operation(&mut self, identifier: &str, config: OperationConfig) -> Result<()> {
        let name = self.object.name.clone();
        let existing = self.operations.get_mut(identifier).ok_or_else(|| {
            SchemaError::builder(format!(
                "Cannot update nonexistent operation {} on {}",
                identifier, name
            ))
        })?;
        if config.name.is_some() {
            existing.name = config.name;
        }
        if config.description.is_some() {
            existing.description = config.description;
        }
        if config.resolver.is_some() {
            existing.resolver = config.resolver;
        }
        existing.plugins.extend(config.plugins);
        if !config.exclude.is_empty() {
            existing.exclude = config.exclude;
        }
        Ok(())
    }

    pub fn has_operation(&self, identifier: &str) -> bool {
        self.operations.contains_key(identifier)
    }

    pub fn operation_identifiers(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    fn creator(&self, identifier: &str) -> Result<Arc<dyn OperationCreator>> {
        self.provider.operation_creator(identifier).ok_or_else(|| {
            SchemaError::builder(format!(
                "Invalid operation: {} on {}",
                identifier, self.object.name
            ))
        })
    }

    /// Materialize every declared operation
    pub fn operations(&self) -> Result<Vec<ModelOperation>> {
        let mut operations = Vec::with_capacity(self.operations.len());
        for (identifier, config) in &self.operations {
            if let Some(operation) = self.creator(identifier)?.create_operation(self, config)? {
                operations.push(operation);
            }
        }
        Ok(operations)
    }

    /// Input types required by the declared operations
    pub fn extra_types(&self) -> Result<Vec<ObjectType>> {
        let mut types = Vec::new();
        for (identifier, config) in &self.operations {
            for input in self.creator(identifier)?.input_types(self, config)? {
                invariant!(
                    input.input,
                    "Input types must be input objects on {}, got {}",
                    self.object.name,
                    input.name
                );
                types.push(input);
            }
        }
        Ok(types)
    }

    /// Merge another model of the same name into this one
    pub fn absorb(&mut self, other: &ModelType) {
        self.object.merge(&other.object);
        for (identifier, config) in &other.operations {
            self.operations.insert(identifier.clone(), config.clone());
        }
        for name in &other.blacklist {
            if !self.blacklist.contains(name) {
                self.blacklist.push(name.clone());
            }
        }
    }

    /// Fold a plain type of the same name into this model
    pub fn absorb_type(&mut self, other: &ObjectType) {
        self.object.merge(other);
    }
}
