//! Static model catalog
//!
//! A [`ModelSource`] described by a JSON, YAML or TOML document:
//!
//! ```yaml
//! defaultFields:
//!   ID: ID
//! models:
//!   App\Model\Article:
//!     typeName: Article        # optional, derived from the class otherwise
//!     parent: App\Model\Page   # optional
//!     fields:
//!       Title: String
//!     relations:
//!       Author: { model: App\Model\Member }
//!       Comments: { model: App\Model\Comment, many: true }
//!     blacklist: [Password]
//!     operations: [create, read]  # defaults to every built-in operation
//! ```
//!
//! Fields and relations are inherited from parents, ancestors first.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::operations::{builtin_creator, BUILTIN_OPERATIONS};
use super::{ModelProvider, ModelSource, OperationCreator};
use crate::error::{ProviderError, Result, SchemaError};
use crate::naming::type_name_for_class;
use crate::schema::{ResolverRef, TypeRef};

/// Resolver for fields read straight off the source property
pub const PROPERTY_RESOLVER: &str = "model::resolve_property";

/// Resolver for fields exposing a property under another name
pub const MAPPED_PROPERTY_RESOLVER: &str = "model::resolve_mapped_property";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Relation {
    pub model: String,
    #[serde(default)]
    pub many: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, TypeRef>,
    #[serde(default)]
    pub relations: IndexMap<String, Relation>,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub operations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CatalogData {
    #[serde(default)]
    default_fields: IndexMap<String, TypeRef>,
    #[serde(default)]
    models: IndexMap<String, CatalogEntry>,
}

/// A fixed set of model classes
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    data: Arc<CatalogData>,
}

impl ModelCatalog {
    /// Parse a catalog document, checking that every parent and relation exists
    pub fn from_value(value: &Value) -> Result<Self> {
        let data: CatalogData = serde_json::from_value(value.clone())
            .map_err(|e| SchemaError::config("catalog", e.to_string()))?;
        let catalog = Self {
            data: Arc::new(data),
        };
        catalog.check()?;
        Ok(catalog)
    }

    /// Load a catalog file, picking the format from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let at = || path.display().to_string();
        let value: Value = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| SchemaError::config(at(), e.to_string()))?,
            Some("toml") => {
                toml::from_str(&content).map_err(|e| SchemaError::config(at(), e.to_string()))?
            }
            _ => serde_yaml::from_str(&content)
                .map_err(|e| SchemaError::config(at(), e.to_string()))?,
        };
        Self::from_value(&value)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.data.models.keys().map(String::as_str)
    }

    fn check(&self) -> Result<()> {
        for (class, entry) in &self.data.models {
            let path = format!("models.{}", class);
            if let Some(parent) = &entry.parent {
                if !self.data.models.contains_key(parent) {
                    return Err(SchemaError::config(
                        path,
                        format!("Parent class {} is not in the catalog", parent),
                    ));
                }
            }
            for (name, relation) in &entry.relations {
                if !self.data.models.contains_key(&relation.model) {
                    return Err(SchemaError::config(
                        format!("{}.relations.{}", path, name),
                        format!("Related class {} is not in the catalog", relation.model),
                    ));
                }
            }
            let mut seen = HashSet::new();
            let mut current = Some(class.as_str());
            while let Some(c) = current {
                if !seen.insert(c) {
                    return Err(SchemaError::config(path, "Class hierarchy contains a cycle"));
                }
                current = self.data.models.get(c).and_then(|e| e.parent.as_deref());
            }
        }
        Ok(())
    }
}

impl ModelSource for ModelCatalog {
    fn model(&self, class: &str) -> std::result::Result<Arc<dyn ModelProvider>, ProviderError> {
        if !self.data.models.contains_key(class) {
            return Err(ProviderError::new(format!(
                "No model is registered for class {}",
                class
            )));
        }
        Ok(Arc::new(CatalogModel {
            class: class.to_string(),
            data: Arc::clone(&self.data),
        }))
    }
}

/// Provider for one catalog class
#[derive(Debug, Clone)]
pub struct CatalogModel {
    class: String,
    data: Arc<CatalogData>,
}

impl CatalogModel {
    fn entry(&self, class: &str) -> Option<&CatalogEntry> {
        self.data.models.get(class)
    }

    /// This class and its ancestors, most ancestral first
    fn lineage(&self) -> Vec<&CatalogEntry> {
        let mut lineage = Vec::new();
        let mut current = self.entry(&self.class);
        while let Some(entry) = current {
            lineage.push(entry);
            current = entry.parent.as_deref().and_then(|p| self.entry(p));
        }
        lineage.reverse();
        lineage
    }

    fn own_field(&self, field: &str) -> Option<&TypeRef> {
        self.lineage()
            .into_iter()
            .rev()
            .find_map(|entry| entry.fields.get(field))
    }

    fn relation(&self, field: &str) -> Option<&Relation> {
        self.lineage()
            .into_iter()
            .rev()
            .find_map(|entry| entry.relations.get(field))
    }

    fn type_name_of(&self, class: &str) -> String {
        self.entry(class)
            .and_then(|entry| entry.type_name.clone())
            .unwrap_or_else(|| type_name_for_class(class))
    }
}

impl ModelProvider for CatalogModel {
    fn source_class(&self) -> &str {
        &self.class
    }

    fn type_name(&self) -> String {
        self.type_name_of(&self.class)
    }

    fn has_field(&self, field: &str) -> bool {
        self.data.default_fields.contains_key(field)
            || self.own_field(field).is_some()
            || self.relation(field).is_some()
    }

    fn type_for_field(&self, field: &str) -> std::result::Result<TypeRef, ProviderError> {
        if let Some(type_ref) = self.data.default_fields.get(field) {
            return Ok(type_ref.clone());
        }
        if let Some(type_ref) = self.own_field(field) {
            return Ok(type_ref.clone());
        }
        if let Some(relation) = self.relation(field) {
            let related = TypeRef::named(self.type_name_of(&relation.model));
            return Ok(if relation.many {
                TypeRef::list(related)
            } else {
                related
            });
        }
        Err(ProviderError::new(format!(
            "{} does not have a field \"{}\". Cannot introspect type.",
            self.class, field
        )))
    }

    fn all_fields(&self, include_relations: bool) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for entry in self.lineage() {
            for name in entry.fields.keys() {
                if !fields.contains(name) {
                    fields.push(name.clone());
                }
            }
        }
        if include_relations {
            for entry in self.lineage() {
                for name in entry.relations.keys() {
                    if !fields.contains(name) {
                        fields.push(name.clone());
                    }
                }
            }
        }
        fields
    }

    fn default_fields(&self) -> IndexMap<String, TypeRef> {
        self.data.default_fields.clone()
    }

    fn blacklisted_fields(&self) -> Vec<String> {
        self.lineage()
            .into_iter()
            .flat_map(|entry| entry.blacklist.iter().cloned())
            .collect()
    }

    fn default_resolver(&self, context: &Map<String, Value>) -> ResolverRef {
        if context.contains_key("propertyMapping") {
            ResolverRef::new(MAPPED_PROPERTY_RESOLVER)
        } else {
            ResolverRef::new(PROPERTY_RESOLVER)
        }
    }

    fn base_class(&self) -> String {
        let mut class = self.class.as_str();
        while let Some(parent) = self.entry(class).and_then(|e| e.parent.as_deref()) {
            class = parent;
        }
        class.to_string()
    }

    fn direct_descendants(&self) -> Vec<String> {
        self.data
            .models
            .iter()
            .filter(|(_, entry)| entry.parent.as_deref() == Some(self.class.as_str()))
            .map(|(class, _)| class.clone())
            .collect()
    }

    fn model_class_for_field(&self, field: &str) -> Option<String> {
        self.relation(field).map(|relation| relation.model.clone())
    }

    fn all_operation_identifiers(&self) -> Vec<String> {
        match self.entry(&self.class).and_then(|e| e.operations.clone()) {
            Some(operations) => operations,
            None => BUILTIN_OPERATIONS.iter().map(|op| op.to_string()).collect(),
        }
    }

    fn operation_creator(&self, identifier: &str) -> Option<Arc<dyn OperationCreator>> {
        builtin_creator(identifier)
    }
}
