//! Model Inheritance
//!
//! Exposes class hierarchies. For every model in the schema the most
//! ancestral class is found and one model type is registered per class in the
//! tree, each carrying its parent's fields. The base type gains an
//! `extensionType` field whose type is a union of every descendant, so a
//! client can ask which concrete subtype a record is.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ModelExpander, ModelSource};
use crate::context::BuildContext;
use crate::error::{Result, SchemaError};
use crate::schema::{Field, ResolverRef, Schema, TypeRef, UnionType};

/// Field added to base types of a hierarchy
pub const EXTENSION_FIELD: &str = "extensionType";

/// Resolver picking the union member for a record
pub const EXTENSION_RESOLVER: &str = "inheritance::resolve_extension_type";

/// A class hierarchy as reported by the providers
#[derive(Debug, Clone, PartialEq)]
pub struct InheritanceChain {
    base_class: String,
    base_type: String,
    /// class -> direct subclasses, in provider order
    children: IndexMap<String, Vec<String>>,
    /// descendant class -> type name, depth first
    descendants: IndexMap<String, String>,
}

impl InheritanceChain {
    /// Load the whole hierarchy `class` belongs to
    pub fn load(source: &dyn ModelSource, class: &str) -> Result<Self> {
        let provider = source
            .model(class)
            .map_err(|e| SchemaError::provider(class, e))?;
        let base_class = provider.base_class();
        let base = source
            .model(&base_class)
            .map_err(|e| SchemaError::provider(&base_class, e))?;

        let mut chain = Self {
            base_type: base.type_name(),
            base_class: base_class.clone(),
            children: IndexMap::new(),
            descendants: IndexMap::new(),
        };
        chain.walk(source, &base_class)?;
        Ok(chain)
    }

    fn walk(&mut self, source: &dyn ModelSource, class: &str) -> Result<()> {
        let provider = source
            .model(class)
            .map_err(|e| SchemaError::provider(class, e))?;
        let children = provider.direct_descendants();
        self.children.insert(class.to_string(), children.clone());
        for child in children {
            if child == self.base_class || self.descendants.contains_key(&child) {
                continue;
            }
            let type_name = source
                .model(&child)
                .map_err(|e| SchemaError::provider(&child, e))?
                .type_name();
            self.descendants.insert(child.clone(), type_name);
            self.walk(source, &child)?;
        }
        Ok(())
    }

    pub fn base_class(&self) -> &str {
        &self.base_class
    }

    pub fn base_type(&self) -> &str {
        &self.base_type
    }

    pub fn has_descendants(&self) -> bool {
        !self.descendants.is_empty()
    }

    pub fn direct_descendants(&self, class: &str) -> &[String] {
        self.children.get(class).map(Vec::as_slice).unwrap_or_default()
    }

    /// Type names of every descendant, depth first
    pub fn descendant_types(&self) -> impl Iterator<Item = &str> {
        self.descendants.values().map(String::as_str)
    }

    /// Name of the union covering the descendants
    pub fn extension_type_name(&self) -> String {
        format!("{}ExtensionType", self.base_type)
    }

    /// class -> type name, as handed to the extension resolver
    pub fn type_map(&self) -> Map<String, Value> {
        self.descendants
            .iter()
            .map(|(class, type_name)| (class.clone(), Value::String(type_name.clone())))
            .collect()
    }

    /// The union member for a record of concrete class `class`
    pub fn resolve_member(&self, class: &str) -> Option<&str> {
        self.descendants.get(class).map(String::as_str)
    }
}

/// Registers hierarchy types for every model in a schema
pub struct InheritanceResolver<'a> {
    expander: &'a ModelExpander<'a>,
}

impl<'a> InheritanceResolver<'a> {
    pub fn new(expander: &'a ModelExpander<'a>) -> Self {
        Self { expander }
    }

    pub fn apply(&self, schema: &mut Schema, ctx: &mut BuildContext) -> Result<()> {
        let classes: Vec<String> = schema
            .models()
            .map(|model| model.source_class().to_string())
            .collect();

        for class in classes {
            let chain = InheritanceChain::load(self.expander.source(), &class)?;
            if !ctx.visit_ancestor(chain.base_class()) {
                continue;
            }
            self.add_class(schema, ctx, &chain, chain.base_class(), None)?;

            if chain.has_descendants() {
                let union_name = chain.extension_type_name();
                schema.add_union(UnionType::new(union_name.clone(), chain.descendant_types()));

                let mut field = Field::new(EXTENSION_FIELD, TypeRef::named(union_name.clone()))
                    .with_resolver(ResolverRef::new(EXTENSION_RESOLVER));
                field
                    .resolver_context
                    .insert("typeMap".to_string(), Value::Object(chain.type_map()));

                let base = schema.model_for_class_mut(chain.base_class()).ok_or_else(|| {
                    SchemaError::builder(format!(
                        "Base model for {} was not registered",
                        chain.base_class()
                    ))
                })?;
                base.add_field(field)?;
                debug!(base = chain.base_type(), union = %union_name, "Added extension type");
            }
        }
        Ok(())
    }

    /// Register `class` and its subtree, seeding each type with its parent's fields
    fn add_class(
        &self,
        schema: &mut Schema,
        ctx: &mut BuildContext,
        chain: &InheritanceChain,
        class: &str,
        parent: Option<&str>,
    ) -> Result<()> {
        if schema.model_for_class(class).is_none() {
            let model = self.expander.create_model(class, ctx)?;
            debug!(class, model = model.name(), "Registering implicit hierarchy model");
            schema.add_model(model);
        }

        if let Some(parent) = parent {
            let inherited: Vec<Field> = schema
                .model_for_class(parent)
                .map(|model| {
                    model
                        .fields()
                        .filter(|field| field.name != EXTENSION_FIELD)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            if let Some(model) = schema.model_for_class_mut(class) {
                for field in inherited {
                    if !model.has_field(&field.name) {
                        model.add_field(field)?;
                    }
                }
            }
        }

        for child in chain.direct_descendants(class) {
            self.add_class(schema, ctx, chain, child, Some(class))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelCatalog;
    use serde_json::json;

    fn catalog() -> ModelCatalog {
        ModelCatalog::from_value(&json!({
            "defaultFields": {"ID": "ID"},
            "models": {
                "Base": {"fields": {"Title": "String"}},
                "Mid": {"parent": "Base", "fields": {"Summary": "String"}},
                "Leaf": {"parent": "Mid", "fields": {"Colour": "String"}},
                "Other": {"parent": "Base"},
            },
        }))
        .unwrap()
    }

    #[test]
    fn test_chain_walks_descendants() {
        let catalog = catalog();
        let chain = InheritanceChain::load(&catalog, "Leaf").unwrap();
        assert_eq!(chain.base_class(), "Base");
        assert_eq!(chain.descendant_types().collect::<Vec<_>>(), vec!["Mid", "Leaf", "Other"]);
        assert_eq!(chain.direct_descendants("Base"), ["Mid".to_string(), "Other".to_string()]);
        assert_eq!(chain.extension_type_name(), "BaseExtensionType");
    }

    #[test]
    fn test_resolve_member() {
        let catalog = catalog();
        let chain = InheritanceChain::load(&catalog, "Mid").unwrap();
        assert_eq!(chain.resolve_member("Leaf"), Some("Leaf"));
        assert_eq!(chain.resolve_member("Base"), None);
        assert_eq!(chain.resolve_member("Unknown"), None);
    }

    #[test]
    fn test_leaf_model_registers_whole_hierarchy() {
        let catalog = catalog();
        let expander = ModelExpander::new(&catalog);
        let mut ctx = BuildContext::new("default");
        let mut schema = Schema::new("default");
        let leaf = expander
            .expand("Leaf", &serde_json::from_value(json!({"fields": {"Colour": true}})).unwrap(), &mut ctx)
            .unwrap();
        schema.add_model(leaf.model);

        InheritanceResolver::new(&expander).apply(&mut schema, &mut ctx).unwrap();

        for name in ["Base", "Mid", "Leaf", "Other"] {
            assert!(schema.get_model(name).unwrap().has_field("ID"), "{} lacks ID", name);
        }
        let base = schema.get_model("Base").unwrap();
        let extension = base.field(EXTENSION_FIELD).unwrap();
        assert_eq!(extension.type_ref, TypeRef::named("BaseExtensionType"));
        assert_eq!(extension.resolver_context["typeMap"]["Leaf"], json!("Leaf"));

        let union = schema.get_union("BaseExtensionType").unwrap();
        assert_eq!(union.types.iter().collect::<Vec<_>>(), vec!["Mid", "Leaf", "Other"]);
        assert!(!schema.get_model("Mid").unwrap().has_field(EXTENSION_FIELD));
    }

    #[test]
    fn test_descendants_inherit_parent_fields() {
        let catalog = catalog();
        let expander = ModelExpander::new(&catalog);
        let mut ctx = BuildContext::new("default");
        let mut schema = Schema::new("default");
        let base = expander
            .expand("Base", &serde_json::from_value(json!({"fields": {"Title": true}})).unwrap(), &mut ctx)
            .unwrap();
        schema.add_model(base.model);

        InheritanceResolver::new(&expander).apply(&mut schema, &mut ctx).unwrap();

        let leaf = schema.get_model("Leaf").unwrap();
        assert_eq!(leaf.field_names().collect::<Vec<_>>(), vec!["ID", "Title"]);
    }

    #[test]
    fn test_hierarchy_is_expanded_once_per_build() {
        let catalog = catalog();
        let expander = ModelExpander::new(&catalog);
        let mut ctx = BuildContext::new("default");
        let mut schema = Schema::new("default");
        schema.add_model(expander.create_model("Leaf", &mut ctx).unwrap());
        schema.add_model(expander.create_model("Mid", &mut ctx).unwrap());

        let resolver = InheritanceResolver::new(&expander);
        resolver.apply(&mut schema, &mut ctx).unwrap();
        assert!(ctx.has_visited("Base"));

        // A fresh build starts with a fresh context
        let mut fresh = Schema::new("default");
        fresh.add_model(expander.create_model("Leaf", &mut ctx).unwrap());
        resolver.apply(&mut fresh, &mut BuildContext::new("default")).unwrap();
        assert!(fresh.get_model("Base").is_some());
    }
}
