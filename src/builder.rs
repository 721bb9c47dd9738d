//! Schema Builder
//!
//! Drives one build from a parsed [`SchemaConfig`] to a validated schema:
//!
//! 1. register the declared constructs
//! 2. expand models through the model source
//! 3. fill in inheritance hierarchies
//! 4. attach model operations to the root fields
//! 5. run the plugins
//! 6. build the root types and validate
//!
//! The result carries the serialized document, the printed SDL and a
//! fingerprint of the document.

use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

use crate::checksum::Checksum;
use crate::context::BuildContext;
use crate::definition::SchemaConfig;
use crate::error::Result;
use crate::model::operations::OperationKind;
use crate::model::{InheritanceResolver, ModelExpander, ModelSource};
use crate::plugin::{apply_plugins, PluginRegistry};
use crate::schema::{
    EnumType, Field, InterfaceType, ObjectType, ScalarType, Schema, UnionType,
};
use crate::sdl::print_schema;

/// A validated schema and its artifacts
#[derive(Debug, Clone)]
pub struct AssembledSchema {
    pub schema: Schema,
    /// JSON form of the schema, as persisted
    pub document: Value,
    pub sdl: String,
    pub fingerprint: Checksum,
}

impl AssembledSchema {
    fn new(schema: Schema) -> Result<Self> {
        let document = serde_json::to_value(&schema)?;
        let fingerprint = Checksum::from_json(&document);
        let sdl = print_schema(&schema);
        Ok(Self {
            schema,
            document,
            sdl,
            fingerprint,
        })
    }

    pub fn schema_key(&self) -> &str {
        self.schema.schema_key()
    }
}

/// Summary printed by the CLI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub schema_key: String,
    pub types: usize,
    pub models: usize,
    pub queries: usize,
    pub mutations: usize,
    pub fingerprint: String,
}

impl From<&AssembledSchema> for BuildSummary {
    fn from(assembled: &AssembledSchema) -> Self {
        let schema = &assembled.schema;
        Self {
            schema_key: schema.schema_key().to_string(),
            types: schema.types().count(),
            models: schema.models().count(),
            queries: schema.queries().count(),
            mutations: schema.mutations().count(),
            fingerprint: assembled.fingerprint.to_string(),
        }
    }
}

pub struct SchemaBuilder<'a> {
    schema_key: String,
    source: &'a dyn ModelSource,
    registry: &'a PluginRegistry,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(
        schema_key: impl Into<String>,
        source: &'a dyn ModelSource,
        registry: &'a PluginRegistry,
    ) -> Self {
        Self {
            schema_key: schema_key.into(),
            source,
            registry,
        }
    }

    pub fn schema_key(&self) -> &str {
        &self.schema_key
    }

    /// Assemble and validate a schema
    pub fn build(&self, config: &SchemaConfig) -> Result<AssembledSchema> {
        let start = Instant::now();
        let mut ctx = BuildContext::new(self.schema_key.clone());
        let expander = ModelExpander::new(self.source);
        let mut schema = Schema::new(self.schema_key.clone());

        self.stage("register", || self.register(&mut schema, config, &expander, &mut ctx))?;
        self.stage("inheritance", || {
            InheritanceResolver::new(&expander).apply(&mut schema, &mut ctx)
        })?;
        self.stage("operations", || self.process_models(&mut schema, config))?;
        self.stage("plugins", || apply_plugins(&mut schema, self.registry, &config.builders))?;
        schema.finalize();
        self.stage("validate", || schema.validate())?;

        let assembled = AssembledSchema::new(schema)?;
        info!(
            schema = %self.schema_key,
            fingerprint = %assembled.fingerprint,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Schema built"
        );
        Ok(assembled)
    }

    fn stage<T>(&self, name: &str, run: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = run()?;
        info!(
            schema = %self.schema_key,
            stage = name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Stage complete"
        );
        Ok(result)
    }

    /// Raw registration of every configured construct
    fn register(
        &self,
        schema: &mut Schema,
        config: &SchemaConfig,
        expander: &ModelExpander<'_>,
        ctx: &mut BuildContext,
    ) -> Result<()> {
        for (name, type_config) in &config.types {
            schema.add_type(ObjectType::from_config(name, type_config)?);
        }
        for (name, field_config) in &config.queries {
            if let Some(field) = Field::from_config(name, field_config, &format!("queries.{}", name))? {
                schema.add_query(field);
            }
        }
        for (name, field_config) in &config.mutations {
            if let Some(field) = Field::from_config(name, field_config, &format!("mutations.{}", name))? {
                schema.add_mutation(field);
            }
        }
        for (name, interface_config) in &config.interfaces {
            schema.add_interface(InterfaceType::from_config(name, interface_config)?);
        }
        for (name, union_config) in &config.unions {
            schema.add_union(UnionType::from_config(name, union_config));
        }
        for (class, model_config) in &config.models {
            let expansion = expander.expand(class, model_config, ctx)?;
            debug!(
                class = %class,
                model = expansion.model.name(),
                extra_types = expansion.extra_types.len(),
                nested_models = expansion.nested_models.len(),
                "Expanded model"
            );
            for ty in expansion.extra_types {
                schema.add_type(ty);
            }
            for nested in expansion.nested_models {
                schema.add_model(nested);
            }
            schema.add_model(expansion.model);
        }
        for (name, enum_config) in &config.enums {
            schema.add_enum(EnumType::from_config(name, enum_config)?);
        }
        for (name, scalar_config) in &config.scalars {
            schema.add_scalar(ScalarType::from_config(name, scalar_config));
        }
        Ok(())
    }

    /// Apply default model plugins and register model operations on the roots
    fn process_models(&self, schema: &mut Schema, config: &SchemaConfig) -> Result<()> {
        let names: Vec<String> = schema.models().map(|model| model.name().to_string()).collect();
        for name in names {
            let Some(model) = schema.get_model_mut(&name) else { continue };
            let defaults = config.defaults.model_plugins(model.source_class())?;
            model.plugins_mut().apply_defaults(&defaults);

            for mut operation in model.operations()? {
                let defaults = config.defaults.operation_plugins(&operation.identifier)?;
                operation.field.plugins.apply_defaults(&defaults);
                debug!(
                    model = %name,
                    operation = %operation.identifier,
                    field = %operation.field.name,
                    "Registering operation"
                );
                match operation.kind {
                    OperationKind::Query => schema.add_query(operation.field),
                    OperationKind::Mutation => schema.add_mutation(operation.field),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelCatalog;
    use crate::schema::{TypeRef, MUTATION_TYPE, QUERY_TYPE};
    use serde_json::json;

    fn catalog() -> ModelCatalog {
        ModelCatalog::from_value(&json!({
            "defaultFields": {"ID": "ID"},
            "models": {
                "App\\Article": {"fields": {"Title": "String"}},
            },
        }))
        .unwrap()
    }

    fn config(value: Value) -> SchemaConfig {
        SchemaConfig::from_tree(&value).unwrap()
    }

    #[test]
    fn test_builds_article_schema() {
        let catalog = catalog();
        let registry = PluginRegistry::new();
        let assembled = SchemaBuilder::new("default", &catalog, &registry)
            .build(&config(json!({
                "models": {"App\\Article": {"fields": "*", "operations": ["create", "read"]}},
            })))
            .unwrap();

        let schema = &assembled.schema;
        let article = schema.get_model("Article").unwrap();
        assert_eq!(article.field_names().collect::<Vec<_>>(), vec!["ID", "Title"]);
        assert!(schema.get_type(QUERY_TYPE).unwrap().has_field("readArticles"));
        let create = schema.get_type(MUTATION_TYPE).unwrap().field("createArticle").unwrap();
        assert_eq!(
            create.args["input"].type_ref,
            TypeRef::non_null(TypeRef::named("ArticleCreateInput"))
        );
        let input = schema.get_type("ArticleCreateInput").unwrap();
        assert_eq!(input.field_names().collect::<Vec<_>>(), vec!["Title"]);
        assert!(assembled.sdl.contains("type Article {"));
    }

    #[test]
    fn test_operation_defaults_are_applied() {
        let catalog = catalog();
        let registry = PluginRegistry::new()
            .with_plugin(crate::plugin::Plugin::new("paginate"))
            .with_plugin(crate::plugin::Plugin::new("audit"));
        let assembled = SchemaBuilder::new("default", &catalog, &registry)
            .build(&config(json!({
                "defaults": {
                    "operations": {"read": {"plugins": {"paginate": true}}},
                    "models": {"App\\Article": {"plugins": {"audit": true}}},
                },
                "models": {"App\\Article": {"fields": "*", "operations": {"read": true}}},
            })))
            .unwrap();

        let schema = &assembled.schema;
        let read = schema.get_query("readArticles").unwrap();
        assert!(read.plugins.has_plugin("paginate"));
        assert!(schema.get_model("Article").unwrap().plugins().has_plugin("audit"));
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let catalog = catalog();
        let registry = PluginRegistry::new();
        let config = config(json!({
            "types": {"Stats": {"fields": {"count": "Int"}}},
            "queries": {"stats": "Stats"},
            "models": {"App\\Article": {"fields": "*", "operations": "*"}},
        }));
        let builder = SchemaBuilder::new("default", &catalog, &registry);
        let first = builder.build(&config).unwrap();
        let second = builder.build(&config).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.sdl, second.sdl);
    }

    #[test]
    fn test_invalid_schema_fails() {
        let catalog = catalog();
        let registry = PluginRegistry::new();
        let err = SchemaBuilder::new("default", &catalog, &registry)
            .build(&config(json!({
                "types": {"Foo": {"fields": {"id": "ID"}}},
                "enums": {"Foo": {"values": ["A"]}},
            })))
            .unwrap_err();
        assert!(err.to_string().contains("See Foo"));
    }
}
