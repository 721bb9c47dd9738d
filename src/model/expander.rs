//! Model Expansion
//!
//! Turns a `models:` entry into a [`ModelType`]: wildcard and explicit field
//! sets are resolved through the provider, operations are declared, and the
//! auxiliary types the model drags in (operation input types, models behind
//! relation fields) are collected alongside it.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::{ModelProvider, ModelSource};
use crate::context::BuildContext;
use crate::definition::{
    FieldConfig, FieldsConfig, ModelConfig, OperationConfig, OperationSetting, OperationsConfig,
};
use crate::error::{ProviderError, Result, SchemaError};
use crate::naming::assert_valid_name;
use crate::plugin::PluginMap;
use crate::schema::{Field, ModelType, ObjectType, TypeRef};

/// A model plus everything it brought with it
#[derive(Debug, Clone)]
pub struct Expansion {
    pub model: ModelType,
    /// Operation input types, including those of nested models
    pub extra_types: Vec<ObjectType>,
    /// Models behind relation fields, expanded recursively
    pub nested_models: Vec<ModelType>,
}

pub struct ModelExpander<'a> {
    source: &'a dyn ModelSource,
}

impl<'a> ModelExpander<'a> {
    pub fn new(source: &'a dyn ModelSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &'a dyn ModelSource {
        self.source
    }

    pub fn provider(&self, class: &str) -> Result<Arc<dyn ModelProvider>> {
        self.source
            .model(class)
            .map_err(|e| SchemaError::provider(class, e))
    }

    /// A model carrying only the provider's default fields
    pub fn create_model(&self, class: &str, ctx: &mut BuildContext) -> Result<ModelType> {
        let provider = self.provider(class)?;
        let mut model = ModelType::new(provider.clone());
        for (name, type_ref) in provider.default_fields() {
            let field = self.model_field(
                provider.as_ref(),
                &name,
                &FieldConfig::Type(type_ref),
                ctx,
                &mut Vec::new(),
                &mut Vec::new(),
            )?;
            model.add_field(field)?;
        }
        Ok(model)
    }

    /// Expand a configured model
    pub fn expand(
        &self,
        class: &str,
        config: &ModelConfig,
        ctx: &mut BuildContext,
    ) -> Result<Expansion> {
        let mut extra_types = Vec::new();
        let mut nested_models = Vec::new();
        let model = self.expand_into(class, config, ctx, &mut extra_types, &mut nested_models)?;
        Ok(Expansion {
            model,
            extra_types,
            nested_models,
        })
    }

    fn expand_into(
        &self,
        class: &str,
        config: &ModelConfig,
        ctx: &mut BuildContext,
        extra_types: &mut Vec<ObjectType>,
        nested_models: &mut Vec<ModelType>,
    ) -> Result<ModelType> {
        let provider = self.provider(class)?;
        let mut model = ModelType::new(provider.clone());

        match config.fields.clone().unwrap_or_default() {
            FieldsConfig::All => {
                for (name, type_ref) in provider.default_fields() {
                    let field = self.model_field(
                        provider.as_ref(),
                        &name,
                        &FieldConfig::Type(type_ref),
                        ctx,
                        extra_types,
                        nested_models,
                    )?;
                    model.add_field(field)?;
                }
                for name in provider.all_fields(false) {
                    if model.is_blacklisted(&name) {
                        debug!(class, field = %name, "Skipping blacklisted field");
                        continue;
                    }
                    let field = self.model_field(
                        provider.as_ref(),
                        &name,
                        &FieldConfig::Introspect,
                        ctx,
                        extra_types,
                        nested_models,
                    )?;
                    model.add_field(field)?;
                }
            }
            FieldsConfig::Map(fields) => {
                let mut merged: IndexMap<String, FieldConfig> = provider
                    .default_fields()
                    .into_iter()
                    .map(|(name, type_ref)| (name, FieldConfig::Type(type_ref)))
                    .collect();
                merged.extend(fields);

                for (name, field_config) in &merged {
                    if matches!(field_config, FieldConfig::Excluded) {
                        continue;
                    }
                    let field = self.model_field(
                        provider.as_ref(),
                        name,
                        field_config,
                        ctx,
                        extra_types,
                        nested_models,
                    )?;
                    model.add_field(field)?;
                }
            }
        }

        match &config.operations {
            None => {}
            Some(OperationsConfig::All) => {
                for identifier in provider.all_operation_identifiers() {
                    model.add_operation(identifier, OperationConfig::default());
                }
            }
            Some(OperationsConfig::Map(operations)) => {
                for (identifier, setting) in operations {
                    if let OperationSetting::Enabled(operation) = setting {
                        model.add_operation(identifier.clone(), operation.clone());
                    }
                }
            }
        }

        model.plugins_mut().set_plugins(&config.plugins);
        extra_types.extend(model.extra_types()?);

        debug!(
            class,
            model = model.name(),
            fields = model.field_names().count(),
            operations = model.operation_identifiers().count(),
            "Expanded model"
        );
        Ok(model)
    }

    /// Build one field of a model, introspecting through the provider as needed
    fn model_field(
        &self,
        provider: &dyn ModelProvider,
        name: &str,
        config: &FieldConfig,
        ctx: &mut BuildContext,
        extra_types: &mut Vec<ObjectType>,
        nested_models: &mut Vec<ModelType>,
    ) -> Result<Field> {
        let class = provider.source_class();
        let path = format!("models.{}.fields.{}", class, name);
        assert_valid_name(name, &path)?;

        let spec = config.spec();
        let explicit_type: Option<TypeRef> = match config {
            FieldConfig::Type(type_ref) => Some(type_ref.clone()),
            FieldConfig::Detailed(spec) => spec.type_ref.clone(),
            _ => None,
        };
        let requested = spec
            .and_then(|s| s.property.clone())
            .unwrap_or_else(|| name.to_string());
        let property = ctx.normalise_field(provider, &requested);

        let type_ref = match explicit_type {
            Some(type_ref) => type_ref,
            None => {
                let property = property.as_deref().ok_or_else(|| {
                    SchemaError::provider(
                        &path,
                        ProviderError::new(format!(
                            "{} does not have a field \"{}\". Cannot introspect type.",
                            class, requested
                        )),
                    )
                })?;
                provider
                    .type_for_field(property)
                    .map_err(|e| SchemaError::provider(&path, e))?
            }
        };

        let mut field = Field::new(name, type_ref);
        if let Some(spec) = spec {
            field.apply_spec(spec);
        }

        let source_property = property.clone().unwrap_or(requested);
        if source_property != name {
            let mut mapping = Map::new();
            mapping.insert(name.to_string(), Value::String(source_property.clone()));
            field
                .resolver_context
                .insert("propertyMapping".to_string(), Value::Object(mapping));
            field.property = Some(source_property);
        } else {
            field.property = None;
        }
        if field.resolver.is_none() {
            field.resolver = Some(provider.default_resolver(&field.resolver_context));
        }

        if let Some(related) = property
            .as_deref()
            .and_then(|p| provider.model_class_for_field(p))
        {
            let nested_config = ModelConfig {
                fields: spec.and_then(|s| s.fields.clone()),
                operations: spec.and_then(|s| s.operations.clone()),
                plugins: PluginMap::new(),
            };
            let nested = self.expand_into(&related, &nested_config, ctx, extra_types, nested_models)?;
            nested_models.push(nested);
        }

        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelCatalog, OperationKind};
    use serde_json::json;

    fn field_names(model: &ModelType) -> Vec<String> {
        model.field_names().map(str::to_string).collect()
    }

    fn catalog() -> ModelCatalog {
        ModelCatalog::from_value(&json!({
            "defaultFields": {"ID": "ID"},
            "models": {
                "App\\Member": {
                    "fields": {"Name": "String", "Created": "String"},
                    "blacklist": ["Name"],
                },
                "App\\Article": {
                    "fields": {"Title": "String"},
                    "relations": {"Author": {"model": "App\\Author"}},
                },
                "App\\Author": {"fields": {"Nickname": "String", "Email": "String"}},
            },
        }))
        .unwrap()
    }

    fn config(value: serde_json::Value) -> ModelConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_wildcard_skips_blacklisted_fields() {
        let catalog = catalog();
        let mut ctx = BuildContext::new("default");
        let expansion = ModelExpander::new(&catalog)
            .expand("App\\Member", &config(json!({"fields": "*"})), &mut ctx)
            .unwrap();
        assert_eq!(field_names(&expansion.model), vec!["ID", "Created"]);
    }

    #[test]
    fn test_explicit_blacklisted_field_fails() {
        let catalog = catalog();
        let mut ctx = BuildContext::new("default");
        let err = ModelExpander::new(&catalog)
            .expand("App\\Member", &config(json!({"fields": {"Name": true}})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.to_string(), "Field Name is not allowed on App\\Member");
    }

    #[test]
    fn test_explicit_fields_extend_defaults() {
        let catalog = catalog();
        let mut ctx = BuildContext::new("default");
        let expansion = ModelExpander::new(&catalog)
            .expand(
                "App\\Article",
                &config(json!({"fields": {"title": true, "Headline": {"property": "Title"}}})),
                &mut ctx,
            )
            .unwrap();
        let model = &expansion.model;
        assert_eq!(field_names(model), vec!["ID", "title", "Headline"]);
        assert_eq!(
            model.field("Headline").unwrap().resolver_context["propertyMapping"],
            json!({"Headline": "Title"})
        );
        assert_eq!(model.field("title").unwrap().property.as_deref(), Some("Title"));
    }

    #[test]
    fn test_false_removes_default_field() {
        let catalog = catalog();
        let mut ctx = BuildContext::new("default");
        let expansion = ModelExpander::new(&catalog)
            .expand("App\\Article", &config(json!({"fields": {"ID": false, "Title": true}})), &mut ctx)
            .unwrap();
        assert_eq!(field_names(&expansion.model), vec!["Title"]);
    }

    #[test]
    fn test_unknown_field_cannot_be_introspected() {
        let catalog = catalog();
        let mut ctx = BuildContext::new("default");
        let err = ModelExpander::new(&catalog)
            .expand("App\\Article", &config(json!({"fields": {"Missing": true}})), &mut ctx)
            .unwrap_err();
        assert!(err.to_string().contains("Cannot introspect type"));
    }

    #[test]
    fn test_operations_and_input_types() {
        let catalog = catalog();
        let mut ctx = BuildContext::new("default");
        let expansion = ModelExpander::new(&catalog)
            .expand(
                "App\\Article",
                &config(json!({"fields": {"Title": true}, "operations": {"create": true, "read": true}})),
                &mut ctx,
            )
            .unwrap();

        let operations = expansion.model.operations().unwrap();
        let names: Vec<_> = operations.iter().map(|op| op.field.name.as_str()).collect();
        assert_eq!(names, vec!["createArticle", "readArticles"]);
        assert_eq!(operations[0].kind, OperationKind::Mutation);
        assert_eq!(operations[0].field.args["input"].type_ref.to_string(), "ArticleCreateInput!");
        assert_eq!(operations[1].field.type_ref.to_string(), "[Article!]!");

        assert_eq!(expansion.extra_types.len(), 1);
        let input = &expansion.extra_types[0];
        assert!(input.input);
        assert_eq!(input.field_names().collect::<Vec<_>>(), vec!["Title"]);
    }

    #[test]
    fn test_invalid_operation() {
        let catalog = catalog();
        let mut ctx = BuildContext::new("default");
        let err = ModelExpander::new(&catalog)
            .expand("App\\Article", &config(json!({"operations": {"publish": true}})), &mut ctx)
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid operation: publish"));
    }

    #[test]
    fn test_relation_field_expands_nested_model() {
        let catalog = catalog();
        let mut ctx = BuildContext::new("default");
        let expansion = ModelExpander::new(&catalog)
            .expand(
                "App\\Article",
                &config(json!({"fields": {"Author": {"fields": {"Nickname": true}}}})),
                &mut ctx,
            )
            .unwrap();

        assert_eq!(
            expansion.model.field("Author").unwrap().type_ref,
            TypeRef::named("Author")
        );
        assert_eq!(expansion.nested_models.len(), 1);
        assert_eq!(field_names(&expansion.nested_models[0]), vec!["ID", "Nickname"]);
    }
}
