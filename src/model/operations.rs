//! Operation creators
//!
//! An [`OperationCreator`] turns a declared operation on a model into a query
//! or mutation field, plus any input types that field needs. The built-in
//! creators cover the usual create / read / readOne / update / delete set.

use serde_json::{Map, Value};
use std::fmt::Debug;
use std::sync::Arc;

use super::EXTENSION_FIELD;
use crate::definition::OperationConfig;
use crate::error::Result;
use crate::naming::pluralise;
use crate::plugin::PluginPipeline;
use crate::schema::{Argument, Field, ModelType, ObjectType, ResolverRef, TypeRef};

pub const CREATE: &str = "create";
pub const READ: &str = "read";
pub const READ_ONE: &str = "readOne";
pub const UPDATE: &str = "update";
pub const DELETE: &str = "delete";

/// Every built-in operation identifier
pub const BUILTIN_OPERATIONS: [&str; 5] = [CREATE, READ, READ_ONE, UPDATE, DELETE];

/// Name of the identifier field generated inputs key on
const ID_FIELD: &str = "ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

/// A materialized operation, ready to be registered on a root type
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOperation {
    /// Identifier of the creator that produced it, e.g. `read`
    pub identifier: String,
    pub kind: OperationKind,
    pub field: Field,
}

pub trait OperationCreator: Debug + Send + Sync {
    fn identifier(&self) -> &str;

    /// Build the operation field, or `None` when it does not apply to the model
    fn create_operation(
        &self,
        model: &ModelType,
        config: &OperationConfig,
    ) -> Result<Option<ModelOperation>>;

    /// Input types the operation field refers to
    fn input_types(&self, _model: &ModelType, _config: &OperationConfig) -> Result<Vec<ObjectType>> {
        Ok(Vec::new())
    }
}

/// Look up a built-in creator by identifier
pub fn builtin_creator(identifier: &str) -> Option<Arc<dyn OperationCreator>> {
    match identifier {
        CREATE => Some(Arc::new(CreateCreator)),
        READ => Some(Arc::new(ReadCreator)),
        READ_ONE => Some(Arc::new(ReadOneCreator)),
        UPDATE => Some(Arc::new(UpdateCreator)),
        DELETE => Some(Arc::new(DeleteCreator)),
        _ => None,
    }
}

fn operation(
    identifier: &str,
    kind: OperationKind,
    default_name: String,
    type_ref: TypeRef,
    model: &ModelType,
    config: &OperationConfig,
) -> ModelOperation {
    let mut context = Map::new();
    context.insert(
        "dataClass".to_string(),
        Value::String(model.source_class().to_string()),
    );
    let resolver = config
        .resolver
        .clone()
        .unwrap_or_else(|| format!("crud::{}", identifier));

    let field = Field {
        description: config.description.clone(),
        resolver: Some(ResolverRef::new(resolver)),
        resolver_context: context,
        plugins: PluginPipeline::from_map(&config.plugins),
        ..Field::new(config.name.clone().unwrap_or(default_name), type_ref)
    };
    ModelOperation {
        identifier: identifier.to_string(),
        kind,
        field,
    }
}

/// Fields of `model` eligible for a generated input type
fn input_fields<'a>(
    model: &'a ModelType,
    config: &'a OperationConfig,
) -> impl Iterator<Item = Field> + 'a {
    let excluded: Vec<String> = config.exclude.iter().map(|f| f.to_lowercase()).collect();
    let provider = model.provider().clone();
    model.fields().filter_map(move |field| {
        let lower = field.name.to_lowercase();
        let skip = lower == ID_FIELD.to_lowercase()
            || field.name == EXTENSION_FIELD
            || excluded.contains(&lower)
            || provider.model_class_for_field(field.property_name()).is_some()
            || matches!(strip_non_null(&field.type_ref), TypeRef::List(_));
        if skip {
            return None;
        }
        Some(Field::new(
            field.name.clone(),
            strip_non_null(&field.type_ref).clone(),
        ))
    })
}

fn strip_non_null(type_ref: &TypeRef) -> &TypeRef {
    match type_ref {
        TypeRef::NonNull(inner) => inner,
        other => other,
    }
}

fn model_ref(model: &ModelType) -> TypeRef {
    TypeRef::named(model.name())
}

fn input_arg(name: &str) -> Argument {
    Argument::new("input", TypeRef::non_null(TypeRef::named(name)))
}

#[derive(Debug, Clone, Copy)]
pub struct CreateCreator;

impl CreateCreator {
    fn input_name(model: &ModelType) -> String {
        format!("{}CreateInput", model.name())
    }
}

impl OperationCreator for CreateCreator {
    fn identifier(&self) -> &str {
        CREATE
    }

    fn create_operation(
        &self,
        model: &ModelType,
        config: &OperationConfig,
    ) -> Result<Option<ModelOperation>> {
        let mut op = operation(
            CREATE,
            OperationKind::Mutation,
            format!("create{}", model.name()),
            model_ref(model),
            model,
            config,
        );
        op.field.add_arg(input_arg(&Self::input_name(model)));
        Ok(Some(op))
    }

    fn input_types(&self, model: &ModelType, config: &OperationConfig) -> Result<Vec<ObjectType>> {
        let input = input_fields(model, config)
            .fold(ObjectType::input(Self::input_name(model)), ObjectType::with_field);
        Ok(vec![input])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadCreator;

impl OperationCreator for ReadCreator {
    fn identifier(&self) -> &str {
        READ
    }

    fn create_operation(
        &self,
        model: &ModelType,
        config: &OperationConfig,
    ) -> Result<Option<ModelOperation>> {
        Ok(Some(operation(
            READ,
            OperationKind::Query,
            format!("read{}", pluralise(model.name())),
            TypeRef::non_null(TypeRef::list(TypeRef::non_null(model_ref(model)))),
            model,
            config,
        )))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOneCreator;

impl OperationCreator for ReadOneCreator {
    fn identifier(&self) -> &str {
        READ_ONE
    }

    fn create_operation(
        &self,
        model: &ModelType,
        config: &OperationConfig,
    ) -> Result<Option<ModelOperation>> {
        let mut op = operation(
            READ_ONE,
            OperationKind::Query,
            format!("readOne{}", model.name()),
            model_ref(model),
            model,
            config,
        );
        op.field
            .add_arg(Argument::new("id", TypeRef::non_null(TypeRef::named("ID"))));
        Ok(Some(op))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpdateCreator;

impl UpdateCreator {
    fn input_name(model: &ModelType) -> String {
        format!("{}UpdateInput", model.name())
    }
}

impl OperationCreator for UpdateCreator {
    fn identifier(&self) -> &str {
        UPDATE
    }

    fn create_operation(
        &self,
        model: &ModelType,
        config: &OperationConfig,
    ) -> Result<Option<ModelOperation>> {
        let mut op = operation(
            UPDATE,
            OperationKind::Mutation,
            format!("update{}", model.name()),
            model_ref(model),
            model,
            config,
        );
        op.field.add_arg(input_arg(&Self::input_name(model)));
        Ok(Some(op))
    }

    fn input_types(&self, model: &ModelType, config: &OperationConfig) -> Result<Vec<ObjectType>> {
        let input = ObjectType::input(Self::input_name(model))
            .with_field(Field::new(ID_FIELD, TypeRef::non_null(TypeRef::named("ID"))));
        Ok(vec![input_fields(model, config).fold(input, ObjectType::with_field)])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteCreator;

impl OperationCreator for DeleteCreator {
    fn identifier(&self) -> &str {
        DELETE
    }

    fn create_operation(
        &self,
        model: &ModelType,
        config: &OperationConfig,
    ) -> Result<Option<ModelOperation>> {
        let mut op = operation(
            DELETE,
            OperationKind::Mutation,
            format!("delete{}", pluralise(model.name())),
            TypeRef::list(TypeRef::named("ID")),
            model,
            config,
        );
        op.field.add_arg(Argument::new(
            "ids",
            TypeRef::non_null(TypeRef::list(TypeRef::non_null(TypeRef::named("ID")))),
        ));
        Ok(Some(op))
    }
}
