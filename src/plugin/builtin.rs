//! Built-in plugins
//!
//! The plugins every assembler ships with. [`PluginRegistry::builtin`] returns
//! a registry holding all of them, which is what the CLI builds with.

use serde_json::{json, Value};
use std::sync::Arc;

use super::{Capability, FieldPlugin, Plugin, PluginConfig, PluginContext, PluginRegistry};
use crate::error::{Result, SchemaError};
use crate::schema::{Argument, Field, ObjectType, TypeRef};

pub const PAGINATE: &str = "paginate";

/// Shared by every connection type
pub const PAGE_INFO_TYPE: &str = "PageInfo";

const DEFAULT_LIMIT: u64 = 100;

impl PluginRegistry {
    /// A registry holding every built-in plugin
    pub fn builtin() -> Self {
        PluginRegistry::new()
            .with_plugin(Plugin::new(PAGINATE).with_capability(Capability::Query(Arc::new(Paginate))))
    }
}

/// Turns a list query into a paginated connection
///
/// `[Article!]!` becomes `ArticleConnection!` with `nodes`, `edges` and
/// `pageInfo`, and the field gains `limit` and `offset` arguments.
///
/// Options: `limit` (default page size, 100 unless set) and `maxLimit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Paginate;

impl Paginate {
    fn positive(config: &PluginConfig, key: &str) -> Result<Option<u64>> {
        match config.option(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => match value.as_u64() {
                Some(n) if n > 0 => Ok(Some(n)),
                _ => Err(SchemaError::builder(format!(
                    "{} must be a positive integer, got {}",
                    key, value
                ))),
            },
        }
    }

    fn connection_types(node: &str) -> [ObjectType; 3] {
        let node_ref = || TypeRef::non_null(TypeRef::named(node));
        let edge_name = format!("{}Edge", node);
        let edge = ObjectType::new(edge_name.clone()).with_field(Field::new("node", node_ref()));
        let connection = ObjectType::new(format!("{}Connection", node))
            .with_field(Field::new("nodes", TypeRef::non_null(TypeRef::list(node_ref()))))
            .with_field(Field::new(
                "edges",
                TypeRef::non_null(TypeRef::list(TypeRef::non_null(TypeRef::named(edge_name)))),
            ))
            .with_field(Field::new(
                "pageInfo",
                TypeRef::non_null(TypeRef::named(PAGE_INFO_TYPE)),
            ));
        let page_info = ObjectType::new(PAGE_INFO_TYPE)
            .with_field(Field::new("totalCount", TypeRef::non_null(TypeRef::named("Int"))))
            .with_field(Field::new("hasNextPage", TypeRef::non_null(TypeRef::named("Boolean"))))
            .with_field(Field::new("hasPreviousPage", TypeRef::non_null(TypeRef::named("Boolean"))));
        [connection, edge, page_info]
    }
}

impl FieldPlugin for Paginate {
    fn apply(&self, field: &mut Field, config: &PluginConfig, ctx: &mut PluginContext<'_>) -> Result<()> {
        let limit = Self::positive(config, "limit")?.unwrap_or(DEFAULT_LIMIT);
        let max_limit = Self::positive(config, "maxLimit")?;
        if let Some(max) = max_limit {
            if limit > max {
                return Err(SchemaError::builder(format!(
                    "limit {} exceeds maxLimit {}",
                    limit, max
                )));
            }
        }

        let inner = match &field.type_ref {
            TypeRef::NonNull(inner) => inner.as_ref(),
            other => other,
        };
        if !matches!(inner, TypeRef::List(_)) {
            return Err(SchemaError::builder(format!(
                "Only list fields can be paginated, {} is {}",
                field.name, field.type_ref
            )));
        }

        let node = field.type_ref.named_type().to_string();
        let [connection, edge, page_info] = Self::connection_types(&node);
        let connection_name = connection.name.clone();
        for ty in [connection, edge, page_info] {
            if !ctx.has_type(&ty.name) {
                ctx.add_type(ty);
            }
        }

        let mut limit_arg = Argument::new("limit", TypeRef::named("Int"));
        limit_arg.default_value = Some(json!(limit));
        let mut offset_arg = Argument::new("offset", TypeRef::named("Int"));
        offset_arg.default_value = Some(json!(0));
        field.add_arg(limit_arg);
        field.add_arg(offset_arg);

        let mut pagination = serde_json::Map::new();
        pagination.insert("limit".to_string(), json!(limit));
        if let Some(max) = max_limit {
            pagination.insert("maxLimit".to_string(), json!(max));
        }
        field
            .resolver_context
            .insert("pagination".to_string(), Value::Object(pagination));
        field.type_ref = TypeRef::non_null(TypeRef::named(connection_name));
        Ok(())
    }
}
