//! Plugins
//!
//! A plugin is registered under an identifier and declares one or more
//! [`Capability`]s. Which capability runs depends on the construct the plugin
//! is bound to: a plugin bound to a type runs its [`TypePlugin`] side, the
//! same plugin bound to a query field runs its field side, and so on.
//! [`SchemaUpdater`]s are different: they run once per build with mutable
//! access to the whole schema, before any per-construct plugin.

pub mod apply;
pub mod builtin;
pub mod pipeline;

use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

pub use apply::apply_plugins;
pub use builtin::Paginate;
pub use pipeline::{
    Constraint, PluginConfig, PluginMap, PluginPipeline, PluginSetting, SortedPlugin, ALL_PLUGINS,
};

use crate::error::Result;
use crate::schema::{Field, ModelType, ObjectType, Schema};

pub trait TypePlugin: Send + Sync {
    fn apply(
        &self,
        ty: &mut ObjectType,
        config: &PluginConfig,
        ctx: &mut PluginContext<'_>,
    ) -> Result<()>;
}

pub trait ModelPlugin: Send + Sync {
    fn apply(
        &self,
        model: &mut ModelType,
        config: &PluginConfig,
        ctx: &mut PluginContext<'_>,
    ) -> Result<()>;
}

/// Applies to fields, including root query and mutation fields
pub trait FieldPlugin: Send + Sync {
    fn apply(
        &self,
        field: &mut Field,
        config: &PluginConfig,
        ctx: &mut PluginContext<'_>,
    ) -> Result<()>;
}

pub trait SchemaUpdater: Send + Sync {
    fn update_schema(&self, schema: &mut Schema) -> Result<()>;
}

/// What a plugin can do
#[derive(Clone)]
pub enum Capability {
    Type(Arc<dyn TypePlugin>),
    Model(Arc<dyn ModelPlugin>),
    /// Any field, on types, models or the roots
    Field(Arc<dyn FieldPlugin>),
    /// Query root fields only
    Query(Arc<dyn FieldPlugin>),
    /// Mutation root fields only
    Mutation(Arc<dyn FieldPlugin>),
    SchemaUpdater(Arc<dyn SchemaUpdater>),
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Type(_) => CapabilityKind::Type,
            Capability::Model(_) => CapabilityKind::Model,
            Capability::Field(_) => CapabilityKind::Field,
            Capability::Query(_) => CapabilityKind::Query,
            Capability::Mutation(_) => CapabilityKind::Mutation,
            Capability::SchemaUpdater(_) => CapabilityKind::SchemaUpdater,
        }
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.kind())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Type,
    Model,
    Field,
    Query,
    Mutation,
    SchemaUpdater,
}

/// A registered plugin
#[derive(Debug, Clone)]
pub struct Plugin {
    identifier: String,
    capabilities: Vec<Capability>,
}

impl Plugin {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The first capability among `kinds`, checked in the order given
    pub fn capability(&self, kinds: &[CapabilityKind]) -> Option<&Capability> {
        kinds.iter().find_map(|kind| {
            self.capabilities
                .iter()
                .find(|capability| capability.kind() == *kind)
        })
    }

    pub fn schema_updater(&self) -> Option<&Arc<dyn SchemaUpdater>> {
        self.capabilities.iter().find_map(|capability| match capability {
            Capability::SchemaUpdater(updater) => Some(updater),
            _ => None,
        })
    }
}

/// Identifier to implementation mapping
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Plugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, replacing any plugin with the same identifier
    pub fn register(&mut self, plugin: Plugin) -> &mut Self {
        self.plugins.insert(plugin.identifier.clone(), plugin);
        self
    }

    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.register(plugin);
        self
    }

    pub fn get(&self, identifier: &str) -> Option<&Plugin> {
        self.plugins.get(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }
}

/// What a per-construct plugin sees besides the construct itself
pub struct PluginContext<'a> {
    schema_key: &'a str,
    construct: String,
    /// Every name registered when the current phase started
    known_names: &'a IndexSet<String>,
    pending_types: Vec<ObjectType>,
}

impl<'a> PluginContext<'a> {
    pub fn new(schema_key: &'a str, construct: impl Into<String>, known_names: &'a IndexSet<String>) -> Self {
        Self {
            schema_key,
            construct: construct.into(),
            known_names,
            pending_types: Vec::new(),
        }
    }

    pub fn schema_key(&self) -> &str {
        self.schema_key
    }

    /// Display name of the construct being processed, e.g. `Article.title`
    pub fn construct(&self) -> &str {
        &self.construct
    }

    /// Whether a type of this name exists or has been queued
    pub fn has_type(&self, name: &str) -> bool {
        self.known_names.contains(name) || self.pending_types.iter().any(|ty| ty.name == name)
    }

    /// Queue a type for registration once the current construct is done
    pub fn add_type(&mut self, ty: ObjectType) {
        self.pending_types.push(ty);
    }

    pub fn into_pending_types(self) -> Vec<ObjectType> {
        self.pending_types
    }
}
