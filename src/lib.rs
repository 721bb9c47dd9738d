//! Schema Assembler
//!
//! Assembles GraphQL schemas from layered configuration fragments, data-model
//! providers and ordered plugin pipelines.
//!
//! ## Features
//!
//! - **Layered Configuration**: global, schema-scoped and inline sources deep-merged in order
//! - **Model Expansion**: `"*"` wildcards resolved through a [`ModelSource`]
//! - **Inheritance**: class hierarchies become types plus an `extensionType` union
//! - **Plugin Pipelines**: `before`/`after` ordering with cycle detection
//! - **Deterministic Output**: identical inputs give identical SDL and fingerprints
//!
//! ## Pipeline
//!
//! ```text
//! ConfigLoader ─► SchemaConfig ─► SchemaBuilder
//!                                   ├── register types, roots, models
//!                                   ├── InheritanceResolver
//!                                   ├── model operations ─► Query / Mutation
//!                                   ├── plugins (schema updaters, then per construct)
//!                                   └── validate ─► AssembledSchema ─► SchemaStorage
//! ```

pub mod builder;
pub mod checksum;
pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod loader;
pub mod model;
pub mod naming;
pub mod plugin;
pub mod schema;
pub mod sdl;
pub mod storage;

pub use builder::{AssembledSchema, BuildSummary, SchemaBuilder};
pub use checksum::Checksum;
pub use config::AssemblerSettings;
pub use context::BuildContext;
pub use definition::SchemaConfig;
pub use error::{DependencyError, ProviderError, Result, SchemaError};
pub use loader::{ConfigLoader, ConfigSource};
pub use model::{ModelCatalog, ModelProvider, ModelSource};
pub use plugin::{Capability, Plugin, PluginPipeline, PluginRegistry};
pub use schema::{Schema, TypeRef};
pub use sdl::print_schema;
pub use storage::{FileSchemaStorage, MemorySchemaStorage, SchemaStorage, StoredSchema};
