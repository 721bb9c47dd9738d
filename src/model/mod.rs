//! Data-model providers
//!
//! The assembler never talks to a data store. Everything it needs to know
//! about a source class (fields, their types, the class hierarchy, which
//! operations it supports) comes through [`ModelProvider`], obtained per class
//! from a [`ModelSource`].

pub mod catalog;
pub mod expander;
pub mod inheritance;
pub mod operations;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::ProviderError;
use crate::schema::{ResolverRef, TypeRef};

pub use catalog::ModelCatalog;
pub use expander::{Expansion, ModelExpander};
pub use inheritance::{InheritanceChain, InheritanceResolver, EXTENSION_FIELD};
pub use operations::{ModelOperation, OperationCreator, OperationKind};

/// Everything the assembler asks of one source class
pub trait ModelProvider: Debug + Send + Sync {
    /// Identifier of the class this provider describes
    fn source_class(&self) -> &str;

    /// GraphQL type name for the class
    fn type_name(&self) -> String;

    fn has_field(&self, field: &str) -> bool;

    /// Introspect the type of a field
    fn type_for_field(&self, field: &str) -> Result<TypeRef, ProviderError>;

    /// Every field name, optionally including relations
    fn all_fields(&self, include_relations: bool) -> Vec<String>;

    /// Fields every type for this class starts with
    fn default_fields(&self) -> IndexMap<String, TypeRef>;

    /// Field names that must never be exposed
    fn blacklisted_fields(&self) -> Vec<String>;

    /// Resolver used for fields that do not name one
    fn default_resolver(&self, context: &Map<String, Value>) -> ResolverRef;

    /// The most ancestral class in this class's hierarchy
    fn base_class(&self) -> String;

    /// Immediate subclasses
    fn direct_descendants(&self) -> Vec<String>;

    /// Related class behind a relation field
    fn model_class_for_field(&self, field: &str) -> Option<String>;

    fn all_operation_identifiers(&self) -> Vec<String>;

    fn operation_creator(&self, identifier: &str) -> Option<Arc<dyn OperationCreator>>;
}

/// Hands out providers per source class
pub trait ModelSource {
    fn model(&self, class: &str) -> Result<Arc<dyn ModelProvider>, ProviderError>;
}
