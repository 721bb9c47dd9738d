//! Per-build state
//!
//! A [`BuildContext`] lives exactly as long as one schema build. It holds the
//! inheritance bookkeeping and a read-through cache of field names per class.

use std::collections::{HashMap, HashSet};

use crate::model::ModelProvider;

#[derive(Debug, Default)]
pub struct BuildContext {
    schema_key: String,
    /// Base classes whose hierarchy has already been expanded
    visited_ancestors: HashSet<String>,
    /// class -> lower-cased field name -> field name as the provider spells it
    field_cache: HashMap<String, HashMap<String, String>>,
}

impl BuildContext {
    pub fn new(schema_key: impl Into<String>) -> Self {
        Self {
            schema_key: schema_key.into(),
            ..Self::default()
        }
    }

    pub fn schema_key(&self) -> &str {
        &self.schema_key
    }

    /// Record a base class; `false` if it was already expanded in this build
    pub fn visit_ancestor(&mut self, class: &str) -> bool {
        self.visited_ancestors.insert(class.to_string())
    }

    pub fn has_visited(&self, class: &str) -> bool {
        self.visited_ancestors.contains(class)
    }

    /// Resolve a field name case-insensitively against the provider
    pub fn normalise_field(&mut self, provider: &dyn ModelProvider, field: &str) -> Option<String> {
        let fields = self
            .field_cache
            .entry(provider.source_class().to_string())
            .or_insert_with(|| {
                provider
                    .default_fields()
                    .into_keys()
                    .chain(provider.all_fields(true))
                    .map(|name| (name.to_lowercase(), name))
                    .collect()
            });
        fields.get(&field.to_lowercase()).cloned()
    }
}
