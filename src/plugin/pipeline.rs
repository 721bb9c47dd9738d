//! Plugin Pipeline
//!
//! Every composable construct owns a [`PluginPipeline`]: an ordered map of
//! plugin identifier to plugin configuration. Bindings may order themselves
//! against siblings on the same construct with `before` / `after`, either by
//! naming other plugins or with `"*"` to run ahead of / behind everything.
//!
//! Sorting is deterministic: `before: "*"` bindings form a head bucket,
//! `after: "*"` bindings a tail bucket, and everything else is sorted with
//! Kahn's algorithm over a dependency graph, breaking ties by declaration
//! order.
//!
//! A binding in one bucket cannot also be ordered against named siblings
//! from the other side; that is reported as
//! [`DependencyError::ConflictingConstraints`].

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

use crate::error::DependencyError;
use crate::loader::merge_values;

/// Wildcard accepted by `before` / `after`
pub const ALL_PLUGINS: &str = "*";

// =============================================================================
// Constraints
// =============================================================================

/// A `before` or `after` ordering constraint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Constraint {
    #[default]
    None,
    /// Every other plugin on the construct
    All,
    /// Named sibling plugins
    Plugins(Vec<String>),
}

impl Constraint {
    pub fn is_none(&self) -> bool {
        matches!(self, Constraint::None)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Constraint::All)
    }

    /// Named plugins referenced by this constraint
    pub fn plugins(&self) -> &[String] {
        match self {
            Constraint::Plugins(names) => names,
            _ => &[],
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Constraint::None => Value::Null,
            Constraint::All => Value::String(ALL_PLUGINS.to_string()),
            Constraint::Plugins(names) if names.len() == 1 => Value::String(names[0].clone()),
            Constraint::Plugins(names) => {
                Value::Array(names.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Constraint::None),
            Value::String(s) if s == ALL_PLUGINS => Ok(Constraint::All),
            Value::String(s) => Ok(Constraint::Plugins(vec![s])),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(de::Error::custom(format!(
                        "plugin constraints must list plugin identifiers, got {}",
                        other
                    ))),
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Constraint::Plugins),
            other => Err(de::Error::custom(format!(
                "plugin constraint must be an identifier, a list of identifiers or \"*\", got {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Plugin Config
// =============================================================================

/// Configuration of one plugin binding
///
/// `before` and `after` are lifted out of the raw map; every other key is
/// plugin-specific and kept verbatim in `options`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginConfig {
    pub before: Constraint,
    pub after: Constraint,
    pub options: Map<String, Value>,
}

impl PluginConfig {
    /// Look up a plugin-specific option
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Layer `incoming` over this config
    ///
    /// Constraints set on `incoming` replace ours; options are deep-merged.
    pub fn merge(&mut self, incoming: &PluginConfig) {
        if !incoming.before.is_none() {
            self.before = incoming.before.clone();
        }
        if !incoming.after.is_none() {
            self.after = incoming.after.clone();
        }
        let mut options = Value::Object(std::mem::take(&mut self.options));
        merge_values(&mut options, Value::Object(incoming.options.clone()));
        if let Value::Object(map) = options {
            self.options = map;
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if !self.before.is_none() {
            map.insert("before".to_string(), self.before.to_value());
        }
        if !self.after.is_none() {
            map.insert("after".to_string(), self.after.to_value());
        }
        for (key, value) in &self.options {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

impl<'de> Deserialize<'de> for PluginConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut options = match Value::deserialize(deserializer)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(de::Error::custom(format!(
                    "plugin config must be a map, got {}",
                    other
                )))
            }
        };
        let before = options
            .remove("before")
            .map(Constraint::deserialize)
            .transpose()
            .map_err(de::Error::custom)?
            .unwrap_or_default();
        let after = options
            .remove("after")
            .map(Constraint::deserialize)
            .transpose()
            .map_err(de::Error::custom)?
            .unwrap_or_default();
        Ok(PluginConfig {
            before,
            after,
            options,
        })
    }
}

impl Serialize for PluginConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// One entry of a `plugins:` map
#[derive(Debug, Clone, PartialEq)]
pub enum PluginSetting {
    Enabled(PluginConfig),
    /// `false`: switch off a plugin that would otherwise be inherited
    Disabled,
}

impl<'de> Deserialize<'de> for PluginSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(true) | Value::Null => Ok(PluginSetting::Enabled(PluginConfig::default())),
            Value::Bool(false) => Ok(PluginSetting::Disabled),
            value @ Value::Object(_) => PluginConfig::deserialize(value)
                .map(PluginSetting::Enabled)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "plugin setting must be true, false or a map of config, got {}",
                other
            ))),
        }
    }
}

impl Serialize for PluginSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PluginSetting::Enabled(config) => config.serialize(serializer),
            PluginSetting::Disabled => serializer.serialize_bool(false),
        }
    }
}

/// A `plugins:` map as written in configuration
pub type PluginMap = IndexMap<String, PluginSetting>;

// =============================================================================
// Pipeline
// =============================================================================

/// A plugin binding in execution order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortedPlugin<'a> {
    pub identifier: &'a str,
    pub config: &'a PluginConfig,
}

/// The plugin bindings attached to one construct
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginPipeline {
    bindings: IndexMap<String, PluginConfig>,
    /// Identifiers explicitly switched off with `false`
    disabled: IndexSet<String>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pipeline from a configured plugin map
    pub fn from_map(plugins: &PluginMap) -> Self {
        let mut pipeline = Self::new();
        pipeline.set_plugins(plugins);
        pipeline
    }

    /// Replace every binding with the given map
    pub fn set_plugins(&mut self, plugins: &PluginMap) -> &mut Self {
        self.bindings.clear();
        self.disabled.clear();
        for (identifier, setting) in plugins {
            match setting {
                PluginSetting::Enabled(config) => {
                    self.bindings.insert(identifier.clone(), config.clone());
                }
                PluginSetting::Disabled => {
                    self.disabled.insert(identifier.clone());
                }
            }
        }
        self
    }

    /// Combine with existing bindings, deep-merging configs under matching identifiers
    pub fn merge_plugins(&mut self, plugins: &PluginMap) -> &mut Self {
        for (identifier, setting) in plugins {
            match setting {
                PluginSetting::Enabled(config) => self.merge_binding(identifier, config),
                PluginSetting::Disabled => {
                    self.bindings.shift_remove(identifier);
                    self.disabled.insert(identifier.clone());
                }
            }
        }
        self
    }

    /// Merge another pipeline into this one, `other` winning on conflicts
    pub fn merge(&mut self, other: &PluginPipeline) {
        for (identifier, config) in &other.bindings {
            self.merge_binding(identifier, config);
        }
        for identifier in &other.disabled {
            self.bindings.shift_remove(identifier);
            self.disabled.insert(identifier.clone());
        }
    }

    fn merge_binding(&mut self, identifier: &str, config: &PluginConfig) {
        self.disabled.shift_remove(identifier);
        match self.bindings.get_mut(identifier) {
            Some(existing) => existing.merge(config),
            None => {
                self.bindings.insert(identifier.to_string(), config.clone());
            }
        }
    }

    /// Fill in default plugins the construct has not configured itself
    ///
    /// Explicit bindings keep their config and explicit `false` entries keep
    /// the default switched off. Defaults run ahead of explicit bindings
    /// unless constrained otherwise.
    pub fn apply_defaults(&mut self, defaults: &PluginMap) -> &mut Self {
        let mut combined: IndexMap<String, PluginConfig> = IndexMap::new();
        for (identifier, setting) in defaults {
            if self.disabled.contains(identifier) || self.bindings.contains_key(identifier) {
                continue;
            }
            if let PluginSetting::Enabled(config) = setting {
                combined.insert(identifier.clone(), config.clone());
            }
        }
        combined.extend(self.bindings.drain(..));
        self.bindings = combined;
        self
    }

    pub fn add_plugin(&mut self, identifier: impl Into<String>, config: PluginConfig) -> &mut Self {
        let identifier = identifier.into();
        self.disabled.shift_remove(&identifier);
        self.bindings.insert(identifier, config);
        self
    }

    pub fn remove_plugin(&mut self, identifier: &str) -> &mut Self {
        self.bindings.shift_remove(identifier);
        self
    }

    pub fn get(&self, identifier: &str) -> Option<&PluginConfig> {
        self.bindings.get(identifier)
    }

    pub fn has_plugin(&self, identifier: &str) -> bool {
        self.bindings.contains_key(identifier)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Identifiers in declaration order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Bindings in execution order
    pub fn sorted_plugins(&self) -> Result<Vec<SortedPlugin<'_>>, DependencyError> {
        let mut head = Vec::new();
        let mut tail = Vec::new();
        let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(self.bindings.len(), 0);
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::with_capacity(self.bindings.len());

        for (identifier, config) in &self.bindings {
            // Plugins switched off with `false` still count as siblings
            for reference in config.before.plugins().iter().chain(config.after.plugins()) {
                if !self.bindings.contains_key(reference) && !self.disabled.contains(reference) {
                    return Err(DependencyError::UnresolvedReference {
                        plugin: identifier.clone(),
                        reference: reference.clone(),
                    });
                }
            }
            let conflict = match (&config.before, &config.after) {
                (Constraint::All, Constraint::All) => Some(("before", ALL_PLUGINS.to_string())),
                (Constraint::All, Constraint::Plugins(names)) => Some(("before", names.join(", "))),
                (Constraint::Plugins(names), Constraint::All) => Some(("after", names.join(", "))),
                _ => None,
            };
            if let Some((bucket, reference)) = conflict {
                return Err(DependencyError::ConflictingConstraints {
                    plugin: identifier.clone(),
                    bucket,
                    reference,
                });
            }
            if config.before.is_all() {
                head.push(identifier.as_str());
            } else if config.after.is_all() {
                tail.push(identifier.as_str());
            } else {
                nodes.insert(identifier.as_str(), graph.add_node(identifier.as_str()));
            }
        }

        // Edges point from a plugin to the plugins that must run after it.
        // Constraints against bucketed plugins are already satisfied by the buckets.
        for (identifier, config) in &self.bindings {
            let Some(&node) = nodes.get(identifier.as_str()) else {
                continue;
            };
            for dependency in config.after.plugins() {
                if let Some(&dep) = nodes.get(dependency.as_str()) {
                    graph.add_edge(dep, node, ());
                }
            }
            for dependant in config.before.plugins() {
                if let Some(&dep) = nodes.get(dependant.as_str()) {
                    graph.add_edge(node, dep, ());
                }
            }
        }

        let middle = kahn_sort(&graph)?;

        Ok(head
            .into_iter()
            .chain(middle)
            .chain(tail)
            .filter_map(|identifier| {
                self.bindings
                    .get_key_value(identifier)
                    .map(|(identifier, config)| SortedPlugin {
                        identifier: identifier.as_str(),
                        config,
                    })
            })
            .collect())
    }
}

impl Serialize for PluginPipeline {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.bindings.serialize(serializer)
    }
}

/// Topological sort that always picks the earliest-declared ready node
fn kahn_sort<'a>(graph: &DiGraph<&'a str, ()>) -> Result<Vec<&'a str>, DependencyError> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors_directed(node, Direction::Incoming).count())
        .collect();
    let mut ready: BTreeSet<NodeIndex> = graph
        .node_indices()
        .filter(|node| in_degree[node.index()] == 0)
        .collect();
    let mut sorted = Vec::with_capacity(graph.node_count());

    while let Some(node) = ready.pop_first() {
        sorted.push(graph[node]);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.insert(next);
            }
        }
    }

    if sorted.len() < graph.node_count() {
        return Err(DependencyError::Circular(cycle_members(graph)));
    }
    Ok(sorted)
}

/// Plugins taking part in a cycle, in declaration order
fn cycle_members(graph: &DiGraph<&str, ()>) -> Vec<String> {
    let mut members: Vec<NodeIndex> = kosaraju_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .collect();
    members.sort();
    members.into_iter().map(|node| graph[node].to_string()).collect()
}
