//! Plugin application
//!
//! Runs in two phases. Phase one invokes the configured builders, then every
//! distinct [`SchemaUpdater`](super::SchemaUpdater) bound anywhere in the
//! schema, each once. Phase two walks the constructs and applies each bound
//! plugin's capability for that kind of construct, in pipeline order.

use indexmap::IndexSet;
use std::time::Instant;
use tracing::{debug, info};

use super::{Capability, CapabilityKind, Plugin, PluginConfig, PluginContext, PluginPipeline, PluginRegistry};
use crate::error::{Result, SchemaError};
use crate::schema::{Schema, MUTATION_TYPE, QUERY_TYPE};

const TYPE_KINDS: [CapabilityKind; 1] = [CapabilityKind::Type];
const MODEL_KINDS: [CapabilityKind; 1] = [CapabilityKind::Model];
const QUERY_KINDS: [CapabilityKind; 2] = [CapabilityKind::Field, CapabilityKind::Query];
const MUTATION_KINDS: [CapabilityKind; 2] = [CapabilityKind::Field, CapabilityKind::Mutation];
const FIELD_KINDS: [CapabilityKind; 1] = [CapabilityKind::Field];

/// Run both plugin phases over `schema`
pub fn apply_plugins(schema: &mut Schema, registry: &PluginRegistry, builders: &[String]) -> Result<()> {
    let start = Instant::now();
    let updaters = run_schema_updaters(schema, registry, builders)?;
    apply_construct_plugins(schema, registry)?;
    info!(
        schema = schema.schema_key(),
        updaters,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Applied plugins"
    );
    Ok(())
}

fn lookup<'r>(registry: &'r PluginRegistry, identifier: &str) -> Result<&'r Plugin> {
    registry
        .get(identifier)
        .ok_or_else(|| SchemaError::builder(format!("Plugin {} not found", identifier)))
}

fn wrap(plugin: &str, construct: &str, source: SchemaError) -> SchemaError {
    SchemaError::PluginApplication {
        plugin: plugin.to_string(),
        construct: construct.to_string(),
        source: Box::new(source),
    }
}

// =============================================================================
// Phase one
// =============================================================================

/// Every plugin pipeline in the schema with the construct it belongs to
fn pipelines(schema: &Schema) -> Vec<(String, &PluginPipeline)> {
    let mut pipelines = Vec::new();
    for ty in schema.types.values() {
        pipelines.push((ty.name.clone(), &ty.plugins));
        for field in ty.fields.values() {
            pipelines.push((format!("{}.{}", ty.name, field.name), &field.plugins));
        }
    }
    for model in schema.models.values() {
        pipelines.push((model.name().to_string(), model.plugins()));
        for field in model.fields() {
            pipelines.push((format!("{}.{}", model.name(), field.name), &field.plugins));
        }
    }
    for interface in schema.interfaces.values() {
        pipelines.push((interface.name.clone(), &interface.plugins));
        for field in interface.fields.values() {
            pipelines.push((format!("{}.{}", interface.name, field.name), &field.plugins));
        }
    }
    for union in schema.unions.values() {
        pipelines.push((union.name.clone(), &union.plugins));
    }
    for field in schema.queries.values() {
        pipelines.push((format!("{}.{}", QUERY_TYPE, field.name), &field.plugins));
    }
    for field in schema.mutations.values() {
        pipelines.push((format!("{}.{}", MUTATION_TYPE, field.name), &field.plugins));
    }
    pipelines
}

/// Run builders, then each bound schema updater once; returns how many ran
fn run_schema_updaters(
    schema: &mut Schema,
    registry: &PluginRegistry,
    builders: &[String],
) -> Result<usize> {
    let mut seen: IndexSet<String> = IndexSet::new();

    for identifier in builders {
        let plugin = registry.get(identifier).ok_or_else(|| {
            SchemaError::builder(format!("The schema builder {} is not registered", identifier))
        })?;
        let updater = plugin.schema_updater().ok_or_else(|| {
            SchemaError::builder(format!("The schema builder {} is not a schema updater", identifier))
        })?;
        if seen.insert(identifier.clone()) {
            debug!(builder = %identifier, "Running schema builder");
            updater
                .update_schema(schema)
                .map_err(|e| wrap(identifier, schema.schema_key(), e))?;
        }
    }

    let mut discovered = Vec::new();
    for (construct, pipeline) in pipelines(schema) {
        for sorted in pipeline.sorted_plugins()? {
            let plugin = lookup(registry, sorted.identifier).map_err(|e| wrap(sorted.identifier, &construct, e))?;
            if let Some(updater) = plugin.schema_updater() {
                if seen.insert(sorted.identifier.to_string()) {
                    discovered.push((sorted.identifier.to_string(), updater.clone()));
                }
            }
        }
    }

    for (identifier, updater) in &discovered {
        debug!(plugin = %identifier, "Running schema updater");
        updater
            .update_schema(schema)
            .map_err(|e| wrap(identifier, schema.schema_key(), e))?;
    }
    Ok(seen.len())
}

// =============================================================================
// Phase two
// =============================================================================

fn known_names(schema: &Schema) -> IndexSet<String> {
    schema
        .types
        .keys()
        .chain(schema.models.keys())
        .chain(schema.interfaces.keys())
        .chain(schema.unions.keys())
        .chain(schema.enums.keys())
        .chain(schema.scalars.keys())
        .cloned()
        .collect()
}

/// Apply one pipeline to one construct, invoking the first matching capability of each plugin
fn run_pipeline<T>(
    registry: &PluginRegistry,
    pipeline: &PluginPipeline,
    kinds: &[CapabilityKind],
    target: &mut T,
    ctx: &mut PluginContext<'_>,
    invoke: impl Fn(&Capability, &mut T, &PluginConfig, &mut PluginContext<'_>) -> Option<Result<()>>,
) -> Result<()> {
    for sorted in pipeline.sorted_plugins()? {
        let plugin = lookup(registry, sorted.identifier)?;
        let Some(capability) = plugin.capability(kinds) else {
            debug!(plugin = sorted.identifier, construct = ctx.construct(), "No matching capability");
            continue;
        };
        if let Some(result) = invoke(capability, target, sorted.config, ctx) {
            result.map_err(|e| wrap(sorted.identifier, ctx.construct(), e))?;
            debug!(plugin = sorted.identifier, construct = ctx.construct(), "Applied plugin");
        }
    }
    Ok(())
}

fn apply_field_capability(
    capability: &Capability,
    field: &mut crate::schema::Field,
    config: &PluginConfig,
    ctx: &mut PluginContext<'_>,
) -> Option<Result<()>> {
    match capability {
        Capability::Field(plugin) | Capability::Query(plugin) | Capability::Mutation(plugin) => {
            Some(plugin.apply(field, config, ctx))
        }
        _ => None,
    }
}

/// Phase two over types, models, root fields, then type and model fields
///
/// Interfaces and unions are not visited here. Plugins bound to them only
/// take effect as schema updaters in phase one.
fn apply_construct_plugins(schema: &mut Schema, registry: &PluginRegistry) -> Result<()> {
    let schema_key = schema.schema_key().to_string();

    // Types
    let known = known_names(schema);
    let names: Vec<String> = schema.types.keys().cloned().collect();
    for name in &names {
        let Some(ty) = schema.types.get_mut(name) else { continue };
        let pipeline = ty.plugins.clone();
        let mut ctx = PluginContext::new(&schema_key, name.clone(), &known);
        run_pipeline(registry, &pipeline, &TYPE_KINDS, ty, &mut ctx, |capability, ty, config, ctx| {
            match capability {
                Capability::Type(plugin) => Some(plugin.apply(ty, config, ctx)),
                _ => None,
            }
        })?;
        for pending in ctx.into_pending_types() {
            schema.add_type(pending);
        }
    }

    // Models
    let known = known_names(schema);
    let names: Vec<String> = schema.models.keys().cloned().collect();
    for name in &names {
        let Some(model) = schema.models.get_mut(name) else { continue };
        let pipeline = model.plugins().clone();
        let mut ctx = PluginContext::new(&schema_key, name.clone(), &known);
        run_pipeline(registry, &pipeline, &MODEL_KINDS, model, &mut ctx, |capability, model, config, ctx| {
            match capability {
                Capability::Model(plugin) => Some(plugin.apply(model, config, ctx)),
                _ => None,
            }
        })?;
        for pending in ctx.into_pending_types() {
            schema.add_type(pending);
        }
    }

    // Root fields
    for (root, kinds) in [(QUERY_TYPE, &QUERY_KINDS), (MUTATION_TYPE, &MUTATION_KINDS)] {
        let known = known_names(schema);
        let fields = if root == QUERY_TYPE { &schema.queries } else { &schema.mutations };
        let names: Vec<String> = fields.keys().cloned().collect();
        for name in &names {
            let fields = if root == QUERY_TYPE { &mut schema.queries } else { &mut schema.mutations };
            let Some(field) = fields.get_mut(name) else { continue };
            let pipeline = field.plugins.clone();
            let mut ctx = PluginContext::new(&schema_key, format!("{}.{}", root, name), &known);
            run_pipeline(registry, &pipeline, kinds, field, &mut ctx, apply_field_capability)?;
            for pending in ctx.into_pending_types() {
                schema.add_type(pending);
            }
        }
    }

    // Fields of types
    let known = known_names(schema);
    let plugged: Vec<(String, String)> = schema
        .types
        .values()
        .flat_map(|ty| {
            ty.fields
                .values()
                .filter(|field| !field.plugins.is_empty())
                .map(move |field| (ty.name.clone(), field.name.clone()))
        })
        .collect();
    for (type_name, field_name) in &plugged {
        let Some(field) = schema
            .types
            .get_mut(type_name)
            .and_then(|ty| ty.field_mut(field_name))
        else {
            continue;
        };
        let pipeline = field.plugins.clone();
        let mut ctx = PluginContext::new(&schema_key, format!("{}.{}", type_name, field_name), &known);
        run_pipeline(registry, &pipeline, &FIELD_KINDS, field, &mut ctx, apply_field_capability)?;
        for pending in ctx.into_pending_types() {
            schema.add_type(pending);
        }
    }

    // Fields of models
    let known = known_names(schema);
    let plugged: Vec<(String, String)> = schema
        .models
        .values()
        .flat_map(|model| {
            model
                .fields()
                .filter(|field| !field.plugins.is_empty())
                .map(move |field| (model.name().to_string(), field.name.clone()))
        })
        .collect();
    for (model_name, field_name) in &plugged {
        let Some(field) = schema
            .models
            .get_mut(model_name)
            .and_then(|model| model.field_mut(field_name))
        else {
            continue;
        };
        let pipeline = field.plugins.clone();
        let mut ctx = PluginContext::new(&schema_key, format!("{}.{}", model_name, field_name), &known);
        run_pipeline(registry, &pipeline, &FIELD_KINDS, field, &mut ctx, apply_field_capability)?;
        for pending in ctx.into_pending_types() {
            schema.add_type(pending);
        }
    }

    Ok(())
}
