//! End-to-end assembly tests
//!
//! Builds schemas from the fixtures under `tests/fixtures/`: a model catalog
//! and a directory of YAML config fragments.

use schema_assembler::config::{SchemaSettings, SourceSetting};
use schema_assembler::definition::SchemaConfig;
use schema_assembler::model::EXTENSION_FIELD;
use schema_assembler::plugin::{
    FieldPlugin, PluginConfig, PluginContext, PluginMap, SchemaUpdater,
};
use schema_assembler::schema::{Argument, Field, ScalarType, MUTATION_TYPE, QUERY_TYPE};
use schema_assembler::{
    AssembledSchema, AssemblerSettings, Capability, ConfigLoader, ConfigSource, DependencyError,
    FileSchemaStorage, ModelCatalog, Plugin, PluginPipeline, PluginRegistry, Result, Schema,
    SchemaBuilder, SchemaError, SchemaStorage, TypeRef,
};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn catalog() -> ModelCatalog {
    ModelCatalog::from_path(&fixture("catalog.json")).unwrap()
}

/// Adds `limit` and `offset` arguments to list fields
struct Paginate;

impl FieldPlugin for Paginate {
    fn apply(&self, field: &mut Field, config: &PluginConfig, _: &mut PluginContext<'_>) -> Result<()> {
        let limit = config.option("limit").cloned().unwrap_or(json!(100));
        let mut arg = Argument::new("limit", TypeRef::named("Int"));
        arg.default_value = Some(limit);
        field.add_arg(arg);
        field.add_arg(Argument::new("offset", TypeRef::named("Int")));
        Ok(())
    }
}

struct Dates;

impl SchemaUpdater for Dates {
    fn update_schema(&self, schema: &mut Schema) -> Result<()> {
        schema.add_scalar(ScalarType::new("DateTime"));
        Ok(())
    }
}

fn registry() -> PluginRegistry {
    PluginRegistry::new()
        .with_plugin(Plugin::new("paginate").with_capability(Capability::Query(Arc::new(Paginate))))
        .with_plugin(Plugin::new("dates").with_capability(Capability::SchemaUpdater(Arc::new(Dates))))
}

fn fixture_config() -> SchemaConfig {
    ConfigLoader::new("default")
        .with_schema_source(ConfigSource::Directory(fixture("graphql")))
        .with_inline(json!({"builders": ["dates"]}))
        .load()
        .unwrap()
}

fn build_fixture() -> AssembledSchema {
    let catalog = catalog();
    let registry = registry();
    SchemaBuilder::new("default", &catalog, &registry)
        .build(&fixture_config())
        .unwrap()
}

fn names<'a>(iter: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    iter.collect()
}

// =============================================================================
// Config loading
// =============================================================================

#[test]
fn test_hidden_fragments_are_skipped() {
    let tree = ConfigLoader::new("default")
        .with_schema_source(ConfigSource::Directory(fixture("graphql")))
        .load_tree()
        .unwrap();
    assert!(tree["types"]["Stats"].is_object());
    assert!(tree.get("ignored").is_none());
    assert!(tree.get(".ignored").is_none());
}

#[test]
fn test_nested_fragment_cannot_redeclare_schema_key() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("models")).unwrap();
    fs::write(
        dir.path().join("models").join("blog.yml"),
        "default:\n  Article:\n    fields: \"*\"\n",
    )
    .unwrap();

    let err = ConfigLoader::new("default")
        .with_schema_source(ConfigSource::Directory(dir.path().to_path_buf()))
        .load_tree()
        .unwrap_err();
    match err {
        SchemaError::Config { path, message } => {
            assert!(path.ends_with("blog.yml"), "{}", path);
            assert!(message.contains("schema key \"default\""), "{}", message);
        }
        other => panic!("expected a config error, got {:?}", other),
    }
}

// =============================================================================
// Plugin ordering
// =============================================================================

fn pipeline(value: serde_json::Value) -> PluginPipeline {
    let map: PluginMap = serde_json::from_value(value).unwrap();
    PluginPipeline::from_map(&map)
}

#[test]
fn test_plugin_constraints_order_execution() {
    let pipeline = pipeline(json!({
        "p1": {"after": "p2"},
        "p2": {},
        "p3": {"before": "p1"},
    }));
    let order: Vec<&str> = pipeline
        .sorted_plugins()
        .unwrap()
        .iter()
        .map(|plugin| plugin.identifier)
        .collect();
    assert_eq!(order, vec!["p2", "p3", "p1"]);
}

#[test]
fn test_plugin_cycle_is_reported() {
    let pipeline = pipeline(json!({
        "p1": {"after": "p2"},
        "p2": {"after": "p1"},
    }));
    match pipeline.sorted_plugins() {
        Err(DependencyError::Circular(members)) => {
            assert!(members.contains(&"p1".to_string()));
            assert!(members.contains(&"p2".to_string()));
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
}

// =============================================================================
// Models
// =============================================================================

#[test]
fn test_leaf_model_brings_its_hierarchy() {
    let catalog = catalog();
    let registry = registry();
    let config = SchemaConfig::from_tree(&json!({
        "models": {"App\\Model\\NewsPage": {"fields": {"Source": true}}},
        "queries": {"ping": "String"},
    }))
    .unwrap();
    let assembled = SchemaBuilder::new("default", &catalog, &registry)
        .build(&config)
        .unwrap();
    let schema = &assembled.schema;

    for name in ["Page", "BlogPage", "NewsPage"] {
        assert!(schema.get_model(name).unwrap().has_field("ID"), "{} lacks ID", name);
    }
    let page = schema.get_model("Page").unwrap();
    assert_eq!(
        page.field(EXTENSION_FIELD).unwrap().type_ref,
        TypeRef::named("PageExtensionType")
    );
    let union = schema.get_union("PageExtensionType").unwrap();
    assert_eq!(
        names(union.types.iter().map(String::as_str)),
        vec!["BlogPage", "NewsPage"]
    );
}

#[test]
fn test_all_is_a_wildcard_alias() {
    let catalog = catalog();
    let registry = registry();
    let config = SchemaConfig::from_tree(&json!({
        "models": {"App\\Model\\Member": {"fields": "all", "operations": "all"}},
    }))
    .unwrap();
    let schema = SchemaBuilder::new("default", &catalog, &registry)
        .build(&config)
        .unwrap()
        .schema;

    let member = schema.get_model("Member").unwrap();
    assert_eq!(names(member.field_names()), vec!["ID", "Created"]);
    let query = schema.get_type(QUERY_TYPE).unwrap();
    assert_eq!(names(query.field_names()), vec!["readMembers"]);
}

#[test]
fn test_mutation_root_needs_a_mutation() {
    let catalog = catalog();
    let registry = registry();
    let config = SchemaConfig::from_tree(&json!({
        "models": {"App\\Model\\Article": {"fields": {"Title": true}, "operations": ["read"]}},
    }))
    .unwrap();
    let assembled = SchemaBuilder::new("default", &catalog, &registry)
        .build(&config)
        .unwrap();
    assert!(assembled.schema.get_type(MUTATION_TYPE).is_none());
    assert!(!assembled.sdl.contains("type Mutation"));
    assert!(assembled.sdl.contains("type Query"));
}

#[test]
fn test_wildcard_fields_skip_blacklist() {
    let schema = build_fixture().schema;
    let member = schema.get_model("Member").unwrap();
    assert_eq!(names(member.field_names()), vec!["ID", "Created"]);
}

// =============================================================================
// End to end
// =============================================================================

#[test]
fn test_fixture_schema() {
    let assembled = build_fixture();
    let schema = &assembled.schema;

    let article = schema.get_model("Article").unwrap();
    assert_eq!(names(article.field_names()), vec!["ID", "Title"]);

    let mutation = schema.get_type(MUTATION_TYPE).unwrap();
    let create = mutation.field("createArticle").unwrap();
    assert_eq!(create.args["input"].type_ref, "ArticleCreateInput!".parse::<TypeRef>().unwrap());
    let input = schema.get_type("ArticleCreateInput").unwrap();
    assert!(input.input);
    assert_eq!(names(input.field_names()), vec!["Title"]);

    let query = schema.get_type(QUERY_TYPE).unwrap();
    assert_eq!(names(query.field_names()), vec!["stats", "readArticles"]);
    let read = query.field("readArticles").unwrap();
    assert_eq!(read.type_ref, "[Article!]!".parse::<TypeRef>().unwrap());
    assert_eq!(read.args["limit"].default_value, Some(json!(50)));

    assert!(schema.get_scalar("DateTime").is_some());
    assert!(schema.get_scalar("Date").is_some());
    assert!(schema.get_enum("Status").is_some());
    assert!(assembled.sdl.contains("readArticles(limit: Int = 50, offset: Int): [Article!]!"));
    assert!(assembled.sdl.contains("union PageExtensionType = BlogPage | NewsPage"));
}

#[test]
fn test_rebuild_is_identical() {
    let first = build_fixture();
    let second = build_fixture();
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.sdl, second.sdl);
    assert_eq!(
        names(first.schema.models().map(|m| m.name())),
        names(second.schema.models().map(|m| m.name()))
    );
}

#[test]
fn test_persist_and_reload() {
    let dir = tempdir().unwrap();
    let mut storage = FileSchemaStorage::new(dir.path());
    let assembled = build_fixture();
    storage.persist_schema(&assembled).unwrap();

    let stored = storage.get_schema("default").unwrap().unwrap();
    assert_eq!(stored.fingerprint, assembled.fingerprint);
    assert_eq!(stored.sdl, assembled.sdl);
}

#[test]
fn test_settings_build_with_builtin_plugins() {
    let dir = tempdir().unwrap();
    let mut settings = AssemblerSettings::default();
    settings.build.output_dir = dir.path().join("out");
    settings.build.catalog = Some(fixture("catalog.json"));
    settings.schemas.insert(
        "default".to_string(),
        SchemaSettings {
            src: Some(SourceSetting::Path(fixture("graphql").display().to_string())),
            config: None,
        },
    );
    let path = dir.path().join("assembler.toml");
    settings.save(&path).unwrap();

    let settings = AssemblerSettings::load_from(Some(&path)).unwrap();
    let catalog = settings.catalog().unwrap();
    let registry = PluginRegistry::builtin();
    let assembled = settings.build_schema("default", &catalog, &registry).unwrap();

    let query = assembled.schema.get_type(QUERY_TYPE).unwrap();
    let read = query.field("readArticles").unwrap();
    assert_eq!(read.type_ref, "ArticleConnection!".parse::<TypeRef>().unwrap());
    assert_eq!(read.args["limit"].default_value, Some(json!(50)));
    for name in ["ArticleConnection", "ArticleEdge", "PageInfo"] {
        assert!(assembled.schema.get_type(name).is_some(), "{} missing", name);
    }
    assert!(assembled
        .sdl
        .contains("readArticles(limit: Int = 50, offset: Int = 0): ArticleConnection!"));

    let mut storage = FileSchemaStorage::new(settings.output_dir().unwrap());
    storage.persist_schema(&assembled).unwrap();
    let stored = storage.get_schema("default").unwrap().unwrap();
    assert_eq!(stored.fingerprint, assembled.fingerprint);
    assert!(dir.path().join("out").join("default").join("schema.graphql").exists());
}

#[test]
fn test_missing_builder_fails() {
    let catalog = catalog();
    let registry = PluginRegistry::new();
    let err = SchemaBuilder::new("default", &catalog, &registry)
        .build(&fixture_config())
        .unwrap_err();
    assert_eq!(err.to_string(), "The schema builder dates is not registered");
}
