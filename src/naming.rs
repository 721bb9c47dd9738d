//! Naming helpers
//!
//! GraphQL name validation plus the small set of transformations used when
//! generating operation and input type names.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Result, SchemaError};

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("static name pattern"));

/// Built-in scalar types every schema can reference
pub const INTERNAL_TYPES: [&str; 5] = ["String", "Boolean", "Int", "Float", "ID"];

/// Check a construct name against the GraphQL name grammar
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Fail with a config error if `name` is not a valid GraphQL name
pub fn assert_valid_name(name: &str, path: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(SchemaError::config(
            path,
            format!(
                "Invalid name: {}. Names must only use underscores and alphanumeric characters, and cannot begin with a number.",
                name
            ),
        ))
    }
}

/// Whether `name` is one of the built-in scalars
pub fn is_internal_type(name: &str) -> bool {
    INTERNAL_TYPES.contains(&name)
}

/// Uppercase the first character
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Pluralise a type name: consonant + y becomes "ies", everything else gains an "s"
pub fn pluralise(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let mut chars = lower.chars().rev();
    let ends_in_consonant_y = matches!(
        (chars.next(), chars.next()),
        (Some('y'), Some(c)) if !"aeiou".contains(c)
    );
    if ends_in_consonant_y {
        format!("{}ies", &name[..name.len() - 1])
    } else {
        format!("{}s", name)
    }
}

/// Derive a type name from a source class identifier
///
/// `App\Model\BlogPost`, `app.model.BlogPost` and `app::model::BlogPost` all
/// become `BlogPost`.
pub fn type_name_for_class(class: &str) -> String {
    let short = class
        .rsplit(|c| c == '\\' || c == '.' || c == ':')
        .find(|segment| !segment.is_empty())
        .unwrap_or(class);
    ucfirst(short)
}
