//! Type references: `Name`, `[Name]`, `Name!`, `[Name!]!`

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A possibly wrapped reference to a named type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        match inner {
            already @ TypeRef::NonNull(_) => already,
            other => TypeRef::NonNull(Box::new(other)),
        }
    }

    /// The innermost named type
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// Error parsing a type reference string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefParseError(String);

impl fmt::Display for TypeRefParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid type reference \"{}\"", self.0)
    }
}

impl std::error::Error for TypeRefParseError {}

impl FromStr for TypeRef {
    type Err = TypeRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || TypeRefParseError(s.to_string());

        if let Some(inner) = trimmed.strip_suffix('!') {
            let inner: TypeRef = inner.parse().map_err(|_| invalid())?;
            if inner.is_non_null() {
                return Err(invalid());
            }
            return Ok(TypeRef::NonNull(Box::new(inner)));
        }
        if let Some(inner) = trimmed.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(invalid)?;
            return Ok(TypeRef::list(inner.parse().map_err(|_| invalid())?));
        }
        if crate::naming::is_valid_name(trimmed) {
            Ok(TypeRef::Named(trimmed.to_string()))
        } else {
            Err(invalid())
        }
    }
}

impl<'de> Deserialize<'de> for TypeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
