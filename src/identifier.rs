//! Typed identifiers.
//!
//! Identifiers are indexed as strings next to the name of their type, so a
//! search can hand back `42_i64` rather than `"42"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SearchableError};

/// An identifier value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IdValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    Uuid(Uuid),
}

impl IdValue {
    /// The type recorded next to this value in the index.
    pub fn id_type(&self) -> IdType {
        match self {
            IdValue::Int(_) => IdType::I64,
            IdValue::UInt(_) => IdType::U64,
            IdValue::Float(_) => IdType::F64,
            IdValue::Bool(_) => IdType::Bool,
            IdValue::Str(_) => IdType::String,
            IdValue::Uuid(_) => IdType::Uuid,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            IdValue::Int(v) => Some(*v),
            IdValue::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            IdValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdValue::Int(v) => write!(f, "{v}"),
            IdValue::UInt(v) => write!(f, "{v}"),
            IdValue::Float(v) => write!(f, "{v}"),
            IdValue::Bool(v) => write!(f, "{v}"),
            IdValue::Str(v) => f.write_str(v),
            IdValue::Uuid(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for IdValue {
    fn from(v: i32) -> Self {
        IdValue::Int(v.into())
    }
}

impl From<i64> for IdValue {
    fn from(v: i64) -> Self {
        IdValue::Int(v)
    }
}

impl From<u64> for IdValue {
    fn from(v: u64) -> Self {
        IdValue::UInt(v)
    }
}

impl From<&str> for IdValue {
    fn from(v: &str) -> Self {
        IdValue::Str(v.to_string())
    }
}

impl From<String> for IdValue {
    fn from(v: String) -> Self {
        IdValue::Str(v)
    }
}

impl From<Uuid> for IdValue {
    fn from(v: Uuid) -> Self {
        IdValue::Uuid(v)
    }
}

/// The declared type of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdType {
    I32,
    I64,
    U64,
    F64,
    Bool,
    String,
    Uuid,
}

impl IdType {
    /// Name stored in the index.
    pub fn name(&self) -> &'static str {
        match self {
            IdType::I32 => "i32",
            IdType::I64 => "i64",
            IdType::U64 => "u64",
            IdType::F64 => "f64",
            IdType::Bool => "bool",
            IdType::String => "string",
            IdType::Uuid => "uuid",
        }
    }

    /// Resolve a stored type name; `None` for names this crate cannot convert into.
    pub fn resolve(name: &str) -> Option<IdType> {
        match name.trim() {
            "i32" | "integer" => Some(IdType::I32),
            "i64" | "long" => Some(IdType::I64),
            "u64" => Some(IdType::U64),
            "f64" | "double" => Some(IdType::F64),
            "bool" | "boolean" => Some(IdType::Bool),
            "string" | "str" => Some(IdType::String),
            "uuid" => Some(IdType::Uuid),
            _ => None,
        }
    }

    /// Convert a raw identifier into this type.
    ///
    /// Fails with [`SearchableError::Reconstruction`] when `raw` is not a
    /// valid value of the type.
    pub fn convert(&self, raw: &str) -> Result<IdValue> {
        let invalid = |e: Box<dyn std::error::Error + Send + Sync>| {
            SearchableError::reconstruction(
                format!("'{raw}' is not a valid {} identifier", self.name()),
                e,
            )
        };
        let trimmed = raw.trim();
        match self {
            IdType::I32 => i32::from_str(trimmed)
                .map(IdValue::from)
                .map_err(|e| invalid(e.into())),
            IdType::I64 => i64::from_str(trimmed)
                .map(IdValue::Int)
                .map_err(|e| invalid(e.into())),
            IdType::U64 => u64::from_str(trimmed)
                .map(IdValue::UInt)
                .map_err(|e| invalid(e.into())),
            IdType::F64 => f64::from_str(trimmed)
                .map(IdValue::Float)
                .map_err(|e| invalid(e.into())),
            IdType::Bool => bool::from_str(trimmed)
                .map(IdValue::Bool)
                .map_err(|e| invalid(e.into())),
            IdType::String => Ok(IdValue::Str(raw.to_string())),
            IdType::Uuid => Uuid::parse_str(trimmed)
                .map(IdValue::Uuid)
                .map_err(|e| invalid(e.into())),
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
