//! Type code registry
//!
//! Fixed after startup. An unknown code is a `FetchError::UnknownType`, never
//! a panic.

use std::collections::HashMap;
use std::fmt;

use crate::{FetchError, Result};

/// Which numeric sequence to fetch. Semantics are owned by the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Prime,
    Fibonacci,
    Even,
    Random,
}

impl TypeCode {
    pub const ALL: [TypeCode; 4] = [
        TypeCode::Prime,
        TypeCode::Fibonacci,
        TypeCode::Even,
        TypeCode::Random,
    ];

    /// Parse the path segment of `/numbers/{typeCode}`. Exactly one of
    /// `p`, `f`, `e`, `r`; case-sensitive.
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "p" => Some(TypeCode::Prime),
            "f" => Some(TypeCode::Fibonacci),
            "e" => Some(TypeCode::Even),
            "r" => Some(TypeCode::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCode::Prime => "p",
            TypeCode::Fibonacci => "f",
            TypeCode::Even => "e",
            TypeCode::Random => "r",
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable mapping from type code to endpoint URL.
#[derive(Debug, Clone)]
pub struct UpstreamTypeRegistry {
    endpoints: HashMap<TypeCode, String>,
}

impl UpstreamTypeRegistry {
    pub fn new(endpoints: impl IntoIterator<Item = (TypeCode, String)>) -> Self {
        Self {
            endpoints: endpoints.into_iter().collect(),
        }
    }

    /// Resolve a raw path segment to its code and endpoint.
    pub fn resolve(&self, code: &str) -> Result<(TypeCode, &str)> {
        let type_code =
            TypeCode::parse(code).ok_or_else(|| FetchError::UnknownType(code.to_string()))?;
        let endpoint = self
            .endpoints
            .get(&type_code)
            .ok_or_else(|| FetchError::UnknownType(code.to_string()))?;
        Ok((type_code, endpoint.as_str()))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
