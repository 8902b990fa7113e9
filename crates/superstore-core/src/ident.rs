//! SQL identifier validation.
//!
//! Identifiers cannot be bound as query parameters, so anything that ends up
//! spliced into DDL text goes through [`Identifier::parse`] first.

use std::fmt;

use crate::error::{EtlError, Result};

/// Postgres truncates identifiers longer than this (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Databases that must never be dropped by the provisioner.
pub const PROTECTED_DATABASES: &[&str] = &["postgres", "template0", "template1"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| EtlError::InvalidIdentifier {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = raw.chars();
        let Some(first) = chars.next() else {
            return Err(invalid("identifier is empty"));
        };
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(invalid("identifier is longer than 63 bytes"));
        }
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(invalid("must start with an ASCII letter or underscore"));
        }
        if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(invalid(&format!("contains disallowed character {bad:?}")));
        }

        Ok(Self(raw.to_string()))
    }

    /// Parses a database name that the provisioner is allowed to drop.
    pub fn parse_target_database(raw: &str, admin_database: &str) -> Result<Self> {
        let ident = Self::parse(raw)?;
        let lowered = ident.0.to_ascii_lowercase();
        if PROTECTED_DATABASES.contains(&lowered.as_str())
            || lowered == admin_database.to_ascii_lowercase()
        {
            return Err(EtlError::InvalidIdentifier {
                name: raw.to_string(),
                reason: "refusing to drop a system or administrative database".into(),
            });
        }
        Ok(ident)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for DDL. Validation guarantees there is nothing to escape.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
