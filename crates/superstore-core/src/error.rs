use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Config,
    /// Connectivity: the waiter and any connection attempt that fails.
    Wait,
    Provision,
    Load,
    Normalize,
    Index,
    View,
    Verify,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Wait => "wait",
            Stage::Provision => "provision",
            Stage::Load => "load",
            Stage::Normalize => "normalize",
            Stage::Index => "index",
            Stage::View => "view",
            Stage::Verify => "verify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid identifier {name:?}: {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("failed to connect to database {database}: {source}")]
    Connect {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("database still unreachable after {attempts} attempts: {source}")]
    WaitExhausted {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("provisioning step '{step}' failed: {source}")]
    Provision {
        step: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error near line {line}: {source}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("CSV line {line} has {found} fields, expected {expected}")]
    MalformedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("load step '{step}' failed: {source}")]
    Load {
        step: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("normalization step '{step}' failed: {source}")]
    Normalize {
        step: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("reporting step '{step}' failed: {source}")]
    Reporting {
        step: String,
        stage: Stage,
        #[source]
        source: sqlx::Error,
    },

    #[error("verification failed: {0}")]
    Verification(String),
}

impl EtlError {
    /// The stage this error aborted.
    pub fn stage(&self) -> Stage {
        match self {
            EtlError::Config(_) | EtlError::InvalidIdentifier { .. } => Stage::Config,
            EtlError::Connect { .. } | EtlError::WaitExhausted { .. } => Stage::Wait,
            EtlError::Provision { .. } => Stage::Provision,
            EtlError::Io { .. }
            | EtlError::Csv { .. }
            | EtlError::MalformedRow { .. }
            | EtlError::Load { .. } => Stage::Load,
            EtlError::Normalize { .. } => Stage::Normalize,
            EtlError::Reporting { stage, .. } => *stage,
            EtlError::Verification(_) => Stage::Verify,
        }
    }

    /// The name of the individual step that failed, when one applies.
    pub fn step(&self) -> Option<&str> {
        match self {
            EtlError::Provision { step, .. }
            | EtlError::Load { step, .. }
            | EtlError::Normalize { step, .. }
            | EtlError::Reporting { step, .. } => Some(step.as_str()),
            _ => None,
        }
    }

    /// The underlying database error, if the failure came from the server.
    pub fn database_error(&self) -> Option<&(dyn sqlx::error::DatabaseError + 'static)> {
        match self {
            EtlError::Connect { source, .. }
            | EtlError::WaitExhausted { source, .. }
            | EtlError::Provision { source, .. }
            | EtlError::Load { source, .. }
            | EtlError::Normalize { source, .. }
            | EtlError::Reporting { source, .. } => source.as_database_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_report_their_stage_and_step() {
        let err = EtlError::Normalize {
            step: "primary key customers".into(),
            source: sqlx::Error::RowNotFound,
        };
        assert_eq!(err.stage(), Stage::Normalize);
        assert_eq!(err.step(), Some("primary key customers"));
        assert!(err.to_string().contains("primary key customers"));

        let err = EtlError::Reporting {
            step: "create view customer_category".into(),
            stage: Stage::View,
            source: sqlx::Error::RowNotFound,
        };
        assert_eq!(err.stage(), Stage::View);

        let err = EtlError::MalformedRow {
            line: 4,
            expected: 23,
            found: 22,
        };
        assert_eq!(err.stage(), Stage::Load);
        assert_eq!(err.step(), None);
        assert_eq!(err.to_string(), "CSV line 4 has 22 fields, expected 23");
    }

    #[test]
    fn stages_are_ordered_by_execution() {
        assert!(Stage::Wait < Stage::Provision);
        assert!(Stage::Load < Stage::Normalize);
        assert!(Stage::Normalize < Stage::Index);
        assert!(Stage::View < Stage::Verify);
    }
}
