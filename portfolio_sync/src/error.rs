//! Error types of the sync crate.

use std::path::PathBuf;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// The reference file could not be turned into rows.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("reference file is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("failed to read reference file {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Failures talking to the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open store at {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: diesel::ConnectionError,
    },

    #[error("schema setup failed: {source}")]
    Schema {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Query(#[from] DieselError),
}

impl StoreError {
    /// Whether the failure is confined to the rows being written (a constraint the
    /// conflict clause does not cover) rather than a broken store or schema.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StoreError::Query(DieselError::DatabaseError(kind, _)) => matches!(
                kind,
                DatabaseErrorKind::UniqueViolation
                    | DatabaseErrorKind::ForeignKeyViolation
                    | DatabaseErrorKind::NotNullViolation
                    | DatabaseErrorKind::CheckViolation
            ),
            _ => false,
        }
    }

    pub(crate) fn into_schema(self) -> StoreError {
        match self {
            StoreError::Schema { .. } => self,
            other => StoreError::Schema {
                source: Box::new(other),
            },
        }
    }
}

/// Conditions that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no usable reference data in {}", .0.display())]
    EmptyReference(PathBuf),

    #[error("no price series could be fetched for {attempted} symbols")]
    NoPriceData { attempted: usize },

    #[error("run interrupted before completion")]
    Interrupted,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("store stage ended abnormally")]
    StoreTask(#[from] tokio::task::JoinError),
}
