use std::time::Duration;

/// Failures an adapter or the dataset layer can report.
///
/// Every variant except `FootprintUnavailable` ends the current backend's run.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("backend unreachable: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("schema error on '{structure}': {message}")]
    Schema { structure: String, message: String },

    #[error("invalid payload: {0}")]
    Serialization(String),

    #[error("bulk insert failed ({} of {total} readings not committed): {message}", .uncommitted.len())]
    Transfer {
        message: String,
        total: usize,
        /// Batch indices that were not persisted.
        uncommitted: Vec<usize>,
    },

    #[error("recency query failed: {0}")]
    Query(String),

    #[error("footprint unavailable: {0}")]
    FootprintUnavailable(String),

    #[error("{stage} did not finish within {after:?}")]
    Timeout { stage: String, after: Duration },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BenchError {
    pub fn connection(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connection {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn schema(structure: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            structure: structure.into(),
            message: message.into(),
        }
    }

    /// A failed relational COPY/INSERT: the transaction is gone, so nothing was kept.
    pub fn rolled_back(total: usize, message: impl Into<String>) -> Self {
        Self::Transfer {
            message: message.into(),
            total,
            uncommitted: (0..total).collect(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FootprintUnavailable(_))
    }
}

/// Maps driver errors that mean "could not talk to the server" onto `Connection`,
/// everything else onto the category the caller chose.
pub(crate) fn classify_sqlx(
    err: sqlx::Error,
    otherwise: impl FnOnce(sqlx::Error) -> BenchError,
) -> BenchError {
    let unreachable = matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_)
    );
    if unreachable {
        BenchError::connection(err)
    } else {
        otherwise(err)
    }
}

pub(crate) fn classify_mongo(
    err: mongodb::error::Error,
    otherwise: impl FnOnce(mongodb::error::Error) -> BenchError,
) -> BenchError {
    use mongodb::error::ErrorKind;
    let unreachable = matches!(
        err.kind.as_ref(),
        ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Authentication { .. }
    );
    if unreachable {
        BenchError::connection(err)
    } else {
        otherwise(err)
    }
}
