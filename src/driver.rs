//! Linear benchmark pass for one adapter:
//! prepare schema, timed bulk insert, timed recency query, footprint, report.

use crate::adapter::{RecencyQuery, StorageAdapter};
use crate::error::BenchError;
use crate::reading::Reading;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Connection setup done by the caller before handing the adapter over.
    Connect,
    PrepareSchema,
    BulkInsert,
    QueryRecent,
    Footprint,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connect => "connect",
            Stage::PrepareSchema => "prepare schema",
            Stage::BulkInsert => "bulk insert",
            Stage::QueryRecent => "recency query",
            Stage::Footprint => "footprint query",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{backend}: {stage} failed: {source}")]
pub struct StageFailure {
    pub backend: &'static str,
    pub stage: Stage,
    #[source]
    pub source: BenchError,
}

/// Outcome of one backend pass. Lives only until it is printed.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub backend: &'static str,
    pub rows_inserted: usize,
    pub insert_elapsed: Duration,
    pub query: RecencyQuery,
    pub query_elapsed: Duration,
    pub matched: Vec<Reading>,
    /// `None` when the backend cannot report its size.
    pub footprint_bytes: Option<u64>,
}

impl BenchmarkResult {
    pub fn rows_matched(&self) -> usize {
        self.matched.len()
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = self.backend;
        writeln!(
            f,
            "[{backend}] Time to insert {} rows: {:?}",
            self.rows_inserted, self.insert_elapsed
        )?;
        writeln!(
            f,
            "[{backend}] Time to fetch {} rows: {:?}",
            self.rows_matched(),
            self.query_elapsed
        )?;
        writeln!(
            f,
            "[{backend}] Latest data for asset id {}, asset type '{}', metric type '{}' within {:?}:",
            self.query.asset_id, self.query.asset_type, self.query.metric_type, self.query.window
        )?;
        for reading in &self.matched {
            writeln!(f, "    {}", reading.summary())?;
        }
        match self.footprint_bytes {
            Some(bytes) => write!(f, "[{backend}] Storage size: {bytes} bytes"),
            None => write!(f, "[{backend}] Storage size: unknown"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchmarkDriver {
    query: RecencyQuery,
    stage_timeout: Option<Duration>,
}

impl BenchmarkDriver {
    pub fn new(query: RecencyQuery) -> Self {
        Self {
            query,
            stage_timeout: None,
        }
    }

    /// Bounds every stage; a stage that overruns fails the run with `Timeout`.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub async fn run<A: StorageAdapter>(
        &self,
        adapter: &A,
        readings: &[Reading],
    ) -> Result<BenchmarkResult, StageFailure> {
        let backend = adapter.name();
        tracing::info!(backend, rows = readings.len(), "starting benchmark pass");

        self.stage(backend, Stage::PrepareSchema, adapter.prepare_schema())
            .await?;

        let insert_elapsed = self
            .stage(backend, Stage::BulkInsert, adapter.bulk_insert(readings))
            .await?;
        tracing::info!(
            backend,
            rows = readings.len(),
            elapsed_ms = insert_elapsed.as_secs_f64() * 1000.0,
            "bulk insert committed"
        );

        let outcome = self
            .stage(backend, Stage::QueryRecent, adapter.query_recent(&self.query))
            .await?;
        tracing::info!(
            backend,
            rows = outcome.readings.len(),
            elapsed_ms = outcome.elapsed.as_secs_f64() * 1000.0,
            "recency query returned"
        );

        let footprint_bytes = match self
            .stage(backend, Stage::Footprint, adapter.footprint_bytes())
            .await
        {
            Ok(bytes) => Some(bytes),
            Err(failure) if !failure.source.is_fatal() => {
                tracing::warn!(backend, error = %failure.source, "storage footprint unknown");
                None
            }
            Err(failure) => return Err(failure),
        };

        Ok(BenchmarkResult {
            backend,
            rows_inserted: readings.len(),
            insert_elapsed,
            query: self.query.clone(),
            query_elapsed: outcome.elapsed,
            matched: outcome.readings,
            footprint_bytes,
        })
    }

    async fn stage<T>(
        &self,
        backend: &'static str,
        stage: Stage,
        work: impl Future<Output = Result<T, BenchError>>,
    ) -> Result<T, StageFailure> {
        let span = tracing::info_span!("stage", backend, stage = %stage);
        let result = match self.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, work.instrument(span)).await {
                Ok(result) => result,
                Err(_) => Err(BenchError::Timeout {
                    stage: stage.to_string(),
                    after: limit,
                }),
            },
            None => work.instrument(span).await,
        };
        result.map_err(|source| StageFailure {
            backend,
            stage,
            source,
        })
    }
}
