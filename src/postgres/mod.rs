mod copy;


use crate::adapter::{QueryOutcome, RecencyQuery, StorageAdapter};
use crate::config::{validate_identifier, PostgresConfig, PostgresLoad};
use crate::error::{classify_sqlx, BenchError};
use crate::reading::{validate_batch, Reading};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::{Duration, Instant};

// Keeps each INSERT statement well under the 65535 bind-parameter limit.
const INSERT_CHUNK_ROWS: usize = 1_000;

/// (column, accepted udt_name values) in table order.
const EXPECTED_COLUMNS: [(&str, &[&str]); 6] = [
    ("timestamp", &["timestamptz"]),
    ("assetid", &["int8"]),
    ("assettype", &["varchar", "text"]),
    ("metrictype", &["varchar", "text"]),
    ("locations", &["_float8"]),
    ("values", &["_float8"]),
];

const COLUMN_LIST: &str =
    r#""timestamp", "assetid", "assettype", "metrictype", "locations", "values""#;

pub struct PostgresAdapter {
    pool: PgPool,
    table: String,
    load: PostgresLoad,
}

impl PostgresAdapter {
    /// Opens a single connection up front so an unreachable server fails the run
    /// before any stage starts.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, BenchError> {
        validate_identifier(&config.table)?;
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.database_url)
            .await
            .map_err(BenchError::connection)?;
        tracing::debug!(table = %config.table, "connected to postgres");
        Self::from_pool(pool, &config.table, config.load)
    }

    pub fn from_pool(pool: PgPool, table: &str, load: PostgresLoad) -> Result<Self, BenchError> {
        validate_identifier(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
            load,
        })
    }

    async fn check_columns(&self) -> Result<(), BenchError> {
        let rows = sqlx::query(
            r#"
            SELECT column_name::text AS column_name, udt_name::text AS udt_name
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = $1
            "#,
        )
        .bind(&self.table)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| classify_sqlx(err, |e| BenchError::schema(&self.table, e.to_string())))?;

        let mut actual = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("column_name")
                .map_err(|e| BenchError::schema(&self.table, e.to_string()))?;
            let udt: String = row
                .try_get("udt_name")
                .map_err(|e| BenchError::schema(&self.table, e.to_string()))?;
            actual.push((name, udt));
        }

        for (column, accepted) in EXPECTED_COLUMNS {
            match actual.iter().find(|(name, _)| name == column) {
                None => {
                    return Err(BenchError::schema(
                        &self.table,
                        format!("existing table has no column '{column}'"),
                    ))
                }
                Some((_, udt)) if !accepted.contains(&udt.as_str()) => {
                    return Err(BenchError::schema(
                        &self.table,
                        format!("column '{column}' has type {udt}, expected {accepted:?}"),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    async fn copy_batch(&self, readings: &[Reading]) -> Result<u64, sqlx::Error> {
        let statement = format!(
            r#"COPY "{}" ({COLUMN_LIST}) FROM STDIN"#,
            self.table
        );
        let mut tx = self.pool.begin().await?;
        let mut writer = tx.copy_in_raw(&statement).await?;
        for reading in readings {
            let sent = writer
                .send(copy::encode_row(reading).into_bytes())
                .await
                .map(|_| ());
            if let Err(err) = sent {
                let _ = writer.abort(err.to_string()).await;
                return Err(err);
            }
        }
        let rows = writer.finish().await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn insert_batch(&self, readings: &[Reading]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut rows = 0;
        for chunk in readings.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!(r#"INSERT INTO "{}" ({COLUMN_LIST}) "#, self.table));
            builder.push_values(chunk.iter(), |mut b, reading| {
                b.push_bind(reading.timestamp)
                    .push_bind(reading.asset_id)
                    .push_bind(&reading.asset_type)
                    .push_bind(&reading.metric_type)
                    .push_bind(&reading.locations)
                    .push_bind(&reading.values);
            });
            rows += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(rows)
    }
}

impl StorageAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn prepare_schema(&self) -> Result<(), BenchError> {
        let statement = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                "timestamp" TIMESTAMPTZ,
                "assetid" BIGINT,
                "assettype" VARCHAR(255),
                "metrictype" VARCHAR(255),
                "locations" FLOAT[],
                "values" FLOAT[]
            )
            "#,
            self.table
        );
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(|err| classify_sqlx(err, |e| BenchError::schema(&self.table, e.to_string())))?;
        self.check_columns().await
    }

    async fn bulk_insert(&self, readings: &[Reading]) -> Result<Duration, BenchError> {
        validate_batch(readings)?;
        let total = readings.len();

        let started = Instant::now();
        let result = match self.load {
            PostgresLoad::Copy => self.copy_batch(readings).await,
            PostgresLoad::Insert => self.insert_batch(readings).await,
        };
        let elapsed = started.elapsed();

        match result {
            Ok(rows) => {
                tracing::debug!(table = %self.table, rows, load = ?self.load, "committed batch");
                Ok(elapsed)
            }
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "bulk insert rolled back");
                Err(classify_sqlx(err, |e| BenchError::rolled_back(total, e.to_string())))
            }
        }
    }

    async fn query_recent(&self, query: &RecencyQuery) -> Result<QueryOutcome, BenchError> {
        let statement = format!(
            r#"
            SELECT {COLUMN_LIST}
            FROM "{}"
            WHERE "assetid" = $1 AND "assettype" = $2 AND "metrictype" = $3
              AND "timestamp" >= $4
            ORDER BY "timestamp" DESC
            "#,
            self.table
        );

        let started = Instant::now();
        let cutoff = bounded_cutoff(query, Utc::now());
        let rows = sqlx::query(&statement)
            .bind(query.asset_id)
            .bind(&query.asset_type)
            .bind(&query.metric_type)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| classify_sqlx(err, |e| BenchError::Query(e.to_string())))?;
        let readings = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BenchError::Query(e.to_string()))?;

        Ok(QueryOutcome {
            elapsed: started.elapsed(),
            readings,
        })
    }

    async fn footprint_bytes(&self) -> Result<u64, BenchError> {
        let size: Option<i64> =
            sqlx::query_scalar("SELECT pg_total_relation_size(to_regclass($1))")
                .bind(format!("\"{}\"", self.table))
                .fetch_one(&self.pool)
                .await
                .map_err(|err| {
                    classify_sqlx(err, |e| BenchError::FootprintUnavailable(e.to_string()))
                })?;
        match size {
            Some(bytes) if bytes >= 0 => Ok(bytes as u64),
            _ => Err(BenchError::FootprintUnavailable(format!(
                "relation '{}' not found",
                self.table
            ))),
        }
    }
}

/// Earliest instant a `timestamptz` accepts (4713 BC); older binds are rejected.
fn earliest_timestamptz() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(-4712, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Query cutoff clamped into the range Postgres can store, so any window wider
/// than the representable past simply matches every row.
fn bounded_cutoff(query: &RecencyQuery, now: DateTime<Utc>) -> DateTime<Utc> {
    query.cutoff(now).max(earliest_timestamptz())
}

fn decode_row(row: &PgRow) -> Result<Reading, sqlx::Error> {
    Ok(Reading {
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        asset_id: row.try_get("assetid")?,
        asset_type: row.try_get("assettype")?,
        metric_type: row.try_get("metrictype")?,
        locations: row.try_get("locations")?,
        values: row.try_get("values")?,
    })
}
