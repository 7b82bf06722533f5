use crate::reading::{Reading, METRIC_TYPES};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rand::Rng;

const WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub rows: usize,
    pub vector_len: usize,
    pub asset_type: String,
}

/// Builds `config.rows` synthetic readings anchored at `now`.
///
/// Asset ids are dense and 1-based. Timestamps are whole seconds drawn from
/// `[now - 24h, now)`; both vectors hold `config.vector_len` draws from `[0, 1)`.
pub fn generate<R: Rng + ?Sized>(
    rng: &mut R,
    config: &GeneratorConfig,
    now: DateTime<Utc>,
) -> Vec<Reading> {
    let (start, end) = second_bounds(now);
    (0..config.rows)
        .map(|i| Reading {
            timestamp: random_timestamp(rng, start, end),
            asset_id: i as i64 + 1,
            asset_type: config.asset_type.clone(),
            metric_type: random_metric_type(rng).to_string(),
            locations: random_floats(rng, config.vector_len),
            values: random_floats(rng, config.vector_len),
        })
        .collect()
}

fn second_bounds(now: DateTime<Utc>) -> (i64, i64) {
    let earliest = now - ChronoDuration::hours(WINDOW_HOURS);
    let mut start = earliest.timestamp();
    if earliest.timestamp_subsec_nanos() > 0 {
        start += 1;
    }
    let end = now.timestamp().max(start + 1);
    (start, end)
}

fn random_timestamp<R: Rng + ?Sized>(rng: &mut R, start: i64, end: i64) -> DateTime<Utc> {
    let secs = rng.gen_range(start..end);
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(start, 0).single().unwrap_or_default())
}

fn random_metric_type<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    METRIC_TYPES[rng.gen_range(0..METRIC_TYPES.len())]
}

fn random_floats<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<f64> {
    (0..count).map(|_| rng.gen::<f64>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::DEFAULT_ASSET_TYPE;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(rows: usize, vector_len: usize) -> GeneratorConfig {
        GeneratorConfig {
            rows,
            vector_len,
            asset_type: DEFAULT_ASSET_TYPE.to_string(),
        }
    }

    #[test]
    fn readings_have_paired_vectors_of_configured_length() {
        let mut rng = StdRng::seed_from_u64(42);
        let readings = generate(&mut rng, &config(10, 5), Utc::now());
        assert_eq!(readings.len(), 10);
        for reading in &readings {
            assert_eq!(reading.locations.len(), 5);
            assert_eq!(reading.values.len(), 5);
            assert!(reading
                .locations
                .iter()
                .chain(reading.values.iter())
                .all(|v| (0.0..1.0).contains(v)));
            assert!(reading.validate().is_ok());
        }
    }

    #[test]
    fn timestamps_fall_in_trailing_day() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();
        let readings = generate(&mut rng, &config(200, 1), now);
        for reading in &readings {
            assert!(reading.timestamp <= now);
            assert!(reading.timestamp >= now - ChronoDuration::hours(24));
            assert_eq!(reading.timestamp.timestamp_subsec_nanos(), 0);
        }
    }

    #[test]
    fn ids_are_dense_and_labels_known() {
        let mut rng = StdRng::seed_from_u64(1);
        let readings = generate(&mut rng, &config(25, 0), Utc::now());
        let ids: Vec<i64> = readings.iter().map(|r| r.asset_id).collect();
        assert_eq!(ids, (1..=25).collect::<Vec<_>>());
        assert!(readings
            .iter()
            .all(|r| METRIC_TYPES.contains(&r.metric_type.as_str())
                && r.asset_type == DEFAULT_ASSET_TYPE));
    }

    #[test]
    fn zero_rows_yields_empty_batch() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(generate(&mut rng, &config(0, 30_000), Utc::now()).is_empty());
    }

    #[test]
    fn same_seed_same_dataset() {
        let now = Utc::now();
        let a = generate(&mut StdRng::seed_from_u64(9), &config(3, 4), now);
        let b = generate(&mut StdRng::seed_from_u64(9), &config(3, 4), now);
        assert_eq!(a, b);
    }
}
