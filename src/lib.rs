pub mod adapter;
pub mod config;
pub mod dataset;
pub mod driver;
pub mod error;
pub mod generator;
pub mod logging;
pub mod mongo;
pub mod postgres;
pub mod reading;
pub mod runner;

pub use adapter::{QueryOutcome, RecencyQuery, StorageAdapter};
pub use driver::{BenchmarkDriver, BenchmarkResult, Stage, StageFailure};
pub use error::BenchError;
pub use reading::Reading;
