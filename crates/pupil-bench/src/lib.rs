//! Pupil detector benchmark harness.
//!
//! Replays ground-truth eye-tracking datasets through a set of pupil
//! detectors under one or more scale policies and writes one result table
//! per combination.
//!
//! ```no_run
//! use pupil_bench::{run_benchmark, BenchmarkConfig, BenchmarkPlan, JsonTableStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BenchmarkConfig::load_json("bench.json")?;
//! config.validate()?;
//! let datasets = config.build_datasets()?;
//! let detectors = config.build_registry();
//! let mut store = JsonTableStore::new(&config.output_dir);
//! let summary = run_benchmark(
//!     &datasets,
//!     &detectors,
//!     &BenchmarkPlan::from_config(&config),
//!     &mut store,
//! )?;
//! println!("{} trial(s) completed", summary.completed());
//! # Ok(())
//! # }
//! ```

mod config;
mod driver;
mod error;
mod method;
mod sink;

pub use config::{BenchmarkConfig, DatasetKind, DatasetSpec, ScaleSpec, VideoBackendKind};
pub use driver::{run_benchmark, BenchmarkPlan, RunSummary, TrialOutcome, TrialSummary};
pub use error::{BenchmarkError, ConfigError, SinkError, TrialError};
pub use method::{sanitize_host, MethodTag, METHOD_PREFIX};
pub use sink::{
    BenchmarkRecord, JsonTableStore, MemoryTableStore, ResultTable, TableHeader, TableStore,
};

pub use pupil_bench_core as core;
pub use pupil_bench_datasets as datasets;
pub use pupil_bench_detectors as detectors;

#[cfg(feature = "tracing")]
pub use pupil_bench_core::init_tracing;
pub use pupil_bench_core::{init_with_level, parse_level};
