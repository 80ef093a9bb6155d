//! Trial orchestration over dataset x detector x scale policy.

use std::time::Instant;

use pupil_bench_core::{normalize, to_gray};
use pupil_bench_datasets::Dataset;
use pupil_bench_detectors::{DetectorRegistry, RegisteredDetector};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::{BenchmarkConfig, ScaleSpec};
use crate::sink::{BenchmarkRecord, ResultTable, TableHeader, TableStore};
use crate::{BenchmarkError, ConfigError, MethodTag, TrialError};

/// Run-wide settings shared by every trial.
#[derive(Clone, Debug)]
pub struct BenchmarkPlan {
    pub host: String,
    pub scales: Vec<ScaleSpec>,
    pub skip: Vec<String>,
    pub progress_every: usize,
}

impl BenchmarkPlan {
    pub fn from_config(config: &BenchmarkConfig) -> Self {
        Self {
            host: config.resolved_host(),
            scales: config.scales.clone(),
            skip: config.skip.clone(),
            progress_every: config.progress_every,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialOutcome {
    Completed { records: usize, anomalies: usize },
    Skipped { pattern: String },
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrialSummary {
    pub method: MethodTag,
    pub dataset: String,
    pub detector: String,
    pub scale: String,
    #[serde(flatten)]
    pub outcome: TrialOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub trials: Vec<TrialSummary>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, TrialOutcome::Completed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TrialOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TrialOutcome::Failed { .. }))
    }

    pub fn get(&self, method: &MethodTag) -> Option<&TrialOutcome> {
        self.trials
            .iter()
            .find(|t| &t.method == method)
            .map(|t| &t.outcome)
    }

    fn count(&self, pred: impl Fn(&TrialOutcome) -> bool) -> usize {
        self.trials.iter().filter(|t| pred(&t.outcome)).count()
    }
}

struct Trial<'a> {
    method: MethodTag,
    dataset: &'a dyn Dataset,
    detector: &'a RegisteredDetector,
    scale: &'a ScaleSpec,
}

/// Run every combination in dataset, detector, scale order.
///
/// Configuration faults and unusable dataset roots abort before the first
/// trial; roots of datasets whose combinations are all skipped are not
/// checked. After that, a failing trial only ends its own combination: its
/// partial table is dropped and the remaining trials still run.
pub fn run_benchmark(
    datasets: &[Box<dyn Dataset>],
    detectors: &DetectorRegistry,
    plan: &BenchmarkPlan,
    store: &mut dyn TableStore,
) -> Result<RunSummary, BenchmarkError> {
    let trials = plan_trials(datasets, detectors, plan)?;
    for dataset in datasets {
        let runs_any = trials.iter().any(|t| {
            t.dataset.name() == dataset.name() && skip_pattern(plan, &t.method).is_none()
        });
        if !runs_any {
            log::debug!("{}: every combination skipped, root not checked", dataset.name());
            continue;
        }
        dataset.check().map_err(|source| BenchmarkError::Dataset {
            name: dataset.name().to_string(),
            source,
        })?;
    }
    log::info!(
        "{} combination(s): {} dataset(s) x {} detector(s) x {} scale(s)",
        trials.len(),
        datasets.len(),
        detectors.len(),
        plan.scales.len()
    );

    let mut summary = RunSummary::default();
    for trial in trials {
        let outcome = match skip_pattern(plan, &trial.method) {
            Some(pattern) => {
                log::info!("{}: skipped (matches {pattern:?})", trial.method);
                TrialOutcome::Skipped {
                    pattern: pattern.clone(),
                }
            }
            None => match run_trial(&trial, plan, store) {
                Ok((records, anomalies)) => {
                    log::info!(
                        "{}: {records} record(s), {anomalies} anomalies",
                        trial.method
                    );
                    TrialOutcome::Completed { records, anomalies }
                }
                Err(err) => {
                    log::error!("{}: failed: {err}", trial.method);
                    TrialOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            },
        };
        summary.trials.push(TrialSummary {
            method: trial.method.clone(),
            dataset: trial.dataset.name().to_string(),
            detector: trial.detector.name().to_string(),
            scale: trial.scale.name.clone(),
            outcome,
        });
    }
    log::info!(
        "done: {} completed, {} skipped, {} failed",
        summary.completed(),
        summary.skipped(),
        summary.failed()
    );
    Ok(summary)
}

fn skip_pattern<'p>(plan: &'p BenchmarkPlan, method: &MethodTag) -> Option<&'p String> {
    plan.skip.iter().find(|p| !p.is_empty() && method.matches(p))
}

fn plan_trials<'a>(
    datasets: &'a [Box<dyn Dataset>],
    detectors: &'a DetectorRegistry,
    plan: &'a BenchmarkPlan,
) -> Result<Vec<Trial<'a>>, ConfigError> {
    if datasets.is_empty() {
        return Err(ConfigError::Empty("datasets"));
    }
    if detectors.is_empty() {
        return Err(ConfigError::Empty("detectors"));
    }
    if plan.scales.is_empty() {
        return Err(ConfigError::Empty("scale policies"));
    }
    for scale in &plan.scales {
        scale.policy.validate().map_err(|source| ConfigError::Scale {
            name: scale.name.clone(),
            source,
        })?;
    }

    let mut trials = Vec::new();
    for dataset in datasets {
        for detector in detectors.iter() {
            for scale in &plan.scales {
                let method =
                    MethodTag::new(dataset.name(), &scale.name, &plan.host, detector.name())?;
                if trials.iter().any(|t: &Trial<'_>| t.method == method) {
                    return Err(ConfigError::DuplicateName {
                        role: "method tag",
                        name: method.to_string(),
                    });
                }
                trials.push(Trial {
                    method,
                    dataset: dataset.as_ref(),
                    detector,
                    scale,
                });
            }
        }
    }
    Ok(trials)
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(method = %trial.method))
)]
fn run_trial(
    trial: &Trial<'_>,
    plan: &BenchmarkPlan,
    store: &mut dyn TableStore,
) -> Result<(usize, usize), TrialError> {
    let mut frames = trial.dataset.frames()?;
    let mut detector = trial.detector.build()?;
    let adapter = trial.detector.adapter();
    let mut table = ResultTable::new(TableHeader {
        method: trial.method.clone(),
        dataset: trial.dataset.name().to_string(),
        detector: trial.detector.name().to_string(),
        scale: trial.scale.name.clone(),
        scale_policy: trial.scale.policy,
        host: plan.host.clone(),
        angle_convention: trial.dataset.angle_convention(),
        record_count: 0,
    });

    for frame in frames.by_ref() {
        let frame = frame?;
        if plan.progress_every > 0 && frame.frame_index % plan.progress_every == 0 {
            log::info!(
                "{} {}/{} frame {}",
                trial.method,
                frame.group,
                frame.clip,
                frame.frame_index
            );
        }

        let gray = to_gray(&frame.image);
        let scaled = normalize(&gray, &trial.scale.policy)?;

        let started = Instant::now();
        let raw = detector.detect(&scaled.image)?;
        let detection_time = started.elapsed().as_secs_f64();

        let detection = adapter.adapt(&raw, scaled.rescaling_factor)?;
        table.append(BenchmarkRecord {
            group: frame.group,
            clip: frame.clip,
            frame: frame.frame_index,
            method: trial.method.clone(),
            ground_truth: frame.ground_truth,
            confidence: detection.confidence,
            ellipse: detection.ellipse,
            detection_time,
        });
    }

    let anomalies = frames.anomalies().len();
    store.persist(&table)?;
    Ok((table.len(), anomalies))
}
