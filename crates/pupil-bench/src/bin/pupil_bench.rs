use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pupil_bench::core::to_gray;
use pupil_bench::datasets::{extract_frames, load_labeled_frame, ClipFilter, LabeledDataset};
use pupil_bench::detectors::{
    DarkPupilDetector, DarkPupilParams, DetectorAdapter, PupilDetector, SchemaFamily,
};
use pupil_bench::{
    run_benchmark, BenchmarkConfig, BenchmarkPlan, JsonTableStore, MemoryTableStore, TableStore,
    VideoBackendKind,
};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    name = "pupil-bench",
    version,
    about = "Replay eye-tracking ground truth through pupil detectors"
)]
struct Cli {
    /// off, error, warn, info, debug or trace. With the `tracing` feature,
    /// `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every dataset x detector x scale combination.
    Run(RunArgs),
    /// Decode labeled clips into numbered PNG frames.
    ExtractFrames(ExtractArgs),
    /// Load one labeled frame and run the baseline detector on it.
    ShowFrame(ShowArgs),
    /// Write the default configuration as JSON.
    InitConfig {
        #[arg(long, default_value = "pupil_bench.json")]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON config; the built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override a dataset root, as NAME=PATH. Repeatable.
    #[arg(long = "root", value_name = "NAME=PATH")]
    roots: Vec<String>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    /// Extra skip pattern matched against method tags. Repeatable.
    #[arg(long)]
    skip: Vec<String>,
    /// Keep tables in memory instead of writing artifacts.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    ImageSequence,
    Opencv,
}

impl From<Backend> for VideoBackendKind {
    fn from(value: Backend) -> Self {
        match value {
            Backend::ImageSequence => VideoBackendKind::ImageSequence,
            Backend::Opencv => VideoBackendKind::Opencv,
        }
    }
}

#[derive(Args, Debug)]
struct DatasetArgs {
    /// Labeled dataset root (`<root>/<subject>/<clip>.avi` + `.txt`).
    #[arg(long)]
    root: PathBuf,
    #[arg(long, value_enum, default_value_t = Backend::ImageSequence)]
    backend: Backend,
    #[arg(long, default_value = "avi")]
    video_extension: String,
}

impl DatasetArgs {
    fn open(&self, filter: ClipFilter) -> Result<LabeledDataset, Box<dyn std::error::Error>> {
        let backend = VideoBackendKind::from(self.backend).build()?;
        Ok(LabeledDataset::new("labeled", &self.root, backend)
            .with_filter(filter)
            .with_video_extension(&self.video_extension))
    }
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[command(flatten)]
    dataset: DatasetArgs,
    /// Output root; frames land in `<out>/<subject>/<clip>/NNNN.png`.
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    clip: Option<String>,
}

#[derive(Args, Debug)]
struct ShowArgs {
    #[command(flatten)]
    dataset: DatasetArgs,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    clip: String,
    #[arg(long)]
    index: usize,
    /// Save the detector's debug image here.
    #[arg(long)]
    debug_image: Option<PathBuf>,
}

fn main() -> ExitCode {
    match try_main(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&cli.log_level)?;

    match cli.command {
        Command::Run(args) => run(args),
        Command::ExtractFrames(args) => extract(args),
        Command::ShowFrame(args) => show(args),
        Command::InitConfig { out } => {
            BenchmarkConfig::default().write_json(&out)?;
            println!("wrote default config to {}", out.display());
            Ok(())
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when both are set.
#[cfg(feature = "tracing")]
fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    pupil_bench::init_tracing(false, log_level(level)?);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    pupil_bench::init_with_level(log_level(level)?)?;
    Ok(())
}

fn log_level(name: &str) -> Result<log::LevelFilter, String> {
    pupil_bench::parse_level(name).ok_or_else(|| format!("unknown log level {name:?}"))
}

fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => BenchmarkConfig::load_json(path)?,
        None => BenchmarkConfig::default(),
    };
    for root in &args.roots {
        config.apply_root_override(root)?;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if args.host.is_some() {
        config.host = args.host;
    }
    config.skip.extend(args.skip);
    config.validate()?;

    let datasets = config.build_datasets()?;
    let detectors = config.build_registry();
    let plan = BenchmarkPlan::from_config(&config);
    let mut json_store;
    let mut memory_store;
    let store: &mut dyn TableStore = if args.dry_run {
        memory_store = MemoryTableStore::new();
        &mut memory_store
    } else {
        json_store = JsonTableStore::new(&config.output_dir);
        &mut json_store
    };

    let summary = run_benchmark(&datasets, &detectors, &plan, store)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.failed() > 0 {
        return Err(format!("{} trial(s) failed", summary.failed()).into());
    }
    Ok(())
}

fn extract(args: ExtractArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = args.dataset.open(ClipFilter {
        subject: args.subject,
        clip: args.clip,
    })?;
    let summary = extract_frames(&dataset, &args.out)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn show(args: ShowArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = args.dataset.open(ClipFilter::default())?;
    let frame = load_labeled_frame(&dataset, &args.subject, &args.clip, args.index)?;
    let gray = to_gray(&frame.image);

    let mut detector = DarkPupilDetector::new(DarkPupilParams::default());
    let (raw, debug) = detector.detect_debug(&gray)?;
    let detection = DetectorAdapter::new(SchemaFamily::FlatFields).adapt(&raw, 1.0)?;

    if let (Some(path), Some(debug)) = (args.debug_image.as_ref(), debug) {
        debug.save(path)?;
        log::info!("wrote debug image to {}", path.display());
    }
    let report = json!({
        "subject": frame.group,
        "clip": frame.clip,
        "frame": frame.frame_index,
        "width": frame.image.width(),
        "height": frame.image.height(),
        "ground_truth": frame.ground_truth,
        "detection": detection,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
