use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Parser;
use ddsp_eval::{
    build_report, Corpus, DirectoryCorpus, EvalConfig, EvalError, EvaluationObserver,
    EvaluatorBuilder, Meta, PerFileProgress, Split, WindowFn,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[path = "vocoder_eval/json_report_formatter.rs"]
mod json_report_formatter;

#[derive(Debug, Parser)]
#[command(name = "vocoder_eval")]
#[command(about = "Score a DDSP vocoder checkpoint on a singing corpus: multi-resolution spectral loss and F0 error in cents")]
struct Args {
    /// YAML model config with `class_path` / `init_args` components.
    config: PathBuf,
    /// Safetensors checkpoint.
    ckpt: PathBuf,
    /// Directory of `.wav` files with `.pv` pitch sidecars.
    data: PathBuf,
    /// Evaluate the validation split instead of the test split.
    #[arg(long, default_value_t = false)]
    valid: bool,
    #[arg(long, env = "VOCODER_EVAL_DEVICE", default_value = "cpu")]
    device: String,
    /// Write a JSON report here in addition to the printed summary.
    #[arg(long, env = "VOCODER_EVAL_OUT")]
    out: Option<PathBuf>,
    #[arg(long, env = "VOCODER_EVAL_LIMIT")]
    limit: Option<usize>,
    #[arg(long, env = "VOCODER_EVAL_OFFSET", default_value_t = 0)]
    offset: usize,
    /// Analysis window of the spectral loss (hann, hamming, blackman, rectangular).
    #[arg(long, env = "VOCODER_EVAL_WINDOW", default_value = "hann")]
    window: String,
    #[arg(
        long,
        env = "VOCODER_EVAL_RESOLUTIONS",
        value_delimiter = ',',
        default_values_t = [512usize, 1024, 2048]
    )]
    resolutions: Vec<usize>,
}

/// Progress bar showing the loss of the file just scored.
struct ProgressObserver {
    progress: ProgressBar,
}

impl ProgressObserver {
    fn new() -> Self {
        let progress = ProgressBar::new(0);
        progress.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
        );
        progress.set_message("starting...");
        Self { progress }
    }

    fn finish(&self) {
        self.progress.finish_and_clear();
    }
}

impl EvaluationObserver for ProgressObserver {
    fn on_start(&mut self, total: usize) {
        self.progress.set_length(total as u64);
    }

    fn on_file(&mut self, progress: &PerFileProgress<'_>) {
        let f0_loss = progress
            .result
            .f0_mean_error()
            .map_or_else(|| "n/a".to_string(), |e| format!("{e:.4}"));
        self.progress.set_message(format!(
            "Loss: {:.4}, F0 Loss: {f0_loss}, Unvoiced: {}",
            progress.result.spectral_loss, progress.running_unvoiced_estimate_frames
        ));
        self.progress.inc(1);
    }

    fn on_skip(&mut self, id: &str, error: &EvalError) {
        self.progress.println(format!("skipped {id}: {error}"));
        self.progress.inc(1);
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let window: WindowFn = args.window.parse().map_err(|err: EvalError| err.to_string())?;
    let split = if args.valid {
        Split::Validation
    } else {
        Split::Test
    };

    let corpus = DirectoryCorpus::new(&args.data);
    let mut ids: Vec<String> = corpus
        .utterance_ids()
        .map_err(|err| format!("Failed to enumerate corpus '{}': {err}", args.data.display()))?
        .into_iter()
        .filter(|id| corpus.belongs_to(id, split))
        .skip(args.offset)
        .collect();
    if let Some(limit) = args.limit {
        ids.truncate(limit);
    }
    if ids.is_empty() {
        return Err(format!(
            "No {} files selected in '{}' after applying offset/limit.",
            split.as_str(),
            args.data.display()
        ));
    }

    let config = EvalConfig {
        config_path: args.config.to_string_lossy().to_string(),
        checkpoint_path: args.ckpt.to_string_lossy().to_string(),
        device: args.device.clone(),
        resolutions: args.resolutions.clone(),
        window,
        ..EvalConfig::default()
    };
    let voicing_floor_hz = config.voicing_floor_hz;
    let evaluator = EvaluatorBuilder::new(config)
        .build()
        .map_err(|err| format!("Failed to build evaluator: {err}"))?;

    let mut observer = ProgressObserver::new();
    let outcome = evaluator.run_ids(&corpus, &ids, &mut observer);
    observer.finish();
    let run = outcome.map_err(|err| format!("Evaluation failed: {err}"))?;

    println!("{} {}", run.corpus.total_frames, run.corpus.total_valid_f0_frames);
    println!(
        "Loss: {:.4}, F0 Loss: {:.4}",
        run.corpus.weighted_spectral_loss, run.corpus.weighted_f0_error
    );
    println!(
        "Unvoiced estimate frames: {}",
        run.corpus.total_unvoiced_estimate_frames
    );

    if let Some(out) = args.out.as_deref() {
        let meta = Meta {
            generated_at: Utc::now().to_rfc3339(),
            config_path: display(&args.config),
            checkpoint_path: display(&args.ckpt),
            corpus_path: display(&args.data),
            device: evaluator.device_label(),
            split,
            window: window.to_string(),
            resolutions: evaluator.spectral_distance().resolutions(),
            voicing_floor_hz,
        };
        let report = build_report(meta, &run.files, run.skipped, run.corpus);
        json_report_formatter::write_report(out, &report)?;
        println!("{}", out.display());
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
