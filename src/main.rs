//! ksdyn CLI
//!
//! Offline analysis of recorded keystroke sessions: build typing profiles
//! from capture logs and compare them.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use keystroke_dynamics::{
    capture::CaptureLog,
    config::Config,
    core::{compare_profiles, fit_models, score_observation, Feature, TimingCategory},
    store, VERSION,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ksdyn")]
#[command(version = VERSION)]
#[command(about = "Keystroke-dynamics profiles and similarity scoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a typing profile from a capture log
    Extract {
        /// Capture log (.keypresses)
        capture: PathBuf,

        /// Where to write the profile (defaults to the data directory)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Override the timing threshold in milliseconds
        #[arg(long)]
        threshold_ms: Option<i64>,

        /// Categories to include (dwell, flight-before, flight-after)
        #[arg(long, value_delimiter = ',')]
        categories: Vec<TimingCategory>,
    },

    /// Compare two profiles
    Compare {
        /// Reference profile (.profile)
        reference: PathBuf,

        /// Candidate profile (.profile)
        candidate: PathBuf,

        /// Samples a key needs before it is scored
        #[arg(long)]
        min_samples: Option<usize>,

        /// Print the full comparison as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score a single timing observation against a profile
    Score {
        /// Reference profile (.profile)
        profile: PathBuf,

        /// Timing category of the observation
        #[arg(long, default_value = "dwell")]
        category: TimingCategory,

        /// Key code
        #[arg(long)]
        key: u32,

        /// Observed interval in milliseconds
        #[arg(long)]
        value: f64,
    },

    /// Show extraction statistics for a capture log
    Stats {
        /// Capture log (.keypresses)
        capture: PathBuf,

        /// Override the timing threshold in milliseconds
        #[arg(long)]
        threshold_ms: Option<i64>,
    },

    /// Show configuration
    Config {
        /// Write the current settings (defaults if none saved yet) to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            capture,
            output,
            threshold_ms,
            categories,
        } => cmd_extract(&capture, output, threshold_ms, categories),
        Commands::Compare {
            reference,
            candidate,
            min_samples,
            json,
        } => cmd_compare(&reference, &candidate, min_samples, json),
        Commands::Score {
            profile,
            category,
            key,
            value,
        } => cmd_score(&profile, category, key, value),
        Commands::Stats {
            capture,
            threshold_ms,
        } => cmd_stats(&capture, threshold_ms),
        Commands::Config { init } => cmd_config(init),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load configuration, using defaults: {e}");
            Config::default()
        }
    }
}

fn with_threshold(mut config: Config, threshold_ms: Option<i64>) -> Result<Config> {
    if let Some(ms) = threshold_ms {
        if ms <= 0 {
            bail!("--threshold-ms must be positive");
        }
        config.timing_threshold = std::time::Duration::from_millis(ms as u64);
    }
    Ok(config)
}

fn cmd_extract(
    capture: &Path,
    output: Option<PathBuf>,
    threshold_ms: Option<i64>,
    categories: Vec<TimingCategory>,
) -> Result<()> {
    let mut config = with_threshold(load_config(), threshold_ms)?;
    if !categories.is_empty() {
        config.categories = categories;
    }

    let log: CaptureLog = store::load_from_file(capture)
        .with_context(|| format!("loading capture log {}", capture.display()))?;
    let extractor = log.feed(config.extractor());
    let profile = extractor.extract_features();

    let output = output.unwrap_or_else(|| {
        let stem = capture
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "profile".to_string());
        config.data_path.join("profiles").join(stem)
    });
    let written = store::save_to_file(&profile, &output)?;

    info!(events = log.len(), keys = profile.leaf_count(), "profile extracted");
    println!("{}", extractor.stats().summary());
    println!();
    for category in profile.children() {
        println!("  {}: {} keys", category.name(), category.children().len());
    }
    println!("Profile written to {}", written.display());
    Ok(())
}

fn cmd_compare(reference: &Path, candidate: &Path, min_samples: Option<usize>, json: bool) -> Result<()> {
    let config = load_config();
    let min_samples = min_samples.unwrap_or(config.min_samples);

    let reference: Feature = store::load_from_file(reference)
        .with_context(|| format!("loading profile {}", reference.display()))?;
    let candidate: Feature = store::load_from_file(candidate)
        .with_context(|| format!("loading profile {}", candidate.display()))?;

    let comparison = compare_profiles(&reference, &candidate, min_samples)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }

    println!("Similarity: {:.4} over {} keys", comparison.score, comparison.compared);
    for (name, category) in &comparison.categories {
        println!("  {name}: {:.4} ({} keys)", category.score, category.compared);
    }
    Ok(())
}

fn cmd_score(profile: &Path, category: TimingCategory, key: u32, value: f64) -> Result<()> {
    let config = load_config();
    let profile: Feature = store::load_from_file(profile)
        .with_context(|| format!("loading profile {}", profile.display()))?;

    let models = fit_models(&profile, config.min_samples)?;
    let key_name = key.to_string();
    let path = [category.feature_name(), key_name.as_str()];

    match score_observation(&models, &path, value) {
        Some(score) => {
            if let Some(model) = models.find(&path).and_then(|m| m.value()) {
                println!("Reference {category}/{key}: {model}");
            }
            println!("Score: {score:.4}");
            Ok(())
        }
        None => bail!("no usable model for key {key} in {category}"),
    }
}

fn cmd_stats(capture: &Path, threshold_ms: Option<i64>) -> Result<()> {
    let config = with_threshold(load_config(), threshold_ms)?;
    let log: CaptureLog = store::load_from_file(capture)
        .with_context(|| format!("loading capture log {}", capture.display()))?;

    let extractor = log.feed(config.extractor());
    println!("Capture: {} events over {} ms", log.len(), log.duration_ms());
    println!("Timing threshold: {} ms", extractor.timing_threshold());
    println!();
    println!("{}", extractor.stats().summary());
    if extractor.held_keys() > 0 {
        println!("Keys still held at end of capture: {}", extractor.held_keys());
    }
    Ok(())
}

fn cmd_config(init: bool) -> Result<()> {
    let config = load_config();
    if init {
        let path = config.save().context("saving configuration")?;
        info!(path = %path.display(), "configuration written");
        println!("Configuration written to {}", path.display());
        println!();
    }
    println!("Configuration:");
    println!("  Config file: {:?}", Config::config_path());
    println!("  Timing threshold: {} ms", config.timing_threshold_ms());
    println!("  Min samples per key: {}", config.min_samples);
    let categories: Vec<String> = config.categories.iter().map(|c| c.to_string()).collect();
    println!("  Categories: {}", categories.join(", "));
    println!("  Data path: {:?}", config.data_path);
    Ok(())
}
