use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};

use portrait_studio::{
    normalize_file, CloudConfig, CloudEngine, EditingMode, IntakeOptions, Studio, StudioOptions,
};

#[derive(Parser)]
#[command(
    name = "portrait-studio",
    about = "Dual-engine portrait studio: cloud generative editing with a local fallback",
    version,
    after_help = "Simple usage: portrait-studio photo.jpg --prompt \"warm golden hour\"\n\n\
                  The cloud engine needs GEMINI_API_KEY (or GOOGLE_API_KEY); without it\n\
                  the pipeline falls back to the deterministic local engine."
)]
struct Cli {
    /// Main photo
    photo: Option<PathBuf>,

    /// Partner photo (enables couple mode compositing)
    #[arg(short = '2', long)]
    partner: Option<PathBuf>,

    /// Editing instruction, e.g. "jadikan hitam putih" or "bright vintage"
    #[arg(short, long, default_value = "")]
    prompt: String,

    /// Editing mode (couple is implied when a partner photo is given)
    #[arg(short, long, value_enum, default_value_t = ModeArg::Single)]
    mode: ModeArg,

    /// Output file (default: studio-<timestamp>.jpg)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Engine attempt order
    #[arg(long, value_enum, default_value_t = OrderArg::CloudFirst)]
    engine_order: OrderArg,

    /// Skip the branded watermark stamp
    #[arg(long)]
    no_watermark: bool,

    /// Longest allowed input side in pixels before downscaling
    #[arg(long, default_value = "1024")]
    max_dimension: u32,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Single,
    Couple,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    CloudFirst,
    LocalFirst,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.photo.is_none() && cli.prompt.trim().is_empty() {
        eprintln!("Error: Supply a photo, a prompt, or both");
        process::exit(1);
    }
    if cli.max_dimension == 0 {
        eprintln!("Error: --max-dimension must be at least 1");
        process::exit(1);
    }

    let intake = IntakeOptions {
        max_dimension: cli.max_dimension,
        ..IntakeOptions::default()
    };

    let mut images = Vec::new();
    for path in [cli.photo.as_ref(), cli.partner.as_ref()].into_iter().flatten() {
        match normalize_file(path, &intake) {
            Ok(input) => images.push(input),
            Err(e) => {
                eprintln!("Error: {}: {e}", path.display());
                process::exit(1);
            }
        }
    }

    let mode = if cli.partner.is_some() {
        EditingMode::Couple
    } else {
        match cli.mode {
            ModeArg::Single => EditingMode::Single,
            ModeArg::Couple => EditingMode::Couple,
        }
    };

    let options = StudioOptions {
        engine_order: match cli.engine_order {
            OrderArg::CloudFirst => portrait_studio::EngineOrder::CloudFirst,
            OrderArg::LocalFirst => portrait_studio::EngineOrder::LocalFirst,
        },
        apply_watermark: !cli.no_watermark,
        ..StudioOptions::new()
    };

    let studio = Studio::new(CloudEngine::new(CloudConfig::from_env()), options);

    let result = match studio.process(&images, &cli.prompt, mode) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    for warning in &result.warnings {
        if !cli.quiet {
            eprintln!("[WARN] {warning}");
        }
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(format!("studio-{}.jpg", result.timestamp_ms)));
    if let Err(e) = std::fs::write(&output, &result.image.data) {
        eprintln!("Error: Failed to write {}: {e}", output.display());
        process::exit(1);
    }

    if !cli.quiet {
        eprintln!(
            "[OK] {} ({}, prompt: {})",
            output.display(),
            result.engine,
            result.prompt
        );
    }
}
