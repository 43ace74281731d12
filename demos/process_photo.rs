//! Run the full studio pipeline over one photo.
//!
//! Usage:
//! ```sh
//! cargo run --example process_photo -- input.jpg "warm golden hour" output.jpg
//! ```

use std::env;
use std::process;

use portrait_studio::{
    normalize_file, CloudConfig, CloudEngine, EditingMode, IntakeOptions, Studio, StudioOptions,
};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <input> <prompt> <output>", args[0]);
        process::exit(1);
    }

    let photo = normalize_file(args[1].as_ref(), &IntakeOptions::default())
        .expect("failed to read input photo");

    let studio = Studio::new(CloudEngine::new(CloudConfig::from_env()), StudioOptions::new());
    match studio.process(&[photo], &args[2], EditingMode::Single) {
        Ok(result) => {
            for warning in &result.warnings {
                eprintln!("warning: {warning}");
            }
            std::fs::write(&args[3], &result.image.data).expect("failed to write output");
            println!("Done via {} -> {}", result.engine, args[3]);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
