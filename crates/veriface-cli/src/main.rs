use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use veriface_core::{Embedding, EnsembleVerifier};

#[derive(Parser)]
#[command(name = "veriface", about = "Veriface embedding verification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two embedding files with the verification ensemble
    Compare {
        /// Captured-face embedding (JSON array of numbers)
        probe: PathBuf,
        /// Reference/document embedding (JSON array of numbers)
        reference: PathBuf,
        /// Capture quality score 0-100, used to re-balance ensemble weights
        #[arg(short, long)]
        quality: Option<f32>,
        /// Document-photo quality score 0-100, averaged with --quality
        #[arg(short, long)]
        document_quality: Option<f32>,
    },
    /// Preprocess a captured image (CLAHE, glare removal, sharpening)
    Preprocess {
        /// Input image file
        input: PathBuf,
        /// Output image file
        output: PathBuf,
        /// Treat the input as a document photograph (glare removal + sharpening)
        #[arg(long)]
        document: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            probe,
            reference,
            quality,
            document_quality,
        } => run_compare(&probe, &reference, quality, document_quality),
        Commands::Preprocess {
            input,
            output,
            document,
        } => run_preprocess(&input, &output, document),
    }
}

/// Load an embedding from a JSON file: either a bare array of numbers
/// or an object with a `values` array.
fn load_embedding(path: &Path) -> Result<Embedding> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading embedding file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {} as JSON", path.display()))?;

    let array = json
        .get("values")
        .unwrap_or(&json)
        .as_array()
        .with_context(|| format!("{}: expected a JSON array of numbers", path.display()))?;

    let values = array
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<Vec<f32>>>()
        .with_context(|| format!("{}: non-numeric element in embedding", path.display()))?;

    Ok(Embedding::new(values))
}

fn run_compare(
    probe_path: &Path,
    reference_path: &Path,
    quality: Option<f32>,
    document_quality: Option<f32>,
) -> Result<()> {
    let probe = load_embedding(probe_path)?;
    let reference = load_embedding(reference_path)?;
    tracing::info!(
        probe = %probe_path.display(),
        reference = %reference_path.display(),
        dims = probe.len(),
        "embeddings loaded"
    );

    let mut verifier = EnsembleVerifier::new();
    if let Some(q) = quality {
        verifier.adjust_weights_for_quality(q, document_quality);
    }

    let result = verifier.compare(&probe, &reference)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_preprocess(input: &Path, output: &Path, document: bool) -> Result<()> {
    let img = image::open(input)
        .with_context(|| format!("opening image {}", input.display()))?
        .to_rgb8();
    tracing::info!(
        input = %input.display(),
        width = img.width(),
        height = img.height(),
        document,
        "image loaded"
    );

    let processed = veriface_imgproc::preprocess_image(img, document)?;
    processed
        .save(output)
        .with_context(|| format!("saving processed image to {}", output.display()))?;
    println!("wrote {}", output.display());
    Ok(())
}
