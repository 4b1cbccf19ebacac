//! Offline step: embeds every metadata row and writes the `.npy` matrix the
//! server loads at startup. Row `i` of the output belongs to CSV row `i`.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use ndarray::Array2;

use sommelier_backend::core::config::{AppPaths, ConfigService};
use sommelier_backend::core::logging;
use sommelier_backend::retrieval::corpus::load_documents;
use sommelier_backend::retrieval::npy;
use sommelier_backend::retrieval::{Embedder, HttpEmbedder};

#[derive(Debug, Parser)]
#[command(
    name = "build_index",
    about = "Embed wine metadata into the matrix the sommelier server searches"
)]
struct Args {
    /// Headered CSV with one wine per row.
    #[arg(long)]
    metadata: PathBuf,

    /// Destination `.npy` file.
    #[arg(long)]
    output: PathBuf,

    /// Column to embed. Defaults to `retrieval.columns.content`.
    #[arg(long)]
    column: Option<String>,

    /// Rows per embedding request.
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u32).range(1..))]
    batch_size: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let paths = Arc::new(AppPaths::new());
    logging::init_with_file(&paths, "build_index.log");

    let settings = ConfigService::new(paths.clone())
        .load_settings()
        .context("Failed to load configuration")?;
    let dimension = settings.retrieval.dimension;

    let mut columns = settings.retrieval.columns.clone();
    if let Some(column) = args.column {
        columns.content = column;
    }

    let documents = load_documents(&args.metadata, &columns)?;
    if let Some(blank) = documents.iter().find(|doc| doc.content.trim().is_empty()) {
        bail!(
            "row {} has an empty '{}' column; every row needs text to embed",
            blank.position,
            columns.content
        );
    }

    let embedder = HttpEmbedder::new(&settings.embedding, dimension)?;
    tracing::info!(
        rows = documents.len(),
        model = embedder.model(),
        "Embedding {}",
        args.metadata.display()
    );

    let mut values = Vec::with_capacity(documents.len() * dimension);
    for batch in documents.chunks(args.batch_size as usize) {
        let texts: Vec<&str> = batch.iter().map(|doc| doc.content.as_str()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .await
            .with_context(|| format!("Failed to embed rows starting at {}", batch[0].position))?;

        for (doc, vector) in batch.iter().zip(&vectors) {
            if vector.len() != dimension {
                bail!(
                    "row {}: embedder returned {} values, expected {}",
                    doc.position,
                    vector.len(),
                    dimension
                );
            }
            values.extend_from_slice(vector);
        }
        tracing::debug!(done = values.len() / dimension, "Batch embedded");
    }

    let matrix = Array2::from_shape_vec((documents.len(), dimension), values)?;
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    npy::write_matrix(BufWriter::new(file), &matrix)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    tracing::info!(
        rows = matrix.nrows(),
        dimension,
        "Wrote {}",
        args.output.display()
    );
    println!("{}", args.output.display());
    Ok(())
}
