//! `sage ingest` - chunk, embed, and store documents.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use sage_engine::QueryEngine;
use sage_index::{Embedder, SemanticChunker, Store};
use sage_types::DocumentMeta;

/// Ingest each path in turn, printing a one-line summary per file.
///
/// Files whose contents are already indexed (matched by content hash) are
/// skipped, so re-running over a directory of notes is cheap.
pub async fn run(engine: &QueryEngine, store: &mut Store, paths: &[PathBuf]) -> Result<()> {
    let chunker = SemanticChunker::new();
    let embedder = engine.embedder();

    for path in paths {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let hash = Store::content_hash(&contents);

        if store
            .find_document_by_hash(&hash)
            .context("Failed to check for existing document")?
            .is_some()
        {
            println!("{}: unchanged, skipped", path.display());
            continue;
        }

        let chunks = chunker
            .split_text(&contents, &embedder)
            .await
            .with_context(|| format!("Failed to chunk {}", path.display()))?;
        if chunks.is_empty() {
            println!("{}: empty, skipped", path.display());
            continue;
        }

        let embeddings = embedder
            .embed_batch(&chunks)
            .await
            .with_context(|| format!("Failed to embed {}", path.display()))?;

        let meta = DocumentMeta::new(title_for(path), path.display().to_string())
            .with_content_hash(hash);
        let chunk_rows: Vec<(String, Option<u32>)> =
            chunks.into_iter().map(|text| (text, None)).collect();

        let id = store
            .insert_document(&meta, &chunk_rows, &embeddings)
            .with_context(|| format!("Failed to store {}", path.display()))?;

        println!(
            "{}: indexed as document {} ({} chunks)",
            path.display(),
            id,
            chunk_rows.len()
        );
    }

    Ok(())
}

fn title_for(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |stem| {
            stem.to_string_lossy().into_owned()
        })
}
