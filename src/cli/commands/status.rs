//! Status command - describe the index on disk.

use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::error::{QaError, QaResult};
use crate::qa::QaSession;
use crate::remote::RemoteEndpoint;

/// Run the status command.
pub async fn run(settings: &Settings, json: bool) -> QaResult<()> {
    let session = QaSession::from_settings(settings)?;
    let status = session.status().await;

    if json {
        let rendered = serde_json::to_string_pretty(&status).map_err(|e| QaError::Internal {
            reason: format!("cannot render status: {e}"),
        })?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Index directory: {}", session.store().root().display());
    match &status.manifest {
        Some(manifest) => {
            let created = DateTime::<Utc>::from_timestamp(manifest.created_at as i64, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| manifest.created_at.to_string());
            println!(
                "Document:        {} ({} pages)",
                manifest.document.file_name, manifest.page_count
            );
            println!("Chunks:          {}", manifest.chunk_count);
            println!(
                "Embeddings:      {} (dimension {})",
                manifest.embedding_model, manifest.dimension
            );
            println!("Generation:      {}", manifest.generation);
            println!("Indexed at:      {created}");
        }
        None => {
            println!("No document indexed. Run 'docqa ingest <file.pdf>'.");
        }
    }

    let endpoint = RemoteEndpoint::from_config(&settings.remote);
    println!(
        "API key:         {}",
        if endpoint.has_api_key() {
            "configured"
        } else {
            "missing"
        }
    );
    Ok(())
}
