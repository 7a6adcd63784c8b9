//! Ingest command - index a PDF with a progress bar.

use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::error::QaResult;
use crate::qa::{IngestProgress, QaSession};

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} {msg:<24} [{bar:30.cyan/blue}] {pos}/{len} ({elapsed})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Run the ingest command.
pub async fn run(settings: &Settings, file: &Path, force: bool, no_progress: bool) -> QaResult<()> {
    let session = QaSession::from_settings(settings)?;
    let bar = progress_bar(no_progress);
    bar.set_message("Reading PDF");

    let result = session
        .ingest_with_progress(file, force, |event| match event {
            IngestProgress::Loaded { pages } => {
                bar.set_message(format!("Loaded {pages} pages"));
            }
            IngestProgress::Chunked { chunks } => {
                bar.set_length(chunks as u64);
                bar.set_message("Embedding chunks");
            }
            IngestProgress::Embedded { done, total } => {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
            }
            IngestProgress::Persisted { generation } => {
                bar.set_message(format!("Saved generation {generation}"));
            }
        })
        .await;
    bar.finish_and_clear();

    let report = result?;
    let manifest = &report.manifest;
    if report.skipped {
        println!(
            "{} is already indexed (generation {}). Use --force to rebuild.",
            manifest.document.file_name, manifest.generation
        );
    } else {
        println!(
            "Indexed {}: {} pages, {} chunks (generation {})",
            manifest.document.file_name,
            manifest.page_count,
            manifest.chunk_count,
            manifest.generation
        );
        if manifest.chunk_count == 0 {
            println!("No text was extracted. Scanned pages need OCR, which docqa does not do.");
        }
    }
    Ok(())
}
