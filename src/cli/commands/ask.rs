//! Ask command - answer one question from the indexed document.

use crate::config::Settings;
use crate::error::{QaError, QaResult};
use crate::qa::{QaSession, QueryResult};

/// Run the ask command.
pub async fn run(
    settings: &Settings,
    question: &str,
    json: bool,
    show_context: bool,
) -> QaResult<()> {
    let session = QaSession::from_settings(settings)?;
    let result = session.query(question).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&result).map_err(|e| QaError::Internal {
            reason: format!("cannot render result: {e}"),
        })?;
        println!("{rendered}");
    } else {
        print_text(&result, show_context);
    }
    Ok(())
}

fn print_text(result: &QueryResult, show_context: bool) {
    println!("{}", result.answer);
    println!();
    println!("Sources: {}", format_pages(&result.source_pages));

    if show_context {
        println!();
        println!("Context:");
        println!("{}", "-".repeat(50));
        for hit in &result.matches {
            println!("[page {}, score {:.3}]", hit.chunk.page_number(), hit.score);
            println!("{}", hit.chunk.text);
            println!();
        }
    }
}

fn format_pages(pages: &[u32]) -> String {
    match pages {
        [] => "none".to_string(),
        [page] => format!("page {page}"),
        _ => {
            let list: Vec<String> = pages.iter().map(u32::to_string).collect();
            format!("pages {}", list.join(", "))
        }
    }
}
