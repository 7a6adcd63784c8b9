//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

const AFTER_HELP: &str = "\
Quick Start:
  $ docqa init                          # Create .docqa/settings.toml
  $ docqa ingest syllabus.pdf           # Index a document
  $ docqa ask \"What happens if I am absent?\"
  $ docqa serve --bind 0.0.0.0:8080     # HTTP API";

/// Ask questions about a PDF document
#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version = env!("CARGO_PKG_VERSION"),
    about = "Ask questions about a PDF document",
    long_about = "Index a PDF with a remote embedding model and answer questions \
                  from its content with a remote chat model.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set up .docqa directory with default settings
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// Index a PDF, replacing the current document
    Ingest {
        /// Path to the PDF file
        file: PathBuf,

        /// Rebuild even if this exact document is already indexed
        #[arg(short, long)]
        force: bool,

        /// Don't draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Ask a question about the ingested document
    Ask {
        /// The question (several words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Also print the retrieved context
        #[arg(long)]
        show_context: bool,
    },

    /// Show what is indexed
    Status {
        /// Print status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },
}
