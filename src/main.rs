use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use docqa::Settings;
use docqa::cli::{Cli, Commands, commands};
use docqa::error::{ErrorCode, QaError};

fn load_settings(path: Option<&Path>) -> Result<Settings, Box<figment::Error>> {
    match path {
        Some(path) => Settings::load_from(path).map(|mut settings| {
            if settings.workspace_root.is_none() {
                settings.workspace_root = Settings::workspace_root();
            }
            settings
        }),
        None => Settings::load(),
    }
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    let code = err
        .downcast_ref::<QaError>()
        .map(|e| e.code().exit_code())
        .unwrap_or(ErrorCode::Internal.exit_code());
    ExitCode::from(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result: anyhow::Result<()> = if let Commands::Init { force } = cli.command {
        docqa::logging::init();
        commands::init::run_init(force).map_err(Into::into)
    } else {
        let settings = match load_settings(cli.config.as_deref()) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return ExitCode::from(ErrorCode::ConfigError.exit_code());
            }
        };
        docqa::logging::init_with_config(&settings.logging);

        match cli.command {
            Commands::Init { .. } => Ok(()),
            Commands::Config => commands::init::run_config(&settings).map_err(Into::into),
            Commands::Ingest {
                file,
                force,
                no_progress,
            } => commands::ingest::run(&settings, &file, force, no_progress)
                .await
                .map_err(Into::into),
            Commands::Ask {
                question,
                json,
                show_context,
            } => commands::ask::run(&settings, &question.join(" "), json, show_context)
                .await
                .map_err(Into::into),
            Commands::Status { json } => commands::status::run(&settings, json)
                .await
                .map_err(Into::into),
            Commands::Serve { bind } => commands::serve::run(&settings, bind).await,
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code(&e)
        }
    }
}
