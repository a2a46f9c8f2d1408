//! Interactive menu shown when `septic_locator` runs without a subcommand.

use std::path::{Path, PathBuf};

use dialoguer::{Input, Select};
use septic_locator_cli_utils::MultiProgress;
use septic_locator_ingest::ImportOptions;

use crate::commands;

/// Top-level actions.
enum Action {
    Lookup,
    Import,
    Seed,
    Sources,
    History,
    Migrate,
    Server,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Lookup,
        Self::Import,
        Self::Seed,
        Self::Sources,
        Self::History,
        Self::Migrate,
        Self::Server,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Lookup => "Look up a location",
            Self::Import => "Import a GeoJSON dataset",
            Self::Seed => "Register data sources",
            Self::Sources => "List data sources",
            Self::History => "Show recent lookups",
            Self::Migrate => "Create feature store tables",
            Self::Server => "Start server",
        }
    }
}

/// Prompts for an action and its parameters, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the chosen action fails.
pub async fn run(
    path: &Path,
    log_path: &Path,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Septic Locator");
    println!("Feature store: {}", path.display());
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Lookup => {
            let lat: f64 = Input::new().with_prompt("Latitude").interact_text()?;
            let lng: f64 = Input::new().with_prompt("Longitude").interact_text()?;
            let radius: f64 = Input::new()
                .with_prompt("Radius (meters)")
                .default(200.0)
                .interact_text()?;
            commands::lookup(path, lat, lng, Some(radius)).await?;
        }
        Action::Import => {
            let file: String = Input::new().with_prompt("GeoJSON file").interact_text()?;
            let source_id: String = Input::new().with_prompt("Source ID").interact_text()?;
            let county: String = Input::new().with_prompt("County").interact_text()?;
            let state: String = Input::new()
                .with_prompt("State")
                .default("FL".to_string())
                .interact_text()?;
            let options = ImportOptions {
                source_id,
                county,
                state,
                data_source: None,
            };
            commands::import(path, &PathBuf::from(file), &options, multi)?;
        }
        Action::Seed => {
            let file: String = Input::new()
                .with_prompt("Seed file (blank for the bundled Florida sources)")
                .allow_empty(true)
                .interact_text()?;
            let file = file.trim();
            let file = (!file.is_empty()).then(|| PathBuf::from(file));
            commands::seed(path, file.as_deref())?;
        }
        Action::Sources => commands::list_sources(path)?,
        Action::History => commands::history(log_path, 20)?,
        Action::Migrate => commands::migrate(path)?,
        Action::Server => {
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(septic_locator_server::interactive::run())
            })
            .await??;
        }
    }

    Ok(())
}
