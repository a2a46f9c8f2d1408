//! Interactive server startup.
//!
//! Prompts for the feature store path and listen address, then starts the
//! server with them.

use std::path::PathBuf;

use dialoguer::{Confirm, Input};
use septic_locator_database::paths;

/// Prompts for `SEPTIC_DB_PATH`, `BIND_ADDR` and `PORT`, then delegates to
/// [`super::run_server`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the server fails to start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Septic Locator Server");
    println!();

    let default_store = paths::store_path_from_env().display().to_string();
    let store_path: String = Input::new()
        .with_prompt("Feature store")
        .default(default_store.clone())
        .interact_text()
        .unwrap_or(default_store);

    if !PathBuf::from(&store_path).exists() {
        println!("Warning: {store_path} does not exist; every lookup will report not covered.");
        println!("Run `septic_locator migrate` and import a dataset first.");
    }

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default("127.0.0.1".to_string())
        .interact_text()
        .unwrap_or_else(|_| "127.0.0.1".to_string());

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(8080)
        .interact_text()
        .unwrap_or(8080);

    if !Confirm::new()
        .with_prompt(format!("Serve {store_path} on {bind_addr}:{port}?"))
        .default(true)
        .interact()
        .unwrap_or(false)
    {
        println!("Cancelled.");
        return Ok(());
    }

    // SAFETY: called before the server starts; nothing else touches these
    // variables concurrently.
    unsafe {
        std::env::set_var("SEPTIC_DB_PATH", &store_path);
        std::env::set_var("BIND_ADDR", &bind_addr);
        std::env::set_var("PORT", port.to_string());
    }

    super::run_server().await
}
