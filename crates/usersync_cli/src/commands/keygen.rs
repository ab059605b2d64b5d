//! Keygen command implementation.

use super::Context;
use usersync_core::generate_api_key;

/// Runs the keygen command.
///
/// Prints a fresh key; with `write` the key also replaces the inbound key in
/// the settings file. Peers holding the old key stop being accepted.
pub fn run(context: &Context, write: bool) -> Result<(), Box<dyn std::error::Error>> {
    let key = generate_api_key();

    if write {
        let mut settings = context.load_settings()?;
        settings.api_key = key.clone();
        context.save_settings(&settings)?;
        tracing::info!("inbound API key replaced");
    }

    println!("{}", key);
    Ok(())
}
