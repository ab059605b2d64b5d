//! Destination management commands.

use super::Context;
use usersync_core::{Destination, SettingsHandle};
use usersync_engine::{EngineConfig, RemoteRegistry};

fn registry(
    context: &Context,
) -> Result<(SettingsHandle, RemoteRegistry), Box<dyn std::error::Error>> {
    let settings = SettingsHandle::new(context.load_settings()?);
    let registry = RemoteRegistry::new(settings.clone(), EngineConfig::default());
    Ok((settings, registry))
}

/// Lists destinations.
pub fn list(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (_, registry) = registry(context)?;
    let destinations = registry.list();
    if destinations.is_empty() {
        println!("No remote sites configured");
        return Ok(());
    }

    println!("Remote Sites");
    println!("============");
    for destination in destinations {
        let state = if destination.is_active() {
            "active"
        } else {
            "inert"
        };
        println!("  {} ({})", destination.url, state);
    }
    Ok(())
}

/// Adds a destination, replacing any entry with the same base URL.
pub fn add(context: &Context, url: &str, api_key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (settings, registry) = registry(context)?;
    registry.add(Destination::new(url, api_key));
    context.save_settings(&settings.snapshot())?;
    println!("Added {}", url);
    Ok(())
}

/// Removes a destination.
pub fn remove(context: &Context, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (settings, registry) = registry(context)?;
    if !registry.remove(url) {
        return Err(format!("No remote site with URL {}", url).into());
    }
    context.save_settings(&settings.snapshot())?;
    println!("Removed {}", url);
    Ok(())
}
