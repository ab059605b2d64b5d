//! Status command implementation.

use super::Context;

/// Runs the status command.
pub fn run(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let engine = context.engine()?;
    let status = engine.status()?;

    println!("UserSync Status");
    println!("===============");
    println!("Accounts:            {}", status.total_accounts);
    println!("Active remote sites: {}", status.active_destinations);
    println!(
        "Lifecycle sync:      {}",
        if status.enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
