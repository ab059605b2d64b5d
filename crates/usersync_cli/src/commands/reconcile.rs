//! Reconciliation commands.

use super::Context;
use usersync_core::AccountId;
use usersync_engine::{BatchCursor, BatchReport};

/// Runs the reconcile command.
///
/// Without `all`, processes the single page at `offset`. With `all`, keeps
/// requesting pages until the engine reports completion.
pub fn run(
    context: &Context,
    batch_size: usize,
    offset: usize,
    all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = context.engine()?;
    let mut cursor = BatchCursor::new(offset, batch_size);

    loop {
        let report = engine.run_batch(cursor)?;
        print_page(&report);
        if report.completed || !all {
            break;
        }
        cursor = cursor.advance(report.batch_size_actual);
    }
    Ok(())
}

fn print_page(report: &BatchReport) {
    println!("{}", report.message);
    for error in &report.errors {
        println!("  error: {}", error);
    }
    if !report.completed {
        println!("  next offset: {}", report.total_processed);
    }
}

/// Runs the push-user command.
pub fn push_user(context: &Context, id: u64) -> Result<(), Box<dyn std::error::Error>> {
    let engine = context.engine()?;
    let report = engine.sync_account(AccountId(id))?;

    for outcome in &report.outcomes {
        if outcome.is_accepted() {
            println!("  {}: accepted", outcome.url);
        } else {
            println!("  {}", outcome.describe());
        }
    }
    if !report.accepted() {
        return Err(format!("User {} was not accepted by any remote site", id).into());
    }
    println!("User {} synced", id);
    Ok(())
}
