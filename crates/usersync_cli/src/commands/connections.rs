//! Test-connections command implementation.

use super::Context;

/// Runs the test-connections command.
pub fn run(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher = context.dispatcher()?;
    let reports = dispatcher.test_connections()?;

    let mut failed = 0;
    for report in &reports {
        let mark = if report.success { "OK" } else { "FAIL" };
        if !report.success {
            failed += 1;
        }
        println!("[{:>4}] {} - {}", mark, report.url, report.message);
    }

    if failed > 0 {
        return Err(format!("{} of {} connections failed", failed, reports.len()).into());
    }
    Ok(())
}
