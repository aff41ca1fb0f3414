//! `seatwatch windows`

use crate::server::AppConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use seatwatch_core::describe_windows;

/// Print the polling schedule and the wait that applies right now
pub fn run(config: &AppConfig) -> Result<()> {
    let ticker = config.ticker().context("Invalid schedule")?;
    let now = Utc::now();

    println!(
        "Default interval: {}s",
        ticker.default_interval().as_secs()
    );
    if ticker.windows().is_empty() {
        println!("No deadlines configured.");
    } else {
        println!("\n{}\n", describe_windows(ticker.windows()));
    }

    match ticker.active_window(now) {
        Some(window) => println!("Now inside: {} ({}s)", window.label, window.interval.as_secs()),
        None => println!("Now outside every window"),
    }
    println!("Next poll in {}s", ticker.wait_at(now).as_secs());
    Ok(())
}
