use caidan_core::{CaidanError, Countdown, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use std::time::Duration;

#[derive(Args)]
pub struct CountdownArgs {
    /// Draw time in RFC 3339, e.g. 2025-06-01T20:00:00Z
    #[arg(long)]
    at: String,

    /// Stop after this many updates
    #[arg(long)]
    ticks: Option<u32>,
}

pub async fn handle_countdown_command(args: CountdownArgs) -> Result<()> {
    let deadline = DateTime::parse_from_rfc3339(&args.at)
        .map_err(|e| CaidanError::config(format!("Invalid draw time '{}': {}", args.at, e)))?
        .with_timezone(&Utc);

    let countdown = Countdown::spawn(deadline, Duration::from_secs(1));
    let mut updates = countdown.subscribe();
    let mut shown = 0;

    loop {
        let display = *updates.borrow_and_update();
        if display.expired {
            println!("The draw is closed.");
            break;
        }
        println!("Next draw in {}", display);

        shown += 1;
        if args.ticks.is_some_and(|limit| shown >= limit) {
            break;
        }
        if updates.changed().await.is_err() {
            break;
        }
    }

    Ok(())
}
