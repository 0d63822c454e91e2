//! `popfeed status` – list persisted posts for a day.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use popfeed_core::store::StatusDb;

pub async fn run_status(date: Option<NaiveDate>, days: bool) -> Result<()> {
    let db = StatusDb::open_default().await?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());

    if days {
        let counts = db.period_counts().await?;
        println!("{:<12} {}", "DAY", "POSTS");
        for (day, n) in counts {
            println!("{:<12} {}", day, n);
        }
        println!();
    }

    let records = db.list_period(date).await?;
    if records.is_empty() {
        println!("No posts stored for {}.", date);
    } else {
        println!("{:<4} {:<8} {:<20} {}", "#", "SCORE", "FETCHED", "LINK");
        for (rank, r) in records.iter().enumerate() {
            println!(
                "{:<4} {:<8} {:<20} {}",
                rank + 1,
                r.score,
                r.fetched_at.format("%Y-%m-%d %H:%M:%S"),
                r.link
            );
        }
    }
    Ok(())
}
