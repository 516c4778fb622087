//! Purge SQLite entries by age or count.

use anyhow::{Result, bail};
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use stowage_core::SqliteEngine;

/// Output of `purge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

pub async fn run(engine: &SqliteEngine, older_than_days: Option<i64>, max_entries: Option<usize>) -> Result<PurgeOutput> {
    if older_than_days.is_none() && max_entries.is_none() {
        bail!("at least one of --older-than-days or --max-entries must be given");
    }

    let mut deleted = 0u64;

    if let Some(days) = older_than_days {
        let Some(age) = TimeDelta::try_days(days).filter(|age| *age >= TimeDelta::zero()) else {
            bail!("--older-than-days must be a non-negative number of days, got {days}");
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(age) else {
            bail!("--older-than-days {days} reaches past the earliest representable date");
        };
        deleted += engine.remove_updated_before(cutoff).await?;
    }

    if let Some(max_entries) = max_entries {
        deleted += engine.retain_newest(max_entries).await?;
    }

    tracing::info!(deleted, "purged entries");
    Ok(PurgeOutput { deleted })
}
