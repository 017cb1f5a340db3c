use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How many error messages the end-of-run summary shows.
const SUMMARY_ERROR_LIMIT: usize = 5;

/// Counters for one engine run. Also embedded (cumulatively) in the
/// checkpoint file so a resumed run reports totals across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub events_found: u32,
    pub events_processed: u32,
    pub events_successful: u32,
    pub events_failed: u32,
    pub events_skipped: u32,
    pub matches_found: u64,
    pub matches_staged: u64,
    #[serde(skip)]
    pub started_at: Option<DateTime<Utc>>,
    pub runtime_seconds: i64,
    pub errors: Vec<String>,
}

impl RunStats {
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(now),
            ..Default::default()
        }
    }

    pub fn record_error(&mut self, event_id: &str, message: impl fmt::Display) {
        self.errors.push(format!("{event_id}: {message}"));
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        if let Some(started) = self.started_at {
            self.runtime_seconds = (now - started).num_seconds();
        }
    }

    /// Fold a previous run's checkpointed stats into this one.
    pub fn absorb(&mut self, earlier: &RunStats) {
        self.events_found += earlier.events_found;
        self.events_processed += earlier.events_processed;
        self.events_successful += earlier.events_successful;
        self.events_failed += earlier.events_failed;
        self.events_skipped += earlier.events_skipped;
        self.matches_found += earlier.matches_found;
        self.matches_staged += earlier.matches_staged;
        self.runtime_seconds += earlier.runtime_seconds;
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "events: {} found, {} processed ({} ok, {} failed, {} skipped)",
            self.events_found,
            self.events_processed,
            self.events_successful,
            self.events_failed,
            self.events_skipped,
        )?;
        writeln!(
            f,
            "matches: {} found, {} staged",
            self.matches_found, self.matches_staged
        )?;
        writeln!(f, "runtime: {}s", self.runtime_seconds)?;
        if !self.errors.is_empty() {
            writeln!(
                f,
                "errors ({} total, first {}):",
                self.errors.len(),
                SUMMARY_ERROR_LIMIT.min(self.errors.len())
            )?;
            for error in self.errors.iter().take(SUMMARY_ERROR_LIMIT) {
                writeln!(f, "  {error}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_truncates_errors_to_five() {
        let mut stats = RunStats::default();
        for i in 0..8 {
            stats.record_error(&format!("E{i}"), "boom");
        }
        let rendered = stats.to_string();
        assert!(rendered.contains("8 total, first 5"));
        assert!(rendered.contains("E4: boom"));
        assert!(!rendered.contains("E5: boom"));
    }

    #[test]
    fn absorb_accumulates_counters() {
        let mut earlier = RunStats::default();
        earlier.matches_staged = 10;
        earlier.events_successful = 2;

        let mut current = RunStats::default();
        current.matches_staged = 5;
        current.absorb(&earlier);
        assert_eq!(current.matches_staged, 15);
        assert_eq!(current.events_successful, 2);
    }
}
