//! Reconciliation operators: single-purpose, idempotent bulk-SQL jobs over
//! the production tables. All of them share the same discipline — dry-run
//! by default, write authorization on the connection, a transaction per
//! logical unit, an audit row for every destructive write, and a
//! materialized-view refresh once real work happened.

pub mod cleanup;
pub mod cross_import;
pub mod fix_metadata;
pub mod fix_scores;
pub mod merge_duplicates;
pub mod recover;

use log::info;
use matchdb_db::{PgConnection, db};
use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReconcileError {
    #[error("could not get a database connection")]
    Pool(#[from] matchdb_db::PoolError),

    #[error(transparent)]
    Query(#[from] matchdb_db::QueryError),
}

#[derive(Debug, Default)]
pub struct OperatorOutcome {
    pub dry_run: bool,
    pub examined: u64,
    pub mutated: u64,
    pub failed_groups: u64,
    pub notes: Vec<String>,
}

impl OperatorOutcome {
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

impl fmt::Display for OperatorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(
                f,
                "dry run: {} candidates found, nothing written (pass --execute to apply)",
                self.examined
            )?;
        } else {
            writeln!(f, "examined {}, mutated {}", self.examined, self.mutated)?;
            if self.failed_groups > 0 {
                writeln!(f, "{} groups failed and were skipped", self.failed_groups)?;
            }
        }
        for note in &self.notes {
            writeln!(f, "  {note}")?;
        }
        Ok(())
    }
}

/// Common operator epilogue: refresh the metric views once, and only when
/// the run actually mutated something.
pub(crate) fn finish_operator(
    conn: &mut PgConnection,
    outcome: &OperatorOutcome,
) -> Result<(), ReconcileError> {
    if !outcome.dry_run && outcome.mutated > 0 {
        info!("refreshing team metric views");
        db::refresh_team_metrics(conn)?;
    }
    Ok(())
}
