//! Replay audited match deletions back into production. The inverse of a
//! bad dedup run: everything a named operator deleted inside a window is
//! brought back, merging into whatever live row owns the semantic slot now.

use super::{OperatorOutcome, ReconcileError, finish_operator};
use chrono::NaiveDate;
use log::info;
use matchdb_db::db::RestoreOutcome;
use matchdb_db::{Connection, ConnectionPool, authz, db};

/// Restores are replayed in batches so one bad audit row only rolls back
/// its own batch.
const RESTORE_BATCH_SIZE: usize = 500;

pub fn run(
    pool: &ConnectionPool,
    changed_by: &str,
    from: NaiveDate,
    to: NaiveDate,
    reconcile_timeout_seconds: i64,
    execute: bool,
) -> Result<OperatorOutcome, ReconcileError> {
    let mut outcome = OperatorOutcome {
        dry_run: !execute,
        ..Default::default()
    };

    // The window is inclusive of both end dates
    let from_ts = from.and_hms_opt(0, 0, 0).expect("midnight exists");
    let to_ts = to
        .succ_opt()
        .unwrap_or(to)
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists");

    authz::with_pipeline_auth::<_, ReconcileError, _>(pool, |conn| {
        db::set_current_user_statement_timeout(conn, reconcile_timeout_seconds)?;

        let entries = db::destructive_audit_entries(conn, "matches", changed_by, from_ts, to_ts)?;
        outcome.examined = entries.len() as u64;
        outcome.note(format!(
            "{} audited deletions by {changed_by:?} between {from} and {to}",
            entries.len()
        ));

        if !execute {
            return Ok(());
        }

        let mut restored = 0u64;
        let mut merged = 0u64;
        let mut already_live = 0u64;
        let mut no_payload = 0u64;

        for batch in entries.chunks(RESTORE_BATCH_SIZE) {
            conn.transaction(|conn| {
                for entry in batch {
                    match db::restore_match_from_audit(conn, entry)? {
                        RestoreOutcome::Restored => restored += 1,
                        RestoreOutcome::MergedIntoSurvivor(_) => merged += 1,
                        RestoreOutcome::AlreadyLive => already_live += 1,
                        RestoreOutcome::NoPayload => no_payload += 1,
                    }
                }
                Ok::<_, matchdb_db::QueryError>(())
            })?;
            info!("restored batch of {}", batch.len());
        }

        outcome.mutated = restored + merged;
        outcome.note(format!(
            "{restored} restored, {merged} merged into survivors, \
             {already_live} already live, {no_payload} without payload"
        ));

        finish_operator(conn, &outcome)
    })?;

    Ok(outcome)
}
