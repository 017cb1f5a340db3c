//! Delete garbage matches: impossible far-future dates with no event
//! linkage. Next season's scheduled games are legitimate, so the
//! present-year-plus-one window is preserved.

use super::{OperatorOutcome, ReconcileError, finish_operator};
use diesel::sql_types::Int8;
use diesel::{QueryableByName, prelude::*, sql_query};
use matchdb_db::{Connection, ConnectionPool, authz, db};

const CHANGED_BY: &str = "garbageCleanup";

/// Dates from this year on are treated as data errors (no youth schedule
/// publishes that far ahead), subject to the plus-one-year carve-out.
const IMPOSSIBLE_YEAR: i32 = 2027;

#[derive(QueryableByName)]
struct MatchIdRow {
    #[diesel(sql_type = Int8)]
    id: i64,
}

pub fn run(
    pool: &ConnectionPool,
    reconcile_timeout_seconds: i64,
    execute: bool,
) -> Result<OperatorOutcome, ReconcileError> {
    let mut outcome = OperatorOutcome {
        dry_run: !execute,
        ..Default::default()
    };

    authz::with_pipeline_auth::<_, ReconcileError, _>(pool, |conn| {
        db::set_current_user_statement_timeout(conn, reconcile_timeout_seconds)?;

        let garbage: Vec<i64> = sql_query(
            "select id
             from data.matches
             where league_id is null
               and tournament_id is null
               and extract(year from match_date)::int >= $1
               and extract(year from match_date)::int
                   > extract(year from current_date)::int + 1",
        )
        .bind::<diesel::sql_types::Int4, _>(IMPOSSIBLE_YEAR)
        .load::<MatchIdRow>(conn)?
        .into_iter()
        .map(|row| row.id)
        .collect();

        outcome.examined = garbage.len() as u64;
        outcome.note(format!(
            "{} unlinked matches with impossible dates",
            garbage.len()
        ));

        if execute && !garbage.is_empty() {
            conn.transaction(|conn| {
                db::hard_delete_matches_bulk(conn, &garbage, CHANGED_BY)
            })?;
            outcome.mutated = garbage.len() as u64;
        }

        finish_operator(conn, &outcome)
    })?;

    Ok(outcome)
}
