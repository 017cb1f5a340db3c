//! Repair the `(0, 0)` score artifact a legacy migration wrote onto
//! matches that were never played. Staging is the source of truth where a
//! row exists; otherwise a future date is proof enough.

use super::{OperatorOutcome, ReconcileError, finish_operator};
use diesel::sql_types::Array;
use diesel::sql_types::{Int8, Text};
use diesel::{QueryableByName, prelude::*, sql_query};
use matchdb_db::{Connection, ConnectionPool, PgConnection, authz, db};

const CHANGED_BY: &str = "scoreFix";

#[derive(QueryableByName)]
struct MatchIdRow {
    #[diesel(sql_type = Int8)]
    id: i64,
}

#[derive(QueryableByName)]
struct PlatformCountRow {
    #[diesel(sql_type = Text)]
    source_platform: String,
    #[diesel(sql_type = Int8)]
    count: i64,
}

fn load_ids(
    conn: &mut PgConnection,
    sql: &'static str,
) -> Result<Vec<i64>, matchdb_db::QueryError> {
    Ok(sql_query(sql)
        .load::<MatchIdRow>(conn)?
        .into_iter()
        .map(|row| row.id)
        .collect())
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

        // 1. Staging says the game was never played: null the scores out.
        let staging_null: Vec<i64> = load_ids(
            conn,
            "select m.id
             from data.matches m
             join staging.games s on s.source_match_key = m.source_match_key
             where m.deleted_at is null
               and m.home_score = 0 and m.away_score = 0
               and s.home_score is null and s.away_score is null",
        )?;
        outcome.examined += staging_null.len() as u64;
        outcome.note(format!(
            "{} matches where staging confirms unplayed",
            staging_null.len()
        ));
        if execute && !staging_null.is_empty() {
            conn.transaction(|conn| {
                audit_zero_zero(conn, &staging_null, "clear_scores")?;
                sql_query(
                    "update data.matches
                     set home_score = null, away_score = null
                     where id = any($1)",
                )
                .bind::<Array<Int8>, _>(&staging_null)
                .execute(conn)
            })?;
            outcome.mutated += staging_null.len() as u64;
        }

        // 2. Staging has the real result: overwrite.
        let staging_real: Vec<i64> = load_ids(
            conn,
            "select m.id
             from data.matches m
             join staging.games s on s.source_match_key = m.source_match_key
             where m.deleted_at is null
               and m.home_score = 0 and m.away_score = 0
               and s.home_score is not null and s.away_score is not null
               and not (s.home_score = 0 and s.away_score = 0)",
        )?;
        outcome.examined += staging_real.len() as u64;
        outcome.note(format!(
            "{} matches where staging has the real score",
            staging_real.len()
        ));
        if execute && !staging_real.is_empty() {
            conn.transaction(|conn| {
                audit_zero_zero(conn, &staging_real, "set_scores")?;
                sql_query(
                    "update data.matches m
                     set home_score = s.home_score, away_score = s.away_score
                     from staging.games s
                     where s.source_match_key = m.source_match_key
                       and m.id = any($1)",
                )
                .bind::<Array<Int8>, _>(&staging_real)
                .execute(conn)
            })?;
            outcome.mutated += staging_real.len() as u64;
        }

        // 3. No staging row, but the date is in the future: scheduled games
        // have no score.
        let future: Vec<i64> = load_ids(
            conn,
            "select m.id
             from data.matches m
             where m.deleted_at is null
               and m.home_score = 0 and m.away_score = 0
               and m.match_date > current_date",
        )?;
        outcome.examined += future.len() as u64;
        outcome.note(format!("{} future matches carrying (0, 0)", future.len()));
        if execute && !future.is_empty() {
            conn.transaction(|conn| {
                audit_zero_zero(conn, &future, "clear_scores")?;
                sql_query(
                    "update data.matches
                     set home_score = null, away_score = null
                     where id = any($1)",
                )
                .bind::<Array<Int8>, _>(&future)
                .execute(conn)
            })?;
            outcome.mutated += future.len() as u64;
        }

        // The remainder — past matches with (0, 0) and no staging evidence —
        // might be genuine goalless draws; report them for manual review.
        let remainder: Vec<PlatformCountRow> = sql_query(
            "select m.source_platform, count(*) as count
             from data.matches m
             where m.deleted_at is null
               and m.home_score = 0 and m.away_score = 0
               and m.match_date <= current_date
               and not exists (
                   select 1 from staging.games s
                   where s.source_match_key = m.source_match_key
               )
             group by m.source_platform
             order by count desc",
        )
        .load(conn)?;
        for row in &remainder {
            outcome.note(format!(
                "manual review: {} ambiguous (0, 0) matches from {}",
                row.count, row.source_platform
            ));
        }

        finish_operator(conn, &outcome)
    })?;

    Ok(outcome)
}

fn audit_zero_zero(
    conn: &mut PgConnection,
    ids: &[i64],
    action: &str,
) -> Result<usize, matchdb_db::QueryError> {
    sql_query(
        "insert into info.audit_log
            (table_name, record_id, action, old_data, changed_by, changed_at)
         select 'matches', m.id, $2, to_jsonb(m), $3, now()
         from data.matches m
         where m.id = any($1)",
    )
    .bind::<Array<Int8>, _>(ids)
    .bind::<Text, _>(action)
    .bind::<Text, _>(CHANGED_BY)
    .execute(conn)
}
