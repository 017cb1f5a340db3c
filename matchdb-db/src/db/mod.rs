mod audit;
mod diag;
mod events;
mod matches;
mod registry;
mod staging;
mod teams;

pub use audit::*;
pub use diag::*;
pub use events::*;
pub use matches::*;
pub use registry::*;
pub use staging::*;
pub use teams::*;

use chrono::Utc;
use diesel::{PgConnection, prelude::*, sql_query};
use log::debug;
use thiserror::Error;

pub fn set_current_user_statement_timeout(
    conn: &mut PgConnection,
    timeout_seconds: i64,
) -> QueryResult<usize> {
    // `alter role` cannot take a prepared parameter, so the statement is
    // built from a string. `timeout_seconds` is an i64 and cannot contain a
    // quote character.
    sql_query(format!(
        "alter role CURRENT_USER set statement_timeout='{}s'",
        timeout_seconds
    ))
    .execute(conn)
}

/// Season year drives the `U{age}` -> birth-year mapping and the valid
/// birth-year window. Sourced from the seasons table; `fallback` covers a
/// store that has never had one inserted.
pub fn current_season_year(conn: &mut PgConnection, fallback: i32) -> QueryResult<i32> {
    use crate::data_schema::data::seasons::dsl;

    dsl::seasons
        .filter(dsl::is_current.eq(true))
        .select(dsl::year)
        .first(conn)
        .optional()
        .map(|year| year.unwrap_or(fallback))
}

/// Kick the metrics materialized views after reconciliation. The procedure
/// lives database-side; refresh scheduling is not this pipeline's problem.
pub fn refresh_team_metrics(conn: &mut PgConnection) -> QueryResult<()> {
    sql_query("select refresh_team_metrics()")
        .execute(conn)
        .map(|_| ())
}

#[derive(Debug, Error)]
#[error("staging write probe failed; the configured credentials cannot write staging")]
pub struct WriteProbeError(#[source] pub diesel::result::Error);

/// Insert-then-delete a marker row in staging. Run at engine startup so a
/// misconfigured credential fails the run before any scraping happens.
pub fn probe_staging_writable(conn: &mut PgConnection) -> Result<(), WriteProbeError> {
    use crate::staging_schema::staging::games::dsl;

    let marker_key = format!("probe-{}-{}", std::process::id(), Utc::now().timestamp_micros());
    debug!("running staging write probe with key {marker_key}");

    let probe_row = crate::models::NewStagingGame {
        source_platform: "probe",
        source_match_key: &marker_key,
        match_number: None,
        match_date: None,
        match_time: None,
        home_team_name: "probe",
        away_team_name: "probe",
        home_score: None,
        away_score: None,
        event_source_id: None,
        event_name: None,
        event_kind: None,
        venue: None,
        division: None,
        state: None,
        status: "scheduled",
        raw_data: &serde_json::Value::Null,
        processed: true,
        scraped_at: Utc::now().naive_utc(),
    };

    probe_row
        .insert_into(dsl::games)
        .execute(conn)
        .map_err(WriteProbeError)?;
    diesel::delete(dsl::games.filter(dsl::source_match_key.eq(&marker_key)))
        .execute(conn)
        .map_err(WriteProbeError)?;
    Ok(())
}
