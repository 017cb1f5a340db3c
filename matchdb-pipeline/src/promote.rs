//! The promotion engine: cleaned staging rows become production teams and
//! matches. Each row is handled in its own transaction on an authorized
//! connection, so one bad row cannot poison a batch and a killed process
//! leaves nothing half-promoted.

use chrono::{NaiveDateTime, Utc};
use log::{info, warn};
use matchdb_db::models::{DbStagingGame, NewMatch, NewPromotionError, NewTeam};
use matchdb_db::{Connection, ConnectionPool, PgConnection, authz, db};
use matchdb_parsing::{TeamIdentity, extract_identity};
use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

const SEMANTIC_MERGE_REASON: &str = "semantic duplicate: promotion merge";
const CHANGED_BY: &str = "promotion";

#[derive(Debug, Error, Diagnostic)]
pub enum PromoteError {
    #[error("could not get a database connection")]
    Pool(#[from] matchdb_db::PoolError),

    #[error(transparent)]
    Query(#[from] matchdb_db::QueryError),
}

#[derive(Debug, Error)]
enum RowError {
    #[error("staging row has no match date")]
    MissingDate,

    #[error("staging row has no event reference")]
    MissingEvent,

    #[error("unknown event kind {0:?}")]
    UnknownEventKind(String),

    #[error("home and away resolved to the same team (id {0})")]
    SelfMatch(i64),

    #[error(transparent)]
    Query(#[from] matchdb_db::QueryError),
}

#[derive(Debug, Default)]
pub struct PromotionStats {
    pub rows_processed: u64,
    pub teams_created: u64,
    pub matches_created: u64,
    pub matches_merged: u64,
    pub semantic_merges: u64,
    pub rows_failed: u64,
}

impl fmt::Display for PromotionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rows processed: {}", self.rows_processed)?;
        writeln!(f, "teams created: {}", self.teams_created)?;
        writeln!(
            f,
            "matches: {} created, {} merged by key, {} merged semantically",
            self.matches_created, self.matches_merged, self.semantic_merges
        )?;
        writeln!(f, "rows failed: {}", self.rows_failed)
    }
}

/// Drain unprocessed staging rows in `scraped_at` order until none remain.
pub fn process_staging(
    pool: &ConnectionPool,
    season_year: i32,
    batch_size: usize,
) -> Result<PromotionStats, PromoteError> {
    let mut stats = PromotionStats::default();
    let mut cursor: Option<(NaiveDateTime, i64)> = None;

    loop {
        let batch = authz::with_pipeline_auth::<_, PromoteError, _>(pool, |conn| {
            let batch = db::get_unprocessed_staging_games(conn, batch_size, cursor)?;
            if batch.is_empty() {
                return Ok(batch);
            }
            info!("promoting batch of {} staging rows", batch.len());

            for row in &batch {
                match promote_row(conn, season_year, row, &mut stats) {
                    Ok(()) => stats.rows_processed += 1,
                    Err(err) => {
                        stats.rows_failed += 1;
                        warn!("failed to promote staging row {}: {err}", row.id);
                        record_promotion_error(conn, row, &err)?;
                    }
                }
            }
            Ok(batch)
        })?;

        let Some(last) = batch.last() else {
            break;
        };
        cursor = Some((last.scraped_at, last.id));
    }

    Ok(stats)
}

/// One row, one transaction. Failed rows keep `processed = false` and are
/// retried on the next run.
fn promote_row(
    conn: &mut PgConnection,
    season_year: i32,
    row: &DbStagingGame,
    stats: &mut PromotionStats,
) -> Result<(), RowError> {
    conn.transaction(|conn| {
        let match_date = row.match_date.ok_or(RowError::MissingDate)?;

        let home = resolve_team(conn, season_year, row, &row.home_team_name, stats)?;
        let away = resolve_team(conn, season_year, row, &row.away_team_name, stats)?;
        if home == away {
            return Err(RowError::SelfMatch(home));
        }

        let (league_id, tournament_id) = resolve_event(conn, row)?;

        // Scheduled games must carry null scores, not the (0, 0) artifact a
        // legacy migration used to write.
        let (home_score, away_score) = match (row.home_score, row.away_score) {
            (Some(0), Some(0)) if match_date > Utc::now().date_naive() => (None, None),
            (Some(h), Some(a)) => (Some(h), Some(a)),
            _ => (None, None),
        };

        let outcome = db::upsert_match(
            conn,
            &NewMatch {
                match_date,
                match_time: row.match_time,
                home_team_id: home,
                away_team_id: away,
                home_score,
                away_score,
                league_id,
                tournament_id,
                venue: row.venue.as_deref(),
                division: row.division.as_deref(),
                source_platform: &row.source_platform,
                source_match_key: &row.source_match_key,
            },
        )?;
        if outcome.inserted {
            stats.matches_created += 1;
        } else {
            stats.matches_merged += 1;
        }

        stats.semantic_merges +=
            merge_semantic_duplicates(conn, match_date, home, away, outcome.id)?;

        db::mark_staging_game_processed(conn, row.id)?;
        Ok(())
    })
}

/// Resolve a raw team name to a production team id: source-entity map
/// first (per-source stable binding), then the canonical registry, then
/// create. The map binding is (re)asserted on every path, and the binding
/// the map returns is authoritative.
fn resolve_team(
    conn: &mut PgConnection,
    season_year: i32,
    row: &DbStagingGame,
    raw_name: &str,
    stats: &mut PromotionStats,
) -> Result<i64, RowError> {
    if let Some(bound) =
        db::lookup_source_entity(conn, &row.source_platform, "team", raw_name)?
    {
        return Ok(bound);
    }

    let identity = extract_identity(raw_name, season_year);
    let state = row.state.as_deref();

    let existing = match (&identity.birth_year, &identity.gender) {
        (Some(birth_year), Some(gender)) => db::find_canonical_team(
            conn,
            &identity.canonical_name,
            *birth_year,
            &gender.to_string(),
            state,
            raw_name,
        )?,
        // Teams without full metadata never enter the registry; they are
        // created bare and picked up by reconciliation later.
        _ => None,
    };

    let team_id = match existing {
        Some(id) => id,
        None => {
            let id = create_team(conn, raw_name, &identity, state)?;
            stats.teams_created += 1;
            id
        }
    };

    let team_id = match (&identity.birth_year, &identity.gender) {
        (Some(birth_year), Some(gender)) => db::register_canonical_team(
            conn,
            &identity.canonical_name,
            *birth_year,
            &gender.to_string(),
            state,
            team_id,
            raw_name,
        )?,
        _ => team_id,
    };

    let bound = db::bind_source_entity(conn, &row.source_platform, "team", raw_name, team_id)?;
    Ok(bound)
}

fn create_team(
    conn: &mut PgConnection,
    raw_name: &str,
    identity: &TeamIdentity,
    state: Option<&str>,
) -> Result<i64, RowError> {
    let mut flags = Vec::new();
    if identity.birth_year_conflict {
        flags.push("birth_year_conflict".to_string());
    }
    if identity.birth_year.is_none() {
        flags.push("needs_birth_year_review".to_string());
    }

    let gender = identity.gender.map(|g| g.to_string());
    let id = db::insert_team(
        conn,
        &NewTeam {
            display_name: raw_name,
            canonical_name: &identity.canonical_name,
            birth_year: identity.birth_year,
            gender: gender.as_deref(),
            state,
            status: "active",
            data_quality_flags: flags,
        },
    )?;
    Ok(id)
}

fn resolve_event(
    conn: &mut PgConnection,
    row: &DbStagingGame,
) -> Result<(Option<i64>, Option<i64>), RowError> {
    let source_id = row
        .event_source_id
        .as_deref()
        .ok_or(RowError::MissingEvent)?;
    let name = row.event_name.as_deref().unwrap_or(source_id);
    let kind = row.event_kind.as_deref().unwrap_or("league");

    match kind {
        "league" => {
            let id = db::resolve_league(conn, source_id, &row.source_platform, name)?;
            Ok((Some(id), None))
        }
        "tournament" => {
            let id = db::resolve_tournament(conn, source_id, &row.source_platform, name)?;
            Ok((None, Some(id)))
        }
        other => Err(RowError::UnknownEventKind(other.to_string())),
    }
}

/// Enforce semantic uniqueness after an upsert: when more than one live row
/// occupies `(date, home, away)`, keep the best one and soft-delete the
/// rest, folding scores into the keeper. Keeper choice prefers a row with a
/// real result, then the oldest row.
fn merge_semantic_duplicates(
    conn: &mut PgConnection,
    match_date: chrono::NaiveDate,
    home_team_id: i64,
    away_team_id: i64,
    just_touched: i64,
) -> Result<u64, RowError> {
    let mut occupants =
        db::find_active_matches_by_semantic_key(conn, match_date, home_team_id, away_team_id)?;
    if occupants.len() <= 1 {
        return Ok(0);
    }

    occupants.sort_by_key(|m| {
        let has_real_score = m.home_score.is_some()
            && m.away_score.is_some()
            && !(m.home_score == Some(0) && m.away_score == Some(0));
        (!has_real_score, m.created_at, m.id)
    });

    let keeper = occupants[0].clone();
    let mut merged = 0;
    for loser in &occupants[1..] {
        db::fill_match_scores_if_null(conn, keeper.id, loser.home_score, loser.away_score)?;
        db::soft_delete_match(conn, loser.id, SEMANTIC_MERGE_REASON, CHANGED_BY)?;
        merged += 1;
        if loser.id == just_touched {
            warn!(
                "staging row resolved to match {} which lost a semantic merge to {}",
                loser.id, keeper.id
            );
        }
    }
    Ok(merged)
}

/// The per-row error sink. Written outside the row's (rolled back)
/// transaction so the record survives.
fn record_promotion_error(
    conn: &mut PgConnection,
    row: &DbStagingGame,
    err: &RowError,
) -> Result<(), matchdb_db::QueryError> {
    let message = err.to_string();
    db::insert_promotion_error(
        conn,
        &NewPromotionError {
            staging_game_id: row.id,
            source_match_key: &row.source_match_key,
            message: &message,
            errored_at: Utc::now().naive_utc(),
        },
    )
    .map(|_| ())
}
