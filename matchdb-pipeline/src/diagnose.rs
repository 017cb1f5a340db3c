//! Read-only diagnostics. Prints what is wrong and exactly which operator
//! fixes it; never mutates data.

use matchdb_db::{ConnectionPool, authz, db};
use miette::Diagnostic;
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DiagnoseError {
    #[error("could not get a database connection")]
    Pool(#[from] matchdb_db::PoolError),

    #[error(transparent)]
    Query(#[from] matchdb_db::QueryError),
}

#[derive(Debug, Clone)]
pub enum DiagnoseRequest {
    Team(String),
    TeamId(i64),
    HealthCheck,
    StagingStatus,
}

pub fn run(pool: &ConnectionPool, request: &DiagnoseRequest) -> Result<String, DiagnoseError> {
    let mut conn = pool.get()?;
    let conn = &mut conn;
    let mut report = String::new();

    match request {
        DiagnoseRequest::HealthCheck => {
            let eligible = db::registry_eligible_team_count(conn)?;
            let covered = db::registry_covered_team_count(conn)?;
            let coverage = if eligible > 0 {
                covered as f64 / eligible as f64 * 100.0
            } else {
                100.0
            };
            let _ = writeln!(
                report,
                "canonical registry coverage: {covered}/{eligible} ({coverage:.1}%)"
            );
            if covered < eligible {
                let _ = writeln!(
                    report,
                    "  -> run `matchdb reconcile fix-metadata --execute`"
                );
            }

            let dup_groups = db::duplicate_group_count(conn)?;
            let _ = writeln!(report, "duplicate team groups: {dup_groups}");
            if dup_groups > 0 {
                let _ = writeln!(
                    report,
                    "  -> run `matchdb reconcile merge-duplicates --execute`"
                );
            }

            let bare = db::null_metadata_team_count(conn)?;
            let _ = writeln!(report, "teams with NULL birth_year/gender: {bare}");
            if bare > 0 {
                let _ = writeln!(
                    report,
                    "  -> run `matchdb reconcile fix-metadata --execute`"
                );
            }

            let mismatched = db::stats_mismatch_count(conn)?;
            let _ = writeln!(report, "teams with stale cached counters: {mismatched}");
            if mismatched > 0 {
                let _ = writeln!(
                    report,
                    "  -> run `matchdb reconcile fix-metadata --execute` (phase 3)"
                );
            }

            let orphans = db::orphan_team_count(conn)?;
            let _ = writeln!(report, "orphan teams (ranked, zero matches): {orphans}");
            if orphans > 0 {
                let _ = writeln!(
                    report,
                    "  -> run `matchdb reconcile fix-metadata --execute`"
                );
            }

            let zero_zero = db::scheduled_zero_zero_count(conn)?;
            let _ = writeln!(report, "scheduled matches carrying (0, 0): {zero_zero}");
            if zero_zero > 0 {
                let _ = writeln!(report, "  -> run `matchdb reconcile fix-scores --execute`");
            }

            let backlog = db::unprocessed_staging_count(conn)?;
            let _ = writeln!(report, "staging backlog: {backlog}");
            if backlog > 0 {
                let _ = writeln!(report, "  -> run `matchdb promote --process-staging`");
            }

            let protection = authz::is_write_protection_enabled(conn)?;
            let _ = writeln!(
                report,
                "write protection: {}",
                if protection { "enabled" } else { "DISABLED (break-glass)" }
            );

            let teams = db::active_team_count(conn)?;
            let matches = db::active_match_count(conn)?;
            let _ = writeln!(report, "totals: {teams} active teams, {matches} active matches");
        }

        DiagnoseRequest::StagingStatus => {
            let backlog = db::unprocessed_staging_count(conn)?;
            let rejected = db::rejected_staging_count(conn)?;
            let errors = db::promotion_error_count(conn)?;
            let _ = writeln!(report, "unprocessed staging rows: {backlog}");
            let _ = writeln!(report, "archived rejections: {rejected}");
            let _ = writeln!(report, "promotion errors: {errors}");
            if backlog > 0 {
                let _ = writeln!(report, "  -> run `matchdb validate --clean-staging`");
                let _ = writeln!(report, "  -> then `matchdb promote --process-staging`");
            }
        }

        DiagnoseRequest::TeamId(team_id) => match db::get_team(conn, *team_id)? {
            Some(team) => describe_team(&mut report, &team),
            None => {
                let _ = writeln!(report, "no team with id {team_id}");
            }
        },

        DiagnoseRequest::Team(needle) => {
            let teams = db::find_teams_by_name(conn, needle)?;
            if teams.is_empty() {
                let _ = writeln!(report, "no teams matching {needle:?}");
            }
            for team in &teams {
                describe_team(&mut report, team);
            }
        }
    }

    Ok(report)
}

fn describe_team(report: &mut String, team: &matchdb_db::models::DbTeam) {
    let _ = writeln!(
        report,
        "[{}] {} (canonical: {})",
        team.id, team.display_name, team.canonical_name
    );
    let _ = writeln!(
        report,
        "  birth_year: {}, gender: {}, state: {}, status: {}",
        opt(team.birth_year),
        opt(team.gender.as_deref()),
        opt(team.state.as_deref()),
        team.status,
    );
    let _ = writeln!(
        report,
        "  record: {} played ({}-{}-{}), elo {}, national rank {}",
        team.matches_played,
        team.wins,
        team.losses,
        team.draws,
        opt(team.elo_rating),
        opt(team.national_rank),
    );
    if let Some(merged_into) = team.merged_into {
        let _ = writeln!(report, "  merged into team {merged_into}");
    }
    if !team.data_quality_flags.is_empty() {
        let _ = writeln!(report, "  flags: {}", team.data_quality_flags.join(", "));
        let _ = writeln!(
            report,
            "  -> run `matchdb reconcile fix-metadata` to review"
        );
    }
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
