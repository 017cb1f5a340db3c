use crate::models::{DbAuditLog, NewAuditLog};
use chrono::{NaiveDateTime, Utc};
use diesel::sql_types::Jsonb;
use diesel::{PgConnection, prelude::*, sql_query};

pub fn append_audit(
    conn: &mut PgConnection,
    table_name: &str,
    record_id: i64,
    action: &str,
    old_data: Option<serde_json::Value>,
    new_data: Option<serde_json::Value>,
    changed_by: &str,
) -> QueryResult<usize> {
    use crate::info_schema::info::audit_log::dsl;

    NewAuditLog {
        table_name,
        record_id,
        action,
        old_data,
        new_data,
        changed_by,
        changed_at: Utc::now().naive_utc(),
    }
    .insert_into(dsl::audit_log)
    .execute(conn)
}

/// Destructive actions by one operator inside a time window, oldest first.
/// Feeds the recovery operator.
pub fn destructive_audit_entries(
    conn: &mut PgConnection,
    table: &str,
    changed_by: &str,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> QueryResult<Vec<DbAuditLog>> {
    use crate::info_schema::info::audit_log::dsl;

    dsl::audit_log
        .filter(dsl::table_name.eq(table))
        .filter(dsl::changed_by.eq(changed_by))
        .filter(dsl::action.eq_any(["delete", "soft_delete"]))
        .filter(dsl::changed_at.ge(from))
        .filter(dsl::changed_at.lt(to))
        .order_by(dsl::changed_at.asc())
        .select(DbAuditLog::as_select())
        .get_results(conn)
}

/// What happened to one audited match during recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The row is live again (un-deleted or reinserted).
    Restored,
    /// A different live row owns the semantic slot; its missing scores were
    /// filled from the audited row and the audited row stays deleted.
    MergedIntoSurvivor(i64),
    /// Nothing to do: the row is already live.
    AlreadyLive,
    /// The audit row carried no old_data payload.
    NoPayload,
}

/// Bring one audited match deletion back. Safe to run repeatedly: every
/// branch is a no-op the second time around.
pub fn restore_match_from_audit(
    conn: &mut PgConnection,
    entry: &DbAuditLog,
) -> QueryResult<RestoreOutcome> {
    use crate::data_schema::data::matches::dsl;

    let Some(old_data) = entry.old_data.as_ref() else {
        return Ok(RestoreOutcome::NoPayload);
    };

    // The shape we need back out of the audit payload
    let match_date = old_data
        .get("match_date")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<chrono::NaiveDate>().ok());
    let home_team_id = old_data.get("home_team_id").and_then(|v| v.as_i64());
    let away_team_id = old_data.get("away_team_id").and_then(|v| v.as_i64());
    let home_score = old_data
        .get("home_score")
        .and_then(|v| v.as_i64())
        .map(|n| n as i32);
    let away_score = old_data
        .get("away_score")
        .and_then(|v| v.as_i64())
        .map(|n| n as i32);

    // Someone else may own the semantic slot now; merging beats violating
    // the uniqueness constraint on reinsert.
    if let (Some(date), Some(home), Some(away)) = (match_date, home_team_id, away_team_id) {
        let survivors = crate::db::find_active_matches_by_semantic_key(conn, date, home, away)?;
        if let Some(survivor) = survivors.iter().find(|m| m.id != entry.record_id) {
            crate::db::fill_match_scores_if_null(conn, survivor.id, home_score, away_score)?;
            return Ok(RestoreOutcome::MergedIntoSurvivor(survivor.id));
        }
    }

    match crate::db::get_match(conn, entry.record_id)? {
        Some(row) if row.deleted_at.is_none() => Ok(RestoreOutcome::AlreadyLive),
        Some(_) => {
            diesel::update(dsl::matches.filter(dsl::id.eq(entry.record_id)))
                .set((
                    dsl::deleted_at.eq(None::<NaiveDateTime>),
                    dsl::deletion_reason.eq(None::<String>),
                ))
                .execute(conn)?;
            Ok(RestoreOutcome::Restored)
        }
        None => {
            // The row was hard-deleted; rebuild it from the audit payload.
            // Reinserting under the original id keeps downstream references
            // valid, and the key conflict path un-deletes plus fills.
            sql_query(
                "insert into data.matches
                 select * from jsonb_populate_record(null::data.matches, $1)
                 on conflict (source_match_key) do update set
                    deleted_at = null,
                    deletion_reason = null,
                    home_score = coalesce(data.matches.home_score, excluded.home_score),
                    away_score = coalesce(data.matches.away_score, excluded.away_score),
                    league_id = coalesce(data.matches.league_id, excluded.league_id),
                    tournament_id = coalesce(data.matches.tournament_id, excluded.tournament_id)",
            )
            .bind::<Jsonb, _>(old_data)
            .execute(conn)?;
            Ok(RestoreOutcome::Restored)
        }
    }
}
