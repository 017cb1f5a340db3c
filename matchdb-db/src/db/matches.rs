use crate::db::append_audit;
use crate::models::{DbMatch, NewMatch};
use chrono::{NaiveDate, Utc};
use diesel::sql_types::{Bool, Date, Int4, Int8, Nullable, Text, Time};
use diesel::{PgConnection, QueryableByName, prelude::*, sql_query};

#[derive(Debug, QueryableByName)]
pub struct MatchUpsertOutcome {
    #[diesel(sql_type = Int8)]
    pub id: i64,
    #[diesel(sql_type = Bool)]
    pub inserted: bool,
}

/// Insert a match, or merge into the row that already owns this
/// `source_match_key`. The merge keeps the most informative value per
/// field: real existing scores win over an incoming null, an incoming
/// result wins over a stored `(0, 0)` artifact, and event linkage is only
/// filled when the row has none (a match belongs to exactly one event).
/// The merge is commutative in those fields, so replays are idempotent.
pub fn upsert_match(
    conn: &mut PgConnection,
    row: &NewMatch<'_>,
) -> QueryResult<MatchUpsertOutcome> {
    sql_query(
        "insert into data.matches
            (match_date, match_time, home_team_id, away_team_id,
             home_score, away_score, league_id, tournament_id,
             venue, division, source_platform, source_match_key)
         values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         on conflict (source_match_key) do update set
            home_score = case
                when data.matches.home_score is not null
                     and data.matches.away_score is not null
                     and not (data.matches.home_score = 0 and data.matches.away_score = 0)
                    then data.matches.home_score
                when excluded.home_score is not null
                    then excluded.home_score
                else data.matches.home_score
            end,
            away_score = case
                when data.matches.home_score is not null
                     and data.matches.away_score is not null
                     and not (data.matches.home_score = 0 and data.matches.away_score = 0)
                    then data.matches.away_score
                when excluded.away_score is not null
                    then excluded.away_score
                else data.matches.away_score
            end,
            league_id = case
                when data.matches.league_id is null and data.matches.tournament_id is null
                    then excluded.league_id
                else data.matches.league_id
            end,
            tournament_id = case
                when data.matches.league_id is null and data.matches.tournament_id is null
                    then excluded.tournament_id
                else data.matches.tournament_id
            end,
            match_time = coalesce(data.matches.match_time, excluded.match_time),
            venue = coalesce(data.matches.venue, excluded.venue),
            division = coalesce(data.matches.division, excluded.division)
         returning id, (xmax = 0) as inserted",
    )
    .bind::<Date, _>(row.match_date)
    .bind::<Nullable<Time>, _>(row.match_time)
    .bind::<Int8, _>(row.home_team_id)
    .bind::<Int8, _>(row.away_team_id)
    .bind::<Nullable<Int4>, _>(row.home_score)
    .bind::<Nullable<Int4>, _>(row.away_score)
    .bind::<Nullable<Int8>, _>(row.league_id)
    .bind::<Nullable<Int8>, _>(row.tournament_id)
    .bind::<Nullable<Text>, _>(row.venue)
    .bind::<Nullable<Text>, _>(row.division)
    .bind::<Text, _>(row.source_platform)
    .bind::<Text, _>(row.source_match_key)
    .get_result(conn)
}

/// Live matches occupying a semantic slot `(date, home, away)`.
pub fn find_active_matches_by_semantic_key(
    conn: &mut PgConnection,
    match_date: NaiveDate,
    home_team_id: i64,
    away_team_id: i64,
) -> QueryResult<Vec<DbMatch>> {
    use crate::data_schema::data::matches::dsl;

    dsl::matches
        .filter(dsl::match_date.eq(match_date))
        .filter(dsl::home_team_id.eq(home_team_id))
        .filter(dsl::away_team_id.eq(away_team_id))
        .filter(dsl::deleted_at.is_null())
        .order_by(dsl::created_at.asc())
        .select(DbMatch::as_select())
        .get_results(conn)
}

pub fn get_match(conn: &mut PgConnection, match_id: i64) -> QueryResult<Option<DbMatch>> {
    use crate::data_schema::data::matches::dsl;

    dsl::matches
        .filter(dsl::id.eq(match_id))
        .select(DbMatch::as_select())
        .first(conn)
        .optional()
}

/// Soft-delete one match and write the audit row that makes the deletion
/// recoverable. No-op when the row is already deleted.
pub fn soft_delete_match(
    conn: &mut PgConnection,
    match_id: i64,
    reason: &str,
    changed_by: &str,
) -> QueryResult<bool> {
    use crate::data_schema::data::matches::dsl;

    let Some(row) = get_match(conn, match_id)? else {
        return Ok(false);
    };
    if row.deleted_at.is_some() {
        return Ok(false);
    }

    let affected = diesel::update(
        dsl::matches
            .filter(dsl::id.eq(match_id))
            .filter(dsl::deleted_at.is_null()),
    )
    .set((
        dsl::deleted_at.eq(Utc::now().naive_utc()),
        dsl::deletion_reason.eq(reason),
    ))
    .execute(conn)?;

    if affected > 0 {
        let old_data = serde_json::to_value(&row).ok();
        append_audit(conn, "matches", match_id, "soft_delete", old_data, None, changed_by)?;
    }
    Ok(affected > 0)
}

/// Bulk soft-delete with audit rows, one statement each. The audit insert
/// runs first so `old_data` captures the pre-delete row.
pub fn soft_delete_matches_bulk(
    conn: &mut PgConnection,
    match_ids: &[i64],
    reason: &str,
    changed_by: &str,
) -> QueryResult<usize> {
    use diesel::sql_types::Array;

    if match_ids.is_empty() {
        return Ok(0);
    }
    sql_query(
        "insert into info.audit_log
            (table_name, record_id, action, old_data, changed_by, changed_at)
         select 'matches', m.id, 'soft_delete', to_jsonb(m), $2, now()
         from data.matches m
         where m.id = any($1) and m.deleted_at is null",
    )
    .bind::<Array<Int8>, _>(match_ids)
    .bind::<Text, _>(changed_by)
    .execute(conn)?;

    sql_query(
        "update data.matches
         set deleted_at = now(), deletion_reason = $2
         where id = any($1) and deleted_at is null",
    )
    .bind::<Array<Int8>, _>(match_ids)
    .bind::<Text, _>(reason)
    .execute(conn)
}

/// Bulk hard delete with audit rows; only the garbage-cleanup operator
/// uses this, for rows that should never have existed.
pub fn hard_delete_matches_bulk(
    conn: &mut PgConnection,
    match_ids: &[i64],
    changed_by: &str,
) -> QueryResult<usize> {
    use diesel::sql_types::Array;

    if match_ids.is_empty() {
        return Ok(0);
    }
    sql_query(
        "insert into info.audit_log
            (table_name, record_id, action, old_data, changed_by, changed_at)
         select 'matches', m.id, 'delete', to_jsonb(m), $2, now()
         from data.matches m
         where m.id = any($1)",
    )
    .bind::<Array<Int8>, _>(match_ids)
    .bind::<Text, _>(changed_by)
    .execute(conn)?;

    sql_query("delete from data.matches where id = any($1)")
        .bind::<Array<Int8>, _>(match_ids)
        .execute(conn)
}

/// Merge scores from a duplicate into a survivor: only fills fields the
/// survivor is missing.
pub fn fill_match_scores_if_null(
    conn: &mut PgConnection,
    match_id: i64,
    home_score: Option<i32>,
    away_score: Option<i32>,
) -> QueryResult<usize> {
    sql_query(
        "update data.matches
         set home_score = coalesce(home_score, $2),
             away_score = coalesce(away_score, $3)
         where id = $1
           and home_score is null
           and away_score is null",
    )
    .bind::<Int8, _>(match_id)
    .bind::<Nullable<Int4>, _>(home_score)
    .bind::<Nullable<Int4>, _>(away_score)
    .execute(conn)
}

/// Null out a stored score pair, preserving row identity. Used by the
/// score-repair operator on scheduled games carrying the `(0, 0)` artifact.
pub fn clear_match_scores(
    conn: &mut PgConnection,
    match_id: i64,
    changed_by: &str,
) -> QueryResult<usize> {
    use crate::data_schema::data::matches::dsl;

    let old = get_match(conn, match_id)?;
    let affected = diesel::update(dsl::matches.filter(dsl::id.eq(match_id)))
        .set((
            dsl::home_score.eq(None::<i32>),
            dsl::away_score.eq(None::<i32>),
        ))
        .execute(conn)?;
    if affected > 0 {
        let old_data = old.and_then(|row| serde_json::to_value(&row).ok());
        append_audit(conn, "matches", match_id, "clear_scores", old_data, None, changed_by)?;
    }
    Ok(affected)
}

/// Overwrite a stored score pair with the staging truth.
pub fn set_match_scores(
    conn: &mut PgConnection,
    match_id: i64,
    home_score: i32,
    away_score: i32,
    changed_by: &str,
) -> QueryResult<usize> {
    use crate::data_schema::data::matches::dsl;

    let old = get_match(conn, match_id)?;
    let affected = diesel::update(dsl::matches.filter(dsl::id.eq(match_id)))
        .set((
            dsl::home_score.eq(Some(home_score)),
            dsl::away_score.eq(Some(away_score)),
        ))
        .execute(conn)?;
    if affected > 0 {
        let old_data = old.and_then(|row| serde_json::to_value(&row).ok());
        let new_data = serde_json::json!({ "home_score": home_score, "away_score": away_score });
        append_audit(
            conn,
            "matches",
            match_id,
            "set_scores",
            old_data,
            Some(new_data),
            changed_by,
        )?;
    }
    Ok(affected)
}
