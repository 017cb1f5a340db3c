//! Absorb cross-import duplicates: the same real-world game imported once
//! from a legacy archive and once by a scraper, resolved to different
//! opponent team ids. The scraper side wins; the legacy side is
//! soft-deleted with the survivor recorded in the audit row.

use super::{OperatorOutcome, ReconcileError, finish_operator};
use diesel::sql_types::{Array, Float8, Int8, Text};
use diesel::{QueryableByName, prelude::*, sql_query};
use matchdb_db::{Connection, ConnectionPool, authz, db};

const CHANGED_BY: &str = "crossImportAbsorber";
const DELETE_REASON: &str = "cross-import duplicate";

#[derive(Debug, QueryableByName)]
struct DuplicatePair {
    #[diesel(sql_type = Int8)]
    legacy_id: i64,
    #[diesel(sql_type = Int8)]
    kept_id: i64,
}

/// The 4-way detection join: same date, same event, at least one shared
/// team, scores compatible (null on either side or equal), opponents'
/// birth year/gender compatible, opponent names similar enough (pg_trgm).
/// Each legacy match appears at most once in the result.
const DETECT_SQL: &str = "
    with pairs as (
        select l.id as legacy_id,
               s.id as kept_id,
               row_number() over (partition by l.id order by s.created_at asc, s.id asc) as rn
        from data.matches l
        join data.matches s
          on s.id <> l.id
         and s.deleted_at is null
         and s.match_date = l.match_date
         and ((l.league_id is not null and s.league_id = l.league_id)
           or (l.tournament_id is not null and s.tournament_id = l.tournament_id))
         and (s.home_team_id in (l.home_team_id, l.away_team_id)
           or s.away_team_id in (l.home_team_id, l.away_team_id))
         and (l.home_score is null or s.home_score is null
           or (l.home_score = s.home_score and l.away_score = s.away_score))
        cross join lateral (
            select case when l.home_team_id in (s.home_team_id, s.away_team_id)
                        then l.away_team_id else l.home_team_id end as legacy_opp,
                   case when s.home_team_id in (l.home_team_id, l.away_team_id)
                        then s.away_team_id else s.home_team_id end as kept_opp
        ) opp
        join data.teams lt on lt.id = opp.legacy_opp
        join data.teams st on st.id = opp.kept_opp
        where l.deleted_at is null
          and l.source_platform = $1
          and s.source_platform <> $1
          and (lt.birth_year is null or st.birth_year is null
               or lt.birth_year = st.birth_year)
          and (lt.gender is null or st.gender is null or lt.gender = st.gender)
          and ($2 <= 0 or lt.id = st.id
               or similarity(lt.canonical_name, st.canonical_name) > $2)
    )
    select legacy_id, kept_id from pairs where rn = 1";

pub fn run(
    pool: &ConnectionPool,
    legacy_platform: &str,
    similarity_threshold: f64,
    reconcile_timeout_seconds: i64,
    execute: bool,
) -> Result<OperatorOutcome, ReconcileError> {
    let mut outcome = OperatorOutcome {
        dry_run: !execute,
        ..Default::default()
    };

    authz::with_pipeline_auth::<_, ReconcileError, _>(pool, |conn| {
        db::set_current_user_statement_timeout(conn, reconcile_timeout_seconds)?;

        let pairs: Vec<DuplicatePair> = sql_query(DETECT_SQL)
            .bind::<Text, _>(legacy_platform)
            .bind::<Float8, _>(similarity_threshold)
            .load(conn)?;

        outcome.examined = pairs.len() as u64;
        outcome.note(format!(
            "{} legacy matches duplicated by a scraper import",
            pairs.len()
        ));
        for pair in pairs.iter().take(10) {
            outcome.note(format!(
                "would soft-delete legacy match {} (kept by {})",
                pair.legacy_id, pair.kept_id
            ));
        }

        if execute && !pairs.is_empty() {
            let legacy_ids: Vec<i64> = pairs.iter().map(|p| p.legacy_id).collect();
            let kept_ids: Vec<i64> = pairs.iter().map(|p| p.kept_id).collect();

            conn.transaction(|conn| {
                sql_query(
                    "insert into info.audit_log
                        (table_name, record_id, action, old_data, new_data,
                         changed_by, changed_at)
                     select 'matches', m.id, 'soft_delete', to_jsonb(m),
                            jsonb_build_object('kept_match_id', p.kept_id), $3, now()
                     from (
                         select unnest($1::bigint[]) as legacy_id,
                                unnest($2::bigint[]) as kept_id
                     ) p
                     join data.matches m on m.id = p.legacy_id
                     where m.deleted_at is null",
                )
                .bind::<Array<Int8>, _>(&legacy_ids)
                .bind::<Array<Int8>, _>(&kept_ids)
                .bind::<Text, _>(CHANGED_BY)
                .execute(conn)?;

                sql_query(
                    "update data.matches
                     set deleted_at = now(), deletion_reason = $2
                     where id = any($1) and deleted_at is null",
                )
                .bind::<Array<Int8>, _>(&legacy_ids)
                .bind::<Text, _>(DELETE_REASON)
                .execute(conn)
            })?;
            outcome.mutated = pairs.len() as u64;
        }

        finish_operator(conn, &outcome)
    })?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_prefers_the_scraper_side() {
        // legacy rows are the deleted side, scraper rows survive
        assert!(DETECT_SQL.contains("l.source_platform = $1"));
        assert!(DETECT_SQL.contains("s.source_platform <> $1"));
    }

    #[test]
    fn each_legacy_match_is_touched_once() {
        assert!(DETECT_SQL.contains("row_number() over (partition by l.id"));
        assert!(DETECT_SQL.contains("where rn = 1"));
    }

    #[test]
    fn score_compatibility_allows_null_on_either_side_or_equal() {
        // A scraper import can land before its schedule page shows a final
        // score; the pair must still be absorbable.
        assert!(DETECT_SQL.contains("l.home_score is null or s.home_score is null"));
        assert!(DETECT_SQL.contains("l.home_score = s.home_score and l.away_score = s.away_score"));
    }
}
