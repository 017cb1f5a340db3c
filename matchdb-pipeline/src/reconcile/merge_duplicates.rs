//! Merge live teams that share a canonical identity. The keeper is chosen
//! deterministically, inherits the best rank the group ever earned, and
//! absorbs every surviving match; matches that would collide post-merge
//! are soft-deleted with audit rows so recovery can replay them.

use super::{OperatorOutcome, ReconcileError, finish_operator};
use diesel::sql_types::{Array, Int8, Text};
use diesel::{QueryableByName, prelude::*, sql_query};
use itertools::Itertools;
use log::{info, warn};
use matchdb_db::{Connection, ConnectionPool, PgConnection, authz, db};

const MATCH_CHANGED_BY: &str = "matchDedup";
const TEAM_CHANGED_BY: &str = "teamDedup";
const COLLISION_REASON: &str = "semantic duplicate: team merge";
const INTRA_SQUAD_REASON: &str = "intra-squad duplicate: team merge";

/// Which identity the duplicate grouping uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GroupBy {
    Canonical,
    DisplayName,
}

impl GroupBy {
    fn column(self) -> &'static str {
        match self {
            GroupBy::Canonical => "canonical_name",
            GroupBy::DisplayName => "display_name",
        }
    }
}

#[derive(Debug, QueryableByName)]
struct GroupedTeamRow {
    #[diesel(sql_type = Int8)]
    id: i64,
    #[diesel(sql_type = Text)]
    display_name: String,
    #[diesel(sql_type = Int8)]
    group_index: i64,
    // Selected for the ORDER BY; rows arrive keeper-first within a group
    #[allow(dead_code)]
    #[diesel(sql_type = Int8)]
    rank_in_group: i64,
}

/// Keeper selection order: most matches, then best (lowest) national rank,
/// then highest rating, then oldest row.
fn grouped_duplicates_sql(group_by: GroupBy) -> String {
    let key = group_by.column();
    format!(
        "with dup_keys as (
            select {key} as key_name, birth_year, gender
            from data.teams
            where status = 'active' and birth_year is not null and gender is not null
            group by {key}, birth_year, gender
            having count(*) > 1
        )
        select t.id,
               t.display_name,
               dense_rank() over (order by t.{key}, t.birth_year, t.gender) as group_index,
               row_number() over (
                   partition by t.{key}, t.birth_year, t.gender
                   order by t.matches_played desc,
                            t.national_rank asc nulls last,
                            t.elo_rating desc nulls last,
                            t.created_at asc,
                            t.id asc
               ) as rank_in_group
        from data.teams t
        join dup_keys d
          on d.key_name = t.{key}
         and d.birth_year = t.birth_year
         and d.gender = t.gender
        where t.status = 'active'
        order by group_index, rank_in_group"
    )
}

pub fn run(
    pool: &ConnectionPool,
    group_by: GroupBy,
    reconcile_timeout_seconds: i64,
    execute: bool,
) -> Result<OperatorOutcome, ReconcileError> {
    let mut outcome = OperatorOutcome {
        dry_run: !execute,
        ..Default::default()
    };

    authz::with_pipeline_auth::<_, ReconcileError, _>(pool, |conn| {
        db::set_current_user_statement_timeout(conn, reconcile_timeout_seconds)?;

        let rows = sql_query(grouped_duplicates_sql(group_by)).load::<GroupedTeamRow>(conn)?;
        let groups: Vec<Vec<GroupedTeamRow>> = rows
            .into_iter()
            .chunk_by(|row| row.group_index)
            .into_iter()
            .map(|(_, group)| group.collect())
            .collect();

        outcome.examined = groups.len() as u64;
        info!("{} duplicate groups found", groups.len());

        if !execute {
            for group in groups.iter().take(10) {
                outcome.note(format!(
                    "would merge {} into {:?}",
                    group[1..].iter().map(|t| t.id).join(", "),
                    group[0].display_name,
                ));
            }
            return Ok(());
        }

        for group in &groups {
            let keeper = group[0].id;
            let losers: Vec<i64> = group[1..].iter().map(|row| row.id).collect();

            let whole_group: Result<(), matchdb_db::QueryError> =
                conn.transaction(|conn| merge_group(conn, keeper, &losers));

            let merged = match whole_group {
                Ok(()) => true,
                Err(err) => {
                    // Mid-batch constraint conflicts can make the whole
                    // group unmergeable in one statement set; retry pair by
                    // pair so only the conflicting pair is skipped.
                    warn!("group merge into {keeper} failed ({err}), retrying per pair");
                    let mut merged_any = false;
                    for loser in &losers {
                        match conn.transaction(|conn| merge_group(conn, keeper, &[*loser])) {
                            Ok(()) => merged_any = true,
                            Err(pair_err) => {
                                warn!("pair merge {loser} -> {keeper} failed: {pair_err}");
                            }
                        }
                    }
                    merged_any
                }
            };

            if merged {
                outcome.mutated += 1;
            } else {
                outcome.failed_groups += 1;
            }
        }

        db::recompute_team_records(conn)?;
        finish_operator(conn, &outcome)
    })?;

    Ok(outcome)
}

/// Merge `losers` into `keeper` inside the caller's transaction. Bulk SQL
/// throughout; the only loop is the per-group one above.
pub(crate) fn merge_group(
    conn: &mut PgConnection,
    keeper: i64,
    losers: &[i64],
) -> Result<(), matchdb_db::QueryError> {
    // Rank preservation: lower rank numbers and higher points/ratings win,
    // whoever earned them.
    sql_query(
        "update data.teams k
         set national_rank = best.national_rank,
             state_rank = best.state_rank,
             regional_rank = best.regional_rank,
             gotsport_points = best.gotsport_points,
             elo_rating = best.elo_rating,
             updated_at = now()
         from (
             select min(national_rank) as national_rank,
                    min(state_rank) as state_rank,
                    min(regional_rank) as regional_rank,
                    max(gotsport_points) as gotsport_points,
                    max(elo_rating) as elo_rating
             from data.teams
             where id = $1 or id = any($2)
         ) best
         where k.id = $1",
    )
    .bind::<Int8, _>(keeper)
    .bind::<Array<Int8>, _>(losers)
    .execute(conn)?;

    // Collision pre-check: simulate the re-pointing and soft-delete every
    // row that would lose its semantic slot. Keeper matches outrank loser
    // matches, then rows with a real score, then the oldest row.
    #[derive(QueryableByName)]
    struct MatchIdRow {
        #[diesel(sql_type = Int8)]
        id: i64,
    }

    let colliding: Vec<i64> = sql_query(
        "with remapped as (
            select m.id,
                   m.match_date,
                   m.created_at,
                   (m.home_score is not null and m.away_score is not null) as has_score,
                   (m.home_team_id = any($2) or m.away_team_id = any($2)) as is_loser_match,
                   case when m.home_team_id = any($2) then $1 else m.home_team_id end as new_home,
                   case when m.away_team_id = any($2) then $1 else m.away_team_id end as new_away
            from data.matches m
            where m.deleted_at is null
              and (m.home_team_id = $1 or m.away_team_id = $1
                   or m.home_team_id = any($2) or m.away_team_id = any($2))
        ),
        ranked as (
            select id,
                   row_number() over (
                       partition by match_date, new_home, new_away
                       order by is_loser_match asc, has_score desc, created_at asc, id asc
                   ) as rn
            from remapped
            where new_home <> new_away
        )
        select id from ranked where rn > 1",
    )
    .bind::<Int8, _>(keeper)
    .bind::<Array<Int8>, _>(losers)
    .load::<MatchIdRow>(conn)?
    .into_iter()
    .map(|row| row.id)
    .collect();
    db::soft_delete_matches_bulk(conn, &colliding, COLLISION_REASON, MATCH_CHANGED_BY)?;

    // Intra-squad purge: both sides of a match map to the keeper.
    let intra_squad: Vec<i64> = sql_query(
        "select m.id
         from data.matches m
         where m.deleted_at is null
           and (m.home_team_id = $1 or m.away_team_id = $1
                or m.home_team_id = any($2) or m.away_team_id = any($2))
           and (case when m.home_team_id = any($2) then $1 else m.home_team_id end)
             = (case when m.away_team_id = any($2) then $1 else m.away_team_id end)",
    )
    .bind::<Int8, _>(keeper)
    .bind::<Array<Int8>, _>(losers)
    .load::<MatchIdRow>(conn)?
    .into_iter()
    .map(|row| row.id)
    .collect();
    db::soft_delete_matches_bulk(conn, &intra_squad, INTRA_SQUAD_REASON, MATCH_CHANGED_BY)?;

    // Re-point match FKs. Soft-deleted rows are re-pointed too: the loser
    // team rows are about to be hard-deleted and every FK must move; the
    // audit old_data keeps the original ids.
    sql_query("update data.matches set home_team_id = $1 where home_team_id = any($2)")
        .bind::<Int8, _>(keeper)
        .bind::<Array<Int8>, _>(losers)
        .execute(conn)?;
    sql_query("update data.matches set away_team_id = $1 where away_team_id = any($2)")
        .bind::<Int8, _>(keeper)
        .bind::<Array<Int8>, _>(losers)
        .execute(conn)?;

    // Canonical registry: fold loser aliases into the keeper's row for the
    // shared key, drop the collided loser rows, re-point the rest.
    sql_query(
        "update data.canonical_teams k
         set aliases = (
                 select array(select distinct a from unnest(k.aliases || l.aliases) as a)
             ),
             updated_at = now()
         from data.canonical_teams l
         where k.team_id = $1
           and l.team_id = any($2)
           and l.canonical_name = k.canonical_name
           and l.birth_year = k.birth_year
           and l.gender = k.gender
           and l.state is not distinct from k.state",
    )
    .bind::<Int8, _>(keeper)
    .bind::<Array<Int8>, _>(losers)
    .execute(conn)?;
    sql_query(
        "delete from data.canonical_teams l
         using data.canonical_teams k
         where l.team_id = any($2)
           and k.team_id = $1
           and l.canonical_name = k.canonical_name
           and l.birth_year = k.birth_year
           and l.gender = k.gender
           and l.state is not distinct from k.state",
    )
    .bind::<Int8, _>(keeper)
    .bind::<Array<Int8>, _>(losers)
    .execute(conn)?;
    sql_query(
        "update data.canonical_teams set team_id = $1, updated_at = now()
         where team_id = any($2)",
    )
    .bind::<Int8, _>(keeper)
    .bind::<Array<Int8>, _>(losers)
    .execute(conn)?;

    // Source-entity map follows the survivor so re-scrapes stay stable.
    sql_query(
        "update data.source_entity_map set production_id = $1
         where source_entity_type = 'team' and production_id = any($2)",
    )
    .bind::<Int8, _>(keeper)
    .bind::<Array<Int8>, _>(losers)
    .execute(conn)?;

    // League standings: drop rows that would collide with the keeper's (or
    // with each other), then re-point the rest.
    sql_query(
        "delete from data.league_standings ls
         using data.league_standings keep
         where ls.team_id = any($2)
           and keep.team_id = $1
           and keep.league_id = ls.league_id",
    )
    .bind::<Int8, _>(keeper)
    .bind::<Array<Int8>, _>(losers)
    .execute(conn)?;
    sql_query(
        "delete from data.league_standings ls
         where ls.team_id = any($1)
           and exists (
               select 1 from data.league_standings o
               where o.league_id = ls.league_id
                 and o.team_id = any($1)
                 and (o.played > ls.played or (o.played = ls.played and o.id < ls.id))
           )",
    )
    .bind::<Array<Int8>, _>(losers)
    .execute(conn)?;
    sql_query("update data.league_standings set team_id = $1 where team_id = any($2)")
        .bind::<Int8, _>(keeper)
        .bind::<Array<Int8>, _>(losers)
        .execute(conn)?;

    // Rank history rows reference the loser by FK and are snapshot data,
    // not identity; they go with the loser.
    sql_query("delete from data.rank_history where team_id = any($1)")
        .bind::<Array<Int8>, _>(losers)
        .execute(conn)?;

    // Finally the loser team rows themselves, audited for recovery.
    sql_query(
        "insert into info.audit_log
            (table_name, record_id, action, old_data, changed_by, changed_at)
         select 'teams', t.id, 'delete', to_jsonb(t), $2, now()
         from data.teams t where t.id = any($1)",
    )
    .bind::<Array<Int8>, _>(losers)
    .bind::<Text, _>(TEAM_CHANGED_BY)
    .execute(conn)?;
    sql_query("delete from data.teams where id = any($1)")
        .bind::<Array<Int8>, _>(losers)
        .execute(conn)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_sql_switches_on_the_key_column() {
        let canonical = grouped_duplicates_sql(GroupBy::Canonical);
        assert!(canonical.contains("t.canonical_name, t.birth_year, t.gender"));
        let display = grouped_duplicates_sql(GroupBy::DisplayName);
        assert!(display.contains("t.display_name, t.birth_year, t.gender"));
    }

    #[test]
    fn keeper_ranking_matches_the_contract() {
        // most matches first, then best national rank, then rating, then age
        let sql = grouped_duplicates_sql(GroupBy::Canonical);
        let order = sql
            .find("order by t.matches_played desc")
            .expect("ranking order present");
        let rank = sql.find("t.national_rank asc nulls last").unwrap();
        let elo = sql.find("t.elo_rating desc nulls last").unwrap();
        let created = sql.find("t.created_at asc").unwrap();
        assert!(order < rank && rank < elo && elo < created);
    }
}
