//! Read-only counters behind the diagnostic surface. Nothing in this module
//! mutates data.

use diesel::sql_types::Int8;
use diesel::{PgConnection, QueryableByName, prelude::*, sql_query};

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = Int8)]
    count: i64,
}

fn count_query(conn: &mut PgConnection, sql: &str) -> QueryResult<i64> {
    sql_query(sql.to_string())
        .get_result::<CountRow>(conn)
        .map(|row| row.count)
}

pub fn active_team_count(conn: &mut PgConnection) -> QueryResult<i64> {
    use crate::data_schema::data::teams::dsl;

    dsl::teams
        .filter(dsl::status.eq("active"))
        .count()
        .get_result(conn)
}

/// Active teams with full metadata that the canonical registry covers.
pub fn registry_covered_team_count(conn: &mut PgConnection) -> QueryResult<i64> {
    count_query(
        conn,
        "select count(distinct t.id) as count
         from data.teams t
         join data.canonical_teams c on c.team_id = t.id
         where t.status = 'active'
           and t.birth_year is not null
           and t.gender is not null",
    )
}

/// Active teams with full metadata, covered or not; the denominator for
/// registry coverage.
pub fn registry_eligible_team_count(conn: &mut PgConnection) -> QueryResult<i64> {
    use crate::data_schema::data::teams::dsl;

    dsl::teams
        .filter(dsl::status.eq("active"))
        .filter(dsl::birth_year.is_not_null())
        .filter(dsl::gender.is_not_null())
        .count()
        .get_result(conn)
}

/// Groups of live teams sharing a canonical identity; each group is dedup
/// work for the merge operator.
pub fn duplicate_group_count(conn: &mut PgConnection) -> QueryResult<i64> {
    count_query(
        conn,
        "select count(*) as count from (
            select 1
            from data.teams
            where status = 'active'
              and birth_year is not null
              and gender is not null
            group by canonical_name, birth_year, gender
            having count(*) > 1
         ) groups",
    )
}

pub fn null_metadata_team_count(conn: &mut PgConnection) -> QueryResult<i64> {
    use crate::data_schema::data::teams::dsl;

    dsl::teams
        .filter(dsl::status.eq("active"))
        .filter(dsl::birth_year.is_null().or(dsl::gender.is_null()))
        .count()
        .get_result(conn)
}

/// Teams whose cached counters disagree with the match table.
pub fn stats_mismatch_count(conn: &mut PgConnection) -> QueryResult<i64> {
    count_query(
        conn,
        "with actual as (
            select t.id as team_id, count(m.id)::int as played
            from data.teams t
            left join data.matches m
                on (m.home_team_id = t.id or m.away_team_id = t.id)
                and m.deleted_at is null
                and m.home_score is not null
            where t.status = 'active'
            group by t.id
        )
        select count(*) as count
        from data.teams t
        join actual a on a.team_id = t.id
        where t.matches_played is distinct from a.played
           or t.matches_played <> t.wins + t.losses + t.draws",
    )
}

/// Teams carrying ranking data but zero matches: the orphan-absorption
/// operator's input.
pub fn orphan_team_count(conn: &mut PgConnection) -> QueryResult<i64> {
    count_query(
        conn,
        "select count(*) as count
         from data.teams t
         where t.status = 'active'
           and (t.national_rank is not null or t.gotsport_points is not null)
           and not exists (
               select 1 from data.matches m
               where (m.home_team_id = t.id or m.away_team_id = t.id)
                 and m.deleted_at is null
           )",
    )
}

/// Scheduled games carrying the `(0, 0)` artifact the score-repair operator
/// scrubs.
pub fn scheduled_zero_zero_count(conn: &mut PgConnection) -> QueryResult<i64> {
    count_query(
        conn,
        "select count(*) as count
         from data.matches
         where deleted_at is null
           and home_score = 0
           and away_score = 0
           and match_date > current_date",
    )
}

pub fn promotion_error_count(conn: &mut PgConnection) -> QueryResult<i64> {
    use crate::info_schema::info::promotion_errors::dsl;

    dsl::promotion_errors.count().get_result(conn)
}

pub fn active_match_count(conn: &mut PgConnection) -> QueryResult<i64> {
    use crate::data_schema::data::matches::dsl;

    dsl::matches
        .filter(dsl::deleted_at.is_null())
        .count()
        .get_result(conn)
}

/// Teams matching a display- or canonical-name needle, for `diagnose --team`.
pub fn find_teams_by_name(
    conn: &mut PgConnection,
    needle: &str,
) -> QueryResult<Vec<crate::models::DbTeam>> {
    use crate::data_schema::data::teams::dsl;

    let pattern = format!("%{}%", escape_like(needle));
    dsl::teams
        .filter(
            dsl::display_name
                .ilike(pattern.clone())
                .or(dsl::canonical_name.ilike(pattern)),
        )
        .order_by(dsl::display_name.asc())
        .limit(50)
        .select(crate::models::DbTeam::as_select())
        .get_results(conn)
}

/// Escape LIKE wildcards in user-supplied needles.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_escaping_covers_all_wildcards() {
        assert_eq!(escape_like("100%_done\\x"), "100\\%\\_done\\\\x");
    }
}
