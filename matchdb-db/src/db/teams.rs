use crate::models::{DbTeam, NewTeam};
use diesel::sql_types::{Array, Int8, Text};
use diesel::{PgConnection, prelude::*, sql_query};

pub fn insert_team(conn: &mut PgConnection, team: &NewTeam<'_>) -> QueryResult<i64> {
    use crate::data_schema::data::teams::dsl;

    team.insert_into(dsl::teams)
        .returning(dsl::id)
        .get_result(conn)
}

pub fn get_team(conn: &mut PgConnection, team_id: i64) -> QueryResult<Option<DbTeam>> {
    use crate::data_schema::data::teams::dsl;

    dsl::teams
        .filter(dsl::id.eq(team_id))
        .select(DbTeam::as_select())
        .first(conn)
        .optional()
}

/// Add a data-quality flag unless the team already carries it.
pub fn add_team_quality_flag(
    conn: &mut PgConnection,
    team_id: i64,
    flag: &str,
) -> QueryResult<usize> {
    sql_query(
        "update data.teams
         set data_quality_flags = data_quality_flags || $2::text,
             updated_at = now()
         where id = $1
           and not ($2 = any(data_quality_flags))",
    )
    .bind::<Int8, _>(team_id)
    .bind::<Text, _>(flag)
    .execute(conn)
}

pub fn add_team_quality_flags_bulk(
    conn: &mut PgConnection,
    team_ids: &[i64],
    flag: &str,
) -> QueryResult<usize> {
    sql_query(
        "update data.teams
         set data_quality_flags = data_quality_flags || $2::text,
             updated_at = now()
         where id = any($1)
           and not ($2 = any(data_quality_flags))",
    )
    .bind::<Array<Int8>, _>(team_ids)
    .bind::<Text, _>(flag)
    .execute(conn)
}

/// Recompute the cached win/loss/draw counters from the match table in one
/// statement. Only rows whose stored numbers disagree with the actual ones
/// are touched.
pub fn recompute_team_records(conn: &mut PgConnection) -> QueryResult<usize> {
    sql_query(
        "with actual as (
            select t.id as team_id,
                count(m.id)::int as played,
                (count(*) filter (where (m.home_team_id = t.id and m.home_score > m.away_score)
                                    or (m.away_team_id = t.id and m.away_score > m.home_score)))::int as wins,
                (count(*) filter (where (m.home_team_id = t.id and m.home_score < m.away_score)
                                    or (m.away_team_id = t.id and m.away_score < m.home_score)))::int as losses,
                (count(*) filter (where m.home_score = m.away_score))::int as draws
            from data.teams t
            left join data.matches m
                on (m.home_team_id = t.id or m.away_team_id = t.id)
                and m.deleted_at is null
                and m.home_score is not null
                and m.away_score is not null
            where t.status = 'active'
            group by t.id
        )
        update data.teams t
        set matches_played = a.played,
            wins = a.wins,
            losses = a.losses,
            draws = a.draws,
            updated_at = now()
        from actual a
        where a.team_id = t.id
          and (t.matches_played is distinct from a.played
            or t.wins is distinct from a.wins
            or t.losses is distinct from a.losses
            or t.draws is distinct from a.draws)",
    )
    .execute(conn)
}
