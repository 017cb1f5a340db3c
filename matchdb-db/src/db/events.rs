use diesel::sql_types::{Int4, Nullable, Text};
use diesel::{PgConnection, QueryableByName, prelude::*, sql_query};

/// An event the universal discovery query found still showing activity.
#[derive(Debug, QueryableByName)]
pub struct ActiveEvent {
    #[diesel(sql_type = Text)]
    pub source_event_id: String,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub kind: String,
    #[diesel(sql_type = Nullable<Int4>)]
    pub year: Option<i32>,
}

/// Find or create a league by its source id, returning the production id.
pub fn resolve_league(
    conn: &mut PgConnection,
    source_event_id: &str,
    source_platform: &str,
    name: &str,
) -> QueryResult<i64> {
    use crate::data_schema::data::leagues::dsl;

    let existing: Option<i64> = dsl::leagues
        .filter(dsl::source_event_id.eq(source_event_id))
        .filter(dsl::source_platform.eq(source_platform))
        .select(dsl::id)
        .first(conn)
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    crate::models::NewLeague {
        name,
        source_event_id: Some(source_event_id),
        source_platform: Some(source_platform),
    }
    .insert_into(dsl::leagues)
    .returning(dsl::id)
    .get_result(conn)
}

/// Find or create a tournament by its source id, returning the production id.
pub fn resolve_tournament(
    conn: &mut PgConnection,
    source_event_id: &str,
    source_platform: &str,
    name: &str,
) -> QueryResult<i64> {
    use crate::data_schema::data::tournaments::dsl;

    let existing: Option<i64> = dsl::tournaments
        .filter(dsl::source_event_id.eq(source_event_id))
        .filter(dsl::source_platform.eq(source_platform))
        .select(dsl::id)
        .first(conn)
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    crate::models::NewTournament {
        name,
        source_event_id: Some(source_event_id),
        source_platform: Some(source_platform),
    }
    .insert_into(dsl::tournaments)
    .returning(dsl::id)
    .get_result(conn)
}

/// Universal database-backed event discovery: events of this source whose
/// matches fall inside the window around today. Keeps the engine working
/// when nobody has maintained the static event list.
pub fn discover_active_events(
    conn: &mut PgConnection,
    source_key_prefix: &str,
    lookback_days: i64,
    forward_days: i64,
) -> QueryResult<Vec<ActiveEvent>> {
    sql_query(
        "with active as (
            select distinct m.league_id, m.tournament_id
            from data.matches m
            where m.source_match_key like $1 || '-%'
              and m.deleted_at is null
              and m.match_date between current_date - $2::int and current_date + $3::int
        )
        select l.source_event_id, l.name, 'league' as kind,
               extract(year from l.start_date)::int as year
        from data.leagues l
        join active a on a.league_id = l.id
        where l.source_event_id is not null
        union
        select t.source_event_id, t.name, 'tournament' as kind,
               extract(year from t.start_date)::int as year
        from data.tournaments t
        join active a on a.tournament_id = t.id
        where t.source_event_id is not null
        order by kind, source_event_id",
    )
    .bind::<Text, _>(source_key_prefix)
    .bind::<Int4, _>(lookback_days as i32)
    .bind::<Int4, _>(forward_days as i32)
    .load::<ActiveEvent>(conn)
}
