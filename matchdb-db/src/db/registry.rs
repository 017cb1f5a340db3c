use diesel::sql_types::{Array, Int4, Int8, Nullable, Text};
use diesel::{PgConnection, QueryableByName, prelude::*, sql_query};

#[derive(QueryableByName)]
struct IdRow {
    #[diesel(sql_type = Int8)]
    id: i64,
}

/// Exact-key lookup in the canonical registry, falling back to an alias
/// scan so a raw variant that was registered before still resolves.
pub fn find_canonical_team(
    conn: &mut PgConnection,
    canonical_name: &str,
    birth_year: i32,
    gender: &str,
    state: Option<&str>,
    raw_alias: &str,
) -> QueryResult<Option<i64>> {
    use crate::data_schema::data::canonical_teams::dsl;

    let exact: Option<i64> = dsl::canonical_teams
        .filter(dsl::canonical_name.eq(canonical_name))
        .filter(dsl::birth_year.eq(birth_year))
        .filter(dsl::gender.eq(gender))
        .filter(dsl::state.is_not_distinct_from(state))
        .select(dsl::team_id)
        .first(conn)
        .optional()?;
    if exact.is_some() {
        return Ok(exact);
    }

    dsl::canonical_teams
        .filter(dsl::birth_year.eq(birth_year))
        .filter(dsl::gender.eq(gender))
        .filter(dsl::aliases.contains(vec![raw_alias]))
        .select(dsl::team_id)
        .first(conn)
        .optional()
}

/// Idempotent upsert: a new key row is created pointing at `team_id`; an
/// existing key row keeps its pointer and absorbs the alias. Returns the
/// team id the registry ended up pointing at, which the caller must treat
/// as authoritative.
pub fn register_canonical_team(
    conn: &mut PgConnection,
    canonical_name: &str,
    birth_year: i32,
    gender: &str,
    state: Option<&str>,
    team_id: i64,
    alias: &str,
) -> QueryResult<i64> {
    sql_query(
        "insert into data.canonical_teams
            (canonical_name, birth_year, gender, state, team_id, aliases)
         values ($1, $2, $3, $4, $5, $6)
         on conflict (canonical_name, birth_year, gender, state) do update
         set aliases = (
                 select array(
                     select distinct alias
                     from unnest(data.canonical_teams.aliases || excluded.aliases) as alias
                 )
             ),
             updated_at = now()
         returning team_id as id",
    )
    .bind::<Text, _>(canonical_name)
    .bind::<Int4, _>(birth_year)
    .bind::<Text, _>(gender)
    .bind::<Nullable<Text>, _>(state)
    .bind::<Int8, _>(team_id)
    .bind::<Array<Text>, _>(vec![alias.to_string()])
    .get_result::<IdRow>(conn)
    .map(|row| row.id)
}

/// Merge support: every registry row pointing at `old_team_id` follows the
/// survivor.
pub fn repoint_canonical_team(
    conn: &mut PgConnection,
    old_team_id: i64,
    new_team_id: i64,
) -> QueryResult<usize> {
    use crate::data_schema::data::canonical_teams::dsl;

    diesel::update(dsl::canonical_teams.filter(dsl::team_id.eq(old_team_id)))
        .set((dsl::team_id.eq(new_team_id), dsl::updated_at.eq(diesel::dsl::now)))
        .execute(conn)
}

/// Per-source idempotence map: the production id a source's raw key was
/// bound to, if any.
pub fn lookup_source_entity(
    conn: &mut PgConnection,
    source_platform: &str,
    source_entity_type: &str,
    source_entity_key: &str,
) -> QueryResult<Option<i64>> {
    use crate::data_schema::data::source_entity_map::dsl;

    dsl::source_entity_map
        .filter(dsl::source_platform.eq(source_platform))
        .filter(dsl::source_entity_type.eq(source_entity_type))
        .filter(dsl::source_entity_key.eq(source_entity_key))
        .select(dsl::production_id)
        .first(conn)
        .optional()
}

/// Bind a source key to a production id. A key that is already bound keeps
/// its binding — re-submission must resolve to the same entity — and the
/// surviving binding is returned.
pub fn bind_source_entity(
    conn: &mut PgConnection,
    source_platform: &str,
    source_entity_type: &str,
    source_entity_key: &str,
    production_id: i64,
) -> QueryResult<i64> {
    sql_query(
        "insert into data.source_entity_map
            (source_platform, source_entity_type, source_entity_key, production_id)
         values ($1, $2, $3, $4)
         on conflict (source_platform, source_entity_type, source_entity_key) do update
         set production_id = data.source_entity_map.production_id
         returning production_id as id",
    )
    .bind::<Text, _>(source_platform)
    .bind::<Text, _>(source_entity_type)
    .bind::<Text, _>(source_entity_key)
    .bind::<Int8, _>(production_id)
    .get_result::<IdRow>(conn)
    .map(|row| row.id)
}

/// Merge support: bindings that pointed at a deleted loser follow the
/// keeper.
pub fn repoint_source_entities(
    conn: &mut PgConnection,
    entity_type: &str,
    old_production_id: i64,
    new_production_id: i64,
) -> QueryResult<usize> {
    use crate::data_schema::data::source_entity_map::dsl;

    diesel::update(
        dsl::source_entity_map
            .filter(dsl::source_entity_type.eq(entity_type))
            .filter(dsl::production_id.eq(old_production_id)),
    )
    .set(dsl::production_id.eq(new_production_id))
    .execute(conn)
}
