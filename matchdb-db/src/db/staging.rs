use crate::models::{DbStagingGame, NewStagingEvent, NewStagingGame, NewStagingRejected};
use diesel::{PgConnection, prelude::*};
use itertools::Itertools;

/// Multi-row inserts are chunked so one statement never carries more than
/// this many rows' worth of binds.
pub const STAGING_INSERT_BATCH_SIZE: usize = 500;

/// Bulk-insert scraped matches. Rows whose `source_match_key` is already
/// staged are silently skipped, which is what makes re-scraping an event
/// idempotent. Returns the number of rows actually inserted.
pub fn insert_staging_games(
    conn: &mut PgConnection,
    games: &[NewStagingGame<'_>],
) -> QueryResult<usize> {
    use crate::staging_schema::staging::games::dsl;

    let mut inserted = 0;
    for chunk in &games.iter().chunks(STAGING_INSERT_BATCH_SIZE) {
        inserted += diesel::insert_into(dsl::games)
            .values(chunk.collect_vec())
            .on_conflict(dsl::source_match_key)
            .do_nothing()
            .execute(conn)?;
    }
    Ok(inserted)
}

/// Record the adapter's view of an event. Re-scrapes update the name and
/// timestamp rather than stacking rows.
pub fn record_staging_event(
    conn: &mut PgConnection,
    event: &NewStagingEvent<'_>,
) -> QueryResult<usize> {
    use crate::staging_schema::staging::events::dsl;

    diesel::insert_into(dsl::events)
        .values(event)
        .on_conflict((dsl::source_platform, dsl::source_event_id))
        .do_update()
        .set((
            dsl::name.eq(event.name),
            dsl::kind.eq(event.kind),
            dsl::year.eq(event.year),
            dsl::scraped_at.eq(event.scraped_at),
        ))
        .execute(conn)
}

/// The oldest unprocessed rows, in `scraped_at` order. Promotion works in
/// these batches; ordering between batches is not guaranteed. The cursor
/// (last seen `(scraped_at, id)`) lets a run advance past rows it failed on
/// without re-fetching them until the next run.
pub fn get_unprocessed_staging_games(
    conn: &mut PgConnection,
    batch_size: usize,
    cursor: Option<(chrono::NaiveDateTime, i64)>,
) -> QueryResult<Vec<DbStagingGame>> {
    use crate::staging_schema::staging::games::dsl;

    // The defaults compare less than every real value in the table
    let cursor_ts = cursor.map_or(chrono::NaiveDateTime::default(), |(ts, _)| ts);
    let cursor_id = cursor.map_or(0, |(_, id)| id);

    dsl::games
        .filter(dsl::processed.eq(false))
        .filter(
            dsl::scraped_at.gt(cursor_ts).or(dsl::scraped_at
                .eq(cursor_ts)
                .and(dsl::id.gt(cursor_id))),
        )
        .order_by((dsl::scraped_at.asc(), dsl::id.asc()))
        .limit(batch_size as i64)
        .select(DbStagingGame::as_select())
        .get_results(conn)
}

pub fn mark_staging_game_processed(conn: &mut PgConnection, game_id: i64) -> QueryResult<usize> {
    use crate::staging_schema::staging::games::dsl;

    diesel::update(dsl::games.filter(dsl::id.eq(game_id)))
        .set(dsl::processed.eq(true))
        .execute(conn)
}

/// In-place autofix: rewrite a staging row's match key.
pub fn update_staging_game_key(
    conn: &mut PgConnection,
    game_id: i64,
    new_key: &str,
) -> QueryResult<usize> {
    use crate::staging_schema::staging::games::dsl;

    diesel::update(dsl::games.filter(dsl::id.eq(game_id)))
        .set(dsl::source_match_key.eq(new_key))
        .execute(conn)
}

/// Archive a rejected row and drop it from the working set, atomically.
pub fn move_staging_game_to_rejected(
    conn: &mut PgConnection,
    game_id: i64,
    rejected: &NewStagingRejected<'_>,
) -> QueryResult<()> {
    use crate::staging_schema::staging::games::dsl as games_dsl;
    use crate::staging_schema::staging::rejected::dsl as rejected_dsl;

    conn.transaction(|conn| {
        rejected.insert_into(rejected_dsl::rejected).execute(conn)?;
        diesel::delete(games_dsl::games.filter(games_dsl::id.eq(game_id))).execute(conn)?;
        Ok(())
    })
}

/// The promotion engine's per-row error sink.
pub fn insert_promotion_error(
    conn: &mut PgConnection,
    entry: &crate::models::NewPromotionError<'_>,
) -> QueryResult<usize> {
    use crate::info_schema::info::promotion_errors::dsl;

    entry.insert_into(dsl::promotion_errors).execute(conn)
}

pub fn unprocessed_staging_count(conn: &mut PgConnection) -> QueryResult<i64> {
    use crate::staging_schema::staging::games::dsl;

    dsl::games
        .filter(dsl::processed.eq(false))
        .count()
        .get_result(conn)
}

pub fn rejected_staging_count(conn: &mut PgConnection) -> QueryResult<i64> {
    use crate::staging_schema::staging::rejected::dsl;

    dsl::rejected.count().get_result(conn)
}

/// Staging rows that share a production match's key, for the score-repair
/// operator's cross-check.
pub fn staging_games_by_key(
    conn: &mut PgConnection,
    key: &str,
) -> QueryResult<Vec<DbStagingGame>> {
    use crate::staging_schema::staging::games::dsl;

    dsl::games
        .filter(dsl::source_match_key.eq(key))
        .select(DbStagingGame::as_select())
        .get_results(conn)
}
