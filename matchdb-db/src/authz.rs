//! The connection-scoped write gate.
//!
//! Production tables reject INSERT/UPDATE/DELETE from sessions that have not
//! called `authorize_pipeline_write()`, unless the global protection flag is
//! off. The grant lives in database session state, so it is bound to one
//! connection: every worker must authorize its own connection, and handing
//! a connection back to the pool revokes nothing by itself — which is why
//! the wrappers here revoke explicitly on the way out.

use crate::{ConnectionPool, PoolError};
use diesel::sql_types::Bool;
use diesel::{Connection, PgConnection, QueryableByName, RunQueryDsl, sql_query};

#[derive(QueryableByName)]
struct FlagRow {
    #[diesel(sql_type = Bool)]
    enabled: bool,
}

/// Grant this connection's session the right to mutate protected tables.
/// Cleared at transaction end by the database side, and by
/// [`revoke_pipeline_write`] for plain-connection use.
pub fn authorize_pipeline_write(conn: &mut PgConnection) -> diesel::QueryResult<()> {
    sql_query("select authorize_pipeline_write()")
        .execute(conn)
        .map(|_| ())
}

pub fn revoke_pipeline_write(conn: &mut PgConnection) -> diesel::QueryResult<()> {
    sql_query("select revoke_pipeline_write()")
        .execute(conn)
        .map(|_| ())
}

/// Whether the global protection flag is on. When an operator has flipped
/// it off (break-glass), the triggers wave everything through.
pub fn is_write_protection_enabled(conn: &mut PgConnection) -> diesel::QueryResult<bool> {
    sql_query("select is_write_protection_enabled() as enabled")
        .get_result::<FlagRow>(conn)
        .map(|row| row.enabled)
}

/// Reserve a connection, authorize it, run `f`, and revoke on the way out
/// whether or not `f` succeeded.
pub fn with_pipeline_auth<T, E, F>(pool: &ConnectionPool, f: F) -> Result<T, E>
where
    E: From<diesel::result::Error> + From<PoolError>,
    F: FnOnce(&mut PgConnection) -> Result<T, E>,
{
    let mut conn = pool.get()?;
    authorize_pipeline_write(&mut conn)?;
    let result = f(&mut conn);
    if let Err(e) = revoke_pipeline_write(&mut conn) {
        log::warn!("failed to revoke pipeline write grant: {e}");
    }
    result
}

/// [`with_pipeline_auth`] plus BEGIN/COMMIT around `f`, rolling back when
/// `f` errors.
pub fn with_pipeline_transaction<T, E, F>(pool: &ConnectionPool, f: F) -> Result<T, E>
where
    E: From<diesel::result::Error> + From<PoolError>,
    F: FnOnce(&mut PgConnection) -> Result<T, E>,
{
    with_pipeline_auth(pool, |conn| {
        // The authorization grant is session-local config, so it survives
        // into the transaction we open on the same connection.
        conn.transaction(|conn| f(conn))
    })
}
