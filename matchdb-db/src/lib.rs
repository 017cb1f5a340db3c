mod schema;
mod url;

pub mod authz;
pub mod db;
pub mod models;

pub(crate) use schema::*;

pub use url::*;

pub use diesel::{Connection, PgConnection};

/// Errors from individual statements. Re-exported so callers don't need a
/// direct diesel dependency just to name the type.
pub type QueryError = diesel::result::Error;
pub type QueryResult<T> = diesel::result::QueryResult<T>;
