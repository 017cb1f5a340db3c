//! Pure parsing for scraped youth-soccer match data.
//!
//! Everything in this crate is deterministic and I/O-free: raw strings in,
//! structured values out. The db and pipeline crates share it so that a team
//! name scraped twice, from two different sources, normalizes to the same
//! canonical identity.

mod dates;
mod division;
mod score;
mod team_name;

pub use dates::{parse_flexible_date, parse_flexible_datetime};
pub use division::{DivisionInfo, parse_division};
pub use score::ScoreCell;
pub use team_name::{
    Gender, TeamIdentity, collapse_duplicate_prefix, extract_identity, extract_raw_year_token,
};
