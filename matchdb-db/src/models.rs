use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::teams)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewTeam<'a> {
    pub display_name: &'a str,
    pub canonical_name: &'a str,
    pub birth_year: Option<i32>,
    pub gender: Option<&'a str>,
    pub state: Option<&'a str>,
    pub status: &'a str,
    pub data_quality_flags: Vec<String>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, QueryableByName, Serialize)]
#[diesel(table_name = crate::data_schema::data::teams)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbTeam {
    pub id: i64,
    pub display_name: String,
    pub canonical_name: String,
    pub birth_year: Option<i32>,
    pub gender: Option<String>,
    pub state: Option<String>,
    pub matches_played: i32,
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    pub elo_rating: Option<f64>,
    pub national_rank: Option<i32>,
    pub state_rank: Option<i32>,
    pub regional_rank: Option<i32>,
    pub gotsport_points: Option<f64>,
    pub status: String,
    pub merged_into: Option<i64>,
    pub merged_at: Option<NaiveDateTime>,
    pub merge_reason: Option<String>,
    pub data_quality_flags: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::matches)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewMatch<'a> {
    pub match_date: NaiveDate,
    pub match_time: Option<NaiveTime>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub league_id: Option<i64>,
    pub tournament_id: Option<i64>,
    pub venue: Option<&'a str>,
    pub division: Option<&'a str>,
    pub source_platform: &'a str,
    pub source_match_key: &'a str,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, QueryableByName, Serialize)]
#[diesel(table_name = crate::data_schema::data::matches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbMatch {
    pub id: i64,
    pub match_date: NaiveDate,
    pub match_time: Option<NaiveTime>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub league_id: Option<i64>,
    pub tournament_id: Option<i64>,
    pub venue: Option<String>,
    pub division: Option<String>,
    pub source_platform: String,
    pub source_match_key: String,
    pub deleted_at: Option<NaiveDateTime>,
    pub deletion_reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::leagues)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewLeague<'a> {
    pub name: &'a str,
    pub source_event_id: Option<&'a str>,
    pub source_platform: Option<&'a str>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::tournaments)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewTournament<'a> {
    pub name: &'a str,
    pub source_event_id: Option<&'a str>,
    pub source_platform: Option<&'a str>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::canonical_teams)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewCanonicalTeam<'a> {
    pub canonical_name: &'a str,
    pub birth_year: i32,
    pub gender: &'a str,
    pub state: Option<&'a str>,
    pub team_id: i64,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::data_schema::data::canonical_teams)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbCanonicalTeam {
    pub id: i64,
    pub canonical_name: String,
    pub birth_year: i32,
    pub gender: String,
    pub state: Option<String>,
    pub team_id: i64,
    pub aliases: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::source_entity_map)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewSourceEntityMap<'a> {
    pub source_platform: &'a str,
    pub source_entity_type: &'a str,
    pub source_entity_key: &'a str,
    pub production_id: i64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::staging_schema::staging::games)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewStagingGame<'a> {
    pub source_platform: &'a str,
    pub source_match_key: &'a str,
    pub match_number: Option<&'a str>,
    pub match_date: Option<NaiveDate>,
    pub match_time: Option<NaiveTime>,
    pub home_team_name: &'a str,
    pub away_team_name: &'a str,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub event_source_id: Option<&'a str>,
    pub event_name: Option<&'a str>,
    pub event_kind: Option<&'a str>,
    pub venue: Option<&'a str>,
    pub division: Option<&'a str>,
    pub state: Option<&'a str>,
    pub status: &'a str,
    pub raw_data: &'a serde_json::Value,
    pub processed: bool,
    pub scraped_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::staging_schema::staging::games)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbStagingGame {
    pub id: i64,
    pub source_platform: String,
    pub source_match_key: String,
    pub match_number: Option<String>,
    pub match_date: Option<NaiveDate>,
    pub match_time: Option<NaiveTime>,
    pub home_team_name: String,
    pub away_team_name: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub event_source_id: Option<String>,
    pub event_name: Option<String>,
    pub event_kind: Option<String>,
    pub venue: Option<String>,
    pub division: Option<String>,
    pub state: Option<String>,
    pub status: String,
    pub raw_data: serde_json::Value,
    pub processed: bool,
    pub scraped_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::staging_schema::staging::events)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewStagingEvent<'a> {
    pub source_platform: &'a str,
    pub source_event_id: &'a str,
    pub name: &'a str,
    pub kind: &'a str,
    pub year: Option<i32>,
    pub scraped_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::staging_schema::staging::rejected)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewStagingRejected<'a> {
    pub source_platform: &'a str,
    pub source_match_key: &'a str,
    pub match_date: Option<NaiveDate>,
    pub home_team_name: &'a str,
    pub away_team_name: &'a str,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub event_name: Option<&'a str>,
    pub raw_data: &'a serde_json::Value,
    pub rejection_code: &'a str,
    pub rejection_reason: &'a str,
    pub rejected_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::info_schema::info::audit_log)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewAuditLog<'a> {
    pub table_name: &'a str,
    pub record_id: i64,
    pub action: &'a str,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_by: &'a str,
    pub changed_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::info_schema::info::audit_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbAuditLog {
    pub id: i64,
    pub table_name: String,
    pub record_id: i64,
    pub action: String,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_by: String,
    pub changed_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::info_schema::info::promotion_errors)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPromotionError<'a> {
    pub staging_game_id: i64,
    pub source_match_key: &'a str,
    pub message: &'a str,
    pub errored_at: NaiveDateTime,
}
