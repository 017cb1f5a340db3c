//! The intake validator: the gate between staging and promotion.
//!
//! Validation itself is a pure function over one record, so scrapers can run
//! it pre-insert and the cleaner can run it over staged rows; only
//! [`clean_staging_games`] touches the database.

use crate::config::ValidatorConfig;
use chrono::{NaiveDate, Utc};
use matchdb_db::models::{DbStagingGame, NewStagingRejected};
use matchdb_db::{PgConnection, db};
use matchdb_parsing::extract_raw_year_token;
use regex::Regex;
use std::fmt;
use strum::Display;
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    EmptyHomeTeam,
    EmptyAwayTeam,
    SameTeam,
    InvalidDate,
    #[strum(serialize = "FUTURE_DATE_2027")]
    FutureDate2027,
    #[strum(serialize = "PAST_DATE_2020")]
    PastDate2020,
    UnknownPlatform,
    InvalidBirthYear,
    RecreationalLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: RejectionCode,
    pub reason: String,
}

/// The validator's verdict on one record. `fixed_key` is set when an
/// auto-fix rewrote the match key; the caller persists it.
#[derive(Debug, Clone, Default)]
pub struct Verdict {
    pub rejections: Vec<Rejection>,
    pub fixed_key: Option<String>,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        self.rejections.is_empty()
    }

    fn reject(&mut self, code: RejectionCode, reason: String) {
        self.rejections.push(Rejection { code, reason });
    }

    /// The first rejection is the primary archive code; all reasons are
    /// joined for the archive row.
    pub fn primary_code(&self) -> Option<RejectionCode> {
        self.rejections.first().map(|r| r.code)
    }

    pub fn joined_reasons(&self) -> String {
        self.rejections
            .iter()
            .map(|r| r.reason.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A borrowed view of the fields validation needs, so the same code runs
/// over staged rows and over not-yet-inserted scraped records.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    pub source_platform: &'a str,
    pub source_match_key: &'a str,
    pub match_date: Option<NaiveDate>,
    pub home_team_name: &'a str,
    pub away_team_name: &'a str,
    pub event_name: Option<&'a str>,
}

impl<'a> RecordView<'a> {
    pub fn of_staging(row: &'a DbStagingGame) -> Self {
        Self {
            source_platform: &row.source_platform,
            source_match_key: &row.source_match_key,
            match_date: row.match_date,
            home_team_name: &row.home_team_name,
            away_team_name: &row.away_team_name,
            event_name: row.event_name.as_deref(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid recreational pattern {pattern:?}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compiled validator policy: config plus the season year the age bounds
/// are measured against.
pub struct ValidatorPolicy {
    known_platforms: Vec<String>,
    min_match_date: NaiveDate,
    max_match_date: NaiveDate,
    recreational: Vec<Regex>,
    min_age: i32,
    max_age: i32,
    season_year: i32,
}

impl ValidatorPolicy {
    pub fn new(config: &ValidatorConfig, season_year: i32) -> Result<Self, PolicyError> {
        let recreational = config
            .recreational_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| PolicyError::BadPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            known_platforms: config.known_platforms.clone(),
            min_match_date: config.min_match_date,
            max_match_date: config.max_match_date,
            recreational,
            min_age: config.min_age,
            max_age: config.max_age,
            season_year,
        })
    }

    fn is_recreational(&self, text: &str) -> bool {
        self.recreational.iter().any(|re| re.is_match(text))
    }
}

/// Truncate a match key at the first control character and trim. Returns
/// `None` when the key was already clean.
fn autofix_match_key(key: &str) -> Option<String> {
    let cut = key.find(['\n', '\t', '\r'])?;
    Some(key[..cut].trim().to_string())
}

/// Validate one record. Deterministic; multiple rejections may coexist.
pub fn validate_record(record: RecordView<'_>, policy: &ValidatorPolicy) -> Verdict {
    let mut verdict = Verdict::default();

    if record.home_team_name.trim().is_empty() {
        verdict.reject(
            RejectionCode::EmptyHomeTeam,
            "home team name is empty".to_string(),
        );
    }
    if record.away_team_name.trim().is_empty() {
        verdict.reject(
            RejectionCode::EmptyAwayTeam,
            "away team name is empty".to_string(),
        );
    }
    if !record.home_team_name.trim().is_empty()
        && record
            .home_team_name
            .trim()
            .eq_ignore_ascii_case(record.away_team_name.trim())
    {
        verdict.reject(
            RejectionCode::SameTeam,
            format!("home and away are the same team: {:?}", record.home_team_name),
        );
    }

    match record.match_date {
        None => verdict.reject(
            RejectionCode::InvalidDate,
            "match date is missing or unparseable".to_string(),
        ),
        Some(date) if date > policy.max_match_date => verdict.reject(
            RejectionCode::FutureDate2027,
            format!("match date {date} is past the maximum {}", policy.max_match_date),
        ),
        Some(date) if date < policy.min_match_date => verdict.reject(
            RejectionCode::PastDate2020,
            format!("match date {date} is before the minimum {}", policy.min_match_date),
        ),
        Some(_) => {}
    }

    if !policy
        .known_platforms
        .iter()
        .any(|p| p == record.source_platform)
    {
        verdict.reject(
            RejectionCode::UnknownPlatform,
            format!("unknown source platform {:?}", record.source_platform),
        );
    }

    for name in [record.home_team_name, record.away_team_name] {
        if let Some(year) = extract_raw_year_token(name) {
            let age = policy.season_year - year;
            if age < policy.min_age || age > policy.max_age {
                verdict.reject(
                    RejectionCode::InvalidBirthYear,
                    format!("team name {name:?} implies birth year {year} (age {age})"),
                );
                break;
            }
        }
    }

    let rec_in_key = policy.is_recreational(record.source_match_key);
    let rec_in_event = record
        .event_name
        .is_some_and(|name| policy.is_recreational(name));
    if rec_in_key || rec_in_event {
        verdict.reject(
            RejectionCode::RecreationalLevel,
            "recreational/non-premier record".to_string(),
        );
    }

    verdict.fixed_key = autofix_match_key(record.source_match_key);
    verdict
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub valid: u64,
    pub rejected: u64,
    pub fixed: u64,
}

/// Pure batch validation, usable by scrapers pre-insert.
pub fn validate_batch(records: &[RecordView<'_>], policy: &ValidatorPolicy) -> BatchStats {
    let mut stats = BatchStats::default();
    for record in records {
        let verdict = validate_record(*record, policy);
        if verdict.is_valid() {
            stats.valid += 1;
        } else {
            stats.rejected += 1;
        }
        if verdict.fixed_key.is_some() {
            stats.fixed += 1;
        }
    }
    stats
}

#[derive(Debug, Default)]
pub struct CleanStats {
    pub scanned: u64,
    pub fixed: u64,
    pub rejected: u64,
    pub rejected_by_code: Vec<(String, u64)>,
}

impl fmt::Display for CleanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scanned {} staging rows: {} fixed in place, {} rejected",
            self.scanned, self.fixed, self.rejected
        )?;
        for (code, count) in &self.rejected_by_code {
            writeln!(f, "  {code}: {count}")?;
        }
        Ok(())
    }
}

/// Scan unprocessed staging rows: apply auto-fixes in place, archive
/// rejections to `staging.rejected` and drop them from `staging.games`.
/// Dry-run performs no writes.
pub fn clean_staging_games(
    conn: &mut PgConnection,
    policy: &ValidatorPolicy,
    limit: usize,
    dry_run: bool,
) -> Result<CleanStats, matchdb_db::QueryError> {
    let mut stats = CleanStats::default();
    let rows = db::get_unprocessed_staging_games(conn, limit, None)?;

    for row in &rows {
        stats.scanned += 1;
        let verdict = validate_record(RecordView::of_staging(row), policy);

        if let Some(fixed_key) = &verdict.fixed_key {
            stats.fixed += 1;
            if !dry_run {
                db::update_staging_game_key(conn, row.id, fixed_key)?;
            }
        }

        if let Some(code) = verdict.primary_code() {
            stats.rejected += 1;
            let code_name = code.to_string();
            match stats
                .rejected_by_code
                .iter_mut()
                .find(|(name, _)| *name == code_name)
            {
                Some((_, count)) => *count += 1,
                None => stats.rejected_by_code.push((code_name.clone(), 1)),
            }

            if !dry_run {
                let reasons = verdict.joined_reasons();
                let rejected = NewStagingRejected {
                    source_platform: &row.source_platform,
                    source_match_key: verdict
                        .fixed_key
                        .as_deref()
                        .unwrap_or(&row.source_match_key),
                    match_date: row.match_date,
                    home_team_name: &row.home_team_name,
                    away_team_name: &row.away_team_name,
                    home_score: row.home_score,
                    away_score: row.away_score,
                    event_name: row.event_name.as_deref(),
                    raw_data: &row.raw_data,
                    rejection_code: &code_name,
                    rejection_reason: &reasons,
                    rejected_at: Utc::now().naive_utc(),
                };
                db::move_staging_game_to_rejected(conn, row.id, &rejected)?;
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ValidatorPolicy {
        ValidatorPolicy::new(&ValidatorConfig::default(), 2026).unwrap()
    }

    fn record<'a>() -> RecordView<'a> {
        RecordView {
            source_platform: "gotsport",
            source_match_key: "gotsport-1234-56",
            match_date: NaiveDate::from_ymd_opt(2025, 10, 4),
            home_team_name: "One FC 2014B",
            away_team_name: "Tulsa SC 14B",
            event_name: Some("Midwest Champions Cup"),
        }
    }

    #[test]
    fn a_clean_record_is_valid() {
        let verdict = validate_record(record(), &policy());
        assert!(verdict.is_valid(), "{:?}", verdict.rejections);
        assert!(verdict.fixed_key.is_none());
    }

    #[test]
    fn empty_team_names() {
        let mut r = record();
        r.home_team_name = "   ";
        let verdict = validate_record(r, &policy());
        assert_eq!(verdict.primary_code(), Some(RejectionCode::EmptyHomeTeam));

        let mut r = record();
        r.away_team_name = "";
        let verdict = validate_record(r, &policy());
        assert_eq!(verdict.primary_code(), Some(RejectionCode::EmptyAwayTeam));
    }

    #[test]
    fn same_team_is_case_insensitive() {
        let mut r = record();
        r.away_team_name = "one fc 2014b";
        let verdict = validate_record(r, &policy());
        assert_eq!(verdict.primary_code(), Some(RejectionCode::SameTeam));
    }

    #[test]
    fn date_bounds() {
        let mut r = record();
        r.match_date = None;
        assert_eq!(
            validate_record(r, &policy()).primary_code(),
            Some(RejectionCode::InvalidDate)
        );

        let mut r = record();
        r.match_date = NaiveDate::from_ymd_opt(2028, 1, 1);
        assert_eq!(
            validate_record(r, &policy()).primary_code(),
            Some(RejectionCode::FutureDate2027)
        );

        let mut r = record();
        r.match_date = NaiveDate::from_ymd_opt(2019, 12, 31);
        assert_eq!(
            validate_record(r, &policy()).primary_code(),
            Some(RejectionCode::PastDate2020)
        );
    }

    #[test]
    fn unknown_platform() {
        let mut r = record();
        r.source_platform = "mystery";
        assert_eq!(
            validate_record(r, &policy()).primary_code(),
            Some(RejectionCode::UnknownPlatform)
        );
    }

    #[test]
    fn birth_year_1990_is_rejected() {
        let mut r = record();
        r.home_team_name = "Old Boys 1990";
        let verdict = validate_record(r, &policy());
        assert_eq!(verdict.primary_code(), Some(RejectionCode::InvalidBirthYear));
    }

    #[test]
    fn recreational_key_or_event_is_rejected() {
        let mut r = record();
        r.source_match_key = "heartland-cal-rec-league-18";
        assert_eq!(
            validate_record(r, &policy()).primary_code(),
            Some(RejectionCode::RecreationalLevel)
        );

        let mut r = record();
        r.event_name = Some("Johnson County Recreational League");
        assert_eq!(
            validate_record(r, &policy()).primary_code(),
            Some(RejectionCode::RecreationalLevel)
        );
    }

    #[test]
    fn calendar_prefix_alone_is_not_recreational() {
        let mut r = record();
        r.source_match_key = "heartland-cal-spring-2026-118";
        r.event_name = Some("Heartland League Spring 2026");
        assert!(validate_record(r, &policy()).is_valid());
    }

    #[test]
    fn multiple_rejections_coexist_and_first_is_primary() {
        let mut r = record();
        r.home_team_name = "";
        r.match_date = None;
        r.source_platform = "mystery";
        let verdict = validate_record(r, &policy());
        assert_eq!(verdict.rejections.len(), 3);
        assert_eq!(verdict.primary_code(), Some(RejectionCode::EmptyHomeTeam));
        let reasons = verdict.joined_reasons();
        assert_eq!(reasons.matches("; ").count(), 2);
    }

    #[test]
    fn control_characters_in_key_are_autofixed() {
        let mut r = record();
        r.source_match_key = "gotsport-1234-56\n\tgarbage";
        let verdict = validate_record(r, &policy());
        assert_eq!(verdict.fixed_key.as_deref(), Some("gotsport-1234-56"));
    }

    #[test]
    fn autofix_is_idempotent() {
        let mut r = record();
        r.source_match_key = "gotsport-1234-56 \r\nmore";
        let first = validate_record(r, &policy());
        let fixed = first.fixed_key.expect("should fix");

        let mut refixed = r;
        refixed.source_match_key = &fixed;
        let second = validate_record(refixed, &policy());
        assert!(second.fixed_key.is_none(), "no further fixes expected");
    }

    #[test]
    fn batch_stats_add_up() {
        let good = record();
        let mut bad = record();
        bad.match_date = None;
        let mut fixable = record();
        fixable.source_match_key = "k\nx";

        let stats = validate_batch(&[good, bad, fixable], &policy());
        assert_eq!(
            stats,
            BatchStats {
                valid: 2,
                rejected: 1,
                fixed: 1,
            }
        );
    }

    #[test]
    fn rejection_codes_render_in_wire_format() {
        assert_eq!(RejectionCode::EmptyHomeTeam.to_string(), "EMPTY_HOME_TEAM");
        assert_eq!(RejectionCode::FutureDate2027.to_string(), "FUTURE_DATE_2027");
        assert_eq!(RejectionCode::PastDate2020.to_string(), "PAST_DATE_2020");
        assert_eq!(
            RejectionCode::RecreationalLevel.to_string(),
            "RECREATIONAL_LEVEL"
        );
    }
}
