//! The scraper engine: drives one adapter run to completion, resiliently.
//! Fetching and parsing live in `matchdb-scrape`; this module owns the run
//! loop, discovery, checkpointing, and the staging writes.

use crate::config::PipelineConfig;
use chrono::{Datelike, NaiveDate, Utc};
use hashbrown::HashSet;
use log::{info, warn};
use matchdb_db::models::{NewStagingEvent, NewStagingGame};
use matchdb_db::{ConnectionPool, db};
use matchdb_scrape::adapter::{DiscoveredEvent, EventKind, ScrapePlan, Technology};
use matchdb_scrape::checkpoint::CheckpointError;
use matchdb_scrape::html::{self, RawRow};
use matchdb_scrape::{
    Adapter, Checkpoint, Fetch, FetchError, Fetcher, MatchStatus, ParsedMatch, RunStats,
    render_match_key,
};
use miette::Diagnostic;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Default, Clone)]
pub struct EngineOptions {
    pub event_id: Option<String>,
    pub active_only: bool,
    pub resume: bool,
    pub dry_run: bool,
}

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("database error during engine run")]
    Db(#[from] matchdb_db::QueryError),

    #[error("could not get a database connection")]
    Pool(#[from] matchdb_db::PoolError),

    #[error(transparent)]
    Probe(#[from] db::WriteProbeError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Build the plain HTTP fetcher for an adapter, refusing sources that need
/// a browser. A browser-backed [`Fetch`] implementation can be passed to
/// [`run`] directly instead.
pub fn default_fetcher(adapter: &Adapter, timeout: Duration) -> Result<Fetcher, FetchError> {
    if adapter.technology == Technology::SpaJavascript {
        return Err(FetchError::NeedsBrowser(adapter.id));
    }
    Fetcher::new(adapter.user_agents, adapter.rate, timeout)
}

/// Drive one adapter run: probe, discover, scrape each event, stage, and
/// checkpoint. Per-event failures are caught and the run continues; only
/// engine-level failures (probe, pool, checkpoint I/O) abort.
pub async fn run<F: Fetch>(
    adapter: &Adapter,
    fetcher: &mut F,
    pool: &ConnectionPool,
    config: &PipelineConfig,
    options: &EngineOptions,
) -> Result<RunStats, EngineError> {
    let mut conn = pool.get()?;
    // Scrape-side statements are small; the probe timeout bounds them all.
    db::set_current_user_statement_timeout(&mut conn, config.probe_timeout_seconds)?;
    if !options.dry_run {
        db::probe_staging_writable(&mut conn)?;
    }
    let season_year = db::current_season_year(&mut conn, config.season_year_fallback)?;

    let checkpoint_path: PathBuf = config.checkpoint_dir.join(adapter.checkpoint_file);
    let mut checkpoint = if options.resume {
        Checkpoint::load(&checkpoint_path, adapter.id)?
    } else {
        Checkpoint::new(adapter.id)
    };

    let mut stats = RunStats::start(Utc::now());
    if options.resume {
        stats.absorb(&checkpoint.stats);
    }

    let events = discover_events(&mut conn, adapter, options)?;
    stats.events_found = events.len() as u32;
    info!("{}: {} events to scrape", adapter.id, events.len());
    drop(conn);

    let today = Utc::now().date_naive();
    for event in &events {
        if checkpoint.is_processed(&event.source_event_id) {
            stats.events_skipped += 1;
            continue;
        }

        stats.events_processed += 1;
        match scrape_event(fetcher, adapter, event, season_year, today).await {
            Ok(matches) => {
                stats.events_successful += 1;
                stats.matches_found += matches.len() as u64;

                if !options.dry_run && !matches.is_empty() {
                    let mut conn = pool.get()?;
                    stats.matches_staged +=
                        stage_matches(&mut conn, adapter, event, &matches)? as u64;
                }

                // Zero-match events stay unprocessed so the next run
                // revisits them: future events and empty brackets fill in
                // over time.
                if !matches.is_empty() {
                    checkpoint.mark_processed(&event.source_event_id, Utc::now());
                }
            }
            Err(err) => {
                warn!("{}: event {} failed: {err}", adapter.id, event.source_event_id);
                stats.events_failed += 1;
                stats.record_error(&event.source_event_id, &err);
                // A throwing event is marked processed anyway; retrying it
                // forever would wedge the run loop.
                checkpoint.mark_processed(&event.source_event_id, Utc::now());
            }
        }

        if adapter.save_after_each_item && !options.dry_run {
            checkpoint.stats = stats.clone();
            checkpoint.save(&checkpoint_path)?;
        }
        tokio::time::sleep(adapter.rate.per_iteration_delay).await;
    }

    stats.finish(Utc::now());

    if !options.dry_run {
        if stats.events_failed == 0 {
            Checkpoint::clear(&checkpoint_path)?;
        } else {
            checkpoint.stats = stats.clone();
            checkpoint.save(&checkpoint_path)?;
        }
    }

    Ok(stats)
}

/// Event discovery precedence: explicit event id, then database-backed
/// activity discovery, then the adapter's static list.
fn discover_events(
    conn: &mut matchdb_db::PgConnection,
    adapter: &Adapter,
    options: &EngineOptions,
) -> Result<Vec<DiscoveredEvent>, EngineError> {
    let mut events = if let Some(event_id) = &options.event_id {
        vec![explicit_event(adapter, event_id)]
    } else {
        let discovered = match adapter.discovery {
            matchdb_scrape::DiscoverySpec::StaticOnly => Vec::new(),
            matchdb_scrape::DiscoverySpec::DbActivity {
                lookback_days,
                forward_days,
            } => db::discover_active_events(conn, adapter.id, lookback_days, forward_days)?
                .into_iter()
                .map(|row| DiscoveredEvent {
                    source_event_id: row.source_event_id,
                    name: row.name,
                    kind: if row.kind == "league" {
                        EventKind::League
                    } else {
                        EventKind::Tournament
                    },
                    year: row.year,
                })
                .collect(),
        };
        if discovered.is_empty() {
            adapter
                .static_events
                .iter()
                .map(|event| event.to_discovered())
                .collect()
        } else {
            discovered
        }
    };

    if options.active_only {
        let cutoff = Utc::now().date_naive().year() - 1;
        events.retain(|event| event.year.is_none_or(|year| year >= cutoff));
    }

    events.truncate(adapter.policy.max_events_per_run);
    Ok(events)
}

fn explicit_event(adapter: &Adapter, event_id: &str) -> DiscoveredEvent {
    adapter
        .static_events
        .iter()
        .find(|event| event.source_event_id == event_id)
        .map(|event| event.to_discovered())
        .unwrap_or_else(|| DiscoveredEvent {
            source_event_id: event_id.to_string(),
            name: event_id.to_string(),
            kind: match adapter.plan {
                ScrapePlan::GroupsPerEvent => EventKind::Tournament,
                ScrapePlan::SingleSchedulePage => EventKind::League,
            },
            year: None,
        })
}

/// Scrape one event into parsed matches: fetch its schedule pages, parse
/// rows through the adapter's hooks, apply the data policy, and
/// de-duplicate by match key within the event.
pub async fn scrape_event<F: Fetch>(
    fetcher: &mut F,
    adapter: &Adapter,
    event: &DiscoveredEvent,
    season_year: i32,
    today: NaiveDate,
) -> Result<Vec<ParsedMatch>, EngineError> {
    let pages = match adapter.plan {
        ScrapePlan::GroupsPerEvent => {
            let event_url = adapter.endpoints.event_url(&event.source_event_id);
            let event_html = fetcher.fetch(&event_url).await?;

            let mut group_ids: Vec<String> = Vec::new();
            for href in html::group_links(&event_html, adapter.group_link_selector) {
                if let Some(group_id) = (adapter.parse_group_id)(&href) {
                    if !group_ids.contains(&group_id) {
                        group_ids.push(group_id);
                    }
                }
            }

            let mut pages = Vec::with_capacity(group_ids.len());
            for group_id in &group_ids {
                let url = adapter
                    .endpoints
                    .schedule_url(&event.source_event_id, group_id);
                pages.push(fetcher.fetch(&url).await?);
                tokio::time::sleep(adapter.rate.per_item_delay).await;
            }
            pages
        }
        ScrapePlan::SingleSchedulePage => {
            let url = adapter.endpoints.schedule_url(&event.source_event_id, "");
            vec![fetcher.fetch(&url).await?]
        }
    };

    let mut seen_keys = HashSet::new();
    let mut matches = Vec::new();
    // Event-wide row counter so key fallbacks stay unique across pages
    let mut row_index = 0usize;
    for page in &pages {
        for row in html::schedule_rows(page, &adapter.columns) {
            row_index += 1;
            let Some(parsed) = parse_row(adapter, event, &row, row_index, season_year, today)
            else {
                continue;
            };
            if let Some(date) = parsed.date {
                if date < adapter.policy.min_date {
                    continue;
                }
            }
            if !(adapter.policy.is_valid_match)(&parsed) {
                continue;
            }
            if seen_keys.insert(parsed.source_match_key.clone()) {
                matches.push(parsed);
            }
        }
    }
    Ok(matches)
}

/// Map one schedule-table row through the adapter's parsing hooks. Returns
/// `None` for rows that are not matches (no score separator).
fn parse_row(
    adapter: &Adapter,
    event: &DiscoveredEvent,
    row: &RawRow,
    index: usize,
    season_year: i32,
    today: NaiveDate,
) -> Option<ParsedMatch> {
    let score = (adapter.parse_score)(row.cell(adapter.columns.score));
    if score == matchdb_parsing::ScoreCell::NotAScore {
        return None;
    }
    let (home_score, away_score) = score.scores();

    let number_cell = row.cell(adapter.columns.match_number).trim();
    let match_number = if number_cell.is_empty() {
        format!("r{index}")
    } else {
        number_cell.to_string()
    };

    let default_year = event.year.unwrap_or(season_year);
    let (date, time) = match (adapter.parse_date)(row.cell(adapter.columns.date_time), default_year)
    {
        Some((date, time)) => (Some(date), time),
        None => (None, None),
    };

    let home_team = (adapter.normalize_team_name)(row.cell(adapter.columns.home_team));
    let away_team = (adapter.normalize_team_name)(row.cell(adapter.columns.away_team));
    let venue = row.opt_cell(adapter.columns.location).map(str::to_string);
    // Normalize the bracket label when the division parser understands it;
    // keep the site's own wording otherwise (the raw cell survives in the
    // JSON payload either way).
    let division = row.opt_cell(adapter.columns.division).map(|raw| {
        let info = (adapter.parse_division)(raw);
        match (&info.age_group, info.gender) {
            (Some(age_group), Some(gender)) => {
                let label = match gender {
                    matchdb_parsing::Gender::M => "Boys",
                    matchdb_parsing::Gender::F => "Girls",
                };
                format!("{age_group} {label}")
            }
            _ => raw.to_string(),
        }
    });
    let state = adapter
        .infer_state
        .and_then(|infer| infer(venue.as_deref(), &event.name));

    let status = match (home_score.is_some(), date) {
        (true, Some(date)) if date <= today => MatchStatus::Completed,
        _ => MatchStatus::Scheduled,
    };

    let source_match_key = render_match_key(
        adapter.match_key_template,
        adapter.id,
        &event.source_event_id,
        &match_number,
    );

    let raw = serde_json::json!({
        "cells": row.cells,
        "event": event.source_event_id,
        "row": index,
    });

    Some(ParsedMatch {
        source_match_key,
        match_number,
        date,
        time,
        home_team,
        away_team,
        home_score,
        away_score,
        venue,
        division,
        state,
        status,
        raw,
    })
}

/// Write one event's parsed matches to staging and record the event itself.
/// The engine never writes production tables.
fn stage_matches(
    conn: &mut matchdb_db::PgConnection,
    adapter: &Adapter,
    event: &DiscoveredEvent,
    matches: &[ParsedMatch],
) -> Result<usize, EngineError> {
    let scraped_at = Utc::now().naive_utc();

    let rows: Vec<NewStagingGame<'_>> = matches
        .iter()
        .map(|m| NewStagingGame {
            source_platform: adapter.id,
            source_match_key: &m.source_match_key,
            match_number: Some(&m.match_number),
            match_date: m.date,
            match_time: m.time,
            home_team_name: &m.home_team,
            away_team_name: &m.away_team,
            home_score: m.home_score,
            away_score: m.away_score,
            event_source_id: Some(&event.source_event_id),
            event_name: Some(&event.name),
            event_kind: Some(event.kind.as_str()),
            venue: m.venue.as_deref(),
            division: m.division.as_deref(),
            state: m.state.as_deref(),
            status: m.status.as_str(),
            raw_data: &m.raw,
            processed: false,
            scraped_at,
        })
        .collect();

    let inserted = db::insert_staging_games(conn, &rows)?;
    db::record_staging_event(
        conn,
        &NewStagingEvent {
            source_platform: adapter.id,
            source_event_id: &event.source_event_id,
            name: &event.name,
            kind: event.kind.as_str(),
            year: event.year,
            scraped_at,
        },
    )?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchdb_scrape::adapter::{
        ColumnMap, DataPolicy, DiscoverySpec, Endpoints, RatePolicy, StaticEvent,
    };
    use matchdb_parsing::{ScoreCell, parse_division, parse_flexible_datetime};

    struct ScriptedFetcher {
        pages: Vec<(String, String)>,
    }

    impl Fetch for ScriptedFetcher {
        async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
            self.pages
                .iter()
                .find(|(page_url, _)| page_url == url)
                .map(|(_, body)| body.clone())
                .ok_or_else(|| FetchError::NotFound(url.to_string()))
        }
    }

    fn test_adapter() -> Adapter {
        Adapter {
            id: "testsource",
            name: "Test Source",
            technology: Technology::HtmlStatic,
            endpoints: Endpoints {
                base_url: "http://test",
                event_path: "/events/{eventId}",
                schedule_path: "/events/{eventId}/schedule?group={groupId}",
            },
            rate: RatePolicy {
                request_delay_min: Duration::ZERO,
                request_delay_max: Duration::ZERO,
                per_item_delay: Duration::ZERO,
                per_iteration_delay: Duration::ZERO,
                cooldown_on_429: Duration::ZERO,
                cooldown_on_500: Duration::ZERO,
                retry_delays: &[Duration::ZERO],
                max_retries: 1,
            },
            user_agents: &["test-agent"],
            columns: ColumnMap {
                match_number: 0,
                date_time: 1,
                home_team: 2,
                score: 3,
                away_team: 4,
                location: Some(5),
                division: None,
                expected_columns: 6,
            },
            group_link_selector: "a.group",
            parse_group_id: html::last_path_segment,
            match_key_template: "{source}-{eventId}-{matchNumber}",
            parse_date: parse_flexible_datetime,
            parse_score: ScoreCell::parse,
            parse_division: parse_division,
            normalize_team_name: |raw| raw.split_whitespace().collect::<Vec<_>>().join(" "),
            infer_state: None,
            plan: ScrapePlan::GroupsPerEvent,
            discovery: DiscoverySpec::StaticOnly,
            static_events: &[StaticEvent {
                source_event_id: "E1",
                name: "Test Cup",
                kind: EventKind::Tournament,
                year: Some(2025),
            }],
            policy: DataPolicy {
                min_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                max_events_per_run: 10,
                is_valid_match: |m| {
                    !m.home_team.is_empty()
                        && !m.away_team.is_empty()
                        && !m.home_team.eq_ignore_ascii_case(&m.away_team)
                },
            },
            checkpoint_file: "test-checkpoint.json",
            save_after_each_item: false,
        }
    }

    fn event() -> DiscoveredEvent {
        DiscoveredEvent {
            source_event_id: "E1".to_string(),
            name: "Test Cup".to_string(),
            kind: EventKind::Tournament,
            year: Some(2025),
        }
    }

    const EVENT_PAGE: &str = r#"
        <a class="group" href="/events/E1/groups/A">Group A</a>
        <a class="group" href="/events/E1/groups/B">Group B</a>
        <a class="group" href="/events/E1/groups/A">Group A again</a>
    "#;

    fn schedule_page(rows: &str) -> String {
        format!("<table>{rows}</table>")
    }

    const GROUP_A_ROWS: &str = r#"
        <tr><td>1</td><td>9/14/2025 3:00 PM</td><td>One FC 2014B</td><td>3 - 2</td><td>Tulsa SC 14B</td><td>Field 1</td></tr>
        <tr><td>2</td><td>9/14/2025</td><td>Strikers Red</td><td> - </td><td>Rapids Blue</td><td>Field 2</td></tr>
        <tr><td></td><td>bad row with wrong column count</td></tr>
    "#;

    const GROUP_B_ROWS: &str = r#"
        <tr><td>1</td><td>9/15/2025</td><td>Aces White</td><td>v</td><td>Aces White</td><td></td></tr>
        <tr><td>9</td><td>9/15/2025</td><td>Force 2012G</td><td>1 - 1</td><td>Union 12G</td><td>Field 3</td></tr>
        <tr><td>9</td><td>9/15/2025</td><td>Force 2012G</td><td>1 - 1</td><td>Union 12G</td><td>Field 3</td></tr>
        <tr><td>10</td><td>9/15/2010</td><td>Ancient FC</td><td>0 - 4</td><td>Relic SC</td><td></td></tr>
    "#;

    fn scripted() -> ScriptedFetcher {
        ScriptedFetcher {
            pages: vec![
                ("http://test/events/E1".to_string(), EVENT_PAGE.to_string()),
                (
                    "http://test/events/E1/schedule?group=A".to_string(),
                    schedule_page(GROUP_A_ROWS),
                ),
                (
                    "http://test/events/E1/schedule?group=B".to_string(),
                    schedule_page(GROUP_B_ROWS),
                ),
            ],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
    }

    #[tokio::test]
    async fn scrapes_groups_and_applies_policy() {
        let adapter = test_adapter();
        let mut fetcher = scripted();
        let matches = scrape_event(&mut fetcher, &adapter, &event(), 2026, today())
            .await
            .unwrap();

        // Group A: two good rows. Group B: the "v" score cell row is
        // skipped (no separator); the duplicate match 9 is deduped; the
        // 2010 match is before min_date; match 9 survives once.
        let keys: Vec<&str> = matches.iter().map(|m| m.source_match_key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["testsource-E1-1", "testsource-E1-2", "testsource-E1-9"]
        );
    }

    #[tokio::test]
    async fn parses_scores_dates_and_status() {
        let adapter = test_adapter();
        let mut fetcher = scripted();
        let matches = scrape_event(&mut fetcher, &adapter, &event(), 2026, today())
            .await
            .unwrap();

        let played = &matches[0];
        assert_eq!(played.home_team, "One FC 2014B");
        assert_eq!(played.home_score, Some(3));
        assert_eq!(played.away_score, Some(2));
        assert_eq!(played.date, NaiveDate::from_ymd_opt(2025, 9, 14));
        assert_eq!(played.status, MatchStatus::Completed);
        assert_eq!(played.venue.as_deref(), Some("Field 1"));

        let scheduled = &matches[1];
        assert_eq!(scheduled.home_score, None);
        assert_eq!(scheduled.status, MatchStatus::Scheduled);
    }

    #[tokio::test]
    async fn future_match_with_scores_is_still_scheduled() {
        // A data-entry quirk: scores present but the date is in the future.
        let adapter = test_adapter();
        let mut fetcher = scripted();
        let earlier_today = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let matches = scrape_event(&mut fetcher, &adapter, &event(), 2026, earlier_today)
            .await
            .unwrap();
        assert_eq!(matches[0].status, MatchStatus::Scheduled);
    }

    #[tokio::test]
    async fn event_with_no_match_rows_yields_empty() {
        // The run loop leaves such events out of processedEventIds so the
        // next run revisits them.
        let adapter = test_adapter();
        let mut fetcher = ScriptedFetcher {
            pages: vec![
                (
                    "http://test/events/E1".to_string(),
                    r#"<a class="group" href="/events/E1/groups/A">Group A</a>"#.to_string(),
                ),
                (
                    "http://test/events/E1/schedule?group=A".to_string(),
                    schedule_page("<tr><td colspan='6'>Bracket forming</td></tr>"),
                ),
            ],
        };
        let matches = scrape_event(&mut fetcher, &adapter, &event(), 2026, today())
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn missing_event_page_is_an_error() {
        let adapter = test_adapter();
        let mut fetcher = ScriptedFetcher { pages: vec![] };
        let err = scrape_event(&mut fetcher, &adapter, &event(), 2026, today())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Fetch(FetchError::NotFound(_))));
    }

    #[test]
    fn explicit_event_prefers_the_static_list() {
        let adapter = test_adapter();
        let known = explicit_event(&adapter, "E1");
        assert_eq!(known.name, "Test Cup");
        assert_eq!(known.year, Some(2025));

        let unknown = explicit_event(&adapter, "E999");
        assert_eq!(unknown.name, "E999");
        assert_eq!(unknown.kind, EventKind::Tournament);
    }

    #[test]
    fn spa_sources_refuse_the_plain_fetcher() {
        let mut adapter = test_adapter();
        adapter.technology = Technology::SpaJavascript;
        let err = default_fetcher(&adapter, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, FetchError::NeedsBrowser("testsource")));
    }
}
