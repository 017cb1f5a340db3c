use crate::adapter::{
    Adapter, ColumnMap, DataPolicy, DiscoverySpec, Endpoints, EventKind, ParsedMatch, RatePolicy,
    ScrapePlan, StaticEvent, Technology,
};
use crate::adapters::DEFAULT_USER_AGENTS;
use crate::html;
use chrono::NaiveDate;
use matchdb_parsing::{ScoreCell, parse_division, parse_flexible_datetime};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

const RETRY_DELAYS: &[Duration] = &[
    Duration::from_secs(5),
    Duration::from_secs(15),
    Duration::from_secs(60),
];

// Heartland publishes one calendar page per season; the season slug is the
// event id.
const STATIC_EVENTS: &[StaticEvent] = &[
    StaticEvent {
        source_event_id: "fall-2025",
        name: "Heartland League Fall 2025",
        kind: EventKind::League,
        year: Some(2025),
    },
    StaticEvent {
        source_event_id: "spring-2026",
        name: "Heartland League Spring 2026",
        kind: EventKind::League,
        year: Some(2026),
    },
];

// Seed markers the calendar appends to team names: "One FC 2014B (3)"
static SEED_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\(\d+\)\s*$").unwrap());

fn clean_team_name(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    SEED_MARKER.replace(&collapsed, "").into_owned()
}

fn is_valid_match(parsed: &ParsedMatch) -> bool {
    !parsed.home_team.is_empty()
        && !parsed.away_team.is_empty()
        && !parsed.home_team.eq_ignore_ascii_case(&parsed.away_team)
}

/// Heartland Soccer Association league calendar: a single server-rendered
/// schedule page per season, Kansas/Missouri metro teams.
pub fn heartland() -> Adapter {
    Adapter {
        id: "heartland",
        name: "Heartland Soccer Association",
        technology: Technology::HtmlStatic,
        endpoints: Endpoints {
            base_url: "https://heartlandsoccer.net",
            event_path: "/calendar/{eventId}",
            schedule_path: "/calendar/{eventId}/full-schedule",
        },
        rate: RatePolicy {
            request_delay_min: Duration::from_millis(2_000),
            request_delay_max: Duration::from_millis(5_000),
            per_item_delay: Duration::from_secs(1),
            per_iteration_delay: Duration::from_secs(3),
            cooldown_on_429: Duration::from_secs(120),
            cooldown_on_500: Duration::from_secs(30),
            retry_delays: RETRY_DELAYS,
            max_retries: 2,
        },
        user_agents: DEFAULT_USER_AGENTS,
        columns: ColumnMap {
            match_number: 0,
            date_time: 1,
            home_team: 2,
            score: 3,
            away_team: 4,
            location: Some(5),
            division: Some(6),
            expected_columns: 7,
        },
        group_link_selector: "a.schedule-group",
        parse_group_id: html::last_path_segment,
        // "-cal-" marks rows that came off the calendar rather than a
        // bracket page; downstream policy treats them differently.
        match_key_template: "{source}-cal-{eventId}-{matchNumber}",
        parse_date: parse_flexible_datetime,
        parse_score: ScoreCell::parse,
        parse_division: parse_division,
        normalize_team_name: clean_team_name,
        infer_state: Some(|_venue, _event_name| Some("KS".to_string())),
        plan: ScrapePlan::SingleSchedulePage,
        discovery: DiscoverySpec::StaticOnly,
        static_events: STATIC_EVENTS,
        policy: DataPolicy {
            min_date: NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date"),
            max_events_per_run: 4,
            is_valid_match,
        },
        checkpoint_file: "heartland-checkpoint.json",
        save_after_each_item: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_seed_markers_from_team_names() {
        assert_eq!(clean_team_name("One FC 2014B (3)"), "One FC 2014B");
        assert_eq!(clean_team_name("One FC 2014B"), "One FC 2014B");
        // A number that is not a seed marker stays
        assert_eq!(clean_team_name("One FC (2014B)"), "One FC (2014B)");
    }

    #[test]
    fn calendar_keys_carry_the_cal_marker() {
        let adapter = heartland();
        let key = crate::adapter::render_match_key(
            adapter.match_key_template,
            adapter.id,
            "spring-2026",
            "118",
        );
        assert_eq!(key, "heartland-cal-spring-2026-118");
    }

    #[test]
    fn state_inference_defaults_to_kansas() {
        let adapter = heartland();
        let infer = adapter.infer_state.expect("heartland infers state");
        assert_eq!(infer(None, "Heartland League"), Some("KS".to_string()));
    }
}
