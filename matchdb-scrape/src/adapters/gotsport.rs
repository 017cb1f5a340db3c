use crate::adapter::{
    Adapter, ColumnMap, DataPolicy, DiscoverySpec, Endpoints, EventKind, ParsedMatch, RatePolicy,
    ScrapePlan, StaticEvent, Technology,
};
use crate::adapters::DEFAULT_USER_AGENTS;
use crate::html;
use chrono::NaiveDate;
use matchdb_parsing::{ScoreCell, parse_division, parse_flexible_datetime};
use std::time::Duration;

const RETRY_DELAYS: &[Duration] = &[
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(15),
];

const STATIC_EVENTS: &[StaticEvent] = &[
    StaticEvent {
        source_event_id: "88765",
        name: "Heartland Invitational 2025",
        kind: EventKind::Tournament,
        year: Some(2025),
    },
    StaticEvent {
        source_event_id: "91203",
        name: "Midwest Champions Cup 2026",
        kind: EventKind::Tournament,
        year: Some(2026),
    },
];

fn is_valid_match(parsed: &ParsedMatch) -> bool {
    !parsed.home_team.is_empty()
        && !parsed.away_team.is_empty()
        && !parsed.home_team.eq_ignore_ascii_case(&parsed.away_team)
}

fn clean_team_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// GotSport tournament platform: server-rendered event pages with one
/// schedule page per bracket group.
pub fn gotsport() -> Adapter {
    Adapter {
        id: "gotsport",
        name: "GotSport",
        technology: Technology::HtmlStatic,
        endpoints: Endpoints {
            base_url: "https://system.gotsport.com",
            event_path: "/org_event/events/{eventId}",
            schedule_path: "/org_event/events/{eventId}/schedules?group={groupId}",
        },
        rate: RatePolicy {
            request_delay_min: Duration::from_millis(1_500),
            request_delay_max: Duration::from_millis(4_000),
            per_item_delay: Duration::from_millis(500),
            per_iteration_delay: Duration::from_secs(2),
            cooldown_on_429: Duration::from_secs(60),
            cooldown_on_500: Duration::from_secs(15),
            retry_delays: RETRY_DELAYS,
            max_retries: 3,
        },
        user_agents: DEFAULT_USER_AGENTS,
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
        group_link_selector: "a[href*='schedules?group=']",
        parse_group_id: |href| html::query_param(href, "group"),
        match_key_template: "{source}-{eventId}-{matchNumber}",
        parse_date: parse_flexible_datetime,
        parse_score: ScoreCell::parse,
        parse_division: parse_division,
        normalize_team_name: clean_team_name,
        infer_state: None,
        plan: ScrapePlan::GroupsPerEvent,
        discovery: DiscoverySpec::DbActivity {
            lookback_days: 14,
            forward_days: 30,
        },
        static_events: STATIC_EVENTS,
        policy: DataPolicy {
            min_date: NaiveDate::from_ymd_opt(2022, 8, 1).expect("valid date"),
            max_events_per_run: 50,
            is_valid_match,
        },
        checkpoint_file: "gotsport-checkpoint.json",
        save_after_each_item: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MatchStatus;

    fn parsed(home: &str, away: &str) -> ParsedMatch {
        ParsedMatch {
            source_match_key: String::new(),
            match_number: "1".into(),
            date: None,
            time: None,
            home_team: home.into(),
            away_team: away.into(),
            home_score: None,
            away_score: None,
            venue: None,
            division: None,
            state: None,
            status: MatchStatus::Scheduled,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn rejects_self_matches_and_blank_teams() {
        let adapter = gotsport();
        assert!((adapter.policy.is_valid_match)(&parsed("One FC", "Two FC")));
        assert!(!(adapter.policy.is_valid_match)(&parsed("One FC", "one fc")));
        assert!(!(adapter.policy.is_valid_match)(&parsed("", "Two FC")));
    }

    #[test]
    fn group_id_comes_from_the_query_string() {
        let adapter = gotsport();
        assert_eq!(
            (adapter.parse_group_id)("/org_event/events/1/schedules?group=42"),
            Some("42".to_string())
        );
        assert_eq!((adapter.parse_group_id)("/org_event/events/1"), None);
    }

    #[test]
    fn team_name_hook_collapses_scraper_whitespace() {
        let adapter = gotsport();
        assert_eq!(
            (adapter.normalize_team_name)("  One FC   2014B "),
            "One FC 2014B"
        );
    }
}
