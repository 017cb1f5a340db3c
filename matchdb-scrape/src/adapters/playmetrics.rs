use crate::adapter::{
    Adapter, ColumnMap, DataPolicy, DiscoverySpec, Endpoints, ParsedMatch, RatePolicy, ScrapePlan,
    Technology,
};
use crate::adapters::DEFAULT_USER_AGENTS;
use crate::html;
use chrono::NaiveDate;
use matchdb_parsing::{ScoreCell, parse_division, parse_flexible_datetime};
use std::time::Duration;

const RETRY_DELAYS: &[Duration] = &[Duration::from_secs(10), Duration::from_secs(30)];

fn is_valid_match(parsed: &ParsedMatch) -> bool {
    !parsed.home_team.is_empty()
        && !parsed.away_team.is_empty()
        && !parsed.home_team.eq_ignore_ascii_case(&parsed.away_team)
}

fn clean_team_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// PlayMetrics club platform. The schedule tables are rendered client-side,
/// so this adapter only works when the caller supplies a browser-backed
/// fetcher; with the plain HTTP fetcher the engine refuses at startup.
pub fn playmetrics() -> Adapter {
    Adapter {
        id: "playmetrics",
        name: "PlayMetrics",
        technology: Technology::SpaJavascript,
        endpoints: Endpoints {
            base_url: "https://app.playmetrics.com",
            event_path: "/leagues/{eventId}",
            schedule_path: "/leagues/{eventId}/divisions/{groupId}/schedule",
        },
        rate: RatePolicy {
            request_delay_min: Duration::from_millis(3_000),
            request_delay_max: Duration::from_millis(6_000),
            per_item_delay: Duration::from_secs(2),
            per_iteration_delay: Duration::from_secs(5),
            cooldown_on_429: Duration::from_secs(180),
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
            location: None,
            division: Some(5),
            expected_columns: 6,
        },
        group_link_selector: "a[href*='/divisions/']",
        parse_group_id: html::last_path_segment,
        match_key_template: "{source}-{eventId}-{matchNumber}",
        parse_date: parse_flexible_datetime,
        parse_score: ScoreCell::parse,
        parse_division: parse_division,
        normalize_team_name: clean_team_name,
        infer_state: None,
        plan: ScrapePlan::GroupsPerEvent,
        discovery: DiscoverySpec::DbActivity {
            lookback_days: 21,
            forward_days: 45,
        },
        static_events: &[],
        policy: DataPolicy {
            min_date: NaiveDate::from_ymd_opt(2023, 8, 1).expect("valid date"),
            max_events_per_run: 20,
            is_valid_match,
        },
        checkpoint_file: "playmetrics-checkpoint.json",
        save_after_each_item: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_marked_as_requiring_javascript() {
        assert_eq!(playmetrics().technology, Technology::SpaJavascript);
    }

    #[test]
    fn division_group_ids_come_from_the_path() {
        let adapter = playmetrics();
        assert_eq!(
            (adapter.parse_group_id)("/leagues/77/divisions/D12"),
            Some("D12".to_string())
        );
    }
}
