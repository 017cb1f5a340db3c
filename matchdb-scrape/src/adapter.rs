use chrono::{NaiveDate, NaiveTime};
use matchdb_parsing::{DivisionInfo, ScoreCell};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a source serves its pages, which decides what kind of fetcher the
/// engine needs. A `SpaJavascript` source cannot be scraped with the plain
/// HTTP fetcher; the caller must supply a browser-backed [`crate::Fetch`]
/// implementation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Technology {
    HtmlStatic,
    SpaJavascript,
    HttpApi,
    Mixed,
}

/// League or tournament. The production store keeps the two in separate
/// tables, and a match links to exactly one of them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    League,
    Tournament,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::League => "league",
            EventKind::Tournament => "tournament",
        }
    }
}

/// An event as the adapter sees it, before any production id exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEvent {
    pub source_event_id: String,
    pub name: String,
    pub kind: EventKind,
    pub year: Option<i32>,
}

/// A statically configured event in an adapter's `events` list.
pub struct StaticEvent {
    pub source_event_id: &'static str,
    pub name: &'static str,
    pub kind: EventKind,
    pub year: Option<i32>,
}

impl StaticEvent {
    pub fn to_discovered(&self) -> DiscoveredEvent {
        DiscoveredEvent {
            source_event_id: self.source_event_id.to_string(),
            name: self.name.to_string(),
            kind: self.kind,
            year: self.year,
        }
    }
}

/// Base URL plus templated paths. Templates use `{eventId}` and `{groupId}`
/// tokens, expanded by [`Endpoints::event_url`] / [`Endpoints::schedule_url`].
pub struct Endpoints {
    pub base_url: &'static str,
    pub event_path: &'static str,
    pub schedule_path: &'static str,
}

impl Endpoints {
    pub fn event_url(&self, event_id: &str) -> String {
        format!("{}{}", self.base_url, self.event_path.replace("{eventId}", event_id))
    }

    pub fn schedule_url(&self, event_id: &str, group_id: &str) -> String {
        let path = self
            .schedule_path
            .replace("{eventId}", event_id)
            .replace("{groupId}", group_id);
        format!("{}{}", self.base_url, path)
    }
}

/// Politeness and resilience policy for one source.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    /// Uniform jitter bounds applied before every request.
    pub request_delay_min: Duration,
    pub request_delay_max: Duration,
    /// Extra delay after each scraped group/schedule page.
    pub per_item_delay: Duration,
    /// Extra delay after each event.
    pub per_iteration_delay: Duration,
    pub cooldown_on_429: Duration,
    pub cooldown_on_500: Duration,
    /// Backoff schedule for transport errors; the last entry repeats.
    pub retry_delays: &'static [Duration],
    pub max_retries: u32,
}

/// 0-indexed positions of the match fields within a schedule-table row.
pub struct ColumnMap {
    pub match_number: usize,
    pub date_time: usize,
    pub home_team: usize,
    pub score: usize,
    pub away_team: usize,
    pub location: Option<usize>,
    pub division: Option<usize>,
    /// Rows with any other cell count are not match rows.
    pub expected_columns: usize,
}

/// How the engine turns one event into schedule pages.
pub enum ScrapePlan {
    /// Fetch the event page, extract group links, fetch one schedule page
    /// per group. The common tournament-site shape.
    GroupsPerEvent,
    /// The event id itself addresses a single schedule page. The common
    /// league-calendar shape.
    SingleSchedulePage,
}

/// How the engine finds events when none was given on the command line.
pub enum DiscoverySpec {
    /// Only the adapter's static `events` list.
    StaticOnly,
    /// Query production for events of this source that still show matches
    /// inside the window; falls back to the static list when empty.
    DbActivity { lookback_days: i64, forward_days: i64 },
}

/// Row-level filters applied after parsing, before staging.
pub struct DataPolicy {
    /// Matches dated earlier than this are discarded unseen.
    pub min_date: NaiveDate,
    pub max_events_per_run: usize,
    pub is_valid_match: fn(&ParsedMatch) -> bool,
}

/// Scheduled vs completed, inferred at parse time: completed iff both
/// scores are present and the date is in the past.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Completed,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Completed => "completed",
        }
    }
}

/// One match as parsed from a schedule page, ready for staging.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedMatch {
    pub source_match_key: String,
    pub match_number: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub venue: Option<String>,
    pub division: Option<String>,
    pub state: Option<String>,
    pub status: MatchStatus,
    /// The adapter's raw view of the row, persisted for forensic replay.
    pub raw: serde_json::Value,
}

/// A declarative per-source configuration bundle. Everything the engine
/// needs to drive one source: endpoints, politeness, parsing hooks, and
/// data policy. Adapters hold no connections and do no I/O themselves.
pub struct Adapter {
    pub id: &'static str,
    pub name: &'static str,
    pub technology: Technology,
    pub endpoints: Endpoints,
    pub rate: RatePolicy,
    /// Re-picked uniformly at random on every attempt.
    pub user_agents: &'static [&'static str],
    pub columns: ColumnMap,
    /// CSS selector for group links on the event page.
    pub group_link_selector: &'static str,
    /// Extract the `{groupId}` from a group link's href.
    pub parse_group_id: fn(&str) -> Option<String>,
    /// Token template, e.g. `"{source}-{eventId}-{matchNumber}"`.
    pub match_key_template: &'static str,
    pub parse_date: fn(&str, i32) -> Option<(NaiveDate, Option<NaiveTime>)>,
    pub parse_score: fn(&str) -> ScoreCell,
    pub parse_division: fn(&str) -> DivisionInfo,
    pub normalize_team_name: fn(&str) -> String,
    /// Best-effort US-state inference from the row and event.
    pub infer_state: Option<fn(venue: Option<&str>, event_name: &str) -> Option<String>>,
    pub plan: ScrapePlan,
    pub discovery: DiscoverySpec,
    pub static_events: &'static [StaticEvent],
    pub policy: DataPolicy,
    pub checkpoint_file: &'static str,
    /// Save the checkpoint after every event rather than at run end.
    pub save_after_each_item: bool,
}

/// Expand a match-key template. Unknown tokens are left in place so a typo
/// in an adapter shows up verbatim in staging instead of vanishing.
pub fn render_match_key(
    template: &str,
    source: &str,
    event_id: &str,
    match_number: &str,
) -> String {
    template
        .replace("{source}", source)
        .replace("{eventId}", event_id)
        .replace("{matchNumber}", match_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_templates_expand() {
        let e = Endpoints {
            base_url: "https://example.test",
            event_path: "/events/{eventId}",
            schedule_path: "/events/{eventId}/schedule?group={groupId}",
        };
        assert_eq!(e.event_url("E1"), "https://example.test/events/E1");
        assert_eq!(
            e.schedule_url("E1", "G9"),
            "https://example.test/events/E1/schedule?group=G9"
        );
    }

    #[test]
    fn match_key_template_expands_all_tokens() {
        let key = render_match_key("{source}-{eventId}-{matchNumber}", "gotsport", "1234", "56");
        assert_eq!(key, "gotsport-1234-56");
    }

    #[test]
    fn match_key_is_deterministic() {
        let a = render_match_key("{source}-{eventId}-{matchNumber}", "gotsport", "1234", "56");
        let b = render_match_key("{source}-{eventId}-{matchNumber}", "gotsport", "1234", "56");
        assert_eq!(a, b);
    }
}
