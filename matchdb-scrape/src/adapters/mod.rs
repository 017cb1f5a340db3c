//! The per-source adapters. Each one is declarative config plus pure
//! parsing hooks; adding a source means adding a file here and listing it
//! in [`all`]. Nothing in an adapter may touch the network, the filesystem,
//! or the database.

mod gotsport;
mod heartland;
mod playmetrics;

use crate::adapter::Adapter;

pub use gotsport::gotsport;
pub use heartland::heartland;
pub use playmetrics::playmetrics;

/// Browser user agents shared by sources that don't need their own list.
pub(crate) const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

pub fn all() -> Vec<Adapter> {
    vec![gotsport(), heartland(), playmetrics()]
}

pub fn by_id(id: &str) -> Option<Adapter> {
    all().into_iter().find(|adapter| adapter.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_finds_every_adapter_by_id() {
        for adapter in all() {
            let found = by_id(adapter.id).expect("adapter should be registered");
            assert_eq!(found.name, adapter.name);
        }
        assert!(by_id("nonexistent").is_none());
    }

    #[test]
    fn adapter_ids_are_unique() {
        let adapters = all();
        for (i, a) in adapters.iter().enumerate() {
            for b in &adapters[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn every_key_template_carries_the_identifying_tokens() {
        for adapter in all() {
            assert!(adapter.match_key_template.contains("{eventId}"), "{}", adapter.id);
            assert!(
                adapter.match_key_template.contains("{matchNumber}"),
                "{}",
                adapter.id
            );
        }
    }

    #[test]
    fn every_adapter_has_user_agents_and_sane_delays() {
        for adapter in all() {
            assert!(!adapter.user_agents.is_empty(), "{}", adapter.id);
            assert!(
                adapter.rate.request_delay_min <= adapter.rate.request_delay_max,
                "{}",
                adapter.id
            );
            assert!(adapter.rate.max_retries > 0, "{}", adapter.id);
        }
    }
}
