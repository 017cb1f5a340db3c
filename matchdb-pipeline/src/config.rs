use chrono::NaiveDate;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct ValidatorConfig {
    pub known_platforms: Vec<String>,
    pub min_match_date: NaiveDate,
    pub max_match_date: NaiveDate,
    /// Regexes that mark a record as recreational/non-premier. Policy knob:
    /// sites disagree about what counts, so operators tune this per deploy.
    pub recreational_patterns: Vec<String>,
    /// Age bounds implied by an extracted birth year.
    pub min_age: i32,
    pub max_age: i32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            known_platforms: vec![
                "gotsport".to_string(),
                "heartland".to_string(),
                "playmetrics".to_string(),
                "legacy".to_string(),
            ],
            min_match_date: NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date"),
            max_match_date: NaiveDate::from_ymd_opt(2027, 12, 31).expect("valid date"),
            recreational_patterns: vec![
                "(?i)recreational".to_string(),
                r"(?i)\brec\b".to_string(),
            ],
            min_age: 5,
            max_age: 20,
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub db_pool_size: u32,
    /// Statement timeout for the startup write probe. Deliberately short:
    /// a wedged database should fail the run, not hang it.
    pub probe_timeout_seconds: i64,
    /// Statement timeout for reconciliation jobs, which run minutes-long
    /// bulk statements.
    pub reconcile_timeout_seconds: i64,
    pub fetch_timeout_seconds: u64,
    pub promote_batch_size: usize,
    /// Used when the seasons table has no current row.
    pub season_year_fallback: i32,
    pub checkpoint_dir: PathBuf,
    pub validator: ValidatorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_pool_size: 5,
            probe_timeout_seconds: 30,
            reconcile_timeout_seconds: 600,
            fetch_timeout_seconds: 30,
            promote_batch_size: 500,
            season_year_fallback: 2026,
            checkpoint_dir: PathBuf::from("."),
            validator: ValidatorConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("MATCHDB.toml"))
            .merge(Env::prefixed("MATCHDB_"))
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_extract_cleanly() {
        let config: PipelineConfig = Figment::from(Serialized::defaults(PipelineConfig::default()))
            .extract()
            .unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn default_date_bounds_bracket_the_data() {
        let config = PipelineConfig::default();
        assert!(config.validator.min_match_date < config.validator.max_match_date);
    }
}
