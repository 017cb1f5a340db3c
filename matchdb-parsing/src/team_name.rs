use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use strum::{Display, EnumString};

/// Team gender as encoded in scraped names ("2014B", "U11 Girls", ...).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum Gender {
    /// Boys
    M,
    /// Girls
    F,
}

/// The canonical identity extracted from one raw team-name string.
///
/// `canonical_name` is stable under re-extraction: feeding it back into
/// [`extract_identity`] yields the same identity. `birth_year_conflict` is
/// set when the main name and a parenthesized suffix disagree about the
/// birth year; in that case `birth_year` holds the main name's value and the
/// caller decides what to do with the conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamIdentity {
    pub canonical_name: String,
    pub birth_year: Option<i32>,
    pub gender: Option<Gender>,
    pub birth_year_conflict: bool,
}

// Year tokens: "2014B", "2015 B", "2014"
static YEAR4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(20\d{2})\s?([BG])?\b").unwrap());
// "15B"
static YEAR2_SUFFIXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{2})([BG])\b").unwrap());
// "B15"
static YEAR2_PREFIXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([BG])(\d{2})\b").unwrap());
// Trailing bare two-digit year: "Sporting Blue 14"
static YEAR2_TRAILING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{2})\s*$").unwrap());
// Competition-level word followed by a two-digit year: "Premier 14"
static LEVEL_YEAR2: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:premier|academy|elite|select|united|nal|npl|ecnl|ecrl)\s+(\d{2})\b")
        .unwrap()
});
// Age-group tokens: "U11", "u9"
static U_AGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bU(\d{1,2})\b").unwrap());
// Gender words
static GENDER_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(boys|girls)\b").unwrap());
// Trailing parenthesized suffix: "Strikers Red (U11 Boys)"
static PAREN_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]*)\)\s*$").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapse the duplicated leading words some scrapers produce when a site
/// renders the club name twice ("One FC One FC 2014B" -> "One FC 2014B").
///
/// A duplicated two-word prefix wins over a duplicated single word, and the
/// comparison is case-insensitive. Idempotent.
pub fn collapse_duplicate_prefix(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() >= 4
        && words[0].eq_ignore_ascii_case(words[2])
        && words[1].eq_ignore_ascii_case(words[3])
    {
        return words[2..].join(" ");
    }
    if words.len() >= 2 && words[0].eq_ignore_ascii_case(words[1]) {
        return words[1..].join(" ");
    }
    words.join(" ")
}

/// Extract `(canonical_name, birth_year, gender)` from a raw scraped team
/// name. `season_year` anchors the `U{age}` -> birth-year mapping.
pub fn extract_identity(raw: &str, season_year: i32) -> TeamIdentity {
    let trimmed = raw.trim();
    let collapsed = collapse_duplicate_prefix(trimmed);

    // Split off a trailing "(U11 Boys)"-style suffix. The suffix never
    // contributes to the canonical name, only to year/gender extraction.
    let (main, suffix) = match PAREN_SUFFIX.captures(&collapsed) {
        Some(caps) => {
            let main = collapsed[..caps.get(0).unwrap().start()].trim_end();
            (main, Some(caps.get(1).unwrap().as_str().trim().to_string()))
        }
        None => (collapsed.as_str(), None),
    };

    let canonical_name = WHITESPACE_RUN
        .replace_all(main, " ")
        .trim()
        .to_lowercase();

    let main_year = birth_year_from_main(main, season_year);
    let suffix_year = suffix
        .as_deref()
        .and_then(|s| birth_year_from_suffix(s, season_year));
    let birth_year = main_year.or(suffix_year);
    let birth_year_conflict = matches!((main_year, suffix_year), (Some(m), Some(s)) if m != s);

    let gender = suffix
        .as_deref()
        .and_then(gender_from_text)
        .or_else(|| gender_from_text(main));

    TeamIdentity {
        canonical_name,
        birth_year,
        gender,
        birth_year_conflict,
    }
}

fn in_valid_range(year: i32, season_year: i32) -> bool {
    (season_year - 19..=season_year - 7).contains(&year)
}

fn expand_two_digit(dd: i32) -> i32 {
    if dd <= 30 { 2000 + dd } else { 1900 + dd }
}

/// Birth-year rules for the main name, first match wins.
fn birth_year_from_main(text: &str, season_year: i32) -> Option<i32> {
    // 1. Four-digit year ("2014B", "2015 B", "2014")
    if let Some(caps) = YEAR4.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        if in_valid_range(year, season_year) {
            return Some(year);
        }
    }

    // 2. Two-digit year adjacent to a gender letter ("15B", "B15")
    for re in [&*YEAR2_SUFFIXED, &*YEAR2_PREFIXED] {
        if let Some(caps) = re.captures(text) {
            let dd = caps
                .iter()
                .skip(1)
                .flatten()
                .find_map(|m| m.as_str().parse::<i32>().ok())?;
            let year = expand_two_digit(dd);
            if in_valid_range(year, season_year) {
                return Some(year);
            }
        }
    }

    // 3. Trailing standalone two-digit year
    if let Some(caps) = YEAR2_TRAILING.captures(text) {
        if let Ok(dd) = caps[1].parse::<i32>() {
            let year = expand_two_digit(dd);
            if in_valid_range(year, season_year) {
                return Some(year);
            }
        }
    }

    // 4. Level word followed by a two-digit year ("Premier 14")
    if let Some(caps) = LEVEL_YEAR2.captures(text) {
        if let Ok(dd) = caps[1].parse::<i32>() {
            let year = expand_two_digit(dd);
            if in_valid_range(year, season_year) {
                return Some(year);
            }
        }
    }

    // 6. Inline age-group token ("Strikers U11 Red")
    birth_year_from_u_age(text, season_year)
}

/// Birth-year rules for a parenthesized suffix: the explicit year forms,
/// then the `U{age}` form ("U11 Boys").
fn birth_year_from_suffix(suffix: &str, season_year: i32) -> Option<i32> {
    if let Some(caps) = YEAR4.captures(suffix) {
        let year: i32 = caps[1].parse().ok()?;
        if in_valid_range(year, season_year) {
            return Some(year);
        }
    }
    if let Some(caps) = YEAR2_SUFFIXED.captures(suffix) {
        let year = expand_two_digit(caps[1].parse().ok()?);
        if in_valid_range(year, season_year) {
            return Some(year);
        }
    }
    birth_year_from_u_age(suffix, season_year)
}

fn birth_year_from_u_age(text: &str, season_year: i32) -> Option<i32> {
    let caps = U_AGE.captures(text)?;
    let age: i32 = caps[1].parse().ok()?;
    if (7..=19).contains(&age) {
        Some(season_year - age)
    } else {
        None
    }
}

/// Any four-digit year token, with no validity filtering. The intake
/// validator uses this to reject names like "Old Boys 1990" that the
/// range-filtered extraction would silently ignore.
pub fn extract_raw_year_token(raw: &str) -> Option<i32> {
    static ANY_YEAR4: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\b((?:19|20)\d{2})[BG]?\b").unwrap());
    ANY_YEAR4
        .captures(raw)
        .and_then(|caps| caps[1].parse().ok())
}

fn gender_from_text(text: &str) -> Option<Gender> {
    if let Some(caps) = GENDER_WORD.captures(text) {
        return match caps[1].to_ascii_lowercase().as_str() {
            "boys" => Some(Gender::M),
            "girls" => Some(Gender::F),
            _ => None,
        };
    }
    for re in [&*YEAR4, &*YEAR2_SUFFIXED, &*YEAR2_PREFIXED] {
        if let Some(caps) = re.captures(text) {
            let letter = caps
                .iter()
                .skip(1)
                .flatten()
                .find(|m| m.as_str().len() == 1)
                .map(|m| m.as_str().to_ascii_uppercase());
            match letter.as_deref() {
                Some("B") => return Some(Gender::M),
                Some("G") => return Some(Gender::F),
                _ => {}
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEASON: i32 = 2026;

    fn identity(raw: &str) -> TeamIdentity {
        extract_identity(raw, SEASON)
    }

    #[test]
    fn collapses_duplicated_two_word_prefix() {
        assert_eq!(collapse_duplicate_prefix("One FC One FC 2014B"), "One FC 2014B");
        assert_eq!(
            collapse_duplicate_prefix("Sporting KC Sporting KC Academy"),
            "Sporting KC Academy"
        );
    }

    #[test]
    fn collapses_duplicated_single_word() {
        assert_eq!(collapse_duplicate_prefix("Strikers Strikers 15B"), "Strikers 15B");
    }

    #[test]
    fn duplicate_prefix_is_case_insensitive() {
        assert_eq!(collapse_duplicate_prefix("ONE fc One FC 2014B"), "One FC 2014B");
    }

    #[test]
    fn duplicate_prefix_collapse_is_idempotent() {
        let once = collapse_duplicate_prefix("One FC One FC 2014B");
        assert_eq!(collapse_duplicate_prefix(&once), once);
    }

    #[test]
    fn leaves_legitimate_names_alone() {
        assert_eq!(collapse_duplicate_prefix("One FC 2014B"), "One FC 2014B");
        assert_eq!(collapse_duplicate_prefix("Real Salt Lake"), "Real Salt Lake");
    }

    #[test]
    fn duplicated_prefix_and_original_extract_identically() {
        let a = identity("One FC One FC 2014B");
        let b = identity("One FC 2014B");
        assert_eq!(a, b);
        assert_eq!(a.canonical_name, "one fc 2014b");
        assert_eq!(a.birth_year, Some(2014));
        assert_eq!(a.gender, Some(Gender::M));
    }

    #[test]
    fn canonical_name_is_idempotent() {
        for raw in [
            "One FC One FC 2014B",
            "KC Athletics 15G Premier",
            "Strikers Red (U11 Boys)",
            "  Tulsa  SC   B15 ",
            "Sporting Blue 14",
        ] {
            let once = identity(raw);
            let twice = identity(&once.canonical_name);
            assert_eq!(once.canonical_name, twice.canonical_name, "raw: {raw}");
        }
    }

    #[test]
    fn extraction_is_stable_when_tokens_live_in_the_name() {
        // Without a parenthesized suffix, year and gender tokens survive into
        // the canonical name, so the full identity round-trips.
        for raw in ["One FC One FC 2014B", "KC Athletics 15G Premier", "Tulsa SC B15"] {
            let once = identity(raw);
            let twice = identity(&once.canonical_name);
            assert_eq!(once.birth_year, twice.birth_year, "raw: {raw}");
            assert_eq!(once.gender, twice.gender, "raw: {raw}");
        }
    }

    #[test]
    fn four_digit_year_forms() {
        assert_eq!(identity("One FC 2014B").birth_year, Some(2014));
        assert_eq!(identity("One FC 2015 B").birth_year, Some(2015));
        assert_eq!(identity("One FC 2014").birth_year, Some(2014));
    }

    #[test]
    fn four_digit_year_outside_valid_range_is_ignored() {
        // 1990 implies an adult team; not a youth birth year
        assert_eq!(identity("Old Boys 1990").birth_year, None);
        assert_eq!(identity("Club 2030").birth_year, None);
    }

    #[test]
    fn two_digit_year_adjacent_to_gender_letter() {
        assert_eq!(identity("Tulsa SC 15B").birth_year, Some(2015));
        assert_eq!(identity("Tulsa SC B15").birth_year, Some(2015));
        assert_eq!(identity("Tulsa SC 12G").birth_year, Some(2012));
    }

    #[test]
    fn trailing_two_digit_year() {
        assert_eq!(identity("Sporting Blue 14").birth_year, Some(2014));
    }

    #[test]
    fn level_word_followed_by_two_digit_year() {
        assert_eq!(identity("FC Dallas Premier 13 West").birth_year, Some(2013));
        assert_eq!(identity("Union Academy 15 Black").birth_year, Some(2015));
    }

    #[test]
    fn u_age_maps_through_season_year() {
        // U11 in season 2026 means born 2015
        assert_eq!(identity("Strikers Red (U11 Boys)").birth_year, Some(2015));
        assert_eq!(identity("Rapids U9 White").birth_year, Some(2017));
    }

    #[test]
    fn u_age_out_of_range_is_ignored() {
        assert_eq!(identity("Club U23 Reserves").birth_year, None);
        assert_eq!(identity("Club U5").birth_year, None);
    }

    #[test]
    fn gender_from_suffix_wins_over_inline() {
        let id = identity("Tulsa SC 15B (U11 Girls)");
        assert_eq!(id.gender, Some(Gender::F));
    }

    #[test]
    fn gender_from_inline_tokens() {
        assert_eq!(identity("One FC 2014B").gender, Some(Gender::M));
        assert_eq!(identity("One FC 2014G").gender, Some(Gender::F));
        assert_eq!(identity("Tulsa SC B15").gender, Some(Gender::M));
        assert_eq!(identity("Force Girls 2012").gender, Some(Gender::F));
    }

    #[test]
    fn gender_none_when_ambiguous() {
        assert_eq!(identity("Riverside United 2014").gender, None);
    }

    #[test]
    fn parenthesized_suffix_is_dropped_from_canonical_name() {
        let id = identity("Strikers Red (U11 Boys)");
        assert_eq!(id.canonical_name, "strikers red");
        assert_eq!(id.gender, Some(Gender::M));
        assert_eq!(id.birth_year, Some(2015));
    }

    #[test]
    fn conflict_between_main_and_suffix_is_flagged_not_guessed() {
        // Main says 2014, suffix says U11 => 2015
        let id = identity("One FC 2014B (U11 Boys)");
        assert!(id.birth_year_conflict);
        assert_eq!(id.birth_year, Some(2014));
    }

    #[test]
    fn agreeing_main_and_suffix_do_not_conflict() {
        let id = identity("One FC 2015B (U11 Boys)");
        assert!(!id.birth_year_conflict);
        assert_eq!(id.birth_year, Some(2015));
    }

    #[test]
    fn raw_year_token_is_unfiltered() {
        assert_eq!(extract_raw_year_token("Old Boys 1990"), Some(1990));
        assert_eq!(extract_raw_year_token("One FC 2014B"), Some(2014));
        assert_eq!(extract_raw_year_token("Strikers Red"), None);
    }

    #[test]
    fn canonical_name_collapses_whitespace_and_lowercases() {
        let id = identity("  Tulsa   SC\t15B ");
        assert_eq!(id.canonical_name, "tulsa sc 15b");
    }
}
