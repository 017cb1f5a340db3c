use crate::team_name::Gender;
use regex::Regex;
use std::sync::LazyLock;

/// What a schedule page's division cell tells us about the bracket.
///
/// `age_group` is kept in the source's own vocabulary ("U11", "2014") so the
/// raw division string can be reconstructed for display; use
/// [`DivisionInfo::birth_year`] to resolve it against a season.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionInfo {
    pub gender: Option<Gender>,
    pub age_group: Option<String>,
}

static U_AGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b[BG]?(U\d{1,2})\b").unwrap());
static BIRTH_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());
static GENDER_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(boys|girls|male|female)\b").unwrap());
// "U11B", "14G", "BU12", "GU10"
static GENDER_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:U?\d{1,4})([BG])\b|\b([BG])U?\d{1,2}\b").unwrap());

/// Parse a division cell ("U11 Boys Premier", "2014B Gold", "BU12 White").
pub fn parse_division(raw: &str) -> DivisionInfo {
    let gender = GENDER_WORD
        .captures(raw)
        .map(|caps| match caps[1].to_ascii_lowercase().as_str() {
            "boys" | "male" => Gender::M,
            _ => Gender::F,
        })
        .or_else(|| {
            GENDER_LETTER.captures(raw).and_then(|caps| {
                let letter = caps.get(1).or_else(|| caps.get(2))?;
                match letter.as_str().to_ascii_uppercase().as_str() {
                    "B" => Some(Gender::M),
                    "G" => Some(Gender::F),
                    _ => None,
                }
            })
        });

    let age_group = U_AGE
        .captures(raw)
        .map(|caps| caps[1].to_ascii_uppercase())
        .or_else(|| BIRTH_YEAR.captures(raw).map(|caps| caps[1].to_string()));

    DivisionInfo { gender, age_group }
}

impl DivisionInfo {
    /// Resolve the age group to a birth year. "U11" needs the season year;
    /// an explicit "2014" does not.
    pub fn birth_year(&self, season_year: i32) -> Option<i32> {
        let group = self.age_group.as_deref()?;
        if let Some(age) = group.strip_prefix('U').and_then(|a| a.parse::<i32>().ok()) {
            return (7..=19).contains(&age).then(|| season_year - age);
        }
        group.parse::<i32>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u_age_with_gender_word() {
        let d = parse_division("U11 Boys Premier");
        assert_eq!(d.gender, Some(Gender::M));
        assert_eq!(d.age_group.as_deref(), Some("U11"));
        assert_eq!(d.birth_year(2026), Some(2015));
    }

    #[test]
    fn birth_year_with_gender_letter() {
        let d = parse_division("2014B Gold");
        assert_eq!(d.gender, Some(Gender::M));
        assert_eq!(d.age_group.as_deref(), Some("2014"));
        assert_eq!(d.birth_year(2026), Some(2014));
    }

    #[test]
    fn letter_before_age_group() {
        let d = parse_division("BU12 White");
        assert_eq!(d.gender, Some(Gender::M));
        assert_eq!(d.age_group.as_deref(), Some("U12"));
        let d = parse_division("GU10");
        assert_eq!(d.gender, Some(Gender::F));
        assert_eq!(d.age_group.as_deref(), Some("U10"));
    }

    #[test]
    fn girls_word_beats_stray_letters() {
        let d = parse_division("U13 Girls Blue");
        assert_eq!(d.gender, Some(Gender::F));
    }

    #[test]
    fn empty_or_unmarked_division() {
        let d = parse_division("Open Bracket");
        assert_eq!(d.gender, None);
        assert_eq!(d.age_group, None);
        assert_eq!(d.birth_year(2026), None);
    }

    #[test]
    fn u_age_out_of_youth_range_has_no_birth_year() {
        let d = parse_division("U23 Boys");
        assert_eq!(d.birth_year(2026), None);
    }
}
