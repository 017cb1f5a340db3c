/// The parsed state of a schedule page's score cell.
///
/// Schedule sites render one cell for both played and unplayed games:
/// `"3 - 2"`, `" - "`, `"v"`, `"TBD"`. A cell without the `-` separator is
/// not a score cell at all and the row it came from should be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreCell {
    /// No `-` separator; the row is not a match row.
    NotAScore,
    /// Separator present but no numbers: a scheduled, unplayed game.
    Unplayed,
    /// Both sides present.
    Played(i32, i32),
}

impl ScoreCell {
    pub fn parse(raw: &str) -> ScoreCell {
        let raw = raw.trim();
        let Some((home, away)) = raw.split_once('-') else {
            return ScoreCell::NotAScore;
        };
        match (parse_side(home), parse_side(away)) {
            (Some(h), Some(a)) => ScoreCell::Played(h, a),
            // One-sided numbers happen when a site renders a forfeit oddly;
            // without both sides the result is unusable.
            _ => ScoreCell::Unplayed,
        }
    }

    pub fn scores(self) -> (Option<i32>, Option<i32>) {
        match self {
            ScoreCell::Played(h, a) => (Some(h), Some(a)),
            _ => (None, None),
        }
    }
}

fn parse_side(side: &str) -> Option<i32> {
    let n: i32 = side.trim().parse().ok()?;
    (n >= 0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn played_scores() {
        assert_eq!(ScoreCell::parse("3 - 2"), ScoreCell::Played(3, 2));
        assert_eq!(ScoreCell::parse("0-0"), ScoreCell::Played(0, 0));
        assert_eq!(ScoreCell::parse("10 -1"), ScoreCell::Played(10, 1));
    }

    #[test]
    fn unplayed_scores() {
        assert_eq!(ScoreCell::parse(" - "), ScoreCell::Unplayed);
        assert_eq!(ScoreCell::parse("-"), ScoreCell::Unplayed);
        assert_eq!(ScoreCell::parse("TBD - TBD"), ScoreCell::Unplayed);
    }

    #[test]
    fn cells_without_separator_are_not_scores() {
        assert_eq!(ScoreCell::parse("v"), ScoreCell::NotAScore);
        assert_eq!(ScoreCell::parse(""), ScoreCell::NotAScore);
        assert_eq!(ScoreCell::parse("3 : 2"), ScoreCell::NotAScore);
    }

    #[test]
    fn one_sided_numbers_are_unplayed() {
        assert_eq!(ScoreCell::parse("3 - "), ScoreCell::Unplayed);
        assert_eq!(ScoreCell::parse(" - 2"), ScoreCell::Unplayed);
    }

    #[test]
    fn scores_accessor() {
        assert_eq!(ScoreCell::Played(3, 2).scores(), (Some(3), Some(2)));
        assert_eq!(ScoreCell::Unplayed.scores(), (None, None));
        assert_eq!(ScoreCell::NotAScore.scores(), (None, None));
    }
}
