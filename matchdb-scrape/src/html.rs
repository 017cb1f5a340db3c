//! Tolerant extraction from schedule-site HTML. When faced with unexpected
//! markup these helpers parse what they can and skip the rest; they never
//! panic on bad input.

use crate::adapter::ColumnMap;
use scraper::{Html, Selector};

/// The text cells of one table row, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn cell<'a>(&'a self, index: usize) -> &'a str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn opt_cell<'a>(&'a self, index: Option<usize>) -> Option<&'a str> {
        let text = self.cell(index?);
        (!text.is_empty()).then_some(text)
    }
}

/// Extract match rows from a schedule page. Only rows with exactly
/// `columns.expected_columns` cells are candidates; header rows, spacer
/// rows, and colspan banners all fall out here.
pub fn schedule_rows(html: &str, columns: &ColumnMap) -> Vec<RawRow> {
    let document = Html::parse_document(html);
    let Ok(row_selector) = Selector::parse("tr") else {
        return Vec::new();
    };
    let Ok(cell_selector) = Selector::parse("td") else {
        return Vec::new();
    };

    document
        .select(&row_selector)
        .filter_map(|row| {
            let cells: Vec<String> = row
                .select(&cell_selector)
                .map(|cell| {
                    cell.text()
                        .collect::<String>()
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            (cells.len() == columns.expected_columns).then_some(RawRow { cells })
        })
        .collect()
}

/// Pull the hrefs matched by an adapter's group-link selector, in document
/// order, deduplicated.
pub fn group_links(html: &str, selector: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    let mut seen = Vec::new();
    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if !seen.iter().any(|existing| existing == href) {
                seen.push(href.to_string());
            }
        }
    }
    seen
}

/// Extract one query parameter from an href, for `parse_group_id` hooks.
pub fn query_param(href: &str, name: &str) -> Option<String> {
    let query = href.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Extract the last path segment from an href, for `parse_group_id` hooks
/// on sites that address groups by path.
pub fn last_path_segment(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next()?;
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    (!segment.is_empty()).then(|| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> ColumnMap {
        ColumnMap {
            match_number: 0,
            date_time: 1,
            home_team: 2,
            score: 3,
            away_team: 4,
            location: Some(5),
            division: None,
            expected_columns: 6,
        }
    }

    const SCHEDULE: &str = r#"
        <table>
          <tr><th>No</th><th>When</th><th>Home</th><th>Score</th><th>Away</th><th>Where</th></tr>
          <tr>
            <td>101</td><td>9/14/2025 3:00 PM</td>
            <td> One FC <b>2014B</b> </td><td>3 - 2</td>
            <td>Tulsa SC 14B</td><td>Field 7</td>
          </tr>
          <tr><td colspan="6">Bracket B</td></tr>
          <tr>
            <td>102</td><td>9/15/2025</td>
            <td>Strikers Red</td><td> - </td>
            <td>Rapids Blue</td><td></td>
          </tr>
        </table>
    "#;

    #[test]
    fn keeps_only_rows_with_the_expected_column_count() {
        let rows = schedule_rows(SCHEDULE, &columns());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cell(0), "101");
        assert_eq!(rows[1].cell(0), "102");
    }

    #[test]
    fn cell_text_is_flattened_and_whitespace_collapsed() {
        let rows = schedule_rows(SCHEDULE, &columns());
        assert_eq!(rows[0].cell(2), "One FC 2014B");
        assert_eq!(rows[0].cell(3), "3 - 2");
    }

    #[test]
    fn missing_and_empty_cells_read_as_empty() {
        let rows = schedule_rows(SCHEDULE, &columns());
        assert_eq!(rows[1].cell(5), "");
        assert_eq!(rows[1].opt_cell(Some(5)), None);
        assert_eq!(rows[1].opt_cell(None), None);
        assert_eq!(rows[1].opt_cell(Some(99)), None);
    }

    #[test]
    fn malformed_html_yields_no_rows_rather_than_panicking() {
        let rows = schedule_rows("<tr><td>lonely", &columns());
        assert!(rows.is_empty());
    }

    #[test]
    fn group_links_are_collected_in_order_without_duplicates() {
        let html = r#"
            <div class="groups">
              <a class="group" href="/event/1/schedule?group=A">Group A</a>
              <a class="group" href="/event/1/schedule?group=B">Group B</a>
              <a class="group" href="/event/1/schedule?group=A">Group A again</a>
              <a class="other" href="/elsewhere">nope</a>
            </div>
        "#;
        let links = group_links(html, "a.group");
        assert_eq!(
            links,
            vec![
                "/event/1/schedule?group=A".to_string(),
                "/event/1/schedule?group=B".to_string(),
            ]
        );
    }

    #[test]
    fn bad_selector_yields_nothing() {
        assert!(group_links("<a href='/x'>x</a>", ":::not a selector").is_empty());
    }

    #[test]
    fn query_param_extraction() {
        assert_eq!(
            query_param("/event/1/schedule?group=A&x=1", "group").as_deref(),
            Some("A")
        );
        assert_eq!(query_param("/event/1/schedule", "group"), None);
    }

    #[test]
    fn last_path_segment_extraction() {
        assert_eq!(
            last_path_segment("/events/123/groups/G9?tab=schedule").as_deref(),
            Some("G9")
        );
        assert_eq!(last_path_segment("/events/123/groups/G9/").as_deref(), Some("G9"));
        assert_eq!(last_path_segment("/"), None);
    }
}
