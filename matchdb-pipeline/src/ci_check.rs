//! Static write-authorization check for CI: any script that writes the
//! protected tables must visibly obtain the pipeline write grant.

use miette::Diagnostic;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

static WRITE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\b(insert\s+into|update|delete\s+from)\s+(data\.)?(teams|matches)\b")
        .unwrap()
});
static AUTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"authorize_pipeline_write|with_pipeline_auth|with_pipeline_transaction").unwrap()
});

const SCANNED_EXTENSIONS: &[&str] = &["rs", "sql", "sh", "py", "js", "ts"];

#[derive(Debug, Error, Diagnostic)]
pub enum CiCheckError {
    #[error("could not read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
}

/// Does this file body write protected tables without any authorization
/// call in sight? Returns the first offending line.
fn first_unauthorized_write(content: &str) -> Option<usize> {
    if AUTH_PATTERN.is_match(content) {
        return None;
    }
    let hit = WRITE_PATTERN.find(content)?;
    Some(content[..hit.start()].matches('\n').count() + 1)
}

fn is_allowlisted(path: &Path, allowlist: &[String]) -> bool {
    let path_str = path.to_string_lossy();
    allowlist.iter().any(|entry| path_str.contains(entry.as_str()))
}

/// Walk the designated script directories and collect violations.
pub fn scan(roots: &[PathBuf], allowlist: &[String]) -> Result<Vec<Violation>, CiCheckError> {
    let mut violations = Vec::new();
    for root in roots {
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !SCANNED_EXTENSIONS.contains(&extension) {
                continue;
            }
            if is_allowlisted(path, allowlist) {
                continue;
            }
            let content =
                std::fs::read_to_string(path).map_err(|source| CiCheckError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
            if let Some(line) = first_unauthorized_write(&content) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line,
                });
            }
        }
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_a_bare_protected_write() {
        let script = "-- fixup\nupdate data.teams set elo_rating = 1200 where id = 5;\n";
        assert_eq!(first_unauthorized_write(script), Some(2));
    }

    #[test]
    fn an_authorization_call_clears_the_file() {
        let script = "select authorize_pipeline_write();\n\
                      update data.teams set elo_rating = 1200 where id = 5;\n";
        assert_eq!(first_unauthorized_write(script), None);
    }

    #[test]
    fn wrapper_functions_count_as_authorization() {
        let script = "with_pipeline_transaction(&pool, |conn| {\n\
                      diesel::sql_query(\"delete from data.matches where id = 1\")\n})";
        assert_eq!(first_unauthorized_write(script), None);
    }

    #[test]
    fn unprotected_tables_do_not_trip_the_check() {
        let script = "insert into staging.games (id) values (1);\n\
                      update staging.rejected set rejection_code = 'X';";
        assert_eq!(first_unauthorized_write(script), None);
    }

    #[test]
    fn schema_qualified_and_bare_names_both_match() {
        assert!(first_unauthorized_write("delete from data.matches where 1=1").is_some());
        assert!(first_unauthorized_write("DELETE FROM matches WHERE 1=1").is_some());
    }

    #[test]
    fn allowlist_matches_on_path_fragments() {
        let path = Path::new("scripts/known/backfill_teams.sql");
        assert!(is_allowlisted(path, &["backfill_teams.sql".to_string()]));
        assert!(!is_allowlisted(path, &["other.sql".to_string()]));
    }
}
