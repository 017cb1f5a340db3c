//! Backfill NULL birth_year/gender from team display names, then absorb
//! orphaned ranking-only teams into their match-having counterparts, then
//! recompute the cached match counters.

use super::{OperatorOutcome, ReconcileError, finish_operator};
use diesel::sql_types::{Array, Int4, Int8, Nullable, Text};
use diesel::{QueryableByName, prelude::*, sql_query};
use hashbrown::{HashMap, HashSet};
use log::{info, warn};
use matchdb_db::{Connection, ConnectionPool, authz, db};
use matchdb_parsing::{collapse_duplicate_prefix, extract_identity};

const COLOR_WORDS: &[&str] = &[
    "red", "blue", "white", "black", "gold", "silver", "green", "orange", "purple", "grey",
    "gray", "navy", "maroon", "yellow",
];
const LEVEL_WORDS: &[&str] = &["premier", "elite", "academy", "select", "npl", "ecnl", "ecrl", "nal"];

#[derive(Debug, QueryableByName)]
struct BareTeamRow {
    #[diesel(sql_type = Int8)]
    id: i64,
    #[diesel(sql_type = Text)]
    display_name: String,
    #[diesel(sql_type = Text)]
    canonical_name: String,
    #[diesel(sql_type = Nullable<Text>)]
    state: Option<String>,
    #[diesel(sql_type = Nullable<Int4>)]
    birth_year: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    gender: Option<String>,
}

fn identity_key(
    canonical_name: &str,
    birth_year: i32,
    gender: &str,
    state: Option<&str>,
) -> (String, i32, String, String) {
    (
        canonical_name.to_string(),
        birth_year,
        gender.to_string(),
        state.unwrap_or("").to_string(),
    )
}

pub fn run(
    pool: &ConnectionPool,
    season_year: i32,
    reconcile_timeout_seconds: i64,
    execute: bool,
) -> Result<OperatorOutcome, ReconcileError> {
    let mut outcome = OperatorOutcome {
        dry_run: !execute,
        ..Default::default()
    };

    authz::with_pipeline_auth::<_, ReconcileError, _>(pool, |conn| {
        db::set_current_user_statement_timeout(conn, reconcile_timeout_seconds)?;

        // ---- Phase 1: fill NULL birth_year/gender from display names ----

        let occupied: HashSet<(String, i32, String, String)> = sql_query(
            "select id, display_name, canonical_name, state, birth_year, gender
             from data.teams
             where status = 'active' and birth_year is not null and gender is not null",
        )
        .load::<BareTeamRow>(conn)?
        .into_iter()
        .map(|row| {
            identity_key(
                &row.canonical_name,
                row.birth_year.unwrap_or_default(),
                row.gender.as_deref().unwrap_or_default(),
                row.state.as_deref(),
            )
        })
        .collect();

        let bare: Vec<BareTeamRow> = sql_query(
            "select id, display_name, canonical_name, state, birth_year, gender
             from data.teams
             where status = 'active' and (birth_year is null or gender is null)",
        )
        .load(conn)?;

        let mut updates: Vec<(i64, i32, String)> = Vec::new();
        let mut collision_pairs = 0u64;
        let mut claimed = occupied;
        for team in &bare {
            let identity = extract_identity(&team.display_name, season_year);
            let (Some(birth_year), Some(gender)) = (identity.birth_year, identity.gender) else {
                continue;
            };
            let gender = gender.to_string();
            let key = identity_key(
                &identity.canonical_name,
                birth_year,
                &gender,
                team.state.as_deref(),
            );
            if claimed.contains(&key) {
                // Filling this team in would collide with a live team; the
                // absorption phase handles the pair instead.
                collision_pairs += 1;
                continue;
            }
            claimed.insert(key);
            updates.push((team.id, birth_year, gender));
        }

        outcome.examined += bare.len() as u64;
        outcome.note(format!(
            "phase 1: {} of {} bare teams fillable, {} deferred to absorption",
            updates.len(),
            bare.len(),
            collision_pairs
        ));

        if execute && !updates.is_empty() {
            let ids: Vec<i64> = updates.iter().map(|(id, _, _)| *id).collect();
            let years: Vec<i32> = updates.iter().map(|(_, year, _)| *year).collect();
            let genders: Vec<String> = updates.iter().map(|(_, _, g)| g.clone()).collect();

            conn.transaction(|conn| {
                sql_query(
                    "update data.teams t
                     set birth_year = u.birth_year, gender = u.gender, updated_at = now()
                     from (
                         select unnest($1::bigint[]) as id,
                                unnest($2::int[]) as birth_year,
                                unnest($3::text[]) as gender
                     ) u
                     where t.id = u.id",
                )
                .bind::<Array<Int8>, _>(&ids)
                .bind::<Array<Int4>, _>(&years)
                .bind::<Array<Text>, _>(&genders)
                .execute(conn)?;

                // Newly-complete teams enter the canonical registry
                sql_query(
                    "insert into data.canonical_teams
                        (canonical_name, birth_year, gender, state, team_id, aliases)
                     select t.canonical_name, t.birth_year, t.gender, t.state, t.id,
                            array[t.display_name]
                     from data.teams t
                     where t.id = any($1)
                     on conflict (canonical_name, birth_year, gender, state) do nothing",
                )
                .bind::<Array<Int8>, _>(&ids)
                .execute(conn)
            })?;
            outcome.mutated += updates.len() as u64;
        }

        // Teams carrying a birth year outside the valid window are flagged
        // rather than guessed at; an operator reviews them.
        if execute {
            let flagged = sql_query(
                "update data.teams
                 set data_quality_flags = data_quality_flags || 'invalid_birth_year'::text,
                     updated_at = now()
                 where status = 'active'
                   and birth_year is not null
                   and (birth_year < $1 or birth_year > $2)
                   and not ('invalid_birth_year' = any(data_quality_flags))",
            )
            .bind::<Int4, _>(season_year - 19)
            .bind::<Int4, _>(season_year - 7)
            .execute(conn)?;
            if flagged > 0 {
                outcome.note(format!("flagged {flagged} teams with invalid birth years"));
            }
        }

        // ---- Phase 2: absorb orphans into match-having counterparts ----

        let orphans: Vec<BareTeamRow> = sql_query(
            "select id, display_name, canonical_name, state, birth_year, gender
             from data.teams t
             where t.status = 'active'
               and (t.national_rank is not null or t.gotsport_points is not null)
               and t.birth_year is not null and t.gender is not null
               and not exists (
                   select 1 from data.matches m
                   where (m.home_team_id = t.id or m.away_team_id = t.id)
                     and m.deleted_at is null
               )",
        )
        .load(conn)?;

        let candidates: Vec<BareTeamRow> = sql_query(
            "select id, display_name, canonical_name, state, birth_year, gender
             from data.teams t
             where t.status = 'active'
               and t.birth_year is not null and t.gender is not null
               and exists (
                   select 1 from data.matches m
                   where (m.home_team_id = t.id or m.away_team_id = t.id)
                     and m.deleted_at is null
               )",
        )
        .load(conn)?;

        let mut buckets: HashMap<(i32, String), Vec<&BareTeamRow>> = HashMap::new();
        for candidate in &candidates {
            let key = (
                candidate.birth_year.unwrap_or_default(),
                candidate.gender.clone().unwrap_or_default(),
            );
            buckets.entry(key).or_default().push(candidate);
        }

        let mut absorptions: Vec<(i64, i64, String, String)> = Vec::new();
        for orphan in &orphans {
            let key = (
                orphan.birth_year.unwrap_or_default(),
                orphan.gender.clone().unwrap_or_default(),
            );
            let Some(bucket) = buckets.get(&key) else {
                continue;
            };
            let target = bucket
                .iter()
                .find(|candidate| names_absorbable(&orphan.canonical_name, &candidate.canonical_name));
            if let Some(target) = target {
                absorptions.push((
                    orphan.id,
                    target.id,
                    orphan.display_name.clone(),
                    target.display_name.clone(),
                ));
            }
        }

        outcome.examined += orphans.len() as u64;
        outcome.note(format!(
            "phase 2: {} of {} orphans matched a counterpart",
            absorptions.len(),
            orphans.len()
        ));
        for (_, _, from, to) in absorptions.iter().take(10) {
            outcome.note(format!("would absorb {from:?} into {to:?}"));
        }

        if execute {
            for (orphan_id, keeper_id, ..) in &absorptions {
                let merged = conn.transaction(|conn| {
                    super::merge_duplicates::merge_group(conn, *keeper_id, &[*orphan_id])
                });
                match merged {
                    Ok(()) => outcome.mutated += 1,
                    Err(err) => {
                        warn!("absorbing {orphan_id} into {keeper_id} failed: {err}");
                        outcome.failed_groups += 1;
                    }
                }
            }
        }

        // ---- Phase 3: recompute the cached counters ----

        if execute {
            let corrected = db::recompute_team_records(conn)?;
            info!("recomputed counters for {corrected} teams");
            outcome.note(format!("phase 3: corrected counters on {corrected} teams"));
        }

        finish_operator(conn, &outcome)
    })?;

    Ok(outcome)
}

/// Orphan-absorption name test: after duplicate-prefix stripping, one name
/// must be a word-suffix of the other, and the pair must not differ in a
/// color word or a competition-level word.
fn names_absorbable(a: &str, b: &str) -> bool {
    let a = collapse_duplicate_prefix(a);
    let b = collapse_duplicate_prefix(b);
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if !long.ends_with(short.as_str()) {
        return false;
    }
    // Require a word boundary so "ks fc 14" does not absorb "hawks fc 14"
    let prefix = &long[..long.len() - short.len()];
    if !prefix.is_empty() && !prefix.ends_with(' ') {
        return false;
    }

    for vocabulary in [COLOR_WORDS, LEVEL_WORDS] {
        let word_a = word_from(&a, vocabulary);
        let word_b = word_from(&b, vocabulary);
        if let (Some(word_a), Some(word_b)) = (word_a, word_b) {
            if word_a != word_b {
                return false;
            }
        }
    }
    true
}

fn word_from<'a>(name: &str, vocabulary: &[&'a str]) -> Option<&'a str> {
    name.split_whitespace()
        .find_map(|word| vocabulary.iter().find(|entry| **entry == word).copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_are_absorbable() {
        assert!(names_absorbable("one fc 2014b", "one fc 2014b"));
    }

    #[test]
    fn suffix_after_prefix_strip_is_absorbable() {
        assert!(names_absorbable("one fc 2014b", "sporting one fc 2014b"));
        assert!(names_absorbable("one fc one fc 2014b", "one fc 2014b"));
    }

    #[test]
    fn word_boundary_is_required() {
        assert!(!names_absorbable("ks fc 14", "hawks fc 14"));
    }

    #[test]
    fn different_color_words_reject() {
        // Suffix test alone would pass these; the color filter rejects
        assert!(!names_absorbable("red 2014b", "sporting blue red 2014b"));
        // Not a suffix at all
        assert!(!names_absorbable("one fc red 2014b", "one fc blue 2014b"));
    }

    #[test]
    fn different_level_words_reject() {
        assert!(!names_absorbable("premier 14b", "elite premier 14b"));
    }

    #[test]
    fn same_color_word_passes() {
        assert!(names_absorbable("fc red 2014b", "sporting fc red 2014b"));
    }
}
