mod ci_check;
mod config;
mod diagnose;
mod engine;
mod promote;
mod reconcile;
mod validate;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::PipelineConfig;
use log::info;
use matchdb_db::db;
use miette::{IntoDiagnostic, miette};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "matchdb", about = "Youth-sports match data pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one source adapter: discover events, scrape, write staging.
    Scrape {
        #[arg(long)]
        adapter: String,
        /// Scrape a single event instead of discovering.
        #[arg(long)]
        event: Option<String>,
        /// Skip events older than last year.
        #[arg(long)]
        active_only: bool,
        /// Pick up from the checkpoint file of an interrupted run.
        #[arg(long)]
        resume: bool,
        /// Parse everything, write nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate staging rows: report, or clean them into the archive.
    Validate {
        /// Summarize would-be rejections without writing.
        #[arg(long)]
        report: bool,
        /// Apply fixes and move rejected rows to the archive.
        #[arg(long)]
        clean_staging: bool,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value_t = 10_000)]
        limit: usize,
    },

    /// Promote cleaned staging rows into production teams and matches.
    Promote {
        #[arg(long)]
        process_staging: bool,
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Bulk reconciliation operators. Dry-run by default.
    Reconcile {
        #[command(subcommand)]
        operator: Operator,
    },

    /// Read-only health and entity reports.
    Diagnose {
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        team_id: Option<i64>,
        #[arg(long)]
        health_check: bool,
        #[arg(long)]
        staging_status: bool,
    },

    /// Static checks for CI.
    CiCheck {
        #[command(subcommand)]
        check: CiCheckCommand,
    },
}

#[derive(Subcommand)]
enum Operator {
    /// Merge live teams sharing a canonical identity.
    MergeDuplicates {
        #[arg(long)]
        execute: bool,
        /// Group by display name instead of canonical name.
        #[arg(long)]
        by_display_name: bool,
    },
    /// Fill NULL metadata, absorb orphans, recompute counters.
    FixMetadata {
        #[arg(long)]
        execute: bool,
    },
    /// Scrub the (0, 0) score artifact.
    FixScores {
        #[arg(long)]
        execute: bool,
    },
    /// Soft-delete legacy matches duplicated by scraper imports.
    AbsorbCrossImport {
        #[arg(long)]
        execute: bool,
        #[arg(long, default_value = "legacy")]
        legacy_platform: String,
        #[arg(long, default_value_t = 0.3)]
        similarity_threshold: f64,
    },
    /// Replay audited deletions back into production.
    Recover {
        #[arg(long)]
        execute: bool,
        #[arg(long)]
        changed_by: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Delete unlinked matches with impossible dates.
    CleanupGarbage {
        #[arg(long)]
        execute: bool,
    },
}

#[derive(Subcommand)]
enum CiCheckCommand {
    /// Flag scripts that write protected tables without authorization.
    WriteAuth {
        #[arg(long)]
        fail_on_violations: bool,
        /// Directories to scan.
        #[arg(long, default_value = "scripts")]
        path: Vec<PathBuf>,
        /// Path fragments exempt from the check.
        #[arg(long)]
        allow: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = PipelineConfig::config().into_diagnostic()?;

    match cli.command {
        Command::Scrape {
            adapter,
            event,
            active_only,
            resume,
            dry_run,
        } => {
            let adapter = matchdb_scrape::adapters::by_id(&adapter)
                .ok_or_else(|| miette!("unknown adapter {adapter:?}"))?;
            let pool = matchdb_db::get_pool(config.db_pool_size).into_diagnostic()?;

            let mut fetcher = engine::default_fetcher(
                &adapter,
                Duration::from_secs(config.fetch_timeout_seconds),
            )?;
            let options = engine::EngineOptions {
                event_id: event,
                active_only,
                resume,
                dry_run,
            };
            let stats = engine::run(&adapter, &mut fetcher, &pool, &config, &options).await?;
            print!("{stats}");
            if stats.events_failed > 0 {
                return Err(miette!("{} events failed", stats.events_failed));
            }
        }

        Command::Validate {
            report,
            clean_staging,
            dry_run,
            limit,
        } => {
            if !report && !clean_staging {
                return Err(miette!("pass --report or --clean-staging"));
            }
            let pool = matchdb_db::get_pool(config.db_pool_size).into_diagnostic()?;
            let mut conn = pool.get().into_diagnostic()?;
            let season_year =
                db::current_season_year(&mut conn, config.season_year_fallback)
                    .into_diagnostic()?;
            let policy = validate::ValidatorPolicy::new(&config.validator, season_year)
                .into_diagnostic()?;

            // --report is a forced dry run over the same scan
            let effective_dry_run = report || dry_run;
            let stats =
                validate::clean_staging_games(&mut conn, &policy, limit, effective_dry_run)
                    .into_diagnostic()?;
            print!("{stats}");
        }

        Command::Promote {
            process_staging,
            batch_size,
        } => {
            if !process_staging {
                return Err(miette!("pass --process-staging"));
            }
            let pool = matchdb_db::get_pool(config.db_pool_size).into_diagnostic()?;
            let mut conn = pool.get().into_diagnostic()?;
            let season_year =
                db::current_season_year(&mut conn, config.season_year_fallback)
                    .into_diagnostic()?;
            drop(conn);

            let batch_size = batch_size.unwrap_or(config.promote_batch_size);
            let stats = promote::process_staging(&pool, season_year, batch_size)?;
            print!("{stats}");
        }

        Command::Reconcile { operator } => {
            let pool = matchdb_db::get_pool(config.db_pool_size).into_diagnostic()?;
            let timeout = config.reconcile_timeout_seconds;

            let outcome = match operator {
                Operator::MergeDuplicates {
                    execute,
                    by_display_name,
                } => {
                    let group_by = if by_display_name {
                        reconcile::merge_duplicates::GroupBy::DisplayName
                    } else {
                        reconcile::merge_duplicates::GroupBy::Canonical
                    };
                    reconcile::merge_duplicates::run(&pool, group_by, timeout, execute)?
                }
                Operator::FixMetadata { execute } => {
                    let mut conn = pool.get().into_diagnostic()?;
                    let season_year =
                        db::current_season_year(&mut conn, config.season_year_fallback)
                            .into_diagnostic()?;
                    drop(conn);
                    reconcile::fix_metadata::run(&pool, season_year, timeout, execute)?
                }
                Operator::FixScores { execute } => {
                    reconcile::fix_scores::run(&pool, timeout, execute)?
                }
                Operator::AbsorbCrossImport {
                    execute,
                    legacy_platform,
                    similarity_threshold,
                } => reconcile::cross_import::run(
                    &pool,
                    &legacy_platform,
                    similarity_threshold,
                    timeout,
                    execute,
                )?,
                Operator::Recover {
                    execute,
                    changed_by,
                    from,
                    to,
                } => reconcile::recover::run(&pool, &changed_by, from, to, timeout, execute)?,
                Operator::CleanupGarbage { execute } => {
                    reconcile::cleanup::run(&pool, timeout, execute)?
                }
            };
            print!("{outcome}");
        }

        Command::Diagnose {
            team,
            team_id,
            health_check,
            staging_status,
        } => {
            let request = if let Some(team_id) = team_id {
                diagnose::DiagnoseRequest::TeamId(team_id)
            } else if let Some(team) = team {
                diagnose::DiagnoseRequest::Team(team)
            } else if staging_status {
                diagnose::DiagnoseRequest::StagingStatus
            } else if health_check {
                diagnose::DiagnoseRequest::HealthCheck
            } else {
                return Err(miette!(
                    "pass --team, --team-id, --health-check, or --staging-status"
                ));
            };
            let pool = matchdb_db::get_pool(config.db_pool_size).into_diagnostic()?;
            let report = diagnose::run(&pool, &request)?;
            print!("{report}");
        }

        Command::CiCheck { check } => match check {
            CiCheckCommand::WriteAuth {
                fail_on_violations,
                path,
                allow,
            } => {
                let violations = ci_check::scan(&path, &allow)?;
                for violation in &violations {
                    println!(
                        "{}:{}: protected-table write without pipeline authorization",
                        violation.path.display(),
                        violation.line
                    );
                }
                info!("{} violations", violations.len());
                if fail_on_violations && !violations.is_empty() {
                    return Err(miette!("{} write-auth violations", violations.len()));
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scrape_flags_parse() {
        let cli = Cli::try_parse_from([
            "matchdb",
            "scrape",
            "--adapter",
            "gotsport",
            "--active-only",
            "--resume",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Scrape {
                adapter,
                active_only,
                resume,
                dry_run,
                event,
            } => {
                assert_eq!(adapter, "gotsport");
                assert!(active_only && resume && dry_run);
                assert!(event.is_none());
            }
            _ => panic!("parsed into the wrong command"),
        }
    }

    #[test]
    fn recover_operator_parses_its_window() {
        let cli = Cli::try_parse_from([
            "matchdb",
            "reconcile",
            "recover",
            "--changed-by",
            "matchDedup",
            "--from",
            "2026-02-04",
            "--to",
            "2026-02-04",
            "--execute",
        ])
        .unwrap();
        match cli.command {
            Command::Reconcile {
                operator:
                    Operator::Recover {
                        execute,
                        changed_by,
                        from,
                        to,
                    },
            } => {
                assert!(execute);
                assert_eq!(changed_by, "matchDedup");
                assert_eq!(from, to);
            }
            _ => panic!("parsed into the wrong command"),
        }
    }

    #[test]
    fn reconcile_operators_default_to_dry_run() {
        let cli =
            Cli::try_parse_from(["matchdb", "reconcile", "merge-duplicates"]).unwrap();
        match cli.command {
            Command::Reconcile {
                operator: Operator::MergeDuplicates { execute, .. },
            } => assert!(!execute),
            _ => panic!("parsed into the wrong command"),
        }
    }
}
