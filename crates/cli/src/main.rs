//! Command Line Interface for the LP rebalancer.
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use lp_rebalancer_data::{InMemoryStore, PgStore};
use lp_rebalancer_domain::entities::{
    Commission, MarketSnapshot, PoolConfig, PositionKey, PositionState,
};
use lp_rebalancer_domain::fees::FeeTier;
use lp_rebalancer_domain::math::{RangeCalculator, RangeSpec, price_of_tick, price_to_tick};
use lp_rebalancer_domain::ports::{MarketDataSource, PositionStore};
use lp_rebalancer_execution::prelude::*;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod settings;

use settings::{OracleKind, Settings, parse_pool_tick};

#[derive(Parser)]
#[command(name = "lp-rebalancer")]
#[command(about = "Range manager for concentrated liquidity positions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the tick range for a price and range widths
    Ticks {
        /// Reference price
        #[arg(short, long)]
        price: f64,

        /// Fee tier in percent (0.01, 0.05, 0.3 or 1)
        #[arg(short, long, default_value_t = 0.3)]
        fee_tier: f64,

        /// Width below the price, as a fraction
        #[arg(long, default_value_t = 0.08)]
        lower: f64,

        /// Width above the price, as a fraction
        #[arg(long, default_value_t = 0.08)]
        upper: f64,

        /// Extra width on both sides, as a fraction
        #[arg(long, default_value_t = 0.0)]
        buffer: f64,
    },
    /// Evaluate one position against the paper venue
    Evaluate {
        /// Agent configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Current pool tick
        #[arg(short, long, allow_hyphen_values = true)]
        tick: i32,

        /// Position state (JSON); updated in place
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Market snapshot (JSON) handed to the oracle
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Capital in ETH
        #[arg(long, default_value = "1")]
        amount_eth: Decimal,

        /// Evaluation time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Bias oracle; overrides BIAS_ORACLE
        #[arg(long, value_enum)]
        oracle: Option<OracleKind>,
    },
    /// Evaluate all active commissions periodically (paper venue)
    Run {
        /// Commissions (JSON array); imported into the database when
        /// DATABASE_URL is set
        #[arg(long)]
        commissions: Option<PathBuf>,

        /// Market snapshot (JSON) to store before the first pass; repeatable
        #[arg(long = "snapshot", value_name = "FILE")]
        snapshots: Vec<PathBuf>,

        /// Pool tick as <pool_id>=<tick>; repeatable
        #[arg(long = "tick", value_name = "POOL=TICK")]
        ticks: Vec<String>,

        /// Seconds between passes; overrides EVAL_INTERVAL_SECS
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Run a single pass and exit
        #[arg(long)]
        once: bool,

        /// Bias oracle; overrides BIAS_ORACLE
        #[arg(long, value_enum)]
        oracle: Option<OracleKind>,
    },
    /// Show the stored decisions and failures of a position
    History {
        /// Agent ID
        #[arg(long)]
        agent_id: i64,

        /// User ID
        #[arg(long)]
        user_id: i64,

        /// Entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;

    match cli.command {
        Commands::Ticks {
            price,
            fee_tier,
            lower,
            upper,
            buffer,
        } => {
            let tier = FeeTier::from_percent(fee_tier)?;
            let calculator = RangeCalculator::for_fee_tier(fee_tier)?;
            let range = calculator.compute_range(price, &RangeSpec::new(lower, upper, buffer))?;

            println!("Fee tier:      {}% ({} bps)", tier.percent(), tier.bps());
            println!("Tick spacing:  {}", calculator.spacing());
            println!("Price tick:    {}", price_to_tick(price)?);
            println!(
                "Range:         {range}  (prices {:.6} .. {:.6})",
                price_of_tick(range.lower),
                price_of_tick(range.upper)
            );
        }
        Commands::Evaluate {
            config,
            tick,
            state,
            snapshot,
            amount_eth,
            now,
            oracle,
        } => {
            if let Some(oracle) = oracle {
                settings.oracle = oracle;
            }
            let config: PoolConfig = read_json(&config)?;
            let mut position = match &state {
                Some(path) if path.exists() => read_json(path)?,
                _ => PositionState::unseeded(PositionKey::new(0, 0)),
            };
            let snapshot = match &snapshot {
                Some(path) => read_json(path)?,
                None => MarketSnapshot::empty(config.pool_details.price_ticker()),
            };
            let commission = Commission {
                key: position.key,
                amount_eth,
                is_active: true,
                config,
            };

            let venue = Arc::new(PaperVenue::new());
            let engine = RebalancePolicyEngine::new(
                venue,
                settings.bias_oracle()?,
                PolicyConfig {
                    oracle_timeout: settings.oracle_timeout,
                },
            );
            let decision = engine
                .evaluate(
                    now.unwrap_or_else(Utc::now),
                    &commission,
                    &mut position,
                    tick,
                    &snapshot,
                )
                .await?;

            println!("{}", serde_json::to_string_pretty(&decision)?);
            match &state {
                Some(path) => {
                    std::fs::write(path, serde_json::to_string_pretty(&position)?)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "State saved");
                }
                None => println!("{}", serde_json::to_string_pretty(&position)?),
            }
        }
        Commands::Run {
            commissions,
            snapshots,
            ticks,
            interval_secs,
            once,
            oracle,
        } => {
            if let Some(oracle) = oracle {
                settings.oracle = oracle;
            }
            if let Some(secs) = interval_secs {
                settings.eval_interval_secs = secs;
            }

            let (store, market): (Arc<dyn PositionStore>, Arc<dyn MarketDataSource>) =
                match (&settings.database_url, &commissions) {
                    (Some(url), _) => {
                        let store = Arc::new(PgStore::connect(url).await?);
                        if let Some(path) = &commissions {
                            let list: Vec<Commission> = read_json(path)?;
                            store.import_commissions(&list).await?;
                            info!(count = list.len(), "Commissions imported");
                        }
                        for path in &snapshots {
                            store.save_snapshot(&read_json(path)?).await?;
                        }
                        (
                            store.clone() as Arc<dyn PositionStore>,
                            store as Arc<dyn MarketDataSource>,
                        )
                    }
                    (None, Some(path)) => {
                        let store = Arc::new(InMemoryStore::new());
                        let list: Vec<Commission> = read_json(path)?;
                        for commission in list {
                            store.add_commission(commission).await;
                        }
                        for path in &snapshots {
                            store.set_snapshot(read_json(path)?).await;
                        }
                        (
                            store.clone() as Arc<dyn PositionStore>,
                            store as Arc<dyn MarketDataSource>,
                        )
                    }
                    (None, None) => bail!("set DATABASE_URL or pass --commissions"),
                };

            let venue = Arc::new(PaperVenue::new());
            let ticks = ticks
                .iter()
                .map(|arg| parse_pool_tick(arg))
                .collect::<Result<Vec<_>>>()?;
            for commission in store.active_commissions().await? {
                let pool = &commission.config.pool_details;
                if let Some((_, tick)) = ticks.iter().find(|(id, _)| *id == pool.pool_id()) {
                    venue.set_tick(pool, *tick).await;
                }
            }

            let engine = Arc::new(RebalancePolicyEngine::new(
                venue,
                settings.bias_oracle()?,
                PolicyConfig {
                    oracle_timeout: settings.oracle_timeout,
                },
            ));
            let executor = Arc::new(StrategyExecutor::new(
                engine,
                store,
                market,
                ExecutorConfig {
                    eval_interval_secs: settings.eval_interval_secs,
                    ..ExecutorConfig::default()
                },
            ));

            if once {
                let report = executor.run_once(Utc::now()).await?;
                print_report(&report);
                return Ok(());
            }

            let runner = executor.clone();
            let handle = tokio::spawn(async move { runner.start().await });
            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            executor.stop();
            handle.await?;

            let stats = executor.lifecycle().get_aggregate_stats().await;
            println!(
                "Positions: {} open, {} exited | repositions: {} | failures: {} | in range: {:.1}%",
                stats.open_positions,
                stats.exited_positions,
                stats.total_repositions,
                stats.total_failures,
                stats.avg_in_range_ratio * 100.0
            );
        }
        Commands::History {
            agent_id,
            user_id,
            limit,
        } => {
            let Some(url) = &settings.database_url else {
                bail!("history needs DATABASE_URL");
            };
            let store = PgStore::connect(url).await?;
            let key = PositionKey::new(agent_id, user_id);
            let (decisions, failures) = store.history(key, limit).await?;

            println!("Decisions for {key}:");
            for record in &decisions {
                println!(
                    "  {} | epoch {} | {} | {:?}",
                    record.decision.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.epoch,
                    record.decision.reason,
                    record.decision.applied_new_range.map(|r| r.to_string())
                );
            }
            println!("Failures for {key}:");
            for failure in &failures {
                println!(
                    "  {} | {} | {}",
                    failure.occurred_at.format("%Y-%m-%d %H:%M:%S"),
                    failure.kind,
                    failure.message
                );
            }
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_report(report: &BatchReport) {
    println!(
        "{:<14} | {:<9} | {:<10} | {:<8} | {:<9} | {:<6}",
        "Position", "Deployed", "Rebalanced", "InRange", "Throttled", "Failed"
    );
    println!("{}", "-".repeat(70));
    println!(
        "{:<14} | {:<9} | {:<10} | {:<8} | {:<9} | {:<6}",
        report.total(),
        report.deployed,
        report.rebalanced,
        report.in_range,
        report.throttled,
        report.failed
    );

    for outcome in &report.outcomes {
        match outcome {
            PositionOutcome::Decided(record) => println!(
                "{}: {} {:?}",
                record.key,
                record.decision.reason,
                record.decision.applied_new_range.map(|r| r.to_string())
            ),
            PositionOutcome::Failed(failure) => {
                println!("{}: {} ({})", failure.key, failure.kind, failure.message)
            }
            PositionOutcome::Busy(key) => println!("{key}: busy"),
            PositionOutcome::Exited(key) => println!("{key}: exited"),
            PositionOutcome::StoreFailed { key, message } => {
                println!("{key}: store error ({message})")
            }
        }
    }
}
