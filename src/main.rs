use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perplexity_cache::{
    run_periodic_cleanup, CacheConfig, CostEstimator, PerplexityUsage, RequestFees, ResponseCache,
};

#[derive(Parser)]
#[command(name = "perplexity-cache")]
#[command(about = "Maintain the Perplexity MCP response cache", long_about = None)]
struct Cli {
    /// Cache directory (overrides PERPLEXITY_CACHE_DIR)
    #[arg(short, long)]
    cache_dir: Option<PathBuf>,

    /// Entry time-to-live in hours (overrides PERPLEXITY_CACHE_TTL_HOURS)
    #[arg(short, long)]
    ttl_hours: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cache statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete expired entries
    Cleanup,

    /// Delete all entries and reset statistics
    Clear,

    /// Recount entries from disk
    RebuildStats,

    /// Run cleanup on a fixed interval until interrupted
    Watch {
        /// Seconds between cleanup passes
        #[arg(short, long, default_value = "3600")]
        interval_secs: u64,
    },

    /// List priced models
    Models,

    /// Estimate the cost of a call
    Cost {
        /// Model name (e.g. sonar, sonar-pro)
        #[arg(short, long)]
        model: String,

        #[arg(long, default_value = "0")]
        prompt_tokens: u64,

        #[arg(long, default_value = "0")]
        completion_tokens: u64,

        #[arg(long)]
        reasoning_tokens: Option<u64>,

        #[arg(long)]
        citation_tokens: Option<u64>,

        #[arg(long)]
        search_queries: Option<u64>,

        /// Request tier: low, medium or high
        #[arg(long)]
        tier: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "perplexity_cache=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { json } => {
            let cache = open_cache(&cli).await?;
            let report = cache.stats().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let stats = &report.stats;
                println!("Cache Statistics ({:?}):", cache.config().cache_dir);
                println!("  Entries:        {}", stats.total_entries);
                println!("  Requests:       {}", stats.total_requests());
                println!("  Hits:           {}", stats.total_hits);
                println!("  Misses:         {}", stats.total_misses);
                println!("  Hit rate:       {:.2}%", report.hit_rate);
                println!("  Saved:          {}", stats.total_saved);
                println!("  Est. savings:   ${:.4}", stats.estimated_cost_savings);
                if let Some(oldest) = stats.oldest_entry {
                    println!("  Oldest entry:   {}", oldest.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                if let Some(newest) = stats.newest_entry {
                    println!("  Newest entry:   {}", newest.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
        }

        Commands::Cleanup => {
            let cache = open_cache(&cli).await?;
            let removed = cache.cleanup().await;
            println!("Removed {} expired entries", removed);
        }

        Commands::Clear => {
            let cache = open_cache(&cli).await?;
            cache.clear().await;
            println!("Cache cleared: {:?}", cache.config().cache_dir);
        }

        Commands::RebuildStats => {
            let cache = open_cache(&cli).await?;
            let report = cache.rebuild_stats().await?;
            println!("Entries on disk: {}", report.stats.total_entries);
        }

        Commands::Watch { interval_secs } => {
            if interval_secs == 0 {
                bail!("--interval-secs must be greater than 0");
            }

            let cache = Arc::new(open_cache(&cli).await?);
            let interval = Duration::from_secs(interval_secs);

            tokio::select! {
                _ = run_periodic_cleanup(Arc::clone(&cache), interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    println!("Stopping cleanup loop");
                }
            }
        }

        Commands::Models => {
            let estimator = CostEstimator::default();
            let table = estimator.table();

            println!(
                "{:<22} {:>9} {:>9} {:>11} {:>10}  fees",
                "model", "input/M", "output/M", "reasoning/M", "citation/M"
            );
            for model in table.models() {
                let Some(row) = table.get(model) else {
                    continue;
                };
                let fees = match &row.request_fees {
                    RequestFees::Tiered(tiers) => {
                        let mut parts: Vec<_> = tiers.iter().collect();
                        parts.sort_by_key(|(tier, _)| **tier);
                        parts
                            .iter()
                            .map(|(tier, fee)| format!("{} ${}", tier, fee))
                            .collect::<Vec<_>>()
                            .join(" / ")
                            + " per 1000 requests"
                    }
                    RequestFees::PerSearchQuery(fee) => format!("${} per 1000 search queries", fee),
                };

                println!(
                    "{:<22} {:>9} {:>9} {:>11} {:>10}  {}",
                    model,
                    format!("${}", row.input),
                    format!("${}", row.output),
                    row.reasoning.map(|r| format!("${}", r)).unwrap_or_else(|| "-".into()),
                    row.citation.map(|r| format!("${}", r)).unwrap_or_else(|| "-".into()),
                    fees
                );
            }
        }

        Commands::Cost {
            ref model,
            prompt_tokens,
            completion_tokens,
            reasoning_tokens,
            citation_tokens,
            search_queries,
            ref tier,
        } => {
            let usage = PerplexityUsage {
                prompt_tokens,
                completion_tokens,
                reasoning_tokens,
                citation_tokens,
                search_queries,
            };

            match CostEstimator::default().breakdown(model, &usage, tier.as_deref()) {
                Some(b) => {
                    println!("Cost estimate for {}:", model);
                    println!("  Input:        ${:.6}", b.input);
                    println!("  Output:       ${:.6}", b.output);
                    println!("  Reasoning:    ${:.6}", b.reasoning);
                    println!("  Citations:    ${:.6}", b.citation);
                    println!("  Request fee:  ${:.6}", b.request_fee);
                    println!("  Search fee:   ${:.6}", b.search_fee);
                    println!("  Total:        ${:.6}", b.total);
                }
                None => bail!("No pricing for model {:?} (see `perplexity-cache models`)", model),
            }
        }
    }

    Ok(())
}

async fn open_cache(cli: &Cli) -> Result<ResponseCache> {
    let mut config = CacheConfig::from_env()?;

    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(hours) = cli.ttl_hours {
        config = CacheConfig::builder()
            .cache_dir(config.cache_dir)
            .savings_per_hit(config.savings_per_hit)
            .ttl_hours(hours)
            .try_build()?;
    }

    let cache = ResponseCache::new(config).await;
    if !cache.is_enabled() {
        bail!("Cache directory {:?} is unusable", cache.config().cache_dir);
    }
    Ok(cache)
}
