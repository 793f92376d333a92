//! Synthetic web-gateway traffic log generator CLI
//! Produces LEEF or CEF logs for a configured enterprise in batch or realtime mode

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use traffic_forge::format::formatter_for;
use traffic_forge::net::AddrAllocator;
use traffic_forge::session::assign_internal_ips;
use traffic_forge::{
    BatchDriver, CancelToken, EnterpriseConfig, EventSynthesizer, IdentityPool, RealtimeDriver,
    ServiceCatalog,
};

#[derive(Parser, Clone, Debug)]
#[command(name = "traffic_forge", about = "Synthetic web-gateway traffic log generator")]
#[command(version, author = "SIEM Team")]
struct ForgeArgs {
    /// Configuration directory containing enterprise.yaml and cloud-services/
    #[arg(long, default_value = "./config", help = "Configuration directory")]
    config_dir: PathBuf,

    /// Output directory for generated log files
    #[arg(long, default_value = "./output", help = "Output directory")]
    output_dir: PathBuf,

    /// Generation mode
    #[arg(long, default_value = "batch", help = "Generation mode: batch or realtime")]
    mode: String,

    /// Log format
    #[arg(long, default_value = "leef", help = "Output format: leef or cef")]
    format: String,

    /// Batch window ending now, e.g. 24h, 7d, 1w
    #[arg(long, default_value = "24h", help = "Batch duration: <n>h, <n>d, or <n>w")]
    duration: String,

    /// Realtime speed multiplier (ticks per second)
    #[arg(long, default_value = "1.0", help = "Realtime speed multiplier")]
    speed: f64,

    /// Random seed for reproducible runs
    #[arg(long, help = "Seed for deterministic generation")]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = ForgeArgs::parse();
    info!("Starting traffic forge with args: {:?}", args);

    let config = EnterpriseConfig::from_yaml(&args.config_dir.join("enterprise.yaml"))?;
    let catalog = ServiceCatalog::from_yaml_dir(&args.config_dir.join("cloud-services"))?;
    info!("Loaded {}", config);
    info!("Loaded {} cloud service definitions", catalog.len());

    let cache_file = args.config_dir.join("identity-cache.json");
    let mut pool = IdentityPool::new(&config.domain, Some(cache_file), args.seed);
    let mut identities = pool.generate(config.total_users)?;

    let allocator = AddrAllocator::new(&config.network.internal_subnets)?;
    let mut rng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    assign_internal_ips(&mut identities, &allocator, &mut rng);

    let synthesizer = EventSynthesizer::new(allocator, catalog, &config.domain);
    let formatter = formatter_for(&args.format)?;

    match args.mode.as_str() {
        "batch" => {
            let window = parse_duration(&args.duration)?;
            let end = Utc::now();
            let start = end - window;

            let mut driver = BatchDriver::new(
                synthesizer,
                formatter,
                identities,
                &args.output_dir,
                args.seed,
            );
            let path = tokio::task::spawn_blocking(move || driver.run(start, end)).await??;
            info!("Batch run written to {}", path.display());
        }
        "realtime" => {
            let token = CancelToken::new();
            let signal_token = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, finishing current tick");
                    signal_token.cancel();
                }
            });

            let mut driver = RealtimeDriver::new(
                synthesizer,
                formatter,
                identities,
                &args.output_dir,
                args.speed,
                args.seed,
            );
            let events = tokio::task::spawn_blocking(move || driver.run(&token)).await??;
            info!("Realtime run stopped after {} events", events);
        }
        other => anyhow::bail!("Unknown mode: {} (expected batch or realtime)", other),
    }

    Ok(())
}

/// Parse a batch window like "24h", "7d", or "1w".
fn parse_duration(s: &str) -> anyhow::Result<ChronoDuration> {
    let (value, unit) = s.split_at(s.len().saturating_sub(1));
    let value: i64 = value
        .parse()
        .with_context(|| format!("Invalid duration value: {}", s))?;

    if value <= 0 {
        anyhow::bail!("Duration must be positive: {}", s);
    }

    match unit {
        "h" => Ok(ChronoDuration::hours(value)),
        "d" => Ok(ChronoDuration::days(value)),
        "w" => Ok(ChronoDuration::weeks(value)),
        _ => anyhow::bail!("Invalid duration unit in {} (use h, d, or w)", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("24h").unwrap(), ChronoDuration::hours(24));
        assert_eq!(parse_duration("7d").unwrap(), ChronoDuration::days(7));
        assert_eq!(parse_duration("1w").unwrap(), ChronoDuration::weeks(1));
        assert!(parse_duration("10m").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("-1d").is_err());
        assert!(parse_duration("").is_err());
    }
}
