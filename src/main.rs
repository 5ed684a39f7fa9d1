use clap::Parser;
use poly_updown::cli::{Cli, Commands};
use poly_updown::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        toml::from_str(include_str!("../config.toml.example")).expect("Invalid default config")
    });

    poly_updown::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(mode = config.mode.as_str(), once = args.once, "starting trading loop");
            poly_updown::runner::run(config, args.once).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Mode: {}", config.mode.as_str());
            println!("  Poll interval: {}s", config.poll_interval_secs);
            println!(
                "  Strategy: min_abs_return={}, vol_mult={}, min_edge={}",
                config.strategy.min_abs_return,
                config.strategy.volatility_mult,
                config.strategy.min_edge
            );
            println!(
                "  Budgets: per_trade={}, per_market={}, total={}",
                config.strategy.max_notional_per_trade,
                config.strategy.max_notional_per_market,
                config.strategy.max_total_notional
            );
            println!("  State: {}", config.state.path.display());
        }
    }

    Ok(())
}
