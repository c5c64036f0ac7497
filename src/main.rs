use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use visage::cli::{Cli, Commands};
use visage::types::config::Config;
use visage::VisageResult;

#[tokio::main]
async fn main() -> VisageResult<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let config = if cli.config.exists() {
        Config::load(&cli.config).unwrap_or_else(|_| Config::default_config())
    } else {
        Config::default_config()
    };

    // Determine log level: CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        // Use config value if no flag was specified
        config.general.log_level.clone()
    };

    // Initialize logging with appropriate level
    let filter = EnvFilter::from_default_env().add_directive(
        format!("visage={}", log_level)
            .parse()
            .unwrap_or_else(|_| "visage=info".parse().expect("fallback directive is valid")),
    );

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => {
            visage::cli::commands::init(path).await?;
        }
        Commands::Stats => {
            visage::cli::commands::stats(&config).await?;
        }
        Commands::Cleanup => {
            visage::cli::commands::cleanup(&config).await?;
        }
        Commands::Recent { limit } => {
            visage::cli::commands::recent(limit, &config).await?;
        }
        Commands::Resolve { input } => {
            visage::cli::commands::resolve(&input, &config).await?;
        }
        Commands::Doctor => {
            visage::cli::commands::doctor(&config).await?;
        }
        Commands::Version => {
            visage::cli::commands::version();
        }
    }

    Ok(())
}
