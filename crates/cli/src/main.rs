mod config_commands;
mod serve;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "lilac", about = "lilac, a Telepathy connection manager", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of the discovered one.
    #[arg(long, global = true, env = "LILAC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the connection manager on the bus (default).
    Serve(serve::ServeArgs),
    /// List protocols and their connection parameters.
    Protocols,
    /// Run the manager and connect one account right away.
    Connect {
        #[command(flatten)]
        serve: serve::ServeArgs,
        #[command(flatten)]
        account: serve::AccountArgs,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<(lilac_config::LilacConfig, Option<PathBuf>)> {
    match &cli.config {
        Some(path) => Ok((lilac_config::load_config(path)?, Some(path.clone()))),
        None => Ok(lilac_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let (config, config_path) = load_config(&cli)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_telemetry(level, cli.json_logs || config.logging.json);

    info!(version = env!("CARGO_PKG_VERSION"), "lilac starting");

    match cli.command {
        None => serve::run(config, serve::ServeArgs::default(), None).await,
        Some(Commands::Serve(args)) => serve::run(config, args, None).await,
        Some(Commands::Connect { serve, account }) => {
            serve::run(config, serve, Some(account.into_config())).await
        },
        Some(Commands::Protocols) => {
            serve::print_protocols();
            Ok(())
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, &config, config_path.as_deref())
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["lilac"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, None);
    }

    #[test]
    fn connect_takes_account_and_serve_flags() {
        let cli = Cli::try_parse_from([
            "lilac",
            "connect",
            "--protocol",
            "xmpp",
            "--username",
            "me@example.com",
            "--password",
            "pw",
            "--system",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Some(Commands::Connect { serve, account }) => {
                assert!(serve.system);
                let account = account.into_config();
                assert_eq!(account.protocol, "xmpp");
                assert_eq!(account.password(), "pw");
                assert_eq!(account.server, None);
            },
            _ => panic!("expected connect"),
        }
    }

    #[test]
    fn connect_requires_a_username() {
        assert!(Cli::try_parse_from(["lilac", "connect", "--protocol", "xmpp"]).is_err());
    }
}
