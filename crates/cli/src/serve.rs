use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    clap::Args,
    lilac_config::{AccountConfig, BusKind, LilacConfig},
    lilac_connection::{ConnectionManager, ConnectionOptions, ConnectionParams, ParamFlags},
    lilac_dbus::BusType,
    lilac_engine::{Engine, loopback::LoopbackEngine},
    secrecy::Secret,
    tracing::{info, warn},
};

/// How long to wait for connections to sign off on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Args, Default)]
pub struct ServeArgs {
    /// Manager name on the bus (overrides config value).
    #[arg(long)]
    pub name: Option<String>,
    /// Use the system bus instead of the session bus.
    #[arg(long, default_value_t = false)]
    pub system: bool,
    /// Reflect sent messages back as incoming ones.
    #[arg(long, default_value_t = false)]
    pub echo: bool,
}

#[derive(Args)]
pub struct AccountArgs {
    #[arg(long)]
    pub protocol: String,
    #[arg(long)]
    pub username: String,
    #[arg(long, env = "LILAC_PASSWORD")]
    pub password: Option<String>,
    #[arg(long)]
    pub server: Option<String>,
}

impl AccountArgs {
    pub fn into_config(self) -> AccountConfig {
        AccountConfig {
            protocol: self.protocol,
            username: self.username,
            password: self.password.map(Secret::new),
            server: self.server,
            auto_connect: true,
        }
    }
}

fn connection_params(account: &AccountConfig) -> ConnectionParams {
    let params = ConnectionParams::new(&account.protocol, &account.username, account.password());
    match &account.server {
        Some(server) => params.with_server(server),
        None => params,
    }
}

fn manager(config: &LilacConfig, echo: bool) -> Arc<ConnectionManager> {
    let engine: Arc<dyn Engine> = Arc::new(LoopbackEngine::new().with_echo(echo));
    let options = ConnectionOptions {
        poll_delay: config.capabilities.poll_delay(),
    };
    Arc::new(ConnectionManager::new(engine, options))
}

/// Serve the manager until interrupted, connecting configured accounts (and
/// `extra`) on startup.
pub async fn run(config: LilacConfig, args: ServeArgs, extra: Option<AccountConfig>) -> anyhow::Result<()> {
    let manager = manager(&config, args.echo);
    let name = args.name.unwrap_or_else(|| config.manager.name.clone());
    let bus_type = if args.system || config.manager.bus == BusKind::System {
        BusType::System
    } else {
        BusType::Session
    };

    let bus = lilac_dbus::serve(bus_type, &name, Arc::clone(&manager))
        .await
        .with_context(|| format!("failed to claim manager name {name} on the {bus_type:?} bus"))?;

    for account in config.auto_connect_accounts().chain(extra.iter()) {
        if let Err(e) = connect_account(&bus, &manager, account).await {
            warn!(protocol = %account.protocol, username = %account.username, error = %e, "account failed to connect");
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    for conn in manager.connections() {
        conn.disconnect();
    }

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while !manager.connections().is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!("connections still open at exit");
    }
    Ok(())
}

async fn connect_account(
    bus: &zbus::Connection,
    manager: &Arc<ConnectionManager>,
    account: &AccountConfig,
) -> anyhow::Result<()> {
    let (conn, events) = manager.request_connection(connection_params(account))?;
    lilac_dbus::export_connection(bus, Arc::clone(manager), conn.clone(), events).await?;
    conn.lock().start()?;
    info!(bus_name = %conn.bus_name(), "account connecting");
    Ok(())
}

/// `lilac protocols`: what `GetParameters` reports, without a bus.
pub fn print_protocols() {
    let manager = manager(&LilacConfig::default(), false);
    for protocol in manager.list_protocols() {
        println!("{protocol}");
        for param in manager.get_parameters(&protocol).unwrap_or_default() {
            let mut flags = Vec::new();
            if param.flags.contains(ParamFlags::REQUIRED) {
                flags.push("required");
            }
            if param.flags.contains(ParamFlags::SECRET) {
                flags.push("secret");
            }
            if param.flags.contains(ParamFlags::HAS_DEFAULT) {
                flags.push("has default");
            }
            println!("  {} ({}) {}", param.name, param.signature, flags.join(", "));
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_config_becomes_connection_params() {
        let account = AccountArgs {
            protocol: "oscar".into(),
            username: "12345".into(),
            password: None,
            server: Some("login.example.com".into()),
        }
        .into_config();
        let params = connection_params(&account);
        assert_eq!(params.protocol, "oscar");
        assert_eq!(params.server(), Some("login.example.com"));
    }

    #[test]
    fn manager_serves_the_loopback_protocols() {
        let manager = manager(&LilacConfig::default(), true);
        assert_eq!(manager.list_protocols(), vec!["bare", "loopback", "oscar", "xmpp"]);
        assert!(manager.get_parameters("oscar").is_ok());
    }
}
