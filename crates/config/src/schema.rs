/// Config schema types (manager, logging, capabilities, accounts).
use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LilacConfig {
    pub manager: ManagerConfig,
    pub logging: LoggingConfig,
    pub capabilities: CapabilitiesConfig,
    /// Accounts to connect when the manager starts.
    pub accounts: Vec<AccountConfig>,
}

impl LilacConfig {
    /// Accounts flagged for connecting at startup.
    pub fn auto_connect_accounts(&self) -> impl Iterator<Item = &AccountConfig> {
        self.accounts.iter().filter(|a| a.auto_connect)
    }
}

/// Which message bus to claim the manager name on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    Session,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Manager name, the `<cm>` in `org.freedesktop.Telepathy.ConnectionManager.<cm>`.
    pub name: String,
    pub bus: BusKind,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name: "lilac".into(),
            bus: BusKind::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    /// Delay before re-reading a contact's caps after a presence stanza.
    pub poll_delay_secs: u64,
}

impl CapabilitiesConfig {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.poll_delay_secs)
    }
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self { poll_delay_secs: 10 }
    }
}

/// One configured account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub protocol: String,
    pub username: String,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default = "default_true")]
    pub auto_connect: bool,
}

impl AccountConfig {
    pub fn password(&self) -> &str {
        self.password.as_ref().map_or("", |p| p.expose_secret())
    }

    /// The same account with the password masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            password: self.password.as_ref().map(|_| Secret::new("********".into())),
            ..self.clone()
        }
    }
}

fn default_true() -> bool {
    true
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg: LilacConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.manager.name, "lilac");
        assert_eq!(cfg.manager.bus, BusKind::Session);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.capabilities.poll_delay(), Duration::from_secs(10));
        assert!(cfg.accounts.is_empty());
    }

    #[test]
    fn accounts_default_to_auto_connect() {
        let cfg: LilacConfig = toml::from_str(
            r#"
            [manager]
            bus = "system"

            [[accounts]]
            protocol = "xmpp"
            username = "me@example.com"
            password = "pw"
            server = "talk.example.com"

            [[accounts]]
            protocol = "oscar"
            username = "12345"
            auto_connect = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.manager.bus, BusKind::System);
        let auto: Vec<_> = cfg.auto_connect_accounts().map(|a| a.username.as_str()).collect();
        assert_eq!(auto, vec!["me@example.com"]);
        assert_eq!(cfg.accounts[0].password(), "pw");
        assert_eq!(cfg.accounts[1].password(), "");
    }

    #[test]
    fn redacted_hides_the_password() {
        let account = AccountConfig {
            protocol: "xmpp".into(),
            username: "me".into(),
            password: Some(Secret::new("hunter2".into())),
            server: None,
            auto_connect: true,
        };
        let shown = toml::to_string(&account.redacted()).unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("********"));
        assert!(!shown.contains("server"));
    }
}
