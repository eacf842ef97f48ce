use std::path::Path;

use {anyhow::Result, clap::Subcommand, lilac_config::LilacConfig};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration, passwords masked.
    Show,
    /// Print the path of the config file in use, or where one would go.
    Path,
    /// Parse the config file and report problems.
    Check,
}

pub fn handle_config(action: ConfigAction, config: &LilacConfig, loaded_from: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", render(config)?);
            Ok(())
        },
        ConfigAction::Path => {
            let path = loaded_from
                .map(Path::to_path_buf)
                .unwrap_or_else(lilac_config::find_or_default_config_path);
            println!("{}", path.display());
            Ok(())
        },
        ConfigAction::Check => check(loaded_from),
    }
}

/// The config as TOML with every password masked.
fn render(config: &LilacConfig) -> Result<String> {
    let shown = LilacConfig {
        accounts: config.accounts.iter().map(|a| a.redacted()).collect(),
        ..config.clone()
    };
    Ok(toml::to_string_pretty(&shown)?)
}

fn check(loaded_from: Option<&Path>) -> Result<()> {
    let Some(path) = loaded_from else {
        eprintln!("No config file found; using defaults.");
        return Ok(());
    };
    let config = lilac_config::load_config(path)?;
    eprintln!("Checked {}", path.display());

    let mut problems = 0;
    for (i, account) in config.accounts.iter().enumerate() {
        if account.username.is_empty() {
            eprintln!("  accounts[{i}]: username is empty");
            problems += 1;
        }
        if account.protocol.is_empty() {
            eprintln!("  accounts[{i}]: protocol is empty");
            problems += 1;
        }
    }
    if config.manager.name.is_empty() {
        eprintln!("  manager.name is empty");
        problems += 1;
    }

    if problems == 0 {
        eprintln!("No issues found.");
        Ok(())
    } else {
        anyhow::bail!("{problems} problem(s) found")
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_passwords() {
        let config: LilacConfig = toml::from_str(
            r#"
            [[accounts]]
            protocol = "xmpp"
            username = "me@example.com"
            password = "hunter2"
            "#,
        )
        .unwrap();
        let out = render(&config).unwrap();
        assert!(out.contains("me@example.com"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn check_flags_empty_usernames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lilac.toml");
        std::fs::write(&path, "[[accounts]]\nprotocol = \"xmpp\"\nusername = \"\"\n").unwrap();
        assert!(check(Some(&path)).is_err());

        std::fs::write(&path, "[[accounts]]\nprotocol = \"xmpp\"\nusername = \"me\"\n").unwrap();
        assert!(check(Some(&path)).is_ok());
        assert!(check(None).is_ok());
    }
}
