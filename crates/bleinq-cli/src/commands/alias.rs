//! Alias command implementation.
//!
//! Manages friendly device names (aliases) that map to device addresses.

use anyhow::{Result, bail};
use tabled::{builder::Builder, settings::Style};

use crate::config::Config;

/// Alias subcommand actions
pub enum AliasAction {
    /// List all aliases
    List,
    /// Set an alias
    Set { name: String, address: String },
    /// Remove an alias
    Remove { name: String },
}

pub fn cmd_alias(action: AliasAction, quiet: bool) -> Result<()> {
    let mut config = Config::load();

    if let AliasAction::List = action {
        if config.aliases.is_empty() {
            if !quiet {
                println!("No aliases configured.");
                println!();
                println!("Add an alias with: bleinq alias set <name> <address>");
            }
        } else {
            println!("{}", alias_table(&config));
        }
        return Ok(());
    }

    let message = apply(&mut config, action)?;
    config.save()?;
    if !quiet {
        println!("{}", message);
    }
    Ok(())
}

/// Apply a modifying action to `config`, returning what changed.
fn apply(config: &mut Config, action: AliasAction) -> Result<String> {
    match action {
        AliasAction::List => Ok(String::new()),
        AliasAction::Set { name, address } => {
            if looks_like_address(&name) {
                bail!(
                    "Alias name '{}' looks like a device address. \
                     Use a friendly name instead (e.g., 'greenhouse', 'office').",
                    name
                );
            }

            let was_update = config.aliases.contains_key(&name);
            config.aliases.insert(name.clone(), address.clone());
            if was_update {
                Ok(format!("Updated alias '{}' → {}", name, address))
            } else {
                Ok(format!("Added alias '{}' → {}", name, address))
            }
        }
        AliasAction::Remove { name } => {
            if config.aliases.remove(&name).is_none() {
                bail!("Alias '{}' not found", name);
            }
            Ok(format!("Removed alias '{}'", name))
        }
    }
}

fn alias_table(config: &Config) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Alias", "Device Address"]);

    let mut aliases: Vec<_> = config.aliases.iter().collect();
    aliases.sort_by_key(|(name, _)| name.as_str());
    for (name, address) in aliases {
        builder.push_record([name.as_str(), address.as_str()]);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Check if a string looks like a device address (MAC or UUID).
fn looks_like_address(s: &str) -> bool {
    // XX:XX:XX:XX:XX:XX or XX-XX-XX-XX-XX-XX
    let mac_pattern = s.chars().filter(|c| *c == ':' || *c == '-').count() >= 5
        && s.chars()
            .all(|c| c.is_ascii_hexdigit() || c == ':' || c == '-');

    // Peripheral IDs on macOS are UUIDs
    let uuid_pattern = s.len() >= 32 && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-');

    mac_pattern || uuid_pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_address_mac() {
        assert!(looks_like_address("58:2D:34:33:16:F6"));
        assert!(looks_like_address("58-2d-34-33-16-f6"));
        assert!(!looks_like_address("58:2D:34"));
    }

    #[test]
    fn test_looks_like_address_uuid() {
        assert!(looks_like_address("12345678-1234-1234-1234-123456789abc"));
        assert!(!looks_like_address("greenhouse"));
        assert!(!looks_like_address("living room"));
        assert!(!looks_like_address(""));
    }

    #[test]
    fn test_set_then_update_alias() {
        let mut config = Config::default();
        let added = apply(
            &mut config,
            AliasAction::Set {
                name: "greenhouse".to_string(),
                address: "58:2D:34:33:16:F6".to_string(),
            },
        )
        .unwrap();
        assert!(added.starts_with("Added"));

        let updated = apply(
            &mut config,
            AliasAction::Set {
                name: "greenhouse".to_string(),
                address: "58:2D:34:33:16:F7".to_string(),
            },
        )
        .unwrap();
        assert!(updated.starts_with("Updated"));
        assert_eq!(config.aliases["greenhouse"], "58:2D:34:33:16:F7");
    }

    #[test]
    fn test_alias_name_must_not_be_an_address() {
        let mut config = Config::default();
        let result = apply(
            &mut config,
            AliasAction::Set {
                name: "58:2D:34:33:16:F6".to_string(),
                address: "58:2D:34:33:16:F6".to_string(),
            },
        );
        assert!(result.is_err());
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn test_remove_missing_alias_fails() {
        let mut config = Config::default();
        let err = apply(
            &mut config,
            AliasAction::Remove {
                name: "attic".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Alias 'attic' not found");
    }

    #[test]
    fn test_alias_table_is_sorted() {
        let mut config = Config::default();
        config.aliases.insert("office".to_string(), "B".to_string());
        config.aliases.insert("attic".to_string(), "A".to_string());
        let table = alias_table(&config);
        let attic = table.find("attic").unwrap();
        let office = table.find("office").unwrap();
        assert!(attic < office);
    }
}
