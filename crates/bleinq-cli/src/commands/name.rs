//! Name command implementation.
//!
//! Custom display names are keyed by device address and applied to scan
//! results. They are never overwritten by advertised names.

use anyhow::{Result, bail};
use tabled::{builder::Builder, settings::Style};

use crate::config::Config;

pub enum NameAction {
    List,
    Set { address: String, name: String },
    Remove { address: String },
}

pub fn cmd_name(action: NameAction, quiet: bool) -> Result<()> {
    let mut config = Config::load();

    if let NameAction::List = action {
        if config.names.is_empty() {
            if !quiet {
                println!("No custom names configured.");
                println!();
                println!("Name a device with: bleinq name set <address> <name>");
            }
        } else {
            let mut builder = Builder::default();
            builder.push_record(["Device Address", "Name"]);
            let mut names: Vec<_> = config.names.iter().collect();
            names.sort_by_key(|(address, _)| address.as_str());
            for (address, name) in names {
                builder.push_record([address.as_str(), name.as_str()]);
            }
            let mut table = builder.build();
            table.with(Style::rounded());
            println!("{}", table);
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

/// Names are stored under the upper-case address.
fn normalize(address: &str) -> String {
    address.trim().to_uppercase()
}

fn apply(config: &mut Config, action: NameAction) -> Result<String> {
    match action {
        NameAction::List => Ok(String::new()),
        NameAction::Set { address, name } => {
            let name = name.trim();
            if name.is_empty() {
                bail!("Name must not be blank");
            }
            let address = normalize(&address);
            config.names.insert(address.clone(), name.to_string());
            Ok(format!("Named {} '{}'", address, name))
        }
        NameAction::Remove { address } => {
            let address = normalize(&address);
            if config.names.remove(&address).is_none() {
                bail!("No custom name for {}", address);
            }
            Ok(format!("Removed custom name of {}", address))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_name_normalizes_address() {
        let mut config = Config::default();
        apply(
            &mut config,
            NameAction::Set {
                address: "58:2d:34:33:16:f6".to_string(),
                name: "  Greenhouse ".to_string(),
            },
        )
        .unwrap();
        assert_eq!(config.names["58:2D:34:33:16:F6"], "Greenhouse");
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let mut config = Config::default();
        let result = apply(
            &mut config,
            NameAction::Set {
                address: "58:2D:34:33:16:F6".to_string(),
                name: "   ".to_string(),
            },
        );
        assert!(result.is_err());
        assert!(config.names.is_empty());
    }

    #[test]
    fn test_remove_name() {
        let mut config = Config::default();
        config
            .names
            .insert("58:2D:34:33:16:F6".to_string(), "Greenhouse".to_string());
        apply(
            &mut config,
            NameAction::Remove {
                address: "58:2d:34:33:16:f6".to_string(),
            },
        )
        .unwrap();
        assert!(config.names.is_empty());

        let again = apply(
            &mut config,
            NameAction::Remove {
                address: "58:2D:34:33:16:F6".to_string(),
            },
        );
        assert!(again.is_err());
    }
}
