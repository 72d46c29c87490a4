//! `conclave profile` - manage the active user profile

use clap::Subcommand;
use colored::Colorize;

use conclave_core::storage::Storage;
use conclave_core::Profile;

/// Profile management subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Show the active profile
    Show,
    /// Set a profile attribute (value parsed as JSON when possible)
    Set {
        /// Attribute key, e.g. preferredName
        key: String,
        /// Attribute value
        value: String,
    },
    /// Remove a profile attribute
    Unset {
        /// Attribute key
        key: String,
    },
}

/// Run a profile subcommand
pub async fn run(command: ProfileCommand) -> anyhow::Result<()> {
    let storage = Storage::new();
    storage.init()?;
    let config = storage.load_config()?;

    let mut profile = storage
        .load_profile(&config.current_profile)
        .unwrap_or_else(|_| Profile::new(&config.current_profile));

    match command {
        ProfileCommand::Show => {
            println!("\n{}", format!("Profile: {}", profile.name).bold());
            if profile.attributes.is_empty() {
                println!("{}", "  (no attributes)".dimmed());
                println!(
                    "{}",
                    "  Set one with: conclave profile set preferredName Alex".dimmed()
                );
            } else {
                println!("{}", serde_json::to_string_pretty(&profile.attributes)?);
            }
            println!();
        }
        ProfileCommand::Set { key, value } => {
            // Accept structured values ("[\"a\",\"b\"]") and fall back to strings
            let parsed = serde_json::from_str(&value)
                .unwrap_or(serde_json::Value::String(value.clone()));
            profile.attributes.insert(key.clone(), parsed);
            profile.updated_at = chrono::Utc::now();
            storage.save_profile(&profile)?;
            println!("{}", format!("Set {key}").green());
        }
        ProfileCommand::Unset { key } => {
            if profile.attributes.remove(&key).is_some() {
                profile.updated_at = chrono::Utc::now();
                storage.save_profile(&profile)?;
                println!("{}", format!("Removed {key}").green());
            } else {
                println!("{}", format!("No such attribute: {key}").yellow());
            }
        }
    }

    Ok(())
}
