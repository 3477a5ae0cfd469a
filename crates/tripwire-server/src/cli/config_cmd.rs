use crate::cli::ConfigCommands;
use crate::config::TripwireConfig;
use anyhow::Result;
use std::path::Path;

pub fn run(cmd: ConfigCommands, config_path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(config_path),
        ConfigCommands::Show => show(config_path),
    }
}

/// Problems per command that would refuse to start, keyed by command name.
pub fn problems(config: &TripwireConfig) -> Vec<(&'static str, String)> {
    let mut errors = Vec::new();
    if let Err(e) = config.validate_for_watch() {
        errors.push(("watch", e.to_string()));
    }
    if let Err(e) = config.validate_for_tracker() {
        errors.push(("tracker", e.to_string()));
    }
    errors
}

fn validate(config_path: &Path) -> Result<()> {
    match TripwireConfig::load_or_default(config_path) {
        Ok(config) => {
            let errors = problems(&config);
            if errors.is_empty() {
                println!("✅ {} is valid.", config_path.display());
            } else {
                println!("❌ Validation errors in {}:", config_path.display());
                for (command, e) in &errors {
                    println!("  - {}: {}", command, e);
                }
                std::process::exit(1);
            }
        }
        Err(e) => {
            println!("❌ Failed to load {}: {:#}", config_path.display(), e);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn show(config_path: &Path) -> Result<()> {
    let config = TripwireConfig::load_or_default(config_path)?;
    match toml::to_string_pretty(&config.redacted()) {
        Ok(s) => println!("{}", s),
        Err(e) => anyhow::bail!("Failed to serialize config: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_both_commands() {
        let errors = problems(&TripwireConfig::default());
        let commands: Vec<_> = errors.iter().map(|(c, _)| *c).collect();
        assert_eq!(commands, vec!["watch", "tracker"]);
        assert!(errors[0].1.contains("OPENAI_API_KEY"));
        assert!(errors[1].1.contains("GITHUB_TOKEN"));
    }
}
