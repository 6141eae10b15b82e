use std::fs;
use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use tracing::info;

const ENV_EXAMPLE: &str = r#"# chorustap environment variables
# Copy this file to .env and fill in your values

# Chorus API token
CHORUS_AUTH_TOKEN=
"#;

pub fn cmd_init(dir: &Path) -> Result<()> {
    println!("Initializing chorustap in {}...\n", dir.display());

    let env_example_path = dir.join(".env.example");
    if !env_example_path.exists() {
        fs::write(&env_example_path, ENV_EXAMPLE)?;
        println!("Created .env.example");
    } else {
        println!(".env.example already exists, skipping");
    }

    let config_path = dir.join(chorustap_config::CONFIG_FILE);
    if !config_path.exists() {
        fs::write(&config_path, chorustap_config::TEMPLATE)?;
        info!(path = %config_path.display(), "Created config");
        println!("Created {}", chorustap_config::CONFIG_FILE);
    } else {
        println!(
            "{}",
            format!("{} already exists, skipping", chorustap_config::CONFIG_FILE).yellow()
        );
    }

    println!("\n{}\n", "chorustap initialized!".green().bold());
    println!("Next steps:");
    println!("  1. Copy .env.example to .env and set CHORUS_AUTH_TOKEN");
    println!("  2. Adjust start_date in {}", chorustap_config::CONFIG_FILE);
    println!("  3. Run: chorustap sync > output.jsonl\n");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_files_once() {
        let dir = TempDir::new().unwrap();
        cmd_init(dir.path()).unwrap();

        let config_path = dir.path().join("chorustap.toml");
        assert!(dir.path().join(".env.example").exists());
        assert_eq!(
            fs::read_to_string(&config_path).unwrap(),
            chorustap_config::TEMPLATE
        );

        fs::write(&config_path, "auth_token = \"kept\"").unwrap();
        cmd_init(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(&config_path).unwrap(),
            "auth_token = \"kept\""
        );
    }
}
