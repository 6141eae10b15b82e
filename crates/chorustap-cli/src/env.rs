use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Load the nearest .env file, searching from the current directory up to
/// the filesystem root. Returns the loaded path, or `None` if there is none.
pub fn load_dotenv_from_ancestors() -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    let mut current = cwd.as_path();
    loop {
        let env_path = current.join(".env");
        if env_path.exists() {
            dotenvy::from_path(&env_path)
                .with_context(|| format!("Failed to load .env from {}", env_path.display()))?;
            info!("Loaded .env from {}", env_path.display());
            return Ok(Some(env_path));
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    debug!(cwd = %cwd.display(), "No .env file found");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_load_dotenv_from_parent_directory() {
        let parent_dir = TempDir::new().unwrap();
        let child_dir = parent_dir.path().join("subdir");
        fs::create_dir(&child_dir).unwrap();
        fs::write(parent_dir.path().join(".env"), "CHORUSTAP_TEST_PARENT=world").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&child_dir).unwrap();
        std::env::remove_var("CHORUSTAP_TEST_PARENT");

        let loaded = load_dotenv_from_ancestors().unwrap();
        assert!(loaded.is_some());
        assert_eq!(std::env::var("CHORUSTAP_TEST_PARENT").unwrap(), "world");

        std::env::set_current_dir(original_dir).unwrap();
        std::env::remove_var("CHORUSTAP_TEST_PARENT");
    }

    #[test]
    #[serial]
    fn test_load_dotenv_prefers_closest_env_file() {
        let parent_dir = TempDir::new().unwrap();
        let child_dir = parent_dir.path().join("subdir");
        fs::create_dir(&child_dir).unwrap();
        fs::write(parent_dir.path().join(".env"), "CHORUSTAP_TEST_CLOSEST=parent").unwrap();
        fs::write(child_dir.join(".env"), "CHORUSTAP_TEST_CLOSEST=child").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&child_dir).unwrap();
        std::env::remove_var("CHORUSTAP_TEST_CLOSEST");

        load_dotenv_from_ancestors().unwrap();
        assert_eq!(std::env::var("CHORUSTAP_TEST_CLOSEST").unwrap(), "child");

        std::env::set_current_dir(original_dir).unwrap();
        std::env::remove_var("CHORUSTAP_TEST_CLOSEST");
    }

    #[test]
    #[serial]
    fn test_no_env_file_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();

        // An ancestor of the temp dir may carry its own .env; only the
        // temp dir itself is known to be empty.
        let loaded = load_dotenv_from_ancestors().unwrap();
        assert_ne!(loaded, Some(temp_dir.path().join(".env")));

        std::env::set_current_dir(original_dir).unwrap();
    }
}
