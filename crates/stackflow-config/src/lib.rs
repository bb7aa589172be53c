//! Locating stack files and loading engine settings.

pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{EngineSettings, RetrySettings, SETTINGS_FILE};

use std::path::PathBuf;

const STACK_CANDIDATES: [&str; 4] = ["stack.local.kdl", ".stack.local.kdl", "stack.kdl", ".stack.kdl"];

/// Global StackFlow config directory, created on first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Finds the stack file for the current project.
///
/// Search order:
/// 1. `STACK_CONFIG_PATH` (direct path)
/// 2. current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl
/// 3. `./.stackflow/`, same order
/// 4. `~/.config/stackflow/stack.kdl`
pub fn find_stack_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("STACK_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "STACK_CONFIG_PATH does not exist, searching");
    }

    let current_dir = std::env::current_dir()?;

    for filename in &STACK_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".stackflow");
    if project_dir.is_dir() {
        for filename in &STACK_CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("stackflow").join("stack.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::StackFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_get_config_dir() {
        let dir = get_config_dir().unwrap();
        assert!(dir.ends_with("stackflow"));
        assert!(dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_stack_file_with_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.kdl");
        fs::write(&path, "resource \"instance\" \"db\"").unwrap();

        temp_env::with_var("STACK_CONFIG_PATH", Some(&path), || {
            assert_eq!(find_stack_file().unwrap(), path);
        });
    }

    #[test]
    #[serial]
    fn test_find_stack_file_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();

        temp_env::with_var_unset("STACK_CONFIG_PATH", || {
            fs::create_dir(".stackflow").unwrap();
            fs::write(".stackflow/stack.kdl", "").unwrap();
            let found = find_stack_file().unwrap();
            assert!(found.ends_with(".stackflow/stack.kdl"));

            fs::write("stack.kdl", "").unwrap();
            assert!(find_stack_file().unwrap().ends_with("stack.kdl"));
            assert!(!find_stack_file().unwrap().to_string_lossy().contains(".stackflow"));

            fs::write("stack.local.kdl", "").unwrap();
            assert!(find_stack_file().unwrap().ends_with("stack.local.kdl"));
        });

        std::env::set_current_dir(original).unwrap();
    }

    #[test]
    #[serial]
    fn test_missing_env_path_falls_back_to_search() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();
        fs::write(".stack.kdl", "").unwrap();

        temp_env::with_var("STACK_CONFIG_PATH", Some("/nonexistent/stack.kdl"), || {
            assert!(find_stack_file().unwrap().ends_with(".stack.kdl"));
        });

        std::env::set_current_dir(original).unwrap();
    }
}
