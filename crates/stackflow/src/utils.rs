use anyhow::Context;
use colored::Colorize;
use stackflow_config::EngineSettings;
use stackflow_cloud::{RetryConfig, ScheduleOptions};
use stackflow_core::{StackFile, parse_stack_file};
use std::path::PathBuf;

/// Resolves the stack file path and parses it.
pub fn load_stack(file: Option<PathBuf>) -> anyhow::Result<(PathBuf, StackFile)> {
    let path = match file {
        Some(path) => path,
        None => stackflow_config::find_stack_file()?,
    };
    println!("Stack file: {}", path.display().to_string().cyan());
    let stack = parse_stack_file(&path).with_context(|| format!("failed to load {}", path.display()))?;
    Ok((path, stack))
}

/// Scheduler options from engine settings, with an optional concurrency
/// override from the command line.
pub fn schedule_options(concurrency: Option<usize>) -> anyhow::Result<ScheduleOptions> {
    let settings = EngineSettings::load()?;
    let concurrency = concurrency.unwrap_or(settings.concurrency);
    if concurrency == 0 {
        anyhow::bail!("concurrency must be at least 1");
    }
    tracing::debug!(concurrency, timeout_secs = settings.call_timeout_secs, "scheduler options");

    Ok(ScheduleOptions {
        concurrency,
        call_timeout: settings.call_timeout(),
        retry: RetryConfig {
            max_attempts: settings.retry.max_attempts,
            initial_delay: settings.retry.initial_delay(),
            max_delay: settings.retry.max_delay(),
            backoff_multiplier: settings.retry.multiplier,
        },
        refresh: false,
    })
}

/// Value for terminal display: bare strings unquoted, everything else as JSON
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("10.0.1.1")), "10.0.1.1");
        assert_eq!(display_value(&json!({"a": "x"})), r#"{"a":"x"}"#);
        assert_eq!(display_value(&json!(3)), "3");
    }
}
