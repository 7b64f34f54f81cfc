use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the standard `~/.costwatch/` directory hierarchy exists.
///
/// Creates the following directories if absent (including any missing parents):
/// - `~/.costwatch/`
/// - `~/.costwatch/logs/`
/// - `~/.costwatch/cache/`
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let costwatch_dir = home.join(".costwatch");
    std::fs::create_dir_all(&costwatch_dir)?;
    std::fs::create_dir_all(costwatch_dir.join("logs"))?;
    std::fs::create_dir_all(costwatch_dir.join("cache"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised. All output
/// goes to stderr so the report on stdout stays machine-readable.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let upper = log_level.to_uppercase();
    let normalised = match upper.as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" => "error",
        other => other,
    };

    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .init();

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");

        // Override HOME so that dirs::home_dir() resolves to our temp dir.
        let original_home = std::env::var_os("HOME");
        std::env::set_var("HOME", tmp.path());

        let result = ensure_directories();

        // Restore HOME.
        match original_home {
            Some(v) => std::env::set_var("HOME", v),
            None => std::env::remove_var("HOME"),
        }

        result.expect("ensure_directories should succeed");

        let costwatch_dir = tmp.path().join(".costwatch");
        assert!(costwatch_dir.is_dir(), ".costwatch dir must exist");
        assert!(costwatch_dir.join("logs").is_dir(), "logs subdir must exist");
        assert!(
            costwatch_dir.join("cache").is_dir(),
            "cache subdir must exist"
        );
    }
}
