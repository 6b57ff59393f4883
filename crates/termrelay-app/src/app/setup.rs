use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use termrelay_config::RelayConfig;
use termrelay_logging::{debug_from_env, get_logs_dir, EventLog, RelayLogger};
use termrelay_monitor::Monitor;
use termrelay_terminal::TmuxBackend;

use crate::cli::Cli;
use crate::console_transport::ConsoleTransport;
use crate::mapping::FileMappingStore;

/// Everything the run modes share, derived from CLI arguments and the
/// configuration file
pub struct AppContext {
    pub config: RelayConfig,
    pub logger: Arc<RelayLogger>,
    pub backend: Arc<TmuxBackend>,
    pub transport: Arc<ConsoleTransport>,
    pub monitor: Monitor,
    pub mappings: Arc<FileMappingStore>,
}

/// Resolve where the mapping file lives. The CLI flag wins over the
/// configuration.
pub fn mapping_path(cli: &Cli, config: &RelayConfig) -> PathBuf {
    cli.mapping_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.mapping.file))
}

/// Set up the application context from CLI arguments
pub fn setup_from_cli(cli: &Cli) -> Result<AppContext> {
    let config = RelayConfig::load_or_create(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let verbose = cli.verbose || debug_from_env();
    let mut logger = RelayLogger::new(verbose);
    if cli.event_log || config.logging.event_log {
        let events = EventLog::daily(get_logs_dir()?)?;
        logger = logger.with_event_log(events);
    }
    let logger = Arc::new(logger);
    if let Some(path) = logger.event_log_path() {
        logger.debug("setup", &format!("event log: {}", path.display()));
    }

    let path = mapping_path(cli, &config);
    let mappings = Arc::new(FileMappingStore::open(&path)?);
    if path.exists() {
        logger.debug(
            "setup",
            &format!("loaded {} session mapping(s) from {}", mappings.all().len(), path.display()),
        );
    } else {
        logger.info("setup", &format!("no session mappings at {}, starting empty", path.display()));
    }

    let backend = Arc::new(TmuxBackend::new(config.backend.clone()));
    let transport = Arc::new(ConsoleTransport::new());
    let monitor = Monitor::new(backend.clone(), transport.clone(), &config, logger.clone())
        .context("Invalid monitor configuration")?;
    logger.debug("setup", &format!("idle rule: {}", monitor.idle_policy_name()));

    Ok(AppContext {
        config,
        logger,
        backend,
        transport,
        monitor,
        mappings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_mapping_flag_overrides_config() {
        let config = RelayConfig::default();

        let cli = Cli::try_parse_from(["termrelay", "list"]).unwrap();
        assert_eq!(mapping_path(&cli, &config), PathBuf::from("session-mapping.json"));

        let cli = Cli::try_parse_from(["termrelay", "list", "--mapping-file", "/tmp/other.json"]).unwrap();
        assert_eq!(mapping_path(&cli, &config), PathBuf::from("/tmp/other.json"));
    }

    #[test]
    fn test_setup_creates_default_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("termrelay.toml");
        let mapping_file = dir.path().join("mappings.json");
        let cli = Cli::try_parse_from([
            "termrelay",
            "list",
            "--config",
            config_path.to_str().unwrap(),
            "--mapping-file",
            mapping_file.to_str().unwrap(),
        ])
        .unwrap();

        let ctx = setup_from_cli(&cli).unwrap();
        assert!(config_path.exists());
        assert!(ctx.mappings.all().is_empty());
        assert_eq!(ctx.mappings.path(), mapping_file.as_path());
        assert_eq!(ctx.monitor.store().active_count(), 0);
    }
}
