use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use log::info;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex, atomic::AtomicBool},
};

use crate::{
    config::{self, Config},
    detector::{DetectorState, TrackChangeDetector},
    http::server::HttpServer,
    poller::Poller,
    relay::{self, TrackRelay, file::FileFormat},
    source::{self, MetadataSource},
    storage::operations::Storage,
};

#[derive(Parser)]
#[command(name = "nowplaying-relay")]
#[command(version = "0.1")]
#[command(about = "Relays now playing tracks from a web page to a websocket and a file")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the metadata source and relay track changes, serving the control API
    Serve,
    /// Read the metadata source once and print the track it describes
    Once,
    /// Print the track history, newest first
    History {
        /// Print `timestamp | title - artist (album)` lines instead of json
        #[arg(short, long)]
        export: bool,
    },
    /// Send a test message with the last track to a websocket
    TestWebsocket {
        /// Defaults to the configured url
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Write the last track to `test_<file>` next to the given file
    TestFile {
        /// Defaults to the configured file path
        #[arg(short, long)]
        path: Option<PathBuf>,
        #[arg(short, long, value_parser = parse_format)]
        format: Option<FileFormat>,
    },
}

fn parse_format(s: &str) -> Result<FileFormat, String> {
    match s {
        "simple" => Ok(FileFormat::Simple),
        "json" => Ok(FileFormat::Json),
        "detailed" => Ok(FileFormat::Detailed),
        other => Err(format!(
            "unknown format '{other}', expected simple, json or detailed"
        )),
    }
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        Config::load(&cli.config.to_string_lossy())?
    } else {
        info!(
            "Config {} not found, using defaults",
            cli.config.to_string_lossy()
        );
        Config::default()
    };

    match cli.command {
        Commands::Serve => serve(cfg),

        Commands::Once => {
            let (source, _) = source::from_config(&cfg.source);
            let metadata = source
                .read()
                .with_context(|| format!("Failed to read {}", source.describe()))?;

            match TrackChangeDetector::default().poll(metadata.as_ref()) {
                Some(track) => println!("{}", serde_json::to_string_pretty(&track)?),
                None => println!("Nothing is playing"),
            }
            Ok(())
        }

        Commands::History { export } => {
            let relay = open_relay(&cfg)?;
            if export {
                println!("{}", relay.export_history()?);
            } else {
                println!("{}", serde_json::to_string_pretty(&relay.history()?)?);
            }
            Ok(())
        }

        Commands::TestWebsocket { url } => {
            let mut relay = open_relay(&cfg)?;
            relay.connect_websocket(url.as_deref())?;
            relay.test_websocket(None)?;
            relay.disconnect_websocket();
            println!("Test message sent");
            Ok(())
        }

        Commands::TestFile { path, format } => {
            let relay = open_relay(&cfg)?;
            let written = relay.test_file_write(None, path.as_deref(), format)?;
            println!("Test track written to {}", written.to_string_lossy());
            Ok(())
        }
    }
}

fn open_relay(cfg: &Config) -> anyhow::Result<TrackRelay> {
    let storage = Storage::new(&cfg.database).context("Failed to initialize storage")?;
    Ok(TrackRelay::new(storage, cfg.relay.clone()))
}

fn serve(cfg: Config) -> anyhow::Result<()> {
    if cfg.database == config::Database::InMemory {
        info!("Using in-memory storage, history is lost on exit");
    }

    let relay = open_relay(&cfg)?;

    let state = if cfg.poll.restore_state {
        relay
            .last_track()?
            .map(|track| DetectorState::after(&track))
            .unwrap_or_default()
    } else {
        DetectorState::default()
    };
    let detector = TrackChangeDetector::with_state(state, cfg.poll.absent_policy);

    let relay = Arc::new(Mutex::new(relay));
    relay
        .lock()
        .map_err(|e| anyhow!("relay lock poisoned: {e}"))?
        .auto_connect();

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    relay::spawn_worker(Arc::clone(&relay), events_rx);

    let (source, ingest) = source::from_config(&cfg.source);
    let monitoring = Arc::new(AtomicBool::new(true));
    let poller = Poller::new(Box::new(Arc::clone(&source)), detector, events_tx);
    let _poller = poller.spawn(
        cfg.poll.interval(),
        cfg.poll.initial_delay(),
        Arc::clone(&monitoring),
    );

    let http_server = HttpServer::new(relay, source, ingest, monitoring, cfg.http);

    println!(
        "Control API running at http://{}:{}",
        http_server.config.bind_addr, http_server.config.port
    );
    http_server.run();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["nowplaying-relay", "-c", "relay.toml", "history", "--export"]);
        assert_eq!(cli.config, PathBuf::from("relay.toml"));
        assert!(matches!(cli.command, Commands::History { export: true }));

        let cli = Cli::parse_from(["nowplaying-relay", "test-file", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Commands::TestFile {
                path: None,
                format: Some(FileFormat::Json)
            }
        ));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result = Cli::try_parse_from(["nowplaying-relay", "test-file", "--format", "xml"]);

        assert!(result.is_err());
    }
}
