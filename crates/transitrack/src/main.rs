//! `transitrackd` - CLI for transitrack
//!
//! This binary runs the tracking service and provides commands for
//! inspecting stored locations, the stop index, and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::{error, info, warn};

use transitrack::cli::{Cli, Command, ConfigCommand, ServeCommand, StopsCommand};
use transitrack::server::{spawn_http_server, LiveServer};
use transitrack::server::http::ApiState;
use transitrack::{
    init_logging, BroadcastHub, Config, LocationIngest, StaticDirectory, StopIndex, Storage,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, &serve_cmd),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Latest(latest_cmd) => {
            handle_latest(&config, &latest_cmd.entity_id, latest_cmd.json)
        }
        Command::Stops(stops_cmd) => handle_stops(&config, stops_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_serve(
    mut config: Config,
    cmd: &ServeCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(http_addr) = &cmd.http_addr {
        config.server.http_addr.clone_from(http_addr);
    }
    if let Some(live_addr) = &cmd.live_addr {
        config.server.live_addr.clone_from(live_addr);
    }
    config.validate()?;

    let http_addr = config.http_addr()?;
    let live_addr = config.live_addr()?;

    let storage = Storage::open(config.database_path())?;

    // Seed the stop table on first run when a seed file is configured.
    if storage.count_stops()? == 0 {
        if let Some(seed_file) = &config.stops.seed_file {
            let stops = transitrack::stops::load_seed_file(seed_file)?;
            for stop in &stops {
                storage.upsert_stop(stop)?;
            }
            info!("Imported {} stops from {}", stops.len(), seed_file.display());
        }
    }

    let stop_index = StopIndex::from_storage(&storage)?;
    if stop_index.is_empty() {
        error!("Stop index is empty; nearest-stop queries will fail until stops are imported");
    }

    let storage = Arc::new(Mutex::new(storage));
    let hub = Arc::new(BroadcastHub::new());
    let ingest = LocationIngest::new(storage, hub);

    let directory = if config.server.require_auth {
        warn!("Submission gate enabled with an empty account directory; register accounts before drivers can report");
        Some(Arc::new(StaticDirectory::new()) as Arc<dyn transitrack::AccountDirectory>)
    } else {
        None
    };

    let http_handle = spawn_http_server(
        http_addr,
        ApiState {
            ingest: ingest.clone(),
            stops: stop_index,
            directory,
        },
    )?;

    let live_server = LiveServer::new(ingest);
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async move {
        tokio::select! {
            result = live_server.run(live_addr) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    });

    http_handle.stop();
    result?;
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Storage::open(config.database_path())?;
    let stats = storage.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "total_reports": stats.total_reports,
            "entity_count": stats.entity_count,
            "stop_count": stats.stop_count,
            "newest_report": stats.newest_report,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("transitrack status");
        println!("------------------");
        println!("Database:      {}", config.database_path().display());
        println!("Reports:       {}", stats.total_reports);
        println!("Entities:      {}", stats.entity_count);
        println!("Stops:         {}", stats.stop_count);
        match stats.newest_report {
            Some(ts) => println!("Newest report: {ts}"),
            None => println!("Newest report: none"),
        }
        println!("Size:          {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_latest(
    config: &Config,
    entity_id: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Storage::open(config.database_path())?;
    match storage.latest(entity_id) {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}: ({}, {}) at {}", report.entity_id, report.latitude, report.longitude, report.recorded_at);
                if let Some(route_id) = &report.route_id {
                    println!("  Route: {route_id}");
                }
                if let Some(bus_number) = &report.bus_number {
                    println!("  Bus:   {bus_number}");
                }
            }
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            println!("No location recorded for '{entity_id}'");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn handle_stops(config: &Config, cmd: StopsCommand) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Storage::open(config.database_path())?;
    match cmd {
        StopsCommand::Import { file } => {
            let stops = transitrack::stops::load_seed_file(&file)?;
            for stop in &stops {
                storage.upsert_stop(stop)?;
            }
            println!("Imported {} stops from {}", stops.len(), file.display());
        }
        StopsCommand::List { json } => {
            let stops = storage.stops()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stops)?);
            } else if stops.is_empty() {
                println!("No stops in the index.");
            } else {
                for stop in &stops {
                    println!(
                        "{:>6}  {}  ({}, {})",
                        stop.id, stop.name, stop.latitude, stop.longitude
                    );
                }
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path: {}", config.database_path().display());
                println!();
                println!("[Server]");
                println!("  HTTP API:      {}", config.server.http_addr);
                println!("  Live channel:  {}", config.server.live_addr);
                println!("  Require auth:  {}", config.server.require_auth);
                println!();
                println!("[Stops]");
                match &config.stops.seed_file {
                    Some(path) => println!("  Seed file:     {}", path.display()),
                    None => println!("  Seed file:     (none)"),
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
