//! # Warden Simulation
//!
//! Runs one engine against a simulated client on a virtual clock: module
//! transfer, hash challenge, then a number of check cycles.
//!
//! ## Usage
//!
//! ```bash
//! warden_sim --config warden.toml --checks checks.toml --cycles 10 --tamper mem
//! RUST_LOG=debug warden_sim --tamper lua
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing_subscriber::EnvFilter;
use warden_catalog::{CheckCatalog, CheckKind, TomlCheckStore};
use warden_engine::simulation::{self, ClientBehavior, RecordingSession, RecordingTransport, SimulatedClient};
use warden_engine::{EngineError, IntegrityEngine, WardenConfig, Win32Platform};

const DEMO_CONFIG: &str = include_str!("../../data/warden.toml");
const DEMO_CHECKS: &str = include_str!("../../data/checks.toml");

/// Command line options.
struct Options {
    config_path: Option<String>,
    checks_path: Option<String>,
    cycles: u64,
    tamper: String,
    seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config_path: None,
            checks_path: None,
            cycles: 5,
            tamper: "none".to_string(),
            seed: 1,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         WARDEN - CLIENT INTEGRITY SIMULATION                     ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let Some(options) = parse_args() else {
        return;
    };

    if let Err(error) = run(&options) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn parse_args() -> Option<Options> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    options.config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--checks" | "-k" => {
                if i + 1 < args.len() {
                    options.checks_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--cycles" | "-n" => {
                if i + 1 < args.len() {
                    options.cycles = args[i + 1].parse().unwrap_or(5);
                    i += 1;
                }
            }
            "--tamper" | "-t" => {
                if i + 1 < args.len() {
                    options.tamper = args[i + 1].clone();
                    i += 1;
                }
            }
            "--seed" | "-s" => {
                if i + 1 < args.len() {
                    options.seed = args[i + 1].parse().unwrap_or(1);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: warden_sim [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>    Engine config TOML (default: built-in)");
                println!("  -k, --checks <PATH>    Check catalog TOML (default: built-in)");
                println!("  -n, --cycles <NUM>     Check cycles to run (default: 5)");
                println!("  -t, --tamper <MODE>    none | mem | inject | lua | checksum |");
                println!("                         silent | hash | missing | drift");
                println!("  -s, --seed <NUM>       Seed for secrets and check order (default: 1)");
                println!("  -h, --help             Show this help");
                return None;
            }
            _ => {}
        }
        i += 1;
    }
    Some(options)
}

fn behavior_for(mode: &str, catalog: &CheckCatalog) -> ClientBehavior {
    let mut behavior = ClientBehavior::honest();
    match mode {
        "mem" => {
            behavior.patched_memory = catalog
                .iter()
                .filter(|check| check.kind == CheckKind::Mem)
                .map(|check| (check.address, vec![0x90; usize::from(check.length)]))
                .collect();
        }
        "inject" => behavior.injected = true,
        "lua" => behavior.lua_hooked = true,
        "checksum" => behavior.corrupt_checksum = true,
        "silent" => behavior.silent = true,
        "hash" => behavior.wrong_hash = true,
        "missing" => behavior.lose_first_transfer = true,
        "drift" => behavior.drift_per_cycle_ms = 5_000,
        _ => {}
    }
    behavior
}

fn run(options: &Options) -> Result<(), EngineError> {
    let config = match &options.config_path {
        Some(path) => WardenConfig::from_file(path)?,
        None => WardenConfig::from_toml_str(DEMO_CONFIG)?,
    };
    let store = match &options.checks_path {
        Some(path) => TomlCheckStore::open(path)?,
        None => TomlCheckStore::from_toml_str(DEMO_CHECKS)?,
    };
    let catalog = Arc::new(CheckCatalog::from_store(&store, config.fail_action)?);

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Checks loaded:      {}", catalog.len());
    println!("│ Rows rejected:      {}", catalog.rejected().len());
    println!(
        "│ Per request:        {} inject, {} lua, {} modded",
        config.num_inject_checks, config.num_lua_checks, config.num_modded_checks
    );
    println!("│ Cycles:             {}", options.cycles);
    println!("│ Tamper mode:        {}", options.tamper);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let secret = format!("session-key-{}", options.seed).into_bytes();
    let image = simulation::demo_image();
    let session = RecordingSession::new(options.seed, 1000);
    let log = Arc::clone(session.log());

    let start = Instant::now();
    let mut now = start;
    let mut engine = IntegrityEngine::with_rng(
        config.clone(),
        Arc::clone(&catalog),
        Win32Platform::new(image.clone()),
        RecordingTransport::new(secret.clone()),
        session,
        now,
        ChaCha20Rng::seed_from_u64(options.seed),
    )?;
    let mut client = SimulatedClient::new(&secret, image, &catalog, behavior_for(&options.tamper, &catalog));

    simulation::exchange(&mut engine, &mut client, now)?;

    // Enough virtual time for every cycle to be sent and to time out
    let per_cycle = config.check_hold_off() + config.max_response_delay().unwrap_or_default();
    let horizon = config.initial_check_delay() + per_cycle * u32::try_from(options.cycles + 1).unwrap_or(u32::MAX);
    let step = Duration::from_secs(1);

    while !engine.is_closed()
        && (engine.stats().requests_sent < options.cycles || engine.pending().is_some())
        && now.duration_since(start) < horizon
    {
        now += step;
        engine.update(now);
        simulation::exchange(&mut engine, &mut client, now)?;
    }

    let stats = *engine.stats();
    let log = log.lock();
    println!();
    println!("┌─ RESULT ────────────────────────────────────────────────────────┐");
    println!("│ Handshake state:    {:?}", engine.state());
    println!("│ Lifecycle:          {:?}", engine.lifecycle());
    println!("│ Virtual time:       {}s", now.duration_since(start).as_secs());
    println!("│ Module loaded:      {}", client.module_loaded());
    println!("│ Requests sent:      {}", stats.requests_sent);
    println!("│ Clean results:      {}", stats.clean_results);
    println!("│ Failed checks:      {}", stats.failed_checks);
    println!("│ Violations:         {}", stats.violations);
    println!("│ Lua reports:        {}", stats.lua_reports);
    for (session_id, reason) in &log.kicks {
        println!("│ Kick:               session {session_id}: {reason}");
    }
    for (account_id, duration, reason) in &log.bans {
        println!("│ Ban:                account {account_id} for {}s: {reason}", duration.as_secs());
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    Ok(())
}
