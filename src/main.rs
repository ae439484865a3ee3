//! poll-engine: poll aggregation and Monte Carlo election simulation.
//!
//! Thin host around the library crates:
//! 1. Loads poll observations and the candidate roster from JSON files
//! 2. Recomputes every candidate's recency-weighted standing
//! 3. Profiles the pollsters behind each standing
//! 4. Runs the election simulation over the current standings

mod config;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info, warn};

use aggregator::{CandidateRoster, InMemoryObservationStore, StandingBook, StaticRoster};
use common::config::EngineConfig;
use common::{Candidate, CandidateStanding, Error, Observation, SimulationConfig, SourceProfile};
use simulation::SimulationEngine;

/// Poll aggregation and election simulation
#[derive(Parser)]
#[command(name = "poll-engine", about = "Poll aggregation and election simulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute standings and source profiles for every candidate in the
    /// observation file.
    Standings {
        /// JSON array of observations.
        #[arg(long)]
        observations: PathBuf,
        /// Reference date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        now: Option<NaiveDate>,
    },
    /// Recompute standings, then simulate the election.
    Simulate {
        /// JSON array of observations.
        #[arg(long)]
        observations: PathBuf,
        /// JSON array of candidates ({id, name, party}).
        #[arg(long)]
        roster: PathBuf,
        /// Reference date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        now: Option<NaiveDate>,
        #[arg(long)]
        trials: Option<u32>,
        #[arg(long)]
        volatility: Option<f64>,
        #[arg(long)]
        undecided_percent: Option<f64>,
        #[arg(long)]
        turnout_variation: Option<f64>,
        /// Fixed RNG seed for a reproducible run.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Serialize)]
struct CandidateReport {
    standing: CandidateStanding,
    sources: SourceProfile,
}

#[derive(Serialize)]
struct StandingsReport {
    as_of: NaiveDate,
    candidates: Vec<CandidateReport>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&contents)?)
}

fn load_store(path: &Path) -> Result<InMemoryObservationStore, Error> {
    let observations: Vec<Observation> = read_json(path)?;
    let count = observations.len();
    let store: InMemoryObservationStore = observations.into_iter().collect();
    info!(
        "Loaded {} observations for {} candidates from {}",
        count,
        store.candidate_ids().len(),
        path.display()
    );
    Ok(store)
}

fn resolve_now(now: Option<NaiveDate>) -> DateTime<Utc> {
    match now.and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(naive) => naive.and_utc(),
        None => Utc::now(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn standings(cfg: &EngineConfig, observations: &Path, now: DateTime<Utc>) -> Result<(), Error> {
    let store = load_store(observations)?;
    let book = StandingBook::new(cfg.aggregation.clone());

    let mut candidates = Vec::new();
    for candidate_id in store.candidate_ids() {
        let (standing, sources) = book.refresh(&candidate_id, &store, now)?;
        candidates.push(CandidateReport { standing, sources });
    }
    candidates.sort_by(|a, b| b.standing.average.total_cmp(&a.standing.average));

    print_json(&StandingsReport {
        as_of: now.date_naive(),
        candidates,
    })
}

async fn simulate(
    sim_cfg: SimulationConfig,
    seed: Option<u64>,
    cfg: &EngineConfig,
    observations: &Path,
    roster_path: &Path,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    // Reject bad knobs before touching any input file.
    let engine = SimulationEngine::new(sim_cfg)?;

    let store = load_store(observations)?;
    let roster = StaticRoster(read_json::<Vec<Candidate>>(roster_path)?);
    let book = StandingBook::new(cfg.aggregation.clone());

    let summary = book.refresh_all(&store, &roster, now);
    if !summary.insufficient.is_empty() {
        warn!(
            "No observations for {:?}; they are left out of the simulation",
            summary.insufficient
        );
    }

    let candidates = book.simulation_roster(&roster);
    info!(
        "Simulating {} of {} roster candidates, {} trials",
        candidates.len(),
        roster.candidates().len(),
        sim_cfg.trials
    );

    let result = tokio::task::spawn_blocking(move || match seed {
        Some(seed) => engine.run_seeded(&candidates, seed),
        None => engine.run_from_entropy(&candidates),
    })
    .await
    .map_err(|e| Error::Other(format!("simulation task failed: {}", e)))??;

    print_json(&result)
}

async fn run(cli: Cli, cfg: EngineConfig) -> Result<(), Error> {
    match cli.command {
        Command::Standings { observations, now } => {
            standings(&cfg, &observations, resolve_now(now))
        }
        Command::Simulate {
            observations,
            roster,
            now,
            trials,
            volatility,
            undecided_percent,
            turnout_variation,
            seed,
        } => {
            let defaults = cfg.simulation;
            let sim_cfg = SimulationConfig {
                trials: trials.unwrap_or(defaults.trials),
                volatility: volatility.unwrap_or(defaults.volatility),
                undecided_percent: undecided_percent.unwrap_or(defaults.undecided_percent),
                turnout_variation: turnout_variation.unwrap_or(defaults.turnout_variation),
            };
            let seed = seed.or(cfg.seed);
            simulate(sim_cfg, seed, &cfg, &observations, &roster, resolve_now(now)).await
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging. Reports go to stdout, logs to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "poll_engine=info,aggregator=info,simulation=info".into()
            }),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, cfg).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
