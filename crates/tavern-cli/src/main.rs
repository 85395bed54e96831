//! tavern-replay -- play back or summarize a recorded mutation log.
//!
//! # Usage
//!
//! ```bash
//! # Play a replay in real time at 4x, printing each turn as it starts
//! tavern-replay game.jsonl --speed 4
//!
//! # Jump straight to turn 6 and stop there
//! tavern-replay game.jsonl --start-turn 6 --paused
//!
//! # Print every indexed turn with its offset and state hash, no playback
//! tavern-replay game.jsonl --summary
//! ```
//!
//! Logging goes to stderr and is filtered by `RUST_LOG` (default `warn`).

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tavern_timeline::prelude::*;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Play back a recorded game replay.
#[derive(Parser, Debug)]
#[command(name = "tavern-replay")]
#[command(version)]
struct Args {
    /// Mutation log, one JSON mutation per line
    log: PathBuf,

    /// Playback multiplier (negative plays backwards)
    #[arg(long)]
    speed: Option<f64>,

    /// Start at the first snapshot of this turn
    #[arg(long)]
    start_turn: Option<i64>,

    /// Stop after positioning instead of playing
    #[arg(long)]
    paused: bool,

    /// JSON scrubber config; command-line flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the turn index and exit
    #[arg(long)]
    summary: bool,
}

fn load_config(args: &Args) -> Result<ScrubberConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            ScrubberConfig::from_json(&json)?
        }
        None => ScrubberConfig::default(),
    };
    if let Some(speed) = args.speed {
        config.speed = speed;
    }
    if args.start_turn.is_some() {
        config.start_from_turn = args.start_turn;
    }
    config.validate()?;
    Ok(config)
}

fn open_log(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening log {}", path.display()))?;
    Ok(BufReader::new(file))
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Walk the replay turn by turn from the start, one row per indexed turn.
fn turn_rows(s: &mut Scrubber) -> Result<Vec<(Option<i64>, f64, String)>> {
    let mut rows = Vec::new();
    s.rewind();
    while let Some(state) = s.current_state() {
        let turn = state.turn();
        rows.push((turn, s.current_time(), state.state_hash()?));

        let before = s.current_time();
        s.next_turn();
        // Past the last turn, next_turn lands on the end of that same turn.
        if s.current_time() == before || s.current_turn() == turn {
            break;
        }
    }
    Ok(rows)
}

fn summarize(args: &Args, config: ScrubberConfig) -> Result<()> {
    let scrubber = Scrubber::new(
        config,
        Arc::new(SystemClock::new()),
        Box::new(ManualScheduler::new()),
    )
    .into_shared();
    let mut pipeline = ReplayPipeline::new(Arc::clone(&scrubber), PlaybackOptions::default());
    for item in read_mutation_log(open_log(&args.log)?) {
        if let Err(err) = &item {
            warn!(error = %err, "skipping log line");
        }
        pipeline.feed(item.into());
    }
    pipeline.finish();

    let mut s = scrubber.lock();
    println!(
        "{} snapshots, {} turns, {:.2}s",
        s.history().len(),
        s.history().turn_map().count(),
        s.duration()
    );
    if s.history().is_empty() {
        return Ok(());
    }

    for (turn, time, hash) in turn_rows(&mut s)? {
        let turn = turn.map_or_else(|| "-".to_owned(), |turn| turn.to_string());
        println!("turn {turn:>4}  {time:>9.2}s  {hash}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Live playback
// ---------------------------------------------------------------------------

/// Whether a pause means there is nothing left to play.
fn playback_finished(s: &Scrubber, held: bool) -> bool {
    let at_start = s.speed() < 0.0 && s.current_time() <= 0.0;
    s.input_ended() && (s.has_ended() || held || at_start)
}

async fn play(args: &Args, config: ScrubberConfig) -> Result<()> {
    let scrubber = Scrubber::shared(config, Arc::new(SystemClock::new()), Handle::current());
    let mut events = scrubber.lock().subscribe();

    let (tx, rx) = mpsc::unbounded_channel();
    let log = open_log(&args.log)?;
    let reader = tokio::task::spawn_blocking(move || {
        for item in read_mutation_log(log) {
            if tx.send(FeedItem::from(item)).is_err() {
                break;
            }
        }
    });
    let options = PlaybackOptions {
        autoplay: true,
        start_paused: Some(args.paused),
    };
    let pipeline = tokio::spawn(ReplayPipeline::new(Arc::clone(&scrubber), options).run(rx));

    reader.await.context("log reader panicked")?;
    pipeline.await.context("pipeline panicked")?;

    if scrubber.lock().history().is_empty() {
        println!("replay is empty");
        return Ok(());
    }

    while let Some(event) = events.recv().await {
        match event {
            ScrubberEvent::Turn(Some(turn)) => {
                let time = scrubber.lock().current_time();
                println!("turn {turn:>4}  {time:>9.2}s");
            }
            ScrubberEvent::Error(err) => warn!(error = %err, "upstream error"),
            ScrubberEvent::Pause => {
                let s = scrubber.lock();
                if playback_finished(&s, args.paused) {
                    info!(
                        time = s.current_time(),
                        watched = s.percentage_watched(),
                        "playback stopped"
                    );
                    break;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if args.summary {
        summarize(&args, config)
    } else {
        play(&args, config).await
    }
}
