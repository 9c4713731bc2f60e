extern crate bluehole_core;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bluehole_core::chain::{DispatchError, ScriptedOutcome, SimulatedChain, StaticWallet};
use bluehole_core::config::{load_config, ConfigValidator};
use bluehole_core::errors::Result;
use bluehole_core::projector::{ApprovalCount, ConfirmedTotals, VoteTotals};
use bluehole_core::report::{render_aggregate, render_entries, render_toasts, OutputFormat};
use bluehole_core::toasts::{self, ToastQueue};
use bluehole_core::tracker::types::{ActionKind, ActionPayload, VoteDirection};
use bluehole_core::tracker::OptimisticTracker;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use env_logger::{Builder, Env};
use log::{error, info};
use parking_lot::Mutex;

#[derive(Parser)]
#[clap(author, version, about)]
/// Optimistic vote and approval tracker for Blue Hole governance
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// TOML configuration file, overridden by BLUEHOLE_* variables
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[clap(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session against the in-process chain
    #[clap(alias = "sim")]
    Simulate {
        /// Proposal, referendum or application id
        #[clap(short, long, default_value = "REF-1")]
        subject: String,

        /// Acting wallet addresses (comma-separated)
        #[clap(short, long, value_delimiter = ',', default_value = "alice,bob")]
        actors: Vec<String>,

        #[clap(short, long, value_enum, default_value = "vote")]
        mode: Mode,

        #[clap(short, long, value_enum, default_value = "aye")]
        direction: Direction,

        /// Vote weight per actor
        #[clap(short, long, default_value = "10")]
        weight: u128,

        /// Actors whose action the chain rejects (comma-separated)
        #[clap(short, long, value_delimiter = ',')]
        reject: Vec<String>,

        /// Delay between status updates
        #[clap(short, long, default_value = "250")]
        latency_ms: u64,

        /// Random extra delay per status update, up to this many ms
        #[clap(short, long, default_value = "0")]
        jitter_ms: u64,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Vote,
    Approve,
    Reject,
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Aye,
    Nay,
    Abstain,
}

impl From<Direction> for VoteDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Aye => VoteDirection::Aye,
            Direction::Nay => VoteDirection::Nay,
            Direction::Abstain => VoteDirection::Abstain,
        }
    }
}

#[tokio::main]
async fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = if cli.json { OutputFormat::Json } else { OutputFormat::Table };

    match cli.command {
        Commands::ShowConfig => {
            let config = load_config(cli.config.as_deref())?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Table => {
                    print!("{}", toml::to_string_pretty(&config)?);
                    println!();
                    for (name, description) in ConfigValidator::new().describe() {
                        println!("{}", format!("# {}: {}", name, description).dimmed());
                    }
                }
            }
            Ok(())
        }
        Commands::Simulate {
            subject,
            actors,
            mode,
            direction,
            weight,
            reject,
            latency_ms,
            jitter_ms,
        } => {
            let session = Session {
                subject,
                actors,
                mode,
                direction: direction.into(),
                weight,
                reject,
                latency: Duration::from_millis(latency_ms),
                jitter: Duration::from_millis(jitter_ms),
            };
            simulate(cli.config.as_deref(), session, output).await
        }
    }
}

struct Session {
    subject: String,
    actors: Vec<String>,
    mode: Mode,
    direction: VoteDirection,
    weight: u128,
    reject: Vec<String>,
    latency: Duration,
    jitter: Duration,
}

async fn simulate(
    config_path: Option<&std::path::Path>,
    session: Session,
    output: OutputFormat,
) -> Result<()> {
    let config = load_config(config_path)?;
    let Some(first_actor) = session.actors.first().cloned() else {
        println!("{}", "No actors given, nothing to simulate".yellow());
        return Ok(());
    };

    let (kind, payload, baseline) = match session.mode {
        Mode::Vote => (
            ActionKind::Vote,
            ActionPayload::vote(session.direction, session.weight),
            ConfirmedTotals::Votes(VoteTotals::default()),
        ),
        Mode::Approve => (
            ActionKind::Approval,
            ActionPayload::Empty,
            ConfirmedTotals::Approvals(ApprovalCount::default()),
        ),
        Mode::Reject => (
            ActionKind::Rejection,
            ActionPayload::Empty,
            ConfirmedTotals::Approvals(ApprovalCount::default()),
        ),
    };

    let chain = Arc::new(SimulatedChain::new(session.latency).with_jitter(session.jitter));
    chain.seed_totals(session.subject.clone(), baseline);
    for actor in &session.reject {
        chain.script(
            &session.subject,
            actor,
            ScriptedOutcome::Reject(DispatchError::module(
                "governance",
                "NotAllowed",
                "The origin is not allowed to perform this action",
            )),
        );
    }

    let wallet = Arc::new(StaticWallet::connected(first_actor));
    let toast_queue = Arc::new(Mutex::new(ToastQueue::new(config.toasts.clone())));
    let tracker = OptimisticTracker::new(chain.clone(), wallet.clone(), config);
    let follower = tokio::spawn(toasts::follow(toast_queue.clone(), tracker.subscribe()));

    println!("{}", format!("Simulating {} on {}", kind, session.subject).green().bold());

    let mut submissions = Vec::with_capacity(session.actors.len());
    for actor in &session.actors {
        wallet.select(actor.clone());
        submissions.push(tracker.submit(session.subject.clone(), kind, payload)?);
    }

    println!("\n{}", "Optimistic view".bold());
    print_state(&tracker, &session.subject, output).await?;

    for submission in submissions {
        let key = submission.key().clone();
        let outcome = submission.await;
        if outcome.success {
            info!("{} confirmed", key);
        } else {
            info!(
                "{} failed: {}",
                key,
                outcome.failure_reason.as_deref().unwrap_or_default()
            );
        }
    }

    println!("\n{}", "After resolution".bold());
    print_state(&tracker, &session.subject, output).await?;

    if output == OutputFormat::Table {
        // Let the follower catch up before reading the queue
        tokio::task::yield_now().await;
        println!("\n{}", "Toasts".bold());
        print!("{}", render_toasts(toast_queue.lock().visible()));
    }

    drop(tracker);
    follower.abort();
    Ok(())
}

async fn print_state(tracker: &OptimisticTracker, subject: &str, output: OutputFormat) -> Result<()> {
    let aggregate = tracker.projected(subject).await?;
    print!("{}", render_entries(&tracker.list(subject), output)?);
    println!("{}", render_aggregate(subject, &aggregate, output)?);
    Ok(())
}
