//! `kontext-worker` -- run FLUX Kontext generation and edit chains from
//! the command line.
//!
//! `generate <prompt>` runs one text-to-image job. `edit <image-url>
//! <instruction>...` applies each instruction to the previous result and
//! stops at the first one that does not succeed. Ctrl-C cancels the job
//! in flight. The process exits non-zero unless the last job succeeded.
//!
//! # Environment variables
//!
//! | Variable             | Required | Default            | Description                              |
//! |----------------------|----------|--------------------|------------------------------------------|
//! | `BFL_API_KEY`        | yes      | --                 | Black Forest Labs API key                |
//! | `BFL_API_URL`        | no       | `https://api.bfl.ai` | API base URL                           |
//! | `BFL_MODEL`          | no       | `flux-kontext-pro` | Model endpoint                           |
//! | `POLL_INTERVAL_SECS` | no       | `5`                | Seconds between polls                    |
//! | `POLL_MAX_ATTEMPTS`  | no       | `60`               | Polls before timing out (`0` disables)   |
//! | `POLL_TIMEOUT_SECS`  | no       | `300`              | Wall-clock limit per job (`0` disables)  |
//! | `ASPECT_RATIO`       | no       | `1:1` (generate)   | e.g. `16:9`                              |
//! | `OUTPUT_FORMAT`      | no       | `jpeg`             | `jpeg` or `png`                          |
//! | `SAFETY_TOLERANCE`   | no       | `2`                | Moderation strictness                    |
//! | `SEED`               | no       | --                 | Fixed seed for reproducible output       |

mod cli;
mod settings;

use std::sync::Arc;

use kontext_bfl::BflTransport;
use kontext_core::{Artifact, JobOutcome, JobRequest, JobState};
use kontext_orchestrator::{JobEvent, JobOrchestrator};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Command;
use crate::settings::WorkerSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kontext_worker=info,kontext_orchestrator=info,kontext_bfl=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = cli::parse(std::env::args().skip(1))?;
    let settings = WorkerSettings::from_env()?;
    let transport = Arc::new(BflTransport::from_env()?);

    tracing::info!(
        model = %transport.api().config().model,
        interval_secs = settings.poll.interval.as_secs(),
        max_attempts = ?settings.poll.max_attempts,
        timeout_secs = ?settings.poll.timeout.map(|t| t.as_secs()),
        "Starting kontext-worker",
    );

    let succeeded = match command {
        Command::Generate { prompt } => {
            let orchestrator = JobOrchestrator::new(transport, settings.poll)?;
            run_generate(&orchestrator, prompt, &settings).await?
        }
        Command::Edit {
            image,
            instructions,
        } => {
            let base = Artifact::from_reference(image);
            let orchestrator = JobOrchestrator::with_edit_chain(transport, settings.poll, base)?;
            run_edits(&orchestrator, instructions, &settings).await?
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_generate(
    orchestrator: &JobOrchestrator,
    prompt: String,
    settings: &WorkerSettings,
) -> anyhow::Result<bool> {
    let request = JobRequest::generate(prompt).with_options(settings.options.clone());
    let events = orchestrator.subscribe();
    orchestrator.submit(request)?;

    let outcome = wait_or_cancel(orchestrator, events).await;
    Ok(report(outcome.as_ref()))
}

async fn run_edits(
    orchestrator: &JobOrchestrator,
    instructions: Vec<String>,
    settings: &WorkerSettings,
) -> anyhow::Result<bool> {
    let mut succeeded = false;

    for (step, instruction) in instructions.into_iter().enumerate() {
        tracing::info!(step = step + 1, %instruction, "Starting edit");
        let events = orchestrator.subscribe();
        orchestrator.submit_edit(instruction, settings.options.clone())?;

        let outcome = wait_or_cancel(orchestrator, events).await;
        succeeded = report(outcome.as_ref());
        if !succeeded {
            break;
        }
    }

    let history = orchestrator.history();
    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(succeeded)
}

/// Wait for the active job, logging its events. Ctrl-C cancels it.
async fn wait_or_cancel(
    orchestrator: &JobOrchestrator,
    events: broadcast::Receiver<JobEvent>,
) -> Option<JobOutcome> {
    let logger = tokio::spawn(log_events(orchestrator.clone(), events));

    let outcome = tokio::select! {
        outcome = orchestrator.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling job");
            orchestrator.shutdown();
            None
        }
    };

    logger.abort();
    outcome
}

async fn log_events(orchestrator: JobOrchestrator, mut rx: broadcast::Receiver<JobEvent>) {
    loop {
        match rx.recv().await {
            Ok(JobEvent::Submitted { job_id, .. }) => {
                let status = orchestrator.current_state().label();
                tracing::info!(%job_id, status, "Job accepted by provider");
            }
            Ok(JobEvent::Progress {
                attempt, elapsed, ..
            }) => {
                let status = orchestrator.current_state().label();
                tracing::info!(attempt, elapsed_secs = elapsed.as_secs(), status, "Still pending");
            }
            Ok(JobEvent::Completed { .. }) | Ok(JobEvent::Cancelled { .. }) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event log lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Print the outcome; returns whether it succeeded.
fn report(outcome: Option<&JobOutcome>) -> bool {
    let Some(outcome) = outcome else {
        tracing::warn!("Job cancelled");
        return false;
    };

    match outcome.artifact() {
        Some(artifact) => println!("{artifact}"),
        None => {
            let status = JobState::from(outcome.clone()).label();
            match outcome {
                JobOutcome::Failed(reason) => tracing::error!(status, %reason, "Job failed"),
                _ => tracing::error!(status, "Job did not finish in time"),
            }
        }
    }
    outcome.is_ready()
}
