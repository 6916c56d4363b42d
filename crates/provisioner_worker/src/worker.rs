//! Message loop of the worker.
//!
//! Messages arrive one per line (newline-delimited JSON). Each line is handed
//! as raw bytes to the [`Provisioner`] on its own task, so a line that is not
//! valid UTF-8 is dead-lettered like any other undecodable message. At most
//! `concurrency` messages are in flight at a time.

use std::future::Future;
use std::sync::Arc;

use devops_client::AzureDevOpsClient;
use provisioner_core::checkpoint::FileCheckpointStore;
use provisioner_core::dead_letter::FileDeadLetterSink;
use provisioner_core::{IdAllocator, ProcessOutcome, Provisioner};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::WorkerConfig;
use crate::errors::Error;

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

/// Counts of processed messages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub provisioned: usize,
    pub dead_lettered: usize,
}

impl RunSummary {
    fn add(&mut self, outcome: &ProcessOutcome) {
        if outcome.is_success() {
            self.provisioned += 1;
        } else {
            self.dead_lettered += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.provisioned + self.dead_lettered
    }
}

/// Builds a provisioner backed by the Azure DevOps API and file stores, and
/// seeds its identifier allocator from the existing projects.
///
/// # Errors
/// - `Error::Client` if the client cannot be built
/// - `Error::Provisioning` if the existing projects cannot be listed
pub async fn seeded_provisioner(config: &WorkerConfig) -> Result<Provisioner, Error> {
    let client = AzureDevOpsClient::new(config.client_settings())?;

    let provisioner = Provisioner::new(
        Arc::new(client),
        Arc::new(IdAllocator::new()),
        Arc::new(FileCheckpointStore::new(&config.worker.checkpoint_dir)),
        Arc::new(FileDeadLetterSink::new(&config.worker.dead_letter_path)),
        config.provisioner_settings(),
    );
    provisioner.seed_allocator().await?;
    Ok(provisioner)
}

/// Processes every message read from `reader` until the input ends or
/// `shutdown` completes.
///
/// After shutdown no new message is started, but messages already in flight
/// run to completion before this returns.
///
/// # Errors
/// Returns `Error::Io` if the input cannot be read.
pub async fn run_stream<R, S>(
    provisioner: Arc<Provisioner>,
    reader: R,
    concurrency: usize,
    shutdown: S,
) -> Result<RunSummary, Error>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut summary = RunSummary::default();
    let mut reader = reader;
    tokio::pin!(shutdown);

    let read_result = loop {
        let permit = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested, no further messages will be started");
                break Ok(());
            }
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break Ok(()),
            },
        };

        // Lines are raw bytes: invalid UTF-8 is the provisioner's to dead-letter.
        let mut line = Vec::new();
        let read = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested, no further messages will be started");
                break Ok(());
            }
            read = reader.read_until(b'\n', &mut line) => read,
        };

        match read {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e),
        }
        let message = trim_line_ending(&line);
        if message.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let message = message.to_vec();

        let provisioner = provisioner.clone();
        tasks.spawn(async move {
            let outcome = provisioner.handle_message(&message).await;
            drop(permit);
            outcome
        });

        while let Some(finished) = tasks.try_join_next() {
            record(&mut summary, finished);
        }
    };

    if !tasks.is_empty() {
        info!(in_flight = tasks.len(), "Waiting for in-flight messages");
    }
    while let Some(finished) = tasks.join_next().await {
        record(&mut summary, finished);
    }

    info!(
        provisioned = summary.provisioned,
        dead_lettered = summary.dead_lettered,
        "Message loop finished"
    );

    read_result?;
    Ok(summary)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn record(summary: &mut RunSummary, finished: Result<ProcessOutcome, tokio::task::JoinError>) {
    match finished {
        Ok(outcome) => summary.add(&outcome),
        Err(e) => error!(error_message = %e, "Message task did not complete"),
    }
}
