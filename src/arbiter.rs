use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::extractor;
use crate::gateway::AnalysisRequest;
use crate::invoker::{AnalyzerCommand, Completion, ProcessOutput};

/// The events that can end a request. Only the first one to reach the
/// arbiter decides the response.
#[derive(Debug)]
pub enum TerminalEvent {
    TimedOut {
        deadline: Duration,
        partial: ProcessOutput,
    },
    Closed(ProcessOutput),
    SpawnFailed(io::Error),
    ProcessFailed(io::Error),
}

impl TerminalEvent {
    fn name(&self) -> &'static str {
        match self {
            TerminalEvent::TimedOut { .. } => "timeout",
            TerminalEvent::Closed(_) => "close",
            TerminalEvent::SpawnFailed(_) => "spawn error",
            TerminalEvent::ProcessFailed(_) => "process error",
        }
    }
}

/// Per-request response slot: `Pending` while the sender is present,
/// `Responded` once it has been taken.
pub struct Arbiter {
    request_id: String,
    slot: Mutex<Option<oneshot::Sender<TerminalEvent>>>,
}

impl Arbiter {
    pub fn new(request_id: impl Into<String>) -> (Arc<Arbiter>, oneshot::Receiver<TerminalEvent>) {
        let (tx, rx) = oneshot::channel();
        let arbiter = Arbiter {
            request_id: request_id.into(),
            slot: Mutex::new(Some(tx)),
        };
        (Arc::new(arbiter), rx)
    }

    /// Delivers `event` if nothing has been delivered yet. Returns whether
    /// this call won.
    pub fn settle(&self, event: TerminalEvent) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match sender {
            Some(tx) => {
                log::debug!("[{}] settled by {}", self.request_id, event.name());
                // The receiver may be gone if the client disconnected.
                let _ = tx.send(event);
                true
            }
            None => {
                log::debug!(
                    "[{}] ignoring late {} event, already responded",
                    self.request_id,
                    event.name()
                );
                false
            }
        }
    }

    #[cfg(test)]
    fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

/// Runs one analyzer process for `request` and produces exactly one outcome.
///
/// The process close, the deadline and launch failure race through a single
/// [`Arbiter`]; the timer kills the process only when it wins.
pub async fn run_analysis(
    command: &AnalyzerCommand,
    request: &AnalysisRequest,
    deadline: Duration,
) -> Result<Map<String, Value>, ApiError> {
    let request_id = nanoid::nanoid!(10);
    let (arbiter, verdict) = Arbiter::new(request_id.clone());
    let kill = CancellationToken::new();
    let mut timer = None;

    match command.spawn(request, &request_id) {
        Err(e) => {
            log::error!("[{request_id}] failed to spawn {}: {:#}", command.program(), e);
            arbiter.settle(TerminalEvent::SpawnFailed(e));
        }
        Ok(invocation) => {
            let buffers = invocation.buffers();
            let closer = Arc::clone(&arbiter);
            let kill_signal = kill.clone();
            tokio::spawn(async move {
                match invocation.wait(kill_signal).await {
                    Ok(Completion::Exited(output)) => {
                        closer.settle(TerminalEvent::Closed(output));
                    }
                    Ok(Completion::Killed) => {}
                    Err(e) => {
                        closer.settle(TerminalEvent::ProcessFailed(e));
                    }
                }
            });

            let watchdog = Arc::clone(&arbiter);
            let kill_signal = kill.clone();
            timer = Some(tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                let partial = buffers.snapshot(None);
                if watchdog.settle(TerminalEvent::TimedOut { deadline, partial }) {
                    kill_signal.cancel();
                }
            }));
        }
    }

    let event = verdict.await;
    if let Some(timer) = timer {
        timer.abort();
    }

    match event {
        Ok(event) => resolve(&request_id, event),
        Err(_) => Err(ApiError::Process(io::Error::other(
            "analyzer finished without reporting a result",
        ))),
    }
}

/// Maps the winning event onto the response it stands for.
pub fn resolve(request_id: &str, event: TerminalEvent) -> Result<Map<String, Value>, ApiError> {
    match event {
        TerminalEvent::TimedOut { deadline, partial } => {
            log::warn!("[{request_id}] analyzer timed out after {:?}", deadline);
            Err(ApiError::Timeout {
                deadline,
                raw_output_excerpt: extractor::excerpt(&partial.stdout),
                stderr_excerpt: extractor::excerpt(&partial.stderr),
            })
        }
        TerminalEvent::SpawnFailed(e) => Err(ApiError::Spawn(e)),
        TerminalEvent::ProcessFailed(e) => {
            log::error!("[{request_id}] analyzer process error: {:#}", e);
            Err(ApiError::Process(e))
        }
        TerminalEvent::Closed(output) => {
            extractor::extract(output.exit_code, &output.stdout, &output.stderr).map_err(
                |failure| {
                    log::error!(
                        "[{request_id}] could not extract analyzer result: {} (exit code {:?})",
                        failure.reason.as_str(),
                        failure.exit_code
                    );
                    ApiError::Extraction(failure)
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed_out() -> TerminalEvent {
        TerminalEvent::TimedOut {
            deadline: Duration::from_secs(1),
            partial: ProcessOutput::default(),
        }
    }

    #[test]
    fn timeout_keeps_partial_output() {
        let event = TerminalEvent::TimedOut {
            deadline: Duration::from_millis(250),
            partial: ProcessOutput {
                exit_code: None,
                stdout: "fetching page 1".into(),
                stderr: "slow response".into(),
            },
        };
        match resolve("test", event) {
            Err(ApiError::Timeout {
                deadline,
                raw_output_excerpt,
                stderr_excerpt,
            }) => {
                assert_eq!(deadline, Duration::from_millis(250));
                assert_eq!(raw_output_excerpt, "fetching page 1");
                assert_eq!(stderr_excerpt, "slow response");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn only_first_event_is_delivered() {
        let (arbiter, mut rx) = Arbiter::new("test");
        assert!(arbiter.is_pending());

        assert!(arbiter.settle(TerminalEvent::Closed(ProcessOutput::default())));
        assert!(!arbiter.settle(timed_out()));
        assert!(!arbiter.settle(TerminalEvent::SpawnFailed(io::Error::other("late"))));
        assert!(!arbiter.is_pending());

        match rx.try_recv() {
            Ok(TerminalEvent::Closed(_)) => {}
            other => panic!("expected close to win, got {other:?}"),
        }
    }

    #[test]
    fn settle_survives_dropped_receiver() {
        let (arbiter, rx) = Arbiter::new("test");
        drop(rx);
        assert!(arbiter.settle(timed_out()));
        assert!(!arbiter.settle(TerminalEvent::Closed(ProcessOutput::default())));
    }
}
