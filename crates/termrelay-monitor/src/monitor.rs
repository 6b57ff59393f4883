//! Monitoring loop
//!
//! One loop per execution key: capture a baseline, submit the input, then poll
//! the session, diff each capture against the previous one, forward new
//! content, and watch for the program to return to its prompt. Every cycle
//! re-checks that the session exists and re-captures it from scratch.

use serde_json::json;
use std::sync::Arc;
use termrelay_config::RelayConfig;
use termrelay_logging::RelayLogger;
use termrelay_terminal::{BackendError, ScreenNormalizer, ScreenSnapshot, SessionBackend};
use termrelay_types::{
    Destination, ExecutionKey, MessageId, MonitorEnd, MonitorOutcome, SessionHandle,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::completion::{idle_policy_from_config, CompletionDetector, CompletionState, IdlePolicy};
use crate::diff::{compute_delta, Delta};
use crate::dispatcher::OutputDispatcher;
use crate::error::MonitorError;
use crate::scheduler::PollScheduler;
use crate::status::StatusLine;
use crate::store::{ExecutionStore, ExecutionTicket};
use crate::transport::ChatTransport;

/// State of one in-flight execution
struct Execution {
    ticket: ExecutionTicket,
    session: SessionHandle,
    destination: Destination,
    started: Instant,
    status_message: Option<MessageId>,
    last_status_update: Instant,
    sent: usize,
    last_content: String,
}

impl Execution {
    fn scope(&self) -> &str {
        self.ticket.key().as_str()
    }

    fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

enum LoopExit {
    Completed(String),
    Cancelled,
    SessionLost,
}

/// Drives terminal sessions and relays their output to a chat transport.
///
/// Cloning is cheap and clones share the execution store, so a clone can be
/// moved into a spawned task while the original keeps the ability to cancel.
#[derive(Clone)]
pub struct Monitor {
    backend: Arc<dyn SessionBackend>,
    store: ExecutionStore,
    normalizer: ScreenNormalizer,
    idle_policy: Arc<dyn IdlePolicy>,
    scheduler: PollScheduler,
    dispatcher: OutputDispatcher,
    stability_window: usize,
    logger: Arc<RelayLogger>,
}

impl Monitor {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        transport: Arc<dyn ChatTransport>,
        config: &RelayConfig,
        logger: Arc<RelayLogger>,
    ) -> Result<Self, MonitorError> {
        config
            .validate()
            .map_err(|e| MonitorError::Config(e.to_string()))?;

        let normalizer = ScreenNormalizer::new(&config.decoration);
        let idle_policy = idle_policy_from_config(&config.completion, &normalizer);

        Ok(Self {
            backend,
            store: ExecutionStore::new(),
            idle_policy,
            scheduler: PollScheduler::new(config.schedule.clone()),
            dispatcher: OutputDispatcher::new(transport, config.dispatch.clone(), logger.clone()),
            stability_window: config.completion.stability_window,
            normalizer,
            logger,
        })
    }

    /// Share an existing execution store
    pub fn with_store(mut self, store: ExecutionStore) -> Self {
        self.store = store;
        self
    }

    /// Replace the configured idle detection rule
    pub fn with_idle_policy(mut self, policy: Arc<dyn IdlePolicy>) -> Self {
        self.idle_policy = policy;
        self
    }

    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    pub fn idle_policy_name(&self) -> &str {
        self.idle_policy.name()
    }

    /// Ask the execution for `key` to stop at its next check
    pub fn cancel(&self, key: &ExecutionKey) -> bool {
        let cancelled = self.store.cancel(key);
        if cancelled {
            self.logger.info(key.as_str(), "cancellation requested");
        }
        cancelled
    }

    /// Run [`Monitor::monitor`] on its own task
    pub fn spawn(
        &self,
        session: SessionHandle,
        input: String,
        destination: Destination,
    ) -> JoinHandle<Result<MonitorOutcome, MonitorError>> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor.monitor(session, &input, destination).await })
    }

    /// Submit `input` to `session` and relay output to `destination` until the
    /// program is idle again, the session disappears, or the execution is
    /// cancelled. A running execution for the same destination and session is
    /// stopped first.
    pub async fn monitor(
        &self,
        session: SessionHandle,
        input: &str,
        destination: Destination,
    ) -> Result<MonitorOutcome, MonitorError> {
        let key = ExecutionKey::new(&destination, &session);
        if self.store.is_active(&key) {
            self.logger.info(
                key.as_str(),
                &format!("session {} is already monitored, stopping the previous execution", session),
            );
        }

        let ticket = self.store.begin(key, self.scheduler.takeover_grace()).await;
        let started = Instant::now();
        let status_message = self
            .dispatcher
            .post_status(
                &destination,
                &StatusLine::Started {
                    interval: self.scheduler.initial_interval(),
                },
            )
            .await;

        let mut run = Execution {
            ticket,
            session,
            destination,
            started,
            status_message,
            last_status_update: started,
            sent: 0,
            last_content: String::new(),
        };

        self.logger.info(
            run.scope(),
            &format!(
                "monitoring {} via {} ({} idle rule)",
                run.session,
                self.backend.backend_name(),
                self.idle_policy.name()
            ),
        );
        self.logger.event(
            run.scope(),
            "start",
            json!({
                "session": run.session.as_str(),
                "input_chars": input.chars().count(),
                "generation": run.ticket.generation(),
            }),
        );

        let result = self.drive(&mut run, input).await;
        let duration_secs = run.elapsed_secs();

        match result {
            Ok(exit) => {
                let (end, final_output, status) = match exit {
                    LoopExit::Completed(output) => (
                        MonitorEnd::Completed,
                        output,
                        StatusLine::Completed {
                            elapsed_secs: duration_secs,
                            sent: run.sent,
                        },
                    ),
                    LoopExit::Cancelled => (
                        MonitorEnd::Cancelled,
                        std::mem::take(&mut run.last_content),
                        StatusLine::Stopped {
                            elapsed_secs: duration_secs,
                            sent: run.sent,
                        },
                    ),
                    LoopExit::SessionLost => {
                        self.dispatcher
                            .post_notice(
                                &run.destination,
                                &format!("⚠️ tmux session {} has ended", run.session),
                            )
                            .await;
                        (
                            MonitorEnd::SessionLost,
                            std::mem::take(&mut run.last_content),
                            StatusLine::SessionEnded {
                                elapsed_secs: duration_secs,
                            },
                        )
                    }
                };

                self.dispatcher
                    .update_status(&run.destination, run.status_message.as_ref(), &status)
                    .await;

                self.logger.info(
                    run.scope(),
                    &format!("execution {} after {}s, {} message(s) sent", end, duration_secs, run.sent),
                );
                self.logger.event(
                    run.scope(),
                    "end",
                    json!({
                        "end": end.to_string(),
                        "duration_secs": duration_secs,
                        "sent": run.sent,
                        "final_chars": final_output.chars().count(),
                    }),
                );

                Ok(MonitorOutcome {
                    final_output,
                    duration_secs,
                    end,
                    sent_messages: run.sent,
                })
            }
            Err(e) => {
                self.logger.error(run.scope(), &format!("monitoring failed: {}", e));
                self.dispatcher
                    .update_status(
                        &run.destination,
                        run.status_message.as_ref(),
                        &StatusLine::Failed {
                            message: e.to_string(),
                        },
                    )
                    .await;
                self.dispatcher
                    .post_notice(&run.destination, &format!("❌ Monitoring failed: {}", e))
                    .await;
                self.logger.event(
                    run.scope(),
                    "error",
                    json!({ "duration_secs": duration_secs, "sent": run.sent }),
                );
                Err(MonitorError::Backend(e))
            }
        }
    }

    async fn drive(&self, run: &mut Execution, input: &str) -> Result<LoopExit, BackendError> {
        // The baseline is the screen before the input is typed, so a reply that
        // lands before the first poll still shows up as new content
        let baseline = match self.poll(run).await? {
            Some(snapshot) => snapshot,
            None => return Ok(LoopExit::SessionLost),
        };

        match self.backend.send_input(&run.session, input).await {
            Ok(()) => {}
            Err(e) if e.is_session_gone() => return Ok(LoopExit::SessionLost),
            Err(e) => return Err(e),
        }

        let mut detector = CompletionDetector::new(self.stability_window);
        let mut previous = Some(baseline);

        loop {
            if run.ticket.is_cancelled() {
                return Ok(LoopExit::Cancelled);
            }

            let interval = self.scheduler.interval_for(run.started.elapsed());
            if !self.scheduler.wait(interval, run.ticket.cancel_token()).await {
                return Ok(LoopExit::Cancelled);
            }

            let snapshot = match self.poll(run).await? {
                Some(snapshot) => snapshot,
                None => return Ok(LoopExit::SessionLost),
            };

            let delta = compute_delta(
                previous.as_ref().map(|s| &s.normalized),
                &snapshot.normalized,
                &self.normalizer,
            );
            self.deliver(run, delta).await;

            let idle = self.idle_policy.is_idle(&snapshot.normalized);
            let before = detector.state();
            let state = detector.observe_idle(idle);

            self.logger.event(
                run.scope(),
                "poll",
                json!({
                    "raw_chars": snapshot.raw.len(),
                    "anchor_lines": snapshot.normalized.anchor_lines().len(),
                    "interval_ms": interval.as_millis() as u64,
                    "idle": idle,
                    "state": state.to_string(),
                }),
            );
            if state != before {
                self.logger
                    .debug(run.scope(), &format!("completion state {} -> {}", before, state));
            }

            previous = Some(snapshot);
            self.refresh_status(run).await;

            if state == CompletionState::Stabilizing {
                break;
            }
        }

        let final_snapshot = loop {
            if run.ticket.is_cancelled() {
                return Ok(LoopExit::Cancelled);
            }
            if !self
                .scheduler
                .wait(self.scheduler.stabilize_interval(), run.ticket.cancel_token())
                .await
            {
                return Ok(LoopExit::Cancelled);
            }

            let snapshot = match self.poll(run).await? {
                Some(snapshot) => snapshot,
                None => return Ok(LoopExit::SessionLost),
            };

            let state = detector.observe_capture(&snapshot.raw);
            self.logger.event(
                run.scope(),
                "stabilize",
                json!({
                    "raw_chars": snapshot.raw.len(),
                    "stable_count": detector.stable_count(),
                    "state": state.to_string(),
                }),
            );
            if state == CompletionState::Done {
                break snapshot;
            }
            self.refresh_status(run).await;
        };

        // Flush whatever appeared since the last regular poll
        let delta = compute_delta(
            previous.as_ref().map(|s| &s.normalized),
            &final_snapshot.normalized,
            &self.normalizer,
        );
        self.deliver(run, delta).await;

        Ok(LoopExit::Completed(final_snapshot.normalized.content()))
    }

    /// Re-check the session and capture it. `None` means the session is gone.
    async fn poll(&self, run: &mut Execution) -> Result<Option<ScreenSnapshot>, BackendError> {
        if !self.backend.session_exists(&run.session).await? {
            self.logger
                .info(run.scope(), &format!("tmux session {} no longer exists", run.session));
            return Ok(None);
        }

        let raw = match self.backend.capture_output(&run.session).await {
            Ok(raw) => raw,
            Err(e) if e.is_session_gone() => {
                self.logger
                    .info(run.scope(), &format!("tmux session {} vanished during capture", run.session));
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let snapshot = self.normalizer.snapshot(raw);
        run.last_content = snapshot.normalized.content();
        Ok(Some(snapshot))
    }

    async fn deliver(&self, run: &mut Execution, delta: Delta) {
        let kind = delta.kind();
        let text = match delta.into_text() {
            Some(text) => text,
            None => return,
        };

        let sent = self
            .dispatcher
            .dispatch(&run.ticket, &run.destination, &text)
            .await;
        run.sent += sent;

        self.logger.debug(
            run.scope(),
            &format!("{} delta of {} chars, {} message(s) sent", kind, text.chars().count(), sent),
        );
        self.logger.event(
            run.scope(),
            "delta",
            json!({ "kind": kind, "chars": text.chars().count(), "sent": sent }),
        );
    }

    async fn refresh_status(&self, run: &mut Execution) {
        if run.last_status_update.elapsed() < self.scheduler.status_update_interval() {
            return;
        }
        run.last_status_update = Instant::now();

        let status = StatusLine::Running {
            elapsed_secs: run.elapsed_secs(),
            sent: run.sent,
        };
        self.dispatcher
            .update_status(&run.destination, run.status_message.as_ref(), &status)
            .await;
    }
}
