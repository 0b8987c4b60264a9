//! The orchestrator: decompose an utterance, fan tasks out to delegates,
//! aggregate their answers into one reply.
//!
//! Failures degrade gracefully. A turn only errors out when every
//! dispatched task failed; otherwise failed outcomes are recorded on the
//! turn and the composer is told about them.

use crate::error::{AgentError, AgentResult};
use crate::planner::{Assignment, Plan, Planner, TaskOutcome};
use crate::roster::{AgentDescriptor, AgentRoster};
use async_trait::async_trait;
use conclave_a2a::{A2aError, AgentClient, AgentResponse, TaskRequest};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(15);

/// Channel capacity for turn events; a turn never has more delegates
/// than this in practice.
const EVENT_CHANNEL_SIZE: usize = 32;

/// A dispatchable delegate. Production uses [`RemoteDelegate`]; tests
/// substitute in-process implementations.
#[async_trait]
pub trait Delegate: Send + Sync {
    fn descriptor(&self) -> AgentDescriptor;

    async fn dispatch(&self, request: TaskRequest) -> Result<AgentResponse, A2aError>;

    /// Best-effort cancellation of an in-flight task.
    async fn cancel(&self, task_id: &str);
}

/// A delegate reached over the agent-invocation protocol.
pub struct RemoteDelegate {
    descriptor: AgentDescriptor,
    client: AgentClient,
}

impl RemoteDelegate {
    pub fn new(descriptor: AgentDescriptor) -> AgentResult<Self> {
        let client = AgentClient::new(&descriptor.url)?;
        Ok(Self { descriptor, client })
    }
}

#[async_trait]
impl Delegate for RemoteDelegate {
    fn descriptor(&self) -> AgentDescriptor {
        self.descriptor.clone()
    }

    async fn dispatch(&self, request: TaskRequest) -> Result<AgentResponse, A2aError> {
        self.client.send_task(&request).await
    }

    async fn cancel(&self, task_id: &str) {
        if let Err(e) = self.client.cancel_task(task_id).await {
            debug!(agent = %self.descriptor.name, task_id = %task_id, error = %e, "Cancel failed");
        }
    }
}

/// Everything one utterance produced. Discarded after the turn; the
/// client carries conversation history.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub conversation_id: String,
    pub utterance: String,
    pub tasks: Vec<Assignment>,
    pub outcomes: Vec<TaskOutcome>,
    pub reply: String,
}

/// Progress events for a streaming turn.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// One delegate's answer landed (or failed).
    Delegate {
        agent: String,
        text: String,
        failed: bool,
    },
    /// The turn finished; carries the composed result.
    Completed { turn: ConversationTurn },
}

/// Decomposes utterances across a set of delegates.
pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    delegates: HashMap<String, Arc<dyn Delegate>>,
    roster: Arc<AgentRoster>,
    task_timeout: Duration,
}

impl Orchestrator {
    pub fn new(planner: Arc<dyn Planner>) -> Self {
        Self {
            planner,
            delegates: HashMap::new(),
            roster: Arc::new(AgentRoster::new(Vec::new())),
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    /// Add a delegate; its descriptor joins the published roster.
    pub fn with_delegate(mut self, delegate: Arc<dyn Delegate>) -> Self {
        let descriptor = delegate.descriptor();
        self.delegates.insert(descriptor.name.clone(), delegate);
        let descriptors: Vec<AgentDescriptor> =
            self.delegates.values().map(|d| d.descriptor()).collect();
        self.roster.replace(descriptors);
        self
    }

    /// Per-task timeout for delegate dispatch.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// The published roster, shared with whoever needs to inspect it.
    pub fn roster(&self) -> Arc<AgentRoster> {
        Arc::clone(&self.roster)
    }

    /// Serve one utterance to completion.
    pub async fn handle(
        &self,
        utterance: &str,
        conversation_id: &str,
    ) -> AgentResult<ConversationTurn> {
        let roster = self.roster.snapshot();
        let plan = self.planner.plan(utterance, &roster).await?;
        debug!(conversation_id, tasks = plan.assignments.len(), "Turn planned");

        if plan.is_empty() {
            let reply = self.planner.compose(utterance, &[]).await?;
            return Ok(ConversationTurn {
                conversation_id: conversation_id.to_string(),
                utterance: utterance.to_string(),
                tasks: Vec::new(),
                outcomes: Vec::new(),
                reply,
            });
        }

        // Track in-flight dispatches so dropping this future (client
        // disconnect) still cancels them promptly.
        let pending: PendingCancels = Arc::new(Mutex::new(Vec::new()));
        let _cancel_guard = CancelGuard {
            pending: Arc::clone(&pending),
        };

        let (dispatched, mut rx) = self.dispatch_all(&plan, conversation_id, Some(&pending))?;
        let mut outcomes = Vec::with_capacity(dispatched.order.len());
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        self.finish_turn(utterance, conversation_id, plan, dispatched, outcomes)
            .await
    }

    /// Serve one utterance, emitting an event as each delegate answers.
    ///
    /// Dropping the returned stream aborts the turn and sends best-effort
    /// cancels to delegates still in flight.
    pub fn handle_streaming(&self, utterance: &str, conversation_id: &str) -> TurnStream {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let pending = Arc::new(Mutex::new(Vec::new()));

        let planner = Arc::clone(&self.planner);
        let delegates = self.delegates.clone();
        let roster = self.roster.snapshot();
        let task_timeout = self.task_timeout;
        let utterance = utterance.to_string();
        let conversation_id = conversation_id.to_string();
        let driver_pending = Arc::clone(&pending);

        let driver = tokio::spawn(async move {
            let result = drive_turn(
                planner,
                delegates,
                roster,
                task_timeout,
                &utterance,
                &conversation_id,
                &event_tx,
                &driver_pending,
            )
            .await;

            match result {
                Ok(turn) => {
                    let _ = event_tx.send(Ok(TurnEvent::Completed { turn })).await;
                }
                Err(e) => {
                    let _ = event_tx.send(Err(e)).await;
                }
            }
        });

        TurnStream {
            rx: event_rx,
            driver,
            pending,
        }
    }

    /// Spawn one dispatch task per assignment. Outcomes arrive on the
    /// returned channel in completion order.
    fn dispatch_all(
        &self,
        plan: &Plan,
        conversation_id: &str,
        pending: Option<&PendingCancels>,
    ) -> AgentResult<(Dispatched, mpsc::Receiver<TaskOutcome>)> {
        dispatch_assignments(
            &self.delegates,
            self.task_timeout,
            plan,
            conversation_id,
            pending,
        )
    }

    async fn finish_turn(
        &self,
        utterance: &str,
        conversation_id: &str,
        plan: Plan,
        dispatched: Dispatched,
        outcomes: Vec<TaskOutcome>,
    ) -> AgentResult<ConversationTurn> {
        let outcomes = dispatched.in_plan_order(outcomes);

        if !outcomes.is_empty() && outcomes.iter().all(TaskOutcome::is_failure) {
            warn!(conversation_id, "Every delegate failed");
            return Err(AgentError::AllDelegatesFailed);
        }

        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        if failed > 0 {
            info!(conversation_id, failed, total = outcomes.len(), "Turn degraded");
        }

        let reply = self.planner.compose(utterance, &outcomes).await?;
        Ok(ConversationTurn {
            conversation_id: conversation_id.to_string(),
            utterance: utterance.to_string(),
            tasks: plan.assignments,
            outcomes,
            reply,
        })
    }
}

type PendingCancels = Arc<Mutex<Vec<(Arc<dyn Delegate>, String)>>>;

/// Fires best-effort cancels for dispatches still pending when a
/// complete-mode turn future is dropped. A finished turn has an empty
/// pending list, so the guard is a no-op on the normal path.
struct CancelGuard {
    pending: PendingCancels,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        cancel_pending(&self.pending);
    }
}

/// Drain the pending list and cancel each entry on the current runtime.
fn cancel_pending(pending: &PendingCancels) {
    let leftover = {
        let mut guard = match pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *guard)
    };

    if leftover.is_empty() {
        return;
    }
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            for (delegate, task_id) in leftover {
                delegate.cancel(&task_id).await;
            }
        });
    }
}

/// Task-id ordering for deterministic aggregation regardless of arrival
/// order.
struct Dispatched {
    order: Vec<String>,
}

impl Dispatched {
    fn in_plan_order(&self, mut outcomes: Vec<TaskOutcome>) -> Vec<TaskOutcome> {
        let index: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        outcomes.sort_by_key(|o| index.get(o.task_id()).copied().unwrap_or(usize::MAX));
        outcomes
    }
}

fn dispatch_assignments(
    delegates: &HashMap<String, Arc<dyn Delegate>>,
    task_timeout: Duration,
    plan: &Plan,
    conversation_id: &str,
    pending: Option<&PendingCancels>,
) -> AgentResult<(Dispatched, mpsc::Receiver<TaskOutcome>)> {
    let (tx, rx) = mpsc::channel(plan.assignments.len().max(1));
    let mut order = Vec::with_capacity(plan.assignments.len());

    for assignment in &plan.assignments {
        let delegate = delegates
            .get(&assignment.agent)
            .cloned()
            .ok_or_else(|| AgentError::unknown_delegate(&assignment.agent))?;

        let request = TaskRequest::new(&assignment.instruction, conversation_id);
        order.push(request.task_id.clone());

        if let Some(pending) = pending {
            track_pending(pending, Arc::clone(&delegate), request.task_id.clone());
        }

        let tx = tx.clone();
        let agent = assignment.agent.clone();
        let pending = pending.cloned();
        tokio::spawn(async move {
            let task_id = request.task_id.clone();
            let outcome = match tokio::time::timeout(task_timeout, delegate.dispatch(request)).await
            {
                Ok(Ok(response)) if response.is_failed() => TaskOutcome::failed(
                    &task_id,
                    &agent,
                    AgentError::DelegateFailed {
                        agent: agent.clone(),
                        message: response.text,
                    },
                ),
                Ok(Ok(response)) => TaskOutcome::completed(&task_id, &agent, response),
                Ok(Err(e)) => {
                    warn!(agent = %agent, task_id = %task_id, error = %e, "Delegate dispatch failed");
                    let error = if e.is_retryable() {
                        AgentError::DelegateUnreachable {
                            agent: agent.clone(),
                            message: e.to_string(),
                        }
                    } else {
                        AgentError::Protocol(e)
                    };
                    TaskOutcome::failed(&task_id, &agent, error)
                }
                Err(_) => {
                    warn!(agent = %agent, task_id = %task_id, timeout_ms = task_timeout.as_millis() as u64, "Delegate timed out");
                    delegate.cancel(&task_id).await;
                    TaskOutcome::failed(
                        &task_id,
                        &agent,
                        AgentError::DelegateTimeout {
                            agent: agent.clone(),
                            timeout_ms: task_timeout.as_millis() as u64,
                        },
                    )
                }
            };

            if let Some(pending) = &pending {
                untrack_pending(pending, &task_id);
            }
            let _ = tx.send(outcome).await;
        });
    }

    Ok((Dispatched { order }, rx))
}

fn track_pending(pending: &PendingCancels, delegate: Arc<dyn Delegate>, task_id: String) {
    match pending.lock() {
        Ok(mut list) => list.push((delegate, task_id)),
        Err(poisoned) => poisoned.into_inner().push((delegate, task_id)),
    }
}

fn untrack_pending(pending: &PendingCancels, task_id: &str) {
    let mut guard = match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.retain(|(_, id)| id != task_id);
}

#[allow(clippy::too_many_arguments)]
async fn drive_turn(
    planner: Arc<dyn Planner>,
    delegates: HashMap<String, Arc<dyn Delegate>>,
    roster: Arc<[AgentDescriptor]>,
    task_timeout: Duration,
    utterance: &str,
    conversation_id: &str,
    event_tx: &mpsc::Sender<AgentResult<TurnEvent>>,
    pending: &PendingCancels,
) -> AgentResult<ConversationTurn> {
    let plan = planner.plan(utterance, &roster).await?;

    if plan.is_empty() {
        let reply = planner.compose(utterance, &[]).await?;
        return Ok(ConversationTurn {
            conversation_id: conversation_id.to_string(),
            utterance: utterance.to_string(),
            tasks: Vec::new(),
            outcomes: Vec::new(),
            reply,
        });
    }

    let (dispatched, mut rx) =
        dispatch_assignments(&delegates, task_timeout, &plan, conversation_id, Some(pending))?;

    let mut outcomes = Vec::with_capacity(dispatched.order.len());
    while let Some(outcome) = rx.recv().await {
        let event = match &outcome {
            TaskOutcome::Completed { agent, response, .. } => TurnEvent::Delegate {
                agent: agent.clone(),
                text: response.text.clone(),
                failed: false,
            },
            TaskOutcome::Failed { agent, error, .. } => TurnEvent::Delegate {
                agent: agent.clone(),
                text: error.to_string(),
                failed: true,
            },
        };
        let _ = event_tx.send(Ok(event)).await;
        outcomes.push(outcome);
    }

    let outcomes = dispatched.in_plan_order(outcomes);
    if !outcomes.is_empty() && outcomes.iter().all(TaskOutcome::is_failure) {
        return Err(AgentError::AllDelegatesFailed);
    }

    let reply = planner.compose(utterance, &outcomes).await?;
    Ok(ConversationTurn {
        conversation_id: conversation_id.to_string(),
        utterance: utterance.to_string(),
        tasks: plan.assignments,
        outcomes,
        reply,
    })
}

/// A streaming turn. Dropping it aborts the driver and fires best-effort
/// cancels for delegates still in flight.
pub struct TurnStream {
    rx: mpsc::Receiver<AgentResult<TurnEvent>>,
    driver: JoinHandle<()>,
    pending: PendingCancels,
}

impl Stream for TurnStream {
    type Item = AgentResult<TurnEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for TurnStream {
    fn drop(&mut self) {
        self.driver.abort();
        cancel_pending(&self.pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ScriptedPlanner;
    use conclave_a2a::ResponseStatus;

    struct StaticDelegate {
        name: String,
        text: String,
    }

    #[async_trait]
    impl Delegate for StaticDelegate {
        fn descriptor(&self) -> AgentDescriptor {
            AgentDescriptor::new(&self.name, "http://localhost")
        }

        async fn dispatch(&self, request: TaskRequest) -> Result<AgentResponse, A2aError> {
            Ok(AgentResponse::ok(request.task_id, &self.text))
        }

        async fn cancel(&self, _task_id: &str) {}
    }

    #[tokio::test]
    async fn test_single_delegate_turn() {
        let planner = ScriptedPlanner::new([Plan::new(vec![Assignment::new("echo", "say hi")])]);
        let orchestrator = Orchestrator::new(Arc::new(planner)).with_delegate(Arc::new(
            StaticDelegate {
                name: "echo".to_string(),
                text: "hi".to_string(),
            },
        ));

        let turn = orchestrator.handle("say hi", "c-1").await.unwrap();
        assert_eq!(turn.outcomes.len(), 1);
        assert_eq!(turn.reply, "hi");
        match &turn.outcomes[0] {
            TaskOutcome::Completed { response, .. } => {
                assert_eq!(response.status, ResponseStatus::Ok)
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }

    struct SleepingDelegate {
        name: String,
    }

    #[async_trait]
    impl Delegate for SleepingDelegate {
        fn descriptor(&self) -> AgentDescriptor {
            AgentDescriptor::new(&self.name, "http://localhost")
        }

        async fn dispatch(&self, request: TaskRequest) -> Result<AgentResponse, A2aError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(AgentResponse::ok(request.task_id, "late"))
        }

        async fn cancel(&self, _task_id: &str) {}
    }

    struct UnreachableDelegate {
        name: String,
    }

    #[async_trait]
    impl Delegate for UnreachableDelegate {
        fn descriptor(&self) -> AgentDescriptor {
            AgentDescriptor::new(&self.name, "http://localhost")
        }

        async fn dispatch(&self, _request: TaskRequest) -> Result<AgentResponse, A2aError> {
            Err(A2aError::unreachable("connection refused"))
        }

        async fn cancel(&self, _task_id: &str) {}
    }

    #[tokio::test]
    async fn test_failure_outcomes_carry_typed_errors() {
        let planner = ScriptedPlanner::new([Plan::new(vec![
            Assignment::new("sleepy", "wait"),
            Assignment::new("offline", "ping"),
            Assignment::new("echo", "say hi"),
        ])]);
        let orchestrator = Orchestrator::new(Arc::new(planner))
            .with_delegate(Arc::new(SleepingDelegate {
                name: "sleepy".to_string(),
            }))
            .with_delegate(Arc::new(UnreachableDelegate {
                name: "offline".to_string(),
            }))
            .with_delegate(Arc::new(StaticDelegate {
                name: "echo".to_string(),
                text: "hi".to_string(),
            }))
            .with_task_timeout(Duration::from_millis(50));

        let turn = orchestrator.handle("mixed", "c-2").await.unwrap();
        assert_eq!(turn.outcomes.len(), 3);
        assert!(matches!(
            turn.outcomes[0].error(),
            Some(AgentError::DelegateTimeout { timeout_ms: 50, .. })
        ));
        assert!(matches!(
            turn.outcomes[1].error(),
            Some(AgentError::DelegateUnreachable { .. })
        ));
        assert!(turn.outcomes[2].error().is_none());
    }

    #[tokio::test]
    async fn test_unknown_delegate_in_plan() {
        let planner = ScriptedPlanner::new([Plan::new(vec![Assignment::new("ghost", "boo")])]);
        let orchestrator = Orchestrator::new(Arc::new(planner));

        let err = orchestrator.handle("boo", "c-1").await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownDelegate { .. }));
    }
}
