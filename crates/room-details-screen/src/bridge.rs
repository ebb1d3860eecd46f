//! Screen runtime that wires the room proxy, the reducer and the host.
//!
//! One reconcile task owns [`RoomDetailsState`]. Member pushes, view actions
//! and backend completions are queued as [`ScreenInput`] messages and applied
//! one at a time, so no two writers ever touch the view state.

use std::{future::Future, sync::Arc};

use room_details_core::{
    OutcomeReceiver, OutcomeSender, RoomDetailsViewAction, RoomDetailsViewState, RoomMember,
    RoomProxy, UserIndicatorController, outcome_channel,
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::state::{Completion, DEFAULT_LOADING_TITLE, RoomDetailsState, ScreenEffect};

/// Errors returned to callers of [`RoomDetailsScreen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScreenError {
    #[error("room details screen was dismissed")]
    Dismissed,
}

/// Runtime tuning for one screen instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenConfig {
    /// Title of the modal indicator shown while leaving.
    pub loading_title: String,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            loading_title: DEFAULT_LOADING_TITLE.to_owned(),
        }
    }
}

#[derive(Debug)]
enum ScreenInput {
    Action(RoomDetailsViewAction),
    MembersUpdated(Vec<RoomMember>),
    Completed(Completion),
}

/// Handle to a running room details screen.
///
/// Dropping the handle dismisses the screen.
pub struct RoomDetailsScreen {
    input_tx: mpsc::UnboundedSender<ScreenInput>,
    state_rx: watch::Receiver<RoomDetailsViewState>,
    outcomes: OutcomeSender,
    lifetime: CancellationToken,
    members_task: JoinHandle<()>,
}

impl RoomDetailsScreen {
    /// Start the reconcile and member workers and request a member refresh.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        proxy: Arc<dyn RoomProxy>,
        indicators: Arc<dyn UserIndicatorController>,
        config: ScreenConfig,
    ) -> (Self, OutcomeReceiver) {
        let info = proxy.info().clone();
        info!(
            room_id = %info.room_id,
            is_direct = info.is_direct,
            is_encrypted = info.is_encrypted,
            "spawning room details screen"
        );

        let state = RoomDetailsState::with_loading_title(info, config.loading_title);
        let (state_tx, state_rx) = watch::channel(state.snapshot());
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (outcomes, outcome_rx) = outcome_channel();
        let lifetime = CancellationToken::new();

        let members_task = tokio::spawn(forward_members(
            proxy.subscribe_members(),
            input_tx.clone(),
            lifetime.clone(),
        ));

        tokio::spawn(
            ReconcileLoop {
                state,
                proxy: Arc::clone(&proxy),
                indicators,
                outcomes: outcomes.clone(),
                state_tx,
                input_tx: input_tx.clone(),
                input_rx,
                lifetime: lifetime.clone(),
            }
            .run(),
        );

        tokio::spawn(async move {
            if let Err(err) = proxy.update_members().await {
                warn!(error = %err, "initial member refresh failed");
            }
        });

        (
            Self {
                input_tx,
                state_rx,
                outcomes,
                lifetime,
                members_task,
            },
            outcome_rx,
        )
    }

    /// Queue one user action.
    pub fn send(&self, action: RoomDetailsViewAction) -> Result<(), ScreenError> {
        if self.lifetime.is_cancelled() {
            return Err(ScreenError::Dismissed);
        }
        self.input_tx
            .send(ScreenInput::Action(action))
            .map_err(|_| ScreenError::Dismissed)
    }

    /// Bindable view state; a new value is published after every input.
    pub fn state(&self) -> watch::Receiver<RoomDetailsViewState> {
        self.state_rx.clone()
    }

    pub fn snapshot(&self) -> RoomDetailsViewState {
        self.state_rx.borrow().clone()
    }

    /// Tear the screen down.
    ///
    /// Backend calls already running are not aborted; their completions and
    /// any outcomes they would produce are discarded.
    pub fn dismiss(&self) {
        if !self.lifetime.is_cancelled() {
            debug!("dismissing room details screen");
        }
        self.lifetime.cancel();
        self.outcomes.close();
    }

    pub fn is_dismissed(&self) -> bool {
        self.lifetime.is_cancelled()
    }
}

impl Drop for RoomDetailsScreen {
    fn drop(&mut self) {
        // The reconcile task exits on its own so it can run teardown effects.
        self.dismiss();
        self.members_task.abort();
    }
}

async fn forward_members(
    mut members_rx: watch::Receiver<Vec<RoomMember>>,
    input_tx: mpsc::UnboundedSender<ScreenInput>,
    lifetime: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = lifetime.cancelled() => break,
            changed = members_rx.changed() => {
                if changed.is_err() {
                    debug!("member stream closed");
                    break;
                }
                let members = members_rx.borrow_and_update().clone();
                if input_tx.send(ScreenInput::MembersUpdated(members)).is_err() {
                    break;
                }
            }
        }
    }
    debug!("member forwarder exiting");
}

struct ReconcileLoop {
    state: RoomDetailsState,
    proxy: Arc<dyn RoomProxy>,
    indicators: Arc<dyn UserIndicatorController>,
    outcomes: OutcomeSender,
    state_tx: watch::Sender<RoomDetailsViewState>,
    input_tx: mpsc::UnboundedSender<ScreenInput>,
    input_rx: mpsc::UnboundedReceiver<ScreenInput>,
    lifetime: CancellationToken,
}

impl ReconcileLoop {
    async fn run(mut self) {
        debug!("room details reconcile loop started");
        loop {
            let input = tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => break,
                input = self.input_rx.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
            };
            trace!(?input, "reconciling screen input");

            let effects = match input {
                ScreenInput::Action(action) => self.state.handle_view_action(action),
                ScreenInput::MembersUpdated(members) => {
                    self.state.replace_members(members);
                    Vec::new()
                }
                ScreenInput::Completed(completion) => self.state.handle_completion(completion),
            };
            for effect in effects {
                self.apply(effect);
            }
            self.state_tx.send_replace(self.state.snapshot());
        }

        for effect in self.state.teardown() {
            self.apply(effect);
        }
        debug!("room details reconcile loop exiting");
    }

    fn apply(&self, effect: ScreenEffect) {
        match effect {
            ScreenEffect::LeaveRoom => self.spawn_backend_call(|proxy| async move {
                Completion::LeaveRoom(proxy.leave_room().await)
            }),
            ScreenEffect::IgnoreUser { user_id } => self.spawn_backend_call(|proxy| async move {
                let result = proxy.ignore_user(&user_id).await;
                Completion::IgnoreUser { user_id, result }
            }),
            ScreenEffect::UnignoreUser { user_id } => {
                self.spawn_backend_call(|proxy| async move {
                    let result = proxy.unignore_user(&user_id).await;
                    Completion::UnignoreUser { user_id, result }
                })
            }
            ScreenEffect::SubmitIndicator(indicator) => {
                self.indicators.submit_indicator(indicator);
            }
            ScreenEffect::RetractIndicator(id) => {
                self.indicators.retract_indicator(&id);
            }
            ScreenEffect::Notify(outcome) => {
                if let Err(err) = self.outcomes.emit(outcome) {
                    debug!(error = %err, "host no longer listening; outcome discarded");
                }
            }
        }
    }

    fn spawn_backend_call<F, Fut>(&self, call: F)
    where
        F: FnOnce(Arc<dyn RoomProxy>) -> Fut,
        Fut: Future<Output = Completion> + Send + 'static,
    {
        let pending = call(Arc::clone(&self.proxy));
        let input_tx = self.input_tx.clone();
        tokio::spawn(async move {
            let completion = pending.await;
            if input_tx.send(ScreenInput::Completed(completion)).is_err() {
                debug!("screen dismissed before backend call completed; completion discarded");
            }
        });
    }
}
