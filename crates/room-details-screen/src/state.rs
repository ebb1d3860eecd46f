//! Room details reducer.
//!
//! Pure state machine: every input is applied synchronously and returns the
//! side effects the runtime has to perform.

use room_details_core::{
    AlertInfo, IgnoreUserAction, IndicatorKind, LeaveRoomAlertState, ProxyError,
    RoomDetailsOutcome, RoomDetailsViewAction, RoomDetailsViewState, RoomInfo, RoomMember,
    RoomMemberDetails, UserIndicator,
};
use tracing::{debug, trace, warn};

/// Identifier of the modal indicator shown while leaving.
pub const LEAVE_ROOM_LOADING_ID: &str = "LeaveRoomLoading";
/// Default title of the leave indicator.
pub const DEFAULT_LOADING_TITLE: &str = "Loading…";

/// Side effects requested by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEffect {
    /// Call `RoomProxy::leave_room`.
    LeaveRoom,
    /// Call `RoomProxy::ignore_user`.
    IgnoreUser { user_id: String },
    /// Call `RoomProxy::unignore_user`.
    UnignoreUser { user_id: String },
    /// Show an indicator through the controller.
    SubmitIndicator(UserIndicator),
    /// Hide the indicator with this id.
    RetractIndicator(String),
    /// Deliver an outcome to the host.
    Notify(RoomDetailsOutcome),
}

/// Backend call result posted back to the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    LeaveRoom(Result<(), ProxyError>),
    IgnoreUser {
        user_id: String,
        result: Result<(), ProxyError>,
    },
    UnignoreUser {
        user_id: String,
        result: Result<(), ProxyError>,
    },
}

/// Per-action in-flight tokens.
#[derive(Debug, Default, Clone, Copy)]
struct InFlight {
    leave: bool,
    ignore: bool,
}

/// Reducer state owned by the screen runtime.
#[derive(Debug, Clone)]
pub struct RoomDetailsState {
    info: RoomInfo,
    loading_title: String,
    members: Vec<RoomMember>,
    dm_recipient: Option<RoomMember>,
    view: RoomDetailsViewState,
    in_flight: InFlight,
}

impl RoomDetailsState {
    pub fn new(info: RoomInfo) -> Self {
        Self::with_loading_title(info, DEFAULT_LOADING_TITLE)
    }

    pub fn with_loading_title(info: RoomInfo, loading_title: impl Into<String>) -> Self {
        let view = RoomDetailsViewState::from_room(&info);
        Self {
            info,
            loading_title: loading_title.into(),
            members: Vec::new(),
            dm_recipient: None,
            view,
            in_flight: InFlight::default(),
        }
    }

    /// Current immutable snapshot for rendering.
    pub fn snapshot(&self) -> RoomDetailsViewState {
        self.view.clone()
    }

    pub fn members(&self) -> &[RoomMember] {
        &self.members
    }

    pub fn dm_recipient(&self) -> Option<&RoomMember> {
        self.dm_recipient.as_ref()
    }

    /// Replace the member list and recompute the direct-message recipient.
    pub fn replace_members(&mut self, members: Vec<RoomMember>) {
        self.view.members = members.iter().map(RoomMemberDetails::from).collect();
        self.dm_recipient = direct_message_recipient(&self.info, &members);
        self.view.dm_recipient = self.dm_recipient.as_ref().map(RoomMemberDetails::from);
        self.members = members;
        debug!(
            room_id = %self.info.room_id,
            member_count = self.members.len(),
            has_dm_recipient = self.dm_recipient.is_some(),
            "member list replaced"
        );
    }

    /// Feed one user action into the reducer.
    pub fn handle_view_action(&mut self, action: RoomDetailsViewAction) -> Vec<ScreenEffect> {
        trace!(?action, "room details view action");
        match action {
            RoomDetailsViewAction::TapPeople => {
                vec![ScreenEffect::Notify(
                    RoomDetailsOutcome::RequestMemberDetailsPresentation {
                        members: self.members.clone(),
                    },
                )]
            }
            RoomDetailsViewAction::TapLeave => {
                let alert = if self.members.len() <= 1 {
                    LeaveRoomAlertState::Empty
                } else if self.info.is_public {
                    LeaveRoomAlertState::Public
                } else {
                    LeaveRoomAlertState::Private
                };
                self.view.bindings.leave_room_alert = Some(alert);
                Vec::new()
            }
            RoomDetailsViewAction::ConfirmLeave => self.begin_leave(),
            RoomDetailsViewAction::TapIgnore => {
                self.view.bindings.ignore_user_alert = Some(IgnoreUserAction::Ignore);
                Vec::new()
            }
            RoomDetailsViewAction::TapUnignore => {
                self.view.bindings.ignore_user_alert = Some(IgnoreUserAction::Unignore);
                Vec::new()
            }
            RoomDetailsViewAction::IgnoreConfirmed => {
                self.begin_ignore_toggle(IgnoreUserAction::Ignore)
            }
            RoomDetailsViewAction::UnignoreConfirmed => {
                self.begin_ignore_toggle(IgnoreUserAction::Unignore)
            }
            RoomDetailsViewAction::DismissLeaveRoomAlert => {
                self.view.bindings.leave_room_alert = None;
                Vec::new()
            }
            RoomDetailsViewAction::DismissIgnoreUserAlert => {
                self.view.bindings.ignore_user_alert = None;
                Vec::new()
            }
            RoomDetailsViewAction::DismissAlert => {
                self.view.bindings.alert_info = None;
                Vec::new()
            }
        }
    }

    /// Reconcile a finished backend call.
    pub fn handle_completion(&mut self, completion: Completion) -> Vec<ScreenEffect> {
        match completion {
            Completion::LeaveRoom(result) => {
                self.in_flight.leave = false;
                let mut effects = vec![ScreenEffect::RetractIndicator(
                    LEAVE_ROOM_LOADING_ID.to_owned(),
                )];
                match result {
                    Ok(()) => {
                        debug!(room_id = %self.info.room_id, "left room");
                        effects.push(ScreenEffect::Notify(RoomDetailsOutcome::LeftRoom));
                    }
                    Err(err) => {
                        warn!(room_id = %self.info.room_id, error = %err, "leaving room failed");
                        self.view.bindings.alert_info = Some(AlertInfo::unknown());
                    }
                }
                effects
            }
            Completion::IgnoreUser { user_id, result } => {
                self.finish_ignore_toggle(&user_id, result, true);
                Vec::new()
            }
            Completion::UnignoreUser { user_id, result } => {
                self.finish_ignore_toggle(&user_id, result, false);
                Vec::new()
            }
        }
    }

    /// Effects to run when the screen goes away with work still in flight.
    ///
    /// Only indicator cleanup survives teardown; outcomes would be discarded.
    pub fn teardown(&mut self) -> Vec<ScreenEffect> {
        let mut effects = Vec::new();
        if self.in_flight.leave {
            self.in_flight.leave = false;
            effects.push(ScreenEffect::RetractIndicator(
                LEAVE_ROOM_LOADING_ID.to_owned(),
            ));
        }
        self.in_flight.ignore = false;
        self.view.is_processing_ignore_request = false;
        effects
    }

    fn begin_leave(&mut self) -> Vec<ScreenEffect> {
        self.view.bindings.leave_room_alert = None;
        if self.in_flight.leave {
            warn!(room_id = %self.info.room_id, "leave already in flight; rejecting request");
            return Vec::new();
        }
        self.in_flight.leave = true;
        vec![
            ScreenEffect::SubmitIndicator(UserIndicator {
                id: LEAVE_ROOM_LOADING_ID.to_owned(),
                kind: IndicatorKind::Modal,
                title: self.loading_title.clone(),
                persistent: true,
            }),
            ScreenEffect::LeaveRoom,
        ]
    }

    fn begin_ignore_toggle(&mut self, action: IgnoreUserAction) -> Vec<ScreenEffect> {
        self.view.bindings.ignore_user_alert = None;
        if self.in_flight.ignore {
            warn!(?action, "ignore request already in flight; rejecting request");
            return Vec::new();
        }

        let Some(recipient) = &self.dm_recipient else {
            warn!(?action, room_id = %self.info.room_id, "no direct-message recipient to act on");
            self.view.bindings.alert_info = Some(AlertInfo::unknown());
            return Vec::new();
        };

        let user_id = recipient.user_id.clone();
        self.in_flight.ignore = true;
        self.view.is_processing_ignore_request = true;
        match action {
            IgnoreUserAction::Ignore => vec![ScreenEffect::IgnoreUser { user_id }],
            IgnoreUserAction::Unignore => vec![ScreenEffect::UnignoreUser { user_id }],
        }
    }

    fn finish_ignore_toggle(
        &mut self,
        user_id: &str,
        result: Result<(), ProxyError>,
        ignored: bool,
    ) {
        self.in_flight.ignore = false;
        self.view.is_processing_ignore_request = false;

        if let Err(err) = result {
            warn!(%user_id, ignored, error = %err, "ignore toggle failed");
            self.view.bindings.alert_info = Some(AlertInfo::unknown());
            return;
        }

        match self.view.dm_recipient.as_mut() {
            Some(recipient) if recipient.id == user_id => {
                recipient.is_ignored = ignored;
            }
            _ => {
                debug!(%user_id, "recipient changed while ignore toggle was in flight");
            }
        }
    }
}

/// Counterpart of a two-person encrypted direct room, if any.
pub fn direct_message_recipient(info: &RoomInfo, members: &[RoomMember]) -> Option<RoomMember> {
    if info.is_direct && info.is_encrypted && members.len() == 2 {
        members
            .iter()
            .find(|member| !member.is_account_owner)
            .cloned()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use room_details_core::{AlertId, ProxyErrorCategory};

    use super::*;

    fn dm_info() -> RoomInfo {
        RoomInfo {
            room_id: "!dm:example.org".to_owned(),
            display_name: Some("Bob".to_owned()),
            is_encrypted: true,
            is_direct: true,
            ..RoomInfo::default()
        }
    }

    fn alice() -> RoomMember {
        RoomMember::new("@alice:example.org")
            .with_display_name("Alice")
            .account_owner()
    }

    fn bob() -> RoomMember {
        RoomMember::new("@bob:example.org").with_display_name("Bob")
    }

    fn carol() -> RoomMember {
        RoomMember::new("@carol:example.org")
    }

    fn network_error() -> ProxyError {
        ProxyError::new(ProxyErrorCategory::Network, "offline", "no route to host")
    }

    fn dm_state() -> RoomDetailsState {
        let mut state = RoomDetailsState::new(dm_info());
        state.replace_members(vec![alice(), bob()]);
        state
    }

    #[test]
    fn two_member_encrypted_dm_selects_non_owner() {
        let state = dm_state();

        assert_eq!(state.dm_recipient(), Some(&bob()));
        let snapshot = state.snapshot();
        assert_eq!(
            snapshot.dm_recipient.map(|details| details.id),
            Some("@bob:example.org".to_owned())
        );
        assert_eq!(snapshot.members.len(), 2);
    }

    #[test]
    fn growing_to_three_members_clears_recipient() {
        let mut state = dm_state();
        state.replace_members(vec![alice(), bob(), carol()]);

        assert_eq!(state.dm_recipient(), None);
        assert_eq!(state.snapshot().dm_recipient, None);
        assert_eq!(state.snapshot().members.len(), 3);
    }

    #[test]
    fn recipient_requires_direct_and_encrypted() {
        for (is_direct, is_encrypted) in [(false, true), (true, false), (false, false)] {
            let info = RoomInfo {
                is_direct,
                is_encrypted,
                ..dm_info()
            };
            assert_eq!(direct_message_recipient(&info, &[alice(), bob()]), None);
        }
    }

    #[test]
    fn empty_direct_room_has_no_recipient() {
        let mut state = RoomDetailsState::new(dm_info());
        state.replace_members(Vec::new());
        assert_eq!(state.dm_recipient(), None);
    }

    #[test]
    fn tap_people_forwards_current_members() {
        let mut state = dm_state();
        let effects = state.handle_view_action(RoomDetailsViewAction::TapPeople);
        assert_eq!(
            effects,
            vec![ScreenEffect::Notify(
                RoomDetailsOutcome::RequestMemberDetailsPresentation {
                    members: vec![alice(), bob()],
                }
            )]
        );
    }

    #[test]
    fn tap_leave_with_single_member_shows_empty_prompt_only() {
        let mut state = RoomDetailsState::new(dm_info());
        state.replace_members(vec![alice()]);

        let effects = state.handle_view_action(RoomDetailsViewAction::TapLeave);
        assert!(effects.is_empty());
        assert_eq!(
            state.snapshot().bindings.leave_room_alert,
            Some(LeaveRoomAlertState::Empty)
        );
    }

    #[test]
    fn tap_leave_tags_prompt_by_join_rule() {
        let mut private = dm_state();
        private.handle_view_action(RoomDetailsViewAction::TapLeave);
        assert_eq!(
            private.snapshot().bindings.leave_room_alert,
            Some(LeaveRoomAlertState::Private)
        );

        let mut public = RoomDetailsState::new(RoomInfo {
            is_public: true,
            ..dm_info()
        });
        public.replace_members(vec![alice(), bob()]);
        public.handle_view_action(RoomDetailsViewAction::TapLeave);
        assert_eq!(
            public.snapshot().bindings.leave_room_alert,
            Some(LeaveRoomAlertState::Public)
        );
    }

    #[test]
    fn confirm_leave_shows_indicator_then_calls_backend() {
        let mut state = RoomDetailsState::with_loading_title(dm_info(), "Leaving");
        state.handle_view_action(RoomDetailsViewAction::TapLeave);

        let effects = state.handle_view_action(RoomDetailsViewAction::ConfirmLeave);
        assert_eq!(
            effects,
            vec![
                ScreenEffect::SubmitIndicator(UserIndicator {
                    id: LEAVE_ROOM_LOADING_ID.to_owned(),
                    kind: IndicatorKind::Modal,
                    title: "Leaving".to_owned(),
                    persistent: true,
                }),
                ScreenEffect::LeaveRoom,
            ]
        );
        assert_eq!(state.snapshot().bindings.leave_room_alert, None);
    }

    #[test]
    fn second_confirm_leave_while_in_flight_is_rejected() {
        let mut state = dm_state();
        state.handle_view_action(RoomDetailsViewAction::ConfirmLeave);
        assert!(
            state
                .handle_view_action(RoomDetailsViewAction::ConfirmLeave)
                .is_empty()
        );

        state.handle_completion(Completion::LeaveRoom(Ok(())));
        assert_eq!(
            state
                .handle_view_action(RoomDetailsViewAction::ConfirmLeave)
                .len(),
            2
        );
    }

    #[test]
    fn leave_success_retracts_indicator_and_notifies() {
        let mut state = dm_state();
        state.handle_view_action(RoomDetailsViewAction::ConfirmLeave);

        let effects = state.handle_completion(Completion::LeaveRoom(Ok(())));
        assert_eq!(
            effects,
            vec![
                ScreenEffect::RetractIndicator(LEAVE_ROOM_LOADING_ID.to_owned()),
                ScreenEffect::Notify(RoomDetailsOutcome::LeftRoom),
            ]
        );
        assert_eq!(state.snapshot().bindings.alert_info, None);
    }

    #[test]
    fn leave_failure_retracts_indicator_and_raises_unknown_alert() {
        let mut state = dm_state();
        state.handle_view_action(RoomDetailsViewAction::ConfirmLeave);

        let effects = state.handle_completion(Completion::LeaveRoom(Err(network_error())));
        assert_eq!(
            effects,
            vec![ScreenEffect::RetractIndicator(
                LEAVE_ROOM_LOADING_ID.to_owned()
            )]
        );
        assert_eq!(
            state.snapshot().bindings.alert_info.map(|alert| alert.id),
            Some(AlertId::Unknown)
        );
    }

    #[test]
    fn tap_ignore_and_unignore_set_prompt() {
        let mut state = dm_state();
        state.handle_view_action(RoomDetailsViewAction::TapIgnore);
        assert_eq!(
            state.snapshot().bindings.ignore_user_alert,
            Some(IgnoreUserAction::Ignore)
        );
        state.handle_view_action(RoomDetailsViewAction::TapUnignore);
        assert_eq!(
            state.snapshot().bindings.ignore_user_alert,
            Some(IgnoreUserAction::Unignore)
        );
        state.handle_view_action(RoomDetailsViewAction::DismissIgnoreUserAlert);
        assert_eq!(state.snapshot().bindings.ignore_user_alert, None);
    }

    #[test]
    fn ignore_targets_recipient_and_flips_flag_on_success() {
        let mut state = dm_state();
        let effects = state.handle_view_action(RoomDetailsViewAction::IgnoreConfirmed);
        assert_eq!(
            effects,
            vec![ScreenEffect::IgnoreUser {
                user_id: "@bob:example.org".to_owned()
            }]
        );
        assert!(state.snapshot().is_processing_ignore_request);

        state.handle_completion(Completion::IgnoreUser {
            user_id: "@bob:example.org".to_owned(),
            result: Ok(()),
        });
        let snapshot = state.snapshot();
        assert!(!snapshot.is_processing_ignore_request);
        assert_eq!(snapshot.dm_recipient.map(|r| r.is_ignored), Some(true));
    }

    #[test]
    fn unignore_success_after_ignore_clears_flag() {
        let mut state = dm_state();
        state.handle_view_action(RoomDetailsViewAction::IgnoreConfirmed);
        state.handle_completion(Completion::IgnoreUser {
            user_id: "@bob:example.org".to_owned(),
            result: Ok(()),
        });
        assert_eq!(
            state.snapshot().dm_recipient.map(|r| r.is_ignored),
            Some(true)
        );

        let effects = state.handle_view_action(RoomDetailsViewAction::UnignoreConfirmed);
        assert_eq!(
            effects,
            vec![ScreenEffect::UnignoreUser {
                user_id: "@bob:example.org".to_owned()
            }]
        );
        assert!(state.snapshot().is_processing_ignore_request);

        state.handle_completion(Completion::UnignoreUser {
            user_id: "@bob:example.org".to_owned(),
            result: Ok(()),
        });
        let snapshot = state.snapshot();
        assert!(!snapshot.is_processing_ignore_request);
        assert_eq!(snapshot.dm_recipient.map(|r| r.is_ignored), Some(false));
        assert_eq!(snapshot.bindings.alert_info, None);
    }

    #[test]
    fn unignore_failure_clears_processing_and_alerts() {
        let mut state = dm_state();
        state.handle_view_action(RoomDetailsViewAction::UnignoreConfirmed);
        state.handle_completion(Completion::UnignoreUser {
            user_id: "@bob:example.org".to_owned(),
            result: Err(network_error()),
        });

        let snapshot = state.snapshot();
        assert!(!snapshot.is_processing_ignore_request);
        assert_eq!(
            snapshot.bindings.alert_info.map(|alert| alert.id),
            Some(AlertId::Unknown)
        );
        assert_eq!(snapshot.dm_recipient.map(|r| r.is_ignored), Some(false));
    }

    #[test]
    fn ignore_without_recipient_alerts_without_backend_call() {
        let mut state = RoomDetailsState::new(RoomInfo {
            is_direct: false,
            ..dm_info()
        });
        state.replace_members(vec![alice(), bob()]);

        let effects = state.handle_view_action(RoomDetailsViewAction::IgnoreConfirmed);
        assert!(effects.is_empty());
        let snapshot = state.snapshot();
        assert!(!snapshot.is_processing_ignore_request);
        assert_eq!(
            snapshot.bindings.alert_info.map(|alert| alert.id),
            Some(AlertId::Unknown)
        );
    }

    #[test]
    fn ignore_and_unignore_share_one_in_flight_token() {
        let mut state = dm_state();
        assert_eq!(
            state
                .handle_view_action(RoomDetailsViewAction::IgnoreConfirmed)
                .len(),
            1
        );
        assert!(
            state
                .handle_view_action(RoomDetailsViewAction::UnignoreConfirmed)
                .is_empty()
        );
        assert!(state.snapshot().is_processing_ignore_request);
    }

    #[test]
    fn ignore_completion_for_replaced_recipient_leaves_new_recipient_alone() {
        let mut state = dm_state();
        state.handle_view_action(RoomDetailsViewAction::IgnoreConfirmed);
        state.replace_members(vec![alice(), carol()]);

        state.handle_completion(Completion::IgnoreUser {
            user_id: "@bob:example.org".to_owned(),
            result: Ok(()),
        });
        let snapshot = state.snapshot();
        assert!(!snapshot.is_processing_ignore_request);
        let recipient = snapshot.dm_recipient.expect("carol is the new recipient");
        assert_eq!(recipient.id, "@carol:example.org");
        assert!(!recipient.is_ignored);
    }

    #[test]
    fn teardown_retracts_leave_indicator_only_when_in_flight() {
        let mut idle = dm_state();
        assert!(idle.teardown().is_empty());

        let mut leaving = dm_state();
        leaving.handle_view_action(RoomDetailsViewAction::ConfirmLeave);
        leaving.handle_view_action(RoomDetailsViewAction::IgnoreConfirmed);
        assert_eq!(
            leaving.teardown(),
            vec![ScreenEffect::RetractIndicator(
                LEAVE_ROOM_LOADING_ID.to_owned()
            )]
        );
        assert!(!leaving.snapshot().is_processing_ignore_request);
    }

    #[test]
    fn dismiss_alert_clears_error() {
        let mut state = dm_state();
        state.handle_view_action(RoomDetailsViewAction::ConfirmLeave);
        state.handle_completion(Completion::LeaveRoom(Err(network_error())));
        state.handle_view_action(RoomDetailsViewAction::DismissAlert);
        assert_eq!(state.snapshot().bindings.alert_info, None);
    }
}
