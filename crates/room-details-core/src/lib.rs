//! Core contract for the room details screen.
//!
//! This crate defines the view-state and outcome types, the room proxy
//! capability trait, the screen-lifetime outcome channel, user indicators and
//! the small text/search helpers shared with other screens.

/// ASCII folding helpers.
pub mod asciify;
/// Screen-lifetime outcome channel.
pub mod channel;
/// Proxy error types and HTTP classification helpers.
pub mod error;
/// Loading indicator controller.
pub mod indicator;
/// Room proxy capability trait and in-memory implementation.
pub mod proxy;
/// Search presentation policy.
pub mod search;
/// View-state, action and outcome types.
pub mod types;

pub use asciify::{AsciiFold, asciified, is_ascii};
pub use channel::{OutcomeChannelError, OutcomeReceiver, OutcomeSender, outcome_channel};
pub use error::{ProxyError, ProxyErrorCategory, classify_http_status};
pub use indicator::{IndicatorEvent, IndicatorQueue, UserIndicatorController};
pub use proxy::{InMemoryRoomProxy, ProxyCall, RoomProxy};
pub use search::SearchPresentation;
pub use types::{
    AlertId, AlertInfo, IgnoreUserAction, IndicatorKind, LeaveRoomAlertState, RoomDetailsBindings,
    RoomDetailsOutcome, RoomDetailsViewAction, RoomDetailsViewState, RoomInfo, RoomMember,
    RoomMemberDetails, UNKNOWN_ROOM_TITLE, UserIndicator,
};
