//! Room details screen: membership-derived state reducer and the async action
//! runtime that reconciles backend outcomes into view state.

/// Screen runtime (single-writer reconcile loop).
pub mod bridge;
/// Reducer and side-effect model.
pub mod state;

pub use bridge::{RoomDetailsScreen, ScreenConfig, ScreenError};
pub use state::{
    Completion, DEFAULT_LOADING_TITLE, LEAVE_ROOM_LOADING_ID, RoomDetailsState, ScreenEffect,
    direct_message_recipient,
};
