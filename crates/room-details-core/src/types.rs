use serde::{Deserialize, Serialize};

/// Title used when a room has neither a display name nor a name.
pub const UNKNOWN_ROOM_TITLE: &str = "Unknown Room";

/// Static room attributes captured when the screen is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RoomInfo {
    /// Matrix room ID.
    pub room_id: String,
    /// Canonical alias, for example `#pika:example.org`.
    pub canonical_alias: Option<String>,
    /// Computed display name (heroes, alias or explicit name).
    pub display_name: Option<String>,
    /// Explicit `m.room.name` value.
    pub name: Option<String>,
    /// Room topic.
    pub topic: Option<String>,
    /// Room avatar (`mxc://`) URI.
    pub avatar_url: Option<String>,
    /// `matrix.to` permalink for sharing.
    pub permalink: Option<String>,
    /// Whether the room has encryption enabled.
    pub is_encrypted: bool,
    /// Whether the room is flagged as a direct message room.
    pub is_direct: bool,
    /// Whether the room join rule is public.
    pub is_public: bool,
}

impl RoomInfo {
    /// Best-effort title: display name, then name, then a fixed fallback.
    pub fn title(&self) -> String {
        let non_blank = |value: &&str| !value.trim().is_empty();
        self.display_name
            .as_deref()
            .filter(non_blank)
            .or(self.name.as_deref().filter(non_blank))
            .unwrap_or(UNKNOWN_ROOM_TITLE)
            .to_owned()
    }
}

/// One joined member as reported by the room proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomMember {
    /// Matrix user ID.
    pub user_id: String,
    /// Room-scoped display name.
    pub display_name: Option<String>,
    /// Member avatar (`mxc://`) URI.
    pub avatar_url: Option<String>,
    /// `true` for the locally authenticated account.
    pub is_account_owner: bool,
    /// `true` when the account owner ignores this user.
    pub is_ignored: bool,
}

impl RoomMember {
    /// Create a member record with no profile data.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            avatar_url: None,
            is_account_owner: false,
            is_ignored: false,
        }
    }

    /// Mark this record as the account owner.
    pub fn account_owner(mut self) -> Self {
        self.is_account_owner = true;
        self
    }

    /// Attach a display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Display projection of a member consumed by the view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomMemberDetails {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_account_owner: bool,
    pub is_ignored: bool,
}

impl From<&RoomMember> for RoomMemberDetails {
    fn from(member: &RoomMember) -> Self {
        Self {
            id: member.user_id.clone(),
            name: member.display_name.clone(),
            avatar_url: member.avatar_url.clone(),
            is_account_owner: member.is_account_owner,
            is_ignored: member.is_ignored,
        }
    }
}

/// Variant of the leave confirmation prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LeaveRoomAlertState {
    /// The account owner is the last member; leaving empties the room.
    Empty,
    /// Public room; the user can rejoin freely.
    Public,
    /// Private room; rejoining needs an invite.
    Private,
}

/// Which ignore prompt is shown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IgnoreUserAction {
    Ignore,
    Unignore,
}

/// User-visible alert identifiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertId {
    /// Generic failure; backend causes are not distinguished.
    Unknown,
}

/// Alert shown on top of the screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertInfo {
    pub id: AlertId,
}

impl AlertInfo {
    pub fn unknown() -> Self {
        Self {
            id: AlertId::Unknown,
        }
    }
}

/// Two-way bindings the view can present and dismiss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RoomDetailsBindings {
    /// Pending leave confirmation prompt.
    pub leave_room_alert: Option<LeaveRoomAlertState>,
    /// Pending ignore/unignore confirmation prompt.
    pub ignore_user_alert: Option<IgnoreUserAction>,
    /// Error alert.
    pub alert_info: Option<AlertInfo>,
}

/// Full view-state snapshot published after every reducer step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomDetailsViewState {
    pub room_id: String,
    pub canonical_alias: Option<String>,
    pub is_encrypted: bool,
    pub is_direct: bool,
    pub title: String,
    pub topic: Option<String>,
    pub avatar_url: Option<String>,
    pub permalink: Option<String>,
    /// Members in backend order.
    pub members: Vec<RoomMemberDetails>,
    /// Counterpart of a two-person encrypted direct room.
    pub dm_recipient: Option<RoomMemberDetails>,
    /// `true` while an ignore/unignore call is outstanding.
    pub is_processing_ignore_request: bool,
    pub bindings: RoomDetailsBindings,
}

impl RoomDetailsViewState {
    /// Initial state built from the proxy's static attributes.
    pub fn from_room(info: &RoomInfo) -> Self {
        Self {
            room_id: info.room_id.clone(),
            canonical_alias: info.canonical_alias.clone(),
            is_encrypted: info.is_encrypted,
            is_direct: info.is_direct,
            title: info.title(),
            topic: info.topic.clone(),
            avatar_url: info.avatar_url.clone(),
            permalink: info.permalink.clone(),
            members: Vec::new(),
            dm_recipient: None,
            is_processing_ignore_request: false,
            bindings: RoomDetailsBindings::default(),
        }
    }
}

/// User interactions accepted by the room details screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoomDetailsViewAction {
    /// Open the member list.
    TapPeople,
    /// Ask to leave the room.
    TapLeave,
    /// Leave prompt confirmed.
    ConfirmLeave,
    /// Ask to ignore the direct-message recipient.
    TapIgnore,
    /// Ask to unignore the direct-message recipient.
    TapUnignore,
    /// Ignore prompt confirmed.
    IgnoreConfirmed,
    /// Unignore prompt confirmed.
    UnignoreConfirmed,
    /// Leave prompt dismissed without confirming.
    DismissLeaveRoomAlert,
    /// Ignore/unignore prompt dismissed without confirming.
    DismissIgnoreUserAlert,
    /// Error alert acknowledged.
    DismissAlert,
}

/// Signals delivered to the hosting screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoomDetailsOutcome {
    /// Host should present the member list.
    RequestMemberDetailsPresentation {
        /// Member snapshot at the time of the tap.
        members: Vec<RoomMember>,
    },
    /// The room was left successfully.
    LeftRoom,
}

/// Presentation style of a user indicator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndicatorKind {
    /// Blocks interaction until retracted.
    Modal,
    /// Non-blocking banner.
    Toast,
}

/// Loading/progress indicator keyed by a stable identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIndicator {
    pub id: String,
    pub kind: IndicatorKind,
    pub title: String,
    /// Persistent indicators stay until explicitly retracted.
    pub persistent: bool,
}
