//! `RoomProxy` implementation backed by `matrix-sdk`.

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use matrix_sdk::{
    Client, ClientBuildError, HttpError, Room, RoomMemberships,
    config::SyncSettings,
    event_handler::EventHandlerHandle,
    room::RoomMember as SdkRoomMember,
    ruma::{OwnedRoomId, OwnedUserId, events::room::member::SyncRoomMemberEvent},
};
use room_details_core::{
    ProxyError, ProxyErrorCategory, RoomInfo, RoomMember, RoomProxy, classify_http_status,
};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_DEVICE_DISPLAY_NAME: &str = "PikaChat Room Details";
const SYNC_ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Connection settings for [`login_client`].
#[derive(Debug, Clone)]
pub struct MatrixLoginConfig {
    pub homeserver: String,
    pub data_dir: PathBuf,
    pub user_id_or_localpart: String,
    pub password: String,
    pub device_display_name: Option<String>,
}

/// Build a client, log in with a password and run one sync so rooms are known.
pub async fn login_client(config: &MatrixLoginConfig) -> Result<Client, ProxyError> {
    let client = Client::builder()
        .homeserver_url(&config.homeserver)
        .sqlite_store(&config.data_dir, None)
        .build()
        .await
        .map_err(map_client_build_error)?;

    client
        .matrix_auth()
        .login_username(&config.user_id_or_localpart, &config.password)
        .initial_device_display_name(
            config
                .device_display_name
                .as_deref()
                .unwrap_or(DEFAULT_DEVICE_DISPLAY_NAME),
        )
        .send()
        .await
        .map_err(map_matrix_error)?;
    info!(homeserver = %config.homeserver, "logged in");

    client
        .sync_once(SyncSettings::default())
        .await
        .map_err(map_matrix_error)?;
    debug!("initial sync finished");
    Ok(client)
}

/// Sync loop that keeps room state, and with it the member subscription of
/// every [`MatrixRoomProxy`], current.
#[derive(Debug)]
pub struct BackgroundSync {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl BackgroundSync {
    /// Start syncing until [`Self::stop`] is called or the session is rejected.
    pub fn start(client: Client) -> Self {
        let stop = CancellationToken::new();
        let stop_child = stop.child_token();
        let task = tokio::spawn(async move {
            let mut sync_settings = SyncSettings::default();
            loop {
                tokio::select! {
                    _ = stop_child.cancelled() => break,
                    sync_result = client.sync_once(sync_settings.clone()) => match sync_result {
                        Ok(response) => {
                            sync_settings = sync_settings.token(response.next_batch);
                        }
                        Err(err) => {
                            let mapped = map_matrix_error(err);
                            if mapped.category == ProxyErrorCategory::Auth {
                                warn!(error = %mapped, "sync rejected; stopping background sync");
                                break;
                            }
                            warn!(error = %mapped, "sync failed; backing off");
                            tokio::select! {
                                _ = stop_child.cancelled() => break,
                                _ = tokio::time::sleep(SYNC_ERROR_BACKOFF) => {}
                            }
                        }
                    },
                }
            }
            debug!("background sync stopped");
        });
        Self { stop, task }
    }

    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(err) = self.task.await {
            warn!(error = %err, "background sync task failed");
        }
    }
}

/// Look up a joined room by ID.
pub fn lookup_room(client: &Client, room_id: &str) -> Result<Room, ProxyError> {
    let room_id = parse_room_id(room_id)?;
    client.get_room(&room_id).ok_or_else(|| {
        ProxyError::new(
            ProxyErrorCategory::Config,
            "room_not_found",
            format!("room not found: {room_id}"),
        )
    })
}

/// Room proxy for one `matrix_sdk::Room`.
///
/// Static attributes are read once at construction. Member snapshots are
/// republished by [`RoomProxy::update_members`] and, while a
/// [`BackgroundSync`] runs, whenever a membership event for the room arrives.
pub struct MatrixRoomProxy {
    room: Room,
    info: RoomInfo,
    members_tx: Arc<watch::Sender<Vec<RoomMember>>>,
    member_handler: EventHandlerHandle,
}

impl MatrixRoomProxy {
    pub async fn new(room: Room) -> Result<Self, ProxyError> {
        let info = load_room_info(&room).await?;
        let (members_tx, _) = watch::channel(Vec::new());
        let members_tx = Arc::new(members_tx);

        let handler_tx = Arc::clone(&members_tx);
        let member_handler = room.add_event_handler(
            move |_event: SyncRoomMemberEvent, room: Room| {
                let members_tx = Arc::clone(&handler_tx);
                async move {
                    match room.members_no_sync(RoomMemberships::JOIN).await {
                        Ok(members) => publish_members(&members_tx, &members),
                        Err(err) => {
                            warn!(error = %err, "failed reading members after membership event");
                        }
                    }
                }
            },
        );

        debug!(room_id = %info.room_id, "matrix room proxy ready");
        Ok(Self {
            room,
            info,
            members_tx,
            member_handler,
        })
    }
}

impl Drop for MatrixRoomProxy {
    fn drop(&mut self) {
        self.room
            .client()
            .remove_event_handler(self.member_handler.clone());
    }
}

#[async_trait]
impl RoomProxy for MatrixRoomProxy {
    fn info(&self) -> &RoomInfo {
        &self.info
    }

    fn subscribe_members(&self) -> watch::Receiver<Vec<RoomMember>> {
        let mut rx = self.members_tx.subscribe();
        rx.mark_changed();
        rx
    }

    async fn update_members(&self) -> Result<(), ProxyError> {
        let members = self
            .room
            .members(RoomMemberships::JOIN)
            .await
            .map_err(map_matrix_error)?;
        publish_members(&self.members_tx, &members);
        Ok(())
    }

    async fn leave_room(&self) -> Result<(), ProxyError> {
        self.room.leave().await.map_err(map_matrix_error)
    }

    async fn ignore_user(&self, user_id: &str) -> Result<(), ProxyError> {
        let user_id = parse_user_id(user_id)?;
        self.room
            .client()
            .account()
            .ignore_user(&user_id)
            .await
            .map_err(map_matrix_error)
    }

    async fn unignore_user(&self, user_id: &str) -> Result<(), ProxyError> {
        let user_id = parse_user_id(user_id)?;
        self.room
            .client()
            .account()
            .unignore_user(&user_id)
            .await
            .map_err(map_matrix_error)
    }
}

async fn load_room_info(room: &Room) -> Result<RoomInfo, ProxyError> {
    let is_encrypted = room
        .latest_encryption_state()
        .await
        .map_err(map_matrix_error)?
        .is_encrypted();
    let is_direct = room.is_direct().await.map_err(|err| map_matrix_error(err.into()))?;
    let permalink = match room.matrix_to_permalink().await {
        Ok(uri) => Some(uri.to_string()),
        Err(err) => {
            warn!(room_id = %room.room_id(), error = %err, "permalink unavailable");
            None
        }
    };

    Ok(RoomInfo {
        room_id: room.room_id().to_string(),
        canonical_alias: room.canonical_alias().map(|alias| alias.to_string()),
        display_name: room.cached_display_name().map(|name| name.to_string()),
        name: room.name(),
        topic: room.topic(),
        avatar_url: room.avatar_url().map(|url| url.to_string()),
        permalink,
        is_encrypted,
        is_direct,
        is_public: room.is_public().unwrap_or(false),
    })
}

fn publish_members(members_tx: &watch::Sender<Vec<RoomMember>>, members: &[SdkRoomMember]) {
    let members: Vec<RoomMember> = members.iter().map(map_member).collect();
    debug!(member_count = members.len(), "publishing room members");
    members_tx.send_replace(members);
}

fn map_member(member: &SdkRoomMember) -> RoomMember {
    RoomMember {
        user_id: member.user_id().to_string(),
        display_name: member.display_name().map(str::to_owned),
        avatar_url: member.avatar_url().map(|url| url.to_string()),
        is_account_owner: member.is_account_user(),
        is_ignored: member.is_ignored(),
    }
}

fn parse_room_id(value: &str) -> Result<OwnedRoomId, ProxyError> {
    value.parse::<OwnedRoomId>().map_err(|err| {
        ProxyError::new(
            ProxyErrorCategory::Config,
            "invalid_room_id",
            format!("invalid room id '{value}': {err}"),
        )
    })
}

fn parse_user_id(value: &str) -> Result<OwnedUserId, ProxyError> {
    value.parse::<OwnedUserId>().map_err(|err| {
        ProxyError::new(
            ProxyErrorCategory::Config,
            "invalid_user_id",
            format!("invalid user id '{value}': {err}"),
        )
    })
}

fn map_matrix_http_error(err: HttpError) -> ProxyError {
    if let Some(client_err) = err.as_client_api_error() {
        ProxyError::new(
            classify_http_status(client_err.status_code.as_u16()),
            "matrix_http_error",
            client_err.to_string(),
        )
    } else {
        ProxyError::new(
            ProxyErrorCategory::Network,
            "matrix_http_error",
            err.to_string(),
        )
    }
}

fn map_matrix_error(err: matrix_sdk::Error) -> ProxyError {
    use matrix_sdk::Error;

    match err {
        Error::Http(http_err) => map_matrix_http_error(*http_err),
        Error::AuthenticationRequired => {
            ProxyError::new(ProxyErrorCategory::Auth, "auth_required", err.to_string())
        }
        Error::StateStore(_) | Error::Io(_) => ProxyError::new(
            ProxyErrorCategory::Storage,
            "storage_error",
            err.to_string(),
        ),
        Error::SerdeJson(_) => ProxyError::new(
            ProxyErrorCategory::Serialization,
            "serde_json_error",
            err.to_string(),
        ),
        _ => ProxyError::new(
            ProxyErrorCategory::Internal,
            "matrix_error",
            err.to_string(),
        ),
    }
}

fn map_client_build_error(err: ClientBuildError) -> ProxyError {
    ProxyError::new(
        ProxyErrorCategory::Config,
        "client_build_error",
        err.to_string(),
    )
}
