use std::{
    collections::HashMap,
    sync::{
        RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, trace};

use crate::{
    error::{ProxyError, ProxyErrorCategory},
    types::{RoomInfo, RoomMember},
};

/// Backend capabilities the room details screen depends on.
#[async_trait]
pub trait RoomProxy: Send + Sync {
    /// Static room attributes captured when the proxy was created.
    fn info(&self) -> &RoomInfo;

    /// Subscribe to full member-list snapshots.
    ///
    /// The value current at subscription time counts as the first delivery.
    fn subscribe_members(&self) -> watch::Receiver<Vec<RoomMember>>;

    /// Ask the backend to refresh the member list; results arrive on the
    /// member subscription.
    async fn update_members(&self) -> Result<(), ProxyError>;

    /// Leave the room.
    async fn leave_room(&self) -> Result<(), ProxyError>;

    /// Add `user_id` to the account's ignore list.
    async fn ignore_user(&self, user_id: &str) -> Result<(), ProxyError>;

    /// Remove `user_id` from the account's ignore list.
    async fn unignore_user(&self, user_id: &str) -> Result<(), ProxyError>;
}

/// Operations recorded by [`InMemoryRoomProxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyCall {
    UpdateMembers,
    LeaveRoom,
    IgnoreUser,
    UnignoreUser,
}

/// Scriptable proxy used by tests and offline tooling.
///
/// Every call succeeds unless a failure was scripted with [`Self::fail`].
/// When built with [`Self::gated`], leave/ignore/unignore calls stay in
/// flight until [`Self::release`] hands out permits.
#[derive(Debug)]
pub struct InMemoryRoomProxy {
    info: RoomInfo,
    members_tx: watch::Sender<Vec<RoomMember>>,
    failures: RwLock<HashMap<ProxyCall, ProxyError>>,
    calls: RwLock<Vec<(ProxyCall, Option<String>)>>,
    gated: AtomicBool,
    gate: Semaphore,
}

impl InMemoryRoomProxy {
    pub fn new(info: RoomInfo) -> Self {
        let (members_tx, _) = watch::channel(Vec::new());
        Self {
            info,
            members_tx,
            failures: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    /// Seed the member list without counting it as a backend call.
    pub fn with_members(self, members: Vec<RoomMember>) -> Self {
        self.members_tx.send_replace(members);
        self
    }

    /// Hold mutating calls until released.
    pub fn gated(self) -> Self {
        self.gated.store(true, Ordering::SeqCst);
        self
    }

    /// Let `count` held calls complete.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Push a new member snapshot to subscribers.
    pub fn set_members(&self, members: Vec<RoomMember>) {
        debug!(member_count = members.len(), "in-memory proxy publishing members");
        self.members_tx.send_replace(members);
    }

    /// Make every subsequent `call` fail with `error`.
    pub fn fail(&self, call: ProxyCall, error: ProxyError) -> Result<(), ProxyError> {
        self.failures
            .write()
            .map_err(|_| ProxyError::poisoned("failure script"))?
            .insert(call, error);
        Ok(())
    }

    /// Undo a scripted failure.
    pub fn succeed(&self, call: ProxyCall) -> Result<(), ProxyError> {
        self.failures
            .write()
            .map_err(|_| ProxyError::poisoned("failure script"))?
            .remove(&call);
        Ok(())
    }

    /// Calls made so far, with their user argument when there is one.
    pub fn calls(&self) -> Result<Vec<(ProxyCall, Option<String>)>, ProxyError> {
        self.calls
            .read()
            .map(|calls| calls.clone())
            .map_err(|_| ProxyError::poisoned("call log"))
    }

    pub fn call_count(&self, call: ProxyCall) -> Result<usize, ProxyError> {
        self.calls
            .read()
            .map(|calls| calls.iter().filter(|(recorded, _)| *recorded == call).count())
            .map_err(|_| ProxyError::poisoned("call log"))
    }

    async fn run(&self, call: ProxyCall, user_id: Option<&str>) -> Result<(), ProxyError> {
        self.calls
            .write()
            .map_err(|_| ProxyError::poisoned("call log"))?
            .push((call, user_id.map(str::to_owned)));
        trace!(?call, ?user_id, "in-memory proxy call started");

        if call != ProxyCall::UpdateMembers && self.gated.load(Ordering::SeqCst) {
            let permit = self.gate.acquire().await.map_err(|_| {
                ProxyError::new(
                    ProxyErrorCategory::Internal,
                    "gate_closed",
                    "in-memory proxy gate closed",
                )
            })?;
            permit.forget();
        }

        let failure = self
            .failures
            .read()
            .map_err(|_| ProxyError::poisoned("failure script"))?
            .get(&call)
            .cloned();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn mark_ignored(&self, user_id: &str, ignored: bool) {
        // Backend-side effect only; subscribers see it on the next refresh.
        self.members_tx.send_if_modified(|members| {
            for member in members.iter_mut().filter(|m| m.user_id == user_id) {
                member.is_ignored = ignored;
            }
            false
        });
    }
}

#[async_trait]
impl RoomProxy for InMemoryRoomProxy {
    fn info(&self) -> &RoomInfo {
        &self.info
    }

    fn subscribe_members(&self) -> watch::Receiver<Vec<RoomMember>> {
        let mut rx = self.members_tx.subscribe();
        rx.mark_changed();
        rx
    }

    async fn update_members(&self) -> Result<(), ProxyError> {
        self.run(ProxyCall::UpdateMembers, None).await?;
        let current = self.members_tx.borrow().clone();
        self.members_tx.send_replace(current);
        Ok(())
    }

    async fn leave_room(&self) -> Result<(), ProxyError> {
        self.run(ProxyCall::LeaveRoom, None).await
    }

    async fn ignore_user(&self, user_id: &str) -> Result<(), ProxyError> {
        self.run(ProxyCall::IgnoreUser, Some(user_id)).await?;
        self.mark_ignored(user_id, true);
        Ok(())
    }

    async fn unignore_user(&self, user_id: &str) -> Result<(), ProxyError> {
        self.run(ProxyCall::UnignoreUser, Some(user_id)).await?;
        self.mark_ignored(user_id, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::timeout;

    use super::*;

    fn proxy() -> InMemoryRoomProxy {
        InMemoryRoomProxy::new(RoomInfo {
            room_id: "!r:example.org".to_owned(),
            ..RoomInfo::default()
        })
    }

    #[tokio::test]
    async fn subscription_sees_current_members_first() {
        let proxy = proxy().with_members(vec![RoomMember::new("@alice:example.org")]);
        let mut rx = proxy.subscribe_members();

        rx.changed().await.expect("sender alive");
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[tokio::test]
    async fn scripted_failure_is_returned_until_cleared() {
        let proxy = proxy();
        proxy
            .fail(
                ProxyCall::LeaveRoom,
                ProxyError::new(ProxyErrorCategory::Network, "offline", "no route"),
            )
            .expect("script failure");

        let err = proxy.leave_room().await.expect_err("leave should fail");
        assert_eq!(err.code, "offline");

        proxy.succeed(ProxyCall::LeaveRoom).expect("clear failure");
        proxy.leave_room().await.expect("leave should succeed");
        assert_eq!(
            proxy.call_count(ProxyCall::LeaveRoom).expect("call log readable"),
            2
        );
    }

    #[tokio::test]
    async fn ignore_records_target_and_updates_backend_copy() {
        let proxy = proxy().with_members(vec![
            RoomMember::new("@alice:example.org").account_owner(),
            RoomMember::new("@bob:example.org"),
        ]);

        proxy
            .ignore_user("@bob:example.org")
            .await
            .expect("ignore should succeed");

        assert_eq!(
            proxy.calls().expect("call log readable"),
            vec![(ProxyCall::IgnoreUser, Some("@bob:example.org".to_owned()))]
        );
        let members = proxy.subscribe_members().borrow().clone();
        assert!(members[1].is_ignored);
    }

    #[tokio::test]
    async fn gated_calls_wait_for_release() {
        let proxy = Arc::new(proxy().gated());
        let task = tokio::spawn({
            let proxy = Arc::clone(&proxy);
            async move { proxy.leave_room().await }
        });

        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        proxy.release(1);
        timeout(Duration::from_secs(1), task)
            .await
            .expect("gated call should finish after release")
            .expect("task should not panic")
            .expect("leave should succeed");
    }

    #[tokio::test]
    async fn poisoned_call_log_surfaces_as_proxy_error() {
        let proxy = proxy();
        let joined: std::thread::Result<()> = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = proxy.calls.write().expect("fresh lock");
                    panic!("poison call log");
                })
                .join()
        });
        assert!(joined.is_err());

        let err = proxy
            .call_count(ProxyCall::LeaveRoom)
            .expect_err("poisoned log must not read as zero calls");
        assert_eq!(err.code, "poisoned_lock");
        assert!(proxy.calls().is_err());
        let err = proxy.leave_room().await.expect_err("call cannot be recorded");
        assert_eq!(err.category, ProxyErrorCategory::Internal);
    }
}
