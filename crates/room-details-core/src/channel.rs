use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::RoomDetailsOutcome;

/// Errors returned by outcome channel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OutcomeChannelError {
    /// The screen was dismissed or the host stopped listening.
    #[error("outcome channel is closed")]
    Closed,
}

/// Create an open outcome channel bound to one screen lifetime.
pub fn outcome_channel() -> (OutcomeSender, OutcomeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let lifetime = CancellationToken::new();
    (
        OutcomeSender {
            tx,
            lifetime: lifetime.clone(),
        },
        OutcomeReceiver { rx, lifetime },
    )
}

/// Screen-side half of the outcome channel.
#[derive(Clone, Debug)]
pub struct OutcomeSender {
    tx: mpsc::UnboundedSender<RoomDetailsOutcome>,
    lifetime: CancellationToken,
}

impl OutcomeSender {
    /// Deliver one outcome to the host.
    ///
    /// Fails once either side closed the channel, so late completions can be
    /// told apart from delivered ones.
    pub fn emit(&self, outcome: RoomDetailsOutcome) -> Result<(), OutcomeChannelError> {
        if self.lifetime.is_cancelled() {
            return Err(OutcomeChannelError::Closed);
        }
        self.tx
            .send(outcome)
            .map_err(|_| OutcomeChannelError::Closed)
    }

    /// Close the channel; buffered outcomes are discarded.
    pub fn close(&self) {
        self.lifetime.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.lifetime.is_cancelled() || self.tx.is_closed()
    }

    /// Token cancelled when the channel closes.
    pub fn lifetime(&self) -> CancellationToken {
        self.lifetime.clone()
    }
}

/// Host-side half of the outcome channel. Dropping it closes the channel.
#[derive(Debug)]
pub struct OutcomeReceiver {
    rx: mpsc::UnboundedReceiver<RoomDetailsOutcome>,
    lifetime: CancellationToken,
}

impl OutcomeReceiver {
    /// Wait for the next outcome; `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<RoomDetailsOutcome> {
        if self.lifetime.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => None,
            outcome = self.rx.recv() => outcome,
        }
    }

    /// Non-blocking variant of [`Self::recv`].
    pub fn try_recv(&mut self) -> Option<RoomDetailsOutcome> {
        if self.lifetime.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn close(&self) {
        self.lifetime.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.lifetime.is_cancelled()
    }
}

impl Drop for OutcomeReceiver {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_outcomes_in_emission_order() {
        let (tx, mut rx) = outcome_channel();
        tx.emit(RoomDetailsOutcome::RequestMemberDetailsPresentation {
            members: Vec::new(),
        })
        .expect("open channel should accept outcome");
        tx.emit(RoomDetailsOutcome::LeftRoom)
            .expect("open channel should accept outcome");

        assert_eq!(
            rx.recv().await,
            Some(RoomDetailsOutcome::RequestMemberDetailsPresentation {
                members: Vec::new()
            })
        );
        assert_eq!(rx.recv().await, Some(RoomDetailsOutcome::LeftRoom));
    }

    #[tokio::test]
    async fn rejects_emission_after_sender_close() {
        let (tx, mut rx) = outcome_channel();
        tx.close();

        let err = tx
            .emit(RoomDetailsOutcome::LeftRoom)
            .expect_err("closed channel must reject outcome");
        assert_eq!(err, OutcomeChannelError::Closed);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn discards_buffered_outcomes_once_closed() {
        let (tx, mut rx) = outcome_channel();
        tx.emit(RoomDetailsOutcome::LeftRoom)
            .expect("open channel should accept outcome");
        rx.close();

        assert_eq!(rx.try_recv(), None);
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn dropping_receiver_closes_sender_side() {
        let (tx, rx) = outcome_channel();
        drop(rx);

        assert!(tx.is_closed());
        assert!(tx.emit(RoomDetailsOutcome::LeftRoom).is_err());
    }
}
