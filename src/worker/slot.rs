//! Single-slot rendezvous, per SPEC_FULL §9.1's resolution of the original
//! source's mutex+condvar single-slot buffer: a `tokio::sync::Mutex<Option<T>>`
//! guarding the armed/disarmed state, paired with two `tokio::sync::Notify`s
//! ("became full", "became empty") since `tokio` has no native condvar.
//!
//! Every wait here uses the documented enable-before-check idiom (construct
//! the `notified()` future, recheck the condition, only then `.await` it) to
//! avoid the missed-wakeup race a naive check-then-wait would have — this
//! crate deliberately does *not* reproduce the original's single
//! non-looping `g_cond_wait`, per SPEC_FULL §9.1's "safer `while`-loop
//! pattern" resolution.

use std::time::Duration;

use tokio::sync::{Mutex, Notify};

pub struct MessageSlot<T> {
    inner: Mutex<Option<T>>,
    became_full: Notify,
    became_empty: Notify,
}

impl<T> MessageSlot<T> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(None), became_full: Notify::new(), became_empty: Notify::new() }
    }

    /// Arm the slot with `value`, blocking (re-check loop) while a prior
    /// value hasn't been drained yet. Used both by `send_message` (arming
    /// the outbound slot) and by Text-Recv (arming the inbound slot).
    pub async fn put(&self, value: T) {
        let mut value = Some(value);
        loop {
            let empty = self.became_empty.notified();
            {
                let mut guard = self.inner.lock().await;
                if guard.is_none() {
                    *guard = value.take();
                    drop(guard);
                    self.became_full.notify_one();
                    return;
                }
            }
            empty.await;
        }
    }

    /// Drain the slot immediately, returning `None` if it's empty. Used by
    /// `recv_message`, which must never block.
    pub async fn try_take(&self) -> Option<T> {
        let mut guard = self.inner.lock().await;
        let value = guard.take();
        drop(guard);
        if value.is_some() {
            self.became_empty.notify_one();
        }
        value
    }

    /// Block until the slot becomes full or `timeout` elapses, draining it
    /// on the full branch. Used by Text-Send's main wait loop (§4.8): TEXT
    /// takes priority over the keepalive timeout because the full-branch is
    /// checked before the timer is armed.
    pub async fn take_or_timeout(&self, timeout: Duration) -> Option<T> {
        let full = self.became_full.notified();
        {
            let mut guard = self.inner.lock().await;
            if let Some(value) = guard.take() {
                drop(guard);
                self.became_empty.notify_one();
                return Some(value);
            }
        }
        tokio::select! {
            _ = full => {
                let mut guard = self.inner.lock().await;
                let value = guard.take();
                drop(guard);
                if value.is_some() {
                    self.became_empty.notify_one();
                }
                value
            }
            _ = tokio::time::sleep(timeout) => None,
        }
    }
}

impl<T> Default for MessageSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn put_then_try_take_round_trips() {
        let slot: MessageSlot<u32> = MessageSlot::new();
        slot.put(42).await;
        assert_eq!(slot.try_take().await, Some(42));
        assert_eq!(slot.try_take().await, None);
    }

    #[tokio::test]
    async fn put_blocks_until_drained() {
        let slot = Arc::new(MessageSlot::new());
        slot.put(1u32).await;

        let slot2 = slot.clone();
        let putter = tokio::spawn(async move {
            slot2.put(2u32).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!putter.is_finished());

        assert_eq!(slot.try_take().await, Some(1));
        putter.await.unwrap();
        assert_eq!(slot.try_take().await, Some(2));
    }

    #[tokio::test]
    async fn take_or_timeout_returns_none_on_timeout() {
        let slot: MessageSlot<u32> = MessageSlot::new();
        let out = slot.take_or_timeout(Duration::from_millis(10)).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn take_or_timeout_prioritizes_armed_slot() {
        let slot: MessageSlot<u32> = MessageSlot::new();
        slot.put(7).await;
        let out = slot.take_or_timeout(Duration::from_secs(3)).await;
        assert_eq!(out, Some(7));
    }
}
