use std::sync::Mutex;

use tokio::sync::Notify;

/// One byte received and latched.
pub(crate) const EV_RX_COMPLETE: u8 = 1 << 0;
/// The last byte handed to the driver is on the wire.
pub(crate) const EV_TX_COMPLETE: u8 = 1 << 1;
/// 1.5 character times of line silence.
pub(crate) const EV_T1_5_EXCEED: u8 = 1 << 2;
/// 2.0 character times of line silence.
pub(crate) const EV_T2_0_EXCEED: u8 = 1 << 3;
/// 3.5 character times of line silence.
pub(crate) const EV_T3_5_EXCEED: u8 = 1 << 4;
/// The caller's receive timeout fired.
pub(crate) const EV_RX_TIMEOUT: u8 = 1 << 5;

/// Event flag group: the single blocking rendezvous between the synchronous
/// transport path and the driver ISR callbacks.
///
/// Posting is idempotent and never blocks, so it is safe from any thread.
/// Waiting does not consume flags; the transport clears exactly the bits it
/// is about to wait for, mirroring the pend/clear discipline of the RX and
/// TX state machines.
#[derive(Debug, Default)]
pub(crate) struct EventFlags {
    bits: Mutex<u8>,
    notify: Notify,
}

impl EventFlags {
    pub fn new() -> Self {
        Self {
            bits: Mutex::new(0),
            notify: Notify::new(),
        }
    }

    pub fn post(&self, mask: u8) {
        {
            let mut bits = self.bits.lock().unwrap();
            *bits |= mask;
        }
        self.notify.notify_waiters();
    }

    pub fn clear(&self, mask: u8) {
        let mut bits = self.bits.lock().unwrap();
        *bits &= !mask;
    }

    /// Block until any bit of `mask` is set; returns the matching bits.
    pub async fn wait_any(&self, mask: u8) -> u8 {
        loop {
            // Register interest before checking so a post between the check
            // and the await is not lost.
            let notified = self.notify.notified();
            {
                let bits = self.bits.lock().unwrap();
                let matched = *bits & mask;
                if matched != 0 {
                    return matched;
                }
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_already_set_flags() {
        let flags = EventFlags::new();
        flags.post(EV_RX_COMPLETE | EV_T1_5_EXCEED);
        let fired = flags.wait_any(EV_RX_COMPLETE).await;
        assert_eq!(fired, EV_RX_COMPLETE);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_post() {
        let flags = Arc::new(EventFlags::new());

        let waiter = {
            let flags = Arc::clone(&flags);
            tokio::spawn(async move { flags.wait_any(EV_TX_COMPLETE).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        flags.post(EV_TX_COMPLETE);
        assert_eq!(waiter.await.unwrap(), EV_TX_COMPLETE);
    }

    #[tokio::test]
    async fn test_clear_removes_bits() {
        let flags = EventFlags::new();
        flags.post(EV_RX_COMPLETE | EV_RX_TIMEOUT);
        flags.clear(EV_RX_COMPLETE);
        let fired = flags.wait_any(EV_RX_COMPLETE | EV_RX_TIMEOUT).await;
        assert_eq!(fired, EV_RX_TIMEOUT);
    }

    #[tokio::test]
    async fn test_wait_reports_only_masked_bits() {
        let flags = EventFlags::new();
        flags.post(EV_T1_5_EXCEED | EV_T2_0_EXCEED | EV_TX_COMPLETE);
        let fired = flags.wait_any(EV_T1_5_EXCEED | EV_T2_0_EXCEED).await;
        assert_eq!(fired, EV_T1_5_EXCEED | EV_T2_0_EXCEED);
    }
}
