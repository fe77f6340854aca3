use std::sync::atomic::{AtomicU32, Ordering};

use futures::task;

// TODO: Evaluate memory ordering constraints to alleviate SeqCst ordering if possible.

/// Our receive allowance: the bytes the peer may still send on the channel.
///
/// Consumed as data arrives, replenished with a `SSH_MSG_CHANNEL_WINDOW_ADJUST`
/// once it sinks below the refill threshold, well before it reaches zero.
pub struct LocalWindow {
    inner: AtomicU32,
}

impl LocalWindow {
    /// The maximum data message size we advertise.
    pub const MAXIMUM_PACKET_SIZE: u32 = 32768; // 32KiB

    /// The window size we advertise on channel open and refill to.
    pub const INITIAL_WINDOW_SIZE: u32 = 64 * Self::MAXIMUM_PACKET_SIZE;

    const ADJUST_THRESHOLD: u32 = Self::INITIAL_WINDOW_SIZE - Self::MAXIMUM_PACKET_SIZE * 5;

    /// The allowance currently remaining for the peer.
    pub fn size(&self) -> u32 {
        self.inner.load(Ordering::SeqCst)
    }

    /// The adjustment to advertise, if the window sank below the threshold.
    pub fn adjustable(&self) -> Option<u32> {
        let previous = self
            .inner
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |window| {
                if window <= Self::ADJUST_THRESHOLD {
                    Some(Self::INITIAL_WINDOW_SIZE)
                } else {
                    None
                }
            })
            .ok();

        previous.map(|previous| Self::INITIAL_WINDOW_SIZE - previous)
    }

    /// Consume part of the allowance for a received data message.
    pub fn consume(&self, size: u32) {
        self.inner.fetch_sub(size, Ordering::SeqCst);
    }
}

impl Default for LocalWindow {
    fn default() -> Self {
        Self {
            inner: Self::INITIAL_WINDOW_SIZE.into(),
        }
    }
}

/// The peer's receive allowance: the bytes we may still send on the channel.
///
/// Writers reserve from it before sending and suspend when it runs dry,
/// until the peer's `SSH_MSG_CHANNEL_WINDOW_ADJUST` replenishes it.
pub struct RemoteWindow {
    inner: AtomicU32,
    waker: task::AtomicWaker,
}

impl RemoteWindow {
    /// Replenish the allowance and resume a suspended writer.
    pub fn replenish(&self, bytes_to_add: u32) {
        self.inner.fetch_add(bytes_to_add, Ordering::SeqCst);
        self.waker.wake();
    }

    fn try_reserve(&self, mut amount: u32) -> Option<u32> {
        let reserved = self
            .inner
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |window| {
                if amount <= window {
                    Some(window - amount)
                } else {
                    amount = window;

                    if amount > 0 {
                        Some(0)
                    } else {
                        None
                    }
                }
            })
            .is_ok();

        if reserved {
            Some(amount)
        } else {
            None
        }
    }

    /// Reserve up to `amount` bytes of the allowance, suspending while the
    /// window is empty.
    pub fn poll_reserve(&self, cx: &mut task::Context, amount: u32) -> task::Poll<u32> {
        if let Some(size) = self.try_reserve(amount) {
            task::Poll::Ready(size)
        } else {
            // TODO: Host a collection of wakers to allow concurrent writers.
            assert!(
                self.waker.take().is_none(),
                "Only one writer may wait on the window at a time"
            );

            self.waker.register(cx.waker());
            task::Poll::Pending
        }
    }
}

impl From<u32> for RemoteWindow {
    fn from(value: u32) -> Self {
        Self {
            inner: value.into(),
            waker: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_window_adjusts_below_threshold() {
        let window = LocalWindow::default();

        window.consume(LocalWindow::MAXIMUM_PACKET_SIZE);
        assert_eq!(window.adjustable(), None);

        window.consume(LocalWindow::MAXIMUM_PACKET_SIZE * 4);
        assert_eq!(
            window.adjustable(),
            Some(LocalWindow::MAXIMUM_PACKET_SIZE * 5)
        );
        assert_eq!(window.size(), LocalWindow::INITIAL_WINDOW_SIZE);
    }

    #[test]
    fn remote_window_reserves_up_to_the_allowance() {
        let window = RemoteWindow::from(10);

        assert_eq!(window.try_reserve(4), Some(4));
        assert_eq!(window.try_reserve(16), Some(6));
        assert_eq!(window.try_reserve(1), None);

        window.replenish(8);
        assert_eq!(window.try_reserve(16), Some(8));
    }
}
