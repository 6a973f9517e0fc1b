//! Handshake arrival signalling between the receive path and the driver.
//!
//! The receive path pushes a message into the cache and then calls
//! [`Notifier::notify`]. The driver wakes up with an [`Arrival`], re-parses
//! the cache, and drops the arrival, which releases the notifier. This keeps
//! the receive path from racing ahead of the state machine.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use crate::Error;

/// Create a connected notifier and listener.
pub fn channel() -> (Notifier, Listener) {
    let (tx, rx) = mpsc::sync_channel(0);
    (Notifier { tx }, Listener { rx })
}

/// Receive-path side. Cloneable.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: SyncSender<Arrival>,
}

impl Notifier {
    /// Signal a handshake arrival and wait until the driver has processed it.
    pub fn notify(&self) -> Result<(), Error> {
        self.send(false)
    }

    /// Signal that the peer resent a flight we already consumed, so our
    /// answer to it was probably lost.
    pub fn notify_retransmit(&self) -> Result<(), Error> {
        self.send(true)
    }

    fn send(&self, is_retransmit: bool) -> Result<(), Error> {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let arrival = Arrival {
            is_retransmit,
            done: Some(done_tx),
        };
        self.tx.send(arrival).map_err(|_| Error::ConnectionClosed)?;
        // Err here means the arrival was dropped without an ack, which is
        // still an ack.
        let _ = done_rx.recv();
        Ok(())
    }
}

/// Driver side.
#[derive(Debug)]
pub struct Listener {
    rx: Receiver<Arrival>,
}

impl Listener {
    /// Wait for an arrival. `Ok(None)` on timeout.
    pub fn wait(&self, timeout: Duration) -> Result<Option<Arrival>, Error> {
        match self.rx.recv_timeout(timeout) {
            Ok(arrival) => Ok(Some(arrival)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::ConnectionClosed),
        }
    }

    /// Take an arrival that is already waiting, without blocking.
    pub fn try_wait(&self) -> Option<Arrival> {
        self.rx.try_recv().ok()
    }
}

/// One handshake arrival. Dropping it acknowledges the notifier.
#[derive(Debug)]
pub struct Arrival {
    pub is_retransmit: bool,
    done: Option<SyncSender<()>>,
}

impl Drop for Arrival {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn notify_waits_for_ack() {
        let (notifier, listener) = channel();
        let handle = thread::spawn(move || notifier.notify());

        let arrival = listener.wait(Duration::from_secs(5)).unwrap().unwrap();
        assert!(!handle.is_finished());
        drop(arrival);

        handle.join().unwrap().unwrap();
    }

    #[test]
    fn retransmit_flag() {
        let (notifier, listener) = channel();
        let handle = thread::spawn(move || notifier.notify_retransmit());

        let arrival = listener.wait(Duration::from_secs(5)).unwrap().unwrap();
        assert!(arrival.is_retransmit);
        drop(arrival);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn wait_times_out() {
        let (_notifier, listener) = channel();
        let arrival = listener.wait(Duration::from_millis(10)).unwrap();
        assert!(arrival.is_none());
    }

    #[test]
    fn closed_listener() {
        let (notifier, listener) = channel();
        drop(listener);
        assert!(matches!(notifier.notify(), Err(Error::ConnectionClosed)));
    }
}
