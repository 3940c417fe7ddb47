//! Network-interface change notifications.
//!
//! The host platform owns the actual network monitoring; all the caches need
//! to know is *that* the active interface changed, so they can retry whatever
//! failed while the device was offline.

use std::future::pending;
use std::time::Duration;
use tokio::sync::watch;

/// Delay between a connectivity change and the retry it triggers.
///
/// Interfaces tend to flap while a device roams between networks; waiting a
/// short moment (and restarting the wait on every new event) coalesces a
/// burst of changes into a single retry.
pub const DEFAULT_RETRY_DEBOUNCE: Duration = Duration::from_millis(250);

/// Producer side of the connectivity signal.
///
/// # Examples
///
/// ```
/// use lisu_remote::ConnectivityMonitor;
///
/// let monitor = ConnectivityMonitor::new();
/// let signal = monitor.signal();
/// monitor.notify(Some("wlan0".to_string()));
/// # drop(signal);
/// ```
#[derive(Debug)]
pub struct ConnectivityMonitor {
    sender: watch::Sender<Option<String>>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(None);
        Self { sender }
    }

    /// Publish that the active network interface changed.
    ///
    /// Every subscribed signal is woken, even if the interface identifier is
    /// the same as before (reconnecting to the same network still counts).
    pub fn notify(&self, interface: Option<String>) {
        tracing::debug!(interface = interface.as_deref().unwrap_or("none"), "Active network interface changed");
        self.sender.send_replace(interface);
    }

    /// The most recently reported interface identifier.
    pub fn current(&self) -> Option<String> {
        self.sender.borrow().clone()
    }

    /// Hand out a new subscriber.
    pub fn signal(&self) -> ConnectivitySignal {
        ConnectivitySignal {
            receiver: Some(self.sender.subscribe()),
            debounce: DEFAULT_RETRY_DEBOUNCE,
        }
    }
}
impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber side of the connectivity signal, handed to every cache.
///
/// Only the occurrence of a change is observed, never its value. Once the
/// [`ConnectivityMonitor`] is dropped the signal goes quiet forever.
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    receiver: Option<watch::Receiver<Option<String>>>,
    debounce: Duration,
}

impl ConnectivitySignal {
    /// A signal that never fires. Automatic retry is effectively disabled.
    pub fn never() -> Self {
        Self { receiver: None, debounce: DEFAULT_RETRY_DEBOUNCE }
    }

    /// Change the delay between a connectivity change and the retry.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Forget any change that happened before this point.
    pub(crate) fn mark_seen(&mut self) {
        if let Some(receiver) = self.receiver.as_mut() {
            receiver.borrow_and_update();
        }
    }

    /// Resolves on the next change. Pending forever once the producer is gone.
    pub(crate) async fn changed(&mut self) {
        if let Some(receiver) = self.receiver.as_mut() {
            if receiver.changed().await.is_ok() {
                return;
            }
            tracing::trace!("Connectivity monitor dropped; automatic retry disabled");
            self.receiver = None;
        }
        pending::<()>().await
    }
}
