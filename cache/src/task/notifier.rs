use crate::listener::{EvictionListener, EvictionReason};

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use fibre::mpsc;

/// A message sent to the notifier task.
pub(crate) type Notification<K, V> = (K, Arc<V>, EvictionReason);

const NOTIFICATION_CHANNEL_CAPACITY: usize = 128;

/// The background thread responsible for calling a user-provided eviction
/// listener.
pub(crate) struct Notifier<K: Send, V: Send + Sync> {
  handle: JoinHandle<()>,
  sender: mpsc::BoundedSender<Notification<K, V>>,
}

impl<K: Send, V: Send + Sync> Notifier<K, V> {
  /// Spawns the notifier thread.
  pub(crate) fn spawn(listener: Arc<dyn EvictionListener<K, V>>) -> Self
  where
    K: 'static,
    V: 'static,
  {
    let (tx, rx): (
      mpsc::BoundedSender<Notification<K, V>>,
      mpsc::BoundedReceiver<Notification<K, V>>,
    ) = mpsc::bounded(NOTIFICATION_CHANNEL_CAPACITY);

    let handle = thread::Builder::new()
      .name("slru-notifier".into())
      .spawn(move || {
        // Ends once the sender owned by the notifier is dropped.
        while let Ok((key, value, reason)) = rx.recv() {
          listener.on_evict(key, value, reason);
        }
        tracing::debug!("eviction notifier stopped");
      })
      .unwrap_or_else(|e| panic!("failed to spawn eviction notifier thread: {e}"));

    Self { handle, sender: tx }
  }

  /// Queues a notification. Dropped when the listener is falling behind.
  pub(crate) fn notify(&self, key: K, value: Arc<V>, reason: EvictionReason) {
    if self.sender.try_send((key, value, reason)).is_err() {
      tracing::trace!(%reason, "eviction notification dropped, listener is falling behind");
    }
  }

  /// Disconnects the channel and waits for queued notifications to be
  /// delivered.
  pub(crate) fn stop(self) {
    let Self { handle, sender } = self;
    drop(sender);
    // The last cache handle may be released by the listener itself.
    if handle.thread().id() != thread::current().id() {
      let _ = handle.join();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use parking_lot::Mutex;

  struct Recorder(Mutex<Vec<(u32, EvictionReason)>>);

  impl EvictionListener<u32, String> for Recorder {
    fn on_evict(&self, key: u32, _value: Arc<String>, reason: EvictionReason) {
      self.0.lock().push((key, reason));
    }
  }

  #[test]
  fn stop_flushes_queued_notifications() {
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let notifier = Notifier::spawn(recorder.clone());
    notifier.notify(1, Arc::new("a".into()), EvictionReason::Capacity);
    notifier.notify(2, Arc::new("b".into()), EvictionReason::Cleared);
    notifier.stop();

    assert_eq!(
      *recorder.0.lock(),
      vec![(1, EvictionReason::Capacity), (2, EvictionReason::Cleared)]
    );
  }
}
