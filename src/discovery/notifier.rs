//! Broadcast of newly discovered attendants

use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::metrics;
use crate::models::DiscoveryEvent;

/// Stream of discovery events handed to one subscriber
pub type DiscoveryStream = BoxStream<'static, DiscoveryEvent>;

/// Multi-subscriber fan-out of [`DiscoveryEvent`]s.
///
/// Each subscriber owns an unbounded queue, so a whole roster snapshot is
/// delivered no matter how slowly it is drained. Ending the notifier drops
/// every sender and each stream finishes after its buffered events.
#[derive(Debug)]
pub struct DiscoveryNotifier {
    subscribers: Mutex<Option<Vec<mpsc::UnboundedSender<DiscoveryEvent>>>>,
}

impl DiscoveryNotifier {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Some(Vec::new())),
        }
    }

    /// Publish an event; returns how many subscribers received it
    pub fn notify(&self, event: DiscoveryEvent) -> usize {
        metrics::record_attendant_discovered();
        let mut subscribers = self.subscribers.lock();
        let Some(senders) = subscribers.as_mut() else {
            return 0;
        };
        // Subscribers that dropped their stream fall out here
        senders.retain(|sender| sender.send(event.clone()).is_ok());
        senders.len()
    }

    /// Raw receiver; closed immediately once the notifier has ended
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DiscoveryEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Some(senders) = self.subscribers.lock().as_mut() {
            senders.push(sender);
        }
        receiver
    }

    /// Subscribe as a stream
    pub fn listen(&self) -> DiscoveryStream {
        UnboundedReceiverStream::new(self.subscribe()).boxed()
    }

    /// End every subscription. Returns false if already ended.
    pub fn end(&self) -> bool {
        self.subscribers.lock().take().is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.subscribers.lock().is_none()
    }
}

impl Default for DiscoveryNotifier {
    fn default() -> Self {
        Self::new()
    }
}
