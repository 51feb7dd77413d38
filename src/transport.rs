use std::sync::mpsc::Sender;

use crate::errors::{LinkError, Result};
use crate::geo::GeoPoint;


/// Messages the link publishes towards the vehicle.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundMessage {
    Active(bool),
    HelmMode(String),
    Waypoints(Vec<GeoPoint>),
    Loiter(GeoPoint),
    Goto(GeoPoint),
}


/// Provides an interface to the publish/subscribe transport. Implementations
/// must not block: a publish enqueues and returns.
pub trait Transport: Send + Sync {
    fn publish(&self, message: OutboundMessage) -> Result<()>;

    /// Releases every subscription feeding the link. Called on teardown.
    fn unsubscribe_all(&self) {}
}


/**
 * Hands outbound messages to whoever holds the receiving end of a channel,
 * typically the thread that owns the real transport.
 */
pub struct ChannelTransport {
    outbound_tx: Sender<OutboundMessage>,
}


impl ChannelTransport {
    pub fn new(outbound_tx: Sender<OutboundMessage>) -> ChannelTransport {
        ChannelTransport { outbound_tx }
    }
}


impl Transport for ChannelTransport {
    fn publish(&self, message: OutboundMessage) -> Result<()> {
        self.outbound_tx
            .send(message)
            .map_err(|e| LinkError::Transport(format!("outbound channel closed: {}", e)))
    }
}


#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use super::{ChannelTransport, OutboundMessage, Transport};
    use crate::errors::LinkError;

    #[test]
    fn test_channel_transport() {
        let (outbound_tx, outbound_rx) = channel();
        let transport = ChannelTransport::new(outbound_tx);
        transport.publish(OutboundMessage::Active(true)).unwrap();
        assert_eq!(outbound_rx.try_recv().unwrap(), OutboundMessage::Active(true));

        drop(outbound_rx);
        match transport.publish(OutboundMessage::Active(false)) {
            Err(LinkError::Transport(_)) => (),
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
