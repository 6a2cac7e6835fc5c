//! Stream transport abstraction
//!
//! A [`Transport`] is one open stream connection: text frames out, text
//! frames in. The session controller never sees what carries the frames;
//! the in-process pair below backs tests and loopback wiring, and the demo
//! server speaks the same frames over WebSocket.

use futures::future::BoxFuture;
use ods_core::error::SessionError;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

const CHANNEL_DEPTH: usize = 64;

/// One established stream connection
pub struct Transport {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<String>,
}

impl Transport {
    /// Connected in-process pair: what one end sends the other receives.
    pub fn pair() -> (Transport, Transport) {
        let (a_tx, a_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (b_tx, b_rx) = mpsc::channel(CHANNEL_DEPTH);
        (
            Transport {
                outbound: a_tx,
                inbound: b_rx,
            },
            Transport {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }

    pub async fn send(&self, frame: String) -> Result<(), SessionError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| SessionError::Connection("transport closed".to_string()))
    }
}

/// Opens one transport per session
pub trait Connector: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<Transport, SessionError>>;
}

/// Connector over pre-established transports, handing each out once.
///
/// An exhausted connector fails with a connection error, which is also how
/// tests exercise the unreachable-backend path.
pub struct StaticConnector {
    slots: Mutex<VecDeque<Transport>>,
}

impl StaticConnector {
    pub fn new(transport: Transport) -> Self {
        Self {
            slots: Mutex::new(VecDeque::from([transport])),
        }
    }

    pub fn empty() -> Self {
        Self {
            slots: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, transport: Transport) {
        self.slots.lock().unwrap().push_back(transport);
    }
}

impl Connector for StaticConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Transport, SessionError>> {
        Box::pin(async {
            self.slots
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SessionError::Connection("no transport available".to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_both_directions() {
        let (client, mut server) = Transport::pair();

        client.send("hello".to_string()).await.unwrap();
        assert_eq!(server.inbound.recv().await.unwrap(), "hello");

        server.send("world".to_string()).await.unwrap();
        let mut client = client;
        assert_eq!(client.inbound.recv().await.unwrap(), "world");
    }

    #[tokio::test]
    async fn test_send_after_peer_dropped_fails() {
        let (client, server) = Transport::pair();
        drop(server);
        let err = client.send("hello".to_string()).await.unwrap_err();
        assert!(matches!(err, SessionError::Connection(_)));
    }

    #[tokio::test]
    async fn test_static_connector_hands_out_once() {
        let (client, _server) = Transport::pair();
        let connector = StaticConnector::new(client);

        assert!(connector.connect().await.is_ok());
        assert!(matches!(
            connector.connect().await,
            Err(SessionError::Connection(_))
        ));
    }
}
