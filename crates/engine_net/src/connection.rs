//! NATS room transport.
//!
//! Each race room is one NATS subject (see [`subjects::room`]). A
//! [`NatsTransport`] owns two background tasks: a reader that decodes every
//! message published to the room into an inbound channel, and a writer that
//! encodes and publishes whatever the simulation queues. The simulation only
//! ever touches the channel ends, so it never awaits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::WireFormat;
use crate::error::NetError;
use crate::messages::NetworkMessage;
use crate::subjects;
use crate::transport::{Transport, new_client_id};

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// Where and as whom to join a race room.
#[derive(Debug, Clone, PartialEq)]
pub struct NatsConfig {
    /// Server URL. Defaults to `$NATS_URL`, then [`DEFAULT_NATS_URL`].
    pub url: String,
    /// Race room name.
    pub room: String,
    /// This client's id. Defaults to a random UUID.
    pub client_id: String,
    /// Payload encoding.
    pub format: WireFormat,
}

impl NatsConfig {
    #[must_use]
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            url: std::env::var(NATS_URL_ENV).unwrap_or_else(|_| DEFAULT_NATS_URL.to_string()),
            room: room.into(),
            client_id: new_client_id(),
            format: WireFormat::default(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }
}

/// A [`Transport`] publishing to and subscribed on one NATS room subject.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct NatsTransport {
    client_id: String,
    subject: String,
    outbound: mpsc::UnboundedSender<NetworkMessage>,
    inbound: mpsc::UnboundedReceiver<NetworkMessage>,
    connected: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl NatsTransport {
    /// Connect to the server and join the configured room.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the server is unreachable, or
    /// [`NetError::Subscribe`] if the room subscription fails.
    pub async fn connect(config: NatsConfig) -> Result<Self, NetError> {
        let subject = subjects::room(&config.room);
        info!(url = config.url, subject, client_id = config.client_id, "connecting to NATS");
        let client = async_nats::connect(config.url.as_str()).await?;
        let mut subscriber = client.subscribe(subject.clone()).await?;
        info!(subject, "joined race room");

        let connected = Arc::new(AtomicBool::new(true));
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<NetworkMessage>();
        let format = config.format;

        let reader_connected = Arc::clone(&connected);
        let reader = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                match format.decode::<NetworkMessage>(message.payload.as_ref()) {
                    Ok(decoded) => {
                        if in_tx.send(decoded).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping malformed room message"),
                }
            }
            reader_connected.store(false, Ordering::Release);
            debug!("room reader stopped");
        });

        let writer_subject = subject.clone();
        let writer = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let payload = match format.encode(&message) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, kind = message.kind(), "failed to encode outbound message");
                        continue;
                    }
                };
                if let Err(e) = client.publish(writer_subject.clone(), payload.into()).await {
                    warn!(error = %e, kind = message.kind(), "failed to publish room message");
                }
            }
            debug!("room writer stopped");
        });

        Ok(Self {
            client_id: config.client_id,
            subject,
            outbound: out_tx,
            inbound: in_rx,
            connected,
            tasks: vec![reader, writer],
        })
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl Transport for NatsTransport {
    fn local_id(&self) -> &str {
        &self.client_id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&mut self, message: &NetworkMessage) -> Result<(), NetError> {
        if !self.is_connected() {
            return Err(NetError::Disconnected);
        }
        self.outbound
            .send(message.clone())
            .map_err(|_| NetError::Disconnected)
    }

    fn receive(&mut self) -> Vec<NetworkMessage> {
        let mut received = Vec::new();
        while let Ok(message) = self.inbound.try_recv() {
            received.push(message);
        }
        received
    }

    fn disconnect(&mut self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            info!(subject = self.subject, "leaving race room");
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.inbound.close();
    }
}

impl Drop for NatsTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
