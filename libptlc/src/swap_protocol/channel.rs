use crate::error::ReadError;
use crate::swap_protocol::messages::SwapMessage;
use crate::swap_protocol::utils::Writable;
use log::*;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("The channel to the counterparty is closed")]
    Closed,
    #[error("No message from the counterparty within {0:?}")]
    Timeout(Duration),
    #[error("Received a malformed frame: {0}")]
    Decode(ReadError),
    #[error("Could not encode {0}")]
    Encode(String),
}

/// An ordered, reliable, point-to-point channel to the counterparty.
///
/// Messages arrive in the order they were sent and are never lost or duplicated. `recv` waits until a message
/// arrives or the channel closes.
pub trait MessageChannel: Send {
    fn send(&mut self, message: SwapMessage) -> impl Future<Output = Result<(), ChannelError>> + Send;

    fn recv(&mut self) -> impl Future<Output = Result<SwapMessage, ChannelError>> + Send;

    /// Receive with a liveness timeout. `None` waits indefinitely.
    fn recv_timeout(
        &mut self,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<SwapMessage, ChannelError>> + Send {
        async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, self.recv()).await.map_err(|_| ChannelError::Timeout(limit))?,
                None => self.recv().await,
            }
        }
    }
}

/// One end of an in-process duplex channel. Messages travel as encoded frames so that both ends exercise the codec.
pub struct InMemoryChannel {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl InMemoryChannel {
    /// Two connected ends. `capacity` frames may be buffered in each direction.
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel(capacity);
        let (tx_b, rx_a) = mpsc::channel(capacity);
        (Self { tx: tx_a, rx: rx_a }, Self { tx: tx_b, rx: rx_b })
    }

    /// Send a raw frame, bypassing the encoder.
    pub async fn send_frame(&mut self, frame: Vec<u8>) -> Result<(), ChannelError> {
        self.tx.send(frame).await.map_err(|_| ChannelError::Closed)
    }
}

impl MessageChannel for InMemoryChannel {
    async fn send(&mut self, message: SwapMessage) -> Result<(), ChannelError> {
        trace!("Sending {message}");
        let mut frame = Vec::new();
        message.write(&mut frame).map_err(|e| ChannelError::Encode(format!("{message}: {e}")))?;
        self.send_frame(frame).await
    }

    async fn recv(&mut self) -> Result<SwapMessage, ChannelError> {
        let frame = self.rx.recv().await.ok_or(ChannelError::Closed)?;
        let message = SwapMessage::decode(&frame).map_err(ChannelError::Decode)?;
        trace!("Received {message}");
        Ok(message)
    }
}
