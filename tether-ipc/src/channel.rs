//! Duplex message channel backed by reader and writer tasks
//!
//! A [`Channel`] owns one end of a byte stream pair. Inbound frames are decoded
//! by a background reader task and queued; outbound messages are queued and
//! written by a background writer task, so [`Channel::send`] never suspends.
//! Each direction is FIFO.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::IpcError;
use crate::protocol::Message;
use crate::transport::{FrameReader, FrameWriter};

type Inbound = Result<Message, IpcError>;

pub struct Channel {
    outbound: Option<mpsc::UnboundedSender<Message>>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    pending: Option<Inbound>,
    closed: bool,
    reader_task: JoinHandle<()>,
    writer_task: Option<JoinHandle<()>>,
}

impl Channel {
    /// Build a channel over a reader/writer pair. Must be called within a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(read_frames(FrameReader::new(reader), inbound_tx));
        let writer_task = tokio::spawn(write_frames(FrameWriter::new(writer), outbound_rx));

        Self {
            outbound: Some(outbound_tx),
            inbound: inbound_rx,
            pending: None,
            closed: false,
            reader_task,
            writer_task: Some(writer_task),
        }
    }

    /// Channel over this process's stdin/stdout, used inside worker processes
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Queue a message for the other end
    pub fn send(&self, message: Message) -> Result<(), IpcError> {
        let outbound = self.outbound.as_ref().ok_or(IpcError::ConnectionClosed)?;
        outbound
            .send(message)
            .map_err(|_| IpcError::ConnectionClosed)
    }

    /// Wait up to `timeout` for something to receive.
    ///
    /// Returns true when a message, a frame error or the end of the stream is
    /// ready, so that the next `recv` completes without suspending.
    pub async fn poll(&mut self, timeout: Duration) -> bool {
        if self.pending.is_some() || self.closed {
            return true;
        }

        match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Ok(Some(item)) => {
                self.pending = Some(item);
                true
            }
            Ok(None) => {
                self.closed = true;
                true
            }
            Err(_) => false,
        }
    }

    /// Receive the next message, waiting indefinitely
    pub async fn recv(&mut self) -> Result<Message, IpcError> {
        if let Some(item) = self.pending.take() {
            return item;
        }
        if self.closed {
            return Err(IpcError::ConnectionClosed);
        }

        match self.inbound.recv().await {
            Some(item) => item,
            None => {
                self.closed = true;
                Err(IpcError::ConnectionClosed)
            }
        }
    }

    /// Receive the next message if one arrives within `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Message>, IpcError> {
        if self.poll(timeout).await {
            self.recv().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// True once the other end has closed and every queued message was received
    pub fn is_closed(&self) -> bool {
        self.closed && self.pending.is_none()
    }

    /// Stop accepting outbound messages; already queued ones are still written
    pub fn finish_sending(&mut self) {
        self.outbound.take();
    }

    /// Flush queued outbound messages and shut the write side down
    pub async fn close(&mut self) {
        self.finish_sending();
        if let Some(writer_task) = self.writer_task.take() {
            if let Err(e) = writer_task.await {
                warn!("Channel writer task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_frames<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    loop {
        match reader.read_frame().await {
            Ok(message) => {
                if inbound.send(Ok(message)).is_err() {
                    break;
                }
            }
            Err(IpcError::ConnectionClosed) => {
                debug!("Channel peer closed the stream");
                break;
            }
            Err(e) if e.is_frame_error() => {
                warn!("Dropping undecodable frame: {}", e);
                if inbound.send(Err(e)).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Channel read failed: {}", e);
                let _ = inbound.send(Err(e));
                break;
            }
        }
    }
}

async fn write_frames<W: AsyncWrite + Unpin>(
    mut writer: FrameWriter<W>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = writer.write_frame(message).await {
            warn!("Channel write failed: {}", e);
            return;
        }
    }

    if let Err(e) = writer.close().await {
        debug!("Channel writer shutdown: {}", e);
    }
}
