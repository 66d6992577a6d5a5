//! Line-delimited JSON framing over async byte streams

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::IpcError;
use crate::protocol::{Message, MessageEnvelope, IPC_PROTOCOL_VERSION};

/// Reads one enveloped message per line
pub struct FrameReader<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::new(),
        }
    }

    /// Read the next message, skipping blank lines
    pub async fn read_frame(&mut self) -> Result<Message, IpcError> {
        loop {
            self.line.clear();
            let read = self.reader.read_until(b'\n', &mut self.line).await?;
            if read == 0 {
                return Err(IpcError::ConnectionClosed);
            }

            // Undecodable bytes only spoil this line
            let frame = std::str::from_utf8(&self.line)
                .map_err(|e| IpcError::DeserializationError(e.to_string()))?
                .trim();
            if frame.is_empty() {
                continue;
            }

            let envelope: MessageEnvelope = serde_json::from_str(frame)
                .map_err(|e| IpcError::DeserializationError(e.to_string()))?;

            if !envelope.is_compatible() {
                return Err(IpcError::ProtocolVersionMismatch {
                    expected: IPC_PROTOCOL_VERSION,
                    actual: envelope.protocol_version,
                });
            }

            return Ok(envelope.message);
        }
    }
}

/// Writes one enveloped message per line
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Wrap `message` in an envelope and write it followed by a newline
    pub async fn write_frame(&mut self, message: Message) -> Result<(), IpcError> {
        let envelope = MessageEnvelope::new(message);
        let mut json = serde_json::to_string(&envelope)
            .map_err(|e| IpcError::SerializationError(e.to_string()))?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Flush and shut down the underlying stream
    pub async fn close(&mut self) -> Result<(), IpcError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Arguments;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_frames_cross_a_pipe_in_order() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer
            .write_frame(Message::new("increment", Arguments::new().kwarg("by", 5)))
            .await
            .unwrap();
        writer.write_frame(Message::exit()).await.unwrap();
        writer.close().await.unwrap();

        let first = reader.read_frame().await.unwrap();
        assert_eq!(first.operation, "increment");
        assert_eq!(first.arguments.kwargs["by"], 5);
        assert_eq!(reader.read_frame().await.unwrap(), Message::exit());
        assert!(matches!(
            reader.read_frame().await,
            Err(IpcError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_version_mismatch_and_garbage() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        let stale = concat!(
            "\n",
            r#"{"protocol_version":99,"timestamp":"2024-01-01T00:00:00Z","#,
            r#""message":{"operation":"exit"}}"#,
            "\nnot json\n",
        );
        client.write_all(stale.as_bytes()).await.unwrap();

        assert!(matches!(
            reader.read_frame().await,
            Err(IpcError::ProtocolVersionMismatch {
                expected: IPC_PROTOCOL_VERSION,
                actual: 99
            })
        ));
        assert!(matches!(
            reader.read_frame().await,
            Err(IpcError::DeserializationError(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8_spoils_only_its_line() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        client.write_all(b"\xff\xfe\n").await.unwrap();
        let mut writer = FrameWriter::new(client);
        writer.write_frame(Message::exit()).await.unwrap();

        let err = reader.read_frame().await.unwrap_err();
        assert!(err.is_frame_error(), "unexpected error: {:?}", err);
        assert_eq!(reader.read_frame().await.unwrap(), Message::exit());
    }
}
