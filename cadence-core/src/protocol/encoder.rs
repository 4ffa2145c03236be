use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::state::Snapshot;

/// The object that opens the output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub version: u32,
    pub click_events: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cont_signal: Option<i32>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: 1,
            click_events: true,
            stop_signal: None,
            cont_signal: None,
        }
    }
}

/// Writes the status stream. Only one `Encoder` ever owns the output.
#[derive(Debug)]
pub struct Encoder<W> {
    out: W,
    lines: u64,
}

impl<W: AsyncWrite + Unpin> Encoder<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    pub async fn write_header(&mut self, header: &Header) -> Result<(), ProtocolError> {
        let mut buf = serde_json::to_vec(header).map_err(ProtocolError::Encode)?;
        buf.push(b'\n');
        self.out.write_all(&buf).await?;
        self.out.flush().await?;
        Ok(())
    }

    /// Serialize one status line without writing it: `[` + list for the
    /// first line, `,` + list afterwards.
    pub fn encode_line(&self, snapshots: &[Arc<Snapshot>]) -> Result<Vec<u8>, ProtocolError> {
        let list: Vec<&Snapshot> = snapshots.iter().map(Arc::as_ref).collect();

        let mut buf = Vec::with_capacity(64 + 96 * list.len());
        buf.push(if self.lines == 0 { b'[' } else { b',' });
        serde_json::to_writer(&mut buf, &list).map_err(ProtocolError::Encode)?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Emit one full status line. The line is built in memory first, so
    /// an encoding failure writes nothing.
    pub async fn render(&mut self, snapshots: &[Arc<Snapshot>]) -> Result<(), ProtocolError> {
        let buf = self.encode_line(snapshots)?;
        self.out.write_all(&buf).await?;
        self.out.flush().await?;
        self.lines += 1;
        Ok(())
    }

    /// Close the array if it was ever opened.
    pub async fn finish(&mut self) -> Result<(), ProtocolError> {
        if self.lines > 0 {
            self.out.write_all(b"]\n").await?;
        }
        self.out.flush().await?;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
