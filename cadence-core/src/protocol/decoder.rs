use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::trace;

use crate::error::ProtocolError;
use crate::protocol::ClickEvent;

/// Reads click events, one JSON object per line.
#[derive(Debug)]
pub struct Decoder<R> {
    input: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> Decoder<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            buf: Vec::with_capacity(512),
        }
    }

    /// Next click, skipping framing-only lines. `None` at end of input.
    /// A malformed line yields one `Err` and leaves the decoder usable.
    pub async fn next_event(&mut self) -> Option<Result<ClickEvent, ProtocolError>> {
        loop {
            self.buf.clear();
            match self.input.read_until(b'\n', &mut self.buf).await {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(ProtocolError::Io(e))),
            }

            let line = String::from_utf8_lossy(&self.buf);
            if let Some(event) = parse_line(&line) {
                return Some(event);
            }
            trace!(line = %line.trim_end(), "skipping framing line");
        }
    }
}

/// Decode one input line. Returns `None` for lines that carry only
/// framing (`[`, `]`, a lone comma, or nothing).
pub fn parse_line(line: &str) -> Option<Result<ClickEvent, ProtocolError>> {
    let mut body = line.trim();

    if let Some(rest) = body.strip_prefix('[') {
        body = rest.trim_start();
    }
    if let Some(rest) = body.strip_prefix(',') {
        body = rest.trim_start();
    }
    if let Some(rest) = body.strip_suffix(',') {
        body = rest.trim_end();
    }

    if body.is_empty() || body == "]" {
        return None;
    }

    Some(
        serde_json::from_str(body).map_err(|source| ProtocolError::MalformedInputEvent {
            line: line.trim_end().to_string(),
            source,
        }),
    )
}
