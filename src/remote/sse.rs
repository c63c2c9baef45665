use std::collections::VecDeque;

use crate::error::{AppError, Result};

/// Longest line accepted before the stream is considered broken.
const MAX_LINE: usize = 64 * 1024;
/// Largest joined `data:` payload of one event.
const MAX_EVENT: usize = 1024 * 1024;

/// Incremental decoder for a `text/event-stream` body.
///
/// Bytes are pushed as they arrive; complete events come out as the joined
/// `data:` payload. Comments, `event:`, `id:` and `retry:` fields are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a line break.
    scanned: usize,
    data: Vec<String>,
    data_len: usize,
    ready: VecDeque<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the response body.
    ///
    /// Fails once a line or an event outgrows its limit; the decoder is
    /// reset and the connection should be dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        let mut consumed = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.buffer[from..].iter().position(|&b| b == b'\n') {
            let end = from + pos;
            let raw = &self.buffer[consumed..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw).into_owned();
            consumed = end + 1;
            from = consumed;
            if let Err(e) = self.process_line(&line) {
                self.reset();
                return Err(e);
            }
        }
        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();
        if self.buffer.len() > MAX_LINE {
            self.reset();
            return Err(AppError::Stream(format!(
                "event stream line longer than {} bytes",
                MAX_LINE
            )));
        }
        Ok(())
    }

    /// Next fully received event payload, if any.
    pub fn next_event(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.data.clear();
        self.data_len = 0;
    }

    fn process_line(&mut self, line: &str) -> Result<()> {
        if line.is_empty() {
            if !self.data.is_empty() {
                self.ready.push_back(self.data.join("\n"));
                self.data.clear();
                self.data_len = 0;
            }
            return Ok(());
        }
        if line.starts_with(':') {
            return Ok(());
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data_len += value.len() + 1;
            if self.data_len > MAX_EVENT {
                return Err(AppError::Stream(format!(
                    "event stream payload larger than {} bytes",
                    MAX_EVENT
                )));
            }
            self.data.push(value.to_string());
        }
        Ok(())
    }
}
