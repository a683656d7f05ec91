//! Incremental line assembly for the vpncli output streams
//!
//! The client's output arrives in arbitrary chunks, not whole lines, and
//! is not UTF-8 on a Japanese Windows console (vpncli writes Shift-JIS).
//! This buffer accumulates raw bytes across deliveries, splits on any
//! line-ending convention, and decodes each complete line with the
//! configured console encoding.

use encoding_rs::Encoding;

/// Resolve a console encoding by its WHATWG label (e.g. "shift_jis")
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.as_bytes())
}

/// Byte buffer that yields complete decoded lines
pub struct LineBuffer {
    encoding: &'static Encoding,
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create a new buffer decoding with the given console encoding
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
        }
    }

    /// Feed a chunk of raw bytes, returning all lines completed by it
    ///
    /// Lines are decoded lossily and returned untrimmed; a trailing
    /// partial line stays buffered until its terminator arrives.
    /// Handles `\n`, `\r\n` and bare `\r` terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < self.pending.len() {
            match self.pending[i] {
                b'\n' => {
                    lines.push(self.decode(&self.pending[start..i]));
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    // A `\r` as the final buffered byte may be half of a
                    // `\r\n` pair; wait for the next chunk to decide.
                    if i + 1 == self.pending.len() {
                        break;
                    }
                    lines.push(self.decode(&self.pending[start..i]));
                    i += if self.pending[i + 1] == b'\n' { 2 } else { 1 };
                    start = i;
                }
                _ => i += 1,
            }
        }

        self.pending.drain(..start);
        lines
    }

    /// Drain the trailing unterminated line, if any
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = self.decode(&self.pending);
        self.pending.clear();
        // A lone buffered `\r` decodes to an empty line
        let line = line.trim_end_matches('\r').to_string();
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        // No BOM sniffing: a line starting with BOM-shaped bytes must not
        // switch the decoder away from the configured console encoding
        let (decoded, _) = self.encoding.decode_without_bom_handling(bytes);
        decoded.into_owned()
    }
}
