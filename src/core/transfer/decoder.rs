/// Incremental bytes-to-text decoder for the receive path.
///
/// ASCII passes through one byte per character. A multi-byte UTF-8 sequence
/// cut off at the end of a read is held back and completed by the next read,
/// so the device's choice of chunk boundaries never changes the text.
/// Bytes that can never form valid UTF-8 become U+FFFD.
#[derive(Debug, Default)]
pub struct TextDecoder {
    pending: Vec<u8>,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next read. May return an empty string when the whole read
    /// was the start of a sequence that is still incomplete.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut text = String::with_capacity(self.pending.len());
        let mut start = 0;

        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    start = self.pending.len();
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        // Truncated sequence at the end, keep it for later
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        text
    }

    /// Flush whatever is still held back
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    /// Number of bytes held back waiting for the rest of a sequence
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
