use anyhow::{bail, Result};

/// Largest payload that still fits the four-hex-digit length prefix.
pub const MAX_PAYLOAD: usize = 65519;

/// Frames a payload as `hex4(len + 4) · payload`.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        bail!(
            "pkt-line payload of {} bytes exceeds the {} byte maximum",
            payload.len(),
            MAX_PAYLOAD
        );
    }
    let mut out = format!("{:04x}", payload.len() + 4).into_bytes();
    out.extend_from_slice(payload);
    Ok(out)
}

/// Lazy pkt-line decoder. Flush packets (`0000`) are consumed silently; the
/// reserved lengths 1-3, a malformed length, or truncation end the sequence.
/// With `trimmed`, a single trailing `\n` is stripped from each payload.
pub struct PktLines<'a> {
    data: &'a [u8],
    pos: usize,
    trim_newline: bool,
}

impl<'a> PktLines<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            trim_newline: false,
        }
    }

    pub fn trimmed(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            trim_newline: true,
        }
    }
}

impl<'a> Iterator for PktLines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        loop {
            if self.pos + 4 > self.data.len() {
                return None;
            }
            let len_hex = std::str::from_utf8(&self.data[self.pos..self.pos + 4]).ok()?;
            let len = usize::from_str_radix(len_hex, 16).ok()?;

            if len == 0 {
                self.pos += 4;
                continue;
            }
            if len < 4 || self.pos + len > self.data.len() {
                return None;
            }

            let mut payload = &self.data[self.pos + 4..self.pos + len];
            self.pos += len;
            if self.trim_newline && payload.last() == Some(&b'\n') {
                payload = &payload[..payload.len() - 1];
            }
            return Some(payload);
        }
    }
}
