use super::record::LogStream;

/// Size of the header preceding every frame of a multiplexed log stream.
pub const HEADER_LEN: usize = 8;

/// One frame of a multiplexed log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub stream: LogStream,
    pub payload: &'a [u8],
}

/// Returns `true` if `buf` starts with a well-formed frame header.
///
/// Header layout: `[stream, 0, 0, 0, len_be_0, len_be_1, len_be_2, len_be_3]`.
pub fn is_framed(buf: &[u8]) -> bool {
    buf.len() >= HEADER_LEN && parse_header(&buf[..HEADER_LEN]).is_some()
}

fn parse_header(header: &[u8]) -> Option<(LogStream, usize)> {
    let stream = LogStream::from_header_byte(header[0])?;
    if header[1..4] != [0, 0, 0] {
        return None;
    }
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    Some((stream, len as usize))
}

/// Iterates over the frames of a multiplexed buffer.
///
/// A frame whose declared length runs past the end of the buffer is dropped and
/// scanning resumes right after its header. Bytes that do not form a valid
/// header are skipped one at a time until the next header.
pub fn frames(buf: &[u8]) -> Frames<'_> {
    Frames { buf, offset: 0 }
}

#[derive(Debug, Clone)]
pub struct Frames<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buf.len().saturating_sub(self.offset) >= HEADER_LEN {
            let start = self.offset;
            let Some((stream, len)) = parse_header(&self.buf[start..start + HEADER_LEN]) else {
                self.offset += 1;
                continue;
            };

            let payload_start = start + HEADER_LEN;
            match payload_start.checked_add(len) {
                Some(end) if end <= self.buf.len() => {
                    self.offset = end;
                    return Some(Frame {
                        stream,
                        payload: &self.buf[payload_start..end],
                    });
                }
                _ => {
                    log::debug!(
                        "dropping log frame at offset {start}: declared length {len} exceeds remaining {} bytes",
                        self.buf.len() - payload_start
                    );
                    self.offset = payload_start;
                }
            }
        }
        None
    }
}

/// Encodes `payload` as one frame of a multiplexed stream.
pub fn encode_frame(stream: LogStream, payload: &[u8]) -> Vec<u8> {
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&[stream.header_byte(), 0, 0, 0]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&payload[..len as usize]);
    out
}
