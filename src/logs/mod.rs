//! Decoding of the engine's container log output.
//!
//! Containers without a TTY get a multiplexed stream: a sequence of frames,
//! each an 8-byte header (stream byte, 3 reserved bytes, big-endian payload
//! length) followed by UTF-8 text. TTY containers get the raw text instead.
//! [`decode_stream`] detects which of the two it was handed and turns every
//! non-blank line into a [`LogRecord`] with the timestamp split off and a
//! [`Severity`] inferred from the message.
//!
//! Decoding is stateless: every call parses one complete buffer.
mod frame;
mod record;

pub use frame::{Frame, Frames, HEADER_LEN, encode_frame, frames, is_framed};
pub use record::{LogRecord, LogStream, Severity};

/// Decodes a complete log buffer into records, in stream order.
pub fn decode_stream(raw: &[u8]) -> Vec<LogRecord> {
    collect_records(raw, |_| true)
}

/// Like [`decode_stream`], but keeps only lines whose message contains `term`,
/// compared case-insensitively. An empty term keeps everything.
pub fn search_stream(raw: &[u8], term: &str) -> Vec<LogRecord> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return decode_stream(raw);
    }
    collect_records(raw, |message| message.to_lowercase().contains(&term))
}

fn collect_records(raw: &[u8], keep: impl Fn(&str) -> bool) -> Vec<LogRecord> {
    let mut out = Vec::new();
    if is_framed(raw) {
        for frame in frames(raw) {
            push_lines(frame.payload, frame.stream, &keep, &mut out);
        }
    } else {
        log::trace!("log buffer is not framed, decoding {} bytes as lines", raw.len());
        for line in raw.split(|b| *b == b'\n') {
            push_lines(strip_inline_header(line), LogStream::Unknown, &keep, &mut out);
        }
    }
    out
}

/// Removes a frame header left in front of a line by transports that split the
/// stream on newlines without demultiplexing it.
fn strip_inline_header(line: &[u8]) -> &[u8] {
    if is_framed(line) {
        &line[HEADER_LEN..]
    } else {
        line
    }
}

fn push_lines(
    payload: &[u8],
    stream: LogStream,
    keep: &impl Fn(&str) -> bool,
    out: &mut Vec<LogRecord>,
) {
    let text = String::from_utf8_lossy(payload);
    for line in text.lines() {
        let Some(record) = LogRecord::from_line(line, stream) else {
            continue;
        };
        if keep(&record.message) {
            out.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(lines: &[(LogStream, &str)]) -> Vec<u8> {
        lines
            .iter()
            .flat_map(|(stream, line)| encode_frame(*stream, format!("{line}\n").as_bytes()))
            .collect()
    }

    #[test]
    fn test_framed_lines_keep_order_and_severity() {
        let lines = [
            (LogStream::Stdout, "2024-05-01T12:00:00.000000001Z booting"),
            (LogStream::Stderr, "2024-05-01T12:00:01.000000001Z ERROR: cannot bind"),
            (LogStream::Stdout, "2024-05-01T12:00:02.000000001Z warn: slow start"),
            (LogStream::Stdout, "2024-05-01T12:00:03.000000001Z ready"),
        ];
        let records = decode_stream(&framed(&lines));

        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["booting", "ERROR: cannot bind", "warn: slow start", "ready"]
        );
        let severities: Vec<Severity> = records.iter().map(|r| r.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::Info,
                Severity::Error,
                Severity::Warning,
                Severity::Info
            ]
        );
        assert_eq!(records[1].stream, LogStream::Stderr);
        assert!(records.iter().all(|r| r.timestamp.is_some()));
    }

    #[test]
    fn test_frame_with_multiple_lines() {
        let buf = encode_frame(LogStream::Stdout, b"a\n\n   \nb\n");
        let records = decode_stream(&buf);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "a");
        assert_eq!(records[1].message, "b");
    }

    #[test]
    fn test_truncated_frame_does_not_affect_others() {
        let mut buf = framed(&[(LogStream::Stdout, "one")]);
        buf.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0x10, 0]);
        buf.extend(framed(&[(LogStream::Stdout, "two")]));
        let mut tail = encode_frame(LogStream::Stdout, b"three is cut\n");
        tail.truncate(10);
        buf.extend(tail);

        let messages: Vec<String> = decode_stream(&buf).into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[test]
    fn test_unframed_text_is_decoded_as_lines() {
        let raw = b"2024-05-01T12:00:00Z first\r\n2024-05-01T12:00:01Z Error two\n\n";
        let records = decode_stream(raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "first");
        assert_eq!(records[0].stream, LogStream::Unknown);
        assert_eq!(records[1].severity, Severity::Error);
    }

    #[test]
    fn test_line_mode_strips_inline_headers() {
        let mut raw = b"plain\n".to_vec();
        raw.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 6]);
        raw.extend_from_slice(b"2024-05-01T12:00:00Z framed\n");
        let records = decode_stream(&raw);
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["plain", "framed"]);
    }

    #[test]
    fn test_search_filters_case_insensitively() {
        let buf = framed(&[
            (LogStream::Stdout, "2024-05-01T12:00:00Z GET /health 200"),
            (LogStream::Stdout, "2024-05-01T12:00:01Z POST /login 500"),
            (LogStream::Stdout, "2024-05-01T12:00:02Z get /metrics 200"),
        ]);
        let records = search_stream(&buf, "Get");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].message, "get /metrics 200");
    }

    #[test]
    fn test_search_with_empty_term_keeps_everything() {
        let buf = framed(&[(LogStream::Stdout, "x"), (LogStream::Stdout, "y")]);
        assert_eq!(search_stream(&buf, "  ").len(), 2);
    }

    #[test]
    fn test_search_does_not_match_timestamp() {
        let buf = framed(&[(LogStream::Stdout, "2024-05-01T12:00:00Z hello")]);
        assert!(search_stream(&buf, "2024").is_empty());
    }
}
