//! Incremental `text/event-stream` decoder.
//!
//! Only the `id` and `data` fields matter for the session feed. Comment
//! lines (the server's `: ping` keep-alives), `event` and `retry` are
//! ignored. Unlike a browser `EventSource`, the id is not carried over from
//! one event block to the next: a block without its own `id:` line yields
//! an anonymous record.

use reportflow_protocol::EventRecord;

use crate::StreamError;

/// Splits a byte stream into [`EventRecord`]s.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    pending_cr: bool,
    id: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every record completed by them.
    ///
    /// Bytes of an unfinished line or block are kept for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<EventRecord>, StreamError> {
        let mut out = Vec::new();
        for &b in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if b == b'\n' {
                    continue;
                }
            }
            match b {
                b'\n' => self.end_line(&mut out)?,
                b'\r' => {
                    self.pending_cr = true;
                    self.end_line(&mut out)?;
                }
                _ => self.line.push(b),
            }
        }
        Ok(out)
    }

    fn end_line(&mut self, out: &mut Vec<EventRecord>) -> Result<(), StreamError> {
        let raw = std::mem::take(&mut self.line);
        let line = String::from_utf8(raw)
            .map_err(|e| StreamError::Protocol(format!("invalid UTF-8 in event stream: {e}")))?;

        if line.is_empty() {
            if let Some(record) = self.dispatch() {
                out.push(record);
            }
            return Ok(());
        }
        if line.starts_with(':') {
            return Ok(());
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };
        match field {
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        Ok(())
    }

    fn dispatch(&mut self) -> Option<EventRecord> {
        let id = self.id.take().filter(|id| !id.is_empty());
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(EventRecord { id, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<EventRecord> {
        SseDecoder::new().push(input).unwrap()
    }

    #[test]
    fn decodes_server_format() {
        let input = b"id: 0\ndata: 1718000000.1|info|Session created\n\n: ping\n\nid: 1\ndata: status|done\n\n";
        let records = decode_all(input);
        assert_eq!(
            records,
            vec![
                EventRecord::new("0", "1718000000.1|info|Session created"),
                EventRecord::new("1", "status|done"),
            ]
        );
    }

    #[test]
    fn keepalive_comments_produce_nothing() {
        assert!(decode_all(b": ping\n\n: ping\n\n").is_empty());
    }

    #[test]
    fn id_does_not_carry_over_between_blocks() {
        let records = decode_all(b"id: 5\ndata: info|a\n\ndata: info|b\n\n");
        assert_eq!(records[0].id.as_deref(), Some("5"));
        assert_eq!(records[1].id, None);
    }

    #[test]
    fn multi_line_data_joined() {
        let records = decode_all(b"data: info|first\ndata: second\n\n");
        assert_eq!(records, vec![EventRecord::anonymous("info|first\nsecond")]);
    }

    #[test]
    fn handles_crlf_and_cr_line_endings() {
        let records = decode_all(b"id: 1\r\ndata: info|a\r\n\r\nid: 2\rdata: info|b\r\r");
        assert_eq!(
            records,
            vec![EventRecord::new("1", "info|a"), EventRecord::new("2", "info|b")]
        );
    }

    #[test]
    fn input_split_at_arbitrary_points() {
        let input = b"id: 12\r\ndata: warning|slow disk\r\n\r\nid: 13\ndata: status|done\n\n";
        for split in 0..input.len() {
            let mut decoder = SseDecoder::new();
            let mut records = decoder.push(&input[..split]).unwrap();
            records.extend(decoder.push(&input[split..]).unwrap());
            assert_eq!(
                records,
                vec![
                    EventRecord::new("12", "warning|slow disk"),
                    EventRecord::new("13", "status|done"),
                ],
                "split at {split}"
            );
        }
    }

    #[test]
    fn unfinished_block_is_held_back() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"id: 1\ndata: info|a\n").unwrap().is_empty());
        assert_eq!(
            decoder.push(b"\n").unwrap(),
            vec![EventRecord::new("1", "info|a")]
        );
    }

    #[test]
    fn ignores_event_and_retry_fields() {
        let records = decode_all(b"event: progress\nretry: 3000\nid: 4\ndata: info|x\n\n");
        assert_eq!(records, vec![EventRecord::new("4", "info|x")]);
    }

    #[test]
    fn value_without_space_and_field_without_colon() {
        let records = decode_all(b"id:7\ndata:info|tight\ndata\n\n");
        assert_eq!(records, vec![EventRecord::new("7", "info|tight\n")]);
    }

    #[test]
    fn empty_id_means_anonymous() {
        let records = decode_all(b"id:\ndata: info|x\n\n");
        assert_eq!(records[0].id, None);
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let err = SseDecoder::new().push(b"data: \xff\xfe\n").unwrap_err();
        assert!(matches!(err, StreamError::Protocol(_)));
    }
}
