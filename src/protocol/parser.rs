use super::types::RespValue;
use crate::error::{AikvError, Result};
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

/// Incremental RESP reply parser.
///
/// Bytes read from a node are fed into the internal buffer; `parse` yields
/// one complete reply at a time and leaves partial data buffered.
pub struct RespParser {
    buffer: BytesMut,
}

impl RespParser {
    /// Create a new parser with a given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get a mutable reference to the buffer
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Drop any buffered bytes (after a broken connection)
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Try to parse a complete RESP value from the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed.
    pub fn parse(&mut self) -> Result<Option<RespValue>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&self.buffer[..]);
        match parse_value(&mut cursor)? {
            Some(value) => {
                let pos = cursor.position() as usize;
                self.buffer.advance(pos);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

fn parse_value(cursor: &mut Cursor<&[u8]>) -> Result<Option<RespValue>> {
    if !cursor.has_remaining() {
        return Ok(None);
    }
    let marker = cursor.get_u8();
    let Some(line) = read_line(cursor)? else {
        return Ok(None);
    };

    let value = match marker {
        b'+' => RespValue::SimpleString(line),
        b'-' => RespValue::Error(line),
        b':' => RespValue::Integer(parse_number(&line, "integer")?),
        b'_' => RespValue::Null,
        b'#' => match line.as_str() {
            "t" => RespValue::Boolean(true),
            "f" => RespValue::Boolean(false),
            _ => return Err(AikvError::Protocol(format!("Invalid boolean: {}", line))),
        },
        b',' => RespValue::Double(parse_double(&line)?),
        b'$' => {
            let len: i64 = parse_number(&line, "bulk string length")?;
            if len == -1 {
                RespValue::BulkString(None)
            } else {
                match read_exact(cursor, len)? {
                    Some(bytes) => RespValue::BulkString(Some(bytes)),
                    None => return Ok(None),
                }
            }
        }
        b'*' | b'~' | b'>' => {
            let len: i64 = parse_number(&line, "array length")?;
            if len == -1 {
                RespValue::Array(None)
            } else {
                match parse_items(cursor, len)? {
                    Some(items) => RespValue::Array(Some(items)),
                    None => return Ok(None),
                }
            }
        }
        // Maps are flattened into key/value arrays, as RESP2 servers reply
        b'%' => {
            let len: i64 = parse_number(&line, "map length")?;
            match parse_items(cursor, len.saturating_mul(2))? {
                Some(items) => RespValue::Array(Some(items)),
                None => return Ok(None),
            }
        }
        other => {
            return Err(AikvError::Protocol(format!(
                "Invalid RESP type marker: {}",
                other as char
            )))
        }
    };

    Ok(Some(value))
}

fn parse_items(cursor: &mut Cursor<&[u8]>, len: i64) -> Result<Option<Vec<RespValue>>> {
    if len < 0 {
        return Err(AikvError::Protocol(format!("Invalid aggregate length: {}", len)));
    }
    let mut items = Vec::with_capacity(len.min(1024) as usize);
    for _ in 0..len {
        match parse_value(cursor)? {
            Some(item) => items.push(item),
            None => return Ok(None),
        }
    }
    Ok(Some(items))
}

fn read_line(cursor: &mut Cursor<&[u8]>) -> Result<Option<String>> {
    let start = cursor.position() as usize;
    let data = *cursor.get_ref();

    let Some(offset) = data[start..].windows(2).position(|w| w == b"\r\n") else {
        return Ok(None);
    };
    let line = String::from_utf8_lossy(&data[start..start + offset]).to_string();
    cursor.set_position((start + offset + 2) as u64);
    Ok(Some(line))
}

fn read_exact(cursor: &mut Cursor<&[u8]>, len: i64) -> Result<Option<Bytes>> {
    if len < 0 {
        return Err(AikvError::Protocol(format!(
            "Invalid bulk string length: {}",
            len
        )));
    }
    let len = len as usize;
    let pos = cursor.position() as usize;
    let data = *cursor.get_ref();

    if pos + len + 2 > data.len() {
        return Ok(None);
    }
    if &data[pos + len..pos + len + 2] != b"\r\n" {
        return Err(AikvError::Protocol(
            "Bulk string not terminated by CRLF".to_string(),
        ));
    }

    let bytes = Bytes::copy_from_slice(&data[pos..pos + len]);
    cursor.set_position((pos + len + 2) as u64);
    Ok(Some(bytes))
}

fn parse_number(line: &str, what: &str) -> Result<i64> {
    line.parse::<i64>()
        .map_err(|_| AikvError::Protocol(format!("Invalid {}: {}", what, line)))
}

fn parse_double(line: &str) -> Result<f64> {
    match line {
        "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        _ => line
            .parse::<f64>()
            .map_err(|_| AikvError::Protocol(format!("Invalid double: {}", line))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_string() {
        let mut parser = RespParser::new(64);
        parser.feed(b"+PONG\r\n");
        assert_eq!(
            parser.parse().unwrap(),
            Some(RespValue::SimpleString("PONG".to_string()))
        );
        assert_eq!(parser.parse().unwrap(), None);
    }

    #[test]
    fn test_parse_moved_error() {
        let mut parser = RespParser::new(64);
        parser.feed(b"-MOVED 3999 127.0.0.1:6381\r\n");
        assert_eq!(
            parser.parse().unwrap(),
            Some(RespValue::Error("MOVED 3999 127.0.0.1:6381".to_string()))
        );
    }

    #[test]
    fn test_parse_incomplete_then_complete() {
        let mut parser = RespParser::new(64);
        parser.feed(b"*2\r\n$10\r\n1700000000\r\n$3\r\n12");
        assert_eq!(parser.parse().unwrap(), None);

        parser.feed(b"3\r\n");
        assert_eq!(
            parser.parse().unwrap(),
            Some(RespValue::array(vec![
                RespValue::bulk_string("1700000000"),
                RespValue::bulk_string("123"),
            ]))
        );
    }

    #[test]
    fn test_parse_null_and_resp3() {
        let mut parser = RespParser::new(64);
        parser.feed(b"$-1\r\n_\r\n#t\r\n,1.5\r\n");
        assert_eq!(parser.parse().unwrap(), Some(RespValue::BulkString(None)));
        assert_eq!(parser.parse().unwrap(), Some(RespValue::Null));
        assert_eq!(parser.parse().unwrap(), Some(RespValue::Boolean(true)));
        assert_eq!(parser.parse().unwrap(), Some(RespValue::Double(1.5)));
    }

    #[test]
    fn test_parse_map_flattened() {
        let mut parser = RespParser::new(64);
        parser.feed(b"%1\r\n+role\r\n+master\r\n");
        assert_eq!(
            parser.parse().unwrap(),
            Some(RespValue::array(vec![
                RespValue::simple_string("role"),
                RespValue::simple_string("master"),
            ]))
        );
    }

    #[test]
    fn test_invalid_marker() {
        let mut parser = RespParser::new(64);
        parser.feed(b"?oops\r\n");
        assert!(matches!(parser.parse(), Err(AikvError::Protocol(_))));
    }
}
