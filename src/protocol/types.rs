use bytes::Bytes;

/// RESP (REdis Serialization Protocol) reply values as seen by the client
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple String: +OK\r\n
    SimpleString(String),

    /// Error: -Error message\r\n
    Error(String),

    /// Integer: :1000\r\n
    Integer(i64),

    /// Bulk String: $6\r\nfoobar\r\n or $-1\r\n for null
    BulkString(Option<Bytes>),

    /// Array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n or *-1\r\n for null
    Array(Option<Vec<RespValue>>),

    /// RESP3 Null: _\r\n
    Null,

    /// RESP3 Boolean: #t\r\n
    Boolean(bool),

    /// RESP3 Double: ,1.5\r\n
    Double(f64),
}

impl RespValue {
    /// Create a simple string response
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Create an error response
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Create an integer response
    pub fn integer(i: i64) -> Self {
        RespValue::Integer(i)
    }

    /// Create a bulk string response
    pub fn bulk_string(s: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(s.into()))
    }

    /// Create a null bulk string response
    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    /// Create an array response
    pub fn array(arr: Vec<RespValue>) -> Self {
        RespValue::Array(Some(arr))
    }

    /// Create OK response
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Encode a command as a RESP array of bulk strings
    pub fn command<'a>(parts: impl IntoIterator<Item = &'a Bytes>) -> Self {
        RespValue::array(
            parts
                .into_iter()
                .map(|p| RespValue::BulkString(Some(p.clone())))
                .collect(),
        )
    }

    /// Text content of a simple or bulk string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(Some(b)) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Integer content, accepting integer-looking strings
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            other => other.as_str().and_then(|s| s.parse().ok()),
        }
    }

    /// Whether this is a null reply in either protocol version
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            RespValue::Null | RespValue::BulkString(None) | RespValue::Array(None)
        )
    }

    /// Short type name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple-string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(_) => "bulk-string",
            RespValue::Array(_) => "array",
            RespValue::Null => "null",
            RespValue::Boolean(_) => "boolean",
            RespValue::Double(_) => "double",
        }
    }

    /// Serialize to RESP format bytes
    pub fn serialize(&self) -> Bytes {
        let mut out = Vec::new();
        self.write_to(&mut out);
        Bytes::from(out)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => out.extend_from_slice(format!("+{}\r\n", s).as_bytes()),
            RespValue::Error(e) => out.extend_from_slice(format!("-{}\r\n", e).as_bytes()),
            RespValue::Integer(i) => out.extend_from_slice(format!(":{}\r\n", i).as_bytes()),
            RespValue::BulkString(None) => out.extend_from_slice(b"$-1\r\n"),
            RespValue::BulkString(Some(s)) => {
                out.extend_from_slice(format!("${}\r\n", s.len()).as_bytes());
                out.extend_from_slice(s);
                out.extend_from_slice(b"\r\n");
            }
            RespValue::Array(None) => out.extend_from_slice(b"*-1\r\n"),
            RespValue::Array(Some(arr)) => {
                out.extend_from_slice(format!("*{}\r\n", arr.len()).as_bytes());
                for item in arr {
                    item.write_to(out);
                }
            }
            RespValue::Null => out.extend_from_slice(b"_\r\n"),
            RespValue::Boolean(b) => {
                out.extend_from_slice(if *b { b"#t\r\n" } else { b"#f\r\n" })
            }
            RespValue::Double(d) => out.extend_from_slice(format!(",{}\r\n", d).as_bytes()),
        }
    }
}

impl std::fmt::Display for RespValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(e) => write!(f, "(error) {}", e),
            RespValue::Integer(i) => write!(f, "(integer) {}", i),
            RespValue::BulkString(Some(b)) => write!(f, "\"{}\"", String::from_utf8_lossy(b)),
            RespValue::BulkString(None) | RespValue::Array(None) | RespValue::Null => {
                write!(f, "(nil)")
            }
            RespValue::Array(Some(items)) => {
                if items.is_empty() {
                    return write!(f, "(empty array)");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, item)?;
                }
                Ok(())
            }
            RespValue::Boolean(b) => write!(f, "({})", if *b { "true" } else { "false" }),
            RespValue::Double(d) => write!(f, "(double) {}", d),
        }
    }
}
