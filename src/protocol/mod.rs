//! RESP reply values and the incremental reply parser used by the transport.

pub mod parser;
pub mod types;

pub use parser::RespParser;
pub use types::RespValue;
