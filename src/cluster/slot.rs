//! Key to hash-slot mapping.
//!
//! Implements the Redis Cluster key hashing algorithm: CRC16 (XMODEM/CCITT,
//! polynomial 0x1021) of the key, or of its hash tag, modulo 16384.

/// Total number of slots in the cluster keyspace
pub const SLOT_COUNT: u16 = 16384;

const CRC16_TABLE: [u16; 256] = build_crc16_table();

const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &byte| {
        let index = ((crc >> 8) as u8 ^ byte) as usize;
        (crc << 8) ^ CRC16_TABLE[index]
    })
}

/// Extract the hash tag from a key.
///
/// Format: `key{tag}suffix`. Only the first `{` counts, the tag ends at the
/// first `}` after it, and an empty tag means the whole key is hashed.
fn hash_tag(key: &[u8]) -> Option<&[u8]> {
    let start = key.iter().position(|&b| b == b'{')?;
    let len = key[start + 1..].iter().position(|&b| b == b'}')?;
    if len == 0 {
        return None;
    }
    Some(&key[start + 1..start + 1 + len])
}

/// Calculate the slot for a key
///
/// # Example
///
/// ```
/// use aikv_router::cluster::key_slot;
///
/// assert_eq!(key_slot(b"foo"), 12182);
/// assert_eq!(key_slot(b"user{42}:name"), key_slot(b"{42}"));
/// ```
pub fn key_slot(key: &[u8]) -> u16 {
    crc16(hash_tag(key).unwrap_or(key)) % SLOT_COUNT
}
