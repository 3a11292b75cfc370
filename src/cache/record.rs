use std::io::{Cursor, Read};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use super::types::{CacheError, CacheKey, CachedResponse};

/// The magic number that identifies cache record files
const RECORD_MAGIC: u32 = 0x41435249; // "IRCA" in ASCII
/// Current record format version
const RECORD_VERSION: u32 = 1;
/// Upper bound for any length-prefixed text field (method, URL, header)
const MAX_FIELD_BYTES: u64 = 1 << 20;

/// Quick check that a byte buffer starts like a cache record.
pub fn is_cache_record(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }
    let mut cursor = Cursor::new(bytes);
    matches!(cursor.read_u32::<LittleEndian>(), Ok(magic) if magic == RECORD_MAGIC)
}

/// Serializes a key/response pair into the on-disk record framing:
/// magic, format version, then little-endian length-prefixed fields
/// followed by the raw body bytes.
pub fn encode_record(key: &CacheKey, response: &CachedResponse) -> Result<Vec<u8>, CacheError> {
    let mut out = Vec::with_capacity(response.body.len() + 256);
    out.write_u32::<LittleEndian>(RECORD_MAGIC)?;
    out.write_u32::<LittleEndian>(RECORD_VERSION)?;
    write_string(&mut out, &key.method)?;
    write_string(&mut out, &key.url)?;
    out.write_u16::<LittleEndian>(response.status)?;
    out.write_u32::<LittleEndian>(response.headers.len() as u32)?;
    for (name, value) in &response.headers {
        write_string(&mut out, name)?;
        write_string(&mut out, value)?;
    }
    out.write_i64::<LittleEndian>(response.stored_at)?;
    out.write_u64::<LittleEndian>(response.body.len() as u64)?;
    out.extend_from_slice(&response.body);
    Ok(out)
}

/// Parses a record from a byte slice (typically a memory-mapped file).
///
/// Returns the stored key alongside the response so callers can verify
/// the entry actually belongs to the request identity they looked up.
pub fn decode_record(bytes: &[u8]) -> Result<(CacheKey, CachedResponse), CacheError> {
    if !is_cache_record(bytes) {
        return Err(CacheError::InvalidRecord("Invalid magic number".into()));
    }

    let mut cursor = Cursor::new(bytes);
    cursor.set_position(4);

    let version = cursor.read_u32::<LittleEndian>()?;
    if version != RECORD_VERSION {
        return Err(CacheError::InvalidRecord(
            format!("Unsupported record version: {}", version)
        ));
    }

    let method = read_string(&mut cursor)?;
    let url = read_string(&mut cursor)?;
    let status = cursor.read_u16::<LittleEndian>()?;

    let header_count = cursor.read_u32::<LittleEndian>()?;
    let mut headers = Vec::with_capacity(header_count.min(64) as usize);
    for _ in 0..header_count {
        let name = read_string(&mut cursor)?;
        let value = read_string(&mut cursor)?;
        headers.push((name, value));
    }

    let stored_at = cursor.read_i64::<LittleEndian>()?;
    let body_len = cursor.read_u64::<LittleEndian>()? as usize;
    let offset = cursor.position() as usize;
    if bytes.len() < offset + body_len {
        return Err(CacheError::InvalidRecord(
            format!("Truncated body: expected {} bytes, {} available",
                body_len, bytes.len() - offset)
        ));
    }
    let body = bytes[offset..offset + body_len].to_vec();

    Ok((
        CacheKey { method, url },
        CachedResponse { status, headers, body, stored_at },
    ))
}

fn write_string(out: &mut Vec<u8>, s: &str) -> Result<(), CacheError> {
    out.write_u64::<LittleEndian>(s.len() as u64)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String, CacheError> {
    let length = cursor.read_u64::<LittleEndian>()?;
    if length > MAX_FIELD_BYTES {
        return Err(CacheError::InvalidRecord(
            format!("Field length {} exceeds limit", length)
        ));
    }
    let mut buf = vec![0u8; length as usize];
    cursor.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| CacheError::InvalidRecord(format!("Invalid UTF-8 in field: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn sample() -> (CacheKey, CachedResponse) {
        let url = Url::parse("http://localhost:8080/assets/sample.ppm").unwrap();
        let key = CacheKey::new("GET", &url);
        let response = CachedResponse {
            status: 200,
            headers: vec![("content-type".into(), "image/x-portable-pixmap".into())],
            body: vec![1, 2, 3, 4, 5],
            stored_at: 1_700_000_000,
        };
        (key, response)
    }

    #[test]
    fn record_survives_encode_decode() {
        let (key, response) = sample();
        let bytes = encode_record(&key, &response).unwrap();
        assert!(is_cache_record(&bytes));
        let (stored_key, stored) = decode_record(&bytes).unwrap();
        assert_eq!(stored_key, key);
        assert_eq!(stored.status, 200);
        assert_eq!(stored.header("Content-Type"), Some("image/x-portable-pixmap"));
        assert_eq!(stored.body, response.body);
        assert_eq!(stored.stored_at, response.stored_at);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let err = decode_record(b"PK\x03\x04....").unwrap_err();
        assert!(matches!(err, CacheError::InvalidRecord(_)));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let (key, response) = sample();
        let mut bytes = encode_record(&key, &response).unwrap();
        bytes.truncate(bytes.len() - 2);
        let err = decode_record(&bytes).unwrap_err();
        assert!(matches!(err, CacheError::InvalidRecord(_)));
    }
}
