use super::types::SessionError;

/// Payloads below this size cannot be a real model; a smaller body
/// usually means a truncated download or a server error page.
pub const MIN_MODEL_BYTES: usize = 100 * 1024;

/// Number of leading bytes sniffed for markup.
const SNIFF_WINDOW: usize = 16;
/// More `<` bytes than this inside the window reads as an HTML document,
/// not model weights.
const MARKUP_LIMIT: usize = 2;

/// Validates raw model bytes before they are trusted: rejects payloads
/// below the size floor and payloads whose leading bytes look like an
/// HTML error page served by a misconfigured host or proxy.
pub fn validate_model_bytes(bytes: &[u8]) -> Result<(), SessionError> {
    if bytes.len() < MIN_MODEL_BYTES {
        return Err(SessionError::InvalidPayload(format!(
            "payload is {} bytes, below the {} byte floor",
            bytes.len(),
            MIN_MODEL_BYTES
        )));
    }

    let window = &bytes[..SNIFF_WINDOW.min(bytes.len())];
    let markers = window.iter().filter(|&&b| b == b'<').count();
    if markers > MARKUP_LIMIT {
        return Err(SessionError::InvalidPayload(
            "payload looks like an HTML document".to_string(),
        ));
    }

    Ok(())
}
