use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use super::types::FeedPayload;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    EmptyPayload,
    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("content is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported content encoding: {0}")]
    UnsupportedEncoding(String),
}

/// Encodes UTF-8 text for the content API.
pub fn encode_content(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decodes a Base64 payload back into UTF-8 text. The content API wraps its
/// output at 60 columns, so embedded whitespace is ignored.
pub fn decode_content(encoded: &str) -> Result<String, DecodeError> {
    let compact: String = encoded
        .chars()
        .filter(|character| !character.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(compact.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

/// Serializes a feed document the way it is stored remotely (two-space
/// pretty JSON) and encodes it for upload.
pub fn encode_feed<T: Serialize + ?Sized>(document: &T) -> Result<String, serde_json::Error> {
    let text = serde_json::to_string_pretty(document)?;
    Ok(encode_content(&text))
}

/// Resolves a fetched body into the feed JSON value and, for envelope
/// responses, the revision marker.
pub fn resolve_payload(raw: &[u8]) -> Result<(Value, Option<String>), DecodeError> {
    let trimmed = trim_leading_whitespace(raw);
    if trimmed.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    match serde_json::from_slice::<FeedPayload>(trimmed)? {
        FeedPayload::Envelope(envelope) => {
            if let Some(encoding) = envelope.encoding.as_deref() {
                if !encoding.eq_ignore_ascii_case("base64") {
                    return Err(DecodeError::UnsupportedEncoding(encoding.to_string()));
                }
            }
            let text = decode_content(&envelope.content)?;
            let document = serde_json::from_str::<Value>(&text)?;
            let revision = Some(envelope.sha).filter(|sha| !sha.is_empty());
            Ok((document, revision))
        }
        FeedPayload::Raw(document) => Ok((document, None)),
    }
}

fn trim_leading_whitespace(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(raw);
    let mut index = 0;
    while index < raw.len() && raw[index].is_ascii_whitespace() {
        index += 1;
    }
    &raw[index..]
}
