//! Multipart frame codec.
//!
//! Layout on the wire:
//!
//! ```text
//! [identities..., "<IDS|MSG>", signature, header, parent_header, metadata, content, buffers...]
//! ```
//!
//! The signature is the hex HMAC-SHA256 of the four JSON frames in order.
//! An empty key disables signing: the signature frame is empty and never
//! checked.

use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha2::Sha256;

use super::message::{Header, WireMessage};
use crate::error::{Error, Result};

/// Frame separating routing identities from the signed payload.
pub const DELIMITER: &[u8] = b"<IDS|MSG>";

/// Number of frames that must follow the delimiter.
const MIN_FRAMES_AFTER_DELIMITER: usize = 5;

type HmacSha256 = Hmac<Sha256>;

/// Shared secret used to sign and verify messages.
#[derive(Clone)]
pub struct SigningKey {
    mac: HmacSha256,
}

impl SigningKey {
    /// Build a key from the connection descriptor's `key` string.
    ///
    /// Returns `None` for an empty key, which means messages are unsigned.
    pub fn from_secret(secret: &str) -> Option<Self> {
        if secret.is_empty() {
            return None;
        }
        Some(Self::new(secret.as_bytes()))
    }

    pub fn new(secret: &[u8]) -> Self {
        Self {
            mac: HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length"),
        }
    }

    /// Hex digest over `parts`, in order.
    pub fn sign(&self, parts: &[&[u8]]) -> String {
        let mut mac = self.mac.clone();
        for part in parts {
            mac.update(part);
        }
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Encode a message into frames.
///
/// Identity frames are passed through when present; otherwise the message
/// id is used as the single routing frame.
pub fn encode(message: &WireMessage, key: Option<&SigningKey>) -> Result<Vec<Bytes>> {
    let header = serde_json::to_vec(&message.header)?;
    let parent_header = serde_json::to_vec(&message.parent_header)?;
    let metadata = serde_json::to_vec(&message.metadata)?;
    let content = serde_json::to_vec(&message.content)?;

    let signature = match key {
        Some(key) => key.sign(&[&header, &parent_header, &metadata, &content]),
        None => String::new(),
    };

    let mut frames = Vec::with_capacity(message.identities.len().max(1) + 6 + message.buffers.len());
    if message.identities.is_empty() {
        frames.push(Bytes::from(message.header.msg_id.clone()));
    } else {
        frames.extend(message.identities.iter().cloned());
    }
    frames.push(Bytes::from_static(DELIMITER));
    frames.push(Bytes::from(signature));
    frames.push(Bytes::from(header));
    frames.push(Bytes::from(parent_header));
    frames.push(Bytes::from(metadata));
    frames.push(Bytes::from(content));
    frames.extend(message.buffers.iter().cloned());
    Ok(frames)
}

/// Decode frames received from a socket.
pub fn decode(frames: Vec<Bytes>, key: Option<&SigningKey>) -> Result<WireMessage> {
    let delimiter = frames
        .iter()
        .position(|frame| frame.as_ref() == DELIMITER)
        .ok_or_else(|| Error::MalformedMessage("missing <IDS|MSG> delimiter".to_string()))?;

    let following = frames.len() - delimiter - 1;
    if following < MIN_FRAMES_AFTER_DELIMITER {
        return Err(Error::MalformedMessage(format!(
            "expected at least {MIN_FRAMES_AFTER_DELIMITER} frames after delimiter, got {following}"
        )));
    }

    let signature = &frames[delimiter + 1];
    let header = &frames[delimiter + 2];
    let parent_header = &frames[delimiter + 3];
    let metadata = &frames[delimiter + 4];
    let content = &frames[delimiter + 5];

    if let Some(key) = key {
        let expected = key.sign(&[header, parent_header, metadata, content]);
        if expected.as_bytes() != signature.as_ref() {
            return Err(Error::BadSignature);
        }
    }

    let header: Header = parse_frame(header, delimiter + 2)?;
    let parent_header = parse_frame(parent_header, delimiter + 3)?;
    let metadata = parse_frame(metadata, delimiter + 4)?;
    let content = parse_frame(content, delimiter + 5)?;

    Ok(WireMessage {
        identities: frames[..delimiter].to_vec(),
        header,
        parent_header,
        metadata,
        content,
        buffers: frames[delimiter + 6..].to_vec(),
    })
}

fn parse_frame<T: DeserializeOwned>(frame: &[u8], index: usize) -> Result<T> {
    serde_json::from_slice(frame).map_err(|e| Error::Json {
        frame: index,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> SigningKey {
        SigningKey::new(b"a0436f6c-1916-498b-8eb9-e81ab9368e84")
    }

    fn sample() -> WireMessage {
        let mut msg = WireMessage::execute_request("print('hi')", "pod1", true);
        msg.header.session = "s1".to_string();
        msg
    }

    #[test]
    fn test_encode_layout() {
        let msg = sample();
        let frames = encode(&msg, Some(&key())).unwrap();

        assert_eq!(frames.len(), 7);
        assert_eq!(frames[0].as_ref(), b"pod1");
        assert_eq!(frames[1].as_ref(), DELIMITER);
        assert_eq!(frames[2].len(), 64);
        assert_eq!(frames[5].as_ref(), b"{}");
    }

    #[test]
    fn test_signed_roundtrip() {
        let mut msg = sample();
        msg.parent_header.insert("msg_id".to_string(), json!("parent-1"));
        msg.metadata.insert("cellId".to_string(), json!("pod1"));
        msg.buffers = vec![Bytes::from_static(b"\x01\x02"), Bytes::from_static(b"tail")];
        let frames = encode(&msg, Some(&key())).unwrap();
        assert_eq!(frames.len(), 9);
        let decoded = decode(frames, Some(&key())).unwrap();

        // Identities default to the msg_id frame.
        msg.identities = vec![Bytes::from_static(b"pod1")];
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_tampered_content_rejected() {
        let mut frames = encode(&sample(), Some(&key())).unwrap();
        frames[6] = Bytes::from(json!({"code": "import os"}).to_string());

        let err = decode(frames, Some(&key())).unwrap_err();
        assert!(matches!(err, Error::BadSignature));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let frames = encode(&sample(), Some(&key())).unwrap();
        let other = SigningKey::new(b"not-the-key");
        assert!(matches!(decode(frames, Some(&other)), Err(Error::BadSignature)));
    }

    #[test]
    fn test_unsigned_skips_verification() {
        let frames = encode(&sample(), None).unwrap();
        assert!(frames[2].is_empty());
        assert!(decode(frames, None).is_ok());
    }

    #[test]
    fn test_too_few_frames_after_delimiter() {
        let frames = vec![
            Bytes::from_static(b"id"),
            Bytes::from_static(DELIMITER),
            Bytes::new(),
            Bytes::from_static(b"{}"),
            Bytes::from_static(b"{}"),
            Bytes::from_static(b"{}"),
        ];
        let err = decode(frames, None).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage(_)));
    }

    #[test]
    fn test_missing_delimiter() {
        let frames = vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")];
        assert!(matches!(decode(frames, None), Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn test_multiple_identities_and_buffers() {
        let mut msg = sample();
        msg.identities = vec![Bytes::from_static(b"router"), Bytes::from_static(b"peer")];
        msg.buffers = vec![Bytes::from_static(b"\x00\x01")];

        let frames = encode(&msg, Some(&key())).unwrap();
        assert_eq!(frames[2].as_ref(), DELIMITER);

        let decoded = decode(frames, Some(&key())).unwrap();
        assert_eq!(decoded.identities.len(), 2);
        assert_eq!(decoded.buffers, vec![Bytes::from_static(b"\x00\x01")]);
    }

    #[test]
    fn test_invalid_json_frame_reports_index() {
        let mut frames = encode(&sample(), None).unwrap();
        frames[3] = Bytes::from_static(b"not json");
        match decode(frames, None) {
            Err(Error::Json { frame, .. }) => assert_eq!(frame, 3),
            other => panic!("expected Json error, got {other:?}"),
        }
    }

    #[test]
    fn test_lenient_header_defaults() {
        let mut frames = encode(&sample(), None).unwrap();
        frames[3] = Bytes::from(json!({"msg_id": "m", "msg_type": "status"}).to_string());
        let decoded = decode(frames, None).unwrap();
        assert_eq!(decoded.header.msg_type, "status");
        assert!(decoded.header.session.is_empty());
    }
}
