//! Wire messages for the observer and control channels.
//!
//! Both channels carry JSON text frames whose variant is named by the `_`
//! field; payload fields sit next to it:
//!
//! ```text
//! {"_":"ServerState","state":"Started"}
//! {"_":"Log","source":"Git","content":"Fetch: 1a2b3c4d..5e6f7a8b\n"}
//! {"_":"ServerStopRequest"}
//! ```
//!
//! Every variant is enumerated here so a new message kind is a compile error
//! at each `match`, not a runtime lookup miss.

mod control;
mod observer;

pub use control::ControlMessage;
pub use observer::{ObserverCommand, ObserverMessage, ServerAction};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ports::ProtocolError;

/// Name of the discriminator field on both channels.
pub const TAG_FIELD: &str = "_";

/// A closed set of tagged messages.
pub trait TaggedMessage: DeserializeOwned {
    /// Every tag the type can decode.
    const TAGS: &'static [&'static str];
}

/// Decode a text frame into a tagged message.
///
/// Malformed JSON, a missing tag and a tag the type does not know are
/// reported as distinct errors so callers can log forward-compatible
/// (unknown) messages differently from garbage.
pub fn decode<T: TaggedMessage>(text: &str) -> Result<T, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let tag = value
        .get(TAG_FIELD)
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingTag)?;

    if !T::TAGS.contains(&tag) {
        return Err(ProtocolError::UnknownVariant(tag.to_owned()));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Encode a message as a JSON text frame.
pub fn encode<T: serde::Serialize>(message: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_distinguishes_failures() {
        assert!(matches!(
            decode::<ControlMessage>("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode::<ControlMessage>(r#"{"kind":"ServerStarted"}"#),
            Err(ProtocolError::MissingTag)
        ));
        assert!(matches!(
            decode::<ControlMessage>(r#"{"_":"ServerCrashed"}"#),
            Err(ProtocolError::UnknownVariant(tag)) if tag == "ServerCrashed"
        ));
    }

    #[test]
    fn test_known_tag_with_bad_payload_is_malformed() {
        let result = decode::<ObserverCommand>(r#"{"_":"ClearLogs","source":"Nope"}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }
}
