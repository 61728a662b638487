//! Message protocol spoken over the request channel.
//!
//! Messages are JSON objects tagged by `action`:
//!
//! | Request | Response |
//! |---------|----------|
//! | `requestFileHandle { hash, create?, description }` | `{ hash, description, success }` |
//! | `getFileData { hash }` | `{ hash, arrayBuffer \| null }` |
//! | `storeFileData { hash, arrayBuffer }` | `{ hash, arrayBuffer }` |
//!
//! `arrayBuffer` is standard base64. Failed responses carry an `error` field
//! naming the [`ErrorCode`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{ContentHash, ErrorCode};

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Ask for a handle, prompting for consent if needed.
    RequestFileHandle {
        /// Requested hash.
        hash: ContentHash,
        /// Ask for a create-capable handle.
        #[serde(default)]
        create: bool,
        /// The origin's label for the file.
        description: String,
    },
    /// Read through a previously granted handle.
    GetFileData {
        /// Requested hash.
        hash: ContentHash,
    },
    /// Write through a previously granted create handle.
    StoreFileData {
        /// Target hash.
        hash: ContentHash,
        /// The content.
        #[serde(rename = "arrayBuffer", with = "base64_bytes")]
        array_buffer: Vec<u8>,
    },
}

impl Request {
    /// Action names the protocol understands.
    pub const ACTIONS: [&'static str; 3] = ["requestFileHandle", "getFileData", "storeFileData"];

    /// The hash the request is about.
    #[must_use]
    pub const fn hash(&self) -> &ContentHash {
        match self {
            Self::RequestFileHandle { hash, .. }
            | Self::GetFileData { hash }
            | Self::StoreFileData { hash, .. } => hash,
        }
    }
}

/// A response, correlated to its request by action and hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Response {
    /// Answer to [`Request::RequestFileHandle`].
    RequestFileHandle {
        /// Requested hash.
        hash: ContentHash,
        /// Echo of the requester's own description.
        description: String,
        /// Whether a handle was granted.
        success: bool,
        /// Why not, when `success` is false.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorCode>,
    },
    /// Answer to [`Request::GetFileData`].
    GetFileData {
        /// Requested hash.
        hash: ContentHash,
        /// The content, or `null`.
        #[serde(rename = "arrayBuffer", default, with = "base64_opt_bytes")]
        array_buffer: Option<Vec<u8>>,
        /// Why the content is `null`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorCode>,
    },
    /// Answer to [`Request::StoreFileData`].
    StoreFileData {
        /// Target hash.
        hash: ContentHash,
        /// Echo of the written content.
        #[serde(rename = "arrayBuffer", with = "base64_bytes")]
        array_buffer: Vec<u8>,
        /// Why the write failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorCode>,
    },
}

impl Response {
    /// The hash the response is about.
    #[must_use]
    pub const fn hash(&self) -> &ContentHash {
        match self {
            Self::RequestFileHandle { hash, .. }
            | Self::GetFileData { hash, .. }
            | Self::StoreFileData { hash, .. } => hash,
        }
    }

    /// The error carried by the response, if any.
    #[must_use]
    pub const fn error(&self) -> Option<ErrorCode> {
        match self {
            Self::RequestFileHandle { error, .. }
            | Self::GetFileData { error, .. }
            | Self::StoreFileData { error, .. } => *error,
        }
    }
}

/// Why an inbound message could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or a known action with bad fields.
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    /// No string `action` field.
    #[error("message has no action")]
    MissingAction,
    /// An action the protocol does not define.
    #[error("unrecognized action {0:?}")]
    UnknownAction(String),
}

/// Decodes an inbound message.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing why the message was rejected.
pub fn decode_request(message: &str) -> Result<Request, DecodeError> {
    let value: Value = serde_json::from_str(message).map_err(DecodeError::Malformed)?;
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingAction)?;
    if !Request::ACTIONS.iter().any(|known| *known == action) {
        return Err(DecodeError::UnknownAction(action.to_string()));
    }
    serde_json::from_value(value).map_err(DecodeError::Malformed)
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

mod base64_opt_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(de::Error::custom))
            .transpose()
    }
}
