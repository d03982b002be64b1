//! JSON bodies exchanged with the token

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::{AuthMode, ReaderIdentity};
use crate::{Error, Result};

/// Body of the registration request
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest<'a> {
    /// Configured reader id
    pub reader_id: &'a str,
    /// Configured reader name
    pub reader_name: &'a str,
    /// Protocol version
    pub version: u32,
}

impl<'a> RegistrationRequest<'a> {
    /// Build the request for `identity`
    pub fn new(identity: &'a ReaderIdentity) -> Self {
        Self {
            reader_id: &identity.reader_id,
            reader_name: &identity.reader_name,
            version: identity.protocol_version,
        }
    }

    /// Encoded body
    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Length of the encoded body
    pub fn encoded_len(&self) -> serde_json::Result<usize> {
        self.to_bytes().map(|b| b.len())
    }
}

/// Body of the authentication request
#[derive(Debug, Clone, Serialize)]
pub struct AuthChallenge<'a> {
    /// Configured reader id
    pub reader_id: &'a str,
    /// Protocol version
    pub version: u32,
    /// Requested confirmation mode
    pub auth: AuthMode,
    /// Hex-encoded random nonce
    pub nonce: String,
}

impl<'a> AuthChallenge<'a> {
    /// Build a challenge for `identity` carrying `nonce`
    pub fn new(identity: &'a ReaderIdentity, nonce: String) -> Self {
        Self {
            reader_id: &identity.reader_id,
            version: identity.protocol_version,
            auth: identity.auth_mode,
            nonce,
        }
    }

    /// Encoded body; these exact bytes are part of the signed message
    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Length of the encoded body
    pub fn encoded_len(&self) -> serde_json::Result<usize> {
        self.to_bytes().map(|b| b.len())
    }
}

/// What a token claims when registering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationClaim {
    /// Token holder's id
    pub user_id: String,
    /// Token holder's display name
    pub user_name: String,
    /// Base64 DER public key
    pub public_key: String,
    /// Reader id the token registered against
    pub reader_id: String,
}

/// What a token answers to a challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaim {
    /// Token holder's id
    pub user_id: String,
    /// Base64 DER ECDSA signature
    pub signature: String,
}

#[derive(Deserialize)]
struct RawRegistrationClaim {
    user_id: Option<String>,
    user_name: Option<String>,
    public_key: Option<String>,
    reader_id: Option<String>,
}

#[derive(Deserialize)]
struct RawAuthClaim {
    user_id: Option<String>,
    signature: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::malformed(format!("missing field `{field}`"))),
    }
}

fn decode<'de, T: Deserialize<'de>>(payload: &'de [u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|e| Error::malformed(e.to_string()))
}

impl RegistrationClaim {
    /// Decode a registration answer; every field must be present and non-empty
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let raw: RawRegistrationClaim = decode(payload)?;
        Ok(Self {
            user_id: required(raw.user_id, "user_id")?,
            user_name: required(raw.user_name, "user_name")?,
            public_key: required(raw.public_key, "public_key")?,
            reader_id: required(raw.reader_id, "reader_id")?,
        })
    }
}

impl AuthClaim {
    /// Decode an authentication answer
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Err(Error::EmptyResponse);
        }
        let raw: RawAuthClaim = decode(payload)?;
        Ok(Self {
            user_id: required(raw.user_id, "user_id")?,
            signature: required(raw.signature, "signature")?,
        })
    }
}
