//! Transport envelopes.
//!
//! A message travels either as a bare [`ChangeEvent`] or, when an encryption
//! passphrase is configured, as `{"encrypted": "<base64>"}` with the whole
//! event sealed inside. The outer object then carries nothing else.

use crate::error::{ProtocolError, ProtocolResult};
use crate::event::ChangeEvent;
use serde_json::{json, Value};
use usersync_core::PayloadCipher;

/// Field holding the sealed payload.
const ENCRYPTED_FIELD: &str = "encrypted";

/// A message ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// The event as plain JSON.
    Plain(ChangeEvent),
    /// The event encrypted with the shared passphrase.
    Encrypted(String),
}

impl Envelope {
    /// Wraps an event, encrypting it when a cipher is given.
    pub fn seal(event: &ChangeEvent, cipher: Option<&PayloadCipher>) -> ProtocolResult<Self> {
        match cipher {
            None => Ok(Envelope::Plain(event.clone())),
            Some(cipher) => {
                let sealed = cipher
                    .encrypt(&event.to_json()?)
                    .map_err(ProtocolError::Encryption)?;
                Ok(Envelope::Encrypted(sealed))
            }
        }
    }

    /// Returns true for the encrypted form.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Envelope::Encrypted(_))
    }

    /// Serializes the request body.
    pub fn to_body(&self) -> ProtocolResult<String> {
        match self {
            Envelope::Plain(event) => event.to_json(),
            Envelope::Encrypted(sealed) => Ok(json!({ ENCRYPTED_FIELD: sealed }).to_string()),
        }
    }

    /// Unwraps an inbound body.
    ///
    /// When the body has a non-empty `encrypted` field and a cipher is
    /// configured, the payload is decrypted and parsed. Decrypted text that is
    /// not JSON yields `Value::Null`, which later fails validation. Without a
    /// cipher the body is returned untouched.
    pub fn open(body: Value, cipher: Option<&PayloadCipher>) -> ProtocolResult<Value> {
        let sealed = body
            .get(ENCRYPTED_FIELD)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());

        match (sealed, cipher) {
            (Some(sealed), Some(cipher)) => {
                let plaintext = cipher.decrypt(sealed)?;
                Ok(serde_json::from_str(&plaintext).unwrap_or(Value::Null))
            }
            _ => Ok(body),
        }
    }
}
