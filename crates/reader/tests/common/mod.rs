//! A simulated authenticator token
//!
//! Unlike the scripted `MockTransport`, this token parses each command and
//! answers the way the phone application does: it signs whatever challenge it
//! is sent and hands out long answers in GET RESPONSE fragments.

#![allow(dead_code, unreachable_pub)]

use std::collections::VecDeque;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use nfcauth_apdu_core::{Bytes, CardTransport, Command, TokenInfo, TransportError};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use rand_v8::rngs::OsRng;

/// Fragment size the token advertises
const CHUNK: usize = 100;

#[derive(Debug)]
pub struct SimulatedToken {
    pub signing_key: SigningKey,
    pub user_id: String,
    pub user_name: String,
    /// Reader id the token claims to have registered against
    pub claimed_reader_id: String,
    /// Answer to registration complete
    pub complete_status: [u8; 2],
    /// Fixed answer to the authentication request instead of signing
    pub auth_status: Option<[u8; 2]>,
    /// Answer the registration request with `90 00` and no data
    pub defer_registration: bool,
    /// Answers to the next polls; an exhausted script means the field is empty
    pub presence: VecDeque<bool>,
    pub commands: Vec<Command>,
    pub completed: bool,
    pub notified_unknown: bool,
    outgoing: VecDeque<u8>,
    connected: bool,
}

impl SimulatedToken {
    pub fn new(user_id: &str, user_name: &str, reader_id: &str) -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            claimed_reader_id: reader_id.to_string(),
            complete_status: [0x90, 0x00],
            auth_status: None,
            defer_registration: false,
            presence: VecDeque::from([true]),
            commands: Vec::new(),
            completed: false,
            notified_unknown: false,
            outgoing: VecDeque::new(),
            connected: true,
        }
    }

    /// Base64 DER `SubjectPublicKeyInfo` of the token key
    pub fn public_key(&self) -> String {
        public_key_of(&self.signing_key)
    }

    /// Script the field: `true` for every poll that finds the token
    pub fn with_presence(mut self, presence: impl IntoIterator<Item = bool>) -> Self {
        self.presence = presence.into_iter().collect();
        self
    }

    /// Number of commands sent with this header
    pub fn count(&self, header: [u8; 4]) -> usize {
        self.commands.iter().filter(|c| c.header() == header).count()
    }

    pub fn instructions(&self) -> Vec<(u8, u8)> {
        self.commands
            .iter()
            .map(|c| (c.instruction(), c.p2()))
            .collect()
    }

    /// Queue `payload` and announce it with `61 XX`
    fn start_chained(&mut self, payload: &[u8]) -> Bytes {
        self.outgoing = payload.iter().copied().collect();
        Bytes::from(vec![0x61, self.outgoing.len().min(CHUNK) as u8])
    }

    fn get_response(&mut self, le: usize) -> Bytes {
        let take = le.min(self.outgoing.len());
        let mut frame: Vec<u8> = self.outgoing.drain(..take).collect();
        match self.outgoing.len() {
            0 => frame.extend_from_slice(&[0x90, 0x00]),
            rest => frame.extend_from_slice(&[0x61, rest.min(CHUNK) as u8]),
        }
        Bytes::from(frame)
    }

    fn registration_answer(&mut self) -> Bytes {
        if self.defer_registration {
            return Bytes::from_static(&[0x90, 0x00]);
        }
        let claim = serde_json::json!({
            "user_id": self.user_id,
            "user_name": self.user_name,
            "public_key": self.public_key(),
            "reader_id": self.claimed_reader_id,
        });
        self.start_chained(claim.to_string().as_bytes())
    }

    fn authentication_answer(&mut self, request: &[u8]) -> Bytes {
        if let Some(status) = self.auth_status {
            return Bytes::copy_from_slice(&status);
        }
        let mut message = request.to_vec();
        message.extend_from_slice(self.user_id.as_bytes());
        let signature: Signature = self.signing_key.sign(&message);

        let claim = serde_json::json!({
            "user_id": self.user_id,
            "signature": BASE64.encode(signature.to_der().as_bytes()),
        });
        self.start_chained(claim.to_string().as_bytes())
    }
}

impl CardTransport for SimulatedToken {
    fn do_exchange(&mut self, frame: &[u8], _max: usize) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::NoToken);
        }
        let command = Command::from_bytes(frame).map_err(|e| TransportError::other(e.to_string()))?;
        self.commands.push(command.clone());

        let response = match command.header() {
            [0x00, 0xA4, 0x04, 0x00] => Bytes::from_static(&[0x90, 0x00]),
            [0xD0, 0x01, 0x00, 0x00] => self.registration_answer(),
            [0xD0, 0x01, 0x00, 0x01] => {
                self.completed = self.complete_status == [0x90, 0x00];
                Bytes::copy_from_slice(&self.complete_status)
            }
            [0xD0, 0x02, 0x00, 0x00] => {
                let request = command.data().unwrap_or_default().to_vec();
                self.authentication_answer(&request)
            }
            [0xD0, 0x03, 0x00, 0x00] => {
                self.notified_unknown = true;
                Bytes::from_static(&[0x90, 0x00])
            }
            [0x00, 0xC0, 0x00, 0x00] => {
                self.get_response(command.expected_length().unwrap_or(0) as usize)
            }
            _ => Bytes::from_static(&[0x6D, 0x00]),
        };
        Ok(response)
    }

    fn poll_token(&mut self) -> Result<Option<TokenInfo>, TransportError> {
        if !self.presence.pop_front().unwrap_or(false) {
            self.connected = false;
            return Ok(None);
        }
        self.connected = true;
        Ok(Some(TokenInfo {
            reader: "Simulated Reader".to_string(),
            atr: Bytes::from_static(&[0x3B, 0x80, 0x80, 0x01, 0x01]),
        }))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn release(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        Ok(())
    }
}

pub fn public_key_of(key: &SigningKey) -> String {
    let der = key
        .verifying_key()
        .to_public_key_der()
        .expect("encode public key");
    BASE64.encode(der.as_bytes())
}

pub fn scratch_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("nfcauth-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}
