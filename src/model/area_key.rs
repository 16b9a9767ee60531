use super::radio::Radio;
use crate::{Error, Result};
use base64::prelude::{Engine, BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Size of the packed form: one radio byte and three big-endian u16 values.
pub const AREA_KEY_LEN: usize = 7;

/// Identifies a cell area: all cells sharing radio, mcc, mnc and lac.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AreaKey {
    pub radio: Radio,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u16,
}

impl AreaKey {
    pub fn new(radio: Radio, mcc: u16, mnc: u16, lac: u16) -> AreaKey {
        AreaKey {
            radio,
            mcc,
            mnc,
            lac,
        }
    }

    pub fn to_bytes(&self) -> [u8; AREA_KEY_LEN] {
        let mut res = [0; AREA_KEY_LEN];
        res[0] = self.radio as u8;
        res[1..3].copy_from_slice(&self.mcc.to_be_bytes());
        res[3..5].copy_from_slice(&self.mnc.to_be_bytes());
        res[5..7].copy_from_slice(&self.lac.to_be_bytes());
        res
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<AreaKey> {
        if bytes.len() != AREA_KEY_LEN {
            return Err(Error::Encoding(format!(
                "area key must be {AREA_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let radio = Radio::from_u8(bytes[0])
            .ok_or_else(|| Error::Encoding(format!("unknown radio type {}", bytes[0])))?;
        Ok(AreaKey {
            radio,
            mcc: u16::from_be_bytes([bytes[1], bytes[2]]),
            mnc: u16::from_be_bytes([bytes[3], bytes[4]]),
            lac: u16::from_be_bytes([bytes[5], bytes[6]]),
        })
    }

    /// Canonical queue form: the packed bytes as base64 text.
    pub fn encode(&self) -> String {
        BASE64_STANDARD.encode(self.to_bytes())
    }

    pub fn decode(text: &str) -> Result<AreaKey> {
        let bytes = BASE64_STANDARD.decode(text)?;
        AreaKey::from_bytes(&bytes)
    }
}

impl Display for AreaKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}:{}", self.radio, self.mcc, self.mnc, self.lac)
    }
}

/// An area key as it may appear on the queue.
///
/// Producers write the canonical base64 text. Older producers wrote the key
/// as an object of its parts, which is still accepted until those payloads
/// have drained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueuedAreaKey {
    Canonical(String),
    Legacy(LegacyAreaKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAreaKey {
    pub radio: u8,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u16,
}

impl QueuedAreaKey {
    pub fn from_value(value: serde_json::Value) -> Result<QueuedAreaKey> {
        serde_json::from_value(value.clone())
            .map_err(|_| Error::Encoding(format!("unrecognized area key: {value}")))
    }

    pub fn area_key(&self) -> Result<AreaKey> {
        match self {
            QueuedAreaKey::Canonical(text) => AreaKey::decode(text)
                .map_err(|e| Error::Encoding(format!("malformed area key {text:?}: {e}"))),
            QueuedAreaKey::Legacy(legacy) => {
                let radio = Radio::from_u8(legacy.radio).ok_or_else(|| {
                    Error::Encoding(format!("unknown radio type {}", legacy.radio))
                })?;
                Ok(AreaKey::new(radio, legacy.mcc, legacy.mnc, legacy.lac))
            }
        }
    }

    /// Rewrites either form into the canonical text.
    pub fn normalize(&self) -> Result<String> {
        match self {
            QueuedAreaKey::Canonical(text) => {
                // validate before passing it on
                self.area_key()?;
                Ok(text.clone())
            }
            QueuedAreaKey::Legacy(_) => Ok(self.area_key()?.encode()),
        }
    }
}

impl From<AreaKey> for QueuedAreaKey {
    fn from(key: AreaKey) -> Self {
        QueuedAreaKey::Canonical(key.encode())
    }
}
