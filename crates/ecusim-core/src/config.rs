//! Session configuration: protocol concept, adapter flags and the
//! user-supplied response table.
//!
//! The response table file is JSON with whitespace-separated hex byte
//! strings, one full telegram per string. Telegrams are stored without
//! trusting their trailing checksum; every outgoing checksum is
//! recomputed at encode time.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serialport::Parity;

use crate::error::{Result, SimError};

/// Protocol family driven by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptType {
    /// BMW-FAST on serial, CAN or ENET.
    BmwFast,
    /// KWP2000 over the BMW-FAST serial layout at 10400 baud.
    Kwp2000Bmw,
    /// KWP2000* wire layout.
    Kwp2000S,
    /// DS2 wire layout.
    Ds2,
    /// Trailing-length telegrams, response table only.
    Concept1,
    /// Send-only wake-up sequence.
    Concept3,
    /// ISO9141 block exchange.
    Iso9141,
}

impl ConceptType {
    /// Serial parameters fixed per concept.
    pub fn serial_params(self) -> (u32, Parity) {
        match self {
            ConceptType::BmwFast => (115_200, Parity::None),
            ConceptType::Kwp2000Bmw => (10_400, Parity::None),
            ConceptType::Kwp2000S => (10_400, Parity::Even),
            ConceptType::Ds2 | ConceptType::Concept1 => (9_600, Parity::Even),
            ConceptType::Iso9141 => (10_400, Parity::None),
            ConceptType::Concept3 => (9_600, Parity::Even),
        }
    }

    /// Inter-byte gap that ends a serial telegram.
    pub fn inter_byte_timeout_ms(self) -> u64 {
        match self {
            ConceptType::BmwFast => 30,
            _ => 10,
        }
    }
}

/// Built-in canned device-behavior table, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Response table only.
    #[default]
    None,
    /// Full multi-device vehicle profile.
    E61,
    /// Telemetry-only engine profile.
    E90,
}

/// Adapter behavior switches. Either flag suppresses the request echo
/// on the serial loops.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AdapterFlags {
    /// ADS adapter attached (no echo, DTR/RTS driven).
    #[serde(default)]
    pub ads_adapter: bool,
    /// K-line responder attached (echo removed after each write).
    #[serde(default)]
    pub kline_responder: bool,
}

/// One configurable request/response mapping.
///
/// The request pattern is a full wire telegram; matching compares every
/// byte except the trailing checksum. Responses stay raw bytes because
/// the block-oriented concepts speak layouts the frame codec does not
/// cover; the simulator parses them at dispatch time.
#[derive(Debug, Clone)]
pub struct ResponseEntry {
    /// Request telegram including its checksum byte.
    pub request: Vec<u8>,
    /// Response alternatives, served round-robin.
    pub responses: Vec<Vec<u8>>,
    /// Multi-telegram response, all sent in order when present.
    pub multi: Vec<Vec<u8>>,
    cursor: usize,
}

impl ResponseEntry {
    /// Builds an entry from raw telegrams.
    pub fn new(request: Vec<u8>, responses: Vec<Vec<u8>>, multi: Vec<Vec<u8>>) -> Self {
        ResponseEntry {
            request,
            responses,
            multi,
            cursor: 0,
        }
    }

    /// Exact-length match ignoring the trailing checksum byte.
    pub fn matches(&self, telegram: &[u8]) -> bool {
        telegram.len() == self.request.len()
            && telegram[..telegram.len() - 1] == self.request[..self.request.len() - 1]
    }

    /// Telegrams to send for one match: the whole multi list, or the
    /// next round-robin alternative.
    pub fn next_response(&mut self) -> Vec<Vec<u8>> {
        if self.multi.len() > 1 {
            return self.multi.clone();
        }
        if self.responses.is_empty() {
            return Vec::new();
        }
        let telegram = self.responses[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.responses.len();
        vec![telegram]
    }

    /// First alternative without advancing the cursor (Concept1 loop).
    pub fn first_response(&self) -> Option<&[u8]> {
        self.responses.first().map(Vec::as_slice)
    }

    /// Resets the round-robin cursor; called at session start.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Immutable per-session table supplied by the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigData {
    /// Wake-up / init bytes for the block-oriented concepts.
    pub wakeup: Vec<u8>,
    /// Telegrams sent unprompted, one per loop-startup entry.
    pub response_only: Vec<Vec<u8>>,
    /// The request/response table.
    pub entries: Vec<ResponseEntry>,
}

impl ConfigData {
    /// Loads a response table from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses a response table from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(text).map_err(|e| SimError::Config(e.to_string()))?;
        let wakeup = match &file.wakeup {
            Some(s) => parse_hex(s)?,
            None => Vec::new(),
        };
        let mut response_only = Vec::new();
        for s in &file.response_only {
            response_only.push(parse_hex(s)?);
        }
        let mut entries = Vec::new();
        for entry in &file.entries {
            let request = parse_hex(&entry.request)?;
            if request.len() < 2 {
                return Err(SimError::Config(format!(
                    "request pattern too short: {:?}",
                    entry.request
                )));
            }
            let mut responses = Vec::new();
            for s in &entry.responses {
                responses.push(parse_hex(s)?);
            }
            let mut multi = Vec::new();
            for s in &entry.multi {
                multi.push(parse_hex(s)?);
            }
            entries.push(ResponseEntry::new(request, responses, multi));
        }
        Ok(ConfigData {
            wakeup,
            response_only,
            entries,
        })
    }

    /// Resets all round-robin cursors.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.reset();
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    wakeup: Option<String>,
    #[serde(default)]
    response_only: Vec<String>,
    #[serde(default)]
    entries: Vec<EntryFile>,
}

#[derive(Debug, Deserialize)]
struct EntryFile {
    request: String,
    #[serde(default)]
    responses: Vec<String>,
    #[serde(default)]
    multi: Vec<String>,
}

/// Parses a whitespace-separated hex byte string.
fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for token in text.split_whitespace() {
        let token = token.trim_start_matches("0x").trim_start_matches("0X");
        let value = u8::from_str_radix(token, 16)
            .map_err(|_| SimError::Config(format!("invalid hex byte: {:?}", token)))?;
        bytes.push(value);
    }
    if bytes.is_empty() {
        return Err(SimError::Config("empty byte string".into()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_robin_wraps() {
        let mut entry = ResponseEntry::new(
            vec![0x82, 0x38, 0xF1, 0x21, 0xC2, 0x5E],
            vec![
                vec![0x82, 0xF1, 0x38, 0x61, 0x01, 0x00],
                vec![0x82, 0xF1, 0x38, 0x61, 0x02, 0x00],
                vec![0x82, 0xF1, 0x38, 0x61, 0x03, 0x00],
            ],
            Vec::new(),
        );
        let seq: Vec<u8> = (0..4)
            .map(|_| entry.next_response()[0][4])
            .collect();
        assert_eq!(seq, vec![0x01, 0x02, 0x03, 0x01]);
    }

    #[test]
    fn test_match_ignores_checksum() {
        let entry = ResponseEntry::new(vec![0x82, 0x38, 0xF1, 0x21, 0xC2, 0x5E], Vec::new(), Vec::new());
        assert!(entry.matches(&[0x82, 0x38, 0xF1, 0x21, 0xC2, 0x00]));
        assert!(!entry.matches(&[0x82, 0x38, 0xF1, 0x21, 0xC3, 0x5E]));
        assert!(!entry.matches(&[0x82, 0x38, 0xF1, 0x21, 0xC2]));
    }

    #[test]
    fn test_multi_list_sent_in_full() {
        let mut entry = ResponseEntry::new(
            vec![0x82, 0x38, 0xF1, 0x21, 0xC2, 0x5E],
            vec![vec![0x82, 0xF1, 0x38, 0x61, 0x01, 0x00]],
            vec![
                vec![0x83, 0xF1, 0x38, 0x7F, 0x21, 0x78, 0x00],
                vec![0x82, 0xF1, 0x38, 0x61, 0x01, 0x00],
            ],
        );
        let telegrams = entry.next_response();
        assert_eq!(telegrams.len(), 2);
        assert_eq!(telegrams[0][3..6], [0x7F, 0x21, 0x78]);
    }

    #[test]
    fn test_config_json() {
        let json = r#"{
            "wakeup": "D0 55",
            "response_only": ["10 05 A1"],
            "entries": [
                {
                    "request": "82 38 F1 21 C2 5E",
                    "responses": ["84 F1 38 61 C2 00 00 70"]
                }
            ]
        }"#;
        let config = ConfigData::from_json(json).unwrap();
        assert_eq!(config.wakeup, vec![0xD0, 0x55]);
        assert_eq!(config.response_only, vec![vec![0x10, 0x05, 0xA1]]);
        assert_eq!(config.entries.len(), 1);
        assert_eq!(
            config.entries[0].responses[0],
            vec![0x84, 0xF1, 0x38, 0x61, 0xC2, 0x00, 0x00, 0x70]
        );
    }

    #[test]
    fn test_bad_hex_rejected() {
        assert!(ConfigData::from_json(r#"{"entries":[{"request":"8G"}]}"#).is_err());
    }

    #[test]
    fn test_serial_params() {
        assert_eq!(ConceptType::BmwFast.serial_params(), (115_200, Parity::None));
        assert_eq!(ConceptType::Ds2.serial_params(), (9_600, Parity::Even));
        assert_eq!(ConceptType::BmwFast.inter_byte_timeout_ms(), 30);
        assert_eq!(ConceptType::Iso9141.inter_byte_timeout_ms(), 10);
    }
}
