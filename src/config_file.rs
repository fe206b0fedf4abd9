// Copyright (c) 2024 nci-core contributors
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright
//       notice, this list of conditions and the following disclaimer.
//     * Redistributions in binary form must reproduce the above
//       copyright notice, this list of conditions and the following
//       disclaimer in the documentation and/or other materials provided
//       with the distribution.
//     * Neither the name of the copyright holder nor the names of its
//       contributors may be used to endorse or promote products derived
//       from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// OWNER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Best-effort configuration file parsing: `[Technologies]` and `[NFCID1]`
//! sections, per spec §6. Grounded on SPEC_FULL §10.4; a missing or
//! unreadable file is not an error, it just leaves defaults in place.

use crate::sm::types::{NfcTech, Nfcid1};
use log::warn;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    pub tech: Option<NfcTech>,
    pub la_nfcid1: Option<Nfcid1>,
}

fn token_to_bits(token: &str) -> Option<u16> {
    match token.trim() {
        "A" => Some(NfcTech::A_POLL | NfcTech::A_LISTEN),
        "B" => Some(NfcTech::B_POLL | NfcTech::B_LISTEN),
        "F" => Some(NfcTech::F_POLL | NfcTech::F_LISTEN),
        "V" => Some(NfcTech::V_POLL),
        "Poll-A" => Some(NfcTech::A_POLL),
        "Poll-B" => Some(NfcTech::B_POLL),
        "Poll-F" => Some(NfcTech::F_POLL),
        "Poll-V" => Some(NfcTech::V_POLL),
        "Listen-A" => Some(NfcTech::A_LISTEN),
        "Listen-B" => Some(NfcTech::B_LISTEN),
        "Listen-F" => Some(NfcTech::F_LISTEN),
        _ => None,
    }
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Parse the contents of a config file (already read from disk by the
/// caller). Unknown sections, keys, or tokens are logged and ignored.
pub fn parse(contents: &str) -> FileConfig {
    let mut config = FileConfig::default();
    let mut section = String::new();
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = line[1..line.len() - 1].to_string();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!("config: ignoring malformed line: {}", line);
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match section.as_str() {
            "Technologies" if key == "Technologies" => {
                let mut bits = 0u16;
                for token in value.split(',') {
                    match token_to_bits(token) {
                        Some(b) => bits |= b,
                        None => warn!("config: unknown technology token '{}'", token.trim()),
                    }
                }
                config.tech = Some(NfcTech(bits));
            }
            "NFCID1" if key == "LA" => match parse_hex(value) {
                Some(bytes) => config.la_nfcid1 = Some(Nfcid1(bytes)),
                None => warn!("config: malformed LA NFCID1 value '{}'", value),
            },
            _ => warn!("config: ignoring unknown key '{}' in section '[{}]'", key, section),
        }
    }
    config
}

/// Read and parse a config file from `path`; returns defaults (with a
/// logged warning) if the file cannot be read.
pub fn load(path: &Path) -> FileConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse(&contents),
        Err(e) => {
            warn!("config: could not read {}: {}", path.display(), e);
            FileConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_technologies_and_static_nfcid1() {
        let config = parse("[Technologies]\nTechnologies = A,Poll-F\n\n[NFCID1]\nLA = 08010203\n");
        let tech = config.tech.unwrap();
        assert!(tech.has_a_poll());
        assert!(tech.has_a_listen());
        assert!(tech.has_f_poll());
        assert!(!tech.has_f_listen());
        assert_eq!(config.la_nfcid1.unwrap().0, vec![0x08, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn unknown_tokens_do_not_panic() {
        let config = parse("[Technologies]\nTechnologies = A,Bogus\n");
        assert!(config.tech.unwrap().has_a_poll());
    }
}
