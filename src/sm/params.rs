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

//! Core parameter table (LLC_VERSION, LLC_WKS, LA_NFCID1) per spec §3/§4.3.

use crate::sm::types::Nfcid1;

/// Identifies a single managed parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    LlcVersion,
    LlcWks,
    LaNfcid1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    LlcVersion(u8),
    LlcWks(u16),
    LaNfcid1(Nfcid1),
}

impl ParamValue {
    pub fn key(&self) -> ParamKey {
        match self {
            ParamValue::LlcVersion(_) => ParamKey::LlcVersion,
            ParamValue::LlcWks(_) => ParamKey::LlcWks,
            ParamValue::LaNfcid1(_) => ParamKey::LaNfcid1,
        }
    }
}

/// The live parameter table, seeded with NCI defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamTable {
    llc_version: u8,
    llc_wks: u16,
    la_nfcid1: Nfcid1,
}

impl Default for ParamTable {
    fn default() -> Self {
        ParamTable { llc_version: 0x11, llc_wks: 0x0003, la_nfcid1: Nfcid1::dynamic() }
    }
}

impl ParamTable {
    pub fn get(&self, key: ParamKey) -> ParamValue {
        match key {
            ParamKey::LlcVersion => ParamValue::LlcVersion(self.llc_version),
            ParamKey::LlcWks => ParamValue::LlcWks(self.llc_wks),
            ParamKey::LaNfcid1 => ParamValue::LaNfcid1(self.la_nfcid1.clone()),
        }
    }

    pub fn llc_version(&self) -> u8 {
        self.llc_version
    }

    pub fn llc_wks(&self) -> u16 {
        self.llc_wks
    }

    pub fn la_nfcid1(&self) -> &Nfcid1 {
        &self.la_nfcid1
    }

    /// Set a parameter, returning whether the value actually changed.
    pub fn set(&mut self, value: ParamValue) -> bool {
        match value {
            ParamValue::LlcVersion(v) => {
                let changed = v != self.llc_version;
                self.llc_version = v;
                changed
            }
            ParamValue::LlcWks(v) => {
                let v = v | 0x0001;
                let changed = v != self.llc_wks;
                self.llc_wks = v;
                changed
            }
            ParamValue::LaNfcid1(v) => {
                let changed = v != self.la_nfcid1;
                self.la_nfcid1 = v;
                changed
            }
        }
    }

    /// Reset a single parameter back to its NCI default.
    pub fn reset(&mut self, key: ParamKey) -> bool {
        let default = ParamTable::default();
        self.set(default.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_nci_spec() {
        let table = ParamTable::default();
        assert_eq!(table.llc_version(), 0x11);
        assert_eq!(table.llc_wks(), 0x0003);
        assert!(table.la_nfcid1().is_dynamic());
    }

    #[test]
    fn set_llc_wks_always_keeps_llc_bit() {
        let mut table = ParamTable::default();
        assert!(table.set(ParamValue::LlcWks(0x0002)));
        assert_eq!(table.llc_wks(), 0x0003);
    }

    #[test]
    fn reset_restores_default_and_reports_change() {
        let mut table = ParamTable::default();
        table.set(ParamValue::LlcVersion(0x20));
        assert!(table.reset(ParamKey::LlcVersion));
        assert_eq!(table.llc_version(), 0x11);
        assert!(!table.reset(ParamKey::LlcVersion));
    }
}
