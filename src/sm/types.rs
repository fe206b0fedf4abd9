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

//! RF states, operation-mode/technology bitmasks, and activation/mode
//! parameter records.
//!
//! Field layouts are grounded on `include/nci_types.h` in the retrieval
//! pack's `original_source/`.

/// The RF states plus the internal pseudo-states, per the NCI specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NciState {
    Init,
    Error,
    Stop,
    Idle,
    Discovery,
    W4AllDiscoveries,
    W4HostSelect,
    PollActive,
    ListenActive,
    ListenSleep,
}

/// Which combination of reader/writer, peer-to-peer, and card-emulation
/// roles, on which side (poll/listen), is currently enabled. Plain integer
/// bitmask, matching the original's `enum nfc_op_mode` flag style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpMode(pub u8);

impl OpMode {
    pub const RW: u8 = 0x01;
    pub const PEER_POLL: u8 = 0x02;
    pub const PEER_LISTEN: u8 = 0x04;
    pub const CE: u8 = 0x08;

    pub fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// Enabled technology/mode combinations, one bit per `(tech, side)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NfcTech(pub u16);

impl NfcTech {
    pub const A_POLL: u16 = 0x0001;
    pub const B_POLL: u16 = 0x0002;
    pub const F_POLL: u16 = 0x0004;
    pub const V_POLL: u16 = 0x0008;
    pub const A_LISTEN: u16 = 0x0010;
    pub const B_LISTEN: u16 = 0x0020;
    pub const F_LISTEN: u16 = 0x0040;

    pub fn contains(self, bit: u16) -> bool {
        self.0 & bit != 0
    }
    pub fn has_a_poll(self) -> bool {
        self.contains(Self::A_POLL)
    }
    pub fn has_b_poll(self) -> bool {
        self.contains(Self::B_POLL)
    }
    pub fn has_f_poll(self) -> bool {
        self.contains(Self::F_POLL)
    }
    pub fn has_v_poll(self) -> bool {
        self.contains(Self::V_POLL)
    }
    pub fn has_a_listen(self) -> bool {
        self.contains(Self::A_LISTEN)
    }
    pub fn has_b_listen(self) -> bool {
        self.contains(Self::B_LISTEN)
    }
    pub fn has_f_listen(self) -> bool {
        self.contains(Self::F_LISTEN)
    }
}

/// Technology/mode table used when building `RF_DISCOVER_CMD`, in priority
/// order (poll before listen), mirroring `tech_modes[]` in
/// `nci_transition_idle_to_discovery.c`.
pub const DISCOVER_TECH_MODES: &[(u16, u8)] = &[
    (NfcTech::A_POLL, 0x00),   // NCI_MODE_PASSIVE_POLL_A
    (NfcTech::B_POLL, 0x01),   // NCI_MODE_PASSIVE_POLL_B
    (NfcTech::F_POLL, 0x02),   // NCI_MODE_PASSIVE_POLL_F
    (NfcTech::V_POLL, 0x06),   // NCI_MODE_PASSIVE_POLL_15693
    (NfcTech::A_LISTEN, 0x80), // NCI_MODE_PASSIVE_LISTEN_A
    (NfcTech::B_LISTEN, 0x81), // NCI_MODE_PASSIVE_LISTEN_B
    (NfcTech::F_LISTEN, 0x82), // NCI_MODE_PASSIVE_LISTEN_F
];

/// A tag/peer's NFCID1, variable length (0, 4, 7, or 10 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Nfcid1(pub Vec<u8>);

impl Nfcid1 {
    /// True when this is the "dynamic" marker: length 4, first byte 0x08.
    pub fn is_dynamic(&self) -> bool {
        self.0.is_empty() || (self.0.len() == 4 && self.0[0] == 0x08)
    }

    pub fn dynamic() -> Nfcid1 {
        Nfcid1(vec![0x08, 0x00, 0x00, 0x00])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeParamPollA {
    pub sens_res: [u8; 2],
    pub nfcid1: Vec<u8>,
    pub sel_res: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeParamPollB {
    pub nfcid0: [u8; 4],
    pub fsc: u32,
    pub app_data: [u8; 4],
    pub prot_info: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeParamPollF {
    pub bitrate: u8,
    pub nfcid2: [u8; 8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeParamPollV {
    pub res_flag: u8,
    pub dsfid: u8,
    pub uid: [u8; 8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeParamListenF {
    pub nfcid2: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeParam {
    PollA(ModeParamPollA),
    PollB(ModeParamPollB),
    PollF(ModeParamPollF),
    PollV(ModeParamPollV),
    ListenF(ModeParamListenF),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationParamIsoDepPollA {
    pub fsc: u32,
    pub t1: Vec<u8>,
    pub t0: u8,
    pub ta: u8,
    pub tb: u8,
    pub tc: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationParamIsoDepPollB {
    pub mbli: u32,
    pub did: u32,
    pub hlr: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationParamIsoDepListenA {
    pub fsd: u32,
    pub did: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationParamIsoDepListenB {
    pub nfcid0: [u8; 4],
    pub param: [u8; 4],
    pub hlc: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationParamNfcDepPoll {
    pub nfcid3: [u8; 10],
    pub did: u8,
    pub bs: u8,
    pub br: u8,
    pub to: Option<u8>,
    pub pp: u8,
    pub g: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationParamNfcDepListen {
    pub nfcid3: [u8; 10],
    pub did: u8,
    pub bs: u8,
    pub br: u8,
    pub pp: u8,
    pub g: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationParam {
    IsoDepPollA(ActivationParamIsoDepPollA),
    IsoDepPollB(ActivationParamIsoDepPollB),
    IsoDepListenA(ActivationParamIsoDepListenA),
    IsoDepListenB(ActivationParamIsoDepListenB),
    NfcDepPoll(ActivationParamNfcDepPoll),
    NfcDepListen(ActivationParamNfcDepListen),
    None,
}

/// A fully parsed `RF_INTF_ACTIVATED_NTF`, delivered to consumers as the
/// "interface activated" event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntfActivationNtf {
    pub discovery_id: u8,
    pub rf_interface: u8,
    pub rf_protocol: u8,
    pub activation_rf_tech_and_mode: u8,
    pub max_data_packet_payload_size: u8,
    pub initial_num_credits: u8,
    pub mode_param: Option<ModeParam>,
    pub data_exch_rf_tech_and_mode: u8,
    pub data_exch_tx_bit_rate: u8,
    pub data_exch_rx_bit_rate: u8,
    pub activation_param: ActivationParam,
}

/// A parsed `RF_DISCOVER_NTF` entry (one discovered remote endpoint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryNtf {
    pub discovery_id: u8,
    pub rf_protocol: u8,
    pub rf_tech_and_mode: u8,
    pub mode_param: Option<ModeParam>,
    pub more: bool,
}
