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

//! Parsers for RF_DISCOVER_NTF / RF_INTF_ACTIVATED_NTF and the
//! technology-specific mode/activation parameter blocks they carry.
//!
//! Grounded on `original_source/src/nci_util.c` (TLV/param scanning helpers)
//! and the struct layouts captured from `include/nci_types.h`.

use crate::sm::types::*;

/// Linear TLV scan used for CORE_GET_CONFIG_RSP parameter lookup:
/// `type(1) len(1) value(len)` repeated `nparams` times.
pub fn find_config_param<'a>(mut buf: &'a [u8], mut nparams: u8, id: u8) -> Option<&'a [u8]> {
    while nparams > 0 && buf.len() >= 2 {
        let t = buf[0];
        let len = buf[1] as usize;
        if buf.len() < 2 + len {
            break;
        }
        if t == id {
            return Some(&buf[2..2 + len]);
        }
        buf = &buf[2 + len..];
        nparams -= 1;
    }
    None
}

fn parse_mode_param_poll_a(buf: &[u8]) -> Option<ModeParam> {
    if buf.len() < 3 {
        return None;
    }
    let sens_res = [buf[0], buf[1]];
    let nfcid1_len = buf[2] as usize;
    if buf.len() < 3 + nfcid1_len + 1 {
        return None;
    }
    let nfcid1 = buf[3..3 + nfcid1_len].to_vec();
    let sel_res_len = buf[3 + nfcid1_len] as usize;
    let sel_res = if sel_res_len == 1 && buf.len() >= 3 + nfcid1_len + 2 {
        Some(buf[3 + nfcid1_len + 1])
    } else {
        None
    };
    Some(ModeParam::PollA(ModeParamPollA { sens_res, nfcid1, sel_res }))
}

fn parse_mode_param_poll_b(buf: &[u8]) -> Option<ModeParam> {
    if buf.len() < 1 {
        return None;
    }
    let len = buf[0] as usize;
    if buf.len() < 1 + len || len < 8 {
        return None;
    }
    let body = &buf[1..1 + len];
    let mut nfcid0 = [0u8; 4];
    nfcid0.copy_from_slice(&body[0..4]);
    let mut app_data = [0u8; 4];
    app_data.copy_from_slice(&body[4..8]);
    let prot_info = body[8..].to_vec();
    Some(ModeParam::PollB(ModeParamPollB { nfcid0, fsc: 256, app_data, prot_info }))
}

fn parse_mode_param_poll_f(buf: &[u8]) -> Option<ModeParam> {
    if buf.len() < 1 {
        return None;
    }
    let len = buf[0] as usize;
    if buf.len() < 1 + len || len < 9 {
        return None;
    }
    let body = &buf[1..1 + len];
    let bitrate = body[0];
    let mut nfcid2 = [0u8; 8];
    nfcid2.copy_from_slice(&body[1..9]);
    Some(ModeParam::PollF(ModeParamPollF { bitrate, nfcid2 }))
}

fn parse_mode_param_poll_v(buf: &[u8]) -> Option<ModeParam> {
    if buf.len() < 10 {
        return None;
    }
    let res_flag = buf[0];
    let dsfid = buf[1];
    let mut uid = [0u8; 8];
    uid.copy_from_slice(&buf[2..10]);
    Some(ModeParam::PollV(ModeParamPollV { res_flag, dsfid, uid }))
}

fn parse_mode_param_listen_f(buf: &[u8]) -> Option<ModeParam> {
    if buf.is_empty() {
        return None;
    }
    let len = buf[0] as usize;
    if buf.len() < 1 + len {
        return None;
    }
    Some(ModeParam::ListenF(ModeParamListenF { nfcid2: buf[1..1 + len].to_vec() }))
}

/// Dispatch on `rf_tech_and_mode` (bit 0x80 = listen, low bits = technology).
pub fn parse_mode_param(rf_tech_and_mode: u8, buf: &[u8]) -> Option<ModeParam> {
    let listen = rf_tech_and_mode & 0x80 != 0;
    let tech = rf_tech_and_mode & 0x7f;
    match (listen, tech) {
        (false, 0x00) => parse_mode_param_poll_a(buf),
        (false, 0x01) => parse_mode_param_poll_b(buf),
        (false, 0x02) => parse_mode_param_poll_f(buf),
        (false, 0x06) => parse_mode_param_poll_v(buf),
        (true, 0x02) => parse_mode_param_listen_f(buf),
        _ => None,
    }
}

fn parse_activation_iso_dep_poll_a(buf: &[u8]) -> Option<ActivationParam> {
    if buf.is_empty() {
        return None;
    }
    let t0 = buf[0];
    let mut idx = 1;
    let ta = if t0 & 0x10 != 0 {
        let v = *buf.get(idx)?;
        idx += 1;
        v
    } else {
        0
    };
    let tb = if t0 & 0x20 != 0 {
        let v = *buf.get(idx)?;
        idx += 1;
        v
    } else {
        0
    };
    let tc = if t0 & 0x40 != 0 {
        let v = *buf.get(idx)?;
        idx += 1;
        v
    } else {
        0
    };
    let t1 = buf.get(idx..).unwrap_or(&[]).to_vec();
    Some(ActivationParam::IsoDepPollA(ActivationParamIsoDepPollA { fsc: 256, t1, t0, ta, tb, tc }))
}

fn parse_activation_iso_dep_poll_b(buf: &[u8]) -> Option<ActivationParam> {
    if buf.len() < 2 {
        return None;
    }
    let mbli = (buf[buf.len() - 1] >> 4) as u32;
    let did = (buf[buf.len() - 1] & 0x0f) as u32;
    let hlr = buf[..buf.len() - 1].to_vec();
    Some(ActivationParam::IsoDepPollB(ActivationParamIsoDepPollB { mbli, did, hlr }))
}

fn parse_activation_iso_dep_listen_a(buf: &[u8]) -> Option<ActivationParam> {
    if buf.is_empty() {
        return None;
    }
    let fsd = (buf[0] >> 4) as u32;
    let did = (buf[0] & 0x0f) as u32;
    Some(ActivationParam::IsoDepListenA(ActivationParamIsoDepListenA { fsd, did }))
}

fn parse_activation_iso_dep_listen_b(buf: &[u8]) -> Option<ActivationParam> {
    if buf.len() < 8 {
        return None;
    }
    let mut nfcid0 = [0u8; 4];
    nfcid0.copy_from_slice(&buf[0..4]);
    let mut param = [0u8; 4];
    param.copy_from_slice(&buf[4..8]);
    let hlc = buf[8..].to_vec();
    Some(ActivationParam::IsoDepListenB(ActivationParamIsoDepListenB { nfcid0, param, hlc }))
}

fn parse_activation_nfc_dep_poll(buf: &[u8]) -> Option<ActivationParam> {
    if buf.len() < 14 {
        return None;
    }
    let mut nfcid3 = [0u8; 10];
    nfcid3.copy_from_slice(&buf[0..10]);
    let did = buf[10];
    let bs = buf[11];
    let br = buf[12];
    let to = if buf[13] == 0xff { None } else { Some(buf[13]) };
    let pp = *buf.get(14).unwrap_or(&0);
    let g = buf.get(15..).unwrap_or(&[]).to_vec();
    Some(ActivationParam::NfcDepPoll(ActivationParamNfcDepPoll { nfcid3, did, bs, br, to, pp, g }))
}

fn parse_activation_nfc_dep_listen(buf: &[u8]) -> Option<ActivationParam> {
    if buf.len() < 14 {
        return None;
    }
    let mut nfcid3 = [0u8; 10];
    nfcid3.copy_from_slice(&buf[0..10]);
    let did = buf[10];
    let bs = buf[11];
    let br = buf[12];
    let pp = buf[13];
    let g = buf.get(14..).unwrap_or(&[]).to_vec();
    Some(ActivationParam::NfcDepListen(ActivationParamNfcDepListen { nfcid3, did, bs, br, pp, g }))
}

/// Dispatch on `(rf_interface, listen)`.
pub fn parse_activation_param(rf_interface: u8, listen: bool, buf: &[u8]) -> ActivationParam {
    const RF_INTERFACE_ISO_DEP: u8 = 0x02;
    const RF_INTERFACE_NFC_DEP: u8 = 0x03;
    let parsed = match (rf_interface, listen) {
        (RF_INTERFACE_ISO_DEP, false) => parse_activation_iso_dep_poll_a(buf)
            .or_else(|| parse_activation_iso_dep_poll_b(buf)),
        (RF_INTERFACE_ISO_DEP, true) => parse_activation_iso_dep_listen_a(buf)
            .or_else(|| parse_activation_iso_dep_listen_b(buf)),
        (RF_INTERFACE_NFC_DEP, false) => parse_activation_nfc_dep_poll(buf),
        (RF_INTERFACE_NFC_DEP, true) => parse_activation_nfc_dep_listen(buf),
        _ => None,
    };
    parsed.unwrap_or(ActivationParam::None)
}

pub fn parse_discovery_ntf(buf: &[u8]) -> Option<DiscoveryNtf> {
    if buf.len() < 4 {
        return None;
    }
    let discovery_id = buf[0];
    let rf_protocol = buf[1];
    let rf_tech_and_mode = buf[2];
    let n = buf[3] as usize;
    if buf.len() < 4 + n + 1 {
        return None;
    }
    let mode_param = parse_mode_param(rf_tech_and_mode, &buf[4..4 + n]);
    let notif_type = buf[4 + n];
    Some(DiscoveryNtf { discovery_id, rf_protocol, rf_tech_and_mode, mode_param, more: notif_type != 0x00 })
}

pub fn parse_intf_activated_ntf(buf: &[u8]) -> Option<IntfActivationNtf> {
    if buf.len() < 7 {
        return None;
    }
    let discovery_id = buf[0];
    let rf_interface = buf[1];
    let rf_protocol = buf[2];
    let activation_rf_tech_and_mode = buf[3];
    let max_data_packet_payload_size = buf[4];
    let initial_num_credits = buf[5];
    let n = buf[6] as usize;
    let mode_start = 7;
    if buf.len() < mode_start + n + 3 {
        return None;
    }
    let mode_param = parse_mode_param(activation_rf_tech_and_mode, &buf[mode_start..mode_start + n]);
    let mut idx = mode_start + n;
    let data_exch_rf_tech_and_mode = buf[idx];
    let data_exch_tx_bit_rate = buf[idx + 1];
    let data_exch_rx_bit_rate = buf[idx + 2];
    idx += 3;
    if buf.len() < idx + 1 {
        return None;
    }
    let m = buf[idx] as usize;
    idx += 1;
    if buf.len() < idx + m {
        return None;
    }
    let listen = activation_rf_tech_and_mode & 0x80 != 0;
    let activation_param = parse_activation_param(rf_interface, listen, &buf[idx..idx + m]);
    Some(IntfActivationNtf {
        discovery_id,
        rf_interface,
        rf_protocol,
        activation_rf_tech_and_mode,
        max_data_packet_payload_size,
        initial_num_credits,
        mode_param,
        data_exch_rf_tech_and_mode,
        data_exch_tx_bit_rate,
        data_exch_rx_bit_rate,
        activation_param,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_poll_a_discover_ntf() {
        let mode = [0x00, 0x04, 0x04, 0x01, 0x02, 0x03, 0x04, 0x00];
        let mut buf = vec![0x01, 0x04, 0x00, mode.len() as u8];
        buf.extend_from_slice(&mode);
        buf.push(0x00); // last
        let ntf = parse_discovery_ntf(&buf).unwrap();
        assert_eq!(ntf.discovery_id, 1);
        assert!(!ntf.more);
        match ntf.mode_param {
            Some(ModeParam::PollA(p)) => assert_eq!(p.nfcid1, vec![1, 2, 3, 4]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn find_config_param_scans_tlvs() {
        let buf = [0x01, 0x01, 0xAA, 0x02, 0x02, 0xBB, 0xCC];
        assert_eq!(find_config_param(&buf, 2, 0x02), Some(&[0xBBu8, 0xCC][..]));
        assert_eq!(find_config_param(&buf, 2, 0x09), None);
    }
}
