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

//! IDLE -> DISCOVERY: the largest single transition. Verifies listen-mode
//! configuration, sets up the listen routing table (with a
//! mixed/protocol/technology fallback chain), configures the discover map,
//! and starts discovery.
//!
//! Grounded on `original_source/src/nci_transition_idle_to_discovery.c`.

use crate::sm::state::EnterParam;
use crate::sm::transition::{routing_caps, StepResult, Transition, TransitionCtx};
use crate::sm::types::{NciState, NfcTech, Nfcid1, OpMode, DISCOVER_TECH_MODES};
use bytes::{BufMut, BytesMut};

const GID_CORE: u8 = 0x00;
const GID_RF: u8 = 0x01;
const OID_CORE_GET_CONFIG_CMD: u8 = 0x03;
const OID_CORE_SET_CONFIG_CMD: u8 = 0x02;
const OID_RF_SET_LISTEN_MODE_ROUTING_CMD: u8 = 0x01;
const OID_RF_DISCOVER_MAP_CMD: u8 = 0x00;
const OID_RF_DISCOVER_CMD: u8 = 0x03;

const LA_SENS_RES_1: u8 = 0x32;
const LA_NFCID1: u8 = 0x33;
const LA_SEL_INFO: u8 = 0x34;
const LF_PROTOCOL_TYPE: u8 = 0x50;

const ROUTING_TYPE_TECHNOLOGY: u8 = 0x00;
const ROUTING_TYPE_PROTOCOL: u8 = 0x01;

const PROTOCOL_ISO_DEP: u8 = 0x04;
const PROTOCOL_NFC_DEP: u8 = 0x05;
const TECH_A: u8 = 0x00;
const TECH_B: u8 = 0x01;
const TECH_F: u8 = 0x02;

#[derive(Debug, PartialEq, Eq)]
enum RoutingKind {
    Mixed,
    ProtocolOnly,
    TechnologyOnly,
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    AwaitingGetConfigRsp,
    AwaitingSetConfigRsp,
    AwaitingRoutingRsp,
    AwaitingDiscoverMapRsp,
    AwaitingDiscoverRsp,
}

pub struct IdleToDiscoveryTransition {
    step: Step,
    mismatched: Vec<u8>,
    routing_kind: RoutingKind,
}

impl IdleToDiscoveryTransition {
    pub fn new() -> IdleToDiscoveryTransition {
        IdleToDiscoveryTransition {
            step: Step::AwaitingGetConfigRsp,
            mismatched: Vec::new(),
            routing_kind: RoutingKind::Mixed,
        }
    }

    fn expected_la_sens_res_1(ctx: &TransitionCtx) -> u8 {
        match ctx.params.la_nfcid1().0.len() {
            7 => 0x40,
            10 => 0x80,
            _ => 0x00,
        }
    }

    fn expected_la_nfcid1(ctx: &TransitionCtx) -> Vec<u8> {
        let id = ctx.params.la_nfcid1();
        if id.is_dynamic() {
            Nfcid1::dynamic().0
        } else {
            id.0.clone()
        }
    }

    fn expected_la_sel_info(ctx: &TransitionCtx) -> u8 {
        let mut v = 0u8;
        if ctx.op_mode.contains(OpMode::CE) {
            v |= 0x20;
        }
        if ctx.op_mode.contains(OpMode::PEER_LISTEN) {
            v |= 0x40;
        }
        v
    }

    fn expected_lf_protocol_type(ctx: &TransitionCtx) -> u8 {
        if ctx.op_mode.contains(OpMode::PEER_LISTEN) && ctx.tech.has_f_listen() {
            0x02
        } else {
            0x00
        }
    }

    fn send_get_config(ctx: &mut TransitionCtx) {
        let ids = [LA_SENS_RES_1, LA_NFCID1, LA_SEL_INFO, LF_PROTOCOL_TYPE];
        let mut cmd = BytesMut::new();
        cmd.put_u8(ids.len() as u8);
        cmd.extend_from_slice(&ids);
        ctx.send_command(GID_CORE, OID_CORE_GET_CONFIG_CMD, cmd.freeze());
    }

    fn check_get_config_rsp(&mut self, ctx: &TransitionCtx, payload: &[u8]) {
        self.mismatched.clear();
        if payload.len() < 2 || payload[0] != 0x00 {
            return;
        }
        let n = payload[1];
        let tlvs = &payload[2..];
        if let Some(v) = crate::sm::parse::find_config_param(tlvs, n, LA_SENS_RES_1) {
            if v.first().copied().unwrap_or(0) & 0xc0 != Self::expected_la_sens_res_1(ctx) {
                self.mismatched.push(LA_SENS_RES_1);
            }
        }
        if let Some(v) = crate::sm::parse::find_config_param(tlvs, n, LA_NFCID1) {
            if v != Self::expected_la_nfcid1(ctx).as_slice() {
                self.mismatched.push(LA_NFCID1);
            }
        }
        if let Some(v) = crate::sm::parse::find_config_param(tlvs, n, LA_SEL_INFO) {
            if v.first().copied().unwrap_or(0) != Self::expected_la_sel_info(ctx) {
                self.mismatched.push(LA_SEL_INFO);
            }
        }
        if let Some(v) = crate::sm::parse::find_config_param(tlvs, n, LF_PROTOCOL_TYPE) {
            if v.first().copied().unwrap_or(0) != Self::expected_lf_protocol_type(ctx) {
                self.mismatched.push(LF_PROTOCOL_TYPE);
            }
        }
    }

    fn send_set_config(&self, ctx: &mut TransitionCtx) {
        let mut cmd = BytesMut::new();
        cmd.put_u8(self.mismatched.len() as u8);
        for &id in &self.mismatched {
            match id {
                LA_SENS_RES_1 => {
                    cmd.put_u8(id);
                    cmd.put_u8(1);
                    cmd.put_u8(Self::expected_la_sens_res_1(ctx));
                }
                LA_NFCID1 => {
                    let v = Self::expected_la_nfcid1(ctx);
                    cmd.put_u8(id);
                    cmd.put_u8(v.len() as u8);
                    cmd.extend_from_slice(&v);
                }
                LA_SEL_INFO => {
                    cmd.put_u8(id);
                    cmd.put_u8(1);
                    cmd.put_u8(Self::expected_la_sel_info(ctx));
                }
                LF_PROTOCOL_TYPE => {
                    cmd.put_u8(id);
                    cmd.put_u8(1);
                    cmd.put_u8(Self::expected_lf_protocol_type(ctx));
                }
                _ => {}
            }
        }
        ctx.send_command(GID_CORE, OID_CORE_SET_CONFIG_CMD, cmd.freeze());
    }

    fn wants_routing(ctx: &TransitionCtx) -> bool {
        ctx.caps.max_routing_table_size > 0
            && (ctx.op_mode.contains(OpMode::CE)
                || (ctx.op_mode.contains(OpMode::PEER_LISTEN)))
    }

    fn protocol_routing_entries(ctx: &TransitionCtx) -> Vec<(u8, u8, u8)> {
        let mut entries = Vec::new();
        let peer_tech_ok = ctx.tech.has_a_poll()
            || ctx.tech.has_f_poll()
            || ctx.tech.has_a_listen()
            || ctx.tech.has_f_listen();
        if (ctx.op_mode.contains(OpMode::PEER_POLL) || ctx.op_mode.contains(OpMode::PEER_LISTEN))
            && peer_tech_ok
        {
            entries.push((ROUTING_TYPE_PROTOCOL, PROTOCOL_NFC_DEP, 3));
        }
        if ctx.op_mode.contains(OpMode::CE) && (ctx.tech.has_a_listen() || ctx.tech.has_b_listen()) {
            entries.push((ROUTING_TYPE_PROTOCOL, PROTOCOL_ISO_DEP, 3));
        }
        entries
    }

    fn tech_routing_entries(ctx: &TransitionCtx) -> Vec<(u8, u8, u8)> {
        let mut entries = Vec::new();
        if ctx.tech.has_f_listen()
            && (ctx.op_mode.contains(OpMode::CE) || ctx.op_mode.contains(OpMode::PEER_LISTEN))
        {
            entries.push((ROUTING_TYPE_TECHNOLOGY, TECH_F, 3));
        }
        if ctx.tech.has_b_listen() {
            entries.push((ROUTING_TYPE_TECHNOLOGY, TECH_B, 3));
        }
        if ctx.tech.has_a_listen() {
            entries.push((ROUTING_TYPE_TECHNOLOGY, TECH_A, 3));
        }
        entries
    }

    fn routing_entries(kind: &RoutingKind, ctx: &TransitionCtx) -> Vec<(u8, u8, u8)> {
        match kind {
            RoutingKind::Mixed => {
                let mut v = Self::protocol_routing_entries(ctx);
                v.extend(Self::tech_routing_entries(ctx));
                v
            }
            RoutingKind::ProtocolOnly => Self::protocol_routing_entries(ctx),
            RoutingKind::TechnologyOnly => Self::tech_routing_entries(ctx),
        }
    }

    fn send_routing(&self, ctx: &mut TransitionCtx) {
        let entries = Self::routing_entries(&self.routing_kind, ctx);
        let max_size = ctx.caps.max_routing_table_size as usize;
        let mut cmd = BytesMut::new();
        cmd.put_u8(0x00); // More = 0
        let count_pos = cmd.len();
        cmd.put_u8(0); // placeholder count
        let mut count = 0u8;
        const DH: u8 = 0x00;
        const VALUE_LEN: usize = 3; // {DH, power-state-on, value}
        for (etype, value, power) in entries {
            if cmd.len() + 2 + VALUE_LEN > max_size + 2 {
                break; // doesn't fit, silently drop (logged by caller)
            }
            cmd.put_u8(etype);
            cmd.put_u8(VALUE_LEN as u8);
            cmd.put_u8(DH);
            cmd.put_u8(power);
            cmd.put_u8(value);
            count += 1;
        }
        cmd[count_pos] = count;
        ctx.send_command(GID_RF, OID_RF_SET_LISTEN_MODE_ROUTING_CMD, cmd.freeze());
    }

    fn send_discover_map(ctx: &mut TransitionCtx) {
        let mut entries: Vec<(u8, u8, u8)> = Vec::new(); // (protocol, mode, interface)
        const MODE_POLL: u8 = 0x01;
        const MODE_LISTEN: u8 = 0x02;
        const T1T: u8 = 0x01;
        const T2T: u8 = 0x02;
        const T3T: u8 = 0x03;
        const T5T: u8 = 0x06;
        const FRAME: u8 = 0x01;
        if ctx.op_mode.contains(OpMode::RW) {
            if ctx.tech.has_a_poll() {
                entries.push((T1T, MODE_POLL, FRAME));
                entries.push((T2T, MODE_POLL, FRAME));
            }
            if ctx.tech.has_f_poll() {
                entries.push((T3T, MODE_POLL, FRAME));
            }
            if ctx.tech.has_v_poll() {
                entries.push((T5T, MODE_POLL, FRAME));
            }
            if ctx.tech.has_a_poll() || ctx.tech.has_b_poll() {
                entries.push((PROTOCOL_ISO_DEP, MODE_POLL, PROTOCOL_ISO_DEP));
            }
        }
        if ctx.op_mode.contains(OpMode::PEER_POLL) && (ctx.tech.has_a_poll() || ctx.tech.has_f_poll()) {
            entries.push((PROTOCOL_NFC_DEP, MODE_POLL, PROTOCOL_NFC_DEP));
        }
        if ctx.op_mode.contains(OpMode::PEER_LISTEN)
            && (ctx.tech.has_a_listen() || ctx.tech.has_f_listen())
        {
            entries.push((PROTOCOL_NFC_DEP, MODE_LISTEN, PROTOCOL_NFC_DEP));
        }
        if ctx.op_mode.contains(OpMode::CE) && (ctx.tech.has_a_listen() || ctx.tech.has_b_listen()) {
            entries.push((PROTOCOL_ISO_DEP, MODE_LISTEN, PROTOCOL_ISO_DEP));
        }
        let mut cmd = BytesMut::new();
        cmd.put_u8(entries.len() as u8);
        for (protocol, mode, interface) in entries {
            cmd.put_u8(protocol);
            cmd.put_u8(mode);
            cmd.put_u8(interface);
        }
        ctx.send_command(GID_RF, OID_RF_DISCOVER_MAP_CMD, cmd.freeze());
    }

    fn send_discover(ctx: &mut TransitionCtx) {
        let mut techs = 0u16;
        if ctx.op_mode.contains(OpMode::RW) {
            techs |= NfcTech::A_POLL | NfcTech::B_POLL | NfcTech::F_POLL | NfcTech::V_POLL;
        }
        if ctx.op_mode.contains(OpMode::PEER_POLL) {
            techs |= NfcTech::A_POLL | NfcTech::F_POLL;
        }
        if ctx.op_mode.contains(OpMode::PEER_LISTEN) {
            techs |= NfcTech::A_LISTEN | NfcTech::F_LISTEN;
        }
        if ctx.op_mode.contains(OpMode::CE) {
            techs |= NfcTech::A_LISTEN | NfcTech::B_LISTEN;
        }
        techs &= ctx.tech.0;

        let mut cmd = BytesMut::new();
        let count_pos = 0;
        cmd.put_u8(0);
        let mut count = 0u8;
        for &(bit, mode) in DISCOVER_TECH_MODES {
            if techs & bit != 0 {
                cmd.put_u8(mode);
                cmd.put_u8(1); // frequency
                count += 1;
            }
        }
        cmd[count_pos] = count;
        ctx.send_command(GID_RF, OID_RF_DISCOVER_CMD, cmd.freeze());
    }
}

impl Transition for IdleToDiscoveryTransition {
    fn destination(&self) -> NciState {
        NciState::Discovery
    }

    fn start(&mut self, ctx: &mut TransitionCtx) -> bool {
        Self::send_get_config(ctx);
        self.step = Step::AwaitingGetConfigRsp;
        true
    }

    fn handle_rsp(&mut self, ctx: &mut TransitionCtx, payload: &[u8]) -> StepResult {
        match self.step {
            Step::AwaitingGetConfigRsp => {
                self.check_get_config_rsp(ctx, payload);
                if self.mismatched.is_empty() {
                    self.proceed_to_routing(ctx)
                } else {
                    self.send_set_config(ctx);
                    self.step = Step::AwaitingSetConfigRsp;
                    StepResult::Continue
                }
            }
            Step::AwaitingSetConfigRsp => self.proceed_to_routing(ctx),
            Step::AwaitingRoutingRsp => {
                let ok = payload.first().copied() == Some(0x00);
                if !ok {
                    match self.routing_kind {
                        RoutingKind::Mixed => {
                            self.routing_kind = RoutingKind::ProtocolOnly;
                            self.send_routing(ctx);
                            return StepResult::Continue;
                        }
                        RoutingKind::ProtocolOnly => {
                            self.routing_kind = RoutingKind::TechnologyOnly;
                            self.send_routing(ctx);
                            return StepResult::Continue;
                        }
                        RoutingKind::TechnologyOnly => {}
                    }
                }
                Self::send_discover_map(ctx);
                self.step = Step::AwaitingDiscoverMapRsp;
                StepResult::Continue
            }
            Step::AwaitingDiscoverMapRsp => {
                if payload.first().copied() != Some(0x00) {
                    return StepResult::Stall;
                }
                Self::send_discover(ctx);
                self.step = Step::AwaitingDiscoverRsp;
                StepResult::Continue
            }
            Step::AwaitingDiscoverRsp => {
                if payload.first().copied() != Some(0x00) {
                    return StepResult::Stall;
                }
                StepResult::Finished(EnterParam::None)
            }
        }
    }
}

impl IdleToDiscoveryTransition {
    fn proceed_to_routing(&mut self, ctx: &mut TransitionCtx) -> StepResult {
        if Self::wants_routing(ctx) {
            self.routing_kind = if routing_caps::supports(
                ctx.caps.nfcc_routing,
                routing_caps::PROTOCOL_BASED | routing_caps::TECHNOLOGY_BASED,
            ) {
                RoutingKind::Mixed
            } else if routing_caps::supports(ctx.caps.nfcc_routing, routing_caps::PROTOCOL_BASED) {
                RoutingKind::ProtocolOnly
            } else if routing_caps::supports(ctx.caps.nfcc_routing, routing_caps::TECHNOLOGY_BASED) {
                RoutingKind::TechnologyOnly
            } else {
                Self::send_discover_map(ctx);
                self.step = Step::AwaitingDiscoverMapRsp;
                return StepResult::Continue;
            };
            self.send_routing(ctx);
            self.step = Step::AwaitingRoutingRsp;
        } else {
            Self::send_discover_map(ctx);
            self.step = Step::AwaitingDiscoverMapRsp;
        }
        StepResult::Continue
    }
}
