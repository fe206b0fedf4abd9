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

//! The universal Reset transition (any state -> IDLE).
//!
//! Grounded on `original_source/src/nci_transition_reset.c`: v1.0 vs v2.x
//! branch on `CORE_RESET_RSP` payload length, the LLCP general-bytes TLV
//! blob sent in `CORE_SET_CONFIG_CMD`.

use crate::sm::state::EnterParam;
use crate::sm::transition::{StepResult, Transition, TransitionCtx};
use crate::sm::types::NciState;
use bytes::{BufMut, Bytes, BytesMut};

const GID_CORE: u8 = 0x00;
const OID_CORE_RESET_CMD: u8 = 0x00;
const OID_CORE_INIT_CMD: u8 = 0x01;
const OID_CORE_SET_CONFIG_CMD: u8 = 0x02;

const TOTAL_DURATION_MS: u16 = 500;

const LLCP_MAGIC: [u8; 3] = [0x46, 0x66, 0x6d];
// llcp_param ids
const LLCP_VERSION: u8 = 1;
const LLCP_MIUX: u8 = 2;
const LLCP_WKS: u8 = 3;
const LLCP_LTO: u8 = 4;
const LLCP_OPT: u8 = 7;

#[derive(Debug, PartialEq, Eq)]
enum Step {
    AwaitingResetRsp,
    AwaitingResetNtf,
    AwaitingInitRsp,
    AwaitingSetConfigRsp,
}

pub struct ResetTransition {
    step: Step,
}

impl ResetTransition {
    pub fn new() -> ResetTransition {
        ResetTransition { step: Step::AwaitingResetRsp }
    }

    fn send_init_cmd(ctx: &mut TransitionCtx, v2_payload: Option<&[u8]>) {
        let payload = match v2_payload {
            Some(p) => Bytes::copy_from_slice(p),
            None => Bytes::new(),
        };
        ctx.send_command(GID_CORE, OID_CORE_INIT_CMD, payload);
    }

    fn parse_init_rsp_v1(ctx: &mut TransitionCtx, payload: &[u8]) -> bool {
        if payload.len() < 6 {
            return false;
        }
        let n = payload[5] as usize;
        if payload.len() < 6 + n + 4 {
            return false;
        }
        ctx.caps.nfcc_discovery = payload[1] as u32;
        ctx.caps.nfcc_routing = payload[2] as u32;
        ctx.caps.nfcc_power = payload[3] as u32;
        ctx.caps.rf_interfaces = payload[6..6 + n].to_vec();
        ctx.caps.max_logical_connections = payload[6 + n];
        ctx.caps.max_routing_table_size =
            u16::from_le_bytes([payload[7 + n], payload[8 + n]]);
        ctx.caps.max_control_payload = payload[9 + n];
        ctx.sar.set_max_logical_connections(ctx.caps.max_logical_connections as usize);
        ctx.sar.set_max_control_mtu(ctx.caps.max_control_payload as usize);
        ctx.sar.set_max_data_mtu(crate::sar::MIN_MTU);
        true
    }

    fn parse_init_rsp_v2(ctx: &mut TransitionCtx, payload: &[u8]) -> bool {
        if payload.len() < 14 {
            return false;
        }
        ctx.caps.nfcc_discovery = payload[1] as u32;
        ctx.caps.nfcc_routing = payload[2] as u32;
        ctx.caps.nfcc_power = payload[3] as u32;
        ctx.caps.max_logical_connections = payload[5];
        ctx.caps.max_routing_table_size = u16::from_le_bytes([payload[6], payload[7]]);
        ctx.caps.max_control_payload = payload[8];
        let n = payload[13] as usize;
        let start = 14;
        if payload.len() < start + n * 2 {
            return false;
        }
        let mut interfaces = Vec::with_capacity(n);
        for i in 0..n {
            interfaces.push(payload[start + i * 2]);
        }
        ctx.caps.rf_interfaces = interfaces;
        ctx.sar.set_max_logical_connections(ctx.caps.max_logical_connections as usize);
        ctx.sar.set_max_control_mtu(ctx.caps.max_control_payload as usize);
        ctx.sar.set_max_data_mtu(crate::sar::MIN_MTU);
        true
    }

    fn send_set_config(ctx: &mut TransitionCtx) {
        let mut cmd = BytesMut::new();
        cmd.put_u8(4); // number of parameters
        cmd.put_u8(0x01); // TOTAL_DURATION
        cmd.put_u8(0x02);
        cmd.put_u16_le(TOTAL_DURATION_MS);
        cmd.put_u8(0x08); // PA_BAIL_OUT
        cmd.put_u8(0x01);
        cmd.put_u8(0x00);
        cmd.put_u8(0x09); // PB_BAIL_OUT
        cmd.put_u8(0x01);
        cmd.put_u8(0x00);
        cmd.put_u8(0x18); // LN_ATR_RES_GEN_BYTES (general bytes TLV)
        let gen_bytes = Self::llcp_general_bytes(ctx);
        cmd.put_u8(gen_bytes.len() as u8);
        cmd.extend_from_slice(&gen_bytes);
        ctx.send_command(GID_CORE, OID_CORE_SET_CONFIG_CMD, cmd.freeze());
    }

    fn llcp_general_bytes(ctx: &TransitionCtx) -> Bytes {
        let mut g = BytesMut::new();
        g.extend_from_slice(&LLCP_MAGIC);
        g.put_u8(LLCP_VERSION);
        g.put_u8(1);
        g.put_u8(ctx.params.llc_version());
        g.put_u8(LLCP_MIUX);
        g.put_u8(0x02);
        g.put_u16(0x07ff);
        g.put_u8(LLCP_WKS);
        g.put_u8(2);
        g.put_u16(ctx.params.llc_wks());
        g.put_u8(LLCP_LTO);
        g.put_u8(1);
        g.put_u8(0x64);
        g.put_u8(LLCP_OPT);
        g.put_u8(1);
        g.put_u8(0x03);
        g.freeze()
    }
}

impl Transition for ResetTransition {
    fn destination(&self) -> NciState {
        NciState::Idle
    }

    fn start(&mut self, ctx: &mut TransitionCtx) -> bool {
        *ctx.caps = Default::default();
        ctx.send_command(GID_CORE, OID_CORE_RESET_CMD, Bytes::from_static(&[0x00]));
        self.step = Step::AwaitingResetRsp;
        true
    }

    fn handle_rsp(&mut self, ctx: &mut TransitionCtx, payload: &[u8]) -> StepResult {
        match self.step {
            Step::AwaitingResetRsp => match payload.len() {
                3 => {
                    ctx.caps.nci_version = u16::from(payload[1]);
                    Self::send_init_cmd(ctx, None);
                    self.step = Step::AwaitingInitRsp;
                    StepResult::Continue
                }
                1 => {
                    self.step = Step::AwaitingResetNtf;
                    StepResult::Continue
                }
                _ => StepResult::Stall,
            },
            Step::AwaitingInitRsp => {
                let ok = if ctx.caps.nci_version < 0x20 {
                    Self::parse_init_rsp_v1(ctx, payload)
                } else {
                    Self::parse_init_rsp_v2(ctx, payload)
                };
                if !ok {
                    return StepResult::Stall;
                }
                Self::send_set_config(ctx);
                self.step = Step::AwaitingSetConfigRsp;
                StepResult::Continue
            }
            Step::AwaitingSetConfigRsp => StepResult::Finished(EnterParam::None),
            Step::AwaitingResetNtf => StepResult::Stall,
        }
    }

    fn handle_ntf(&mut self, ctx: &mut TransitionCtx, gid: u8, oid: u8, payload: &[u8]) -> StepResult {
        const OID_CORE_RESET_NTF: u8 = 0x00;
        if self.step != Step::AwaitingResetNtf || gid != GID_CORE || oid != OID_CORE_RESET_NTF {
            return StepResult::Continue;
        }
        if payload.len() < 5 {
            return StepResult::Stall;
        }
        ctx.caps.nci_version = u16::from(payload[1]);
        Self::send_init_cmd(ctx, Some(&[0x00, 0x00]));
        self.step = Step::AwaitingInitRsp;
        StepResult::Continue
    }
}

