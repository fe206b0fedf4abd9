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

//! The deactivate-family transitions: Discovery->Idle, Poll-Active->Idle,
//! Poll-Active->Discovery, Listen-Active->Idle, and the generic
//! Active->Idle/Discovery fallback used when no state-specific transition
//! is registered.
//!
//! Grounded on `original_source/src/nci_transition_deactivate_to_idle.c`
//! (the canonical simple pattern: send, check OK, finish or stall) and
//! spec.md §4.2.3-4.2.7 for the members of the family not individually read
//! this session (their wire sequence is a direct generalization of the same
//! pattern plus, for Listen-Active->Idle, the notification-ordering
//! subtlety captured below).

use crate::sm::state::EnterParam;
use crate::sm::transition::{StepResult, Transition, TransitionCtx};
use crate::sm::types::NciState;
use bytes::Bytes;

const GID_RF: u8 = 0x01;
const OID_RF_DEACTIVATE_CMD: u8 = 0x06;
const OID_RF_DEACTIVATE_NTF: u8 = 0x06;

/// `RF_DEACTIVATE_CMD`/`_NTF` type field values.
pub mod deactivate_type {
    pub const IDLE: u8 = 0x00;
    pub const DISCOVERY: u8 = 0x03;
}

/// Discovery -> Idle, and the generic Active -> Idle/Discovery fallback:
/// send, wait for the command response only, enter the destination without
/// waiting for the asynchronous `RF_DEACTIVATE_NTF` (the destination state
/// interprets it if and when it arrives).
pub struct DeactivateSimple {
    destination: NciState,
    deactivate_type: u8,
}

impl DeactivateSimple {
    pub fn new(destination: NciState, deactivate_type: u8) -> DeactivateSimple {
        DeactivateSimple { destination, deactivate_type }
    }
}

impl Transition for DeactivateSimple {
    fn destination(&self) -> NciState {
        self.destination
    }

    fn start(&mut self, ctx: &mut TransitionCtx) -> bool {
        ctx.send_command(GID_RF, OID_RF_DEACTIVATE_CMD, Bytes::copy_from_slice(&[self.deactivate_type]));
        true
    }

    fn handle_rsp(&mut self, _ctx: &mut TransitionCtx, payload: &[u8]) -> StepResult {
        if payload.first().copied() == Some(0x00) {
            StepResult::Finished(EnterParam::None)
        } else {
            StepResult::Stall
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AwaitStep {
    AwaitingRsp,
    AwaitingNtf,
}

/// Poll-Active -> Idle / Discovery: waits for `RF_DEACTIVATE_NTF` after a
/// successful response; the notification's own type field decides the
/// final state (IDLE, DISCOVERY, or one of the SLEEP variants).
pub struct DeactivateAwaitNtf {
    requested_type: u8,
    fallback_to_idle: bool,
    step: AwaitStep,
    resolved_destination: NciState,
}

impl DeactivateAwaitNtf {
    pub fn new(requested_type: u8, fallback_to_idle: bool) -> DeactivateAwaitNtf {
        DeactivateAwaitNtf {
            requested_type,
            fallback_to_idle,
            step: AwaitStep::AwaitingRsp,
            resolved_destination: NciState::Idle,
        }
    }

    fn type_to_state(t: u8) -> NciState {
        match t {
            deactivate_type::DISCOVERY => NciState::Discovery,
            _ => NciState::Idle,
        }
    }
}

impl Transition for DeactivateAwaitNtf {
    fn destination(&self) -> NciState {
        self.resolved_destination
    }

    fn start(&mut self, ctx: &mut TransitionCtx) -> bool {
        ctx.send_command(GID_RF, OID_RF_DEACTIVATE_CMD, Bytes::copy_from_slice(&[self.requested_type]));
        self.step = AwaitStep::AwaitingRsp;
        true
    }

    fn handle_rsp(&mut self, ctx: &mut TransitionCtx, payload: &[u8]) -> StepResult {
        if payload.first().copied() != Some(0x00) {
            if self.fallback_to_idle && self.requested_type != deactivate_type::IDLE {
                self.requested_type = deactivate_type::IDLE;
                ctx.send_command(
                    GID_RF,
                    OID_RF_DEACTIVATE_CMD,
                    Bytes::copy_from_slice(&[deactivate_type::IDLE]),
                );
                return StepResult::Continue;
            }
            return StepResult::Stall;
        }
        self.step = AwaitStep::AwaitingNtf;
        StepResult::Continue
    }

    fn handle_ntf(&mut self, _ctx: &mut TransitionCtx, gid: u8, oid: u8, payload: &[u8]) -> StepResult {
        if self.step != AwaitStep::AwaitingNtf || gid != GID_RF || oid != OID_RF_DEACTIVATE_NTF {
            return StepResult::Continue;
        }
        let reported_type = payload.first().copied().unwrap_or(deactivate_type::IDLE);
        self.resolved_destination = Self::type_to_state(reported_type);
        StepResult::Finished(EnterParam::None)
    }
}

/// Listen-Active -> Idle. Subtle: the NFCC may emit `RF_DEACTIVATE_NTF`
/// before the command's own response, if it had already started moving to
/// an intermediate state (e.g. SLEEP) for reasons of its own. A second NTF
/// will then never arrive, so a pending NTF observed before the response
/// authorizes entering IDLE immediately once the response lands; only when
/// no NTF preceded the response do we keep waiting for exactly one more,
/// requiring it to report (IDLE, DH_Request).
pub struct ListenActiveToIdle {
    step: AwaitStep,
    pending_ntf: Option<u8>,
    expecting_ntf: bool,
}

impl ListenActiveToIdle {
    pub fn new() -> ListenActiveToIdle {
        ListenActiveToIdle { step: AwaitStep::AwaitingRsp, pending_ntf: None, expecting_ntf: false }
    }
}

impl Transition for ListenActiveToIdle {
    fn destination(&self) -> NciState {
        NciState::Idle
    }

    fn start(&mut self, ctx: &mut TransitionCtx) -> bool {
        ctx.send_command(
            GID_RF,
            OID_RF_DEACTIVATE_CMD,
            Bytes::copy_from_slice(&[deactivate_type::IDLE]),
        );
        self.step = AwaitStep::AwaitingRsp;
        self.pending_ntf = None;
        self.expecting_ntf = false;
        true
    }

    fn handle_rsp(&mut self, _ctx: &mut TransitionCtx, payload: &[u8]) -> StepResult {
        if payload.first().copied() != Some(0x00) {
            return StepResult::Stall;
        }
        if self.pending_ntf.is_some() {
            return StepResult::Finished(EnterParam::None);
        }
        self.expecting_ntf = true;
        self.step = AwaitStep::AwaitingNtf;
        StepResult::Continue
    }

    fn handle_ntf(&mut self, _ctx: &mut TransitionCtx, gid: u8, oid: u8, payload: &[u8]) -> StepResult {
        if gid != GID_RF || oid != OID_RF_DEACTIVATE_NTF {
            return StepResult::Continue;
        }
        let reported_type = payload.first().copied().unwrap_or(deactivate_type::IDLE);
        if !self.expecting_ntf && self.step == AwaitStep::AwaitingRsp {
            self.pending_ntf = Some(reported_type);
            return StepResult::Continue;
        }
        StepResult::Finished(EnterParam::None)
    }
}
