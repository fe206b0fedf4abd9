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

//! Transition trait and the SM-facing context each transition drives
//! through.
//!
//! Grounded on `original_source/src/nci_transition.c`: the base class's
//! vtable (`start`/`finished`/`handle_ntf`) plus a weak back-reference to
//! the owning SM. Since the whole SM lives in one task, the "weak
//! back-reference" collapses to an ordinary `&mut` borrow passed in for the
//! duration of each call instead of a `Weak` pointer kept around between
//! calls.

use crate::sar::Sar;
use crate::sm::params::ParamTable;
use crate::sm::state::EnterParam;
use crate::sm::types::{NciState, NfcTech, OpMode};
use bytes::Bytes;

/// NFCC capabilities and negotiated settings discovered during reset,
/// consulted (and updated) by transitions.
#[derive(Debug, Clone, Default)]
pub struct NfccCaps {
    pub nci_version: u16,
    pub rf_interfaces: Vec<u8>,
    pub max_logical_connections: u8,
    pub max_routing_table_size: u16,
    pub max_control_payload: u8,
    pub nfcc_discovery: u32,
    pub nfcc_routing: u32,
    pub nfcc_power: u32,
}

/// Capability bits for `nfcc_routing`, per NCI `CORE_INIT_RSP` feature flags.
pub mod routing_caps {
    pub const TECHNOLOGY_BASED: u32 = 0x01;
    pub const PROTOCOL_BASED: u32 = 0x02;

    /// True when `bits` has every bit set in `required`.
    pub fn supports(bits: u32, required: u32) -> bool {
        bits & required == required
    }
}

/// Everything a transition needs to drive its protocol exchange: the SAR to
/// send commands through, and the SM's negotiated configuration.
pub struct TransitionCtx<'a> {
    pub sar: &'a mut Sar,
    pub caps: &'a mut NfccCaps,
    pub op_mode: OpMode,
    pub tech: NfcTech,
    pub params: &'a ParamTable,
    pub la_nfcid1_static: bool,
}

impl<'a> TransitionCtx<'a> {
    pub fn send_command(&mut self, gid: u8, oid: u8, payload: Bytes) -> u32 {
        self.sar.send_command(gid, oid, payload)
    }
}

/// What a transition step asks the owning `Sm` to do next.
pub enum StepResult {
    /// Still in progress; a further command has already been sent.
    Continue,
    /// The protocol exchange is complete; move into the destination state.
    Finished(EnterParam),
    /// An unrecoverable failure occurred; the SM should stall into ERROR.
    Stall,
}

/// The polymorphic transition unit. Each concrete transition is a distinct
/// type implementing this trait; `Sm` holds them as `Box<dyn Transition>`
/// keyed by `(source, destination)`.
pub trait Transition: Send {
    fn destination(&self) -> NciState;

    /// Called once when the transition becomes active. Returning `false`
    /// means the transition could not even begin (the SM falls back to
    /// ERROR, mirroring `default_start` logging and failing in the
    /// original).
    fn start(&mut self, ctx: &mut TransitionCtx) -> bool;

    /// Called when a response arrives for the command most recently sent by
    /// this transition.
    fn handle_rsp(&mut self, ctx: &mut TransitionCtx, payload: &[u8]) -> StepResult;

    /// Called for notifications arriving while this transition is active
    /// (it takes priority over the current state's own handler).
    fn handle_ntf(&mut self, _ctx: &mut TransitionCtx, _gid: u8, _oid: u8, _payload: &[u8]) -> StepResult {
        StepResult::Continue
    }

    /// Run once, just before the transition is replaced or the SM leaves
    /// the source state permanently.
    fn leave(&mut self, _ctx: &mut TransitionCtx) {}
}
