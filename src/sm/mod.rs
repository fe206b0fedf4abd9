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

//! The NCI state machine: owns the current/target RF state, the active
//! transition (if any), and the NFCC's negotiated capabilities.
//!
//! Grounded on `original_source/src/nci_sm.c` and `nci_state.c`; the
//! `switch_to` resolution algorithm and notification-dispatch routing are
//! spec §4.2 unchanged.

pub mod params;
pub mod parse;
pub mod state;
pub mod transition;
pub mod transitions;
pub mod types;

use crate::sar::Sar;
use params::ParamTable;
use state::{EnterParam, State, StateAction};
use std::collections::HashMap;
use transition::{NfccCaps, StepResult, Transition, TransitionCtx};
use transitions::make_transition;
use types::{IntfActivationNtf, NciState, NfcTech, OpMode};

const GID_CORE: u8 = 0x00;
const OID_CORE_CONN_CREDITS_NTF: u8 = 0x06;
const OID_CORE_GENERIC_ERROR_NTF: u8 = 0x07;

/// Events the SM produces as a side effect of notification/response
/// handling, for the façade to turn into consumer-visible events.
pub enum SmEvent {
    CurrentStateChanged(NciState),
    NextStateChanged(NciState),
    InterfaceActivated(IntfActivationNtf),
}

pub struct Sm {
    last_state: NciState,
    next_state: NciState,
    states: HashMap<NciState, Box<dyn State>>,
    active: Option<Box<dyn Transition>>,
    queued_next_target: Option<NciState>,
    deferred_switch: Option<NciState>,
    in_dispatch: bool,
    pub caps: NfccCaps,
    pub op_mode: OpMode,
    pub tech: NfcTech,
    pub params: ParamTable,
}

impl Sm {
    pub fn new() -> Sm {
        let mut states: HashMap<NciState, Box<dyn State>> = HashMap::new();
        states.insert(NciState::Init, Box::new(state::InitState));
        states.insert(NciState::Error, Box::new(state::ErrorState));
        states.insert(NciState::Stop, Box::new(state::StopState));
        states.insert(NciState::Idle, Box::new(state::IdleState));
        states.insert(NciState::Discovery, Box::new(state::DiscoveryState::default()));
        states.insert(NciState::W4AllDiscoveries, Box::new(state::W4AllDiscoveriesState));
        states.insert(NciState::W4HostSelect, Box::new(state::W4HostSelectState));
        states.insert(NciState::PollActive, Box::new(state::PollActiveState));
        states.insert(NciState::ListenActive, Box::new(state::ListenActiveState));
        states.insert(NciState::ListenSleep, Box::new(state::ListenSleepState));
        Sm {
            last_state: NciState::Init,
            next_state: NciState::Init,
            states,
            active: None,
            queued_next_target: None,
            deferred_switch: None,
            in_dispatch: false,
            caps: NfccCaps::default(),
            op_mode: OpMode(OpMode::RW | OpMode::PEER_POLL),
            tech: NfcTech(0xffff),
            params: ParamTable::default(),
        }
    }

    pub fn last_state(&self) -> NciState {
        self.last_state
    }

    pub fn next_state(&self) -> NciState {
        self.next_state
    }

    fn ctx<'a>(&'a mut self, sar: &'a mut Sar) -> TransitionCtx<'a> {
        TransitionCtx {
            sar,
            caps: &mut self.caps,
            op_mode: self.op_mode,
            tech: self.tech,
            params: &self.params,
            la_nfcid1_static: !self.params.la_nfcid1().is_dynamic(),
        }
    }

    /// Request a switch to `target`. If a transition is already active, a
    /// follow-on is queued from its destination; if called re-entrantly
    /// from inside a notification/response handler, the request is
    /// deferred until that handler returns (most recent request wins).
    pub fn switch_to(&mut self, sar: &mut Sar, target: NciState, events: &mut Vec<SmEvent>) {
        if self.in_dispatch {
            self.deferred_switch = Some(target);
            return;
        }
        self.start_switch(sar, target, events);
    }

    fn start_switch(&mut self, sar: &mut Sar, target: NciState, events: &mut Vec<SmEvent>) {
        if self.active.is_some() {
            let from = self.active.as_ref().unwrap().destination();
            if make_transition(from, target).is_some() || is_internal(target) {
                self.queued_next_target = Some(target);
            } else {
                self.stall(sar, NciState::Error, events);
            }
            return;
        }
        if self.last_state == target {
            // Already there; nothing to do.
            return;
        }
        if let Some(t) = make_transition(self.last_state, target) {
            self.activate(sar, t, events);
        } else if is_internal(target) {
            self.enter_internal(target, events);
        } else {
            self.stall(sar, NciState::Error, events);
        }
    }

    fn activate(&mut self, sar: &mut Sar, mut t: Box<dyn Transition>, events: &mut Vec<SmEvent>) {
        if let Some(s) = self.states.get_mut(&self.last_state) {
            s.leave();
        }
        self.next_state = t.destination();
        events.push(SmEvent::NextStateChanged(self.next_state));
        let mut ctx = self.ctx(sar);
        let started = t.start(&mut ctx);
        if !started {
            self.active = None;
            self.stall(sar, NciState::Error, events);
            return;
        }
        self.active = Some(t);
    }

    fn enter_internal(&mut self, target: NciState, events: &mut Vec<SmEvent>) {
        if let Some(s) = self.states.get_mut(&self.last_state) {
            s.leave();
        }
        self.last_state = target;
        self.next_state = target;
        if let Some(s) = self.states.get_mut(&target) {
            s.enter(EnterParam::None);
        }
        events.push(SmEvent::CurrentStateChanged(target));
        events.push(SmEvent::NextStateChanged(target));
    }

    pub fn stall(&mut self, sar: &mut Sar, which: NciState, events: &mut Vec<SmEvent>) {
        if let Some(mut t) = self.active.take() {
            let mut ctx = self.ctx(sar);
            t.leave(&mut ctx);
        }
        self.queued_next_target = None;
        self.deferred_switch = None;
        self.last_state = which;
        self.next_state = which;
        events.push(SmEvent::CurrentStateChanged(which));
        events.push(SmEvent::NextStateChanged(which));
    }

    fn finish_active(&mut self, sar: &mut Sar, param: EnterParam, events: &mut Vec<SmEvent>) {
        let mut t = match self.active.take() {
            Some(t) => t,
            None => return,
        };
        let dest = t.destination();
        {
            let mut ctx = self.ctx(sar);
            t.leave(&mut ctx);
        }
        self.last_state = dest;
        self.next_state = dest;
        events.push(SmEvent::CurrentStateChanged(dest));
        if let Some(s) = self.states.get_mut(&dest) {
            s.enter(param);
        }
        if let Some(target) = self.queued_next_target.take() {
            self.start_switch(sar, target, events);
        }
    }

    fn run_dispatch<F>(&mut self, sar: &mut Sar, events: &mut Vec<SmEvent>, f: F)
    where
        F: FnOnce(&mut Sm, &mut Sar, &mut Vec<SmEvent>),
    {
        self.in_dispatch = true;
        f(self, sar, events);
        self.in_dispatch = false;
        if let Some(target) = self.deferred_switch.take() {
            self.start_switch(sar, target, events);
        }
    }

    /// Route a response to whichever transition is currently active and
    /// waiting for it. Responses arriving with no active transition are
    /// logged and ignored by the caller (the façade only forwards a
    /// response while a command is outstanding).
    pub fn handle_rsp(&mut self, sar: &mut Sar, payload: &[u8], events: &mut Vec<SmEvent>) {
        self.run_dispatch(sar, events, |sm, sar, events| {
            if sm.active.is_none() {
                return;
            }
            let mut t = sm.active.take().unwrap();
            let step = {
                let mut ctx = sm.ctx(sar);
                t.handle_rsp(&mut ctx, payload)
            };
            match step {
                StepResult::Continue => sm.active = Some(t),
                StepResult::Finished(param) => {
                    sm.active = Some(t);
                    sm.finish_active(sar, param, events);
                }
                StepResult::Stall => sm.stall(sar, NciState::Error, events),
            }
        });
    }

    pub fn handle_ntf(&mut self, sar: &mut Sar, gid: u8, oid: u8, payload: &[u8], events: &mut Vec<SmEvent>) {
        if gid == GID_CORE && oid == OID_CORE_CONN_CREDITS_NTF {
            self.apply_credits_ntf(sar, payload);
            return;
        }
        if gid == GID_CORE && oid == OID_CORE_GENERIC_ERROR_NTF {
            log::warn!("CORE_GENERIC_ERROR_NTF: {:02x?}", payload);
            return;
        }
        self.run_dispatch(sar, events, |sm, sar, events| {
            if sm.active.is_some() {
                let mut t = sm.active.take().unwrap();
                let step = {
                    let mut ctx = sm.ctx(sar);
                    t.handle_ntf(&mut ctx, gid, oid, payload)
                };
                match step {
                    StepResult::Continue => sm.active = Some(t),
                    StepResult::Finished(param) => {
                        sm.active = Some(t);
                        sm.finish_active(sar, param, events);
                    }
                    StepResult::Stall => sm.stall(sar, NciState::Error, events),
                }
                return;
            }
            let action = sm.states.get_mut(&sm.last_state).map(|s| s.handle_ntf(gid, oid, payload));
            match action {
                Some(StateAction::SwitchTo(target)) => sm.start_switch(sar, target, events),
                Some(StateAction::Activated(ntf, dest)) => {
                    events.push(SmEvent::InterfaceActivated(ntf.clone()));
                    if let Some(s) = sm.states.get_mut(&sm.last_state) {
                        s.leave();
                    }
                    sm.last_state = dest;
                    sm.next_state = dest;
                    events.push(SmEvent::CurrentStateChanged(dest));
                    if let Some(s) = sm.states.get_mut(&dest) {
                        s.enter(EnterParam::Activation(ntf));
                    }
                }
                _ => {}
            }
        });
    }

    fn apply_credits_ntf(&mut self, sar: &mut Sar, payload: &[u8]) {
        // CORE_CONN_CREDITS_NTF: count(1), then (cid, credits) pairs.
        let n = payload.first().copied().unwrap_or(0) as usize;
        let mut idx = 1;
        for _ in 0..n {
            if payload.len() < idx + 2 {
                break;
            }
            let cid = payload[idx] as usize;
            let credits = payload[idx + 1];
            sar.add_credits(cid, credits);
            idx += 2;
        }
    }
}

fn is_internal(state: NciState) -> bool {
    matches!(state, NciState::Init | NciState::Error | NciState::Stop)
}

impl Default for Sm {
    fn default() -> Self {
        Sm::new()
    }
}
