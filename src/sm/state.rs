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

//! RF/pseudo states: what happens on entry/exit, and how each state reacts
//! to notifications that arrive while it is current and no transition is
//! active.
//!
//! Grounded on `original_source/src/nci_state.c`, with per-state
//! responsibilities from spec §4.2 (DISCOVERY, W4_HOST_SELECT, LISTEN_ACTIVE).

use crate::sm::types::{DiscoveryNtf, IntfActivationNtf, NciState};

/// What a state's notification handler asks the owning `Sm` to do next.
pub enum StateAction {
    Ignore,
    SwitchTo(NciState),
    /// An interface was activated; deliver the event and move to the given
    /// active state (Poll-Active or Listen-Active).
    Activated(IntfActivationNtf, NciState),
}

/// Parameter passed into a state on entry, when the preceding transition
/// produced one (e.g. an activation record).
pub enum EnterParam {
    None,
    Activation(IntfActivationNtf),
}

pub trait State: Send {
    fn id(&self) -> NciState;
    fn enter(&mut self, _param: EnterParam) {}
    fn leave(&mut self) {}
    fn handle_ntf(&mut self, _gid: u8, _oid: u8, _payload: &[u8]) -> StateAction {
        StateAction::Ignore
    }
}

macro_rules! trivial_state {
    ($name:ident, $id:expr) => {
        pub struct $name;
        impl State for $name {
            fn id(&self) -> NciState {
                $id
            }
        }
    };
}

trivial_state!(InitState, NciState::Init);
trivial_state!(ErrorState, NciState::Error);
trivial_state!(StopState, NciState::Stop);
trivial_state!(IdleState, NciState::Idle);
trivial_state!(PollActiveState, NciState::PollActive);
trivial_state!(ListenSleepState, NciState::ListenSleep);

/// Accumulates `RF_DISCOVER_NTF` entries until the NFCC reports `more=false`,
/// then hands off to host selection.
#[derive(Default)]
pub struct DiscoveryState {
    pending: Vec<DiscoveryNtf>,
}

impl State for DiscoveryState {
    fn id(&self) -> NciState {
        NciState::Discovery
    }

    fn enter(&mut self, _param: EnterParam) {
        self.pending.clear();
    }

    fn handle_ntf(&mut self, gid: u8, oid: u8, payload: &[u8]) -> StateAction {
        const GID_RF: u8 = 0x01;
        const OID_RF_DISCOVER_NTF: u8 = 0x03;
        const OID_RF_INTF_ACTIVATED_NTF: u8 = 0x05;
        if gid != GID_RF {
            return StateAction::Ignore;
        }
        match oid {
            OID_RF_DISCOVER_NTF => {
                if let Some(ntf) = crate::sm::parse::parse_discovery_ntf(payload) {
                    let more = ntf.more;
                    self.pending.push(ntf);
                    if !more {
                        StateAction::SwitchTo(NciState::W4HostSelect)
                    } else {
                        StateAction::SwitchTo(NciState::W4AllDiscoveries)
                    }
                } else {
                    StateAction::Ignore
                }
            }
            OID_RF_INTF_ACTIVATED_NTF => {
                if let Some(ntf) = crate::sm::parse::parse_intf_activated_ntf(payload) {
                    let dest = if ntf.activation_rf_tech_and_mode & 0x80 != 0 {
                        NciState::ListenActive
                    } else {
                        NciState::PollActive
                    };
                    StateAction::Activated(ntf, dest)
                } else {
                    StateAction::Ignore
                }
            }
            _ => StateAction::Ignore,
        }
    }
}

/// Waits for every discovery notification of the current poll round (`more`
/// still true) before moving to host selection.
#[derive(Default)]
pub struct W4AllDiscoveriesState;

impl State for W4AllDiscoveriesState {
    fn id(&self) -> NciState {
        NciState::W4AllDiscoveries
    }

    fn handle_ntf(&mut self, gid: u8, oid: u8, payload: &[u8]) -> StateAction {
        if gid == 0x01 && oid == 0x03 {
            if let Some(ntf) = crate::sm::parse::parse_discovery_ntf(payload) {
                if !ntf.more {
                    return StateAction::SwitchTo(NciState::W4HostSelect);
                }
            }
        }
        StateAction::Ignore
    }
}

/// Waits for the host to pick one of the discovered endpoints; the actual
/// `RF_DISCOVER_SELECT_CMD` is sent by the façade on the consumer's
/// instruction, not autonomously by this state.
#[derive(Default)]
pub struct W4HostSelectState;

impl State for W4HostSelectState {
    fn id(&self) -> NciState {
        NciState::W4HostSelect
    }

    fn handle_ntf(&mut self, gid: u8, oid: u8, payload: &[u8]) -> StateAction {
        if gid == 0x01 && oid == 0x05 {
            if let Some(ntf) = crate::sm::parse::parse_intf_activated_ntf(payload) {
                let dest = if ntf.activation_rf_tech_and_mode & 0x80 != 0 {
                    NciState::ListenActive
                } else {
                    NciState::PollActive
                };
                return StateAction::Activated(ntf, dest);
            }
        }
        StateAction::Ignore
    }
}

/// Interprets `CORE_INTERFACE_ERROR_NTF` as recoverable: falls back to
/// DISCOVERY instead of stalling the whole machine.
#[derive(Default)]
pub struct ListenActiveState;

impl State for ListenActiveState {
    fn id(&self) -> NciState {
        NciState::ListenActive
    }

    fn handle_ntf(&mut self, gid: u8, oid: u8, _payload: &[u8]) -> StateAction {
        const GID_CORE: u8 = 0x00;
        const OID_CORE_INTERFACE_ERROR_NTF: u8 = 0x15;
        if gid == GID_CORE && oid == OID_CORE_INTERFACE_ERROR_NTF {
            StateAction::SwitchTo(NciState::Discovery)
        } else {
            StateAction::Ignore
        }
    }
}
