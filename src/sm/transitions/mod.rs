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

pub mod deactivate;
pub mod idle_to_discovery;
pub mod reset;

use crate::sm::transition::Transition;
use crate::sm::types::NciState;
use deactivate::{deactivate_type, DeactivateAwaitNtf, DeactivateSimple, ListenActiveToIdle};
use idle_to_discovery::IdleToDiscoveryTransition;
use reset::ResetTransition;

/// Resolve the transition object for a given `(source, destination)` pair,
/// per spec §4.2's named transitions. When no direct transition is
/// registered and the destination is IDLE, the universal Reset transition
/// is returned as the fallback every state can reach IDLE through.
pub fn make_transition(src: NciState, dst: NciState) -> Option<Box<dyn Transition>> {
    use NciState::*;
    match (src, dst) {
        (Idle, Discovery) => Some(Box::new(IdleToDiscoveryTransition::new())),
        (Discovery, Idle) | (W4AllDiscoveries, Idle) | (W4HostSelect, Idle) | (ListenSleep, Idle) => {
            Some(Box::new(DeactivateSimple::new(Idle, deactivate_type::IDLE)))
        }
        (PollActive, Idle) => Some(Box::new(DeactivateAwaitNtf::new(deactivate_type::IDLE, false))),
        (PollActive, Discovery) => {
            Some(Box::new(DeactivateAwaitNtf::new(deactivate_type::DISCOVERY, true)))
        }
        (ListenActive, Idle) => Some(Box::new(ListenActiveToIdle::new())),
        (ListenActive, Discovery) => {
            Some(Box::new(DeactivateSimple::new(Discovery, deactivate_type::DISCOVERY)))
        }
        (W4AllDiscoveries, Discovery) | (W4HostSelect, Discovery) | (ListenSleep, Discovery) => {
            Some(Box::new(DeactivateSimple::new(Discovery, deactivate_type::DISCOVERY)))
        }
        (src, Idle) if src != Idle => Some(Box::new(ResetTransition::new())),
        _ => None,
    }
}
