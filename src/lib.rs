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

//! Host-side NFC Controller Interface (NCI) core.
//!
//! Three layers, leaves first: [`sar`] frames and fragments the wire
//! protocol; [`sm`] drives the RF state machine through the NCI command
//! sequences that make up each state transition; [`facade`] is the stable
//! public contract consumers build against.

pub mod config_file;
pub mod error;
pub mod facade;
pub mod hal;
pub mod packet;
pub mod sar;
pub mod sm;

pub use error::{Error, HalError, Result};
pub use facade::{ConsumerEvent, Core, CoreConfig};
pub use hal::{HalInbound, HalOutbound, HalWriteResult, InnerHal, RawHal};
pub use sm::params::{ParamKey, ParamValue};
pub use sm::types::{
    ActivationParam, DiscoveryNtf, IntfActivationNtf, ModeParam, NciState, NfcTech, Nfcid1, OpMode,
};
