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

//! HAL boundary: the transport the core drives, and the channel-pair idiom
//! used to wire a concrete transport to the core's dispatch task.
//!
//! Concrete transports (a TCP-connected simulator, a real chip driver) own
//! their own read/write tasks and only touch the `InnerHal` half; the core's
//! dispatch task only touches the `RawHal` half. Neither side needs a mutex:
//! everything crosses the boundary as an owned message.

use bytes::Bytes;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Something arriving from the transport: either raw bytes to reassemble or
/// a fatal transport error.
#[derive(Debug)]
pub enum HalInbound {
    Data(Bytes),
    Error,
}

/// An already-framed outbound segment (header + payload chunk) plus a tag
/// the transport echoes back once it has been written, so the dispatch task
/// can match completions to the packet that produced them.
#[derive(Debug)]
pub struct HalOutbound {
    pub tag: u32,
    pub segment: Bytes,
}

/// Completion of a previously submitted [`HalOutbound`].
#[derive(Debug)]
pub struct HalWriteResult {
    pub tag: u32,
    pub ok: bool,
}

/// The core-facing half of a HAL channel pair.
pub struct RawHal {
    pub out_tx: UnboundedSender<HalOutbound>,
    pub in_rx: UnboundedReceiver<HalInbound>,
    pub write_result_rx: UnboundedReceiver<HalWriteResult>,
}

/// The transport-facing half of the same channel pair.
pub struct InnerHal {
    pub out_rx: UnboundedReceiver<HalOutbound>,
    pub in_tx: UnboundedSender<HalInbound>,
    pub write_result_tx: UnboundedSender<HalWriteResult>,
}

impl InnerHal {
    pub fn new() -> (RawHal, InnerHal) {
        let (out_tx, out_rx) = unbounded_channel();
        let (in_tx, in_rx) = unbounded_channel();
        let (write_result_tx, write_result_rx) = unbounded_channel();
        (RawHal { out_tx, in_rx, write_result_rx }, InnerHal { out_rx, in_tx, write_result_tx })
    }
}

/// A minimal in-process transport used by integration tests: loops written
/// segments straight back as a write-ok completion without touching a real
/// socket. Exercising an actual transport (TCP to a simulator, as the
/// teacher's `rootcanal_hal` does) is left to binaries that embed this
/// crate; the core itself is transport-agnostic.
pub fn loopback_pair() -> (RawHal, InnerHal) {
    InnerHal::new()
}
