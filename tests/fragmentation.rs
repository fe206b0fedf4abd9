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

//! Outbound fragmentation against a clamped control MTU: every segment but
//! the last carries PBF=1, and the concatenation of payloads round-trips to
//! the original command.

use bytes::Bytes;
use nci_core::sar::Sar;
use nci_core::{HalOutbound, HalWriteResult, InnerHal};

#[test]
fn fragments_a_64_byte_command_at_the_minimum_mtu() {
    let (raw, mut inner) = InnerHal::new();
    let mut sar = Sar::new(&raw);
    sar.start();
    sar.set_max_control_mtu(1); // clamped up to the 4-byte minimum

    let original = Bytes::from(vec![0x7Eu8; 64]);
    sar.send_command(0x00, 0x01, original.clone());
    sar.pump();

    let mut reassembled = Vec::new();
    let mut writes = 0;
    loop {
        let HalOutbound { tag, segment } = inner.out_rx.try_recv().expect("expected a pending write");
        writes += 1;
        let pbf = segment[0] & 0x10 != 0;
        let len = segment[2] as usize;
        reassembled.extend_from_slice(&segment[3..3 + len]);
        sar.handle_write_result(HalWriteResult { tag, ok: true });
        if !pbf {
            assert!(inner.out_rx.try_recv().is_err(), "no further segments after the last one");
            break;
        }
    }

    assert_eq!(writes, 16); // ceil(64 / 4)
    assert_eq!(reassembled, original.to_vec());
}
