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

//! v1.0 and v2.x `CORE_RESET` -> `CORE_INIT` -> `CORE_SET_CONFIG` bring-up,
//! driven automatically the moment the core is constructed.

mod common;

use nci_core::NciState;

#[tokio::test]
async fn v1_bring_up_reaches_idle() {
    let mut f = common::start();
    common::bring_up_v1(&mut f).await;
}

#[tokio::test]
async fn v2_bring_up_waits_for_reset_ntf_and_sends_v2_init() {
    let mut f = common::start();

    let reset_cmd = f.next_write().await;
    assert_eq!(&reset_cmd[..], &[0x20, 0x00, 0x01, 0x00]);
    // A single-byte CORE_RESET_RSP payload means v2.x: wait for CORE_RESET_NTF.
    f.feed(vec![0x40, 0x00, 0x01, 0x00]);

    // CORE_RESET_NTF: status, nci_version=0x20, config_status, manufacturer(2).
    f.feed(vec![0x60, 0x00, 0x05, 0x00, 0x20, 0x00, 0x00, 0x00]);

    let init_cmd = f.next_write().await;
    assert_eq!(&init_cmd[..], &[0x20, 0x01, 0x02, 0x00, 0x00]);

    // v2.0 CORE_INIT_RSP: status(1), feature bits(4), max_logical_conns(1),
    // max_routing_table_size LE(2), max_control_payload(1), 3 reserved bytes,
    // n=0 supported interfaces.
    let mut init_rsp = vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00];
    assert_eq!(init_rsp.len(), 14);
    let mut frame = vec![0x40, 0x01, init_rsp.len() as u8];
    frame.append(&mut init_rsp);
    f.feed(frame);

    let set_config_cmd = f.next_write().await;
    assert_eq!(set_config_cmd[1], 0x02);
    f.feed(vec![0x40, 0x02, 0x02, 0x00, 0x00]);

    f.wait_for_current_state(NciState::Idle).await;
}
