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

//! Poll-Active -> Discovery with a rejected `RF_DEACTIVATE_CMD`: the
//! transition falls back to requesting IDLE instead of stalling to ERROR.

mod common;

use nci_core::NciState;

#[tokio::test]
async fn falls_back_to_idle_when_discovery_deactivate_is_rejected() {
    let mut f = common::start();
    common::bring_up_v1(&mut f).await;
    f.core.set_state(NciState::Discovery);
    common::enter_poll_active_t2t(&mut f).await;

    f.core.set_state(NciState::Discovery);

    let deactivate_discovery = f.next_write().await;
    assert_eq!(deactivate_discovery[0] & 0x0f, 0x01); // GID_RF
    assert_eq!(deactivate_discovery[1], 0x06); // OID_RF_DEACTIVATE_CMD
    assert_eq!(deactivate_discovery[3], 0x03); // type = DISCOVERY

    // The NFCC rejects the DISCOVERY deactivate; the transition must retry
    // with IDLE rather than stalling to ERROR.
    f.feed(vec![0x40, 0x06, 0x01, 0x01]);

    let deactivate_idle = f.next_write().await;
    assert_eq!(deactivate_idle[0] & 0x0f, 0x01);
    assert_eq!(deactivate_idle[1], 0x06);
    assert_eq!(deactivate_idle[3], 0x00); // type = IDLE

    f.feed(vec![0x40, 0x06, 0x01, 0x00]);

    // RF_DEACTIVATE_NTF reporting IDLE completes the transition.
    f.feed(vec![0x61, 0x06, 0x01, 0x00]);

    f.wait_for_current_state(NciState::Idle).await;
}
