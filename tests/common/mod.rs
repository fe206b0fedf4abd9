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

//! Shared test harness: a hand-driven fake NFCC sitting on the other end of
//! the HAL channel pair, used to script exact byte sequences per the
//! scenarios this crate's protocol sequencing is built against.

use bytes::Bytes;
use nci_core::{ConsumerEvent, Core, CoreConfig, HalWriteResult, InnerHal, NciState};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{timeout, Duration};

pub struct Fixture {
    pub core: Core,
    pub events: UnboundedReceiver<ConsumerEvent>,
    pub inner: InnerHal,
}

pub fn start() -> Fixture {
    let (raw, inner) = InnerHal::new();
    let (core, events) = Core::new(raw, CoreConfig::default());
    Fixture { core, events, inner }
}

impl Fixture {
    /// Wait for and return the next full write submitted to the HAL
    /// (header + payload bytes), acking it as a successful write.
    pub async fn next_write(&mut self) -> Bytes {
        let outbound =
            timeout(Duration::from_secs(1), self.inner.out_rx.recv()).await.unwrap().unwrap();
        let segment = outbound.segment.clone();
        self.inner
            .write_result_tx
            .send(HalWriteResult { tag: outbound.tag, ok: true })
            .unwrap();
        segment
    }

    /// Feed a complete response/notification frame back from the fake NFCC.
    pub fn feed(&self, bytes: Vec<u8>) {
        self.inner.in_tx.send(nci_core::HalInbound::Data(Bytes::from(bytes))).unwrap();
    }

    pub async fn next_event(&mut self) -> ConsumerEvent {
        timeout(Duration::from_secs(1), self.events.recv()).await.unwrap().unwrap()
    }

    /// Drain events until `current_state_changed(state)` is observed.
    pub async fn wait_for_current_state(&mut self, state: NciState) {
        loop {
            if let ConsumerEvent::CurrentStateChanged(s) = self.next_event().await {
                if s == state {
                    return;
                }
            }
        }
    }
}

fn control_frame(gid: u8, oid: u8, payload: &[u8]) -> Vec<u8> {
    let mut v = vec![0x40 | (gid & 0x0f), oid & 0x3f, payload.len() as u8];
    v.extend_from_slice(payload);
    v
}

fn notification_frame(gid: u8, oid: u8, payload: &[u8]) -> Vec<u8> {
    let mut v = vec![0x60 | (gid & 0x0f), oid & 0x3f, payload.len() as u8];
    v.extend_from_slice(payload);
    v
}

/// Drive the NFCC side of a v1.0 `CORE_RESET` -> `CORE_INIT` -> `CORE_SET_CONFIG`
/// bring-up, asserting the three expected writes, and leave the SM in IDLE.
pub async fn bring_up_v1(f: &mut Fixture) {
    let reset_cmd = f.next_write().await;
    assert_eq!(&reset_cmd[..], &[0x20, 0x00, 0x01, 0x00]);
    f.feed(control_frame(0x00, 0x00, &[0x00, 0x00, 0x10]));

    let init_cmd = f.next_write().await;
    assert_eq!(&init_cmd[..], &[0x20, 0x01, 0x00]);
    // v1 CORE_INIT_RSP: 5 status/feature bytes, n=0 interfaces, max_logical_conns=1,
    // max_routing_table_size LE = 0x0020, max_control_payload = 32.
    f.feed(control_frame(
        0x00,
        0x01,
        &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x20, 0x00, 0x20],
    ));

    let set_config_cmd = f.next_write().await;
    assert_eq!(set_config_cmd[0] & 0xe0, 0x20);
    assert_eq!(set_config_cmd[1], 0x02);
    f.feed(control_frame(0x00, 0x02, &[0x00, 0x00]));

    f.wait_for_current_state(NciState::Idle).await;
}

/// Build a minimal `RF_INTF_ACTIVATED_NTF` for a passive-poll-A / T2T tag.
pub fn t2t_activation_ntf() -> Vec<u8> {
    let mut mode = vec![0x00, 0x04]; // sens_res
    mode.push(4); // nfcid1 length
    mode.extend_from_slice(&[0x04, 0x01, 0x02, 0x03]);
    mode.push(1); // sel_res length
    mode.push(0x00); // sel_res

    let mut payload = vec![
        0x01, // discovery_id
        0x01, // rf_interface = FRAME
        0x02, // rf_protocol = T2T
        0x00, // activation_rf_tech_and_mode = passive poll A
        0x20, // max_data_packet_payload_size
        0x01, // initial_num_credits
        mode.len() as u8,
    ];
    payload.extend_from_slice(&mode);
    payload.extend_from_slice(&[0x00, 0x00, 0x00]); // data_exch_*
    payload.push(0); // activation param length
    notification_frame(0x01, 0x05, &payload)
}

/// Drive the NFCC side of IDLE -> DISCOVERY (RW-only, no listen routing),
/// then deliver a T2T activation so the SM lands in POLL_ACTIVE.
pub async fn enter_poll_active_t2t(f: &mut Fixture) {
    let get_config_cmd = f.next_write().await;
    assert_eq!(get_config_cmd[1], 0x03);
    // Echo back exactly the expected values so no CORE_SET_CONFIG_CMD is needed.
    let get_config_rsp = [
        0x00, 0x04, 0x32, 0x01, 0x00, 0x33, 0x04, 0x08, 0x00, 0x00, 0x00, 0x34, 0x01, 0x00, 0x50,
        0x01, 0x00,
    ];
    f.feed(control_frame(0x00, 0x03, &get_config_rsp));

    let discover_map_cmd = f.next_write().await;
    assert_eq!(discover_map_cmd[0] & 0x0f, 0x01); // GID_RF
    assert_eq!(discover_map_cmd[1], 0x00); // OID_RF_DISCOVER_MAP_CMD
    f.feed(control_frame(0x01, 0x00, &[0x00]));

    let discover_cmd = f.next_write().await;
    assert_eq!(discover_cmd[1], 0x03); // OID_RF_DISCOVER_CMD
    f.feed(control_frame(0x01, 0x03, &[0x00]));

    f.wait_for_current_state(NciState::Discovery).await;

    f.feed(t2t_activation_ntf());
    f.wait_for_current_state(NciState::PollActive).await;
}
