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

//! The coordinating façade: the single dispatch task that owns SAR and SM,
//! command-timeout handling, and the public operation surface consumers
//! call.
//!
//! Grounded on `nci/nci.rs`'s `dispatch()` loop (a `tokio::select!` over
//! multiple channel sources) and `nci/api.rs`'s public operation surface.
//! This task *is* the single-threaded cooperative loop spec §5 requires:
//! every mutation of SAR/SM state happens here, so no internal locking is
//! used anywhere below it.

use crate::config_file;
use crate::hal::RawHal;
use crate::sar::{Sar, SarEvent};
use crate::sm::params::{ParamKey, ParamValue};
use crate::sm::types::{IntfActivationNtf, NciState, NfcTech, OpMode};
use crate::sm::{Sm, SmEvent};
use bytes::Bytes;
use log::{debug, error};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

/// Construction-time settings, replacing the original's process-wide
/// mutable config-file path with an explicit parameter.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub cmd_timeout: Duration,
    pub config_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig { cmd_timeout: Duration::from_millis(2000), config_path: None }
    }
}

/// Events delivered to consumers, per spec §6's five event streams.
#[derive(Debug, Clone)]
pub enum ConsumerEvent {
    CurrentStateChanged(NciState),
    NextStateChanged(NciState),
    InterfaceActivated(IntfActivationNtf),
    IncomingData { cid: u8, payload: Bytes },
    ParameterChanged(ParamKey),
}

enum Request {
    Restart,
    SetState(NciState),
    SetOpMode(OpMode),
    SetTech(NfcTech, oneshot::Sender<NfcTech>),
    GetParam(ParamKey, oneshot::Sender<ParamValue>),
    SetParams(Vec<ParamValue>, bool),
    SendData { cid: u8, payload: Bytes, id_tx: oneshot::Sender<u32> },
    Cancel(u32),
}

/// The public handle consumers hold. Cloning it is cheap; every clone talks
/// to the same dispatch task.
#[derive(Clone)]
pub struct Core {
    req_tx: mpsc::UnboundedSender<Request>,
}

impl Core {
    /// Build the core on top of the given HAL channel pair and spawn its
    /// dispatch task. Returns the handle plus the consumer event stream.
    pub fn new(hal: RawHal, config: CoreConfig) -> (Core, mpsc::UnboundedReceiver<ConsumerEvent>) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(hal, config, req_rx, ev_tx));
        (Core { req_tx }, ev_rx)
    }

    pub fn restart(&self) {
        let _ = self.req_tx.send(Request::Restart);
    }

    pub fn set_state(&self, state: NciState) {
        let _ = self.req_tx.send(Request::SetState(state));
    }

    pub fn set_op_mode(&self, mode: OpMode) {
        let _ = self.req_tx.send(Request::SetOpMode(mode));
    }

    pub async fn set_tech(&self, tech: NfcTech) -> NfcTech {
        let (tx, rx) = oneshot::channel();
        if self.req_tx.send(Request::SetTech(tech, tx)).is_err() {
            return tech;
        }
        rx.await.unwrap_or(tech)
    }

    pub async fn get_param(&self, key: ParamKey) -> Option<ParamValue> {
        let (tx, rx) = oneshot::channel();
        self.req_tx.send(Request::GetParam(key, tx)).ok()?;
        rx.await.ok()
    }

    pub fn set_params(&self, values: Vec<ParamValue>, reset_first: bool) {
        let _ = self.req_tx.send(Request::SetParams(values, reset_first));
    }

    pub fn reset_param(&self, key: ParamKey, default: ParamValue) {
        debug_assert_eq!(key, default.key());
        self.set_params(vec![default], false);
    }

    pub async fn send_data_msg(&self, cid: u8, payload: Bytes) -> Option<u32> {
        let (id_tx, id_rx) = oneshot::channel();
        self.req_tx.send(Request::SendData { cid, payload, id_tx }).ok()?;
        id_rx.await.ok()
    }

    pub fn cancel(&self, id: u32) {
        let _ = self.req_tx.send(Request::Cancel(id));
    }
}

async fn run(
    hal: RawHal,
    config: CoreConfig,
    mut req_rx: mpsc::UnboundedReceiver<Request>,
    mut ev_tx: mpsc::UnboundedSender<ConsumerEvent>,
) {
    let mut sar = Sar::new(&hal);
    let RawHal { in_rx: mut hal_in_rx, write_result_rx: mut hal_write_result_rx, .. } = hal;
    let mut sm = Sm::new();
    sar.start();

    if let Some(path) = &config.config_path {
        let file_config = config_file::load(path);
        if let Some(tech) = file_config.tech {
            sm.tech = tech;
        }
        if let Some(id) = file_config.la_nfcid1 {
            sm.params.set(ParamValue::LaNfcid1(id));
        }
    }

    let mut deadline: Option<Instant> = None;

    let mut events = Vec::new();
    sm.switch_to(&mut sar, NciState::Idle, &mut events);
    sar.pump();
    deadline = rearm(&sm, &config, deadline);
    emit(&mut ev_tx, events.drain(..));

    loop {
        let sleep = async {
            match deadline {
                Some(d) => sleep_until(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            inbound = hal_in_rx.recv() => {
                let Some(inbound) = inbound else { break };
                let sar_events = sar.handle_inbound(inbound);
                handle_sar_events(&mut sar, &mut sm, sar_events, &ev_tx, &mut events);
                sar.pump();
                deadline = rearm(&sm, &config, deadline);
                emit(&mut ev_tx, events.drain(..));
            }
            result = hal_write_result_rx.recv() => {
                let Some(result) = result else { break };
                if let Some(event) = sar.handle_write_result(result) {
                    handle_sar_events(&mut sar, &mut sm, vec![event], &ev_tx, &mut events);
                    sar.pump();
                    emit(&mut ev_tx, events.drain(..));
                }
            }
            req = req_rx.recv() => {
                let Some(req) = req else { break };
                handle_request(req, &mut sar, &mut sm, &ev_tx, &mut events);
                sar.pump();
                deadline = rearm(&sm, &config, deadline);
                emit(&mut ev_tx, events.drain(..));
            }
            _ = sleep => {
                debug!("command timed out");
                sm.stall(&mut sar, NciState::Error, &mut events);
                deadline = None;
                emit(&mut ev_tx, events.drain(..));
            }
        }
    }
}

fn rearm(sm: &Sm, config: &CoreConfig, _previous: Option<Instant>) -> Option<Instant> {
    if sm.last_state() != sm.next_state() {
        Some(Instant::now() + config.cmd_timeout)
    } else {
        None
    }
}

fn emit(ev_tx: &mut mpsc::UnboundedSender<ConsumerEvent>, events: impl Iterator<Item = SmEvent>) {
    for event in events {
        let consumer_event = match event {
            SmEvent::CurrentStateChanged(s) => ConsumerEvent::CurrentStateChanged(s),
            SmEvent::NextStateChanged(s) => ConsumerEvent::NextStateChanged(s),
            SmEvent::InterfaceActivated(ntf) => ConsumerEvent::InterfaceActivated(ntf),
        };
        let _ = ev_tx.send(consumer_event);
    }
}

fn handle_sar_events(
    sar: &mut Sar,
    sm: &mut Sm,
    sar_events: Vec<SarEvent>,
    ev_tx: &mpsc::UnboundedSender<ConsumerEvent>,
    sm_events: &mut Vec<SmEvent>,
) {
    for event in sar_events {
        match event {
            SarEvent::Control { mt, gid, oid, payload } => match mt {
                crate::packet::MessageType::Response => sm.handle_rsp(sar, &payload, sm_events),
                crate::packet::MessageType::Notification => {
                    sm.handle_ntf(sar, gid, oid, &payload, sm_events)
                }
                _ => {}
            },
            SarEvent::Data { cid, payload } => {
                let _ = ev_tx.send(ConsumerEvent::IncomingData { cid, payload });
            }
            SarEvent::Error(e) => {
                error!("core error: {}", e);
                sm.stall(sar, NciState::Error, sm_events);
            }
        }
    }
}

fn handle_request(
    req: Request,
    sar: &mut Sar,
    sm: &mut Sm,
    ev_tx: &mpsc::UnboundedSender<ConsumerEvent>,
    events: &mut Vec<SmEvent>,
) {
    match req {
        Request::Restart => {
            sar.reset();
            sar.start();
            sm.switch_to(sar, NciState::Init, events);
            sm.switch_to(sar, NciState::Idle, events);
        }
        Request::SetState(state) => sm.switch_to(sar, state, events),
        Request::SetOpMode(mode) => {
            if sm.op_mode != mode {
                sm.op_mode = mode;
                sm.switch_to(sar, NciState::Idle, events);
            }
        }
        Request::SetTech(tech, reply) => {
            let changed = sm.tech != tech;
            sm.tech = tech;
            if changed && sm.last_state() == NciState::Discovery {
                sm.switch_to(sar, NciState::Idle, events);
                sm.switch_to(sar, NciState::Discovery, events);
            }
            let _ = reply.send(sm.tech);
        }
        Request::GetParam(key, reply) => {
            let _ = reply.send(sm.params.get(key));
        }
        Request::SetParams(values, reset_first) => {
            if reset_first {
                for key in [ParamKey::LlcVersion, ParamKey::LlcWks, ParamKey::LaNfcid1] {
                    sm.params.reset(key);
                }
            }
            let mut any_changed = false;
            for value in values {
                let key = value.key();
                if sm.params.set(value) {
                    any_changed = true;
                    let _ = ev_tx.send(ConsumerEvent::ParameterChanged(key));
                }
            }
            if any_changed {
                sm.switch_to(sar, NciState::Idle, events);
            }
        }
        Request::SendData { cid, payload, id_tx } => {
            let (id, _completion_rx) = sar.send_data(cid as usize, payload);
            sar.pump();
            let _ = id_tx.send(id);
        }
        Request::Cancel(id) => sar.cancel(id),
    }
}
