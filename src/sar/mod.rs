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

//! Segmentation & Reassembly: fragments outgoing packets to the negotiated
//! MTU, reassembles incoming fragments, and tracks per-connection credits.
//!
//! Grounded on `original_source/src/nci_sar.c`: a single "currently writing"
//! slot drives one segment onto the HAL at a time, rescheduled after each
//! completion; credits are debited when a data packet is picked, not when it
//! is enqueued.

use crate::error::Error;
use crate::hal::{HalInbound, HalOutbound, HalWriteResult, RawHal};
use crate::packet::{self, MessageType};
use bytes::Bytes;
use log::{debug, error, trace, warn};
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Minimum MTU the SAR will honor; smaller requests are clamped up to this.
pub const MIN_MTU: usize = 4;
const DEFAULT_CONTROL_MTU: usize = 32;
const DEFAULT_DATA_MTU: usize = 32;

/// Unlimited-credit sentinel, per NCI.
pub const CREDITS_UNLIMITED: u8 = 0xff;

/// What kind of packet is queued: a control command (always GID/OID tagged)
/// or a data packet on a logical connection.
enum Kind {
    Command { gid: u8, oid: u8 },
    Data { cid: u8 },
}

/// One queued (or in-flight) outbound packet. Packet IDs are never zero;
/// zero is reserved to mean "no packet".
struct Entry {
    id: u32,
    kind: Kind,
    payload: Bytes,
    position: usize,
    on_complete: Option<oneshot::Sender<bool>>,
    /// Set once this entry has been cancelled while still queued, or while
    /// it was the currently-writing entry (suppresses the completion but
    /// lets the bytes already submitted finish reaching the wire).
    cancelled: bool,
}

impl Entry {
    fn remaining(&self) -> &[u8] {
        &self.payload[self.position..]
    }
}

#[derive(Default)]
struct Connection {
    credits: u8,
    queue: VecDeque<Entry>,
    reassembly: Option<(u8, Vec<u8>)>, // (accumulated len so far is implicit in Vec)
}

struct ControlReassembly {
    mt: MessageType,
    gid_or_cid: u8,
    oid: u8,
    buf: Vec<u8>,
}

/// An event the SAR reports upstream, to be interpreted by the state
/// machine / façade.
pub enum SarEvent {
    /// A fully reassembled control packet (response or notification).
    Control { mt: MessageType, gid: u8, oid: u8, payload: Bytes },
    /// A fully reassembled data packet on a logical connection.
    Data { cid: u8, payload: Bytes },
    /// A transport or framing error; active operations should be aborted.
    Error(Error),
}

pub struct Sar {
    out_tx: tokio::sync::mpsc::UnboundedSender<HalOutbound>,
    control_mtu: usize,
    data_mtu: usize,
    command_queue: VecDeque<Entry>,
    connections: Vec<Connection>,
    control_reassembly: Option<ControlReassembly>,
    last_packet_id: u32,
    next_tag: u32,
    /// Entry currently being written to the HAL, if any, plus the tag of
    /// the segment currently in flight.
    writing: Option<(Entry, bool)>, // (entry, is_data)
    in_flight_tag: Option<u32>,
    started: bool,
}

impl Sar {
    pub fn new(hal: &RawHal) -> Sar {
        Sar::from_sender(hal.out_tx.clone())
    }

    pub fn from_sender(out_tx: tokio::sync::mpsc::UnboundedSender<HalOutbound>) -> Sar {
        Sar {
            out_tx,
            control_mtu: DEFAULT_CONTROL_MTU,
            data_mtu: DEFAULT_DATA_MTU,
            command_queue: VecDeque::new(),
            connections: vec![Connection::default()],
            control_reassembly: None,
            last_packet_id: 0,
            next_tag: 0,
            writing: None,
            in_flight_tag: None,
            started: false,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    /// Tear everything down: queued and in-flight packets are dropped
    /// without invoking completions, credits are zeroed, reassembly buffers
    /// cleared.
    pub fn reset(&mut self) {
        self.started = false;
        self.command_queue.clear();
        for conn in &mut self.connections {
            conn.queue.clear();
            conn.credits = 0;
            conn.reassembly = None;
        }
        self.control_reassembly = None;
        self.writing = None;
        self.in_flight_tag = None;
    }

    fn next_id(&mut self) -> u32 {
        self.last_packet_id = self.last_packet_id.wrapping_add(1);
        if self.last_packet_id == 0 {
            self.last_packet_id = 1;
        }
        self.last_packet_id
    }

    fn next_tag(&mut self) -> u32 {
        let t = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1);
        t
    }

    pub fn set_max_logical_connections(&mut self, n: usize) {
        let n = n.max(1);
        if n < self.connections.len() {
            self.connections.truncate(n);
        } else {
            self.connections.resize_with(n, Connection::default);
        }
    }

    pub fn set_max_control_mtu(&mut self, mtu: usize) {
        self.control_mtu = mtu.max(MIN_MTU);
    }

    pub fn set_max_data_mtu(&mut self, mtu: usize) {
        self.data_mtu = mtu.max(MIN_MTU);
    }

    pub fn set_initial_credits(&mut self, cid: usize, credits: u8) {
        if let Some(conn) = self.connections.get_mut(cid) {
            conn.credits = credits;
        }
    }

    pub fn add_credits(&mut self, cid: usize, credits: u8) {
        if let Some(conn) = self.connections.get_mut(cid) {
            if conn.credits == CREDITS_UNLIMITED || credits == CREDITS_UNLIMITED {
                conn.credits = CREDITS_UNLIMITED;
            } else {
                conn.credits = conn.credits.saturating_add(credits);
            }
        }
    }

    /// Enqueue a control command. Always served ahead of data packets.
    pub fn send_command(&mut self, gid: u8, oid: u8, payload: Bytes) -> u32 {
        let id = self.next_id();
        self.command_queue.push_back(Entry {
            id,
            kind: Kind::Command { gid, oid },
            payload,
            position: 0,
            on_complete: None,
            cancelled: false,
        });
        id
    }

    /// Enqueue a data packet on a logical connection, notified via the
    /// returned oneshot when it completes (`true`) or fails (`false`).
    pub fn send_data(&mut self, cid: usize, payload: Bytes) -> (u32, oneshot::Receiver<bool>) {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        if let Some(conn) = self.connections.get_mut(cid) {
            conn.queue.push_back(Entry {
                id,
                kind: Kind::Data { cid: cid as u8 },
                payload,
                position: 0,
                on_complete: Some(tx),
                cancelled: false,
            });
        } else {
            let _ = tx.send(false);
        }
        (id, rx)
    }

    /// Cancel a queued or in-flight packet by ID. No-op for unknown IDs.
    pub fn cancel(&mut self, id: u32) {
        if let Some(pos) = self.command_queue.iter().position(|e| e.id == id) {
            self.command_queue.remove(pos);
            return;
        }
        for conn in &mut self.connections {
            if let Some(pos) = conn.queue.iter().position(|e| e.id == id) {
                conn.queue.remove(pos);
                return;
            }
        }
        if let Some((entry, _)) = &mut self.writing {
            if entry.id == id {
                entry.cancelled = true;
            }
        }
    }

    /// Pick the next packet to (continue) writing, per the priority order:
    /// commands first, then a round-robin scan of connections with both a
    /// non-empty queue and at least one credit.
    fn pick_next(&mut self) -> Option<(Entry, bool)> {
        if let Some(entry) = self.command_queue.pop_front() {
            return Some((entry, false));
        }
        for conn in &mut self.connections {
            if conn.queue.front().is_some() && conn.credits > 0 {
                let entry = conn.queue.pop_front().unwrap();
                if conn.credits != CREDITS_UNLIMITED {
                    conn.credits -= 1;
                }
                return Some((entry, true));
            }
        }
        None
    }

    /// Drive one write attempt onto the HAL. Called after enqueue and after
    /// every write completion; this is the "idle callback" reschedule point
    /// described in the concurrency model.
    pub fn pump(&mut self) {
        if !self.started || self.in_flight_tag.is_some() {
            return;
        }
        if self.writing.is_none() {
            match self.pick_next() {
                Some(w) => self.writing = Some(w),
                None => return,
            }
        }
        let (entry, is_data) = self.writing.as_ref().unwrap();
        let mtu = if *is_data { self.data_mtu } else { self.control_mtu };
        let remaining = entry.remaining();
        let take = remaining.len().min(mtu);
        let pbf = take < remaining.len();
        let chunk = &remaining[..take];
        let segment = match &entry.kind {
            Kind::Command { gid, oid } => {
                packet::encode_segment(MessageType::Command, pbf, *gid, *oid, chunk)
            }
            Kind::Data { cid } => packet::encode_segment(MessageType::Data, pbf, *cid, 0, chunk),
        };
        let tag = self.next_tag();
        self.in_flight_tag = Some(tag);
        trace!("> {:02x?}", &segment[..]);
        if self.out_tx.send(HalOutbound { tag, segment }).is_err() {
            error!("HAL outbound channel closed");
        }
    }

    /// Handle a write completion from the HAL and reschedule.
    pub fn handle_write_result(&mut self, result: HalWriteResult) -> Option<SarEvent> {
        if self.in_flight_tag != Some(result.tag) {
            warn!("stray write completion for tag {}", result.tag);
            return None;
        }
        self.in_flight_tag = None;
        let mut event = None;
        if let Some((mut entry, is_data)) = self.writing.take() {
            if !result.ok {
                debug!("write failed for packet {}", entry.id);
                if let Some(tx) = entry.on_complete.take() {
                    let _ = tx.send(false);
                }
                event = Some(SarEvent::Error(Error::Protocol("HAL write failed")));
            } else {
                let mtu = if is_data { self.data_mtu } else { self.control_mtu };
                let sent = entry.remaining().len().min(mtu);
                entry.position += sent;
                if entry.position >= entry.payload.len() {
                    if !entry.cancelled {
                        if let Some(tx) = entry.on_complete.take() {
                            let _ = tx.send(true);
                        }
                    }
                } else {
                    self.writing = Some((entry, is_data));
                }
            }
        }
        self.pump();
        event
    }

    /// Feed raw inbound bytes from the HAL and return any fully reassembled
    /// events produced.
    pub fn handle_inbound(&mut self, inbound: HalInbound) -> Vec<SarEvent> {
        match inbound {
            HalInbound::Error => vec![SarEvent::Error(Error::Protocol("HAL reported an error"))],
            HalInbound::Data(bytes) => self.handle_bytes(&bytes),
        }
    }

    fn handle_bytes(&mut self, mut buf: &[u8]) -> Vec<SarEvent> {
        let mut events = Vec::new();
        loop {
            match packet::parse_one(buf) {
                Ok((pkt, consumed)) => {
                    trace!("< {:02x?}", &buf[..consumed]);
                    if let Some(event) = self.dispatch_packet(pkt) {
                        events.push(event);
                    }
                    buf = &buf[consumed..];
                    if buf.is_empty() {
                        break;
                    }
                }
                Err(packet::ParseError::Incomplete) => break,
                Err(packet::ParseError::UnknownMessageType(mt)) => {
                    events.push(SarEvent::Error(Error::Protocol("unknown NCI message type")));
                    warn!("unknown message type byte 0x{:02x}", mt);
                    break;
                }
            }
        }
        events
    }

    fn dispatch_packet(&mut self, pkt: packet::Packet) -> Option<SarEvent> {
        if pkt.header.is_data() {
            return self.dispatch_data(pkt);
        }
        self.dispatch_control(pkt)
    }

    fn dispatch_data(&mut self, pkt: packet::Packet) -> Option<SarEvent> {
        let cid = pkt.header.gid_or_cid as usize;
        let conn = match self.connections.get_mut(cid) {
            Some(c) => c,
            None => return Some(SarEvent::Error(Error::Protocol("data packet on unknown cid"))),
        };
        // Detach the reassembly buffer before any possibility of
        // re-entrant dispatch corrupting it.
        let mut reassembly = conn.reassembly.take();
        if let Some((_, buf)) = &mut reassembly {
            buf.extend_from_slice(&pkt.payload);
        } else if pkt.header.pbf {
            reassembly = Some((pkt.header.gid_or_cid, pkt.payload.to_vec()));
        }
        if pkt.header.pbf {
            // Still collecting fragments; reattach if nothing else claimed
            // the slot while we were appending (no re-entrancy is possible
            // here since no event fires yet).
            conn.reassembly = reassembly;
            None
        } else {
            let payload = match reassembly {
                Some((_, buf)) => Bytes::from(buf),
                None => pkt.payload,
            };
            // conn.reassembly was already cleared by take(); nothing to
            // reattach unless a re-entrant send_data call started a new one.
            Some(SarEvent::Data { cid: cid as u8, payload })
        }
    }

    fn dispatch_control(&mut self, pkt: packet::Packet) -> Option<SarEvent> {
        if pkt.header.mt == MessageType::Command {
            return Some(SarEvent::Error(Error::Protocol("unexpected command from NFCC")));
        }
        let mut reassembly = self.control_reassembly.take();
        if let Some(r) = &reassembly {
            if r.mt != pkt.header.mt || r.gid_or_cid != pkt.header.gid_or_cid || r.oid != pkt.header.oid
            {
                return Some(SarEvent::Error(Error::Protocol(
                    "mismatched fragment in control reassembly",
                )));
            }
        }
        match &mut reassembly {
            Some(r) => r.buf.extend_from_slice(&pkt.payload),
            None => {
                if pkt.header.pbf {
                    reassembly = Some(ControlReassembly {
                        mt: pkt.header.mt,
                        gid_or_cid: pkt.header.gid_or_cid,
                        oid: pkt.header.oid,
                        buf: pkt.payload.to_vec(),
                    });
                }
            }
        }
        if pkt.header.pbf {
            self.control_reassembly = reassembly;
            None
        } else {
            let (gid_or_cid, oid, payload) = match reassembly {
                Some(r) => (r.gid_or_cid, r.oid, Bytes::from(r.buf)),
                None => (pkt.header.gid_or_cid, pkt.header.oid, pkt.payload),
            };
            Some(SarEvent::Control { mt: pkt.header.mt, gid: gid_or_cid, oid, payload })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::InnerHal;

    fn new_sar() -> (Sar, InnerHal) {
        let (raw, inner) = InnerHal::new();
        let mut sar = Sar::new(&raw);
        sar.start();
        (sar, inner)
    }

    #[test]
    fn fragments_a_command_to_the_control_mtu() {
        let (mut sar, mut inner) = new_sar();
        sar.set_max_control_mtu(4);
        let payload = Bytes::from(vec![0xABu8; 10]);
        sar.send_command(0x00, 0x01, payload.clone());
        sar.pump();
        let out = inner.out_rx.try_recv().unwrap();
        // header(3) + 4 bytes, PBF set since 10 > 4
        assert_eq!(out.segment.len(), 7);
        assert_eq!(out.segment[0] & 0x10, 0x10);
        assert_eq!(out.segment[2], 4);
    }

    #[test]
    fn reassembles_a_fragmented_notification() {
        let (mut sar, _inner) = new_sar();
        let frag1 = packet::encode_segment(MessageType::Notification, true, 0x00, 0x00, &[1, 2]);
        let frag2 = packet::encode_segment(MessageType::Notification, false, 0x00, 0x00, &[3, 4]);
        assert!(sar.handle_inbound(HalInbound::Data(frag1)).is_empty());
        let events = sar.handle_inbound(HalInbound::Data(frag2));
        assert_eq!(events.len(), 1);
        match &events[0] {
            SarEvent::Control { payload, .. } => assert_eq!(&payload[..], &[1, 2, 3, 4]),
            _ => panic!("expected control event"),
        }
    }

    #[test]
    fn data_requires_credit_before_it_is_sent() {
        let (mut sar, mut inner) = new_sar();
        sar.set_initial_credits(0, 0);
        let (_id, _rx) = sar.send_data(0, Bytes::from_static(b"hi"));
        sar.pump();
        assert!(inner.out_rx.try_recv().is_err());
        sar.add_credits(0, 1);
        sar.pump();
        assert!(inner.out_rx.try_recv().is_ok());
    }

    #[test]
    fn credits_saturate_at_unlimited() {
        let (mut sar, _inner) = new_sar();
        sar.set_initial_credits(0, 250);
        sar.add_credits(0, 10);
        sar.add_credits(0, CREDITS_UNLIMITED);
        // further adds keep it pinned at unlimited
        sar.add_credits(0, 5);
        assert_eq!(sar.connections[0].credits, CREDITS_UNLIMITED);
    }
}
