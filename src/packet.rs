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

//! NCI wire framing: the 3-byte packet header and message classification.
//!
//! Replaces the PDL-generated codec the teacher stack uses, since no `.pdl`
//! schema is available to generate one from; the layout here is taken
//! directly from the NCI specification's framing rules.

use bytes::{BufMut, Bytes, BytesMut};

/// Mask isolating the message-type bits of header byte 0.
const MT_MASK: u8 = 0xe0;
/// Packet boundary flag: more fragments of this message follow.
pub const PBF: u8 = 0x10;
/// Mask isolating GID (control) / connection ID (data) in header byte 0.
const GID_MASK: u8 = 0x0f;
/// Mask isolating the OID in header byte 1.
const OID_MASK: u8 = 0x3f;

/// The four NCI message types, identified by the top 3 bits of header byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Data,
    Command,
    Response,
    Notification,
}

impl MessageType {
    fn from_bits(b: u8) -> Option<MessageType> {
        match b & MT_MASK {
            0x00 => Some(MessageType::Data),
            0x20 => Some(MessageType::Command),
            0x40 => Some(MessageType::Response),
            0x60 => Some(MessageType::Notification),
            _ => None,
        }
    }

    fn bits(self) -> u8 {
        match self {
            MessageType::Data => 0x00,
            MessageType::Command => 0x20,
            MessageType::Response => 0x40,
            MessageType::Notification => 0x60,
        }
    }
}

/// A parsed 3-byte NCI header plus payload length, still pointing at the
/// original buffer's payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub mt: MessageType,
    pub pbf: bool,
    /// GID for control packets, connection ID for data packets.
    pub gid_or_cid: u8,
    /// Only meaningful for control packets.
    pub oid: u8,
    pub payload_len: u8,
}

impl Header {
    pub fn control(mt: MessageType, pbf: bool, gid: u8, oid: u8, payload_len: u8) -> Header {
        Header { mt, pbf, gid_or_cid: gid & GID_MASK, oid: oid & OID_MASK, payload_len }
    }

    pub fn data(cid: u8, pbf: bool, payload_len: u8) -> Header {
        Header { mt: MessageType::Data, pbf, gid_or_cid: cid & GID_MASK, oid: 0, payload_len }
    }

    pub fn is_data(&self) -> bool {
        self.mt == MessageType::Data
    }

    /// Encode the 3-byte header into `out`.
    pub fn encode(&self, out: &mut BytesMut) {
        let mut b0 = self.mt.bits() | self.gid_or_cid;
        if self.pbf {
            b0 |= PBF;
        }
        out.put_u8(b0);
        out.put_u8(if self.is_data() { 0 } else { self.oid });
        out.put_u8(self.payload_len);
    }
}

/// A fully parsed packet: header plus an owned payload slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Bytes,
}

/// Errors produced while pulling packets out of a byte stream.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than 3 bytes are available; caller should wait for more.
    Incomplete,
    /// The message-type bits did not match any known value.
    UnknownMessageType(u8),
}

/// Attempt to parse one packet from the front of `buf`. Returns the packet
/// and the number of bytes consumed, or `ParseError::Incomplete` if `buf`
/// does not yet contain a whole packet.
pub fn parse_one(buf: &[u8]) -> Result<(Packet, usize), ParseError> {
    if buf.len() < 3 {
        return Err(ParseError::Incomplete);
    }
    let b0 = buf[0];
    let mt = MessageType::from_bits(b0).ok_or(ParseError::UnknownMessageType(b0))?;
    let pbf = b0 & PBF != 0;
    let gid_or_cid = b0 & GID_MASK;
    let oid = buf[1] & OID_MASK;
    let payload_len = buf[2];
    let total = 3 + payload_len as usize;
    if buf.len() < total {
        return Err(ParseError::Incomplete);
    }
    let header = Header { mt, pbf, gid_or_cid, oid, payload_len };
    let payload = Bytes::copy_from_slice(&buf[3..total]);
    Ok((Packet { header, payload }, total))
}

/// Build the bytes for a single segment: header followed by the payload
/// slice, with `pbf` already decided by the caller (the SAR write loop).
pub fn encode_segment(mt: MessageType, pbf: bool, gid_or_cid: u8, oid: u8, chunk: &[u8]) -> Bytes {
    let header = Header::control(mt, pbf, gid_or_cid, oid, chunk.len() as u8);
    let mut out = BytesMut::with_capacity(3 + chunk.len());
    header.encode(&mut out);
    out.put_slice(chunk);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_command_header() {
        let bytes = encode_segment(MessageType::Command, false, 0x00, 0x00, &[0x01]);
        let (packet, consumed) = parse_one(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(packet.header.mt, MessageType::Command);
        assert!(!packet.header.pbf);
        assert_eq!(packet.header.gid_or_cid, 0x00);
        assert_eq!(packet.header.oid, 0x00);
        assert_eq!(&packet.payload[..], &[0x01]);
    }

    #[test]
    fn incomplete_when_payload_not_fully_buffered() {
        let bytes = encode_segment(MessageType::Notification, false, 0x00, 0x00, &[1, 2, 3]);
        assert_eq!(parse_one(&bytes[..4]), Err(ParseError::Incomplete));
    }

    #[test]
    fn rejects_unknown_message_type() {
        let buf = [0x80u8, 0x00, 0x00];
        assert_eq!(parse_one(&buf), Err(ParseError::UnknownMessageType(0x80)));
    }
}
