//! # PGS (Blu-ray Presentation Graphic Stream)
//!
//! A PGS display set is a run of segments — `PDS`/`ODS`/`PCS`/`WDS` — each
//! starting with the two-byte magic `"PG"`, a 4-byte PTS and 4-byte DTS
//! (already in 90 kHz ticks, matching [`crate::INTERNAL_PTS_FREQ`]
//! exactly), a 1-byte segment type, and a 2-byte segment length. An `END`
//! segment (`0x80`) closes the display set; the whole run from the first
//! segment after the previous `END` through this one is emitted as a
//! single packet. This is a Fragmented-policy parser:
//! the container hands it one PES payload's worth of segment data at a
//! time.

use bytes::{Bytes, BytesMut};

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, PGS_CODEC_INFO};
use crate::{Packet, PacketFlags, Result};

const MAGIC: [u8; 2] = [0x50, 0x47];
const SEGMENT_HEADER_LEN: usize = 13;
const SEGMENT_TYPE_PCS: u8 = 0x16;
const SEGMENT_TYPE_END: u8 = 0x80;

pub struct PgsParser {
    buffer: Bytes,
    is_eof: bool,
    pending_set: BytesMut,
    set_pts: i64,
    set_has_pcs: bool,
}

impl PgsParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            pending_set: BytesMut::new(),
            set_pts: 0,
            set_has_pcs: false,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        if buf.len() >= SEGMENT_HEADER_LEN && buf[0..2] == MAGIC {
            CheckStreamRez::Recognized(&PGS_CODEC_INFO)
        } else {
            CheckStreamRez::NotDetected
        }
    }

    pub fn set_buffer(&mut self, data: Bytes, is_eof: bool) {
        self.buffer = data;
        self.is_eof = is_eof;
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }

    pub fn remaining_bytes(&self) -> Bytes {
        self.buffer.clone()
    }

    pub fn codec_info(&self) -> &'static CodecInfo {
        &PGS_CODEC_INFO
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        loop {
            if self.buffer.len() < SEGMENT_HEADER_LEN || self.buffer[0..2] != MAGIC {
                return Ok(FrameResult::NeedMoreData);
            }
            let pts = i32::from_be_bytes(self.buffer[2..6].try_into().unwrap()) as i64;
            let segment_type = self.buffer[10];
            let segment_len = u16::from_be_bytes(self.buffer[11..13].try_into().unwrap()) as usize;
            let total_len = SEGMENT_HEADER_LEN + segment_len;
            if self.buffer.len() < total_len {
                return Ok(FrameResult::NeedMoreData);
            }

            if segment_type == SEGMENT_TYPE_PCS {
                self.set_pts = pts;
                self.set_has_pcs = true;
            }
            self.pending_set.extend_from_slice(&self.buffer[0..total_len]);
            self.buffer = self.buffer.slice(total_len..);

            if segment_type == SEGMENT_TYPE_END {
                return Ok(FrameResult::Packet(self.emit_pending()));
            }
        }
    }

    fn emit_pending(&mut self) -> Packet {
        let data = self.pending_set.split().freeze();
        let has_pcs = self.set_has_pcs;
        self.set_has_pcs = false;

        let mut packet = Packet::new(data, &PGS_CODEC_INFO);
        packet.pts = self.set_pts;
        packet.dts = self.set_pts;
        if has_pcs {
            packet.flags |= PacketFlags::FORCED;
        }
        packet
    }

    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        if self.pending_set.is_empty() && self.buffer.is_empty() {
            return Ok(FrameResult::Eof);
        }
        if !self.buffer.is_empty() {
            self.pending_set.extend_from_slice(&self.buffer);
            self.buffer = Bytes::new();
        }
        if self.pending_set.is_empty() {
            Ok(FrameResult::Eof)
        } else {
            Ok(FrameResult::Packet(self.emit_pending()))
        }
    }
}

impl Default for PgsParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(seg_type: u8, pts: i32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(SEGMENT_HEADER_LEN + payload.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&pts.to_be_bytes());
        out.extend_from_slice(&0i32.to_be_bytes()); // dts
        out.push(seg_type);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn check_stream_detects_pg_magic() {
        let data = segment(SEGMENT_TYPE_PCS, 0, &[0u8; 4]);
        assert!(PgsParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn check_stream_rejects_without_magic() {
        assert!(!PgsParser::check_stream(&[0u8; 16], ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn accumulates_display_set_until_end_segment() {
        let mut data = segment(SEGMENT_TYPE_PCS, 90000, &[1, 2, 3]);
        data.extend_from_slice(&segment(0x15, 90000, &[4, 5])); // ODS
        data.extend_from_slice(&segment(SEGMENT_TYPE_END, 90000, &[]));
        let mut parser = PgsParser::new();
        parser.set_buffer(Bytes::from(data), false);
        match parser.read_packet().unwrap() {
            FrameResult::Packet(p) => {
                assert_eq!(p.pts, 90000);
                assert!(p.size() > SEGMENT_HEADER_LEN * 2);
            }
            other => panic!("expected packet, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_segment_requests_more_data() {
        let data = segment(SEGMENT_TYPE_PCS, 0, &[1, 2, 3, 4, 5]);
        let mut parser = PgsParser::new();
        parser.set_buffer(Bytes::from(data[..SEGMENT_HEADER_LEN + 2].to_vec()), false);
        assert!(matches!(parser.read_packet().unwrap(), FrameResult::NeedMoreData));
    }
}
