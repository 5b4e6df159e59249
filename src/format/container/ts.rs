//! # TS/M2TS Container Demuxer
//!
//! Extracts PES-reassembled elementary-stream byte runs per PID from an
//! MPEG Transport Stream, grounded on the teacher's `format::ts` module
//! (TS packet header, adaptation field, PAT/PMT table parsing, and
//! `Crc32Mpeg2` table validation), generalized from a one-shot demuxer
//! into the round-at-a-time `ContainerDemuxer::simple_demux_block`
//! contract the adapter drives.
//!
//! Raw container bytes come from an injected [`ByteSource`] (file I/O is
//! an external collaborator) rather than this module
//! opening a file itself.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use super::{ContainerDemuxer, DemuxBlockRez, TrackInfo};
use crate::error::DemuxError;
use crate::format::byte_source::{ByteSource, SourceRead};
use crate::utils::crc::Crc32Mpeg2;
use crate::Result;

const TS_PACKET_SIZE: usize = 188;
const SYNC_BYTE: u8 = 0x47;
const PID_PAT: u16 = 0x0000;

const STREAM_TYPE_MPEG2_VIDEO: u8 = 0x02;
const STREAM_TYPE_AAC_ADTS: u8 = 0x0f;
const STREAM_TYPE_H264: u8 = 0x1b;
const STREAM_TYPE_H265: u8 = 0x24;
const STREAM_TYPE_AC3: u8 = 0x81;
const STREAM_TYPE_EAC3: u8 = 0x87;
const STREAM_TYPE_DTS: u8 = 0x82;
const STREAM_TYPE_LPCM: u8 = 0x80;
const STREAM_TYPE_PGS: u8 = 0x90;

fn codec_hint_for_stream_type(stream_type: u8) -> Option<&'static str> {
    match stream_type {
        STREAM_TYPE_MPEG2_VIDEO => Some("V_MPEG-2"),
        STREAM_TYPE_AAC_ADTS => Some("A_AAC"),
        STREAM_TYPE_H264 => Some("V_MPEG4/ISO/AVC"),
        STREAM_TYPE_H265 => Some("V_MPEGH/ISO/HEVC"),
        STREAM_TYPE_AC3 => Some("A_AC3"),
        STREAM_TYPE_EAC3 => Some("A_AC3"),
        STREAM_TYPE_DTS => Some("A_DTS"),
        STREAM_TYPE_LPCM => Some("A_LPCM"),
        STREAM_TYPE_PGS => Some("S_HDMV/PGS"),
        _ => None,
    }
}

struct PmtTrack {
    pid: u16,
    stream_type: u8,
}

/// Demultiplexes a Transport Stream into per-PID PES payload byte runs.
pub struct TsContainerDemuxer {
    source: Box<dyn ByteSource>,
    tail: Bytes,
    consumed: usize,
    crc: Crc32Mpeg2,
    pmt_pid: Option<u16>,
    tracks: Vec<PmtTrack>,
    pes_started: HashMap<u16, bool>,
    eof: bool,
}

impl TsContainerDemuxer {
    /// Wraps `source`, which must yield raw TS-packet-aligned bytes (188
    /// bytes/packet; a leading partial packet is tolerated and skipped
    /// until the next sync byte).
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Self {
            source,
            tail: Bytes::new(),
            consumed: 0,
            crc: Crc32Mpeg2::new(),
            pmt_pid: None,
            tracks: Vec::new(),
            pes_started: HashMap::new(),
            eof: false,
        }
    }

    fn resync(&self, buf: &[u8]) -> Option<usize> {
        buf.iter().position(|&b| b == SYNC_BYTE)
    }

    fn handle_packet(&mut self, packet: &[u8], out: &mut HashMap<u16, BytesMut>) -> Result<()> {
        if packet.len() < 4 || packet[0] != SYNC_BYTE {
            return Err(DemuxError::Container("TS packet desync".into()));
        }
        let payload_unit_start = (packet[1] & 0x40) != 0;
        let pid = (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16;
        let adaptation_field_exists = (packet[3] & 0x20) != 0;
        let contains_payload = (packet[3] & 0x10) != 0;

        let mut offset = 4usize;
        if adaptation_field_exists {
            if offset >= packet.len() {
                return Ok(());
            }
            let af_len = packet[offset] as usize;
            offset += 1 + af_len;
        }
        if !contains_payload || offset >= packet.len() {
            return Ok(());
        }
        let payload = &packet[offset..];

        if pid == PID_PAT {
            self.parse_pat(payload, payload_unit_start);
            return Ok(());
        }
        if Some(pid) == self.pmt_pid {
            self.parse_pmt(payload, payload_unit_start);
            return Ok(());
        }

        if self.tracks.iter().any(|t| t.pid == pid) {
            self.append_pes_payload(pid, payload, payload_unit_start, out);
        }
        Ok(())
    }

    fn parse_pat(&mut self, section: &[u8], unit_start: bool) {
        if !unit_start || section.is_empty() {
            return;
        }
        let pointer = section[0] as usize;
        if section.len() < 1 + pointer + 8 {
            return;
        }
        let data = &section[1 + pointer..];
        let section_length = (((data[1] & 0x0F) as usize) << 8) | data[2] as usize;
        let total = 3 + section_length;
        if data.len() < total || total < 12 || !self.crc.validate(&data[..total]) {
            return;
        }
        let body = &data[8..total - 4];
        let mut i = 0;
        while i + 4 <= body.len() {
            let program_number = ((body[i] as u16) << 8) | body[i + 1] as u16;
            let pid = (((body[i + 2] & 0x1F) as u16) << 8) | body[i + 3] as u16;
            if program_number != 0 {
                self.pmt_pid = Some(pid);
            }
            i += 4;
        }
    }

    fn parse_pmt(&mut self, section: &[u8], unit_start: bool) {
        if !unit_start || section.is_empty() {
            return;
        }
        let pointer = section[0] as usize;
        if section.len() < 1 + pointer + 12 {
            return;
        }
        let data = &section[1 + pointer..];
        let section_length = (((data[1] & 0x0F) as usize) << 8) | data[2] as usize;
        let total = 3 + section_length;
        if data.len() < total || total < 16 || !self.crc.validate(&data[..total]) {
            return;
        }
        let program_info_length = (((data[10] & 0x0F) as usize) << 8) | data[11] as usize;
        let mut i = 12 + program_info_length;
        let end = total - 4;
        let mut found = Vec::new();
        while i + 5 <= end {
            let stream_type = data[i];
            let pid = (((data[i + 1] & 0x1F) as u16) << 8) | data[i + 2] as u16;
            let es_info_length = (((data[i + 3] & 0x0F) as usize) << 8) | data[i + 4] as usize;
            found.push(PmtTrack { pid, stream_type });
            i += 5 + es_info_length;
        }
        if !found.is_empty() {
            self.tracks = found;
        }
    }

    fn append_pes_payload(
        &mut self,
        pid: u16,
        payload: &[u8],
        unit_start: bool,
        out: &mut HashMap<u16, BytesMut>,
    ) {
        let Some(buf) = out.get_mut(&pid) else {
            return;
        };
        if unit_start {
            self.pes_started.insert(pid, true);
            if let Some(es) = strip_pes_header(payload) {
                buf.extend_from_slice(es);
            }
            return;
        }
        if *self.pes_started.get(&pid).unwrap_or(&false) {
            buf.extend_from_slice(payload);
        }
    }
}

/// Strips a PES packet's header (start code, stream id, length, optional
/// header fields) and returns the elementary-stream payload that follows.
fn strip_pes_header(data: &[u8]) -> Option<&[u8]> {
    if data.len() < 9 || data[0] != 0x00 || data[1] != 0x00 || data[2] != 0x01 {
        return None;
    }
    let header_data_length = data[8] as usize;
    let start = 9 + header_data_length;
    if start > data.len() {
        return None;
    }
    Some(&data[start..])
}

impl ContainerDemuxer for TsContainerDemuxer {
    fn get_track_list(&self) -> Vec<TrackInfo> {
        self.tracks
            .iter()
            .map(|t| TrackInfo {
                pid: t.pid,
                codec_hint: codec_hint_for_stream_type(t.stream_type),
                lang: None,
            })
            .collect()
    }

    fn get_track_delay(&self, _pid: u16) -> i64 {
        0
    }

    fn get_file_duration_nano(&self) -> i64 {
        0
    }

    fn simple_demux_block(&mut self, out: &mut HashMap<u16, BytesMut>) -> Result<DemuxBlockRez> {
        if self.eof && self.tail.is_empty() {
            return Ok(DemuxBlockRez::Eof);
        }

        match self.source.read_block(self.consumed)? {
            SourceRead::Ready(buf) => {
                self.tail = buf;
            }
            SourceRead::Delayed | SourceRead::NotReady => {
                self.consumed = 0;
                return Ok(DemuxBlockRez::NotReady);
            }
            SourceRead::Eof => {
                self.eof = true;
                self.consumed = 0;
                if self.tail.is_empty() {
                    return Ok(DemuxBlockRez::Eof);
                }
            }
        }

        let mut cursor = 0usize;
        loop {
            let remaining = &self.tail[cursor..];
            if remaining.len() < TS_PACKET_SIZE {
                break;
            }
            if remaining[0] != SYNC_BYTE {
                match self.resync(remaining) {
                    Some(skip) => {
                        cursor += skip;
                        continue;
                    }
                    None => {
                        cursor = self.tail.len();
                        break;
                    }
                }
            }
            let packet = &remaining[..TS_PACKET_SIZE];
            self.handle_packet(packet, out)?;
            cursor += TS_PACKET_SIZE;
        }

        self.consumed = cursor;
        if self.eof && cursor >= self.tail.len() {
            Ok(DemuxBlockRez::Eof)
        } else {
            Ok(DemuxBlockRez::Ok)
        }
    }
}
