//! # H.264 / AVC (and its MVC dependent view)
//!
//! Annex-B NAL scanning shared with HEVC/VVC (`utils::annexb`). Frame
//! boundaries are detected the same way as HEVC's access-unit assembly:
//! AUD/SPS/PPS/SEI NALs always start a new AU, and a VCL slice NAL starts
//! one when its `first_mb_in_slice` golomb field is `0` and an AU is
//! already pending.
//!
//! A combined AVC+MVC file interleaves base
//! view NALs (types 1/5) with the dependent view's prefix (14) and coded
//! slice extension (20) NALs. [`H264Parser::for_dependent_view`]
//! configures a second parser instance over the *same* source that keeps
//! only the dependent-view NALs, so `MetaDemuxer::add_stream` can register
//! two tracks against one file.

use bytes::{Bytes, BytesMut};

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, H264_CODEC_INFO, MVC_CODEC_INFO};
use crate::utils::annexb::{next_complete_nal, next_start_code};
use crate::utils::bits::BitReader;
use crate::{Packet, PacketFlags, Result};

const NAL_SLICE: u8 = 1;
const NAL_IDR_SLICE: u8 = 5;
const NAL_SEI: u8 = 6;
const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;
const NAL_AUD: u8 = 9;
const NAL_PREFIX: u8 = 14;
const NAL_SUBSET_SPS: u8 = 15;
const NAL_CODED_SLICE_EXT: u8 = 20;

const HIGH_PROFILE_IDS: [u8; 9] = [100, 110, 122, 244, 44, 83, 86, 118, 128];

#[derive(Debug, Clone, Copy, Default)]
struct SpsInfo {
    width: u32,
    height: u32,
}

/// MVC SEI insertion mode, manifest options `insertSEI`/`autoSEI`/`forceSEI`.
/// The base view's mode wins; a dependent view whose manifest
/// line requested a different mode is overridden with a one-time warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertSeiMode {
    Insert,
    Auto,
    Force,
}

pub struct H264Parser {
    buffer: Bytes,
    is_eof: bool,
    pending_au: BytesMut,
    au_has_slice: bool,
    dependent_view: bool,
    active_sps: Option<SpsInfo>,
    pub has_mvc_extension: bool,
    pub last_i_frame: bool,
    pub frame_duration: i64,
    decode_index: i64,
    insert_sei: Option<InsertSeiMode>,
}

impl H264Parser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            pending_au: BytesMut::new(),
            au_has_slice: false,
            dependent_view: false,
            active_sps: None,
            has_mvc_extension: false,
            last_i_frame: false,
            frame_duration: 0,
            decode_index: 0,
            insert_sei: None,
        }
    }

    /// Configures this instance to extract only the MVC dependent view
    /// (NAL types 14/15/20) from a combined AVC+MVC stream.
    pub fn for_dependent_view() -> Self {
        let mut parser = Self::new();
        parser.dependent_view = true;
        parser
    }

    /// Whether this instance extracts the dependent (MVC) view rather than
    /// the base AVC view.
    pub fn is_dependent_view(&self) -> bool {
        self.dependent_view
    }

    pub fn insert_sei(&self) -> Option<InsertSeiMode> {
        self.insert_sei
    }

    pub fn set_insert_sei(&mut self, mode: InsertSeiMode) {
        self.insert_sei = Some(mode);
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        let mut from = 0;
        while let Some(nal_start) = next_start_code(buf, from) {
            if let Some(&b) = buf.get(nal_start) {
                let nal_type = b & 0x1F;
                if nal_type == NAL_SPS {
                    return CheckStreamRez::Recognized(&H264_CODEC_INFO);
                }
            }
            from = nal_start + 1;
        }
        CheckStreamRez::NotDetected
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
        if self.dependent_view {
            &MVC_CODEC_INFO
        } else {
            &H264_CODEC_INFO
        }
    }

    pub fn set_frame_rate(&mut self, num: u32, den: u32) {
        if num > 0 {
            self.frame_duration = crate::INTERNAL_PTS_FREQ * den as i64 / num as i64;
        }
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        loop {
            let Some((nal_start, nal_end)) = next_complete_nal(&self.buffer, 0) else {
                if self.is_eof && !self.buffer.is_empty() {
                    if let Some(nal_start) = next_start_code(&self.buffer, 0) {
                        let nal_end = self.buffer.len();
                        self.consume_nal(nal_start, nal_end);
                        self.buffer = Bytes::new();
                        continue;
                    }
                }
                return Ok(FrameResult::NeedMoreData);
            };

            let nal_type = self.buffer[nal_start] & 0x1F;
            if self.belongs_to_this_view(nal_type) && self.starts_new_access_unit(nal_type, nal_start, nal_end) && self.au_has_slice
            {
                return Ok(FrameResult::Packet(self.emit_pending()));
            }

            self.consume_nal(nal_start, nal_end);
        }
    }

    fn belongs_to_this_view(&self, nal_type: u8) -> bool {
        let is_dependent_nal = matches!(nal_type, NAL_PREFIX | NAL_SUBSET_SPS | NAL_CODED_SLICE_EXT);
        self.dependent_view == is_dependent_nal
    }

    fn starts_new_access_unit(&self, nal_type: u8, nal_start: usize, nal_end: usize) -> bool {
        match nal_type {
            NAL_AUD | NAL_SPS | NAL_PPS | NAL_SEI | NAL_SUBSET_SPS => true,
            NAL_SLICE | NAL_IDR_SLICE | NAL_CODED_SLICE_EXT => {
                let header_len = if nal_type == NAL_CODED_SLICE_EXT { 4 } else { 1 };
                let payload = &self.buffer[nal_start + header_len..nal_end.max(nal_start + header_len)];
                let mut reader = BitReader::new(payload);
                matches!(reader.read_golomb(), Ok(0))
            }
            _ => false,
        }
    }

    fn consume_nal(&mut self, nal_start: usize, nal_end: usize) {
        let nal_type = self.buffer[nal_start] & 0x1F;

        if self.belongs_to_this_view(nal_type) {
            match nal_type {
                NAL_SUBSET_SPS => self.has_mvc_extension = true,
                NAL_SPS => {
                    if let Ok(sps) = parse_sps(&self.buffer[nal_start + 1..nal_end]) {
                        self.active_sps = Some(sps);
                    }
                }
                NAL_SLICE | NAL_IDR_SLICE | NAL_CODED_SLICE_EXT => {
                    self.last_i_frame = nal_type == NAL_IDR_SLICE;
                    self.au_has_slice = true;
                }
                _ => {}
            }
            self.pending_au.extend_from_slice(&[0, 0, 1]);
            self.pending_au.extend_from_slice(&self.buffer[nal_start..nal_end]);
        } else if nal_type == NAL_SUBSET_SPS {
            self.has_mvc_extension = true;
        }

        self.buffer = self.buffer.slice(nal_end..);
    }

    fn emit_pending(&mut self) -> Packet {
        let data = self.pending_au.split().freeze();
        self.au_has_slice = false;

        let mut packet = Packet::new(data, self.codec_info());
        packet.duration = self.frame_duration;
        packet.dts = self.decode_index * self.frame_duration;
        packet.pts = packet.dts;
        self.decode_index += 1;
        if self.last_i_frame {
            packet.flags |= PacketFlags::PRIORITY_DATA;
        }
        packet
    }

    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        if !self.buffer.is_empty() {
            if let Some(nal_start) = next_start_code(&self.buffer, 0) {
                let nal_end = self.buffer.len();
                self.consume_nal(nal_start, nal_end);
            }
            self.buffer = Bytes::new();
        }
        if self.au_has_slice {
            Ok(FrameResult::Packet(self.emit_pending()))
        } else {
            Ok(FrameResult::Eof)
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.active_sps.map(|s| (s.width, s.height))
    }
}

impl Default for H264Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_sps(data: &[u8]) -> Result<SpsInfo> {
    let mut reader = BitReader::new(data);
    let profile_idc = reader.read_bits(8)? as u8;
    reader.skip_bits(8)?; // constraint flags + reserved
    reader.skip_bits(8)?; // level_idc
    let _sps_id = reader.read_golomb()?;

    if HIGH_PROFILE_IDS.contains(&profile_idc) {
        let chroma_format_idc = reader.read_golomb()?;
        if chroma_format_idc == 3 {
            reader.skip_bits(1)?;
        }
        let _bit_depth_luma = reader.read_golomb()?;
        let _bit_depth_chroma = reader.read_golomb()?;
        reader.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag
        let seq_scaling_matrix_present = reader.read_bits(1)?;
        if seq_scaling_matrix_present == 1 {
            let count = if chroma_format_idc != 3 { 8 } else { 12 };
            for _ in 0..count {
                let present = reader.read_bits(1)?;
                if present == 1 {
                    skip_scaling_list(&mut reader)?;
                }
            }
        }
    }

    let _log2_max_frame_num_minus4 = reader.read_golomb()?;
    let pic_order_cnt_type = reader.read_golomb()?;
    if pic_order_cnt_type == 0 {
        let _log2_max_pic_order_cnt_lsb_minus4 = reader.read_golomb()?;
    } else if pic_order_cnt_type == 1 {
        reader.skip_bits(1)?;
        let _offset_for_non_ref_pic = reader.read_signed_golomb()?;
        let _offset_for_top_to_bottom_field = reader.read_signed_golomb()?;
        let cycle = reader.read_golomb()?;
        for _ in 0..cycle {
            let _ = reader.read_signed_golomb()?;
        }
    }

    let _max_num_ref_frames = reader.read_golomb()?;
    reader.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag
    let pic_width_in_mbs_minus1 = reader.read_golomb()?;
    let pic_height_in_map_units_minus1 = reader.read_golomb()?;
    let frame_mbs_only_flag = reader.read_bits(1)?;

    let width = (pic_width_in_mbs_minus1 + 1) * 16;
    let height = (2 - frame_mbs_only_flag) * (pic_height_in_map_units_minus1 + 1) * 16;

    Ok(SpsInfo { width, height })
}

fn skip_scaling_list(reader: &mut BitReader) -> Result<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    let size = 16;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = reader.read_signed_golomb()?;
            next_scale = (last_scale + delta + 256) % 256;
        }
        last_scale = if next_scale == 0 { last_scale } else { next_scale };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annexb(nals: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for nal in nals {
            out.extend_from_slice(&[0, 0, 1]);
            out.extend_from_slice(nal);
        }
        out
    }

    #[test]
    fn check_stream_detects_sps_nal() {
        let data = annexb(&[&[0x67, 0x64, 0, 0]]);
        assert!(H264Parser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn check_stream_rejects_without_sps() {
        let data = annexb(&[&[0x61, 0, 0]]);
        assert!(!H264Parser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn emits_access_unit_when_next_slice_begins_new_picture() {
        // first_mb_in_slice = ue(0) -> single '1' bit.
        let slice_a: [u8; 2] = [0x65, 0b1_000_0000];
        let slice_b: [u8; 2] = [0x65, 0b1_000_0000];
        let data = annexb(&[&slice_a, &slice_b]);
        let mut parser = H264Parser::new();
        parser.set_buffer(Bytes::from(data), true);
        let first = parser.read_packet().unwrap();
        assert!(matches!(first, FrameResult::Packet(_)));
        if let FrameResult::Packet(p) = first {
            assert!(p.is_priority_data());
        }
    }

    #[test]
    fn dependent_view_parser_ignores_base_view_nals() {
        let base_slice: [u8; 2] = [0x65, 0b1_000_0000];
        let mvc_prefix: [u8; 1] = [(NAL_PREFIX) & 0x1F];
        let mvc_slice: [u8; 5] = [(NAL_CODED_SLICE_EXT) & 0x1F, 0, 0, 0, 0b1_000_0000];
        let data = annexb(&[&base_slice, &mvc_prefix, &mvc_slice]);
        let mut parser = H264Parser::for_dependent_view();
        parser.set_buffer(Bytes::from(data), true);
        let rez = parser.flush_packet().unwrap();
        if let FrameResult::Packet(p) = rez {
            assert!(!p.data.is_empty());
        }
    }

    struct BitWriter {
        acc: u64,
        bitcount: u32,
        out: Vec<u8>,
    }

    impl BitWriter {
        fn new() -> Self {
            Self {
                acc: 0,
                bitcount: 0,
                out: Vec::new(),
            }
        }
        fn push(&mut self, value: u64, width: u32) {
            self.acc = (self.acc << width) | (value & ((1u64 << width) - 1));
            self.bitcount += width;
            while self.bitcount >= 8 {
                let shift = self.bitcount - 8;
                self.out.push(((self.acc >> shift) & 0xFF) as u8);
                self.bitcount -= 8;
                self.acc &= (1u64 << shift) - 1;
            }
        }
        fn push_ue(&mut self, value: u32) {
            let code = value + 1;
            let bits = 32 - code.leading_zeros();
            self.push(0, bits - 1);
            self.push(code as u64, bits);
        }
        fn finish(mut self) -> Vec<u8> {
            if self.bitcount > 0 {
                let pad = 8 - self.bitcount;
                self.acc <<= pad;
                self.out.push((self.acc & 0xFF) as u8);
            }
            self.out
        }
    }

    #[test]
    fn parses_baseline_sps_dimensions() {
        // profile_idc=66 (baseline, not in HIGH_PROFILE_IDS)
        let mut w = BitWriter::new();
        w.push(66, 8); // profile_idc
        w.push(0, 8); // constraint flags
        w.push(30, 8); // level_idc
        w.push_ue(0); // sps_id
        w.push_ue(9); // log2_max_frame_num_minus4 (arbitrary, re-used slot)
        w.push_ue(0); // pic_order_cnt_type
        w.push_ue(4); // log2_max_pic_order_cnt_lsb_minus4
        w.push_ue(4); // max_num_ref_frames
        w.push(0, 1); // gaps_in_frame_num_value_allowed_flag
        w.push_ue(119); // pic_width_in_mbs_minus1 -> 120 mbs -> 1920
        w.push_ue(67); // pic_height_in_map_units_minus1 -> 68 -> 1088 (frame_mbs_only)
        w.push(1, 1); // frame_mbs_only_flag

        let bytes = w.finish();
        let sps = parse_sps(&bytes).unwrap();
        assert_eq!(sps.width, 1920);
        assert_eq!(sps.height, 1088);
    }
}
