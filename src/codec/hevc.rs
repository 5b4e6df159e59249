//! # HEVC / H.265
//!
//! Implements : tracks VPS/SPS/PPS by id, decodes each
//! slice header far enough to get `first_slice_segment_in_pic_flag` and
//! (for non-IDR pictures) `slice_pic_order_cnt_lsb`, and assembles one
//! access unit per emitted packet. Full picture order is the slice-signalled
//! LSB combined with a rolling MSB that wraps when the LSB decreases by
//! more than half its modulus, per the spec's exact rule.
//!
//! NAL unit type values are the ITU-T H.265 (04/2013) Table 7-1 values.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, HEVC_CODEC_INFO};
use crate::utils::annexb::next_complete_nal;
use crate::utils::bits::BitReader;
use crate::{Packet, PacketFlags, Result};

const NAL_TRAIL_N: u8 = 0;
const NAL_RASL_R: u8 = 9;
const NAL_BLA_W_LP: u8 = 16;
const NAL_IDR_W_RADL: u8 = 19;
const NAL_IDR_N_LP: u8 = 20;
const NAL_CRA_NUT: u8 = 21;
const NAL_RSV_IRAP_VCL23: u8 = 23;
const NAL_VPS: u8 = 32;
const NAL_SPS: u8 = 33;
const NAL_PPS: u8 = 34;
const NAL_AUD: u8 = 35;
const NAL_PREFIX_SEI: u8 = 39;
const NAL_SUFFIX_SEI: u8 = 40;

fn is_slice(nal_type: u8) -> bool {
    nal_type <= NAL_RASL_R || (NAL_BLA_W_LP..=NAL_RSV_IRAP_VCL23).contains(&nal_type)
}

fn is_irap(nal_type: u8) -> bool {
    (NAL_BLA_W_LP..=NAL_RSV_IRAP_VCL23).contains(&nal_type)
}

fn is_idr(nal_type: u8) -> bool {
    nal_type == NAL_IDR_W_RADL || nal_type == NAL_IDR_N_LP
}

#[derive(Debug, Clone, Default)]
struct VpsInfo {
    _id: u8,
}

#[derive(Debug, Clone, Default)]
struct SpsInfo {
    log2_max_poc_lsb: u32,
    separate_colour_plane: bool,
    pic_width: u32,
    pic_height: u32,
    max_num_reorder_pics: u32,
}

/// Parser state for HEVC.
pub struct HevcParser {
    buffer: Bytes,
    is_eof: bool,
    vps_map: HashMap<u8, VpsInfo>,
    active_sps: Option<SpsInfo>,
    pending_au: BytesMut,
    au_has_slice: bool,
    poc_lsb: i64,
    poc_msb: i64,
    prev_poc_lsb: i64,
    full_poc: i64,
    decode_index: i64,
    pub frame_depth: u32,
    pub last_i_frame: bool,
    /// Armed on a split event (file-iterator rollover);
    /// the next VPS/SPS/PPS/PREFIX_SEI occurrence resets it.
    pub first_file_frame: bool,
    pub frame_duration: i64,
    pub sample_rate: u32,
    pub channels: u32,
}

impl HevcParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            vps_map: HashMap::new(),
            active_sps: None,
            pending_au: BytesMut::new(),
            au_has_slice: false,
            poc_lsb: 0,
            poc_msb: 0,
            prev_poc_lsb: 0,
            full_poc: 0,
            decode_index: 0,
            frame_depth: 0,
            last_i_frame: false,
            first_file_frame: true,
            frame_duration: 0,
            sample_rate: 0,
            channels: 0,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        let mut from = 0;
        while let Some(nal_start) = crate::utils::annexb::next_start_code(buf, from) {
            if let Some(&b) = buf.get(nal_start) {
                let nal_type = (b >> 1) & 0x3F;
                if nal_type == NAL_VPS || nal_type == NAL_SPS {
                    return CheckStreamRez::Recognized(&HEVC_CODEC_INFO);
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
        &HEVC_CODEC_INFO
    }

    /// Sets the frame rate the muxer or manifest's `fps=` option provides;
    /// HEVC's own SPS VUI frame-rate fields are out of this crate's parse
    /// depth.
    pub fn set_frame_rate(&mut self, num: u32, den: u32) {
        if num > 0 {
            self.frame_duration = crate::INTERNAL_PTS_FREQ * den as i64 / num as i64;
        }
    }

    /// Estimated max reorder depth from SPS `sps_max_num_reorder_pics`.
    pub fn get_frame_depth(&self) -> u32 {
        self.frame_depth
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        loop {
            let Some((nal_start, nal_end)) = next_complete_nal(&self.buffer, 0) else {
                if self.is_eof && !self.buffer.is_empty() {
                    // A final, unterminated NAL at true EOF: treat the rest
                    // of the buffer as one more unit bounded by the slice.
                    let nal_end = self.buffer.len();
                    if let Some(nal_start) = crate::utils::annexb::next_start_code(&self.buffer, 0) {
                        self.consume_nal(nal_start, nal_end);
                        self.buffer = Bytes::new();
                        continue;
                    }
                }
                return Ok(FrameResult::NeedMoreData);
            };

            let nal_type = self.buffer[nal_start] >> 1 & 0x3F;
            let starts_new_au = self.nal_starts_new_access_unit(nal_type, nal_start, nal_end);

            if starts_new_au && self.au_has_slice {
                let packet = self.emit_pending();
                // Don't consume this NAL yet; it belongs to the next AU.
                return Ok(FrameResult::Packet(packet));
            }

            self.consume_nal(nal_start, nal_end);
        }
    }

    fn nal_starts_new_access_unit(&self, nal_type: u8, nal_start: usize, nal_end: usize) -> bool {
        if nal_type == NAL_VPS || nal_type == NAL_SPS || nal_type == NAL_PPS || nal_type == NAL_AUD
            || nal_type == NAL_PREFIX_SEI
        {
            return true;
        }
        if is_slice(nal_type) {
            let payload = &self.buffer[nal_start + 2..nal_end.max(nal_start + 2)];
            return payload.first().map(|b| b & 0x80 != 0).unwrap_or(true);
        }
        false
    }

    fn consume_nal(&mut self, nal_start: usize, nal_end: usize) {
        let nal_type = self.buffer[nal_start] >> 1 & 0x3F;

        match nal_type {
            NAL_VPS => {
                self.vps_map.insert(0, VpsInfo::default());
                self.first_file_frame = false;
            }
            NAL_SPS => {
                if let Ok(sps) = parse_sps(&self.buffer[nal_start + 2..nal_end]) {
                    self.frame_depth = sps.max_num_reorder_pics;
                    self.active_sps = Some(sps);
                }
                self.first_file_frame = false;
            }
            NAL_PPS | NAL_PREFIX_SEI => {
                self.first_file_frame = false;
            }
            _ if is_slice(nal_type) => {
                self.decode_slice(nal_type, nal_start, nal_end);
                self.au_has_slice = true;
            }
            // Suffix SEI trails the current picture's slice data; it
            // belongs to the access unit already in progress and must
            // not be mistaken for the next picture's leading NAL.
            NAL_SUFFIX_SEI => {}
            _ => {}
        }

        self.pending_au.extend_from_slice(&[0, 0, 1]);
        self.pending_au.extend_from_slice(&self.buffer[nal_start..nal_end]);
        self.buffer = self.buffer.slice(nal_end..);
    }

    fn decode_slice(&mut self, nal_type: u8, nal_start: usize, nal_end: usize) {
        if is_idr(nal_type) || nal_type == NAL_CRA_NUT {
            self.last_i_frame = true;
        } else if is_slice(nal_type) {
            self.last_i_frame = false;
        }

        let Some(sps) = self.active_sps.clone() else {
            return;
        };
        let slice = &self.buffer[nal_start + 2..nal_end.max(nal_start + 2)];
        let mut reader = BitReader::new(slice);
        let Ok(first_slice_segment) = reader.read_bits(1) else {
            return;
        };
        if first_slice_segment != 1 {
            return;
        }
        if is_irap(nal_type) {
            let _ = reader.skip_bits(1); // no_output_of_prior_pics_flag
        }
        if reader.read_golomb().is_err() {
            return; // slice_pic_parameter_set_id
        }

        if is_idr(nal_type) {
            self.poc_msb = 0;
            self.poc_lsb = 0;
            self.prev_poc_lsb = 0;
            self.full_poc = 0;
            return;
        }

        let _ = reader.read_golomb(); // slice_type
        if sps.separate_colour_plane {
            let _ = reader.skip_bits(2);
        }
        let Ok(poc_lsb) = reader.read_bits(sps.log2_max_poc_lsb.clamp(4, 16) as u8) else {
            return;
        };
        let poc_lsb = poc_lsb as i64;
        let max_poc_lsb = 1i64 << sps.log2_max_poc_lsb.clamp(4, 16);

        let mut msb = self.poc_msb;
        if poc_lsb < self.prev_poc_lsb && (self.prev_poc_lsb - poc_lsb) >= max_poc_lsb / 2 {
            msb += max_poc_lsb;
        } else if poc_lsb > self.prev_poc_lsb && (poc_lsb - self.prev_poc_lsb) > max_poc_lsb / 2 {
            msb -= max_poc_lsb;
        }

        self.poc_msb = msb;
        self.prev_poc_lsb = poc_lsb;
        self.poc_lsb = poc_lsb;
        self.full_poc = msb + poc_lsb;
    }

    fn emit_pending(&mut self) -> Packet {
        let data = self.pending_au.split().freeze();
        self.au_has_slice = false;

        let mut packet = Packet::new(data, &HEVC_CODEC_INFO);
        packet.duration = self.frame_duration;
        packet.pts = self.full_poc * self.frame_duration;
        packet.dts = self.decode_index * self.frame_duration;
        self.decode_index += 1;
        if self.last_i_frame {
            packet.flags |= PacketFlags::PRIORITY_DATA;
        }
        packet
    }

    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        if !self.buffer.is_empty() {
            if let Some(nal_start) = crate::utils::annexb::next_start_code(&self.buffer, 0) {
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

    /// Arms `first_file_frame` on a file-iterator split so the next
    /// emission knows it must re-synthesize fresh parameter sets.
    pub fn on_split_event(&mut self) {
        self.first_file_frame = true;
    }
}

impl Default for HevcParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_sps(data: &[u8]) -> Result<SpsInfo> {
    let mut reader = BitReader::new(data);
    let _sps_video_parameter_set_id = reader.read_bits(4)?;
    let max_sub_layers_minus1 = reader.read_bits(3)?;
    let _sps_temporal_id_nesting_flag = reader.read_bits(1)?;
    skip_profile_tier_level(&mut reader, max_sub_layers_minus1)?;

    let _sps_id = reader.read_golomb()?;
    let chroma_format_idc = reader.read_golomb()?;
    let separate_colour_plane = if chroma_format_idc == 3 {
        reader.read_bits(1)? == 1
    } else {
        false
    };
    let pic_width = reader.read_golomb()?;
    let pic_height = reader.read_golomb()?;

    let conformance_window_flag = reader.read_bits(1)?;
    if conformance_window_flag == 1 {
        let _ = reader.read_golomb()?;
        let _ = reader.read_golomb()?;
        let _ = reader.read_golomb()?;
        let _ = reader.read_golomb()?;
    }
    let _bit_depth_luma_minus8 = reader.read_golomb()?;
    let _bit_depth_chroma_minus8 = reader.read_golomb()?;
    let log2_max_pic_order_cnt_lsb_minus4 = reader.read_golomb()?;

    let sub_layer_ordering_info_present = reader.read_bits(1)?;
    let start = if sub_layer_ordering_info_present == 1 {
        0
    } else {
        max_sub_layers_minus1
    };
    let mut max_num_reorder_pics = 0u32;
    for _ in start..=max_sub_layers_minus1 {
        let _ = reader.read_golomb()?; // sps_max_dec_pic_buffering_minus1
        max_num_reorder_pics = reader.read_golomb()?;
        let _ = reader.read_golomb()?; // sps_max_latency_increase_plus1
    }

    Ok(SpsInfo {
        log2_max_poc_lsb: log2_max_pic_order_cnt_lsb_minus4 + 4,
        separate_colour_plane,
        pic_width,
        pic_height,
        max_num_reorder_pics,
    })
}

fn skip_profile_tier_level(reader: &mut BitReader, max_sub_layers_minus1: u32) -> Result<()> {
    reader.skip_bits(2 + 1 + 5)?; // general_profile_space/tier_flag/profile_idc
    reader.skip_bits(32)?; // general_profile_compatibility_flag[32]
    reader.skip_bits(4)?; // progressive/interlaced/non_packed/frame_only source flags
    reader.skip_bits(44)?; // reserved/inbld bits
    reader.skip_bits(8)?; // general_level_idc

    let mut profile_present = Vec::with_capacity(max_sub_layers_minus1 as usize);
    let mut level_present = Vec::with_capacity(max_sub_layers_minus1 as usize);
    for _ in 0..max_sub_layers_minus1 {
        profile_present.push(reader.read_bits(1)? == 1);
        level_present.push(reader.read_bits(1)? == 1);
    }
    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            reader.skip_bits(2)?;
        }
    }
    for i in 0..max_sub_layers_minus1 as usize {
        if profile_present[i] {
            reader.skip_bits(2 + 1 + 5)?;
            reader.skip_bits(32)?;
            reader.skip_bits(4)?;
            reader.skip_bits(44)?;
        }
        if level_present[i] {
            reader.skip_bits(8)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

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
            let mask = if width == 0 { 0 } else { (1u64 << width) - 1 };
            self.acc = (self.acc << width) | (value & mask);
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
    fn emits_one_packet_per_access_unit_at_the_next_first_slice_nal() {
        // Two TRAIL_R slice NALs, each with first_slice_segment_in_pic_flag
        // set, bound by start codes. The second NAL's leading
        // first-slice bit starts a new access unit, so the first call to
        // `read_packet` must emit NAL 1 alone and leave NAL 2 buffered.
        let mut data = vec![0x00, 0x00, 0x01, 0x02, 0x01, 0x80, 0xAA];
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x02, 0x01, 0x80, 0xBB]);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x02, 0x01, 0x80, 0xCC]);

        let mut parser = HevcParser::new();
        parser.set_buffer(Bytes::from(data), false);
        match parser.read_packet().unwrap() {
            FrameResult::Packet(p) => {
                assert!(p.data.ends_with(&[0xAA]));
            }
            other => panic!("expected a packet for the first access unit, got {other:?}"),
        }
        assert!(parser.remaining() > 0, "second NAL should still be buffered");
    }

    #[test]
    fn check_stream_detects_sps_nal() {
        let mut data = vec![0x00, 0x00, 0x01];
        data.push((NAL_SPS << 1) & 0xFE);
        data.push(0x01);
        data.extend_from_slice(&[0u8; 8]);
        assert!(HevcParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn check_stream_rejects_non_hevc_buffer() {
        let data = [0u8; 16];
        assert!(!HevcParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn parses_sps_width_height_and_poc_bits() {
        let mut w = BitWriter::new();
        w.push(0, 4); // vps id
        w.push(0, 3); // max_sub_layers_minus1 = 0
        w.push(0, 1); // temporal_id_nesting

        // profile_tier_level (no sub-layers): 2+1+5+32+4+44+8 = 96 bits
        w.push(0, 2 + 1 + 5);
        w.push(0, 32);
        w.push(0, 4);
        w.push(0, 44);
        w.push(0, 8);

        w.push_ue(0); // sps_id
        w.push_ue(1); // chroma_format_idc (not 3, no separate colour plane bit)
        w.push_ue(1919); // pic_width_in_luma_samples
        w.push_ue(1079); // pic_height_in_luma_samples
        w.push(0, 1); // conformance_window_flag
        w.push_ue(0); // bit_depth_luma_minus8
        w.push_ue(0); // bit_depth_chroma_minus8
        w.push_ue(4); // log2_max_pic_order_cnt_lsb_minus4 -> 8
        w.push(1, 1); // sub_layer_ordering_info_present_flag
        w.push_ue(4); // sps_max_dec_pic_buffering_minus1
        w.push_ue(2); // sps_max_num_reorder_pics
        w.push_ue(0); // sps_max_latency_increase_plus1

        let bytes = w.finish();
        let sps = parse_sps(&bytes).unwrap();
        assert_eq!(sps.pic_width, 1919);
        assert_eq!(sps.pic_height, 1079);
        assert_eq!(sps.log2_max_poc_lsb, 8);
        assert_eq!(sps.max_num_reorder_pics, 2);
    }
}
