//! # Per-Codec Frame Parsers
//!
//! Each codec family gets one module implementing the generic contract
//! names: frame-boundary detection, header parsing, and
//! per-frame timing, behind `check_stream` / `set_buffer` / `read_packet`
//! / `flush_packet` / the metadata getters.
//!
//! Per the heterogeneous-dispatch design note, parsers are
//! held as a tagged `enum CodecParser`, one variant per family holding
//! its state inline, dispatched with a plain `match` — never a
//! `Box<dyn Trait>` vtable. Each variant type still carries its own
//! inherent `set_buffer`/`read_packet`/... methods; the enum's methods
//! are thin dispatch wrappers.

use bytes::Bytes;

use crate::codec_info::CodecInfo;
use crate::Result;

pub mod aac;
pub mod ac3;
pub mod autodetect;
pub mod dts;
pub mod dvbsub;
pub mod h264;
pub mod hevc;
pub mod lpcm;
pub mod mlp;
pub mod mpeg2_video;
pub mod mpeg_audio;
pub mod pgs;
pub mod srt;
pub mod vc1;
pub mod vvc;

/// Outcome of a codec probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStreamRez {
    /// The buffer does not match this codec's sync pattern.
    NotDetected,
    /// Recognized and fully supported.
    Recognized(&'static CodecInfo),
    /// Recognized (sync pattern matches) but this build only detects it,
    /// it does not frame/parse it (e.g. LOAS/LATM AAC).
    RecognizedUnsupported(&'static CodecInfo),
}

impl CheckStreamRez {
    /// True for `Recognized`; `RecognizedUnsupported` does not count as
    /// an accepting probe for `check_stream(...) → CheckStreamRez`
    /// callers that need a parser they can actually frame with.
    pub fn is_recognized(self) -> bool {
        matches!(self, CheckStreamRez::Recognized(_))
    }
}

/// Outcome of a single `read_packet`/`flush_packet` call.
#[derive(Debug)]
pub enum FrameResult {
    /// A complete frame was found and converted into a packet.
    Packet(crate::Packet),
    /// Not enough bytes in the current buffer to complete the next
    /// frame; this is never an error, the caller is
    /// expected to supply a larger buffer on the next `set_buffer`.
    NeedMoreData,
    /// Nothing left to flush.
    Eof,
}

/// Which container (if any) handed this buffer to the parser, for probes
/// that change acceptance by context (e.g. Blu-ray-mode DTS descriptors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerHint {
    #[default]
    Raw,
    Ts,
    M2ts,
    ProgramStream,
    Matroska,
    Mov,
}

/// The tagged union of every supported codec parser.
pub enum CodecParser {
    Dts(dts::DtsParser),
    Ac3(ac3::Ac3Parser),
    Mlp(mlp::MlpParser),
    Aac(aac::AacParser),
    MpegAudio(mpeg_audio::MpegAudioParser),
    Lpcm(lpcm::LpcmParser),
    Mpeg2Video(mpeg2_video::Mpeg2VideoParser),
    H264(h264::H264Parser),
    Hevc(hevc::HevcParser),
    Vvc(vvc::VvcParser),
    Vc1(vc1::Vc1Parser),
    Pgs(pgs::PgsParser),
    DvbSub(dvbsub::DvbSubParser),
    Srt(srt::SrtParser),
}

impl CodecParser {
    /// Hands the parser its next block. `data` is the full current
    /// unconsumed tail (see [`crate::format::ByteSource`]); `is_eof`
    /// marks that no more bytes will ever follow.
    pub fn set_buffer(&mut self, data: Bytes, is_eof: bool) {
        match self {
            CodecParser::Dts(p) => p.set_buffer(data, is_eof),
            CodecParser::Ac3(p) => p.set_buffer(data, is_eof),
            CodecParser::Mlp(p) => p.set_buffer(data, is_eof),
            CodecParser::Aac(p) => p.set_buffer(data, is_eof),
            CodecParser::MpegAudio(p) => p.set_buffer(data, is_eof),
            CodecParser::Lpcm(p) => p.set_buffer(data, is_eof),
            CodecParser::Mpeg2Video(p) => p.set_buffer(data, is_eof),
            CodecParser::H264(p) => p.set_buffer(data, is_eof),
            CodecParser::Hevc(p) => p.set_buffer(data, is_eof),
            CodecParser::Vvc(p) => p.set_buffer(data, is_eof),
            CodecParser::Vc1(p) => p.set_buffer(data, is_eof),
            CodecParser::Pgs(p) => p.set_buffer(data, is_eof),
            CodecParser::DvbSub(p) => p.set_buffer(data, is_eof),
            CodecParser::Srt(p) => p.set_buffer(data, is_eof),
        }
    }

    /// Attempts to emit the next complete frame as a packet.
    pub fn read_packet(&mut self) -> Result<FrameResult> {
        match self {
            CodecParser::Dts(p) => p.read_packet(),
            CodecParser::Ac3(p) => p.read_packet(),
            CodecParser::Mlp(p) => p.read_packet(),
            CodecParser::Aac(p) => p.read_packet(),
            CodecParser::MpegAudio(p) => p.read_packet(),
            CodecParser::Lpcm(p) => p.read_packet(),
            CodecParser::Mpeg2Video(p) => p.read_packet(),
            CodecParser::H264(p) => p.read_packet(),
            CodecParser::Hevc(p) => p.read_packet(),
            CodecParser::Vvc(p) => p.read_packet(),
            CodecParser::Vc1(p) => p.read_packet(),
            CodecParser::Pgs(p) => p.read_packet(),
            CodecParser::DvbSub(p) => p.read_packet(),
            CodecParser::Srt(p) => p.read_packet(),
        }
    }

    /// Drains any residue once the source has reported EOF.
    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        match self {
            CodecParser::Dts(p) => p.flush_packet(),
            CodecParser::Ac3(p) => p.flush_packet(),
            CodecParser::Mlp(p) => p.flush_packet(),
            CodecParser::Aac(p) => p.flush_packet(),
            CodecParser::MpegAudio(p) => p.flush_packet(),
            CodecParser::Lpcm(p) => p.flush_packet(),
            CodecParser::Mpeg2Video(p) => p.flush_packet(),
            CodecParser::H264(p) => p.flush_packet(),
            CodecParser::Hevc(p) => p.flush_packet(),
            CodecParser::Vvc(p) => p.flush_packet(),
            CodecParser::Vc1(p) => p.flush_packet(),
            CodecParser::Pgs(p) => p.flush_packet(),
            CodecParser::DvbSub(p) => p.flush_packet(),
            CodecParser::Srt(p) => p.flush_packet(),
        }
    }

    /// The canonical static codec descriptor this parser currently
    /// reports (some parsers, like DTS, switch between two depending on
    /// what they've detected so far).
    pub fn codec_info(&self) -> &'static CodecInfo {
        match self {
            CodecParser::Dts(p) => p.codec_info(),
            CodecParser::Ac3(p) => p.codec_info(),
            CodecParser::Mlp(p) => p.codec_info(),
            CodecParser::Aac(p) => p.codec_info(),
            CodecParser::MpegAudio(p) => p.codec_info(),
            CodecParser::Lpcm(p) => p.codec_info(),
            CodecParser::Mpeg2Video(p) => p.codec_info(),
            CodecParser::H264(p) => p.codec_info(),
            CodecParser::Hevc(p) => p.codec_info(),
            CodecParser::Vvc(p) => p.codec_info(),
            CodecParser::Vc1(p) => p.codec_info(),
            CodecParser::Pgs(p) => p.codec_info(),
            CodecParser::DvbSub(p) => p.codec_info(),
            CodecParser::Srt(p) => p.codec_info(),
        }
    }

    /// The per-frame duration this parser currently reports, internal
    /// ticks (`0` until the first frame is parsed for variable-rate
    /// codecs).
    pub fn frame_duration(&self) -> i64 {
        match self {
            CodecParser::Dts(p) => p.frame_duration,
            CodecParser::Ac3(p) => p.frame_duration,
            CodecParser::Mlp(p) => p.frame_duration,
            CodecParser::Aac(p) => p.frame_duration,
            CodecParser::MpegAudio(p) => p.frame_duration,
            CodecParser::Lpcm(p) => p.frame_duration,
            CodecParser::Mpeg2Video(p) => p.frame_duration,
            CodecParser::H264(p) => p.frame_duration,
            CodecParser::Hevc(p) => p.frame_duration,
            CodecParser::Vvc(p) => p.frame_duration,
            CodecParser::Vc1(p) => p.frame_duration,
            CodecParser::Pgs(_) | CodecParser::DvbSub(_) | CodecParser::Srt(_) => 0,
        }
    }

    /// Bytes left in this parser's current buffer, unconsumed by any
    /// complete frame yet. [`crate::stream_info::StreamInfo::read`] uses
    /// this to compute how many bytes its `ByteSource` should be told
    /// were consumed since the last block.
    pub fn buffer_remaining(&self) -> usize {
        match self {
            CodecParser::Dts(p) => p.remaining(),
            CodecParser::Ac3(p) => p.remaining(),
            CodecParser::Mlp(p) => p.remaining(),
            CodecParser::Aac(p) => p.remaining(),
            CodecParser::MpegAudio(p) => p.remaining(),
            CodecParser::Lpcm(p) => p.remaining(),
            CodecParser::Mpeg2Video(p) => p.remaining(),
            CodecParser::H264(p) => p.remaining(),
            CodecParser::Hevc(p) => p.remaining(),
            CodecParser::Vvc(p) => p.remaining(),
            CodecParser::Vc1(p) => p.remaining(),
            CodecParser::Pgs(p) => p.remaining(),
            CodecParser::DvbSub(p) => p.remaining(),
            CodecParser::Srt(p) => p.remaining(),
        }
    }

    /// The unconsumed tail itself, as of the last `set_buffer` call.
    /// Read at EOF so the residue can be re-handed to the parser with
    /// `is_eof = true`.
    pub fn buffer_remaining_bytes(&self) -> Bytes {
        match self {
            CodecParser::Dts(p) => p.remaining_bytes(),
            CodecParser::Ac3(p) => p.remaining_bytes(),
            CodecParser::Mlp(p) => p.remaining_bytes(),
            CodecParser::Aac(p) => p.remaining_bytes(),
            CodecParser::MpegAudio(p) => p.remaining_bytes(),
            CodecParser::Lpcm(p) => p.remaining_bytes(),
            CodecParser::Mpeg2Video(p) => p.remaining_bytes(),
            CodecParser::H264(p) => p.remaining_bytes(),
            CodecParser::Hevc(p) => p.remaining_bytes(),
            CodecParser::Vvc(p) => p.remaining_bytes(),
            CodecParser::Vc1(p) => p.remaining_bytes(),
            CodecParser::Pgs(p) => p.remaining_bytes(),
            CodecParser::DvbSub(p) => p.remaining_bytes(),
            CodecParser::Srt(p) => p.remaining_bytes(),
        }
    }

    /// Whether this variant is a Fragmented-policy subtitle parser;
    /// such tracks must use
    /// [`crate::format::DemuxerReadPolicy::Fragmented`] when sourced
    /// from a container.
    pub fn is_fragmented_policy(&self) -> bool {
        matches!(
            self,
            CodecParser::Pgs(_) | CodecParser::DvbSub(_) | CodecParser::Srt(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_stream_rez_recognized_unsupported_is_not_recognized() {
        assert!(!CheckStreamRez::RecognizedUnsupported(&crate::codec_info::AAC_CODEC_INFO)
            .is_recognized());
        assert!(CheckStreamRez::Recognized(&crate::codec_info::AAC_CODEC_INFO).is_recognized());
        assert!(!CheckStreamRez::NotDetected.is_recognized());
    }
}
