//! # Autodetector
//!
//! Two ways to get a parser: given a manifest-declared codec name, builds
//! the matching [`CodecParser`] directly; given only a raw buffer (no
//! declared codec, or a container that can't map its stream type),
//! probes every codec's `check_stream` in a fixed priority order — video
//! first, then audio, then subtitle — and returns the first match.
//! LPCM has no self-describing sync pattern and can
//! only be selected by program name or container stream-type mapping,
//! never by raw-buffer probing.

use crate::codec::ac3::Ac3Parser;
use crate::codec::aac::AacParser;
use crate::codec::dts::DtsParser;
use crate::codec::dvbsub::DvbSubParser;
use crate::codec::h264::H264Parser;
use crate::codec::hevc::HevcParser;
use crate::codec::lpcm::LpcmParser;
use crate::codec::mlp::MlpParser;
use crate::codec::mpeg2_video::Mpeg2VideoParser;
use crate::codec::mpeg_audio::MpegAudioParser;
use crate::codec::pgs::PgsParser;
use crate::codec::srt::SrtParser;
use crate::codec::vc1::Vc1Parser;
use crate::codec::vvc::VvcParser;
use crate::codec::{CheckStreamRez, CodecParser, ContainerHint};
use crate::codec_info::CodecInfo;

/// Builds the parser instance matching a manifest `codec` field (already
/// upper-cased by [`crate::manifest::parse`]). Returns `None` for an
/// unrecognized program name.
pub fn by_program_name(name: &str) -> Option<CodecParser> {
    Some(match name {
        "A_DTS" | "A_DTS/HD" => CodecParser::Dts(DtsParser::new()),
        "A_AC3" | "A_AC3/EAC3" => CodecParser::Ac3(Ac3Parser::new()),
        "A_MLP" | "A_MLP/TRUEHD" => CodecParser::Mlp(MlpParser::new()),
        "A_AAC" => CodecParser::Aac(AacParser::new()),
        "A_MP3" => CodecParser::MpegAudio(MpegAudioParser::new()),
        "A_LPCM" => CodecParser::Lpcm(LpcmParser::new()),
        "V_MPEG-2" => CodecParser::Mpeg2Video(Mpeg2VideoParser::new()),
        "V_MPEG4/ISO/AVC" => CodecParser::H264(H264Parser::new()),
        "V_MPEG4/ISO/MVC" => CodecParser::H264(H264Parser::for_dependent_view()),
        "V_MPEGH/ISO/HEVC" => CodecParser::Hevc(HevcParser::new()),
        "V_MPEGI/ISO/VVC" => CodecParser::Vvc(VvcParser::new()),
        "V_MS/VFW/WVC1" => CodecParser::Vc1(Vc1Parser::new()),
        "S_HDMV/PGS" => CodecParser::Pgs(PgsParser::new()),
        "S_SUP" => CodecParser::DvbSub(DvbSubParser::new()),
        "S_TEXT/UTF8" => CodecParser::Srt(SrtParser::new()),
        _ => return None,
    })
}

/// Probes `buf` against every supported codec's `check_stream` in the
/// fixed priority order PGS, SRT, LPCM, H.264, DTS, AC-3, MLP, AAC, VC-1,
/// HEVC, VVC, MPEG-2 video, MPEG audio, DVB subtitle, returning the first
/// recognized match. Order matters: PGS and SRT have unambiguous headers
/// and are tried first so a buffer that happens to satisfy a later,
/// looser probe (e.g. a DTS core sync appearing at some offset inside a
/// PGS segment) is still classified by its real family; MPEG audio is
/// tried last because its sync is the most permissive. LPCM has no
/// self-describing sync and never matches here — it is listed for
/// parity with the fixed order, selectable only by program name.
pub fn detect(buf: &[u8], hint: ContainerHint) -> Option<(CodecParser, CheckStreamRez)> {
    macro_rules! try_codec {
        ($parser:ty, $variant:path) => {{
            let rez = <$parser>::check_stream(buf, hint);
            if rez.is_recognized() {
                return Some(($variant(<$parser>::new()), rez));
            }
        }};
    }

    try_codec!(PgsParser, CodecParser::Pgs);
    try_codec!(SrtParser, CodecParser::Srt);
    try_codec!(LpcmParser, CodecParser::Lpcm);
    try_codec!(H264Parser, CodecParser::H264);
    try_codec!(DtsParser, CodecParser::Dts);
    try_codec!(Ac3Parser, CodecParser::Ac3);
    try_codec!(MlpParser, CodecParser::Mlp);
    try_codec!(AacParser, CodecParser::Aac);
    try_codec!(Vc1Parser, CodecParser::Vc1);
    try_codec!(HevcParser, CodecParser::Hevc);
    try_codec!(VvcParser, CodecParser::Vvc);
    try_codec!(Mpeg2VideoParser, CodecParser::Mpeg2Video);
    try_codec!(MpegAudioParser, CodecParser::MpegAudio);
    try_codec!(DvbSubParser, CodecParser::DvbSub);

    None
}

/// The static [`CodecInfo`] a codec program name resolves to, without
/// constructing a parser; used for container stream-type-to-codec
/// mapping diagnostics.
pub fn codec_info_for_program_name(name: &str) -> Option<&'static CodecInfo> {
    by_program_name(name).map(|p| p.codec_info())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_program_name_resolves_known_codecs() {
        assert!(matches!(by_program_name("A_DTS"), Some(CodecParser::Dts(_))));
        assert!(matches!(
            by_program_name("V_MPEG4/ISO/MVC"),
            Some(CodecParser::H264(_))
        ));
        assert!(by_program_name("X_UNKNOWN").is_none());
    }

    #[test]
    fn detect_recognizes_hevc_over_generic_bytes() {
        let mut data = vec![0x00, 0x00, 0x01];
        data.push((33u8 << 1) & 0xFE); // NAL_SPS
        data.push(0x01);
        data.extend_from_slice(&[0u8; 8]);
        let (_parser, rez) = detect(&data, ContainerHint::Raw).expect("expected a match");
        assert!(rez.is_recognized());
    }

    #[test]
    fn detect_returns_none_for_unrecognizable_bytes() {
        assert!(detect(&[0u8; 16], ContainerHint::Raw).is_none());
    }

    #[test]
    fn pgs_header_wins_over_a_trailing_dts_sync() {
        // A PGS segment header ("PG" magic) followed by a DTS core sync
        // word later in the same buffer must still classify as PGS: PGS
        // is tried before DTS in the fixed probe order.
        let mut data = vec![b'P', b'G', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&[0x7F, 0xFE, 0x80, 0x01, 0, 0, 0, 0]);
        let (parser, _rez) = detect(&data, ContainerHint::Raw).expect("expected a match");
        assert!(matches!(parser, CodecParser::Pgs(_)));
    }
}
