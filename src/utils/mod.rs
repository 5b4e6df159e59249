//! # Utility Functions and Types
//!
//! Bit-level bitstream reading (used by every codec parser to pull
//! Exp-Golomb/fixed-width fields out of NAL units and audio headers) and
//! MPEG-2 CRC32 validation (used by the TS demuxer for PSI tables).
//!
//! ```rust
//! use tsmux_demux::utils::BitReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0b10110011u8];
//! let mut reader = BitReader::new(&data);
//! let value = reader.read_bits(3)?; // Reads first 3 bits (101)
//! assert_eq!(value, 0b101);
//! # Ok(())
//! # }
//! ```

/// Bit manipulation and bitstream reading utilities
pub mod bits;

/// CRC calculation implementations
pub mod crc;

/// Annex-B start code scanning shared by the NAL-framed video codecs.
pub mod annexb;

pub use bits::*;
pub use crc::Crc32Mpeg2;
