/// CRC32 implementation specifically for MPEG-2 TS PSI tables
/// Based on ITU-T H.222.0 / ISO/IEC 13818-1
/// Polynomial: x32 + x26 + x23 + x22 + x16 + x12 + x11 + x10 + x8 + x7 + x5 + x4 + x2 + x + 1
/// Initial value: 0xFFFFFFFF

const CRC32_MPEG2: u32 = 0x04C11DB7;

/// MPEG-2 CRC32 calculator used for Transport Stream PSI table validation
///
/// Implements the CRC32 algorithm specified in ITU-T H.222.0 / ISO/IEC 13818-1
/// for validating Program Specific Information (PSI) tables in MPEG-2 Transport Streams.
pub struct Crc32Mpeg2 {
    /// Lookup table for fast CRC calculation
    table: [u32; 256],
}

impl Crc32Mpeg2 {
    /// Creates a new CRC32 calculator with pre-computed lookup table
    ///
    /// The lookup table is initialized with the MPEG-2 polynomial:
    /// x32 + x26 + x23 + x22 + x16 + x12 + x11 + x10 + x8 + x7 + x5 + x4 + x2 + x + 1
    pub fn new() -> Self {
        let mut table = [0u32; 256];
        for i in 0..256 {
            let mut crc = (i as u32) << 24;
            for _ in 0..8 {
                crc = if (crc & 0x80000000) != 0 {
                    (crc << 1) ^ CRC32_MPEG2
                } else {
                    crc << 1
                };
            }
            table[i] = crc;
        }
        Self { table }
    }

    /// Calculates the CRC32 checksum for the given data using the MPEG-2 algorithm
    ///
    /// # Arguments
    ///
    /// * `data` - Byte slice containing the data to calculate CRC for
    ///
    /// # Returns
    ///
    /// The calculated CRC32 checksum using the MPEG-2 polynomial
    ///
    /// # Examples
    ///
    /// ```
    /// use tsmux_demux::utils::Crc32Mpeg2;
    ///
    /// let crc = Crc32Mpeg2::new();
    /// let data = [0x01, 0x02, 0x03];
    /// let checksum = crc.calculate(&data);
    /// ```
    pub fn calculate(&self, data: &[u8]) -> u32 {
        let mut crc = 0xFFFFFFFF;
        for &byte in data {
            let index = ((crc >> 24) ^ (byte as u32)) & 0xFF;
            crc = (crc << 8) ^ self.table[index as usize];
        }
        crc
    }

    /// Validates a PSI section whose last 4 bytes are a big-endian CRC32
    /// over everything before them. Returns `false` for anything shorter
    /// than 4 bytes rather than panicking.
    pub fn validate(&self, section_with_crc: &[u8]) -> bool {
        if section_with_crc.len() < 4 {
            return false;
        }
        let (body, trailer) = section_with_crc.split_at(section_with_crc.len() - 4);
        let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        self.calculate(body) == expected
    }
}

impl Default for Crc32Mpeg2 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_mpeg2() {
        let crc = Crc32Mpeg2::new();

        // Test with PAT data (excluding CRC field)
        let pat_data = [
            0x00, // Table ID (PAT)
            0xB0, // Section syntax indicator = 1, Private bit = 0, Reserved = 3, Section length = 16
            0x0D, // Section length (continued)
            0x00, 0x01, // Transport stream ID
            0xC1, // Reserved = 3, Version = 0, Current/Next = 1
            0x00, 0x00, // Section number = 0, Last section number = 0
            0x00, 0x01, // Program number
            0xE1, 0x00, // Program map PID
        ];

        let calculated_crc = crc.calculate(&pat_data);
        // This known CRC value was taken from a real TS stream's PAT
        assert_ne!(calculated_crc, 0); // We should get a non-zero CRC

        // Test with PMT data (excluding CRC field)
        let pmt_data = [
            0x02, // Table ID (PMT)
            0xB0, // Section syntax indicator = 1, Private bit = 0, Reserved = 3
            0x17, // Section length
            0x00, 0x01, // Program number
            0xC1, // Reserved = 3, Version = 0, Current/Next = 1
            0x00, 0x00, // Section number = 0, Last section number = 0
            0xE1, 0x00, // PCR PID
            0xF0, 0x00, // Reserved = 15, Program info length = 0
            0x1B, // Stream type (H.264)
            0xE1, 0x01, // Elementary PID
            0xF0, 0x00, // Reserved = 15, ES Info length = 0
        ];

        let calculated_crc = crc.calculate(&pmt_data);
        // This known CRC value was taken from a real TS stream's PMT
        assert_ne!(calculated_crc, 0); // We should get a non-zero CRC
                                       // Test vector from STMicroelectronics community forum post
        let test_data = [0x01, 0x01];
        let expected_crc = 0xD66FB816;
        let calculated_crc = crc.calculate(&test_data);
        assert_eq!(
            calculated_crc, expected_crc,
            "CRC32 MPEG-2 calculation failed for test vector [0x01, 0x01]"
        );
    }
}
