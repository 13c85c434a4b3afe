use bitflags::bitflags;
use thiserror::Error;

/// Header magic, "PPKT" as a little-endian u32.
pub const PPKT_MAGIC: u32 = 0x544B_5050;

/// Current wire format version.
pub const PPKT_VERSION: u8 = 1;

/// Fixed header length in bytes. The enumerated fields occupy 48 bytes;
/// the trailing 8 are reserved (zero on encode, ignored on parse).
pub const HEADER_LEN: usize = 56;

/// Datagrams above this size are discarded before parsing.
pub const MAX_DATAGRAM: usize = 65_536;

bitflags! {
    /// Frame boundary markers carried in the header flag field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameFlags: u16 {
        /// First packet of a frame.
        const FRAME_START = 1 << 0;
        /// Last packet of a frame.
        const FRAME_END = 1 << 1;
        /// First frame of a (re)started stream; resets iteration
        /// tracking on the receive side.
        const FIRST_FRAME = 1 << 2;
    }
}

/// Payload sample type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Dtype {
    I8 = 0,
    I16 = 1,
    I32 = 2,
    F32 = 3,
    F64 = 4,
    Cf32 = 5,
    Cf64 = 6,
}

impl Dtype {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::I8),
            1 => Some(Self::I16),
            2 => Some(Self::I32),
            3 => Some(Self::F32),
            4 => Some(Self::F64),
            5 => Some(Self::Cf32),
            6 => Some(Self::Cf64),
            _ => None,
        }
    }

    /// Wire bytes per sample.
    pub fn sample_bytes(self) -> usize {
        match self {
            Self::I8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::F64 | Self::Cf32 => 8,
            Self::Cf64 => 16,
        }
    }
}

/// Why a datagram was rejected before reaching the frame state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("datagram of {0} bytes is shorter than the header")]
    TooShort(usize),
    #[error("datagram of {0} bytes exceeds the maximum size")]
    Oversize(usize),
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported version {0}")]
    BadVersion(u8),
    #[error("unknown dtype {0}")]
    BadDtype(u8),
    #[error("payload length {actual} does not match header ({expected})")]
    PayloadMismatch { expected: usize, actual: usize },
}

/// Decoded PPKT datagram header.
///
/// All integers little-endian, floats IEEE 754. `sequence` is
/// per-channel monotonic; `iteration_index` counts samples from the
/// start of the stream and must be contiguous inside a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PpktHeader {
    pub dtype: Dtype,
    pub flags: FrameFlags,
    pub channel_id: u16,
    pub sequence: u32,
    pub sample_count: u32,
    pub payload_bytes: u32,
    pub iteration_index: u64,
    pub timestamp_ns: u64,
    pub sample_rate_hz: f64,
}

impl PpktHeader {
    /// Parses and validates a whole datagram, returning the header and
    /// its payload slice.
    pub fn parse(datagram: &[u8]) -> Result<(Self, &[u8]), HeaderError> {
        if datagram.len() > MAX_DATAGRAM {
            return Err(HeaderError::Oversize(datagram.len()));
        }
        if datagram.len() < HEADER_LEN {
            return Err(HeaderError::TooShort(datagram.len()));
        }

        let magic = u32::from_le_bytes(datagram[0..4].try_into().unwrap());
        if magic != PPKT_MAGIC {
            return Err(HeaderError::BadMagic(magic));
        }
        let version = datagram[4];
        if version != PPKT_VERSION {
            return Err(HeaderError::BadVersion(version));
        }
        let dtype = Dtype::from_u8(datagram[5]).ok_or(HeaderError::BadDtype(datagram[5]))?;
        let flags = FrameFlags::from_bits_truncate(u16::from_le_bytes(
            datagram[6..8].try_into().unwrap(),
        ));
        let channel_id = u16::from_le_bytes(datagram[8..10].try_into().unwrap());
        // bytes 10..12 reserved
        let sequence = u32::from_le_bytes(datagram[12..16].try_into().unwrap());
        let sample_count = u32::from_le_bytes(datagram[16..20].try_into().unwrap());
        let payload_bytes = u32::from_le_bytes(datagram[20..24].try_into().unwrap());
        let iteration_index = u64::from_le_bytes(datagram[24..32].try_into().unwrap());
        let timestamp_ns = u64::from_le_bytes(datagram[32..40].try_into().unwrap());
        let sample_rate_hz = f64::from_le_bytes(datagram[40..48].try_into().unwrap());
        // bytes 48..56 reserved

        let payload = &datagram[HEADER_LEN..];
        let expected = payload_bytes as usize;
        if payload.len() != expected
            || expected != sample_count as usize * dtype.sample_bytes()
        {
            return Err(HeaderError::PayloadMismatch {
                expected,
                actual: payload.len(),
            });
        }

        Ok((
            Self {
                dtype,
                flags,
                channel_id,
                sequence,
                sample_count,
                payload_bytes,
                iteration_index,
                timestamp_ns,
                sample_rate_hz,
            },
            payload,
        ))
    }

    /// Encodes the header followed by `payload` into one datagram.
    /// Used by tests and loopback feeders.
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&PPKT_MAGIC.to_le_bytes());
        buf.push(PPKT_VERSION);
        buf.push(self.dtype as u8);
        buf.extend_from_slice(&self.flags.bits().to_le_bytes());
        buf.extend_from_slice(&self.channel_id.to_le_bytes());
        buf.extend_from_slice(&[0u8; 2]); // reserved
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.sample_count.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.iteration_index.to_le_bytes());
        buf.extend_from_slice(&self.timestamp_ns.to_le_bytes());
        buf.extend_from_slice(&self.sample_rate_hz.to_le_bytes());
        buf.extend_from_slice(&[0u8; 8]); // reserved tail
        buf.extend_from_slice(payload);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(samples: u32, dtype: Dtype) -> PpktHeader {
        PpktHeader {
            dtype,
            flags: FrameFlags::FRAME_START | FrameFlags::FRAME_END,
            channel_id: 3,
            sequence: 42,
            sample_count: samples,
            payload_bytes: samples * dtype.sample_bytes() as u32,
            iteration_index: 1024,
            timestamp_ns: 5_000_000,
            sample_rate_hz: 48_000.0,
        }
    }

    #[test]
    fn test_encode_parse_round_trip() {
        let h = header(4, Dtype::F32);
        let payload: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let datagram = h.encode(&payload);
        assert_eq!(datagram.len(), HEADER_LEN + 16);

        let (parsed, body) = PpktHeader::parse(&datagram).unwrap();
        assert_eq!(parsed, h);
        assert_eq!(body, &payload[..]);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let h = header(0, Dtype::F32);
        let mut datagram = h.encode(&[]);
        datagram[0] ^= 0xff;
        assert!(matches!(
            PpktHeader::parse(&datagram),
            Err(HeaderError::BadMagic(_))
        ));
    }

    #[test]
    fn test_bad_version_rejected() {
        let h = header(0, Dtype::F32);
        let mut datagram = h.encode(&[]);
        datagram[4] = 99;
        assert_eq!(PpktHeader::parse(&datagram), Err(HeaderError::BadVersion(99)));
    }

    #[test]
    fn test_short_datagram_rejected() {
        assert_eq!(
            PpktHeader::parse(&[0u8; 10]),
            Err(HeaderError::TooShort(10))
        );
    }

    #[test]
    fn test_payload_mismatch_rejected() {
        let h = header(4, Dtype::F32);
        let datagram = h.encode(&[0u8; 12]); // 12 bytes, header claims 16
        assert!(matches!(
            PpktHeader::parse(&datagram),
            Err(HeaderError::PayloadMismatch { .. })
        ));
    }

    #[test]
    fn test_oversize_rejected() {
        let datagram = vec![0u8; MAX_DATAGRAM + 1];
        assert!(matches!(
            PpktHeader::parse(&datagram),
            Err(HeaderError::Oversize(_))
        ));
    }
}
