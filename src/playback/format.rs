//! Binary format definitions for motion time-series containers.

use std::io::{self, Read, Write};

/// Magic bytes identifying a motion time-series container.
pub const CONTAINER_MAGIC: &[u8; 4] = b"MBTS";

/// Current format version.
pub const CONTAINER_VERSION: u16 = 1;

/// Compression type for step records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// No compression.
    #[default]
    None = 0,
    /// LZ4 fast compression.
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }
}

/// Width of stored sample values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    F64,
    F32,
}

impl Precision {
    pub fn value_size(self) -> usize {
        match self {
            Precision::F64 => 8,
            Precision::F32 => 4,
        }
    }
}

/// Container header flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerFlags {
    /// Compression type (lower 4 bits).
    pub compression: CompressionType,
    /// Value precision (bit 4 set = f32).
    pub precision: Precision,
}

impl ContainerFlags {
    pub fn to_u16(self) -> u16 {
        let mut flags = self.compression as u16;
        if self.precision == Precision::F32 {
            flags |= 1 << 4;
        }
        flags
    }

    pub fn from_u16(v: u16) -> io::Result<Self> {
        let compression = CompressionType::from_u8((v & 0x0F) as u8).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown compression type {}", v & 0x0F),
            )
        })?;
        Ok(Self {
            compression,
            precision: if v & (1 << 4) != 0 {
                Precision::F32
            } else {
                Precision::F64
            },
        })
    }
}

/// File header for motion time-series containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Number of series in the series table.
    pub series_count: u32,
    /// Number of time-step records.
    pub step_count: u64,
    /// Container flags.
    pub flags: ContainerFlags,
}

impl ContainerHeader {
    /// Size of header in bytes.
    /// Magic(4) + Version(2) + Flags(2) + SeriesCount(4) + StepCount(8) + Reserved(16) = 36
    pub const SIZE: usize = 36;

    /// Write header to output.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(CONTAINER_MAGIC)?;
        w.write_all(&CONTAINER_VERSION.to_le_bytes())?;
        w.write_all(&self.flags.to_u16().to_le_bytes())?;
        w.write_all(&self.series_count.to_le_bytes())?;
        w.write_all(&self.step_count.to_le_bytes())?;
        // Reserved bytes
        w.write_all(&[0u8; 16])?;
        Ok(())
    }

    /// Read header from input.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != CONTAINER_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid MBTS magic bytes",
            ));
        }

        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf2)?;
        let version = u16::from_le_bytes(buf2);
        if version != CONTAINER_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported MBTS version: {}", version),
            ));
        }

        r.read_exact(&mut buf2)?;
        let flags = ContainerFlags::from_u16(u16::from_le_bytes(buf2))?;

        r.read_exact(&mut buf4)?;
        let series_count = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf8)?;
        let step_count = u64::from_le_bytes(buf8);

        // Skip reserved bytes
        let mut reserved = [0u8; 16];
        r.read_exact(&mut reserved)?;

        Ok(Self {
            series_count,
            step_count,
            flags,
        })
    }
}

/// A named series, e.g. `node.12.X` with 3 components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSpec {
    pub name: String,
    pub width: u16,
}

impl SeriesSpec {
    pub fn new(name: impl Into<String>, width: u16) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }

    /// Split a `<entity_kind>.<int_label>.<field>` name.
    pub fn key(&self) -> Option<(&str, u32, &str)> {
        let mut parts = self.name.splitn(3, '.');
        let kind = parts.next()?;
        let label = parts.next()?.parse().ok()?;
        let field = parts.next()?;
        Some((kind, label, field))
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let name = self.name.as_bytes();
        let len = u16::try_from(name.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "Series name too long")
        })?;
        w.write_all(&len.to_le_bytes())?;
        w.write_all(name)?;
        w.write_all(&self.width.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf2 = [0u8; 2];

        r.read_exact(&mut buf2)?;
        let mut name = vec![0u8; u16::from_le_bytes(buf2) as usize];
        r.read_exact(&mut name)?;
        let name = String::from_utf8(name)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        r.read_exact(&mut buf2)?;
        let width = u16::from_le_bytes(buf2);

        Ok(Self { name, width })
    }
}

/// Encode a step record (time followed by values).
pub fn encode_step(time: f64, values: &[f64], precision: Precision) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + values.len() * precision.value_size());
    bytes.extend_from_slice(&time.to_le_bytes());
    for &v in values {
        match precision {
            Precision::F64 => bytes.extend_from_slice(&v.to_le_bytes()),
            Precision::F32 => bytes.extend_from_slice(&(v as f32).to_le_bytes()),
        }
    }
    bytes
}

/// Decode a step record into its time and values.
pub fn decode_step(bytes: &[u8], output: &mut [f64], precision: Precision) -> io::Result<f64> {
    let size = precision.value_size();
    if bytes.len() != 8 + output.len() * size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Step size mismatch: {} bytes vs {} values",
                bytes.len(),
                output.len()
            ),
        ));
    }

    let (time, data) = bytes.split_at(8);
    let time = f64::from_le_bytes([
        time[0], time[1], time[2], time[3], time[4], time[5], time[6], time[7],
    ]);
    for (v, b) in output.iter_mut().zip(data.chunks_exact(size)) {
        *v = match precision {
            Precision::F64 => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
            Precision::F32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
        };
    }
    Ok(time)
}

/// Compress data using LZ4.
#[cfg(feature = "lz4")]
pub fn compress_lz4(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress LZ4 data.
#[cfg(feature = "lz4")]
pub fn decompress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Fallback when LZ4 is not available. Writers never label such data as LZ4.
#[cfg(not(feature = "lz4"))]
pub fn compress_lz4(data: &[u8]) -> Vec<u8> {
    data.to_vec()
}

#[cfg(not(feature = "lz4"))]
pub fn decompress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "LZ4 support not compiled in (enable the `lz4` feature)",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_roundtrip() {
        let header = ContainerHeader {
            series_count: 6,
            step_count: 1000,
            flags: ContainerFlags {
                compression: CompressionType::Lz4,
                precision: Precision::F32,
            },
        };

        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), ContainerHeader::SIZE);

        let decoded = ContainerHeader::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_bad_magic() {
        let mut buf = vec![0u8; ContainerHeader::SIZE];
        buf[..4].copy_from_slice(b"FLWA");
        let err = ContainerHeader::read_from(&mut Cursor::new(&buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_series_key() {
        let series = SeriesSpec::new("node.12.Phi", 3);
        assert_eq!(series.key(), Some(("node", 12, "Phi")));
        assert_eq!(SeriesSpec::new("node.x.X", 3).key(), None);
        assert_eq!(SeriesSpec::new("time", 1).key(), None);
    }

    #[cfg(not(feature = "lz4"))]
    #[test]
    fn test_lz4_unavailable() {
        let err = decompress_lz4(&compress_lz4(&[1, 2, 3])).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn test_lz4_roundtrip() {
        let data: Vec<u8> = (0..200u8).collect();
        assert_eq!(decompress_lz4(&compress_lz4(&data)).unwrap(), data);
    }

    #[test]
    fn test_step_precision() {
        let values = [0.1, -2.5, 1e-3];
        let bytes = encode_step(0.25, &values, Precision::F32);
        assert_eq!(bytes.len(), 8 + 3 * 4);

        let mut out = [0.0; 3];
        let time = decode_step(&bytes, &mut out, Precision::F32).unwrap();
        assert_eq!(time, 0.25);
        for (a, b) in values.iter().zip(out) {
            assert!((a - b).abs() < 1e-6);
        }

        let mut wrong = [0.0; 4];
        assert!(decode_step(&bytes, &mut wrong, Precision::F32).is_err());
    }
}
