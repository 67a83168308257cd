use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, trace};

use crate::error::WaveError;
use crate::models::AudioFormat;

/// Size of the RIFF container header on disk
pub const RIFF_HEADER_LEN: i64 = 12;
/// Size of the canonical `fmt ` sub-chunk (header + 16-byte body)
pub const FMT_CHUNK_LEN: i64 = 24;

const FMT_BODY_LEN: u32 = 16;
const CHUNK_HEADER_LEN: usize = 8;

/// `RIFF <size> WAVE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiffHeader {
    pub chunk_size: u32,
}

/// The `fmt ` sub-chunk as stored in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmtChunk {
    pub chunk_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub byte_align: u16,
    pub bits_per_sample: u16,
}

/// The `data` sub-chunk; `payload` is only present when it was read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    pub size: u32,
    pub payload: Option<Vec<u8>>,
}

/// How far to go once the fixed headers are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRead {
    /// Stop after the fixed headers
    Skip,
    /// Locate the data chunk and report its size only
    SizeOnly,
    /// Locate the data chunk and read the whole payload
    Full,
}

/// Which parts of the file the caller wants materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub riff: bool,
    pub fmt: bool,
    pub data: DataRead,
}

impl ParseOptions {
    /// Everything, including the PCM payload
    pub fn full() -> Self {
        Self {
            riff: true,
            fmt: true,
            data: DataRead::Full,
        }
    }

    /// Headers plus the data size, enough to compute a duration
    pub fn metadata() -> Self {
        Self {
            riff: true,
            fmt: true,
            data: DataRead::SizeOnly,
        }
    }
}

/// Result of a parse; parts that were not requested are `None`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WaveFile {
    pub riff: Option<RiffHeader>,
    pub fmt: Option<FmtChunk>,
    pub data: Option<DataChunk>,
}

impl WaveFile {
    pub fn format(&self) -> Option<AudioFormat> {
        self.fmt.as_ref().map(AudioFormat::from)
    }

    pub fn data_size(&self) -> Option<u32> {
        self.data.as_ref().map(|d| d.size)
    }

    /// Take the PCM payload out of the parse result
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        self.data.as_mut().and_then(|d| d.payload.take())
    }
}

/// RIFF/WAVE reader over any seekable byte source
pub struct WaveReader;

impl WaveReader {
    /// Parse a WAV file from disk
    pub fn open<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<WaveFile, WaveError> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        Self::read(&mut reader, options)
    }

    /// Parse the fixed RIFF and fmt headers, then walk chunks until `data`.
    ///
    /// The RIFF header and the fmt sub-chunk sit at fixed offsets; when a part is
    /// not requested it is skipped with a seek. Every chunk between `fmt ` and
    /// `data` is skipped by exactly its declared size.
    pub fn read<R: Read + Seek>(source: &mut R, options: ParseOptions) -> Result<WaveFile, WaveError> {
        let mut result = WaveFile::default();

        if options.riff {
            result.riff = Some(Self::read_riff_header(source)?);
        } else {
            source.seek(SeekFrom::Current(RIFF_HEADER_LEN))?;
        }

        if options.fmt {
            let fmt = Self::read_fmt_chunk(source)?;
            if fmt.chunk_size > FMT_BODY_LEN {
                // 18-byte and extensible fmt bodies carry extra fields we don't use
                source.seek(SeekFrom::Current(i64::from(fmt.chunk_size - FMT_BODY_LEN)))?;
            }
            result.fmt = Some(fmt);
        } else {
            source.seek(SeekFrom::Current(FMT_CHUNK_LEN))?;
        }

        if options.data != DataRead::Skip {
            result.data = Some(Self::read_data_chunk(source, options.data)?);
        }

        Ok(result)
    }

    fn read_riff_header<R: Read>(source: &mut R) -> Result<RiffHeader, WaveError> {
        let mut raw = [0u8; RIFF_HEADER_LEN as usize];
        let n = read_fully(source, &mut raw)?;
        if n < raw.len() {
            return Err(WaveError::MalformedHeader(format!(
                "RIFF header is {} bytes, expected {}",
                n,
                raw.len()
            )));
        }

        if &raw[0..4] != b"RIFF" || &raw[8..12] != b"WAVE" {
            return Err(WaveError::MalformedHeader("missing RIFF/WAVE signature".to_string()));
        }

        Ok(RiffHeader {
            chunk_size: le_u32(&raw[4..8]),
        })
    }

    fn read_fmt_chunk<R: Read>(source: &mut R) -> Result<FmtChunk, WaveError> {
        let mut raw = [0u8; FMT_CHUNK_LEN as usize];
        let n = read_fully(source, &mut raw)?;
        if n < raw.len() {
            return Err(WaveError::MalformedHeader(format!(
                "fmt chunk is {} bytes, expected {}",
                n,
                raw.len()
            )));
        }

        if &raw[0..4] != b"fmt " {
            return Err(WaveError::MalformedHeader("fmt chunk not found after RIFF header".to_string()));
        }

        let fmt = FmtChunk {
            chunk_size: le_u32(&raw[4..8]),
            audio_format: le_u16(&raw[8..10]),
            num_channels: le_u16(&raw[10..12]),
            sample_rate: le_u32(&raw[12..16]),
            byte_rate: le_u32(&raw[16..20]),
            byte_align: le_u16(&raw[20..22]),
            bits_per_sample: le_u16(&raw[22..24]),
        };

        if !matches!(fmt.bits_per_sample, 8 | 16 | 24) {
            return Err(WaveError::UnsupportedFormat {
                bits_per_sample: fmt.bits_per_sample,
            });
        }
        if fmt.num_channels == 0 {
            return Err(WaveError::MalformedHeader("fmt chunk declares zero channels".to_string()));
        }

        trace!("fmt chunk: {:?}", fmt);
        Ok(fmt)
    }

    fn read_data_chunk<R: Read + Seek>(source: &mut R, mode: DataRead) -> Result<DataChunk, WaveError> {
        let mut header = [0u8; CHUNK_HEADER_LEN];

        loop {
            if read_fully(source, &mut header)? < CHUNK_HEADER_LEN {
                return Err(WaveError::NoDataChunk);
            }

            let size = le_u32(&header[4..8]);

            if &header[0..4] != b"data" {
                debug!(
                    "skipping '{}' chunk ({} bytes)",
                    String::from_utf8_lossy(&header[0..4]),
                    size
                );
                source.seek(SeekFrom::Current(i64::from(size)))?;
                continue;
            }

            if mode != DataRead::Full {
                return Ok(DataChunk { size, payload: None });
            }

            let available = remaining_len(source)?;
            if u64::from(size) > available {
                return Err(WaveError::TruncatedData {
                    declared: size,
                    available,
                });
            }

            let len = size as usize;
            let mut payload = Vec::new();
            payload
                .try_reserve_exact(len)
                .map_err(|_| WaveError::OutOfMemory { bytes: len })?;
            source.take(u64::from(size)).read_to_end(&mut payload)?;

            if payload.len() < len {
                return Err(WaveError::TruncatedData {
                    declared: size,
                    available: payload.len() as u64,
                });
            }

            return Ok(DataChunk {
                size,
                payload: Some(payload),
            });
        }
    }
}

/// Read until `buf` is full or the source is exhausted; returns bytes read
fn read_fully<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize, WaveError> {
    let mut total = 0;
    while total < buf.len() {
        match source.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(WaveError::Io(e)),
        }
    }
    Ok(total)
}

fn remaining_len<S: Seek>(source: &mut S) -> Result<u64, WaveError> {
    let pos = source.stream_position()?;
    let end = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(pos))?;
    Ok(end.saturating_sub(pos))
}

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::fixtures::WavBuilder;
    use std::io::Cursor;

    fn parse(bytes: Vec<u8>, options: ParseOptions) -> Result<WaveFile, WaveError> {
        WaveReader::read(&mut Cursor::new(bytes), options)
    }

    #[test]
    fn test_parse_canonical_file() {
        let bytes = WavBuilder::new(2, 44100, 16).data(vec![1, 2, 3, 4, 5, 6, 7, 8]).build();
        let wave = parse(bytes, ParseOptions::full()).unwrap();

        let riff = wave.riff.unwrap();
        assert_eq!(riff.chunk_size, 36 + 8);

        let fmt = wave.fmt.unwrap();
        assert_eq!(fmt.audio_format, 1);
        assert_eq!(fmt.num_channels, 2);
        assert_eq!(fmt.sample_rate, 44100);
        assert_eq!(fmt.byte_rate, 176_400);
        assert_eq!(fmt.byte_align, 4);
        assert_eq!(fmt.bits_per_sample, 16);

        let data = wave.data.unwrap();
        assert_eq!(data.size, 8);
        assert_eq!(data.payload, Some(vec![1, 2, 3, 4, 5, 6, 7, 8]));
    }

    #[test]
    fn test_skippable_chunks_do_not_change_payload() {
        let payload: Vec<u8> = (0..64u8).collect();
        let plain = WavBuilder::new(1, 8000, 8).data(payload.clone()).build();
        let expected = parse(plain, ParseOptions::full()).unwrap().data.unwrap().payload;

        for extra in 1..4 {
            let mut builder = WavBuilder::new(1, 8000, 8).data(payload.clone());
            for i in 0..extra {
                builder = builder.chunk(b"LIST", vec![0xAA; 3 + i * 7]);
            }
            let wave = parse(builder.build(), ParseOptions::full()).unwrap();
            assert_eq!(wave.data.unwrap().payload, expected, "{} extra chunks", extra);
        }
    }

    #[test]
    fn test_extended_fmt_body_is_skipped() {
        let bytes = WavBuilder::new(1, 22050, 16)
            .fmt_extra(vec![0, 0])
            .chunk(b"fact", vec![0; 4])
            .data(vec![9, 9])
            .build();
        let wave = parse(bytes, ParseOptions::full()).unwrap();
        assert_eq!(wave.fmt.unwrap().chunk_size, 18);
        assert_eq!(wave.data.unwrap().payload, Some(vec![9, 9]));
    }

    #[test]
    fn test_unrequested_parts_are_absent() {
        let bytes = WavBuilder::new(1, 8000, 8).data(vec![128; 10]).build();

        let wave = parse(
            bytes.clone(),
            ParseOptions {
                riff: false,
                fmt: true,
                data: DataRead::Skip,
            },
        )
        .unwrap();
        assert!(wave.riff.is_none());
        assert!(wave.fmt.is_some());
        assert!(wave.data.is_none());

        let wave = parse(
            bytes,
            ParseOptions {
                riff: false,
                fmt: false,
                data: DataRead::Full,
            },
        )
        .unwrap();
        assert!(wave.riff.is_none());
        assert!(wave.fmt.is_none());
        assert_eq!(wave.data.unwrap().payload, Some(vec![128; 10]));
    }

    #[test]
    fn test_size_only_does_not_materialize_payload() {
        let bytes = WavBuilder::new(1, 44100, 16).data(vec![0; 88200]).build();
        let wave = parse(bytes, ParseOptions::metadata()).unwrap();
        assert_eq!(wave.data_size(), Some(88200));
        assert!(wave.data.unwrap().payload.is_none());
    }

    #[test]
    fn test_short_riff_header_is_malformed() {
        let result = parse(b"RIFF\x10\x00".to_vec(), ParseOptions::full());
        assert!(matches!(result, Err(WaveError::MalformedHeader(_))));
    }

    #[test]
    fn test_short_fmt_chunk_is_malformed() {
        let mut bytes = WavBuilder::new(1, 8000, 8).build();
        bytes.truncate(20);
        let result = parse(bytes, ParseOptions::full());
        assert!(matches!(result, Err(WaveError::MalformedHeader(_))));
    }

    #[test]
    fn test_wrong_signature_is_malformed() {
        let mut bytes = WavBuilder::new(1, 8000, 8).data(vec![0; 4]).build();
        bytes[8..12].copy_from_slice(b"AVI ");
        let result = parse(bytes, ParseOptions::full());
        assert!(matches!(result, Err(WaveError::MalformedHeader(_))));
    }

    #[test]
    fn test_unsupported_bit_depths() {
        for bits in [4u16, 12, 32] {
            let bytes = WavBuilder::new(2, 44100, bits).data(vec![0; 16]).build();
            match parse(bytes, ParseOptions::full()) {
                Err(WaveError::UnsupportedFormat { bits_per_sample }) => {
                    assert_eq!(bits_per_sample, bits)
                }
                other => panic!("expected UnsupportedFormat for {} bits, got {:?}", bits, other),
            }
        }
    }

    #[test]
    fn test_missing_data_chunk() {
        let bytes = WavBuilder::new(1, 8000, 8).chunk(b"LIST", vec![1, 2, 3, 4]).without_data().build();
        let result = parse(bytes, ParseOptions::full());
        assert!(matches!(result, Err(WaveError::NoDataChunk)));
    }

    #[test]
    fn test_chunk_skipping_past_end_reports_no_data() {
        let mut bytes = WavBuilder::new(1, 8000, 8).without_data().build();
        bytes.extend_from_slice(b"junk");
        bytes.extend_from_slice(&1_000_000u32.to_le_bytes());
        let result = parse(bytes, ParseOptions::full());
        assert!(matches!(result, Err(WaveError::NoDataChunk)));
    }

    #[test]
    fn test_truncated_data_chunk() {
        let bytes = WavBuilder::new(1, 8000, 8)
            .data(vec![0; 100])
            .declared_data_size(4000)
            .build();
        match parse(bytes, ParseOptions::full()) {
            Err(WaveError::TruncatedData { declared, available }) => {
                assert_eq!(declared, 4000);
                assert_eq!(available, 100);
            }
            other => panic!("expected TruncatedData, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_data_is_fine_for_metadata() {
        let bytes = WavBuilder::new(1, 8000, 8)
            .data(vec![0; 100])
            .declared_data_size(4000)
            .build();
        let wave = parse(bytes, ParseOptions::metadata()).unwrap();
        assert_eq!(wave.data_size(), Some(4000));
    }

    #[test]
    fn test_open_nonexistent_file() {
        let result = WaveReader::open("/nonexistent/file.wav", ParseOptions::full());
        assert!(matches!(result, Err(WaveError::Io(_))));
    }

    #[test]
    fn test_take_payload_and_format() {
        let bytes = WavBuilder::new(2, 48000, 24).data(vec![0; 12]).build();
        let mut wave = parse(bytes, ParseOptions::full()).unwrap();
        let format = wave.format().unwrap();
        assert_eq!(format, AudioFormat::new(2, 48000, 24));
        assert_eq!(wave.take_payload().map(|p| p.len()), Some(12));
        assert!(wave.take_payload().is_none());
    }
}
