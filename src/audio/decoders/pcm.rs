use crate::error::ConvertError;
use crate::models::AudioFormat;

/// Interleaved samples normalized to MSB-aligned 32-bit signed integers.
///
/// `samples.len()` is always a whole number of frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBuffer {
    samples: Vec<i32>,
    channels: u16,
}

impl NormalizedBuffer {
    /// Wrap interleaved samples; a trailing partial frame is dropped
    pub fn new(mut samples: Vec<i32>, channels: u16) -> Result<Self, ConvertError> {
        if channels == 0 {
            return Err(ConvertError::NoChannels);
        }
        let whole = samples.len() / channels as usize * channels as usize;
        samples.truncate(whole);
        Ok(Self { samples, channels })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Interleaved samples for `count` frames starting at frame `start`,
    /// clamped to the end of the buffer
    pub fn frames(&self, start: usize, count: usize) -> &[i32] {
        let channels = self.channels as usize;
        let begin = (start * channels).min(self.samples.len());
        let end = (start.saturating_add(count) * channels).min(self.samples.len());
        &self.samples[begin..end]
    }
}

/// Converts raw PCM into [`NormalizedBuffer`]s and applies gain
pub struct SampleConverter;

impl SampleConverter {
    /// Convert little-endian PCM of the given format.
    ///
    /// 8-bit input is unsigned and rebased around zero, 16 and 24-bit input is
    /// signed. Every width ends up in the top bits of an `i32`, so full scale
    /// is the same for all of them.
    pub fn convert(raw: &[u8], format: &AudioFormat) -> Result<NormalizedBuffer, ConvertError> {
        let bytes_per_sample = match format.bits_per_sample {
            8 | 16 | 24 => format.bytes_per_sample(),
            bits => return Err(ConvertError::UnsupportedBitDepth { bits }),
        };
        if format.num_channels == 0 {
            return Err(ConvertError::NoChannels);
        }

        let frame_size = format.bytes_per_frame();
        let frame_count = raw.len() / frame_size;
        let sample_count = frame_count * format.num_channels as usize;

        let mut samples = Vec::new();
        samples
            .try_reserve_exact(sample_count)
            .map_err(|_| ConvertError::OutOfMemory {
                samples: sample_count,
            })?;

        let raw = &raw[..frame_count * frame_size];
        match bytes_per_sample {
            1 => samples.extend(raw.iter().map(|&b| (i32::from(b) - 128) << 24)),
            2 => samples.extend(
                raw.chunks_exact(2)
                    .map(|b| i32::from(i16::from_le_bytes([b[0], b[1]])) << 16),
            ),
            // Placing the three bytes above a zero byte sign-extends bit 23 and
            // shifts left by 8 in one step.
            _ => samples.extend(raw.chunks_exact(3).map(|b| i32::from_le_bytes([0, b[0], b[1], b[2]]))),
        }

        Ok(NormalizedBuffer {
            samples,
            channels: format.num_channels,
        })
    }

    /// Scale every sample by `gain`, saturating at the `i32` limits
    pub fn apply_gain(buffer: &mut NormalizedBuffer, gain: f32) {
        if gain == 1.0 {
            return;
        }

        let gain = f64::from(gain);
        for sample in buffer.samples.iter_mut() {
            let scaled = (f64::from(*sample) * gain) as i64;
            *sample = scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        }
    }
}
