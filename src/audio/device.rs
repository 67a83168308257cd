use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream, StreamConfig};
use log::{debug, error, info, warn};

use crate::audio::buffer::{sample_queue_for_latency, SampleFeed, SampleQueue, StallWatch};
use crate::audio::{PlaybackSink, SinkOpener};
use crate::error::AudioError;
use crate::models::AudioFormat;

const DRAIN_POLL: Duration = Duration::from_millis(5);
const DRAIN_GRACE: Duration = Duration::from_millis(500);

type FaultSlot = Arc<Mutex<Option<String>>>;

/// Map a normalized sample onto cpal's `[-1.0, 1.0)` float range
#[inline]
pub fn normalized_to_f32(sample: i32) -> f32 {
    sample as f32 / 2_147_483_648.0
}

/// Opens [`CpalSink`]s on the preferred output device
pub struct CpalSinkOpener {
    host: Host,
    preferred_device: Option<String>,
    latency_ms: u32,
}

impl CpalSinkOpener {
    pub fn new(preferred_device: Option<String>, latency_ms: u32) -> Self {
        Self {
            host: cpal::default_host(),
            preferred_device,
            latency_ms,
        }
    }

    /// Names of all output devices on the default host
    pub fn list_devices(&self) -> Result<Vec<String>, AudioError> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// The preferred device by name, falling back to the default output
    fn select_device(&self) -> Result<Device, AudioError> {
        if let Some(name) = self.preferred_device.as_deref() {
            let found = self
                .host
                .output_devices()
                .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false));

            match found {
                Some(device) => return Ok(device),
                None => warn!("output device '{}' not found, using default", name),
            }
        }

        self.host.default_output_device().ok_or_else(|| AudioError::DeviceNotFound {
            device: self.preferred_device.clone().unwrap_or_else(|| "default".to_string()),
        })
    }
}

impl SinkOpener for CpalSinkOpener {
    type Sink = CpalSink;

    fn open(&mut self, format: &AudioFormat) -> Result<CpalSink, AudioError> {
        let device = self.select_device()?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get default config: {}", e)))?;

        let sample_format = default_config.sample_format();
        if !matches!(
            sample_format,
            SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16 | SampleFormat::I32
        ) {
            return Err(AudioError::UnsupportedConfig {
                channels: format.num_channels,
                sample_rate: format.sample_rate,
                reason: format!("unsupported device sample format {:?}", sample_format),
            });
        }

        let plan = StreamPlan {
            device,
            config: StreamConfig {
                channels: format.num_channels,
                sample_rate: cpal::SampleRate(format.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            },
            sample_format,
            format: *format,
            latency_ms: self.latency_ms,
        };
        let live = plan.start()?;

        info!(
            "opened '{}' for {} ({} ms ring)",
            device_name,
            format.format_description(),
            self.latency_ms
        );

        Ok(CpalSink {
            plan,
            live,
            channels: format.num_channels as usize,
            scratch: Vec::new(),
            stall: StallWatch::new(Instant::now()),
            underruns: 0,
        })
    }
}

/// Everything needed to (re)build the output stream for one layout
struct StreamPlan {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    format: AudioFormat,
    latency_ms: u32,
}

/// A running stream together with the queue feeding it
struct LiveStream {
    stream: Stream,
    queue: SampleQueue,
    fault: FaultSlot,
}

impl StreamPlan {
    /// Build a fresh queue and stream and start it
    fn start(&self) -> Result<LiveStream, AudioError> {
        let (queue, feed) =
            sample_queue_for_latency(self.latency_ms, self.format.num_channels, self.format.sample_rate);
        let fault: FaultSlot = Arc::new(Mutex::new(None));

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(feed, &fault)?,
            SampleFormat::I16 => self.build_stream::<i16>(feed, &fault)?,
            SampleFormat::U16 => self.build_stream::<u16>(feed, &fault)?,
            _ => self.build_stream::<i32>(feed, &fault)?,
        };

        stream
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;

        Ok(LiveStream { stream, queue, fault })
    }

    fn build_stream<T>(&self, mut feed: SampleFeed, fault: &FaultSlot) -> Result<Stream, AudioError>
    where
        T: cpal::Sample + cpal::SizedSample + Send + 'static,
        T: cpal::FromSample<f32>,
    {
        let fault = Arc::clone(fault);
        let mut scratch: Vec<f32> = Vec::new();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    // Shortfalls come back padded with silence
                    feed.fill(&mut scratch);
                    for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = cpal::Sample::from_sample(sample);
                    }
                },
                move |err| {
                    error!("audio stream error: {}", err);
                    if let Ok(mut slot) = fault.lock() {
                        *slot = Some(err.to_string());
                    }
                },
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))
    }
}

impl LiveStream {
    fn take_fault(&self) -> Option<String> {
        self.fault.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Output stream fed through a lock-free sample queue
pub struct CpalSink {
    plan: StreamPlan,
    live: LiveStream,
    channels: usize,
    scratch: Vec<f32>,
    stall: StallWatch,
    /// Underruns of streams already replaced by a recovery
    underruns: usize,
}

impl CpalSink {
    pub fn underrun_count(&self) -> usize {
        self.underruns + self.live.queue.underrun_count()
    }

    /// How long a full queue may go unconsumed before the stream counts as dead
    fn stall_limit(&self) -> Duration {
        self.live.queue.buffered_duration() + DRAIN_GRACE
    }
}

impl PlaybackSink for CpalSink {
    fn write(&mut self, interleaved: &[i32]) -> Result<usize, AudioError> {
        if let Some(message) = self.live.take_fault() {
            return Err(AudioError::StreamError(message));
        }

        let offered = interleaved.len() / self.channels;
        let frames = offered.min(self.live.queue.available_write_frames());
        let limit = self.stall_limit();
        if self
            .stall
            .is_stalled(self.live.queue.consumed(), frames == 0, limit, Instant::now())
        {
            return Err(AudioError::StreamError(format!(
                "audio device stopped consuming samples for {} ms",
                limit.as_millis()
            )));
        }
        if frames == 0 {
            return Ok(0);
        }

        self.scratch.clear();
        self.scratch.extend(
            interleaved[..frames * self.channels]
                .iter()
                .map(|&s| normalized_to_f32(s)),
        );
        Ok(self.live.queue.push_frames(&self.scratch))
    }

    fn recover(&mut self) -> Result<(), AudioError> {
        if let Err(e) = self.live.stream.pause() {
            debug!("failed to pause broken stream: {}", e);
        }
        // Rebuilding fails when the device itself is gone
        let live = self
            .plan
            .start()
            .map_err(|e| AudioError::RecoveryFailed(format!("Failed to rebuild stream: {}", e)))?;
        let old = std::mem::replace(&mut self.live, live);
        self.underruns += old.queue.underrun_count();
        self.stall = StallWatch::new(Instant::now());
        debug!("audio stream rebuilt");
        Ok(())
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        let deadline = Instant::now() + self.live.queue.buffered_duration() + DRAIN_GRACE;
        while !self.live.queue.is_empty() {
            if let Some(message) = self.live.take_fault() {
                return Err(AudioError::StreamError(message));
            }
            if Instant::now() >= deadline {
                warn!("drain timed out with {} samples queued", self.live.queue.queued());
                break;
            }
            thread::sleep(DRAIN_POLL);
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Err(e) = self.live.stream.pause() {
            debug!("failed to pause stream on close: {}", e);
        }
        let underruns = self.underrun_count();
        if underruns > 0 {
            info!("stream closed after {} buffer underruns", underruns);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_to_f32_range() {
        assert_eq!(normalized_to_f32(0), 0.0);
        assert_eq!(normalized_to_f32(i32::MIN), -1.0);
        assert!(normalized_to_f32(i32::MAX) <= 1.0);
        assert!(normalized_to_f32(i32::MAX) > 0.999);
        assert_eq!(normalized_to_f32(1 << 30), 0.5);
    }

    #[test]
    fn test_opener_keeps_preferences() {
        let opener = CpalSinkOpener::new(Some("Speakers".to_string()), 150);
        assert_eq!(opener.preferred_device.as_deref(), Some("Speakers"));
        assert_eq!(opener.latency_ms, 150);
    }
}
