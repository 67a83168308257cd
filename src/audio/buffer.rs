use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Counters the device callback publishes to the player loop
#[derive(Debug, Default)]
struct FeedCounters {
    underruns: AtomicUsize,
    consumed: AtomicU64,
}

/// Player side of a lock-free sample queue.
///
/// Pushes only ever store whole frames, so the device callback never sees a
/// frame split across two callbacks.
pub struct SampleQueue {
    producer: HeapProd<f32>,
    channels: usize,
    sample_rate: u32,
    counters: Arc<FeedCounters>,
}

/// Device side of a [`SampleQueue`], moved into the output callback
pub struct SampleFeed {
    consumer: HeapCons<f32>,
    counters: Arc<FeedCounters>,
}

/// Split queue holding `capacity_frames` frames of interleaved audio
pub fn sample_queue(capacity_frames: usize, channels: u16, sample_rate: u32) -> (SampleQueue, SampleFeed) {
    let channels = channels.max(1) as usize;
    let ring = HeapRb::<f32>::new(capacity_frames.max(1) * channels);
    let (producer, consumer) = ring.split();
    let counters = Arc::new(FeedCounters::default());

    (
        SampleQueue {
            producer,
            channels,
            sample_rate,
            counters: Arc::clone(&counters),
        },
        SampleFeed { consumer, counters },
    )
}

/// Queue sized to hold `latency_ms` of audio
pub fn sample_queue_for_latency(latency_ms: u32, channels: u16, sample_rate: u32) -> (SampleQueue, SampleFeed) {
    let frames = (u64::from(sample_rate) * u64::from(latency_ms) / 1000) as usize;
    sample_queue(frames, channels, sample_rate)
}

impl SampleQueue {
    /// Capacity in samples
    pub fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }

    /// Samples currently queued
    pub fn queued(&self) -> usize {
        self.producer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.producer.is_empty()
    }

    pub fn available_write_frames(&self) -> usize {
        self.producer.vacant_len() / self.channels
    }

    /// Append as many whole frames of `data` as fit.
    /// Returns the number of frames actually written.
    pub fn push_frames(&mut self, data: &[f32]) -> usize {
        let frames = (data.len() / self.channels).min(self.available_write_frames());
        let pushed = self.producer.push_slice(&data[..frames * self.channels]);
        pushed / self.channels
    }

    /// Duration of audio currently queued
    pub fn buffered_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.queued() / self.channels;
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Total samples the device has taken off the queue
    pub fn consumed(&self) -> u64 {
        self.counters.consumed.load(Ordering::Relaxed)
    }

    /// Number of device callbacks that found fewer samples than requested
    pub fn underrun_count(&self) -> usize {
        self.counters.underruns.load(Ordering::Relaxed)
    }
}

impl SampleFeed {
    /// Pop up to `out.len()` samples into `out`, filling the rest with silence.
    /// Returns the number of real samples read.
    pub fn fill(&mut self, out: &mut [f32]) -> usize {
        let read = self.consumer.pop_slice(out);
        if read < out.len() {
            out[read..].fill(0.0);
            self.counters.underruns.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.consumed.fetch_add(read as u64, Ordering::Relaxed);
        read
    }
}

/// Notices when a full queue stops being consumed.
///
/// The device callback is the only thing that makes room in the queue; if it
/// stops running (device unplugged, stream dead) writes would otherwise
/// return zero frames forever.
#[derive(Debug)]
pub struct StallWatch {
    last_consumed: u64,
    last_progress: Instant,
}

impl StallWatch {
    pub fn new(now: Instant) -> Self {
        Self {
            last_consumed: 0,
            last_progress: now,
        }
    }

    /// Record the consumer's position and report whether it has been stuck
    /// for longer than `limit` while the queue was full
    pub fn is_stalled(&mut self, consumed: u64, queue_full: bool, limit: Duration, now: Instant) -> bool {
        if consumed != self.last_consumed || !queue_full {
            self.last_consumed = consumed;
            self.last_progress = now;
            return false;
        }
        now.saturating_duration_since(self.last_progress) > limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_queue_creation() {
        let (queue, _feed) = sample_queue(1024, 2, 44100);

        assert_eq!(queue.capacity(), 2048);
        assert!(queue.is_empty());
        assert_eq!(queue.available_write_frames(), 1024);
    }

    #[test]
    fn test_latency_sizes_capacity() {
        let (queue, _feed) = sample_queue_for_latency(200, 2, 48000);
        assert_eq!(queue.available_write_frames(), 9600);
    }

    #[test]
    fn test_push_then_fill() {
        let (mut queue, mut feed) = sample_queue(100, 2, 44100);
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        assert_eq!(queue.push_frames(&data), 3);
        assert_eq!(queue.queued(), 6);

        let mut out = vec![0.0; 6];
        assert_eq!(feed.fill(&mut out), 6);
        assert_eq!(out, data);
        assert!(queue.is_empty());
        assert_eq!(queue.consumed(), 6);
        assert_eq!(queue.underrun_count(), 0);
    }

    #[test]
    fn test_partial_push_when_full() {
        let (mut queue, _feed) = sample_queue(4, 2, 44100);
        let data = vec![0.5; 12];

        assert_eq!(queue.push_frames(&data), 4);
        assert_eq!(queue.available_write_frames(), 0);
        assert_eq!(queue.push_frames(&data), 0);
    }

    #[test]
    fn test_partial_frames_are_not_pushed() {
        let (mut queue, _feed) = sample_queue(10, 2, 44100);
        assert_eq!(queue.push_frames(&[1.0, 2.0, 3.0]), 1);
        assert_eq!(queue.queued(), 2);
    }

    #[test]
    fn test_underrun_fills_silence() {
        let (mut queue, mut feed) = sample_queue(10, 1, 44100);
        queue.push_frames(&[0.25, 0.5]);

        let mut out = vec![9.0; 4];
        assert_eq!(feed.fill(&mut out), 2);
        assert_eq!(out, vec![0.25, 0.5, 0.0, 0.0]);
        assert_eq!(queue.underrun_count(), 1);
    }

    #[test]
    fn test_buffered_duration() {
        let (mut queue, _feed) = sample_queue(48000, 2, 48000);
        queue.push_frames(&vec![0.0; 48000]);
        assert_eq!(queue.buffered_duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        let (mut queue, mut feed) = sample_queue(256, 2, 44100);

        let handle = thread::spawn(move || {
            let mut written = 0;
            while written < 1000 {
                written += queue.push_frames(&[1.0; 64]);
                thread::yield_now();
            }
            written
        });

        let mut read = 0;
        let mut out = vec![0.0; 32];
        while read < 2000 {
            let n = feed.fill(&mut out);
            assert!(out[..n].iter().all(|&s| s == 1.0));
            read += n;
            thread::yield_now();
        }

        let written = handle.join().unwrap();
        assert!(written >= 1000);
    }

    #[test]
    fn test_stall_needs_full_queue_and_no_progress() {
        let start = Instant::now();
        let limit = Duration::from_millis(700);
        let mut watch = StallWatch::new(start);

        // Not full: never a stall
        assert!(!watch.is_stalled(0, false, limit, start + Duration::from_secs(5)));
        // Full but the consumer moved
        assert!(!watch.is_stalled(64, true, limit, start + Duration::from_secs(6)));
        // Full and stuck, within the limit
        assert!(!watch.is_stalled(64, true, limit, start + Duration::from_millis(6500)));
        // Full and stuck past the limit
        assert!(watch.is_stalled(64, true, limit, start + Duration::from_millis(6800)));
        // Progress clears it again
        assert!(!watch.is_stalled(128, true, limit, start + Duration::from_secs(7)));
    }
}
