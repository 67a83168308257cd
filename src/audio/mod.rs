pub mod buffer;
pub mod decoders;
pub mod device;
pub mod engine;

#[cfg(test)]
pub mod tests;

use crate::error::AudioError;
use crate::models::AudioFormat;

pub use buffer::{SampleFeed, SampleQueue};
pub use decoders::{NormalizedBuffer, SampleConverter, WaveReader};
pub use device::{CpalSink, CpalSinkOpener};
pub use engine::{PlaybackEngine, TickStatus, FRAMES_PER_TICK};

/// Blocking-free output transport for normalized interleaved PCM
pub trait PlaybackSink {
    /// Offer interleaved samples (whole frames) to the device.
    ///
    /// Returns the number of frames accepted, which may be fewer than offered
    /// when the device is busy.
    fn write(&mut self, interleaved: &[i32]) -> Result<usize, AudioError>;

    /// Bring the stream back into a usable state after a write error
    fn recover(&mut self) -> Result<(), AudioError>;

    /// Wait until everything accepted so far has been played
    fn drain(&mut self) -> Result<(), AudioError>;

    /// Release the device
    fn close(&mut self);
}

/// Opens sinks configured for a track's stream layout
pub trait SinkOpener {
    type Sink: PlaybackSink;

    fn open(&mut self, format: &AudioFormat) -> Result<Self::Sink, AudioError>;
}

impl<S: PlaybackSink + ?Sized> PlaybackSink for Box<S> {
    fn write(&mut self, interleaved: &[i32]) -> Result<usize, AudioError> {
        (**self).write(interleaved)
    }

    fn recover(&mut self) -> Result<(), AudioError> {
        (**self).recover()
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        (**self).drain()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
