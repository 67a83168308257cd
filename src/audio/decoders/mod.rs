pub mod pcm;
pub mod wav;

pub use pcm::{NormalizedBuffer, SampleConverter};
pub use wav::{DataRead, ParseOptions, WaveFile, WaveReader};
