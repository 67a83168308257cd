//! Shared test doubles: in-memory WAV files and a recording sink.
