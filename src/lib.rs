pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod error_recovery;
pub mod logging;
pub mod models;
pub mod playlist;
pub mod transport;


pub use error::*;
pub use models::*;
