use crate::error::AudioError;
use crate::logging::AudioLogger;
use log::{info, warn};

/// Counts consecutive device recoveries and decides when to give up.
///
/// A successful write resets the count; each recovered stream error bumps it.
pub struct DeviceRecovery {
    logger: AudioLogger,
    consecutive_failures: u32,
    total_recoveries: u64,
    max_recovery_attempts: u32,
}

/// What the transport should do after a recovered device error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryResult {
    /// Keep playing; the write is retried on the next tick
    Retry(String),
    /// Too many consecutive failures; stop playback
    Failed(String),
}

/// Snapshot of recovery counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStatistics {
    pub consecutive_failures: u32,
    pub total_recoveries: u64,
    pub max_recovery_attempts: u32,
}

impl DeviceRecovery {
    pub fn new(logger: AudioLogger, max_recovery_attempts: u32) -> Self {
        Self {
            logger,
            consecutive_failures: 0,
            total_recoveries: 0,
            max_recovery_attempts,
        }
    }

    /// Record a stream error the sink already recovered from
    pub fn record_recovered(&mut self, cause: &AudioError) -> RecoveryResult {
        self.consecutive_failures += 1;
        self.total_recoveries += 1;

        if self.consecutive_failures > self.max_recovery_attempts {
            warn!(
                "Maximum recovery attempts ({}) exceeded: {}",
                self.max_recovery_attempts, cause
            );
            self.logger.log_device_error(&cause.to_string());
            return RecoveryResult::Failed(format!(
                "audio device keeps failing ({}), playback stopped",
                cause.user_message()
            ));
        }

        self.logger
            .log_device_recovered(&cause.to_string(), self.consecutive_failures);
        RecoveryResult::Retry(format!(
            "audio device recovered (attempt {}/{})",
            self.consecutive_failures, self.max_recovery_attempts
        ))
    }

    /// Record a write that went through
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            info!(
                "audio device healthy again after {} recoveries",
                self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }
    }

    /// Record an error the sink could not recover from
    pub fn record_unrecoverable(&mut self, cause: &AudioError) {
        self.logger.log_device_error(&cause.to_string());
        self.consecutive_failures = 0;
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn get_recovery_statistics(&self) -> RecoveryStatistics {
        RecoveryStatistics {
            consecutive_failures: self.consecutive_failures,
            total_recoveries: self.total_recoveries,
            max_recovery_attempts: self.max_recovery_attempts,
        }
    }
}
