//! ScanSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, ScanFrame};

/// Scan output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(ScanSink: Send)]
pub trait LocalScanSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one scan frame
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, frame: &ScanFrame) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
