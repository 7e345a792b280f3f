//! This module contains all the specific error implementation for the crate
//!
//! Every diagnostic the prober can record is a [`ProbeError`]: its display text is the
//! human readable reason and [`ProbeError::code`] is the machine readable code.
//! Hopefully like this errors are easier to catch and manage from another crate

use thiserror::Error;

/// The failures a probe run can record in a [`crate::record::CapabilityRecord`]
///
/// None of these is ever returned to the caller of a full check, they are appended to the
/// record diagnostics instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("GPU compute requires a secure context (HTTPS or localhost)")]
    InsecureContext,
    #[error("Runtime is not a known GPU compute capable browser")]
    UnsupportedBrowser,
    #[error("{family} {version} is too old, GPU compute needs at least version {minimum}")]
    BrowserVersionTooOld {
        family: String,
        version: u32,
        minimum: String,
    },
    #[error("GPU compute API is not available in this environment")]
    BrowserNotSupported,
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Error while requesting the GPU adapter: {0}")]
    AdapterError(String),
    #[error("Failed to create a GPU device")]
    DeviceCreationFailed,
    #[error("Error while requesting the GPU device: {0}")]
    DeviceError(String),
    #[error("Compute shader compilation failed: {0}")]
    ShaderCompilationFailed(String),
    #[error("Capability record is inconsistent: {0}")]
    InvariantViolated(&'static str),
}

impl ProbeError {
    /// Gets the machine readable code appended to the record `errors`
    pub fn code(&self) -> &'static str {
        match self {
            ProbeError::InsecureContext => "INSECURE_CONTEXT",
            ProbeError::UnsupportedBrowser => "UNSUPPORTED_BROWSER",
            ProbeError::BrowserVersionTooOld { .. } => "BROWSER_VERSION_TOO_OLD",
            ProbeError::BrowserNotSupported => "BROWSER_NOT_SUPPORTED",
            ProbeError::NoAdapter => "NO_ADAPTER",
            ProbeError::AdapterError(_) => "ADAPTER_ERROR",
            ProbeError::DeviceCreationFailed => "DEVICE_CREATION_FAILED",
            ProbeError::DeviceError(_) => "DEVICE_ERROR",
            ProbeError::ShaderCompilationFailed(_) => "SHADER_COMPILATION_FAILED",
            ProbeError::InvariantViolated(_) => "INVARIANT_VIOLATED",
        }
    }
}

/// Errors raised by an implementation of the [`crate::backend`] traits
///
/// The message is what ends up interpolated in the diagnostic text of the matching
/// [`ProbeError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{0}")]
    Request(String),
    #[error("{0}")]
    Validation(String),
}

impl From<wgpu::RequestDeviceError> for BackendError {
    fn from(err: wgpu::RequestDeviceError) -> Self {
        BackendError::Request(err.to_string())
    }
}

impl From<wgpu::Error> for BackendError {
    fn from(err: wgpu::Error) -> Self {
        BackendError::Validation(err.to_string())
    }
}
