//! The capability record produced by every probe run.
//!
//! A [`CapabilityRecord`] is built step by step through a [`CapabilityRecordBuilder`]
//! while the checks run and is immutable once handed back to the caller.

use crate::errors::ProbeError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Value stored in `performance_info` for any field the adapter did not report
pub const UNKNOWN: &str = "Unknown";

pub const INFO_VENDOR: &str = "vendor";
pub const INFO_ARCHITECTURE: &str = "architecture";
pub const INFO_DEVICE: &str = "device";
pub const INFO_DESCRIPTION: &str = "description";
pub const INFO_BROWSER: &str = "browser";

/// The device limits the prober records.
///
/// Names follow the WebGPU `GPUSupportedLimits` attribute names, which are also the keys
/// of [`CapabilityRecord::limits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKey {
    WorkgroupStorageSize,
    InvocationsPerWorkgroup,
    WorkgroupSizeX,
    WorkgroupSizeY,
    WorkgroupSizeZ,
    WorkgroupsPerDimension,
    StorageBufferBindingSize,
    BufferSize,
    UniformBufferBindingSize,
}

impl LimitKey {
    pub const ALL: [LimitKey; 9] = [
        LimitKey::WorkgroupStorageSize,
        LimitKey::InvocationsPerWorkgroup,
        LimitKey::WorkgroupSizeX,
        LimitKey::WorkgroupSizeY,
        LimitKey::WorkgroupSizeZ,
        LimitKey::WorkgroupsPerDimension,
        LimitKey::StorageBufferBindingSize,
        LimitKey::BufferSize,
        LimitKey::UniformBufferBindingSize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LimitKey::WorkgroupStorageSize => "maxComputeWorkgroupStorageSize",
            LimitKey::InvocationsPerWorkgroup => "maxComputeInvocationsPerWorkgroup",
            LimitKey::WorkgroupSizeX => "maxComputeWorkgroupSizeX",
            LimitKey::WorkgroupSizeY => "maxComputeWorkgroupSizeY",
            LimitKey::WorkgroupSizeZ => "maxComputeWorkgroupSizeZ",
            LimitKey::WorkgroupsPerDimension => "maxComputeWorkgroupsPerDimension",
            LimitKey::StorageBufferBindingSize => "maxStorageBufferBindingSize",
            LimitKey::BufferSize => "maxBufferSize",
            LimitKey::UniformBufferBindingSize => "maxUniformBufferBindingSize",
        }
    }
}

/// What a single probe run found out about the GPU compute support of the environment
///
/// The flags always satisfy `has_device => supported => available` when the record comes
/// out of [`crate::prober::Prober::run_full_check`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRecord {
    available: bool,
    supported: bool,
    has_device: bool,
    features: BTreeSet<String>,
    limits: BTreeMap<String, u64>,
    performance_info: BTreeMap<String, String>,
    reasons: Vec<String>,
    errors: Vec<String>,
}

impl CapabilityRecord {
    pub fn builder() -> CapabilityRecordBuilder {
        CapabilityRecordBuilder::default()
    }

    /// A GPU compute API surface exists in this environment
    pub fn available(&self) -> bool {
        self.available
    }

    /// A usable adapter was acquired
    pub fn supported(&self) -> bool {
        self.supported
    }

    /// A logical device was created from the adapter
    pub fn has_device(&self) -> bool {
        self.has_device
    }

    pub fn features(&self) -> &BTreeSet<String> {
        &self.features
    }

    pub fn limits(&self) -> &BTreeMap<String, u64> {
        &self.limits
    }

    /// Gets a reported limit, `None` means the device did not report it
    pub fn limit(&self, key: LimitKey) -> Option<u64> {
        self.limits.get(key.name()).copied()
    }

    pub fn performance_info(&self) -> &BTreeMap<String, String> {
        &self.performance_info
    }

    pub fn info(&self, key: &str) -> &str {
        self.performance_info
            .get(key)
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e == code)
    }

    /// Checks the `has_device => supported => available` chain
    pub fn check_invariants(&self) -> Result<(), ProbeError> {
        if self.has_device && !self.supported {
            return Err(ProbeError::InvariantViolated(
                "a device is present without a supported adapter",
            ));
        }
        if self.supported && !self.available {
            return Err(ProbeError::InvariantViolated(
                "an adapter is supported without an available API",
            ));
        }
        Ok(())
    }
}

/// Accumulates the outcome of the checks of a single run
///
/// Diagnostics are append only, nothing is ever removed before [`CapabilityRecordBuilder::finish`].
#[derive(Debug, Default)]
pub struct CapabilityRecordBuilder {
    record: CapabilityRecord,
}

impl CapabilityRecordBuilder {
    pub fn available(mut self, available: bool) -> Self {
        self.record.available = available;
        self
    }

    pub fn supported(mut self, supported: bool) -> Self {
        self.record.supported = supported;
        self
    }

    pub fn has_device(mut self, has_device: bool) -> Self {
        self.record.has_device = has_device;
        self
    }

    pub fn feature(mut self, feature: &str) -> Self {
        self.record.features.insert(feature.to_string());
        self
    }

    pub fn limit(mut self, key: LimitKey, value: u64) -> Self {
        self.record.limits.insert(key.name().to_string(), value);
        self
    }

    pub fn info(mut self, key: &str, value: &str) -> Self {
        self.set_info(key, Some(value));
        self
    }

    pub(crate) fn set_available(&mut self, available: bool) {
        self.record.available = available;
    }

    pub(crate) fn set_supported(&mut self) {
        self.record.supported = true;
    }

    pub(crate) fn set_has_device(&mut self) {
        self.record.has_device = true;
    }

    pub(crate) fn set_features<I: IntoIterator<Item = String>>(&mut self, features: I) {
        self.record.features.extend(features);
    }

    /// Stores the limit only when the device reported it
    pub(crate) fn set_limit(&mut self, key: LimitKey, value: Option<u64>) {
        if let Some(value) = value {
            self.record.limits.insert(key.name().to_string(), value);
        }
    }

    pub(crate) fn set_info(&mut self, key: &str, value: Option<&str>) {
        let value = match value {
            Some(v) if !v.trim().is_empty() => v.to_string(),
            _ => UNKNOWN.to_string(),
        };
        self.record.performance_info.insert(key.to_string(), value);
    }

    /// Records a failed check: the message goes to `reasons`, the code to `errors`
    pub(crate) fn fail(&mut self, err: &ProbeError) {
        log::warn!("{} ({})", err, err.code());
        self.record.reasons.push(err.to_string());
        self.record.errors.push(err.code().to_string());
    }

    /// Records an informational reason, nothing is added to `errors`
    pub(crate) fn note(&mut self, reason: &str) {
        log::info!("{reason}");
        self.record.reasons.push(reason.to_string());
    }

    pub fn finish(self) -> CapabilityRecord {
        self.record
    }
}
