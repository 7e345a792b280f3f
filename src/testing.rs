//! A scripted GPU api, to drive the prober through every outcome of every check without
//! real hardware.
//!
//! Enabled in the crate tests and, for the integration tests, with the `test-utils` feature.

use crate::backend::{AdapterDetails, DeviceLimits, GpuAdapter, GpuApi, GpuDevice};
use crate::errors::BackendError;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outcome of an acquisition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Granted,
    /// The request resolves to nothing
    Empty,
    /// The request raises an error with this message
    Raises(String),
}

/// What each step of the api answers
#[derive(Debug, Clone)]
pub struct Script {
    pub available: bool,
    pub adapter: Acquisition,
    pub details: AdapterDetails,
    pub device: Acquisition,
    pub features: BTreeSet<String>,
    pub limits: DeviceLimits,
    pub shader_module: Result<(), String>,
    pub pipeline: Result<(), String>,
    /// How long the adapter request takes
    pub adapter_delay: Option<Duration>,
}

impl Script {
    /// A discrete GPU which passes every check and lands in the high tier
    pub fn high_end() -> Self {
        Script {
            available: true,
            adapter: Acquisition::Granted,
            details: AdapterDetails {
                vendor: Some("nvidia".to_string()),
                architecture: Some("discrete-gpu".to_string()),
                device: Some("NVIDIA GeForce RTX 4080".to_string()),
                description: None,
            },
            device: Acquisition::Granted,
            features: ["timestamp-query", "shader-f16"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            limits: DeviceLimits {
                max_compute_workgroup_storage_size: Some(32768),
                max_compute_invocations_per_workgroup: Some(1024),
                max_compute_workgroup_size_x: Some(1024),
                max_compute_workgroup_size_y: Some(1024),
                max_compute_workgroup_size_z: Some(64),
                max_compute_workgroups_per_dimension: Some(65535),
                max_storage_buffer_binding_size: Some(2147483647),
                max_buffer_size: Some(4294967296),
                max_uniform_buffer_binding_size: Some(65536),
            },
            shader_module: Ok(()),
            pipeline: Ok(()),
            adapter_delay: None,
        }
    }

    /// The WebGPU default limits, which land in the low tier
    pub fn baseline() -> Self {
        Script {
            details: AdapterDetails::default(),
            features: BTreeSet::new(),
            limits: DeviceLimits {
                max_compute_workgroup_storage_size: Some(16384),
                max_compute_invocations_per_workgroup: Some(256),
                max_compute_workgroup_size_x: Some(256),
                max_compute_workgroup_size_y: Some(256),
                max_compute_workgroup_size_z: Some(64),
                max_compute_workgroups_per_dimension: Some(65535),
                max_storage_buffer_binding_size: Some(134217728),
                max_buffer_size: Some(268435456),
                max_uniform_buffer_binding_size: Some(65536),
            },
            ..Script::high_end()
        }
    }

    pub fn with_adapter(mut self, adapter: Acquisition) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_device(mut self, device: Acquisition) -> Self {
        self.device = device;
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

/// The calls the prober made, in order
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl CallLog {
    fn push(&self, call: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

pub struct ScriptedApi {
    script: Arc<Script>,
    log: CallLog,
}

impl ScriptedApi {
    pub fn new(script: Script) -> Self {
        ScriptedApi {
            script: Arc::new(script),
            log: CallLog::default(),
        }
    }

    /// A handle on the calls made through this api and everything it handed out
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

fn acquire<T>(acquisition: &Acquisition, granted: impl FnOnce() -> T) -> Result<Option<T>, BackendError> {
    match acquisition {
        Acquisition::Granted => Ok(Some(granted())),
        Acquisition::Empty => Ok(None),
        Acquisition::Raises(message) => Err(BackendError::Request(message.clone())),
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl GpuApi for ScriptedApi {
    type Adapter = ScriptedAdapter;

    fn is_available(&self) -> bool {
        self.log.push("is_available");
        self.script.available
    }

    async fn request_adapter(&self) -> Result<Option<ScriptedAdapter>, BackendError> {
        self.log.push("request_adapter");
        if let Some(delay) = self.script.adapter_delay {
            tokio::time::sleep(delay).await;
        }
        acquire(&self.script.adapter, || ScriptedAdapter {
            script: Arc::clone(&self.script),
            log: self.log.clone(),
        })
    }
}

pub struct ScriptedAdapter {
    script: Arc<Script>,
    log: CallLog,
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl GpuAdapter for ScriptedAdapter {
    type Device = ScriptedDevice;

    fn details(&self) -> AdapterDetails {
        self.script.details.clone()
    }

    async fn request_device(&self) -> Result<Option<ScriptedDevice>, BackendError> {
        self.log.push("request_device");
        acquire(&self.script.device, || ScriptedDevice {
            script: Arc::clone(&self.script),
            log: self.log.clone(),
        })
    }
}

pub struct ScriptedDevice {
    script: Arc<Script>,
    log: CallLog,
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl GpuDevice for ScriptedDevice {
    type Module = ();

    fn features(&self) -> BTreeSet<String> {
        self.script.features.clone()
    }

    fn limits(&self) -> DeviceLimits {
        self.script.limits
    }

    async fn create_shader_module(&self, _source: &str) -> Result<(), BackendError> {
        self.log.push("create_shader_module");
        self.script.shader_module.clone().map_err(BackendError::Validation)
    }

    async fn create_compute_pipeline(&self, _module: &(), _entry_point: &str) -> Result<(), BackendError> {
        self.log.push("create_compute_pipeline");
        self.script.pipeline.clone().map_err(BackendError::Validation)
    }
}
