//! The GPU compute api the prober talks to.
//!
//! The prober never reaches for a global GPU entry point: it is handed something
//! implementing [`GpuApi`]. [`crate::interface::WgpuApi`] is the real one, tests use
//! a scripted double.
//!
//! Every acquisition step can fail in two ways: it can come back empty (`Ok(None)`) or it
//! can raise an error (`Err`). The prober records the two differently.

use crate::errors::BackendError;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// `Send + Sync` everywhere but on wasm, where GPU handles are tied to the main thread
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSendSync for T {}

/// Identification strings reported by an adapter, `None` when not reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterDetails {
    pub vendor: Option<String>,
    pub architecture: Option<String>,
    pub device: Option<String>,
    pub description: Option<String>,
}

/// The numeric device limits the prober looks at, `None` when not reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_compute_workgroup_storage_size: Option<u64>,
    pub max_compute_invocations_per_workgroup: Option<u64>,
    pub max_compute_workgroup_size_x: Option<u64>,
    pub max_compute_workgroup_size_y: Option<u64>,
    pub max_compute_workgroup_size_z: Option<u64>,
    pub max_compute_workgroups_per_dimension: Option<u64>,
    pub max_storage_buffer_binding_size: Option<u64>,
    pub max_buffer_size: Option<u64>,
    pub max_uniform_buffer_binding_size: Option<u64>,
}

/// Entry point of a GPU compute api
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait GpuApi: MaybeSendSync {
    type Adapter: GpuAdapter;

    /// Tells if the api surface exists at all in this environment
    fn is_available(&self) -> bool;

    async fn request_adapter(&self) -> Result<Option<Self::Adapter>, BackendError>;
}

/// A physical or virtual GPU, queried before creating a device from it
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait GpuAdapter: MaybeSendSync {
    type Device: GpuDevice;

    fn details(&self) -> AdapterDetails;

    async fn request_device(&self) -> Result<Option<Self::Device>, BackendError>;
}

/// A logical device, the thing programs are compiled on
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait GpuDevice: MaybeSendSync {
    type Module: MaybeSendSync;

    fn features(&self) -> BTreeSet<String>;

    fn limits(&self) -> DeviceLimits;

    /// Compiles WGSL source into a shader module
    async fn create_shader_module(&self, source: &str) -> Result<Self::Module, BackendError>;

    /// Builds a compute pipeline out of a module, it is dropped straight away
    async fn create_compute_pipeline(
        &self,
        module: &Self::Module,
        entry_point: &str,
    ) -> Result<(), BackendError>;
}
