//! This module contains the code to interface with the GPU device.
//!
//! It implements the [`crate::backend`] traits on top of the [`wgpu`] crate, so the prober
//! can be pointed at the real adapters of the machine (or of the browser when compiled
//! for wasm32).

use crate::backend::{AdapterDetails, DeviceLimits, GpuAdapter, GpuApi, GpuDevice};
use crate::config::ProbeConfig;
use crate::errors::BackendError;
use async_trait::async_trait;
use std::borrow::Cow;
use std::collections::BTreeSet;

/// Entry point to the wgpu instance of the process.
///
/// To use it simply write
/// ```no_run
/// use gpu_probe::config::ProbeConfig;
/// use gpu_probe::interface::WgpuApi;
/// use gpu_probe::prober::Prober;
/// use gpu_probe::runtime::HostContext;
///
/// let mut prober = Prober::new(WgpuApi::new(ProbeConfig::default()), HostContext::native());
/// let record = pollster::block_on(prober.run_full_check());
/// println!("{}", prober.status_message());
/// ```
pub struct WgpuApi {
    instance: wgpu::Instance,
    backends: wgpu::Backends,
    config: ProbeConfig,
}

impl WgpuApi {
    pub fn new(config: ProbeConfig) -> Self {
        WgpuApi::with_backends(config, wgpu::Backends::all())
    }

    pub fn with_backends(config: ProbeConfig, backends: wgpu::Backends) -> Self {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends, // this is to get all the possible backends
            ..Default::default()
        });
        WgpuApi {
            instance,
            backends,
            config,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl GpuApi for WgpuApi {
    type Adapter = WgpuAdapter;

    fn is_available(&self) -> bool {
        api_surface_present(self.backends, navigator_exposes_gpu())
    }

    async fn request_adapter(&self) -> Result<Option<WgpuAdapter>, BackendError> {
        let adapter = self
            .instance
            .request_adapter(
                // this asks between all the backends of the instance which one satisfies the options
                &wgpu::RequestAdapterOptions {
                    power_preference: self.config.power_preference.into(),
                    compatible_surface: None, // no surface, only compute is probed
                    force_fallback_adapter: self.config.force_fallback_adapter,
                },
            )
            .await;

        Ok(adapter.map(|adapter| WgpuAdapter {
            adapter,
            label: self.config.label.clone(),
        }))
    }
}

pub struct WgpuAdapter {
    adapter: wgpu::Adapter,
    label: String,
}

/// The instance needs at least one backend, and in the browser `navigator.gpu` must exist:
/// wgpu calls `requestAdapter` on it without checking
fn api_surface_present(backends: wgpu::Backends, navigator_gpu: bool) -> bool {
    !backends.is_empty() && navigator_gpu
}

#[cfg(target_arch = "wasm32")]
fn navigator_exposes_gpu() -> bool {
    let Some(window) = web_sys::window() else {
        return false;
    };
    js_sys::Reflect::get(&window.navigator(), &"gpu".into())
        .map(|gpu| !gpu.is_undefined() && !gpu.is_null())
        .unwrap_or(false)
}

#[cfg(not(target_arch = "wasm32"))]
fn navigator_exposes_gpu() -> bool {
    true
}

/// wgpu feature flag names as WebGPU feature identifiers, `SHADER_F16` becomes `shader-f16`
fn feature_name(flag: &str) -> String {
    flag.to_lowercase().replace('_', "-")
}

/// Names the PCI vendor ids of the common GPU vendors
fn vendor_name(vendor: u32) -> Option<String> {
    let name = match vendor {
        0 => return None,
        0x10de => "nvidia",
        0x1002 | 0x1022 => "amd",
        0x8086 => "intel",
        0x106b => "apple",
        0x13b5 => "arm",
        0x5143 => "qualcomm",
        0x1010 => "imagination",
        0x14e4 => "broadcom",
        0x10005 => "mesa",
        _ => return Some(format!("{vendor:#06x}")),
    };
    Some(name.to_string())
}

fn device_type_name(device_type: wgpu::DeviceType) -> Option<String> {
    let name = match device_type {
        wgpu::DeviceType::DiscreteGpu => "discrete-gpu",
        wgpu::DeviceType::IntegratedGpu => "integrated-gpu",
        wgpu::DeviceType::VirtualGpu => "virtual-gpu",
        wgpu::DeviceType::Cpu => "cpu",
        wgpu::DeviceType::Other => return None,
    };
    Some(name.to_string())
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl GpuAdapter for WgpuAdapter {
    type Device = WgpuDevice;

    fn details(&self) -> AdapterDetails {
        let info = self.adapter.get_info();
        let driver = format!("{} {}", info.driver, info.driver_info);
        AdapterDetails {
            vendor: vendor_name(info.vendor),
            architecture: device_type_name(info.device_type),
            device: non_empty(&info.name),
            description: non_empty(&driver).map(|driver| format!("{:?}: {driver}", info.backend)),
        }
    }

    async fn request_device(&self) -> Result<Option<WgpuDevice>, BackendError> {
        let (device, _queue) = self
            .adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(self.label.as_str()),
                    required_features: wgpu::Features::empty(),
                    // the adapter limits, so the device reports what the hardware can do
                    required_limits: self.adapter.limits(),
                },
                None, // Trace path 'used for API call tracing'
            )
            .await?;

        Ok(Some(WgpuDevice {
            device,
            label: self.label.clone(),
        }))
    }
}

pub struct WgpuDevice {
    device: wgpu::Device,
    label: String,
}

impl WgpuDevice {
    /// Runs `create` inside a validation error scope and hands back what it built,
    /// or the validation error wgpu raised while building it
    async fn validated<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, BackendError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let created = create(&self.device);
        match self.device.pop_error_scope().await {
            Some(err) => Err(err.into()),
            None => Ok(created),
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl GpuDevice for WgpuDevice {
    type Module = wgpu::ShaderModule;

    fn features(&self) -> BTreeSet<String> {
        self.device
            .features()
            .iter_names()
            .map(|(name, _)| feature_name(name))
            .collect()
    }

    fn limits(&self) -> DeviceLimits {
        let limits = self.device.limits();
        DeviceLimits {
            max_compute_workgroup_storage_size: Some(limits.max_compute_workgroup_storage_size.into()),
            max_compute_invocations_per_workgroup: Some(
                limits.max_compute_invocations_per_workgroup.into(),
            ),
            max_compute_workgroup_size_x: Some(limits.max_compute_workgroup_size_x.into()),
            max_compute_workgroup_size_y: Some(limits.max_compute_workgroup_size_y.into()),
            max_compute_workgroup_size_z: Some(limits.max_compute_workgroup_size_z.into()),
            max_compute_workgroups_per_dimension: Some(
                limits.max_compute_workgroups_per_dimension.into(),
            ),
            max_storage_buffer_binding_size: Some(limits.max_storage_buffer_binding_size.into()),
            max_buffer_size: Some(limits.max_buffer_size),
            max_uniform_buffer_binding_size: Some(limits.max_uniform_buffer_binding_size.into()),
        }
    }

    async fn create_shader_module(&self, source: &str) -> Result<wgpu::ShaderModule, BackendError> {
        let label = self.label.as_str();
        self.validated(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
            })
        })
        .await
    }

    async fn create_compute_pipeline(
        &self,
        module: &wgpu::ShaderModule,
        entry_point: &str,
    ) -> Result<(), BackendError> {
        let label = self.label.as_str();
        self.validated(|device| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None, // layout derived from the shader bindings
                module,
                entry_point,
            })
        })
        .await
        .map(|_pipeline| ())
    }
}

#[cfg(test)]
mod interface_test {
    use super::*;

    #[test]
    fn vendor_ids_are_named() {
        assert_eq!(vendor_name(0x10de).as_deref(), Some("nvidia"));
        assert_eq!(vendor_name(0x8086).as_deref(), Some("intel"));
        assert_eq!(vendor_name(0xbeef).as_deref(), Some("0xbeef"));
        assert_eq!(vendor_name(0), None);
    }

    #[test]
    fn missing_navigator_gpu_means_unavailable() {
        assert!(api_surface_present(wgpu::Backends::all(), true));
        assert!(!api_surface_present(wgpu::Backends::all(), false));
        assert!(!api_surface_present(wgpu::Backends::empty(), true));
    }

    #[test]
    fn feature_flags_use_webgpu_names() {
        assert_eq!(feature_name("SHADER_F16"), "shader-f16");
        assert_eq!(feature_name("TIMESTAMP_QUERY"), "timestamp-query");
        assert_eq!(feature_name("DEPTH_CLIP_CONTROL"), "depth-clip-control");
    }

    #[test]
    fn no_backends_means_unavailable() {
        let api = WgpuApi::with_backends(ProbeConfig::default(), wgpu::Backends::empty());
        assert!(!api.is_available());
    }

    #[test]
    #[ignore = "needs a GPU adapter"]
    fn real_adapter_reports_limits() {
        let api = WgpuApi::new(ProbeConfig::default());
        let adapter = pollster::block_on(api.request_adapter())
            .unwrap()
            .expect("no adapter found for this machine");
        let device = pollster::block_on(adapter.request_device()).unwrap().unwrap();

        let limits = device.limits();
        assert!(limits.max_compute_invocations_per_workgroup.unwrap() > 0);

        let shader = crate::coding::Shader::smoke_test();
        let module = pollster::block_on(device.create_shader_module(shader.get_content())).unwrap();
        pollster::block_on(device.create_compute_pipeline(&module, shader.entry_point())).unwrap();
    }
}
