//! The capability prober.
//!
//! Runs the environment checks in a fixed order and stops as soon as a check which the
//! following ones depend on fails:
//!
//! 1. secure context (stops the run)
//! 2. runtime family and version (advisory, never stops the run)
//! 3. api availability
//! 4. adapter acquisition
//! 5. device acquisition
//! 6. compilation of a minimal compute program (recorded as a warning only)
//!
//! Each run starts from an empty record, nothing carries over from the previous one.

use crate::backend::{GpuAdapter, GpuApi, GpuDevice};
use crate::coding::Shader;
use crate::errors::ProbeError;
use crate::optimizer::{self, OptimizedParameters, PerformanceTier};
use crate::record::{
    CapabilityRecord, CapabilityRecordBuilder, LimitKey, INFO_ARCHITECTURE, INFO_BROWSER,
    INFO_DESCRIPTION, INFO_DEVICE, INFO_VENDOR,
};
use crate::runtime::{check_runtime, HostContext};
use anyhow::Context;
use tokio::sync::Mutex;

pub const STATUS_SUPPORTED: &str = "GPU compute is fully supported";
pub const STATUS_LIMITED: &str = "GPU compute is available but limited";
pub const STATUS_UNSUPPORTED: &str = "GPU compute is not supported";

pub const SMOKE_TEST_PASSED: &str = "Compute shader compilation test passed";

/// Keeps the handles acquired by the latest run alive
///
/// They are superseded by the next run, never explicitly released.
struct Acquired<A: GpuApi> {
    adapter: Option<A::Adapter>,
    device: Option<<A::Adapter as GpuAdapter>::Device>,
}

impl<A: GpuApi> Default for Acquired<A> {
    fn default() -> Self {
        Acquired {
            adapter: None,
            device: None,
        }
    }
}

/// Finds out what the GPU compute api of the environment can do
///
/// Runs take `&mut self`, so a prober can't be asked to run twice at the same time.
/// Use a [`SharedProber`] when several tasks can trigger a check.
pub struct Prober<A: GpuApi> {
    api: A,
    host: HostContext,
    record: CapabilityRecord,
    acquired: Acquired<A>,
}

impl<A: GpuApi> Prober<A> {
    pub fn new(api: A, host: HostContext) -> Self {
        Prober {
            api,
            host,
            record: CapabilityRecord::default(),
            acquired: Acquired::default(),
        }
    }

    /// The record of the latest run, empty before the first one
    pub fn record(&self) -> &CapabilityRecord {
        &self.record
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    pub fn adapter(&self) -> Option<&A::Adapter> {
        self.acquired.adapter.as_ref()
    }

    pub fn device(&self) -> Option<&<A::Adapter as GpuAdapter>::Device> {
        self.acquired.device.as_ref()
    }

    /// Runs all the checks from an empty record and returns what they found
    ///
    /// It never fails: every problem met is in the `reasons` and `errors` of the record.
    pub async fn run_full_check(&mut self) -> CapabilityRecord {
        let mut builder = CapabilityRecord::builder();
        let mut acquired = Acquired::default();

        self.run_checks(&mut builder, &mut acquired).await;

        self.acquired = acquired;
        self.record = builder.finish();
        log::debug!("capability check finished: {}", self.status_message());
        self.record.clone()
    }

    async fn run_checks(&self, builder: &mut CapabilityRecordBuilder, acquired: &mut Acquired<A>) {
        log::debug!("checking secure context");
        if !self.host.secure_context {
            builder.fail(&ProbeError::InsecureContext);
            return;
        }

        log::debug!("checking runtime compatibility of {:?}", self.host.user_agent);
        let verdict = check_runtime(&self.host.user_agent);
        let browser = verdict.family().map(|family| family.to_string());
        builder.set_info(INFO_BROWSER, browser.as_deref());
        if let Some(err) = verdict.to_error() {
            builder.fail(&err);
        }

        log::debug!("checking api availability");
        let available = self.api.is_available();
        builder.set_available(available);
        if !available {
            builder.fail(&ProbeError::BrowserNotSupported);
            return;
        }

        let Some(adapter) = self.check_adapter(builder).await else {
            return;
        };
        let device = self.check_device(&adapter, builder).await;
        acquired.adapter = Some(adapter);
        let Some(device) = device else {
            return;
        };

        Self::check_compilation(&device, builder).await;
        acquired.device = Some(device);
    }

    async fn check_adapter(&self, builder: &mut CapabilityRecordBuilder) -> Option<A::Adapter> {
        log::debug!("requesting adapter");
        let adapter = match self.api.request_adapter().await {
            Ok(Some(adapter)) => adapter,
            Ok(None) => {
                builder.fail(&ProbeError::NoAdapter);
                return None;
            }
            Err(err) => {
                builder.fail(&ProbeError::AdapterError(err.to_string()));
                return None;
            }
        };

        let details = adapter.details();
        log::info!("adapter acquired: {details:?}");
        builder.set_supported();
        builder.set_info(INFO_VENDOR, details.vendor.as_deref());
        builder.set_info(INFO_ARCHITECTURE, details.architecture.as_deref());
        builder.set_info(INFO_DEVICE, details.device.as_deref());
        builder.set_info(INFO_DESCRIPTION, details.description.as_deref());
        Some(adapter)
    }

    async fn check_device(
        &self,
        adapter: &A::Adapter,
        builder: &mut CapabilityRecordBuilder,
    ) -> Option<<A::Adapter as GpuAdapter>::Device> {
        log::debug!("requesting device");
        let device = match adapter.request_device().await {
            Ok(Some(device)) => device,
            Ok(None) => {
                builder.fail(&ProbeError::DeviceCreationFailed);
                return None;
            }
            Err(err) => {
                builder.fail(&ProbeError::DeviceError(err.to_string()));
                return None;
            }
        };

        builder.set_has_device();
        builder.set_features(device.features());

        let limits = device.limits();
        builder.set_limit(
            LimitKey::WorkgroupStorageSize,
            limits.max_compute_workgroup_storage_size,
        );
        builder.set_limit(
            LimitKey::InvocationsPerWorkgroup,
            limits.max_compute_invocations_per_workgroup,
        );
        builder.set_limit(LimitKey::WorkgroupSizeX, limits.max_compute_workgroup_size_x);
        builder.set_limit(LimitKey::WorkgroupSizeY, limits.max_compute_workgroup_size_y);
        builder.set_limit(LimitKey::WorkgroupSizeZ, limits.max_compute_workgroup_size_z);
        builder.set_limit(
            LimitKey::WorkgroupsPerDimension,
            limits.max_compute_workgroups_per_dimension,
        );
        builder.set_limit(
            LimitKey::StorageBufferBindingSize,
            limits.max_storage_buffer_binding_size,
        );
        builder.set_limit(LimitKey::BufferSize, limits.max_buffer_size);
        builder.set_limit(
            LimitKey::UniformBufferBindingSize,
            limits.max_uniform_buffer_binding_size,
        );
        log::info!("device acquired: {limits:?}");
        Some(device)
    }

    /// A failure here is only a warning, `supported` and `has_device` stay as they are
    async fn check_compilation(
        device: &<A::Adapter as GpuAdapter>::Device,
        builder: &mut CapabilityRecordBuilder,
    ) {
        log::debug!("compiling smoke test shader");
        let shader = Shader::smoke_test();
        let compiled = match device.create_shader_module(shader.get_content()).await {
            Ok(module) => {
                device
                    .create_compute_pipeline(&module, shader.entry_point())
                    .await
            }
            Err(err) => Err(err),
        };
        match compiled {
            Ok(()) => builder.note(SMOKE_TEST_PASSED),
            Err(err) => builder.fail(&ProbeError::ShaderCompilationFailed(err.to_string())),
        }
    }

    pub fn status_message(&self) -> &'static str {
        status_message(&self.record)
    }

    pub fn performance_tier(&self) -> PerformanceTier {
        optimizer::classify_tier(&self.record)
    }

    /// Checks the environment again and derives the workload parameters from the new record
    ///
    /// This never fails either: if the derivation goes wrong the CPU path is forced and
    /// the reason is carried in [`OptimizedParameters::reason`].
    pub async fn optimized_parameters(&mut self, concurrency: u32) -> OptimizedParameters {
        let record = self.run_full_check().await;
        parameters_or_cpu(&record, concurrency)
    }
}

/// The parameters for `record`, or the CPU path with the error chain as reason
fn parameters_or_cpu(record: &CapabilityRecord, concurrency: u32) -> OptimizedParameters {
    match derive_parameters(record, concurrency) {
        Ok(parameters) => parameters,
        Err(err) => {
            log::warn!("falling back to CPU: {err:#}");
            OptimizedParameters::cpu_fallback(concurrency, Some(format!("{err:#}")))
        }
    }
}

fn derive_parameters(
    record: &CapabilityRecord,
    concurrency: u32,
) -> anyhow::Result<OptimizedParameters> {
    record
        .check_invariants()
        .context("can't derive GPU parameters from this capability check")?;
    Ok(optimizer::optimize(record, concurrency))
}

/// The one line summary of a record
pub fn status_message(record: &CapabilityRecord) -> &'static str {
    if record.supported() && record.has_device() {
        STATUS_SUPPORTED
    } else if record.available() {
        STATUS_LIMITED
    } else {
        STATUS_UNSUPPORTED
    }
}

/// A [`Prober`] several tasks can hold on to
///
/// A check asked for while another one is running is rejected rather than queued.
pub struct SharedProber<A: GpuApi> {
    inner: Mutex<Prober<A>>,
}

impl<A: GpuApi> SharedProber<A> {
    pub fn new(prober: Prober<A>) -> Self {
        SharedProber {
            inner: Mutex::new(prober),
        }
    }

    /// Runs a full check unless one is already in flight, in which case `None` comes back
    pub async fn recheck(&self) -> Option<CapabilityRecord> {
        let Ok(mut prober) = self.inner.try_lock() else {
            log::warn!("a GPU check is already running, ignoring the recheck");
            return None;
        };
        Some(prober.run_full_check().await)
    }

    /// Same as [`Prober::optimized_parameters`], `None` if a check is already in flight
    pub async fn optimized_parameters(&self, concurrency: u32) -> Option<OptimizedParameters> {
        let Ok(mut prober) = self.inner.try_lock() else {
            log::warn!("a GPU check is already running, ignoring the request");
            return None;
        };
        Some(prober.optimized_parameters(concurrency).await)
    }

    /// The record of the latest finished run, waiting for a running one to finish
    pub async fn record(&self) -> CapabilityRecord {
        self.inner.lock().await.record().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
