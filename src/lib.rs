/*!
This crate finds out if GPU compute can be used in the current environment, and how well.

A [`prober::Prober`] runs an ordered set of checks (secure context, runtime version, api
availability, adapter, device, compilation of a minimal compute program) against a GPU api
and collects the outcome in a [`record::CapabilityRecord`], diagnostics included.
The [`optimizer`] then classifies the record into a [`optimizer::PerformanceTier`] and derives
the iteration and thread counts a downstream compute workload should run with.

The GPU api is never reached for globally: it is anything implementing [`backend::GpuApi`].
The [`interface::WgpuApi`] implementation runs the checks on top of [`wgpu`], natively or in the
browser when compiled for wasm32.

Nothing in the probe is fatal: every failure ends up as a reason in the record, and the worst
outcome of asking for parameters is the CPU fallback.

```no_run
use gpu_probe::config::ProbeConfig;
use gpu_probe::interface::WgpuApi;
use gpu_probe::prober::Prober;
use gpu_probe::runtime::HostContext;

let config = ProbeConfig::default();
let concurrency = config.concurrency;
let mut prober = Prober::new(WgpuApi::new(config), HostContext::native());
let parameters = pollster::block_on(prober.optimized_parameters(concurrency));
println!("{}", parameters.description());
```
*/

pub mod backend;
pub mod coding;
pub mod config;
pub mod errors;
pub mod interface;
pub mod optimizer;
pub mod prober;
pub mod record;
pub mod runtime;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(test)]
mod tests;
