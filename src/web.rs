//! Browser integration: the probe exported to javascript.

use crate::config::ProbeConfig;
use crate::interface::WgpuApi;
use crate::prober::Prober;
use crate::runtime::HostContext;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Runs a full check and hands back the capability record as JSON
#[wasm_bindgen(js_name = runFullCheck)]
pub async fn run_full_check() -> Result<String, JsValue> {
    let mut prober = Prober::new(WgpuApi::new(ProbeConfig::default()), HostContext::from_window());
    let record = prober.run_full_check().await;
    serde_json::to_string(&record).map_err(|err| JsValue::from_str(&err.to_string()))
}

/// Re-probes and hands back the optimized workload parameters as JSON
#[wasm_bindgen(js_name = getOptimizedGPUParameters)]
pub async fn optimized_parameters(concurrency: u32) -> Result<String, JsValue> {
    let mut prober = Prober::new(WgpuApi::new(ProbeConfig::default()), HostContext::from_window());
    let parameters = prober.optimized_parameters(concurrency).await;
    serde_json::to_string(&parameters).map_err(|err| JsValue::from_str(&err.to_string()))
}
