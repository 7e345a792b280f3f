use crate::backend::DeviceLimits;
use crate::optimizer::PerformanceTier;
use crate::prober::{
    Prober, SharedProber, SMOKE_TEST_PASSED, STATUS_LIMITED, STATUS_SUPPORTED, STATUS_UNSUPPORTED,
};
use crate::record::{LimitKey, INFO_BROWSER, INFO_DESCRIPTION, INFO_DEVICE, INFO_VENDOR, UNKNOWN};
use crate::runtime::HostContext;
use crate::testing::{Acquisition, Script, ScriptedApi};
use std::sync::Arc;
use std::time::Duration;

const CHROME_120: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const CHROME_100: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.0.0 Safari/537.36";

fn prober(script: Script) -> Prober<ScriptedApi> {
    Prober::new(ScriptedApi::new(script), HostContext::new(true, CHROME_120))
}

#[tokio::test]
async fn healthy_gpu_passes_every_check() {
    let mut prober = prober(Script::high_end());
    let record = prober.run_full_check().await;

    assert!(record.available() && record.supported() && record.has_device());
    assert!(record.errors().is_empty());
    assert_eq!(record.reasons(), [SMOKE_TEST_PASSED]);
    assert!(record.features().contains("shader-f16"));
    assert_eq!(record.limits().len(), LimitKey::ALL.len());
    assert_eq!(record.limit(LimitKey::InvocationsPerWorkgroup), Some(1024));
    assert_eq!(record.info(INFO_VENDOR), "nvidia");
    assert_eq!(record.info(INFO_DEVICE), "NVIDIA GeForce RTX 4080");
    assert_eq!(record.info(INFO_DESCRIPTION), UNKNOWN);
    assert_eq!(record.info(INFO_BROWSER), "Chrome");

    assert_eq!(prober.status_message(), STATUS_SUPPORTED);
    assert_eq!(prober.performance_tier(), PerformanceTier::High);
    assert!(prober.device().is_some());
}

#[tokio::test]
async fn insecure_context_stops_everything() {
    let api = ScriptedApi::new(Script::high_end());
    let log = api.log();
    let mut prober = Prober::new(api, HostContext::new(false, CHROME_120));
    let record = prober.run_full_check().await;

    assert_eq!(record.reasons().len(), 1);
    assert_eq!(record.errors(), ["INSECURE_CONTEXT"]);
    assert!(!record.available());
    assert!(record.performance_info().is_empty());
    assert!(record.limits().is_empty());
    assert!(log.calls().is_empty());
    assert_eq!(prober.status_message(), STATUS_UNSUPPORTED);
    assert_eq!(prober.performance_tier(), PerformanceTier::Unavailable);
}

#[tokio::test]
async fn old_runtime_is_only_advisory() {
    let mut prober = Prober::new(
        ScriptedApi::new(Script::high_end()),
        HostContext::new(true, CHROME_100),
    );
    let record = prober.run_full_check().await;

    assert_eq!(record.errors(), ["BROWSER_VERSION_TOO_OLD"]);
    assert!(record.has_device());
    assert_eq!(record.reasons().last().map(String::as_str), Some(SMOKE_TEST_PASSED));
}

#[tokio::test]
async fn unknown_runtime_is_only_advisory() {
    let mut prober = Prober::new(ScriptedApi::new(Script::high_end()), HostContext::native());
    let record = prober.run_full_check().await;

    assert_eq!(record.errors(), ["UNSUPPORTED_BROWSER"]);
    assert_eq!(record.info(INFO_BROWSER), UNKNOWN);
    assert!(record.has_device());
}

#[tokio::test]
async fn missing_api_skips_the_adapter() {
    let api = ScriptedApi::new(Script::high_end().unavailable());
    let log = api.log();
    let mut prober = Prober::new(api, HostContext::new(true, CHROME_120));
    let record = prober.run_full_check().await;

    assert!(!record.available());
    assert_eq!(record.errors(), ["BROWSER_NOT_SUPPORTED"]);
    assert_eq!(log.calls(), ["is_available"]);
    assert_eq!(prober.status_message(), STATUS_UNSUPPORTED);
}

#[tokio::test]
async fn no_adapter() {
    let mut prober = prober(Script::high_end().with_adapter(Acquisition::Empty));
    let record = prober.run_full_check().await;

    assert!(record.available());
    assert!(!record.supported());
    assert_eq!(record.errors(), ["NO_ADAPTER"]);
    assert_eq!(prober.status_message(), STATUS_LIMITED);
    assert!(prober.adapter().is_none());
}

#[tokio::test]
async fn adapter_error_is_interpolated() {
    let script = Script::high_end().with_adapter(Acquisition::Raises("GPU process lost".to_string()));
    let mut prober = prober(script);
    let record = prober.run_full_check().await;

    assert!(record.has_error("ADAPTER_ERROR"));
    assert!(!record.supported());
    assert!(record.reasons()[0].contains("GPU process lost"));
    assert_eq!(record.info(INFO_VENDOR), UNKNOWN);
}

#[tokio::test]
async fn no_device() {
    let api = ScriptedApi::new(Script::high_end().with_device(Acquisition::Empty));
    let log = api.log();
    let mut prober = Prober::new(api, HostContext::new(true, CHROME_120));
    let record = prober.run_full_check().await;

    assert!(record.supported());
    assert!(!record.has_device());
    assert_eq!(record.errors(), ["DEVICE_CREATION_FAILED"]);
    assert!(record.limits().is_empty());
    assert!(record.features().is_empty());
    assert_eq!(log.count("create_shader_module"), 0);
    assert_eq!(prober.status_message(), STATUS_LIMITED);
    // no limits reported, the tier can't be told
    assert_eq!(prober.performance_tier(), PerformanceTier::Unknown);
    assert!(prober.adapter().is_some());
}

#[tokio::test]
async fn device_error_is_interpolated() {
    let script = Script::high_end().with_device(Acquisition::Raises("limit exceeded".to_string()));
    let record = prober(script).run_full_check().await;

    assert_eq!(record.errors(), ["DEVICE_ERROR"]);
    assert!(record.reasons()[0].contains("limit exceeded"));
    assert!(!record.has_device());
}

#[tokio::test]
async fn compilation_failure_is_a_warning() {
    let mut script = Script::high_end();
    script.shader_module = Err("unknown builtin".to_string());
    let api = ScriptedApi::new(script);
    let log = api.log();
    let mut prober = Prober::new(api, HostContext::new(true, CHROME_120));
    let record = prober.run_full_check().await;

    assert!(record.supported() && record.has_device());
    assert_eq!(record.errors(), ["SHADER_COMPILATION_FAILED"]);
    assert!(record.reasons()[0].contains("unknown builtin"));
    assert_eq!(log.count("create_compute_pipeline"), 0);
    assert_eq!(prober.status_message(), STATUS_SUPPORTED);
}

#[tokio::test]
async fn pipeline_failure_is_a_warning() {
    let mut script = Script::high_end();
    script.pipeline = Err("entry point not found".to_string());
    let record = prober(script).run_full_check().await;

    assert!(record.has_device());
    assert!(record.has_error("SHADER_COMPILATION_FAILED"));
    assert!(!record.reasons().iter().any(|r| r == SMOKE_TEST_PASSED));
}

#[tokio::test]
async fn unreported_limits_are_omitted() {
    let limits = DeviceLimits {
        max_compute_invocations_per_workgroup: Some(512),
        max_compute_workgroup_size_x: Some(512),
        ..DeviceLimits::default()
    };
    let record = prober(Script::high_end().with_limits(limits)).run_full_check().await;

    assert_eq!(record.limits().len(), 2);
    assert_eq!(record.limit(LimitKey::StorageBufferBindingSize), None);
}

#[tokio::test]
async fn reruns_start_from_scratch() {
    let mut prober = prober(Script::baseline().with_device(Acquisition::Empty));
    let first = prober.run_full_check().await;
    let second = prober.run_full_check().await;

    assert_eq!(first, second);
    assert_eq!(second.errors().len(), 1);
    assert_eq!(prober.record(), &second);
}

#[tokio::test]
async fn flags_always_chain() {
    let scripts = [
        Script::high_end(),
        Script::high_end().unavailable(),
        Script::high_end().with_adapter(Acquisition::Empty),
        Script::high_end().with_adapter(Acquisition::Raises("x".to_string())),
        Script::high_end().with_device(Acquisition::Empty),
        Script::high_end().with_device(Acquisition::Raises("x".to_string())),
    ];
    for script in scripts {
        for secure in [true, false] {
            let mut prober = Prober::new(ScriptedApi::new(script.clone()), HostContext::new(secure, CHROME_120));
            let record = prober.run_full_check().await;
            assert!(record.check_invariants().is_ok());
            assert!(!record.has_device() || record.supported());
            assert!(!record.supported() || record.available());
        }
    }
}

#[tokio::test]
async fn optimized_parameters_reprobe() {
    let api = ScriptedApi::new(Script::high_end());
    let log = api.log();
    let mut prober = Prober::new(api, HostContext::new(true, CHROME_120));

    let params = prober.optimized_parameters(4).await;
    assert!(params.use_gpu);
    assert_eq!(params.performance_tier, PerformanceTier::High);
    assert_eq!(params.iteration_count, 512);
    assert_eq!(params.thread_count, 256);
    assert_eq!(params.estimated_gain, 28.0);
    assert_eq!(params.reason, None);

    prober.optimized_parameters(4).await;
    assert_eq!(log.count("request_adapter"), 2);
}

#[tokio::test]
async fn baseline_limits_give_low_tier_parameters() {
    let params = prober(Script::baseline()).optimized_parameters(4).await;

    assert_eq!(params.performance_tier, PerformanceTier::Low);
    assert_eq!(params.iteration_count, 256);
    assert_eq!(params.thread_count, 64);
    assert_eq!(params.estimated_gain, 6.0);
}

#[tokio::test]
async fn unsupported_gives_cpu_parameters() {
    let params = prober(Script::high_end().with_adapter(Acquisition::Empty))
        .optimized_parameters(16)
        .await;

    assert!(!params.use_gpu);
    assert_eq!(params.performance_tier, PerformanceTier::Unavailable);
    assert_eq!((params.iteration_count, params.thread_count), (256, 64));
    assert_eq!(params.estimated_gain, 0.0);
}

#[tokio::test]
async fn overlapping_recheck_is_rejected() {
    let mut script = Script::high_end();
    script.adapter_delay = Some(Duration::from_millis(200));
    let api = ScriptedApi::new(script);
    let log = api.log();
    let shared = Arc::new(SharedProber::new(Prober::new(api, HostContext::new(true, CHROME_120))));

    let running = Arc::clone(&shared);
    let first = tokio::spawn(async move { running.recheck().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(shared.is_running());
    assert!(shared.recheck().await.is_none());
    assert!(shared.optimized_parameters(4).await.is_none());

    let record = first.await.unwrap().expect("first check should run");
    assert!(record.has_device());
    assert_eq!(log.count("request_adapter"), 1);
    assert_eq!(shared.record().await, record);
    assert!(!shared.is_running());
}
