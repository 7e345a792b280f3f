//! Turns a [`CapabilityRecord`] into parameters for the downstream GPU workload.
//!
//! Everything in here is a pure function of the record (and of a concurrency hint):
//! the tier comes from three of the reported limits, the tuning knobs from the tier caps
//! and two more limits.

use crate::record::{CapabilityRecord, LimitKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Iteration count used whenever the GPU path is not taken
pub const CPU_ITERATION_COUNT: u32 = 256;
/// Thread count used whenever the GPU path is not taken
pub const CPU_THREAD_COUNT: u32 = 64;

const MIB: u64 = 1024 * 1024;

/// Coarse classification of the GPU capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    /// No usable adapter
    Unavailable,
    /// An adapter exists but the invocation limit was not reported
    Unknown,
    Low,
    Medium,
    High,
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceTier::Unavailable => write!(f, "unavailable"),
            PerformanceTier::Unknown => write!(f, "unknown"),
            PerformanceTier::Low => write!(f, "low"),
            PerformanceTier::Medium => write!(f, "medium"),
            PerformanceTier::High => write!(f, "high"),
        }
    }
}

/// The limits a tier asks for, all of them must be met
struct TierThreshold {
    tier: PerformanceTier,
    invocations: u64,
    size_x: u64,
    storage_binding: u64,
}

const THRESHOLDS: [TierThreshold; 2] = [
    TierThreshold {
        tier: PerformanceTier::High,
        invocations: 1024,
        size_x: 1024,
        storage_binding: 128 * MIB,
    },
    TierThreshold {
        tier: PerformanceTier::Medium,
        invocations: 512,
        size_x: 512,
        storage_binding: 64 * MIB,
    },
];

/// Classifies the record, checking the high tier first and falling through to lower ones
///
/// A limit which was not reported never satisfies a threshold.
pub fn classify_tier(record: &CapabilityRecord) -> PerformanceTier {
    if !record.supported() {
        return PerformanceTier::Unavailable;
    }
    let Some(invocations) = record.limit(LimitKey::InvocationsPerWorkgroup) else {
        return PerformanceTier::Unknown;
    };
    let size_x = record.limit(LimitKey::WorkgroupSizeX).unwrap_or(0);
    let storage_binding = record.limit(LimitKey::StorageBufferBindingSize).unwrap_or(0);

    THRESHOLDS
        .iter()
        .find(|t| {
            invocations >= t.invocations
                && size_x >= t.size_x
                && storage_binding >= t.storage_binding
        })
        .map(|t| t.tier)
        .unwrap_or(PerformanceTier::Low)
}

/// Caps on the tuning knobs of a tier
struct TierCaps {
    iterations: u32,
    /// `workgroups_per_dimension` is divided by this before capping
    workgroup_divisor: u64,
    threads: u32,
}

fn tier_caps(tier: PerformanceTier) -> TierCaps {
    match tier {
        PerformanceTier::High => TierCaps {
            iterations: 512,
            workgroup_divisor: 2,
            threads: 256,
        },
        PerformanceTier::Medium => TierCaps {
            iterations: 384,
            workgroup_divisor: 3,
            threads: 128,
        },
        PerformanceTier::Low | PerformanceTier::Unknown | PerformanceTier::Unavailable => {
            TierCaps {
                iterations: CPU_ITERATION_COUNT,
                workgroup_divisor: 4,
                threads: CPU_THREAD_COUNT,
            }
        }
    }
}

/// `min(value, cap)`, a missing or zero value means the cap
fn capped(value: Option<u64>, cap: u32) -> u32 {
    match value {
        Some(v) if v > 0 => v.min(u64::from(cap)) as u32,
        _ => cap,
    }
}

/// Parameters handed to the downstream workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedParameters {
    #[serde(rename = "useGPU")]
    pub use_gpu: bool,
    pub performance_tier: PerformanceTier,
    pub iteration_count: u32,
    pub thread_count: u32,
    /// Speedup multiplier against a CPU only run
    pub estimated_gain: f64,
    /// Why the GPU path was forced off, when it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OptimizedParameters {
    pub fn cpu_fallback(concurrency: u32, reason: Option<String>) -> Self {
        let tier = PerformanceTier::Unavailable;
        OptimizedParameters {
            use_gpu: false,
            performance_tier: tier,
            iteration_count: CPU_ITERATION_COUNT,
            thread_count: CPU_THREAD_COUNT,
            estimated_gain: estimate_performance_gain(tier, concurrency),
            reason,
        }
    }

    pub fn description(&self) -> String {
        performance_description(self.performance_tier, self.estimated_gain)
    }
}

/// Derives the workload parameters from a record
///
/// `concurrency` is the number of parallel workers the workload intends to run, it only
/// feeds the gain estimate.
pub fn optimize(record: &CapabilityRecord, concurrency: u32) -> OptimizedParameters {
    if !record.supported() {
        return OptimizedParameters::cpu_fallback(concurrency, None);
    }

    let tier = classify_tier(record);
    let caps = tier_caps(tier);
    let iterations = record
        .limit(LimitKey::WorkgroupsPerDimension)
        .map(|per_dimension| per_dimension / caps.workgroup_divisor);

    OptimizedParameters {
        use_gpu: true,
        performance_tier: tier,
        iteration_count: capped(iterations, caps.iterations),
        thread_count: capped(record.limit(LimitKey::WorkgroupSizeX), caps.threads),
        estimated_gain: estimate_performance_gain(tier, concurrency),
        reason: None,
    }
}

/// Estimated speedup against the CPU only baseline with `concurrency` workers
///
/// Never below 1 for a tier with a GPU behind it, exactly 0 when there is none.
pub fn estimate_performance_gain(tier: PerformanceTier, concurrency: u32) -> f64 {
    let n = f64::from(concurrency);
    let gain = match tier {
        PerformanceTier::Unavailable => return 0.0,
        PerformanceTier::High => 20.0 + 2.0 * n,
        PerformanceTier::Medium => 10.0 + n,
        PerformanceTier::Low => 4.0 + 0.5 * n,
        PerformanceTier::Unknown => 0.0,
    };
    gain.max(1.0)
}

pub fn performance_description(tier: PerformanceTier, gain: f64) -> String {
    match tier {
        PerformanceTier::High => {
            format!("High-performance GPU detected, expect about {gain:.1}x faster processing")
        }
        PerformanceTier::Medium => {
            format!("Mid-range GPU detected, expect about {gain:.1}x faster processing")
        }
        PerformanceTier::Low => {
            format!("Entry-level GPU detected, expect about {gain:.1}x faster processing")
        }
        PerformanceTier::Unknown => {
            format!("GPU detected with unreported limits, expect about {gain:.1}x faster processing")
        }
        PerformanceTier::Unavailable => "GPU acceleration unavailable, running on the CPU".to_string(),
    }
}
