//! Command line front end: probes the GPU of this machine and prints what it found.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use anyhow::Context;
    use clap::Parser;
    use gpu_probe::config::{PowerPreference, ProbeConfig, DEFAULT_CONCURRENCY};
    use gpu_probe::interface::WgpuApi;
    use gpu_probe::optimizer::OptimizedParameters;
    use gpu_probe::prober::Prober;
    use gpu_probe::record::CapabilityRecord;
    use gpu_probe::runtime::HostContext;
    use serde::Serialize;

    /// Check whether GPU compute is usable here and how to tune a workload for it.
    #[derive(Parser)]
    #[clap(author, version, about, long_about = None)]
    pub struct Cli {
        /// User agent to run the runtime compatibility check against
        #[clap(short, long)]
        pub user_agent: Option<String>,
        /// Pretend the context is not secure
        #[clap(long)]
        pub insecure: bool,
        /// Number of parallel workers the workload intends to run
        #[clap(short, long, default_value_t = DEFAULT_CONCURRENCY)]
        pub concurrency: u32,
        /// Ask for a software adapter
        #[clap(long)]
        pub fallback_adapter: bool,
        /// Prefer the low power adapter
        #[clap(long)]
        pub low_power: bool,
        /// Print the record and the parameters as JSON
        #[clap(long)]
        pub json: bool,
        /// Log every check
        #[clap(short, long)]
        pub verbose: bool,
    }

    #[derive(Serialize)]
    struct Report<'a> {
        status: &'a str,
        record: &'a CapabilityRecord,
        parameters: &'a OptimizedParameters,
        description: String,
    }

    pub async fn run() -> anyhow::Result<()> {
        let cli = Cli::parse();

        if cli.verbose {
            use env_logger::Env;
            let env = Env::default()
                .filter_or("RUST_LOG", "info")
                .write_style_or("RUST_LOG_STYLE", "always");

            env_logger::init_from_env(env);
        }

        let power_preference = if cli.low_power {
            PowerPreference::LowPower
        } else {
            PowerPreference::HighPerformance
        };
        let config = ProbeConfig::default()
            .with_power_preference(power_preference)
            .with_fallback_adapter(cli.fallback_adapter)
            .with_concurrency(cli.concurrency);

        let mut host = HostContext::native();
        host.secure_context = !cli.insecure;
        if let Some(user_agent) = cli.user_agent {
            host.user_agent = user_agent;
        }

        let mut prober = Prober::new(WgpuApi::new(config), host);
        let parameters = prober.optimized_parameters(cli.concurrency).await;
        let record = prober.record();

        if cli.json {
            let report = Report {
                status: prober.status_message(),
                record,
                parameters: &parameters,
                description: parameters.description(),
            };
            let json = serde_json::to_string_pretty(&report).context("can't serialize the report")?;
            println!("{json}");
            return Ok(());
        }

        println!("{}", prober.status_message());
        for (key, value) in record.performance_info() {
            println!("  {key}: {value}");
        }
        for (key, value) in record.limits() {
            println!("  {key}: {value}");
        }
        if !record.reasons().is_empty() {
            println!("Diagnostics:");
            for reason in record.reasons() {
                println!("  - {reason}");
            }
        }
        println!(
            "Tier {}: {} iterations, {} threads, GPU {}",
            parameters.performance_tier,
            parameters.iteration_count,
            parameters.thread_count,
            if parameters.use_gpu { "on" } else { "off" },
        );
        println!("{}", parameters.description());
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() {
    if let Err(err) = cli::run().await {
        eprintln!("gpu-probe: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
