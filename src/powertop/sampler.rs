//! Fixed-interval powertop sampler.
//! Each cycle runs powertop against a fresh scratch report, parses it, and
//! publishes the `powertop_*` gauges. Cycles never overlap: the loop awaits
//! each cycle, including report cleanup, before waiting for the next tick.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Gauge, Registry};
use tokio::sync::{Notify, RwLock};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::parser;
use super::report::{ReportTool, ScratchReport};
use super::types::CycleSample;
use crate::config::types::SamplerSettings;

/// The four powertop gauges, created once at startup.
#[derive(Clone)]
pub struct PowertopGauges {
    pub tunables: Gauge,
    pub wakeups: Gauge,
    pub cpu_usage: Gauge,
    pub baseline_power: Gauge,
}

impl PowertopGauges {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            tunables: Gauge::new(
                "powertop_tunables_count",
                "counts the number of tuning available by powertop",
            )?,
            wakeups: Gauge::new(
                "powertop_wakeup_count",
                "counts the wake up calls per second available by powertop",
            )?,
            cpu_usage: Gauge::new("powertop_cpu_usage_count", "counts the cpu usage in % by powertop")?,
            baseline_power: Gauge::new(
                "powertop_baseline_power_count",
                "counts the baseline power used available by powertop",
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.tunables.clone()))?;
        registry.register(Box::new(self.wakeups.clone()))?;
        registry.register(Box::new(self.cpu_usage.clone()))?;
        registry.register(Box::new(self.baseline_power.clone()))?;
        Ok(())
    }

    /// Zero means "not found" for wakeups, CPU usage and baseline power, so
    /// those gauges keep their previous value. The tunables count is always set.
    pub fn publish(&self, sample: &CycleSample) {
        if sample.system.wakeups_per_second != 0.0 {
            self.wakeups.set(sample.system.wakeups_per_second);
        }
        if sample.system.cpu_usage_percent != 0.0 {
            self.cpu_usage.set(sample.system.cpu_usage_percent);
        }
        if sample.baseline.watts != 0.0 {
            self.baseline_power.set(sample.baseline.watts);
        }
        self.tunables.set(f64::from(sample.tunables.count));
    }
}

pub struct Sampler {
    tool: Arc<dyn ReportTool>,
    gauges: PowertopGauges,
    scratch_dir: PathBuf,
    interval: Duration,
    running: Arc<RwLock<bool>>,
    stop_signal: Arc<Notify>,
}

impl Sampler {
    pub fn new(tool: Arc<dyn ReportTool>, gauges: PowertopGauges, settings: &SamplerSettings) -> Self {
        Self {
            tool,
            gauges,
            scratch_dir: settings.scratch_dir.clone(),
            interval: settings.interval(),
            running: Arc::new(RwLock::new(true)),
            stop_signal: Arc::new(Notify::new()),
        }
    }

    /// Run one sampling cycle. Returns the published sample, or `None` when
    /// the cycle was skipped; the scratch report is gone either way.
    pub async fn run_cycle(&self) -> Option<CycleSample> {
        let report = match ScratchReport::create(&self.scratch_dir) {
            Ok(report) => report,
            Err(e) => {
                warn!("Skipping powertop cycle: {:#}", e);
                return None;
            }
        };

        debug!("Running powertop, report: {:?}", report.path());
        match self.tool.generate(report.path()).await {
            Ok(stdout) => debug!("powertop output:\n{}", stdout.trim_end()),
            Err(e) => {
                warn!("powertop invocation failed: {:#}", e);
                return None;
            }
        }

        let text = match report.read_to_string().await {
            Ok(text) => text,
            Err(e) => {
                warn!("Keeping previous powertop values: {:#}", e);
                return None;
            }
        };

        let sample = parser::parse_report(&parser::read_table(&text));
        debug!(
            "powertop sample: wakeups={} cpu_usage={}% baseline={}W tunables={}",
            sample.system.wakeups_per_second,
            sample.system.cpu_usage_percent,
            sample.baseline.watts,
            sample.tunables.count
        );

        self.gauges.publish(&sample);
        Some(sample)
    }

    /// Sample at the configured interval until [`Sampler::stop`] is called.
    /// A cycle in progress always runs to completion.
    pub async fn run(&self) {
        info!("powertop sampler started, interval {:.1}s", self.interval.as_secs_f64());

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.stop_signal.notified() => {}
            }

            if !*self.running.read().await {
                break;
            }

            self.run_cycle().await;
            cycles += 1;
        }

        info!("powertop sampler stopped after {} cycles", cycles);
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.stop_signal.notify_one();
    }
}
