//! Values derived from one powertop report.
//!
//! Zero is a sentinel for [`SystemSample`] and [`BaselinePower`]: it means the
//! parser found nothing, and the sampler leaves the matching gauge untouched.

/// Report rows as read from the CSV file, each split into trimmed fields.
pub type RawReportTable = Vec<Vec<String>>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemSample {
    pub wakeups_per_second: f64,
    pub cpu_usage_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BaselinePower {
    pub watts: f64,
}

/// One entry of powertop's "Software Settings in Need of Tuning" section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunable {
    pub description: String,
    pub script: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunableCount {
    pub count: u32,
}

/// Everything one sampling cycle publishes. Owned by that cycle only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleSample {
    pub system: SystemSample,
    pub baseline: BaselinePower,
    pub tunables: TunableCount,
}
