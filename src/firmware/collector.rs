//! `rpi_*` metrics collector.
//! Every scrape runs one complete collection pass while holding the collector
//! lock, so concurrent scrapes are serialized and the power estimate always
//! uses voltage and frequency from the same pass. Items whose command fails
//! are left out of that scrape; the pass itself never fails.

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, Opts};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::decode::{self, DecodeError, ThrottleState};
use super::power_model::{self, PowerModel, DEFAULT_CORE_VOLTAGE, DEFAULT_CPU_FREQUENCY_MHZ};
use super::types::{
    CollectorSnapshot, FirmwareReadings, PowerEstimate, CLOCK_DOMAINS, MEMORY_TYPES, SDRAM_RAILS,
};
use super::{FirmwareQuery, Vcgencmd};
use crate::config::types::FirmwareSettings;

struct MetricDef {
    name: &'static str,
    help: &'static str,
    label: Option<&'static str>,
}

const POWER_WATTS: MetricDef = MetricDef {
    name: "rpi_power_watts",
    help: "Current power usage in watts",
    label: None,
};
const POWER_KILOWATTS: MetricDef = MetricDef {
    name: "rpi_power_kilowatts",
    help: "Current power usage in kilowatts",
    label: None,
};
const POWER_KWH_PER_DAY: MetricDef = MetricDef {
    name: "rpi_power_kwh_per_day",
    help: "Estimated kilowatt hours per day",
    label: None,
};
const POWER_KWH_PER_MONTH: MetricDef = MetricDef {
    name: "rpi_power_kwh_per_month",
    help: "Estimated kilowatt hours per month",
    label: None,
};
const VOLTAGE_CORE: MetricDef = MetricDef {
    name: "rpi_voltage_core",
    help: "Core voltage in volts",
    label: None,
};
const VOLTAGE_SDRAM: MetricDef = MetricDef {
    name: "rpi_voltage_sdram",
    help: "SDRAM voltage readings",
    label: Some("type"),
};
const CPU_FREQUENCY: MetricDef = MetricDef {
    name: "rpi_cpu_frequency_mhz",
    help: "CPU frequency in MHz",
    label: None,
};
const CPU_TEMPERATURE: MetricDef = MetricDef {
    name: "rpi_cpu_temperature_celsius",
    help: "CPU temperature in Celsius",
    label: None,
};
const CLOCK_FREQUENCY: MetricDef = MetricDef {
    name: "rpi_clock_frequency_hz",
    help: "Clock frequencies for different components",
    label: Some("component"),
};
const POWER_STATE: MetricDef = MetricDef {
    name: "rpi_power_state",
    help: "Power state indicators (1 for true, 0 for false)",
    label: Some("state"),
};
const MEMORY_SPLIT: MetricDef = MetricDef {
    name: "rpi_memory_split_mb",
    help: "Memory split between ARM and GPU in MB",
    label: Some("type"),
};

const ALL_METRICS: [&MetricDef; 11] = [
    &POWER_WATTS,
    &POWER_KILOWATTS,
    &POWER_KWH_PER_DAY,
    &POWER_KWH_PER_MONTH,
    &VOLTAGE_CORE,
    &VOLTAGE_SDRAM,
    &CPU_FREQUENCY,
    &CPU_TEMPERATURE,
    &CLOCK_FREQUENCY,
    &POWER_STATE,
    &MEMORY_SPLIT,
];

impl MetricDef {
    fn opts(&self) -> Opts {
        Opts::new(self.name, self.help)
    }

    fn desc(&self) -> prometheus::Result<Desc> {
        Desc::new(
            self.name.to_string(),
            self.help.to_string(),
            self.label.iter().map(|l| l.to_string()).collect(),
            HashMap::new(),
        )
    }

    fn gauge(&self, value: f64) -> Vec<MetricFamily> {
        match Gauge::with_opts(self.opts()) {
            Ok(gauge) => {
                gauge.set(value);
                gauge.collect()
            }
            Err(e) => {
                warn!("Cannot build {}: {}", self.name, e);
                Vec::new()
            }
        }
    }

    /// One sample per label value; no family at all when `values` is empty.
    fn labeled<'a>(&self, values: impl IntoIterator<Item = (&'a str, f64)>) -> Vec<MetricFamily> {
        let Some(label) = self.label else {
            return Vec::new();
        };
        let vec = match GaugeVec::new(self.opts(), &[label]) {
            Ok(vec) => vec,
            Err(e) => {
                warn!("Cannot build {}: {}", self.name, e);
                return Vec::new();
            }
        };

        let mut samples = 0;
        for (label_value, value) in values {
            vec.with_label_values(&[label_value]).set(value);
            samples += 1;
        }

        if samples == 0 {
            Vec::new()
        } else {
            vec.collect()
        }
    }
}

pub struct FirmwareCollector {
    query: Arc<dyn FirmwareQuery>,
    model: Box<dyn PowerModel>,
    runtime: Handle,
    descs: Vec<Desc>,
    snapshot: Mutex<CollectorSnapshot>,
}

impl FirmwareCollector {
    pub fn new(
        query: Arc<dyn FirmwareQuery>,
        model: Box<dyn PowerModel>,
        runtime: Handle,
    ) -> prometheus::Result<Self> {
        let descs = ALL_METRICS
            .iter()
            .map(|def| def.desc())
            .collect::<prometheus::Result<Vec<_>>>()?;

        Ok(Self {
            query,
            model,
            runtime,
            descs,
            snapshot: Mutex::new(CollectorSnapshot::default()),
        })
    }

    /// Collector backed by `vcgencmd`, with the power model chosen from the device model string.
    pub fn from_settings(
        settings: &FirmwareSettings,
        device_model: Option<&str>,
        runtime: Handle,
    ) -> prometheus::Result<Self> {
        let model = power_model::select_model(device_model, settings.accessory_attached);
        Self::new(Arc::new(Vcgencmd::new(settings)), model, runtime)
    }

    /// Run one collection pass and return its metric families.
    pub async fn scrape(&self) -> Vec<MetricFamily> {
        let mut snapshot = self.snapshot.lock().await;

        let readings = self.read_all().await;
        let voltage = readings.core_voltage.unwrap_or(DEFAULT_CORE_VOLTAGE);
        let frequency = readings.cpu_frequency_mhz.unwrap_or(DEFAULT_CPU_FREQUENCY_MHZ);
        let power = PowerEstimate::from_watts(self.model.estimate_watts(voltage, frequency));

        *snapshot = CollectorSnapshot {
            readings,
            power,
            passes: snapshot.passes + 1,
        };
        debug!(
            "Firmware pass {}: {:.3}W from {}V @ {}MHz",
            snapshot.passes, power.watts, voltage, frequency
        );

        metric_families(&snapshot)
    }

    async fn read_all(&self) -> FirmwareReadings {
        let core_voltage = self.read(&["measure_volts", "core"], decode::parse_voltage).await;

        let mut sdram_voltages = std::collections::BTreeMap::new();
        for rail in SDRAM_RAILS {
            let arg = format!("sdram_{rail}");
            if let Some(volts) = self.read(&["measure_volts", arg.as_str()], decode::parse_voltage).await {
                sdram_voltages.insert(rail, volts);
            }
        }

        let cpu_frequency_mhz = self
            .read(&["measure_clock", "arm"], decode::parse_clock_hz)
            .await
            .map(|hz| hz / 1_000_000.0);
        let cpu_temperature_celsius = self.read(&["measure_temp"], decode::parse_temperature).await;

        let mut clock_frequencies_hz = std::collections::BTreeMap::new();
        for domain in CLOCK_DOMAINS {
            if let Some(hz) = self.read(&["measure_clock", domain], decode::parse_clock_hz).await {
                clock_frequencies_hz.insert(domain, hz);
            }
        }

        let throttle = self
            .read(&["get_throttled"], decode::parse_throttled)
            .await
            .map(ThrottleState::decode);

        let mut memory_split_mb = std::collections::BTreeMap::new();
        for half in MEMORY_TYPES {
            if let Some(mb) = self.read(&["get_mem", half], decode::parse_memory_mb).await {
                memory_split_mb.insert(half, mb);
            }
        }

        FirmwareReadings {
            core_voltage,
            sdram_voltages,
            cpu_frequency_mhz,
            cpu_temperature_celsius,
            clock_frequencies_hz,
            throttle,
            memory_split_mb,
        }
    }

    async fn read<T>(&self, args: &[&str], decode: fn(&str) -> Result<T, DecodeError>) -> Option<T> {
        match self.query.query(args).await {
            Ok(output) => match decode(&output) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("vcgencmd {}: {}", args.join(" "), e);
                    None
                }
            },
            Err(e) => {
                warn!("vcgencmd {} failed: {:#}", args.join(" "), e);
                None
            }
        }
    }
}

fn metric_families(snapshot: &CollectorSnapshot) -> Vec<MetricFamily> {
    let readings = &snapshot.readings;
    let power = &snapshot.power;
    let mut families = Vec::new();

    families.extend(POWER_WATTS.gauge(power.watts));
    families.extend(POWER_KILOWATTS.gauge(power.kilowatts));
    families.extend(POWER_KWH_PER_DAY.gauge(power.kwh_per_day));
    families.extend(POWER_KWH_PER_MONTH.gauge(power.kwh_per_month));

    if let Some(volts) = readings.core_voltage {
        families.extend(VOLTAGE_CORE.gauge(volts));
    }
    families.extend(VOLTAGE_SDRAM.labeled(readings.sdram_voltages.iter().map(|(rail, v)| (*rail, *v))));

    if let Some(mhz) = readings.cpu_frequency_mhz {
        families.extend(CPU_FREQUENCY.gauge(mhz));
    }
    if let Some(celsius) = readings.cpu_temperature_celsius {
        families.extend(CPU_TEMPERATURE.gauge(celsius));
    }

    families.extend(
        CLOCK_FREQUENCY.labeled(readings.clock_frequencies_hz.iter().map(|(domain, hz)| (*domain, *hz))),
    );
    families.extend(POWER_STATE.labeled(
        readings
            .throttle
            .iter()
            .flat_map(|state| state.iter())
            .map(|(name, set)| (name, if set { 1.0 } else { 0.0 })),
    ));
    families.extend(
        MEMORY_SPLIT.labeled(readings.memory_split_mb.iter().map(|(half, mb)| (*half, *mb as f64))),
    );

    families
}

impl Collector for FirmwareCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    /// Blocks on a full collection pass. Must run on a blocking thread
    /// (the metrics handler gathers inside `spawn_blocking`).
    fn collect(&self) -> Vec<MetricFamily> {
        self.runtime.block_on(self.scrape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use prometheus::Registry;

    use crate::firmware::power_model::{analytic_watts, AnalyticModel};

    struct FakeFirmware {
        responses: HashMap<&'static str, &'static str>,
    }

    impl FakeFirmware {
        fn healthy() -> HashMap<&'static str, &'static str> {
            HashMap::from([
                ("measure_volts core", "volt=0.8600V"),
                ("measure_volts sdram_c", "volt=1.1000V"),
                ("measure_volts sdram_i", "volt=1.1000V"),
                ("measure_volts sdram_p", "volt=1.1000V"),
                ("measure_clock arm", "frequency(48)=1500000000"),
                ("measure_temp", "temp=47.2'C"),
                ("measure_clock core", "frequency(1)=500000000"),
                ("measure_clock v3d", "frequency(46)=500000000"),
                ("measure_clock uart", "frequency(22)=48000000"),
                ("measure_clock emmc", "frequency(50)=200000000"),
                ("measure_clock pixel", "frequency(29)=0"),
                ("measure_clock hdmi", "frequency(0)=0"),
                ("get_throttled", "throttled=0x50005"),
                ("get_mem gpu", "gpu=76M"),
                ("get_mem arm", "arm=948M"),
            ])
        }

        fn with(responses: HashMap<&'static str, &'static str>) -> Arc<Self> {
            Arc::new(Self { responses })
        }
    }

    #[async_trait]
    impl FirmwareQuery for FakeFirmware {
        async fn query(&self, args: &[&str]) -> Result<String> {
            self.responses
                .get(args.join(" ").as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| anyhow!("vcgencmd: exit status 255"))
        }
    }

    /// Every answer carries the pass number, which advances on the first query of a pass.
    struct CountingFirmware {
        pass: AtomicU64,
    }

    #[async_trait]
    impl FirmwareQuery for CountingFirmware {
        async fn query(&self, args: &[&str]) -> Result<String> {
            let n = if args == ["measure_volts", "core"] {
                self.pass.fetch_add(1, Ordering::SeqCst) + 1
            } else {
                self.pass.load(Ordering::SeqCst)
            };
            tokio::task::yield_now().await;
            Ok(match args[0] {
                "measure_volts" => format!("volt={n}V"),
                "measure_temp" => format!("temp={n}'C"),
                "measure_clock" => format!("frequency(1)={}", n * 1_000_000),
                "get_throttled" => format!("throttled=0x{n:x}"),
                _ => format!("{}={n}M", args[1]),
            })
        }
    }

    fn collector(query: Arc<dyn FirmwareQuery>) -> FirmwareCollector {
        FirmwareCollector::new(query, Box::new(AnalyticModel), Handle::current()).unwrap()
    }

    fn values(families: &[MetricFamily], name: &str) -> Vec<(String, f64)> {
        families
            .iter()
            .filter(|f| f.get_name() == name)
            .flat_map(|f| f.get_metric().iter())
            .map(|m| {
                let label = m
                    .get_label()
                    .first()
                    .map(|l| l.get_value().to_string())
                    .unwrap_or_default();
                (label, m.get_gauge().get_value())
            })
            .collect()
    }

    fn single(families: &[MetricFamily], name: &str) -> Option<f64> {
        values(families, name).first().map(|(_, v)| *v)
    }

    #[tokio::test]
    async fn healthy_pass_emits_every_family() {
        let collector = collector(FakeFirmware::with(FakeFirmware::healthy()));
        let families = collector.scrape().await;

        assert_eq!(families.len(), 11);
        assert_eq!(single(&families, "rpi_voltage_core"), Some(0.86));
        assert_eq!(values(&families, "rpi_voltage_sdram").len(), 3);
        assert_eq!(single(&families, "rpi_cpu_frequency_mhz"), Some(1500.0));
        assert_eq!(single(&families, "rpi_cpu_temperature_celsius"), Some(47.2));
        assert_eq!(values(&families, "rpi_clock_frequency_hz").len(), 7);

        let states: HashMap<String, f64> = values(&families, "rpi_power_state").into_iter().collect();
        assert_eq!(states.len(), 8);
        assert_eq!(states["under_voltage_detected"], 1.0);
        assert_eq!(states["freq_capped"], 0.0);
        assert_eq!(states["throttling_occurred"], 1.0);
        assert_eq!(states["soft_temp_limit_occurred"], 0.0);

        let memory: HashMap<String, f64> = values(&families, "rpi_memory_split_mb").into_iter().collect();
        assert_eq!(memory["gpu"], 76.0);
        assert_eq!(memory["arm"], 948.0);

        let watts = single(&families, "rpi_power_watts").unwrap();
        assert_eq!(watts, analytic_watts(0.86, 1500.0));
        assert_eq!(single(&families, "rpi_power_kilowatts"), Some(watts / 1000.0));
        assert_eq!(single(&families, "rpi_power_kwh_per_day"), Some(watts / 1000.0 * 24.0));
    }

    #[tokio::test]
    async fn failing_items_are_omitted_independently() {
        let mut responses = FakeFirmware::healthy();
        responses.insert("measure_temp", "Command not registered");
        responses.insert("measure_volts sdram_i", "volt=abcV");
        responses.remove("get_mem gpu");
        responses.remove("measure_clock hdmi");
        let collector = collector(FakeFirmware::with(responses));

        let families = collector.scrape().await;

        assert_eq!(single(&families, "rpi_cpu_temperature_celsius"), None);
        let mut rails: Vec<String> = values(&families, "rpi_voltage_sdram").into_iter().map(|(l, _)| l).collect();
        rails.sort();
        assert_eq!(rails, vec!["c", "p"]);
        assert_eq!(values(&families, "rpi_memory_split_mb"), vec![("arm".to_string(), 948.0)]);
        assert_eq!(values(&families, "rpi_clock_frequency_hz").len(), 6);
        assert_eq!(single(&families, "rpi_voltage_core"), Some(0.86));
        assert_eq!(values(&families, "rpi_power_state").len(), 8);
    }

    #[tokio::test]
    async fn all_commands_failing_still_reports_default_power() {
        let collector = collector(FakeFirmware::with(HashMap::new()));
        let families = collector.scrape().await;

        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert_eq!(
            names,
            vec!["rpi_power_watts", "rpi_power_kilowatts", "rpi_power_kwh_per_day", "rpi_power_kwh_per_month"]
        );
        assert_eq!(
            single(&families, "rpi_power_watts"),
            Some(analytic_watts(DEFAULT_CORE_VOLTAGE, DEFAULT_CPU_FREQUENCY_MHZ))
        );
    }

    #[tokio::test]
    async fn known_board_uses_table_range() {
        let collector = FirmwareCollector::new(
            FakeFirmware::with(FakeFirmware::healthy()),
            power_model::select_model(Some("Raspberry Pi 5 Model B Rev 1.0"), false),
            Handle::current(),
        )
        .unwrap();

        let families = collector.scrape().await;
        // 0.86² × 1.5 ≈ 1.11 W, below the board's idle draw
        assert_eq!(single(&families, "rpi_power_watts"), Some(2.7));
    }

    #[tokio::test]
    async fn concurrent_scrapes_never_tear() {
        let firmware = Arc::new(CountingFirmware { pass: AtomicU64::new(0) });
        let collector = collector(firmware.clone());

        for _ in 0..5 {
            let (a, b) = tokio::join!(collector.scrape(), collector.scrape());
            for families in [a, b] {
                let pass = single(&families, "rpi_voltage_core").unwrap();
                assert!(values(&families, "rpi_voltage_sdram").iter().all(|(_, v)| *v == pass));
                assert_eq!(single(&families, "rpi_cpu_temperature_celsius"), Some(pass));
                assert_eq!(single(&families, "rpi_cpu_frequency_mhz"), Some(pass));
                assert!(values(&families, "rpi_memory_split_mb").iter().all(|(_, v)| *v == pass));
            }
        }

        assert_eq!(firmware.pass.load(Ordering::SeqCst), 10);
        assert_eq!(collector.snapshot.lock().await.passes, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn registry_gather_runs_a_blocking_pass() {
        let registry = Registry::new();
        registry
            .register(Box::new(collector(FakeFirmware::with(FakeFirmware::healthy()))))
            .unwrap();

        let families = tokio::task::spawn_blocking(move || registry.gather()).await.unwrap();

        assert!(families.iter().any(|f| f.get_name() == "rpi_power_watts"));
        assert_eq!(single(&families, "rpi_cpu_temperature_celsius"), Some(47.2));
    }

    #[test]
    fn describes_every_family() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let collector = FirmwareCollector::new(
            FakeFirmware::with(HashMap::new()),
            Box::new(AnalyticModel),
            runtime.handle().clone(),
        )
        .unwrap();
        assert_eq!(collector.desc().len(), ALL_METRICS.len());
    }
}
