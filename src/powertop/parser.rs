//! Powertop CSV report parser.
//! Turns the `--csv` report into typed values. Sections are located by row
//! content, each metric in its own scan, and malformed rows are skipped.
//!
//! Input fragments the parser recognises:
//!   "Summary: 175.4 wakeups/second,  0.0 GPU ops/seconds, 0.0 VFS ops/sec and 4.4% CPU use"
//!   "The system baseline power is estimated at:  3.23  W"
//!   " *  *  *   Software Settings in Need of Tuning   *  *  *"  followed by "Description;Script" rows

use tracing::trace;

use super::types::{BaselinePower, CycleSample, RawReportTable, SystemSample, Tunable, TunableCount};

const FIELD_SEPARATOR: char = ';';
const SUMMARY_PREFIX: &str = "Summary";
const BASELINE_MARKER: &str = "baseline power is estimated at";
const TUNING_SECTION_MARKER: &str = "Software Settings in Need of Tuning";
const SECTION_RULE_PREFIX: &str = "____";
const SECTION_TITLE_MARKER: &str = "*  *  *";

/// Split report text into rows of trimmed fields. Blank lines become a single empty field.
pub fn read_table(text: &str) -> RawReportTable {
    text.lines()
        .map(|line| {
            line.split(FIELD_SEPARATOR)
                .map(|field| field.trim().to_string())
                .collect()
        })
        .collect()
}

/// Run every scan over `table` and assemble the cycle's values.
pub fn parse_report(table: &RawReportTable) -> CycleSample {
    let baseline = parse_baseline_fragment(table)
        .map(|fragment| parse_baseline_power(&fragment))
        .unwrap_or_default();

    let tunables = parse_tunables(table);
    for tunable in &tunables {
        trace!(
            "Tunable: {} [{}]",
            tunable.description,
            tunable.script.as_deref().unwrap_or("no script")
        );
    }

    CycleSample {
        system: parse_system_sample(table),
        baseline,
        tunables: count_tunables(&tunables),
    }
}

/// Wakeups per second and CPU usage from the first `Summary` row.
/// Missing or unparsable values stay at zero.
pub fn parse_system_sample(table: &RawReportTable) -> SystemSample {
    let Some(row) = table.iter().find(|row| {
        row.first()
            .is_some_and(|field| field.starts_with(SUMMARY_PREFIX))
    }) else {
        return SystemSample::default();
    };

    let text = row.join(" ");
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    let wakeups_per_second = tokens
        .windows(2)
        .find(|pair| pair[1].starts_with("wakeups"))
        .and_then(|pair| parse_number(pair[0]))
        .unwrap_or(0.0);

    let cpu_usage_percent = tokens
        .windows(2)
        .find(|pair| pair[0].ends_with('%') && pair[1].eq_ignore_ascii_case("CPU"))
        .and_then(|pair| parse_number(pair[0].trim_end_matches('%')))
        .unwrap_or(0.0);

    SystemSample {
        wakeups_per_second,
        cpu_usage_percent,
    }
}

/// The raw text following the baseline-power marker, e.g. `"3.23  W"`.
pub fn parse_baseline_fragment(table: &RawReportTable) -> Option<String> {
    table.iter().find_map(|row| {
        let text = row.join(" ");
        let start = text.find(BASELINE_MARKER)? + BASELINE_MARKER.len();
        let rest = &text[start..];
        let rest = rest.trim_start().strip_prefix(':').unwrap_or(rest);
        let fragment = rest.trim();
        (!fragment.is_empty()).then(|| fragment.to_string())
    })
}

/// First number in the fragment, in watts. A `mW` unit is scaled down.
pub fn parse_baseline_power(fragment: &str) -> BaselinePower {
    let tokens: Vec<&str> = fragment.split_whitespace().collect();

    for (i, token) in tokens.iter().enumerate() {
        let (number, suffix) = split_unit(token);
        let Some(value) = parse_number(number) else {
            continue;
        };
        let unit = if suffix.is_empty() {
            tokens.get(i + 1).copied().unwrap_or("")
        } else {
            suffix
        };
        let watts = if unit.starts_with("mW") { value / 1000.0 } else { value };
        return BaselinePower { watts };
    }

    BaselinePower::default()
}

/// Rows of every tuning-suggestion section. The column header and rows
/// without both a description and a script column are skipped.
pub fn parse_tunables(table: &RawReportTable) -> Vec<Tunable> {
    let mut tunables = Vec::new();
    let mut in_section = false;

    for row in table {
        if row.iter().any(|field| field.contains(TUNING_SECTION_MARKER)) {
            in_section = true;
            continue;
        }
        if !in_section {
            continue;
        }
        if is_section_boundary(row) {
            in_section = false;
            continue;
        }
        if row.len() < 2 {
            continue;
        }

        let description = row[0].as_str();
        if description.is_empty() || description.eq_ignore_ascii_case("Description") {
            continue;
        }

        tunables.push(Tunable {
            description: description.to_string(),
            script: Some(row[1].as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        });
    }

    tunables
}

pub fn count_tunables(tunables: &[Tunable]) -> TunableCount {
    TunableCount {
        count: u32::try_from(tunables.len()).unwrap_or(u32::MAX),
    }
}

fn is_section_boundary(row: &[String]) -> bool {
    row.first()
        .is_some_and(|field| field.starts_with(SECTION_RULE_PREFIX) || field.contains(SECTION_TITLE_MARKER))
}

/// Split `"3.23W"` into `("3.23", "W")`. An exponent (`"1.5e3W"`) stays with
/// the number only when digits follow the `e`.
fn split_unit(token: &str) -> (&str, &str) {
    let bytes = token.as_bytes();
    let mut end = bytes
        .iter()
        .position(|b| !(b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+')))
        .unwrap_or(bytes.len());

    if end > 0 && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let digits = bytes[exponent.min(bytes.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits > 0 {
            end = exponent + digits;
        }
    }

    token.split_at(end)
}

/// Locale-free decimal parse. Non-finite values count as absent.
fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
____________________________________________________________________
 P o w e r T O P

____________________________________________________________________
 *  *  *   System Information   *  *  *

PowerTOP Version;v2.14 ran at Tue Oct 20 10:00:00 2026
Kernel Version;Linux version 6.1.0

____________________________________________________________________
 *  *  *   Overview of Software Power Consumers   *  *  *

The system baseline power is estimated at:  3.23  W

Summary: 175.4 wakeups/second,  0.0 GPU ops/seconds, 0.0 VFS ops/sec and 4.4% CPU use

Usage;Wakeups/s;GPU ops/s;Disk IO/s;GFX Wakeups/s;Category;Description;PW Estimate
  3.4 ms/s;  54.1;  0.0;  0.0;  0.0;Process;/usr/bin/gnome-shell;  150 mW

____________________________________________________________________
 *  *  *   Software Settings in Need of Tuning   *  *  *

Description;Script
Enable Audio codec power management;echo '1' > '/sys/module/snd_hda_intel/parameters/power_save';
NMI watchdog should be turned off;echo '0' > '/proc/sys/kernel/nmi_watchdog';
VM writeback timeout;echo '1500' > '/proc/sys/vm/dirty_writeback_centisecs';

____________________________________________________________________
 *  *  *   Untunable Software Issues   *  *  *

Description
I2C Adapter i2c-0 has no runtime power management
";

    #[test]
    fn parses_full_report() {
        let sample = parse_report(&read_table(REPORT));
        assert_eq!(sample.system.wakeups_per_second, 175.4);
        assert_eq!(sample.system.cpu_usage_percent, 4.4);
        assert_eq!(sample.baseline.watts, 3.23);
        assert_eq!(sample.tunables.count, 3);
    }

    #[test]
    fn tunables_capture_description_and_script() {
        let tunables = parse_tunables(&read_table(REPORT));
        assert_eq!(tunables[1].description, "NMI watchdog should be turned off");
        assert_eq!(
            tunables[1].script.as_deref(),
            Some("echo '0' > '/proc/sys/kernel/nmi_watchdog'")
        );
        // Rows from the following "Untunable" section are not counted
        assert!(tunables.iter().all(|t| !t.description.starts_with("I2C")));
    }

    #[test]
    fn sections_are_found_regardless_of_row_order() {
        let reordered = "\
 *  *  *   Software Settings in Need of Tuning   *  *  *
Description;Script
Enable SATA link power management for host0;echo 'med_power_with_dipm' > '/sys/class/scsi_host/host0/link_power_management_policy';
____________________________________________________________________
Summary: 12.5 wakeups/second,  0.0 GPU ops/seconds, 0.0 VFS ops/sec and 1.5% CPU use
The system baseline power is estimated at:  950 mW
";
        let sample = parse_report(&read_table(reordered));
        assert_eq!(sample.tunables.count, 1);
        assert_eq!(sample.system.wakeups_per_second, 12.5);
        assert_eq!(sample.system.cpu_usage_percent, 1.5);
        assert!((sample.baseline.watts - 0.95).abs() < 1e-9);
    }

    #[test]
    fn empty_table_yields_sentinels() {
        let sample = parse_report(&RawReportTable::new());
        assert_eq!(sample, CycleSample::default());
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let garbage = "\
;;;;
Summary:
Summary: abc wakeups/second and x% CPU use
The system baseline power is estimated at:
 *  *  *   Software Settings in Need of Tuning   *  *  *
lonely field without script
;echo 'missing description'
";
        let sample = parse_report(&read_table(garbage));
        assert_eq!(sample.system, SystemSample::default());
        assert_eq!(sample.baseline, BaselinePower::default());
        assert_eq!(sample.tunables.count, 0);
    }

    #[test]
    fn zero_wakeups_with_baseline_keeps_wakeups_sentinel() {
        let report = "\
The system baseline power is estimated at:  3.2  W
Summary: 0.0 wakeups/second,  0.0 GPU ops/seconds, 0.0 VFS ops/sec and 0.0% CPU use
";
        let sample = parse_report(&read_table(report));
        assert_eq!(sample.system.wakeups_per_second, 0.0);
        assert_eq!(sample.system.cpu_usage_percent, 0.0);
        assert_eq!(sample.baseline.watts, 3.2);
        assert_eq!(sample.tunables.count, 0);
    }

    #[test]
    fn baseline_fragment_tolerates_split_fields_and_attached_units() {
        let table = read_table("The system baseline power is estimated at:;4.1W");
        assert_eq!(parse_baseline_fragment(&table).as_deref(), Some("4.1W"));
        assert_eq!(parse_baseline_power("4.1W").watts, 4.1);
        assert_eq!(parse_baseline_power("unknown").watts, 0.0);
    }

    #[test]
    fn baseline_accepts_exponent_notation() {
        assert_eq!(split_unit("1.5e3W"), ("1.5e3", "W"));
        assert_eq!(parse_baseline_power("1.5e3W").watts, 1500.0);
        assert_eq!(parse_baseline_power("2.5E+3 mW").watts, 2.5);
        // a bare "e" with no digits is not an exponent
        assert_eq!(split_unit("7e"), ("7", "e"));
        assert_eq!(parse_baseline_power("900mW").watts, 0.9);
    }

    #[test]
    fn summary_split_across_fields_still_parses() {
        let table = read_table("Summary:;88.0;wakeups/second;12.0%;CPU use");
        let sample = parse_system_sample(&table);
        assert_eq!(sample.wakeups_per_second, 88.0);
        assert_eq!(sample.cpu_usage_percent, 12.0);
    }

    #[test]
    fn non_finite_numbers_are_absent() {
        let table = read_table("Summary: NaN wakeups/second and inf% CPU use");
        assert_eq!(parse_system_sample(&table), SystemSample::default());
    }
}
