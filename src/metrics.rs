//! Exporter-wide metrics registry.

use prometheus::{GaugeVec, Opts, Registry};

pub const BUILD_INFO: &str = "power_metrics_exporter_build_info";

/// A fresh registry carrying the exporter's build info gauge.
pub fn new_registry() -> prometheus::Result<Registry> {
    let registry = Registry::new();

    let build_info = GaugeVec::new(
        Opts::new(BUILD_INFO, "Exporter build information, value is always 1"),
        &["version"],
    )?;
    build_info
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);
    registry.register(Box::new(build_info))?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exposes_build_info() {
        let families = new_registry().unwrap().gather();
        assert_eq!(families.len(), 1);

        let family = &families[0];
        assert_eq!(family.get_name(), BUILD_INFO);
        let metric = &family.get_metric()[0];
        assert_eq!(metric.get_label()[0].get_name(), "version");
        assert_eq!(metric.get_label()[0].get_value(), env!("CARGO_PKG_VERSION"));
        assert_eq!(metric.get_gauge().get_value(), 1.0);
    }
}
