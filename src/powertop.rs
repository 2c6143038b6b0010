//! Powertop sampling path: report types, CSV report parser, tool invocation,
//! and the fixed-interval sampler that publishes the `powertop_*` gauges.

pub mod parser;
pub mod report;
pub mod sampler;
pub mod types;

pub use report::Powertop;
pub use sampler::{PowertopGauges, Sampler};
