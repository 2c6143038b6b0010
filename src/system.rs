//! Subprocess plumbing shared by the powertop sampler and the firmware collector.

pub mod executor;
