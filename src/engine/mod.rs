//! Core engine: normalize a provider payload, then run detection and
//! exposure over the resulting quotes, once per polling cycle.

pub mod cycle;
pub mod normalizer;
