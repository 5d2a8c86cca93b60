//! Pricing strategy: implied probabilities, cross-book mispricing
//! detection, and the exposure estimate.

pub mod edge;
pub mod exposure;
pub mod probability;

pub use edge::{DetectionConfig, MarketKey, MispricingDetector};
pub use exposure::ExposureEstimator;
pub use probability::{implied_probability, implied_probability_str, AmericanOdds};
