pub mod estimator;
pub mod features;
pub mod service;
pub mod stats;
