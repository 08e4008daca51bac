pub mod config;
pub mod error;
pub mod types;

#[cfg(feature = "behavioral")]
pub mod behavioral;

#[cfg(feature = "rating")]
pub mod rating;

#[cfg(feature = "classifier")]
pub mod classifier;

#[cfg(feature = "forward_looking")]
pub mod forward_looking;

#[cfg(feature = "staging")]
pub mod staging;

#[cfg(feature = "write_off")]
pub mod write_off;

pub use config::PrinadConfig;
pub use error::PrinadError;
pub use types::*;

/// Standard result type for all PRINAD operations
pub type PrinadResult<T> = Result<T, PrinadError>;
