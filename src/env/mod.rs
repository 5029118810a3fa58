//! Execution environment capture: conda environments and host details

pub mod conda;
pub mod host;

pub use conda::{parse_active_env, CondaEnv, CondaError, CondaSnapshot};
pub use host::HostInfo;
