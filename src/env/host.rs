//! Host and operating system details

use serde::{Deserialize, Serialize};
use sysinfo::System;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// `std::env::consts::OS`, e.g. "linux", "windows"
    pub os: String,
    pub arch: String,
    pub family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<usize>,
}

impl HostInfo {
    pub fn capture() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            os_name: System::name(),
            os_version: System::long_os_version().or_else(System::os_version),
            kernel_version: System::kernel_version(),
            hostname: System::host_name(),
            cpus: std::thread::available_parallelism().ok().map(|n| n.get()),
        }
    }

    /// e.g. "linux/x86_64 (Ubuntu 22.04)"
    pub fn summary(&self) -> String {
        match &self.os_version {
            Some(version) => format!("{}/{} ({})", self.os, self.arch, version),
            None => format!("{}/{}", self.os, self.arch),
        }
    }
}
