// ─── Host Platform ───
// Maps the running host onto the os/arch vocabulary used by version manifests.

use std::collections::HashMap;
use std::fmt;

use crate::core::error::{ProvisionError, ProvisionResult};

/// Architecture tag used for rule matching and native selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetArch {
    Bits32,
    Bits64,
    Arm64,
}

impl TargetArch {
    /// Value substituted for `${arch}` in natives classifier templates.
    pub fn natives_token(self) -> &'static str {
        match self {
            TargetArch::Bits32 => "32",
            TargetArch::Bits64 => "64",
            TargetArch::Arm64 => "arm64",
        }
    }

    /// Value compared against a rule's `os.arch`.
    pub fn rule_arch(self) -> &'static str {
        match self {
            TargetArch::Bits32 => "x86",
            TargetArch::Bits64 => "x86_64",
            TargetArch::Arm64 => "arm64",
        }
    }

    fn from_rust_arch(arch: &str) -> Option<Self> {
        match arch {
            "x86" => Some(TargetArch::Bits32),
            "x86_64" => Some(TargetArch::Bits64),
            "aarch64" => Some(TargetArch::Arm64),
            _ => None,
        }
    }
}

impl fmt::Display for TargetArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rule_arch())
    }
}

/// The os name / arch pair the pipeline provisions for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub os_name: String,
    pub arch: TargetArch,
}

impl HostPlatform {
    pub fn new(os_name: impl Into<String>, arch: TargetArch) -> Self {
        Self {
            os_name: os_name.into(),
            arch,
        }
    }

    /// Detect the current host. Unknown OS or architecture is an error.
    pub fn detect() -> ProvisionResult<Self> {
        let os_name = match std::env::consts::OS {
            "windows" => "windows",
            "macos" => "osx",
            "linux" => "linux",
            other => {
                return Err(ProvisionError::Config(format!(
                    "unsupported operating system: {other}"
                )))
            }
        };
        let arch = TargetArch::from_rust_arch(std::env::consts::ARCH).ok_or_else(|| {
            ProvisionError::Config(format!(
                "unsupported architecture: {}",
                std::env::consts::ARCH
            ))
        })?;
        Ok(Self::new(os_name, arch))
    }

    /// Rule context without feature flags (libraries, JVM arguments).
    pub fn rule_context(&self) -> RuleContext {
        RuleContext {
            os_name: self.os_name.clone(),
            os_arch: Some(self.arch.rule_arch().to_string()),
            features: None,
        }
    }

    pub fn classpath_separator(&self) -> &'static str {
        if self.os_name == "windows" {
            ";"
        } else {
            ":"
        }
    }
}

/// Inputs a rule list is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleContext {
    pub os_name: String,
    pub os_arch: Option<String>,
    pub features: Option<HashMap<String, bool>>,
}

impl RuleContext {
    pub fn with_features(mut self, features: HashMap<String, bool>) -> Self {
        self.features = Some(features);
        self
    }
}
