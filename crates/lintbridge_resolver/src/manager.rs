//! Package manager identities.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A package manager that can own a global `node_modules` directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PackageManager {
    /// All known managers, in the order they are reported.
    pub const ALL: [PackageManager; 4] = [
        PackageManager::Npm,
        PackageManager::Yarn,
        PackageManager::Pnpm,
        PackageManager::Bun,
    ];

    /// Name of the manager's executable.
    pub fn binary(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Bun => "bun",
        }
    }

    /// Lockfiles written by this manager.
    pub fn lockfiles(self) -> &'static [&'static str] {
        match self {
            PackageManager::Npm => &["package-lock.json", "npm-shrinkwrap.json"],
            PackageManager::Yarn => &["yarn.lock"],
            PackageManager::Pnpm => &["pnpm-lock.yaml"],
            PackageManager::Bun => &["bun.lockb", "bun.lock"],
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

impl FromStr for PackageManager {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "npm" => Ok(PackageManager::Npm),
            "yarn" => Ok(PackageManager::Yarn),
            "pnpm" => Ok(PackageManager::Pnpm),
            "bun" => Ok(PackageManager::Bun),
            other => Err(format!("unknown package manager: {other}")),
        }
    }
}

/// Detects the package manager used by the project containing `cwd`.
///
/// Walks up from `cwd` and returns the manager owning the first lockfile
/// found. Returns `None` when no lockfile exists in any ancestor.
pub fn detect_package_manager(cwd: &Path) -> Option<PackageManager> {
    for dir in cwd.ancestors() {
        for manager in PackageManager::ALL {
            if manager
                .lockfiles()
                .iter()
                .any(|name| dir.join(name).is_file())
            {
                return Some(manager);
            }
        }
    }
    None
}
