//! Simulation configuration

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Category of random failure rolled each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Node,
    Link,
}

impl FailureKind {
    /// Roll order used by the scheduler
    pub const ALL: [FailureKind; 2] = [FailureKind::Node, FailureKind::Link];
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Node => write!(f, "node"),
            FailureKind::Link => write!(f, "link"),
        }
    }
}

impl std::str::FromStr for FailureKind {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "node" => Ok(FailureKind::Node),
            "link" => Ok(FailureKind::Link),
            other => Err(SimError::Config(format!("unknown failure kind '{other}'"))),
        }
    }
}

/// Configuration for a mesh simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Percent chance (0-100) that one random node toggles each tick
    pub node_fail_chance: u8,
    /// Percent chance (0-100) that one random link toggles each tick
    pub link_fail_chance: u8,
    /// Seed for the failure RNG; `None` seeds from the OS
    pub seed: Option<u64>,
    /// Upper bound on enumerated paths per node; `None` enumerates every simple path
    pub max_paths_per_node: Option<usize>,
    /// Hard cap on packet generation rounds for scenario drivers
    pub max_generation_rounds: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            node_fail_chance: 0,
            link_fail_chance: 0,
            seed: None,
            max_paths_per_node: None,
            max_generation_rounds: 5000,
        }
    }
}

impl SimConfig {
    /// Load a configuration from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_fail_chance(mut self, kind: FailureKind, chance: u8) -> Self {
        self.set_fail_chance(kind, chance);
        self
    }

    pub fn set_fail_chance(&mut self, kind: FailureKind, chance: u8) {
        match kind {
            FailureKind::Node => self.node_fail_chance = chance,
            FailureKind::Link => self.link_fail_chance = chance,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_paths(mut self, cap: usize) -> Self {
        self.max_paths_per_node = Some(cap);
        self
    }

    pub fn fail_chance(&self, kind: FailureKind) -> u8 {
        match kind {
            FailureKind::Node => self.node_fail_chance,
            FailureKind::Link => self.link_fail_chance,
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        for kind in FailureKind::ALL {
            check_chance(self.fail_chance(kind))?;
        }
        if self.max_paths_per_node == Some(0) {
            return Err(SimError::Config("max_paths_per_node must be at least 1".into()));
        }
        Ok(())
    }
}

/// Fail chances are percentages
pub(crate) fn check_chance(chance: u8) -> SimResult<()> {
    if chance > 100 {
        return Err(SimError::Config(format!(
            "failure chance {chance} is outside 0-100"
        )));
    }
    Ok(())
}
