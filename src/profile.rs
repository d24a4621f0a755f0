/// Hardware profiles: the resource limits and throughput of a PE array.
/// Presets mirror the chips the simulator was first calibrated against.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Preset or user-supplied name
    pub name: String,
    /// Maximum number of processing elements
    pub max_procs: usize,
    /// Local memory per PE in KB
    pub max_proc_mem_kb: usize,
    /// Interconnect bandwidth per PE in bytes per cycle
    pub bandwidth: u64,
    /// Fused multiply-adds per cycle per PE
    pub fmacs_per_cycle: u64,
    /// Clock frequency in GHz
    pub clock_ghz: f64,
    /// Fraction of peak FMA throughput a block product achieves, in (0, 1]
    pub efficiency: f64,
}

impl HardwareProfile {
    /// V100-like tensor-core array: 800 PEs, 4 MB per PE.
    pub fn v100() -> Self {
        HardwareProfile {
            name: "v100".to_string(),
            max_procs: 800,
            max_proc_mem_kb: 4096,
            bandwidth: 4,
            fmacs_per_cycle: 64,
            clock_ghz: 1.2,
            efficiency: 0.8,
        }
    }

    /// HPC cluster with 1024 CPU nodes, 16 MB working memory each.
    pub fn hpc1024() -> Self {
        HardwareProfile {
            name: "hpc1024".to_string(),
            max_procs: 1024,
            max_proc_mem_kb: 16384,
            bandwidth: 1,
            fmacs_per_cycle: 32,
            clock_ghz: 2.0,
            efficiency: 0.8,
        }
    }

    /// Fallback profile for unrecognized names: many small PEs on a wide fabric.
    pub fn generic() -> Self {
        HardwareProfile {
            name: "generic".to_string(),
            max_procs: 1000,
            max_proc_mem_kb: 384,
            bandwidth: 8192,
            fmacs_per_cycle: 4,
            clock_ghz: 1.0,
            efficiency: 0.8,
        }
    }

    pub fn presets() -> Vec<HardwareProfile> {
        vec![Self::v100(), Self::hpc1024(), Self::generic()]
    }

    /// Resolve a preset by name. Unknown names fall back to `generic()`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "v100" => Self::v100(),
            "hpc1024" => Self::hpc1024(),
            "generic" => Self::generic(),
            other => {
                log::warn!("unknown hardware profile '{}', using generic", other);
                Self::generic()
            }
        }
    }

    /// Load a custom profile from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let profile: HardwareProfile = serde_json::from_str(&data)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        let reason = if self.max_procs == 0 {
            Some("max_procs must be at least 1")
        } else if self.bandwidth == 0 {
            Some("bandwidth must be at least 1 byte/cycle")
        } else if self.fmacs_per_cycle == 0 {
            Some("fmacs_per_cycle must be at least 1")
        } else if !(self.efficiency > 0.0 && self.efficiency <= 1.0) {
            Some("efficiency must lie in (0, 1]")
        } else if !(self.clock_ghz > 0.0) {
            Some("clock_ghz must be positive")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SimError::InvalidProfile {
                name: self.name.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Peak throughput of the whole array in TFLOPS: clock · 2·fmacs · procs
    pub fn peak_tflops(&self) -> f64 {
        self.clock_ghz * 2.0 * self.fmacs_per_cycle as f64 * self.max_procs as f64 / 1000.0
    }
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self::v100()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_falls_back_to_generic() {
        assert_eq!(HardwareProfile::from_name("tpu9000"), HardwareProfile::generic());
        assert_eq!(HardwareProfile::from_name("V100"), HardwareProfile::v100());
    }

    #[test]
    fn presets_are_valid() {
        for profile in HardwareProfile::presets() {
            profile.validate().unwrap();
        }
    }

    #[test]
    fn rejects_bad_efficiency() {
        let mut profile = HardwareProfile::v100();
        profile.efficiency = 1.5;
        assert!(profile.validate().is_err());
        profile.efficiency = 0.0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn json_round_trip_through_file() {
        let path = std::env::temp_dir().join("mosaicsim_profile_test.json");
        let profile = HardwareProfile { name: "custom".to_string(), ..HardwareProfile::hpc1024() };
        std::fs::write(&path, serde_json::to_string(&profile).unwrap()).unwrap();
        let loaded = HardwareProfile::from_json_file(&path).unwrap();
        assert_eq!(loaded, profile);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn v100_peak() {
        // 1.2 GHz · 128 flops/cycle · 800 PEs = 122.88 TFLOPS
        assert!((HardwareProfile::v100().peak_tflops() - 122.88).abs() < 1e-9);
    }
}
