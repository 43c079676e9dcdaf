//! Machine configuration, stored as JSON

use crate::PcError;
use emu86_core::logging::LogLevel;
use emu86_core::CpuModel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcConfig {
    pub cpu_model: CpuModel,
    /// Segment loaded into CS, DS and ES before the program starts
    pub load_segment: u16,
    /// Offset of the first instruction (0100h, after the PSP)
    pub origin: u16,
    pub stack_segment: u16,
    pub stack_pointer: u16,
    /// Instruction budget for one `run`; `None` runs unbounded
    pub max_steps: Option<u64>,
    /// Mirror console output to stdout while running
    pub echo: bool,
    pub install_bios: bool,
    pub install_dos: bool,
    pub log_level: String,
}

impl Default for PcConfig {
    fn default() -> Self {
        Self {
            cpu_model: CpuModel::default(),
            load_segment: 0x1000,
            origin: 0x0100,
            stack_segment: 0x1000,
            stack_pointer: 0xFFFE,
            max_steps: Some(10_000_000),
            echo: false,
            install_bios: true,
            install_dos: true,
            log_level: "warn".to_string(),
        }
    }
}

impl PcConfig {
    /// Load a config file, falling back to defaults if it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PcError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(PcError::Io(e)),
        };
        serde_json::from_str(&contents)
            .map_err(|e| PcError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PcError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn log_level(&self) -> Result<LogLevel, PcError> {
        LogLevel::from_str(&self.log_level)
            .ok_or_else(|| PcError::Config(format!("unknown log level '{}'", self.log_level)))
    }
}
