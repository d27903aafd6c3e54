//! Detection configuration, loadable from TOML.

use std::io::BufRead;
use std::time::Duration;

use serde::Deserialize;

use super::error::Error;
use super::perception::{BondPerceiver, ObabelPerceiver};
use super::{Detector, FormatKind};
use crate::model::table::ElementTable;

/// Everything needed to start a detection run:
///
/// ```toml
/// format = "dump"
/// elements = ["C", "H", "O"]
///
/// [perception]
/// program = "obabel"
/// timeout_secs = 30
/// ```
///
/// The `perception` table is only consulted for the `dump` format and may
/// be omitted entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectConfig {
    pub format: FormatKind,
    /// Element symbols indexed by zero-based species type.
    pub elements: Vec<String>,
    #[serde(default)]
    pub perception: PerceptionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerceptionConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_program() -> String {
    String::from("obabel")
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            timeout_secs: None,
        }
    }
}

impl PerceptionConfig {
    pub fn perceiver(&self) -> Box<dyn BondPerceiver + Send + Sync> {
        let mut perceiver = ObabelPerceiver::with_program(self.program.as_str());
        if let Some(secs) = self.timeout_secs {
            perceiver = perceiver.timeout(Duration::from_secs(secs));
        }
        Box::new(perceiver)
    }
}

impl DetectConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, Error> {
        Ok(toml::from_str(raw)?)
    }

    pub fn element_table(&self) -> Result<ElementTable, Error> {
        Ok(ElementTable::from_symbols(&self.elements)?)
    }

    /// Scans the header of `reader` and builds the matching detector,
    /// wiring up the configured perceiver for dump input.
    pub fn detector<R: BufRead>(&self, reader: R) -> Result<Detector, Error> {
        let table = self.element_table()?;
        let perceiver = match self.format {
            FormatKind::Dump => Some(self.perception.perceiver()),
            FormatKind::Bond => None,
        };
        Detector::scan(self.format, reader, &table, perceiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = DetectConfig::from_toml_str(
            r#"
format = "dump"
elements = ["C", "H", "O"]

[perception]
program = "/opt/openbabel/bin/obabel"
timeout_secs = 30
"#,
        )
        .unwrap();
        assert_eq!(config.format, FormatKind::Dump);
        assert_eq!(config.elements, vec!["C", "H", "O"]);
        assert_eq!(config.perception.program, "/opt/openbabel/bin/obabel");
        assert_eq!(config.perception.timeout_secs, Some(30));
    }

    #[test]
    fn perception_section_is_optional() {
        let config = DetectConfig::from_toml_str(
            r#"
format = "bond"
elements = ["C"]
"#,
        )
        .unwrap();
        assert_eq!(config.format, FormatKind::Bond);
        assert_eq!(config.perception.program, "obabel");
        assert_eq!(config.perception.timeout_secs, None);
    }

    #[test]
    fn rejects_unknown_format_kind() {
        let err = DetectConfig::from_toml_str(
            r#"
format = "xtc"
elements = ["C"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn element_table_reports_bad_symbol() {
        let config = DetectConfig::from_toml_str(
            r#"
format = "bond"
elements = ["C", "Qq"]
"#,
        )
        .unwrap();
        let err = config.element_table().unwrap_err();
        assert!(matches!(err, Error::Element(_)));
    }

    #[test]
    fn builds_bond_detector_from_config() {
        use std::io::Cursor;

        let config = DetectConfig::from_toml_str(
            r#"
format = "bond"
elements = ["C"]
"#,
        )
        .unwrap();
        let data = "\
# Number of particles 2
1 1 1 2 1 1.0
2 1 1 1 1 1.0
# Number of particles 2
1 1 1 2 1 1.0
2 1 1 1 1 1.0
";
        let detector = config.detector(Cursor::new(data)).unwrap();
        assert_eq!(detector.n_atoms(), 2);
        assert_eq!(detector.stride(), 3);
        assert!(matches!(detector, Detector::Bond(_)));
    }
}
