//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<ExhaleConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {:?}", path))?;
    let config: ExhaleConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {:?}", path))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Mapping;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
source:
  kind: prerecorded
  input_file: resp.csv
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.filter.cutoff, 1.0);
        assert_eq!(config.midi.port, "HCI 1");
        assert_eq!(config.mapping, Mapping::default());
        assert_eq!(config.relay.capacity, 2000);
        assert_eq!(config.viz.history, 20000);
        assert_eq!(config.viz.tick_ms, 20);
    }

    #[test]
    fn test_load_live_controller_config() {
        let yaml = r#"
source:
  kind: live
  channel: 2
  calibration_secs: 10
  streams:
    - name: OpenSignals RESP
      bind: "0.0.0.0:5555"
      sample_rate: 1000
filter:
  cutoff: 0.8
midi:
  port: loopMIDI Port
mapping:
  kind: controller
  cc: 1
  channel: 3
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.midi.port, "loopMIDI Port");
        assert_eq!(config.mapping, Mapping::ToController { cc: 1, channel: 3 });
        match config.source {
            SourceConfig::Live(live) => {
                assert_eq!(live.channel, 2);
                assert_eq!(live.streams.len(), 1);
                assert_eq!(live.streams[0].sample_rate, 1000.0);
            }
            other => panic!("expected live source, got {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let yaml = r#"
source:
  kind: prerecorded
  input_file: resp.csv
  sampling_rate: 100
filter:
  cutoff: 60
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_bundled_example_is_valid() {
        let config: ExhaleConfig =
            serde_yaml::from_str(include_str!("../../exhale.example.yaml")).unwrap();
        assert!(config.validate().is_ok());
    }
}
