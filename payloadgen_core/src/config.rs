use crate::attack::AttackType;
use crate::payloads::PayloadSpecs;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub attack: AttackType,
    #[serde(default)]
    pub payloads: PayloadSpecs,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub raws: Vec<String>,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

pub fn default_read_timeout_ms() -> u64 {
    15_000
}

impl GeneratorConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, anyhow::Error> {
        toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse generator config TOML: {}", e))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            attack: AttackType::default(),
            payloads: PayloadSpecs::new(),
            paths: Vec::new(),
            raws: Vec::new(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::GeneratorCoordinator;
    use crate::payloads::{InlinePayloadLoader, PayloadLists, PayloadSpec};
    use crate::stream::{PayloadStream, StreamProducer};
    use std::io::Write;
    use std::sync::Arc;

    const FULL_CONFIG: &str = r#"
attack = "clusterbomb"
paths = ["/admin", "/login"]
raws = ["GET /{{user}} HTTP/1.1"]
read-timeout-ms = 250

[payloads]
user = ["root", "admin"]
pass = """
hunter2
letmein
"""
"#;

    fn closed_producer() -> Arc<dyn StreamProducer> {
        Arc::new(|_attack: AttackType, _lists: Arc<PayloadLists>| {
            PayloadStream::spawn(1, |_sink| {})
        })
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = GeneratorConfig::from_toml_str("").expect("Empty TOML should parse");

        assert_eq!(config, GeneratorConfig::default());
        assert_eq!(config.attack, AttackType::Sniper);
        assert_eq!(config.read_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn full_config_parses_every_field() {
        let config = GeneratorConfig::from_toml_str(FULL_CONFIG).expect("Config should parse");

        assert_eq!(config.attack, AttackType::ClusterBomb);
        assert_eq!(config.paths, vec!["/admin", "/login"]);
        assert_eq!(config.raws.len(), 1);
        assert_eq!(config.read_timeout(), Duration::from_millis(250));
        assert_eq!(
            config.payloads["user"],
            PayloadSpec::Values(vec!["root".to_string(), "admin".to_string()])
        );
        assert!(
            matches!(&config.payloads["pass"], PayloadSpec::Source(text) if text.contains("letmein")),
            "Multi-line strings should deserialize as a source, got {:?}",
            config.payloads["pass"]
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = GeneratorConfig::from_toml_str("threads = 4\n");
        assert!(
            result.is_err(),
            "Unknown top-level keys should fail to parse, got {:?}",
            result
        );
    }

    #[test]
    fn unknown_attack_type_is_rejected() {
        let result = GeneratorConfig::from_toml_str("attack = \"battering-ram\"\n");
        assert!(result.is_err(), "Unknown attack type should fail, got {:?}", result);
    }

    #[test]
    fn load_from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(FULL_CONFIG.as_bytes())
            .expect("Failed to write temp config");

        let config = GeneratorConfig::load_from_file(file.path()).expect("Config should load");
        assert_eq!(config.paths.len(), 2);
    }

    #[test]
    fn load_from_missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let missing = dir.path().join("missing.toml");

        let err = GeneratorConfig::load_from_file(&missing)
            .expect_err("Missing file should fail to load");
        assert!(
            err.to_string().contains("missing.toml"),
            "Error should name the file, got: {}",
            err
        );
    }

    #[test]
    fn coordinator_builds_from_config() {
        let config = GeneratorConfig::from_toml_str(FULL_CONFIG).expect("Config should parse");

        let coordinator =
            GeneratorCoordinator::from_config(&config, &InlinePayloadLoader, closed_producer())
                .expect("Inline payloads should load");

        assert_eq!(coordinator.attack_type(), AttackType::ClusterBomb);
        assert_eq!(coordinator.total(), 3);
        assert_eq!(coordinator.read_timeout(), Duration::from_millis(250));
        assert_eq!(coordinator.payload_lists()["pass"], vec!["hunter2", "letmein"]);
        assert!(coordinator.has_payloads());
    }
}
