use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DB_PATH_VAR: &str = "REGFIN_DB_PATH";
pub const EXPORT_DIR_VAR: &str = "REGFIN_EXPORT_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory listing holding one sub-directory per year of archives.
    pub archive_base_url: String,
    /// CSV export of the active-entity registry.
    pub registry_url: String,
    /// Number of distinct periods to collect, most recent first.
    pub max_periods: usize,
    pub request_timeout_secs: u64,
    pub database_path: PathBuf,
    pub export_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            archive_base_url: "https://dadosabertos.ans.gov.br/FTP/PDA/demonstracoes_contabeis/"
                .to_string(),
            registry_url:
                "https://dadosabertos.ans.gov.br/FTP/PDA/operadoras_de_plano_de_saude_ativas/Relatorio_cadop.csv"
                    .to_string(),
            max_periods: 3,
            request_timeout_secs: 60,
            database_path: PathBuf::from("regfin.db"),
            export_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file when given, otherwise starts from defaults; environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(DB_PATH_VAR).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(EXPORT_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            self.export_dir = Some(PathBuf::from(dir));
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_periods == 0 {
            return Err(ConfigError::Invalid("max_periods must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml("max_periods = 5\nexport_dir = \"out\"").unwrap();
        assert_eq!(config.max_periods, 5);
        assert_eq!(config.export_dir, Some(PathBuf::from("out")));
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.database_path, PathBuf::from("regfin.db"));
    }

    #[test]
    fn zero_periods_rejected() {
        let err = PipelineConfig::from_toml("max_periods = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_toml_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("max_periods = \"three\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn overrides_replace_paths() {
        let mut config = PipelineConfig::default();
        config.apply_overrides(|key| match key {
            DB_PATH_VAR => Some("/tmp/other.db".into()),
            EXPORT_DIR_VAR => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.export_dir, None);
    }
}
