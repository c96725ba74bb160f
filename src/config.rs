//! 容器配置
//!
//! 所有字段都有默认值，配置文件只需写出需要修改的部分：
//!
//! ```toml
//! default_sources = ["enumerable", "lazy", "export_factory"]
//! trace_resolution = true
//!
//! [logging]
//! level = "debug"
//! format = "compact"
//! ```
//!
//! 环境变量优先于配置文件。

use crate::composition::sources::SourceKind;
use crate::errors::ConfigError;
use crate::logging::{LogFormat, LoggingConfig, LoggingEnvironment};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::Level;

pub const ENV_CONFIG_PATH: &str = "KEPHAS_COMPOSITION_CONFIG";
pub const ENV_TRACE_RESOLUTION: &str = "KEPHAS_COMPOSITION_TRACE_RESOLUTION";
pub const ENV_LOG_LEVEL: &str = "KEPHAS_COMPOSITION_LOG_LEVEL";
pub const ENV_DEFAULT_SOURCES: &str = "KEPHAS_COMPOSITION_DEFAULT_SOURCES";

const ENV_PREFIX: &str = "KEPHAS_COMPOSITION_";

/// 组合容器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// 容器默认安装的服务源，按顺序匹配
    pub default_sources: Vec<SourceKind>,
    /// 是否为每次解析输出 trace 事件
    pub trace_resolution: bool,
    pub logging: LoggingSection,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            default_sources: SourceKind::all(),
            trace_resolution: false,
            logging: LoggingSection::default(),
        }
    }
}

/// `[logging]` 配置段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
    pub show_target: bool,
    pub show_thread_ids: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: false,
        }
    }
}

impl CompositionConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, "<inline>")
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!("正在读取配置文件: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&content, &path.display().to_string())?;
        tracing::info!(path = %path.display(), "Loaded composition config");
        Ok(config)
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::TomlParse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 检查日志级别是否可解析
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_level(&self.logging.level).map(|_| ())
    }

    /// 用环境变量覆盖配置
    ///
    /// 传入预先收集好的环境变量，便于测试。
    pub fn apply_env_overrides(&mut self, env_map: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(value) = env_map.get(ENV_TRACE_RESOLUTION) {
            self.trace_resolution = parse_bool(ENV_TRACE_RESOLUTION, value)?;
        }

        if let Some(value) = env_map.get(ENV_LOG_LEVEL) {
            parse_level(value)?;
            self.logging.level = value.trim().to_lowercase();
        }

        if let Some(value) = env_map.get(ENV_DEFAULT_SOURCES) {
            self.default_sources = value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| {
                    SourceKind::from_str(item).map_err(|reason| ConfigError::InvalidValue {
                        key: ENV_DEFAULT_SOURCES.to_string(),
                        value: item.to_string(),
                        reason,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
        }

        Ok(())
    }

    /// 读取配置文件（若提供且存在），再应用进程环境变量
    pub fn from_env_or_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::load_from_file(path)?,
            Some(path) => {
                tracing::debug!("配置文件不存在，使用默认配置: {:?}", path);
                Self::default()
            }
            None => Self::default(),
        };

        let env_map: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        config.apply_env_overrides(&env_map)?;
        Ok(config)
    }

    /// 按 `KEPHAS_COMPOSITION_CONFIG` 指定的路径加载配置
    pub fn discover() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH).ok();
        let config = Self::from_env_or_file(path.as_deref().map(Path::new))
            .with_context(|| format!("failed to load composition config (path: {:?})", path))?;
        Ok(config)
    }

    /// 转换为日志初始化配置
    pub fn logging_config(&self) -> Result<LoggingConfig, ConfigError> {
        Ok(LoggingConfig {
            environment: LoggingEnvironment::Development,
            level: parse_level(&self.logging.level)?,
            format: self.logging.format,
            show_target: self.logging.show_target,
            show_thread_ids: self.logging.show_thread_ids,
        })
    }
}

fn parse_level(value: &str) -> Result<Level, ConfigError> {
    Level::from_str(value.trim()).map_err(|err| ConfigError::InvalidValue {
        key: "logging.level".to_string(),
        value: value.to_string(),
        reason: err.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CompositionConfig::default();
        assert_eq!(config.default_sources.len(), 7);
        assert!(!config.trace_resolution);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml() {
        let config = CompositionConfig::from_toml_str(
            r#"
            default_sources = ["enumerable", "lazy_with_metadata"]

            [logging]
            level = "debug"
            format = "compact"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.default_sources,
            vec![SourceKind::Enumerable, SourceKind::LazyWithMetadata]
        );
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.logging.show_target);
        assert_eq!(config.logging_config().unwrap().level, Level::DEBUG);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            CompositionConfig::from_toml_str("default_sources = [\"bogus\"]"),
            Err(ConfigError::TomlParse { .. })
        ));
        assert!(matches!(
            CompositionConfig::from_toml_str("[logging]\nlevel = \"loud\""),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CompositionConfig::default();
        let env_map = HashMap::from([
            (ENV_TRACE_RESOLUTION.to_string(), "yes".to_string()),
            (ENV_LOG_LEVEL.to_string(), "WARN".to_string()),
            (ENV_DEFAULT_SOURCES.to_string(), "list, export-factory".to_string()),
        ]);
        config.apply_env_overrides(&env_map).unwrap();

        assert!(config.trace_resolution);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(
            config.default_sources,
            vec![SourceKind::List, SourceKind::ExportFactory]
        );

        let bad = HashMap::from([(ENV_TRACE_RESOLUTION.to_string(), "maybe".to_string())]);
        assert!(config.apply_env_overrides(&bad).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "trace_resolution = true").unwrap();

        let config = CompositionConfig::load_from_file(file.path()).unwrap();
        assert!(config.trace_resolution);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            CompositionConfig::load_from_file(&missing),
            Err(ConfigError::FileRead { .. })
        ));
        assert_eq!(
            CompositionConfig::from_env_or_file(Some(&missing))
                .unwrap()
                .default_sources
                .len(),
            7
        );
    }
}
