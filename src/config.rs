use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 文档集合的存储文件
    pub store_path: String,
    /// 待录入文件所在目录
    pub intake_folder: String,
    /// 本批文件的递送人（批次公共字段）
    pub delivered_by: String,
    /// 签署办公室（批次公共字段，可选）
    pub signing_office: Option<String>,
    /// 同时进行的提取请求数量
    pub max_concurrent_extractions: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: "documents.json".to_string(),
            intake_folder: "intake".to_string(),
            delivered_by: String::new(),
            signing_office: None,
            max_concurrent_extractions: 8,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取配置，文件中未出现的键使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// 从 TOML 文本解析配置
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 加载配置
    ///
    /// 若设置了 `DOCFLOW_CONFIG`，先读取该 TOML 文件，再用环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("DOCFLOW_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(path.trim())?,
            _ => Self::default(),
        };
        base.with_env_overrides()
    }

    fn with_env_overrides(self) -> Result<Self, ConfigError> {
        Ok(Self {
            store_path: env_string("STORE_PATH").unwrap_or(self.store_path),
            intake_folder: env_string("INTAKE_FOLDER").unwrap_or(self.intake_folder),
            delivered_by: env_string("DELIVERED_BY").unwrap_or(self.delivered_by),
            signing_office: env_string("SIGNING_OFFICE").or(self.signing_office),
            max_concurrent_extractions: env_parse("MAX_CONCURRENT_EXTRACTIONS", "usize")?
                .unwrap_or(self.max_concurrent_extractions),
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool")?
                .unwrap_or(self.verbose_logging),
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
        })
    }

    /// 检查数值类配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_extractions == 0 {
            return Err(ConfigError::EnvVarParseFailed {
                var_name: "MAX_CONCURRENT_EXTRACTIONS".to_string(),
                value: "0".to_string(),
                expected_type: "正整数",
            });
        }
        Ok(())
    }
}

/// 读取非空环境变量
fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

/// 解析环境变量，未设置时返回 None
fn env_parse<T: std::str::FromStr>(
    var_name: &str,
    expected_type: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env_string(var_name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_partial_keys_fall_back_to_defaults() {
        let config = Config::from_toml_str(
            r#"
            store_path = "/var/lib/docflow/documents.json"
            delivered_by = "Front Desk"
            max_concurrent_extractions = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.store_path, "/var/lib/docflow/documents.json");
        assert_eq!(config.delivered_by, "Front Desk");
        assert_eq!(config.max_concurrent_extractions, 3);
        assert_eq!(config.intake_folder, "intake");
        assert!(config.signing_office.is_none());
    }

    #[test]
    fn test_toml_rejects_wrong_types() {
        assert!(Config::from_toml_str("max_concurrent_extractions = \"many\"").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config {
            max_concurrent_extractions: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_env_parse_reports_bad_value() {
        std::env::set_var("DOCFLOW_TEST_CONCURRENCY", "lots");
        let err = env_parse::<usize>("DOCFLOW_TEST_CONCURRENCY", "usize").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarParseFailed { .. }));

        std::env::set_var("DOCFLOW_TEST_CONCURRENCY", " 4 ");
        assert_eq!(
            env_parse::<usize>("DOCFLOW_TEST_CONCURRENCY", "usize").unwrap(),
            Some(4)
        );
        assert_eq!(env_parse::<usize>("DOCFLOW_TEST_UNSET_VAR", "usize").unwrap(), None);
    }

    #[test]
    fn test_missing_config_file_is_read_error() {
        let err = Config::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }
}
