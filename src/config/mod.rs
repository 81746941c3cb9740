use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::error::{CoordinatorError, CoordinatorResult};
use crate::core::types::StatementLimits;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub query_manager: QueryManagerConfig,
    pub log: LogConfig,
}

/// 查询协调相关配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct QueryManagerConfig {
    /// 每个节点上最多积压的分片数，交给阶段执行对象
    pub max_pending_splits_per_node: usize,
    /// 共享工作线程数
    pub executor_threads: usize,
    /// 工作线程名前缀
    pub executor_thread_name: String,
    /// 语句最大嵌套深度
    pub max_statement_depth: usize,
    /// 语句最大语法节点数
    pub max_statement_nodes: usize,
    /// 客户端心跳超时（秒），超时的查询被判定为被遗弃
    pub client_timeout_secs: u64,
    /// 保留的已结束查询数量
    pub max_query_history: usize,
}

impl Default for QueryManagerConfig {
    fn default() -> Self {
        Self {
            max_pending_splits_per_node: 100,
            executor_threads: num_cpus::get() * 2,
            executor_thread_name: "query-scheduler".to_string(),
            max_statement_depth: 512,
            max_statement_nodes: 100_000,
            client_timeout_secs: 300,
            max_query_history: 100,
        }
    }
}

impl QueryManagerConfig {
    pub fn statement_limits(&self) -> StatementLimits {
        StatementLimits::new(self.max_statement_depth, self.max_statement_nodes)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn validate(&self) -> CoordinatorResult<()> {
        if self.max_pending_splits_per_node == 0 {
            return Err(CoordinatorError::config(
                "max_pending_splits_per_node must be greater than 0",
            ));
        }
        if self.executor_threads == 0 {
            return Err(CoordinatorError::config("executor_threads must be greater than 0"));
        }
        if self.executor_thread_name.trim().is_empty() {
            return Err(CoordinatorError::config("executor_thread_name must not be empty"));
        }
        if self.max_statement_depth == 0 || self.max_statement_nodes == 0 {
            return Err(CoordinatorError::config("statement limits must be greater than 0"));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
            file: "querycoord".to_string(),
            max_file_size: 100 * 1024 * 1024, // 100MB
            max_files: 5,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> CoordinatorResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CoordinatorError::config(format!("无法读取配置文件 {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CoordinatorResult<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| CoordinatorError::config(format!("配置解析失败: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> CoordinatorResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CoordinatorError::config(format!("配置序列化失败: {}", e)))?;
        fs::write(path.as_ref(), content).map_err(|e| {
            CoordinatorError::config(format!("无法写入配置文件 {}: {}", path.as_ref().display(), e))
        })
    }

    pub fn validate(&self) -> CoordinatorResult<()> {
        self.query_manager.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.query_manager.max_pending_splits_per_node, 100);
        assert_eq!(config.query_manager.executor_thread_name, "query-scheduler");
        assert_eq!(config.log.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_save() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temporary file");

        let mut config = Config::default();
        config.query_manager.executor_threads = 3;
        let toml_content =
            toml::to_string_pretty(&config).expect("Failed to serialize config to TOML");
        temp_file
            .write_all(toml_content.as_bytes())
            .expect("Failed to write TOML content to temporary file");

        let loaded_config =
            Config::load(temp_file.path()).expect("Failed to load config from temporary file");
        assert_eq!(config, loaded_config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [query_manager]
            max_statement_depth = 64
            "#,
        )
        .expect("部分配置应能加载");
        assert_eq!(config.query_manager.max_statement_depth, 64);
        assert_eq!(config.query_manager.max_pending_splits_per_node, 100);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_invalid_pending_splits_rejected() {
        let result = Config::from_toml(
            r#"
            [query_manager]
            max_pending_splits_per_node = 0
            "#,
        );
        assert!(matches!(result, Err(CoordinatorError::Config(_))));
    }
}
