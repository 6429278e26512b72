//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, SharedError};

/// 推送网关单次组播允许的最大令牌数
pub const GATEWAY_BATCH_LIMIT: usize = 500;

/// 推送配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// 每批令牌数上限，不得超过网关限制
    pub batch_size: usize,
    /// 标题与正文合计的最大字符数
    pub character_length_max: usize,
    /// 数据载荷中的点击动作标签
    pub click_action: String,
    /// 批次结果通道容量
    pub result_channel_capacity: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            batch_size: GATEWAY_BATCH_LIMIT,
            character_length_max: 200,
            click_action: "FLUTTER_NOTIFICATION_CLICK".to_string(),
            result_channel_capacity: 1,
        }
    }
}

impl PushConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > GATEWAY_BATCH_LIMIT {
            return Err(invalid(
                "push.batch_size",
                format!("必须在 1..={GATEWAY_BATCH_LIMIT} 之间，实际为 {}", self.batch_size),
            ));
        }
        // 半数上限至少要容纳省略号
        if self.character_length_max < 6 {
            return Err(invalid(
                "push.character_length_max",
                format!("不能小于 6，实际为 {}", self.character_length_max),
            ));
        }
        if self.result_channel_capacity == 0 {
            return Err(invalid("push.result_channel_capacity", "不能为 0".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: String) -> SharedError {
    SharedError::InvalidConfig {
        field: field.to_string(),
        message,
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub push: PushConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. .env 文件（如存在，仅填充进程环境变量）
    /// 2. config/default.toml（默认配置）
    /// 3. config/{environment}.toml（环境特定配置）
    /// 4. config/{service_name}.toml（服务特定配置）
    /// 5. 环境变量（PUSH_ 前缀，层级用双下划线，
    ///    如 PUSH_PUSH__BATCH_SIZE -> push.batch_size）
    pub fn load(service_name: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let env = std::env::var("PUSH_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("PUSH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.push.validate()?;

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
