// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含数据库、服务器、工作器、限流、提供商、存储和维护等所有配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 工作器配置
    pub worker: WorkerSettings,
    /// 提供商限流配置
    pub rate_limiting: RateLimitingSettings,
    /// 生成提供商配置
    pub provider: ProviderSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 队列维护配置
    pub maintenance: MaintenanceSettings,
}

/// 数据库配置设置
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 服务器配置设置
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
    /// Prometheus指标导出端口
    pub metrics_port: u16,
}

/// 工作器配置设置
#[derive(Debug, Deserialize)]
pub struct WorkerSettings {
    /// 启动的工作器数量
    pub count: usize,
    /// 单个工作器的并发执行上限
    pub concurrency: usize,
    /// 轮询间隔（秒）
    pub poll_interval_secs: u64,
}

/// 提供商限流配置设置
#[derive(Debug, Deserialize)]
pub struct RateLimitingSettings {
    /// 是否启用限流
    pub enabled: bool,
    /// 单个工作器对提供商的每分钟请求数上限
    ///
    /// 多个工作器实例共享同一个提供商配额时需按实例数等分
    pub provider_rpm: u32,
}

/// 生成提供商配置设置
#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    /// 提供商API基础URL
    pub base_url: String,
    /// 提供商API密钥
    pub api_key: Option<String>,
    /// 单次请求超时时间（秒）
    pub timeout_secs: Option<u64>,
}

/// 存储配置设置
#[derive(Debug, Deserialize)]
pub struct StorageSettings {
    /// 存储类型 (local, s3)
    pub storage_type: String,
    /// 本地存储路径 (当 type=local 时使用)
    pub local_path: Option<String>,
    /// S3 区域
    pub s3_region: Option<String>,
    /// S3 存储桶名称
    pub s3_bucket: Option<String>,
    /// S3 访问密钥
    pub s3_access_key: Option<String>,
    /// S3 密钥
    pub s3_secret_key: Option<String>,
    /// S3 端点 (可选，用于 MinIO 等兼容服务)
    pub s3_endpoint: Option<String>,
}

/// 队列维护配置设置
#[derive(Debug, Deserialize)]
pub struct MaintenanceSettings {
    /// 领取过期阈值（秒），也是系统层面事实上的执行超时
    ///
    /// 按最慢的任务类型取值，视频生成明显比图片处理耗时
    pub stale_threshold_secs: u64,
    /// 过期回收间隔（秒）
    pub reclaim_interval_secs: u64,
    /// 终态任务保留天数
    pub archive_retention_days: u32,
    /// 归档间隔（秒）
    pub archive_interval_secs: u64,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.metrics_port", 9000)?
            // Default DB pool settings
            .set_default("database.url", "postgres://localhost:5432/genrs")?
            .set_default("database.max_connections", 100)?
            .set_default("database.min_connections", 10)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Default Worker settings
            .set_default("worker.count", 1)?
            .set_default("worker.concurrency", 3)?
            .set_default("worker.poll_interval_secs", 5)?
            // Default Rate Limiting settings
            .set_default("rate_limiting.enabled", true)?
            .set_default("rate_limiting.provider_rpm", 50)?
            // Default Provider settings
            .set_default("provider.base_url", "http://localhost:8188")?
            .set_default("provider.timeout_secs", 120)?
            // Default Storage settings
            .set_default("storage.storage_type", "local")?
            .set_default("storage.local_path", "./storage")?
            // Default Maintenance settings
            .set_default("maintenance.stale_threshold_secs", 300)?
            .set_default("maintenance.reclaim_interval_secs", 60)?
            .set_default("maintenance.archive_retention_days", 7)?
            .set_default("maintenance.archive_interval_secs", 86400)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("GENRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
