// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 生成任务实体
///
/// 表示一次长耗时的AI生成操作，如图片生成、视频生成、
/// 图片放大或背景移除。任务由服务端持久化排队，
/// 由工作器独占领取并执行，支持重试和过期回收。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 任务类型，决定任务的分发和执行逻辑
    pub task_type: TaskType,
    /// 任务状态，跟踪任务在其生命周期中的当前阶段
    pub status: TaskStatus,
    /// 任务所属用户ID，所有外部读写都按此隔离
    pub owner_id: Uuid,
    /// 所属项目ID，用于归属和权限校验
    pub project_id: Uuid,
    /// 画布元素ID，任务完成后需要更新的元素（可选）
    pub shape_id: Option<String>,
    /// 任务负载数据，按任务类型变化，创建时校验
    pub body: serde_json::Value,
    /// 任务结果，成功时为资源引用和元数据，失败时为错误信息
    pub result: Option<serde_json::Value>,
    /// 已重试次数，每次执行失败时递增
    pub retry_count: i32,
    /// 最大重试次数，超出后任务永久失败
    pub max_retries: i32,
    /// 当前持有任务的工作器ID，未被领取时为空
    pub worker_id: Option<Uuid>,
    /// 领取时间，与worker_id成对出现，用于过期检测
    pub claimed_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 开始执行时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 完成时间（成功或失败）
    pub completed_at: Option<DateTime<FixedOffset>>,
    /// 最后更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 任务类型枚举
///
/// 封闭的类型标签，每种类型对应一个外部生成操作，
/// 分发时做穷尽匹配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// 图片生成任务
    #[default]
    GenerateImage,
    /// 视频生成任务
    GenerateVideo,
    /// 图片放大任务
    ImageUpscale,
    /// 图片背景移除任务
    ImageRemoveBackground,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskType::GenerateImage => write!(f, "generate_image"),
            TaskType::GenerateVideo => write!(f, "generate_video"),
            TaskType::ImageUpscale => write!(f, "image_upscale"),
            TaskType::ImageRemoveBackground => write!(f, "image_remove_background"),
        }
    }
}

impl FromStr for TaskType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate_image" => Ok(TaskType::GenerateImage),
            "generate_video" => Ok(TaskType::GenerateVideo),
            "image_upscale" => Ok(TaskType::ImageUpscale),
            "image_remove_background" => Ok(TaskType::ImageRemoveBackground),
            _ => Err(()),
        }
    }
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → Processing → Completed/Failed
/// Processing 还可能回到 Pending（瞬时失败重试或过期回收）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 等待中，任务已创建但尚未被工作器领取
    #[default]
    Pending,
    /// 处理中，任务已被某个工作器独占领取
    Processing,
    /// 已完成，任务成功执行完成
    Completed,
    /// 已失败，任务执行失败且已达到最大重试次数
    Failed,
}

impl TaskStatus {
    /// 判断是否为终态
    ///
    /// 终态任务只能通过归档或取消删除，不再发生状态转换
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 任务结果负载
///
/// 序列化后写入任务的result字段。成功时携带资源引用和元数据，
/// 失败时携带错误码、错误信息和尝试次数。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskResult {
    /// 生成产物在对象存储中的键
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_key: Option<String>,
    /// 对象存储返回的etag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// 产物的内容类型
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// 产物大小（字节）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// 执行耗时（毫秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// 错误码，仅失败时存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// 错误信息，仅失败时存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// 总尝试次数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl TaskResult {
    /// 构造成功结果
    pub fn success(
        asset_key: String,
        etag: String,
        content_type: String,
        size_bytes: u64,
        duration_ms: u64,
    ) -> Self {
        Self {
            asset_key: Some(asset_key),
            etag: Some(etag),
            content_type: Some(content_type),
            size_bytes: Some(size_bytes),
            duration_ms: Some(duration_ms),
            ..Default::default()
        }
    }

    /// 构造失败结果
    pub fn failure(error_code: &str, error_message: String, attempts: u32) -> Self {
        Self {
            error_code: Some(error_code.to_string()),
            error_message: Some(error_message),
            attempts: Some(attempts),
            ..Default::default()
        }
    }
}

impl Task {
    /// 创建一个新的待处理任务
    ///
    /// # 参数
    ///
    /// * `task_type` - 任务类型
    /// * `owner_id` - 所属用户ID
    /// * `project_id` - 所属项目ID
    /// * `shape_id` - 关联的画布元素ID（可选）
    /// * `body` - 任务负载数据
    ///
    /// # 返回值
    ///
    /// 返回新创建的任务实例，状态为Pending，重试计数为0
    pub fn new(
        task_type: TaskType,
        owner_id: Uuid,
        project_id: Uuid,
        shape_id: Option<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type,
            status: TaskStatus::Pending,
            owner_id,
            project_id,
            shape_id,
            body,
            result: None,
            retry_count: 0,
            max_retries: 3,
            worker_id: None,
            claimed_at: None,
            created_at: Utc::now().into(),
            started_at: None,
            completed_at: None,
            updated_at: Utc::now().into(),
        }
    }

    /// 判断任务是否还有重试预算
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// 判断任务是否可被取消
    ///
    /// 只有未进入终态的任务可以取消
    pub fn is_cancellable(&self) -> bool {
        !self.status.is_terminal()
    }
}
