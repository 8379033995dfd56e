// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskStatus, TaskType};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use sea_orm::DbErr;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
}

/// 任务查询参数
#[derive(Debug, Default, Clone)]
pub struct TaskQueryParams {
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub task_types: Option<Vec<TaskType>>,
    pub statuses: Option<Vec<TaskStatus>>,
    pub limit: u32,
    pub offset: u32,
}

/// 任务字段更新
///
/// 部分更新的字段集合。外层Option表示是否更新该字段，
/// 可空字段用嵌套Option表达置空。updated_at总是随更新刷新。
#[derive(Debug, Default, Clone)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub result: Option<serde_json::Value>,
    pub retry_count: Option<i32>,
    pub worker_id: Option<Option<Uuid>>,
    pub claimed_at: Option<Option<DateTime<FixedOffset>>>,
    pub started_at: Option<Option<DateTime<FixedOffset>>>,
    pub completed_at: Option<Option<DateTime<FixedOffset>>>,
}

/// 任务仓库特质
///
/// 定义任务的持久化访问接口。除claim和update_fields外，
/// 所有读写都按owner_id隔离；claim是唯一的跨进程同步原语。
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError>;

    /// 按所有者范围查找任务
    ///
    /// 任务不存在与属于他人不可区分，统一返回None
    async fn find_by_id(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Task>, RepositoryError>;

    /// 分页查询任务列表，按创建时间倒序
    ///
    /// # 返回值
    ///
    /// 返回 (任务列表, 满足条件的总数)
    async fn query_tasks(
        &self,
        params: TaskQueryParams,
    ) -> Result<(Vec<Task>, u64), RepositoryError>;

    /// 按字段更新任务，总是刷新updated_at
    ///
    /// 行不存在（例如已被取消删除）时返回NotFound，
    /// 调用方应将其视为非致命情况
    async fn update_fields(&self, id: Uuid, update: TaskUpdate) -> Result<Task, RepositoryError>;

    /// 原子批量领取任务
    ///
    /// 选取至多limit个可领取的任务（pending，或processing但
    /// claimed_at已超过过期阈值），按created_at升序，跳过被并发
    /// 领取者锁定的行。选中的行原子转换为processing并盖上
    /// worker_id/claimed_at/started_at。并发调用者获得互不相交的子集。
    ///
    /// # 参数
    ///
    /// * `worker_id` - 领取者标识
    /// * `limit` - 本次最多领取的任务数
    ///
    /// # 返回值
    ///
    /// 返回实际领取到的任务，可能为空
    async fn claim(&self, worker_id: Uuid, limit: u64) -> Result<Vec<Task>, RepositoryError>;

    /// 取消任务
    ///
    /// 仅当任务属于owner且状态为pending/processing时删除行。
    /// 任务不存在、不属于owner或已进入终态时返回false，不视为错误。
    async fn cancel(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepositoryError>;

    /// 回收过期任务
    ///
    /// 将claimed_at超过过期阈值的processing任务重置为pending，
    /// 清空worker_id/claimed_at。这是崩溃工作器的恢复机制。
    ///
    /// # 返回值
    ///
    /// 返回被重置的任务数
    async fn cleanup_stale(&self) -> Result<u64, RepositoryError>;

    /// 归档终态任务
    ///
    /// 永久删除completed_at早于保留窗口的completed/failed任务
    async fn archive_terminal(&self, older_than: Duration) -> Result<u64, RepositoryError>;

    /// 按状态统计任务数
    async fn stats(&self) -> Result<HashMap<TaskStatus, u64>, RepositoryError>;
}
