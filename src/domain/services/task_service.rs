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

use crate::domain::models::params::TaskParams;
use crate::domain::models::task::{Task, TaskStatus, TaskType};
use crate::domain::repositories::project_repository::ProjectRepository;
use crate::domain::repositories::task_repository::{
    RepositoryError, TaskQueryParams, TaskRepository,
};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 200;
const MAX_RETRIES_CEILING: i32 = 10;

/// 服务层错误类型
#[derive(Error, Debug)]
pub enum ServiceError {
    /// 验证错误，请求参数不合法
    #[error("Validation error: {0}")]
    Validation(String),

    /// 授权错误，调用者不拥有目标项目
    #[error("Forbidden")]
    Forbidden,

    /// 未找到，包括属于他人的任务（避免泄露存在性）
    #[error("Not found")]
    NotFound,

    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 创建任务的输入参数
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub shape_id: Option<String>,
    pub task_type: TaskType,
    pub body: serde_json::Value,
    pub max_retries: Option<i32>,
}

/// 任务列表查询的输入参数
#[derive(Debug, Clone, Default)]
pub struct ListTasks {
    pub project_id: Uuid,
    pub task_type: Option<TaskType>,
    /// 状态过滤，线上格式为逗号分隔的状态名
    pub statuses: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// 任务服务
///
/// 包装任务仓库，在HTTP边界之下做归属校验和参数校验。
/// 工作器不经过本服务，直接使用仓库的claim原语。
pub struct TaskService<R, P>
where
    R: TaskRepository,
    P: ProjectRepository,
{
    tasks: Arc<R>,
    projects: Arc<P>,
}

impl<R, P> TaskService<R, P>
where
    R: TaskRepository,
    P: ProjectRepository,
{
    pub fn new(tasks: Arc<R>, projects: Arc<P>) -> Self {
        Self { tasks, projects }
    }

    /// 创建任务
    ///
    /// 要求调用者拥有目标项目；负载按任务类型在此处校验一次，
    /// 非法的负载不会进入队列。
    ///
    /// # 参数
    ///
    /// * `owner_id` - 调用者ID
    /// * `input` - 创建参数
    ///
    /// # 返回值
    ///
    /// * `Ok(Task)` - 已入队的pending任务
    /// * `Err(ServiceError)` - 校验或授权失败
    pub async fn create_task(
        &self,
        owner_id: Uuid,
        input: CreateTask,
    ) -> Result<Task, ServiceError> {
        self.check_project_ownership(input.project_id, owner_id)
            .await?;

        TaskParams::parse(input.task_type, &input.body)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let mut task = Task::new(
            input.task_type,
            owner_id,
            input.project_id,
            input.shape_id,
            input.body,
        );
        if let Some(max_retries) = input.max_retries {
            if !(0..=MAX_RETRIES_CEILING).contains(&max_retries) {
                return Err(ServiceError::Validation(format!(
                    "max_retries must be within 0..={}",
                    MAX_RETRIES_CEILING
                )));
            }
            task.max_retries = max_retries;
        }

        Ok(self.tasks.create(&task).await?)
    }

    /// 查询任务列表
    ///
    /// 支持按单个状态或逗号分隔的状态集合过滤
    pub async fn list_tasks(
        &self,
        owner_id: Uuid,
        input: ListTasks,
    ) -> Result<(Vec<Task>, u64), ServiceError> {
        self.check_project_ownership(input.project_id, owner_id)
            .await?;

        let statuses = match &input.statuses {
            Some(raw) => Some(parse_status_set(raw)?),
            None => None,
        };

        let params = TaskQueryParams {
            owner_id,
            project_id: input.project_id,
            task_types: input.task_type.map(|t| vec![t]),
            statuses,
            limit: input.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT),
            offset: input.offset.unwrap_or(0),
        };

        Ok(self.tasks.query_tasks(params).await?)
    }

    /// 查询单个任务
    ///
    /// 属于他人的任务返回NotFound而非Forbidden，避免泄露存在性
    pub async fn get_task(&self, owner_id: Uuid, id: Uuid) -> Result<Task, ServiceError> {
        self.tasks
            .find_by_id(id, owner_id)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    /// 取消任务
    ///
    /// 返回取消是否生效；对终态或不存在的任务返回false，
    /// 由HTTP边界映射为400，而非异常
    pub async fn cancel_task(&self, owner_id: Uuid, id: Uuid) -> Result<bool, ServiceError> {
        Ok(self.tasks.cancel(id, owner_id).await?)
    }

    async fn check_project_ownership(
        &self,
        project_id: Uuid,
        owner_id: Uuid,
    ) -> Result<(), ServiceError> {
        let project = self
            .projects
            .find_by_id(project_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        if project.owner_id != owner_id {
            return Err(ServiceError::Forbidden);
        }
        Ok(())
    }
}

/// 解析逗号分隔的状态集合
fn parse_status_set(raw: &str) -> Result<Vec<TaskStatus>, ServiceError> {
    let mut statuses = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let status = TaskStatus::from_str(part)
            .map_err(|_| ServiceError::Validation(format!("unknown status: {}", part)))?;
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }
    if statuses.is_empty() {
        return Err(ServiceError::Validation(
            "status filter cannot be empty".to_string(),
        ));
    }
    Ok(statuses)
}

#[cfg(test)]
#[path = "task_service_test.rs"]
mod tests;
