// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskStatus, TaskType};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// 任务信息数据传输对象
#[derive(Debug, Serialize)]
pub struct TaskResponseDto {
    pub id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub project_id: Uuid,
    pub shape_id: Option<String>,
    pub body: Value,
    pub result: Option<Value>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<FixedOffset>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub completed_at: Option<DateTime<FixedOffset>>,
}

impl From<Task> for TaskResponseDto {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            task_type: task.task_type,
            status: task.status,
            project_id: task.project_id,
            shape_id: task.shape_id,
            body: task.body,
            result: task.result,
            retry_count: task.retry_count,
            max_retries: task.max_retries,
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
        }
    }
}

/// 任务列表响应数据传输对象
#[derive(Debug, Serialize)]
pub struct TaskListResponseDto {
    pub tasks: Vec<TaskResponseDto>,
    pub total: u64,
    pub has_more: bool,
}
