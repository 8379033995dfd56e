// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::TaskType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 任务列表查询请求数据传输对象
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct TaskQueryRequestDto {
    /// 目标项目ID
    pub project_id: Uuid,
    /// 任务类型过滤（可选）
    pub task_type: Option<TaskType>,
    /// 状态过滤，单个状态或逗号分隔的状态集合（可选）
    pub status: Option<String>,
    /// 分页大小
    #[validate(range(min = 1, max = 200))]
    pub limit: Option<u32>,
    /// 分页偏移
    pub offset: Option<u32>,
}
