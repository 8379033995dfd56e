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

use crate::domain::models::task::TaskType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

/// 创建任务请求数据传输对象
///
/// 负载body的结构按task_type变化，在服务层按类型解析校验
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateTaskRequestDto {
    /// 目标项目ID
    pub project_id: Uuid,
    /// 任务完成后需要更新的画布元素ID（可选）
    #[validate(length(max = 128))]
    pub shape_id: Option<String>,
    /// 任务类型
    pub task_type: TaskType,
    /// 任务负载
    pub body: Value,
    /// 最大重试次数（可选，默认3）
    pub max_retries: Option<i32>,
}
