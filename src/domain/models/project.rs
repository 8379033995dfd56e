// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 项目实体
///
/// 任务归属和权限校验的载体。项目由外部画布应用创建和管理，
/// 核心只读取其归属关系。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// 项目唯一标识符
    pub id: Uuid,
    /// 项目所有者ID
    pub owner_id: Uuid,
    /// 项目名称
    pub name: String,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 最后更新时间
    pub updated_at: DateTime<FixedOffset>,
}
