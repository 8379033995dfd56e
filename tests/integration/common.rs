// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use genrs::domain::models::task::{Task, TaskType};
use genrs::infrastructure::database::entities::{api_key, project, user};
use genrs::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 建立内存数据库并应用全部迁移
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let db = Arc::new(db);
    Migrator::up(db.as_ref(), None).await.unwrap();
    db
}

/// 构建任务仓库，过期阈值按秒指定
pub fn task_repo(db: &Arc<DatabaseConnection>, stale_threshold_secs: i64) -> TaskRepositoryImpl {
    TaskRepositoryImpl::new(db.clone(), chrono::Duration::seconds(stale_threshold_secs))
}

/// 播种一个用户、API密钥和项目
///
/// # 返回值
///
/// 返回 (owner_id, project_id, api_key)
pub async fn seed_owner_and_project(db: &DatabaseConnection) -> (Uuid, Uuid, String) {
    let owner_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let key = Uuid::new_v4().to_string();
    let now = Utc::now();

    user::ActiveModel {
        id: Set(owner_id),
        email: Set(format!("{}@example.com", owner_id)),
        display_name: Set(Some("Test User".to_string())),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();

    api_key::ActiveModel {
        id: Set(Uuid::new_v4()),
        key: Set(key.clone()),
        user_id: Set(owner_id),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();

    project::ActiveModel {
        id: Set(project_id),
        owner_id: Set(owner_id),
        name: Set("test-project".to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();

    (owner_id, project_id, key)
}

/// 构建一个待入库的图片生成任务
pub fn image_task(owner_id: Uuid, project_id: Uuid) -> Task {
    Task::new(
        TaskType::GenerateImage,
        owner_id,
        project_id,
        None,
        json!({"prompt": "a quiet harbor at dawn"}),
    )
}

/// 构建一个待入库的图片放大任务
pub fn upscale_task(owner_id: Uuid, project_id: Uuid, source_key: &str) -> Task {
    Task::new(
        TaskType::ImageUpscale,
        owner_id,
        project_id,
        Some("shape:canvas-1".to_string()),
        json!({"source_key": source_key, "scale": 2}),
    )
}
