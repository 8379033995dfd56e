// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::project::Project;
use crate::domain::repositories::project_repository::ProjectRepository;
use crate::domain::repositories::task_repository::RepositoryError;
use crate::infrastructure::database::entities::project as project_entity;
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use uuid::Uuid;

/// 项目仓库实现
#[derive(Clone)]
pub struct ProjectRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ProjectRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<project_entity::Model> for Project {
    fn from(model: project_entity::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl ProjectRepository for ProjectRepositoryImpl {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, RepositoryError> {
        let model = project_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }
}
