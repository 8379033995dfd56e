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

use crate::domain::models::task::{Task, TaskStatus};
use crate::domain::repositories::task_repository::{
    RepositoryError, TaskQueryParams, TaskRepository, TaskUpdate,
};
use crate::infrastructure::database::entities::task as task_entity;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// 任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层。领取查询使用行级锁配合
/// SKIP LOCKED，再叠加按状态守卫的条件更新，使得并发领取者
/// 既不会互相阻塞，也不会在缺少行锁的存储引擎上重复领取。
#[derive(Clone)]
pub struct TaskRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
    /// 过期阈值，claimed_at早于该阈值的processing任务可被回收或重新领取
    stale_threshold: Duration,
}

impl TaskRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    /// * `stale_threshold` - 领取过期阈值
    ///
    /// # 返回值
    ///
    /// 返回新的任务仓库实例
    pub fn new(db: Arc<DatabaseConnection>, stale_threshold: Duration) -> Self {
        Self {
            db,
            stale_threshold,
        }
    }

    /// 可领取条件：pending，或processing但领取已过期
    fn claimable_condition(stale_cutoff: DateTime<FixedOffset>) -> Condition {
        Condition::any()
            .add(task_entity::Column::Status.eq(TaskStatus::Pending.to_string()))
            .add(
                Condition::all()
                    .add(task_entity::Column::Status.eq(TaskStatus::Processing.to_string()))
                    .add(task_entity::Column::ClaimedAt.lte(stale_cutoff)),
            )
    }
}

impl From<task_entity::Model> for Task {
    fn from(model: task_entity::Model) -> Self {
        Self {
            id: model.id,
            task_type: model.task_type.parse().unwrap_or_default(),
            status: model.status.parse().unwrap_or_default(),
            owner_id: model.owner_id,
            project_id: model.project_id,
            shape_id: model.shape_id,
            body: model.body,
            result: model.result,
            retry_count: model.retry_count,
            max_retries: model.max_retries,
            worker_id: model.worker_id,
            claimed_at: model.claimed_at,
            created_at: model.created_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<Task> for task_entity::ActiveModel {
    fn from(task: Task) -> Self {
        Self {
            id: Set(task.id),
            task_type: Set(task.task_type.to_string()),
            status: Set(task.status.to_string()),
            owner_id: Set(task.owner_id),
            project_id: Set(task.project_id),
            shape_id: Set(task.shape_id),
            body: Set(task.body),
            result: Set(task.result),
            retry_count: Set(task.retry_count),
            max_retries: Set(task.max_retries),
            worker_id: Set(task.worker_id),
            claimed_at: Set(task.claimed_at),
            created_at: Set(task.created_at),
            started_at: Set(task.started_at),
            completed_at: Set(task.completed_at),
            updated_at: Set(task.updated_at),
        }
    }
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError> {
        let model: task_entity::ActiveModel = task.clone().into();

        model.insert(self.db.as_ref()).await?;
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Task>, RepositoryError> {
        let model = task_entity::Entity::find()
            .filter(task_entity::Column::Id.eq(id))
            .filter(task_entity::Column::OwnerId.eq(owner_id))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn query_tasks(
        &self,
        params: TaskQueryParams,
    ) -> Result<(Vec<Task>, u64), RepositoryError> {
        let mut condition = Condition::all()
            .add(task_entity::Column::OwnerId.eq(params.owner_id))
            .add(task_entity::Column::ProjectId.eq(params.project_id));

        if let Some(task_types) = &params.task_types {
            condition = condition.add(
                task_entity::Column::TaskType
                    .is_in(task_types.iter().map(|t| t.to_string()).collect::<Vec<_>>()),
            );
        }

        if let Some(statuses) = &params.statuses {
            condition = condition.add(
                task_entity::Column::Status
                    .is_in(statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>()),
            );
        }

        let total = task_entity::Entity::find()
            .filter(condition.clone())
            .count(self.db.as_ref())
            .await?;

        let models = task_entity::Entity::find()
            .filter(condition)
            .order_by_desc(task_entity::Column::CreatedAt)
            .limit(params.limit as u64)
            .offset(params.offset as u64)
            .all(self.db.as_ref())
            .await?;

        Ok((models.into_iter().map(Task::from).collect(), total))
    }

    async fn update_fields(&self, id: Uuid, update: TaskUpdate) -> Result<Task, RepositoryError> {
        let mut query = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::UpdatedAt,
                Expr::value(DateTime::<FixedOffset>::from(Utc::now())),
            )
            .filter(task_entity::Column::Id.eq(id));

        if let Some(status) = update.status {
            query = query.col_expr(task_entity::Column::Status, Expr::value(status.to_string()));
        }
        if let Some(result) = update.result {
            query = query.col_expr(task_entity::Column::Result, Expr::value(result));
        }
        if let Some(retry_count) = update.retry_count {
            query = query.col_expr(task_entity::Column::RetryCount, Expr::value(retry_count));
        }
        if let Some(worker_id) = update.worker_id {
            query = query.col_expr(task_entity::Column::WorkerId, Expr::value(worker_id));
        }
        if let Some(claimed_at) = update.claimed_at {
            query = query.col_expr(task_entity::Column::ClaimedAt, Expr::value(claimed_at));
        }
        if let Some(started_at) = update.started_at {
            query = query.col_expr(task_entity::Column::StartedAt, Expr::value(started_at));
        }
        if let Some(completed_at) = update.completed_at {
            query = query.col_expr(task_entity::Column::CompletedAt, Expr::value(completed_at));
        }

        let result = query.exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            // 任务在执行期间被取消删除时会走到这里
            return Err(RepositoryError::NotFound);
        }

        task_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Into::into)
            .ok_or(RepositoryError::NotFound)
    }

    async fn claim(&self, worker_id: Uuid, limit: u64) -> Result<Vec<Task>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let now_fixed: DateTime<FixedOffset> = now.into();
        let stale_cutoff: DateTime<FixedOffset> = (now - self.stale_threshold).into();

        let txn = self.db.begin().await?;

        // 被并发领取者锁定的行直接跳过，本次调用只会拿到更少的行
        let candidates = task_entity::Entity::find()
            .filter(Self::claimable_condition(stale_cutoff))
            .order_by_asc(task_entity::Column::CreatedAt)
            .limit(limit)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(&txn)
            .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            // 状态守卫的条件更新：没有SKIP LOCKED语义的引擎上，
            // 输给并发领取者的行在这里被过滤掉
            let result = task_entity::Entity::update_many()
                .col_expr(
                    task_entity::Column::Status,
                    Expr::value(TaskStatus::Processing.to_string()),
                )
                .col_expr(task_entity::Column::WorkerId, Expr::value(Some(worker_id)))
                .col_expr(task_entity::Column::ClaimedAt, Expr::value(Some(now_fixed)))
                .col_expr(task_entity::Column::StartedAt, Expr::value(Some(now_fixed)))
                .col_expr(task_entity::Column::UpdatedAt, Expr::value(now_fixed))
                .filter(task_entity::Column::Id.eq(candidate.id))
                .filter(Self::claimable_condition(stale_cutoff))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                continue;
            }

            if let Some(model) = task_entity::Entity::find_by_id(candidate.id).one(&txn).await? {
                claimed.push(model.into());
            }
        }

        txn.commit().await?;

        Ok(claimed)
    }

    async fn cancel(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepositoryError> {
        let result = task_entity::Entity::delete_many()
            .filter(task_entity::Column::Id.eq(id))
            .filter(task_entity::Column::OwnerId.eq(owner_id))
            .filter(task_entity::Column::Status.is_in(vec![
                TaskStatus::Pending.to_string(),
                TaskStatus::Processing.to_string(),
            ]))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn cleanup_stale(&self) -> Result<u64, RepositoryError> {
        let stale_cutoff: DateTime<FixedOffset> = (Utc::now() - self.stale_threshold).into();

        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Pending.to_string()),
            )
            .col_expr(
                task_entity::Column::WorkerId,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(
                task_entity::Column::ClaimedAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(
                task_entity::Column::UpdatedAt,
                Expr::value(DateTime::<FixedOffset>::from(Utc::now())),
            )
            .filter(task_entity::Column::Status.eq(TaskStatus::Processing.to_string()))
            .filter(task_entity::Column::ClaimedAt.lte(stale_cutoff))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn archive_terminal(&self, older_than: Duration) -> Result<u64, RepositoryError> {
        let cutoff: DateTime<FixedOffset> = (Utc::now() - older_than).into();

        let result = task_entity::Entity::delete_many()
            .filter(task_entity::Column::Status.is_in(vec![
                TaskStatus::Completed.to_string(),
                TaskStatus::Failed.to_string(),
            ]))
            .filter(task_entity::Column::CompletedAt.lte(cutoff))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn stats(&self) -> Result<HashMap<TaskStatus, u64>, RepositoryError> {
        let mut counts = HashMap::new();
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            let count = task_entity::Entity::find()
                .filter(task_entity::Column::Status.eq(status.to_string()))
                .count(self.db.as_ref())
                .await?;
            counts.insert(status, count);
        }
        Ok(counts)
    }
}
