// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::create_task_request::CreateTaskRequestDto;
use crate::application::dto::task_query_request::TaskQueryRequestDto;
use crate::application::dto::task_response::{TaskListResponseDto, TaskResponseDto};
use crate::domain::repositories::project_repository::ProjectRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::domain::services::task_service::{CreateTask, ListTasks, TaskService};
use crate::presentation::errors::AppError;
use crate::presentation::middleware::auth_middleware::CurrentUser;
use anyhow;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 创建任务处理器
///
/// 成功时返回201和已入队的任务
pub async fn create_task<R, P>(
    Extension(service): Extension<Arc<TaskService<R, P>>>,
    Extension(CurrentUser(owner_id)): Extension<CurrentUser>,
    Json(request): Json<CreateTaskRequestDto>,
) -> Result<(StatusCode, Json<TaskResponseDto>), AppError>
where
    R: TaskRepository + 'static,
    P: ProjectRepository + 'static,
{
    if let Err(errors) = request.validate() {
        return Err(AppError::from(anyhow::anyhow!(
            "Validation error: {:?}",
            errors
        )));
    }

    let task = service
        .create_task(
            owner_id,
            CreateTask {
                project_id: request.project_id,
                shape_id: request.shape_id,
                task_type: request.task_type,
                body: request.body,
                max_retries: request.max_retries,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(task.into())))
}

/// 任务列表查询处理器
pub async fn list_tasks<R, P>(
    Extension(service): Extension<Arc<TaskService<R, P>>>,
    Extension(CurrentUser(owner_id)): Extension<CurrentUser>,
    Query(request): Query<TaskQueryRequestDto>,
) -> Result<Json<TaskListResponseDto>, AppError>
where
    R: TaskRepository + 'static,
    P: ProjectRepository + 'static,
{
    if let Err(errors) = request.validate() {
        return Err(AppError::from(anyhow::anyhow!(
            "Validation error: {:?}",
            errors
        )));
    }

    let offset = request.offset.unwrap_or(0);

    let (tasks, total) = service
        .list_tasks(
            owner_id,
            ListTasks {
                project_id: request.project_id,
                task_type: request.task_type,
                statuses: request.status,
                limit: request.limit,
                offset: request.offset,
            },
        )
        .await?;

    let has_more = (offset as u64 + tasks.len() as u64) < total;

    Ok(Json(TaskListResponseDto {
        tasks: tasks.into_iter().map(TaskResponseDto::from).collect(),
        total,
        has_more,
    }))
}

/// 单任务查询处理器
///
/// 属于他人的任务与不存在的任务同样返回404
pub async fn get_task<R, P>(
    Extension(service): Extension<Arc<TaskService<R, P>>>,
    Extension(CurrentUser(owner_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponseDto>, AppError>
where
    R: TaskRepository + 'static,
    P: ProjectRepository + 'static,
{
    let task = service.get_task(owner_id, id).await?;
    Ok(Json(task.into()))
}

/// 取消任务处理器
///
/// 取消生效返回204；任务不存在、不属于调用者或已进入终态时
/// 返回400，取消失败不是异常
pub async fn cancel_task<R, P>(
    Extension(service): Extension<Arc<TaskService<R, P>>>,
    Extension(CurrentUser(owner_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError>
where
    R: TaskRepository + 'static,
    P: ProjectRepository + 'static,
{
    let cancelled = service.cancel_task(owner_id, id).await?;

    if cancelled {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "task cannot be cancelled" })),
        )
            .into_response())
    }
}
