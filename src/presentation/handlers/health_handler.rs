// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::task_repository::TaskRepository;
use crate::presentation::errors::AppError;
use crate::providers::traits::GenerativeProvider;
use crate::workers::manager::WorkerManager;
use axum::{extract::Extension, Json};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// 健康检查处理器
///
/// 暴露工作器运行状态和按状态统计的队列深度
pub async fn health<R, P>(
    Extension(task_repo): Extension<Arc<R>>,
    Extension(manager): Extension<Arc<WorkerManager<R, P>>>,
) -> Result<Json<serde_json::Value>, AppError>
where
    R: TaskRepository + 'static,
    P: GenerativeProvider + 'static,
{
    let stats = task_repo.stats().await?;
    let queue: HashMap<String, u64> = stats
        .into_iter()
        .map(|(status, count)| (status.to_string(), count))
        .collect();

    let workers = manager.statuses();

    Ok(Json(json!({
        "status": "ok",
        "queue": queue,
        "workers": workers,
    })))
}
