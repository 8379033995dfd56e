// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::infrastructure::repositories::project_repo_impl::ProjectRepositoryImpl;
use crate::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use crate::presentation::handlers::{health_handler, task_handler};
use crate::providers::http_provider::HttpProvider;
use axum::{
    routing::{get, post},
    Router,
};

/// 创建应用路由
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route(
            "/health",
            get(health_handler::health::<TaskRepositoryImpl, HttpProvider>),
        )
        .route("/v1/version", get(version));

    let protected_routes = Router::new()
        .route(
            "/v1/tasks",
            post(task_handler::create_task::<TaskRepositoryImpl, ProjectRepositoryImpl>).get(
                task_handler::list_tasks::<TaskRepositoryImpl, ProjectRepositoryImpl>,
            ),
        )
        .route(
            "/v1/tasks/{id}",
            get(task_handler::get_task::<TaskRepositoryImpl, ProjectRepositoryImpl>).delete(
                task_handler::cancel_task::<TaskRepositoryImpl, ProjectRepositoryImpl>,
            ),
        );

    Router::new().merge(public_routes).merge(protected_routes)
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
