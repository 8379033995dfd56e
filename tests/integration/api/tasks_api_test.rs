// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::common::{image_task, seed_owner_and_project, setup_db, task_repo};
use axum::http::StatusCode;
use axum_test::TestServer;
use genrs::config::settings::{ProviderSettings, RateLimitingSettings, WorkerSettings};
use genrs::domain::repositories::storage_repository::StorageRepository;
use genrs::domain::repositories::task_repository::TaskRepository;
use genrs::domain::services::task_service::TaskService;
use genrs::infrastructure::repositories::project_repo_impl::ProjectRepositoryImpl;
use genrs::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use genrs::infrastructure::storage::InMemoryStorage;
use genrs::presentation::middleware::auth_middleware::{auth_middleware, AuthState};
use genrs::presentation::routes;
use genrs::providers::http_provider::HttpProvider;
use genrs::workers::manager::WorkerManager;
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

async fn create_test_app() -> (
    TestServer,
    String,
    Uuid,
    Uuid,
    Arc<TaskRepositoryImpl>,
    Arc<DatabaseConnection>,
) {
    let db = setup_db().await;
    let (owner_id, project_id, api_key) = seed_owner_and_project(db.as_ref()).await;

    let task_repo = Arc::new(task_repo(&db, 300));
    let project_repo = Arc::new(ProjectRepositoryImpl::new(db.clone()));
    let service = Arc::new(TaskService::new(task_repo.clone(), project_repo));

    let storage: Arc<dyn StorageRepository> = Arc::new(InMemoryStorage::new());
    let provider = Arc::new(HttpProvider::new(&ProviderSettings {
        base_url: "http://localhost:9".to_string(),
        api_key: None,
        timeout_secs: Some(5),
    }));
    // 工作器不启动，只提供健康检查所需的状态来源
    let manager = Arc::new(WorkerManager::new(
        task_repo.clone(),
        storage,
        provider,
        &WorkerSettings {
            count: 0,
            concurrency: 3,
            poll_interval_secs: 5,
        },
        &RateLimitingSettings {
            enabled: false,
            provider_rpm: 50,
        },
    ));

    let app = routes::routes()
        .layer(axum::middleware::from_fn_with_state(
            AuthState { db: db.clone() },
            auth_middleware,
        ))
        .layer(axum::Extension(service))
        .layer(axum::Extension(task_repo.clone()))
        .layer(axum::Extension(manager));

    let server = TestServer::new(app).unwrap();
    (server, api_key, owner_id, project_id, task_repo, db)
}

#[tokio::test]
async fn test_create_task_returns_201() {
    let (server, api_key, _, project_id, _, _) = create_test_app().await;

    let response = server
        .post("/v1/tasks")
        .add_header("Authorization", format!("Bearer {}", api_key))
        .json(&json!({
            "project_id": project_id,
            "task_type": "generate_image",
            "shape_id": "shape:hero-banner",
            "body": {"prompt": "a watercolor mountain range"}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["task_type"], "generate_image");
    assert_eq!(body["retry_count"], 0);
    assert_eq!(body["shape_id"], "shape:hero-banner");
}

#[tokio::test]
async fn test_create_task_requires_auth() {
    let (server, _, _, project_id, _, _) = create_test_app().await;

    let response = server
        .post("/v1/tasks")
        .json(&json!({
            "project_id": project_id,
            "task_type": "generate_image",
            "body": {"prompt": "unauthenticated"}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_task_rejects_invalid_body() {
    let (server, api_key, _, project_id, _, _) = create_test_app().await;

    let response = server
        .post("/v1/tasks")
        .add_header("Authorization", format!("Bearer {}", api_key))
        .json(&json!({
            "project_id": project_id,
            "task_type": "image_upscale",
            "body": {"source_key": "", "scale": 3}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_task_for_foreign_project_is_forbidden() {
    let (server, api_key, _, _, _, db) = create_test_app().await;
    // 第二个用户的项目
    let (_, foreign_project_id, _) = seed_owner_and_project(db.as_ref()).await;

    let response = server
        .post("/v1/tasks")
        .add_header("Authorization", format!("Bearer {}", api_key))
        .json(&json!({
            "project_id": foreign_project_id,
            "task_type": "generate_image",
            "body": {"prompt": "not my project"}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_task_not_found_for_unknown_and_foreign() {
    let (server, api_key, _, _, task_repo, db) = create_test_app().await;

    let response = server
        .get(&format!("/v1/tasks/{}", Uuid::new_v4()))
        .add_header("Authorization", format!("Bearer {}", api_key))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    // 他人的任务同样表现为不存在，而不是403
    let (foreign_owner, foreign_project, _) = seed_owner_and_project(db.as_ref()).await;
    let foreign_task = task_repo
        .create(&image_task(foreign_owner, foreign_project))
        .await
        .unwrap();

    let response = server
        .get(&format!("/v1/tasks/{}", foreign_task.id))
        .add_header("Authorization", format!("Bearer {}", api_key))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_tasks_with_status_filter() {
    let (server, api_key, owner_id, project_id, task_repo, _) = create_test_app().await;

    for _ in 0..2 {
        task_repo
            .create(&image_task(owner_id, project_id))
            .await
            .unwrap();
    }

    let response = server
        .get("/v1/tasks")
        .add_header("Authorization", format!("Bearer {}", api_key))
        .add_query_param("project_id", project_id)
        .add_query_param("status", "pending,processing")
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["tasks"].as_array().unwrap().len(), 2);
    assert_eq!(body["has_more"], false);

    // 未知状态名是校验错误
    let response = server
        .get("/v1/tasks")
        .add_header("Authorization", format!("Bearer {}", api_key))
        .add_query_param("project_id", project_id)
        .add_query_param("status", "bogus")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_task_204_then_400() {
    let (server, api_key, owner_id, project_id, task_repo, _) = create_test_app().await;

    let task = task_repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();

    let response = server
        .delete(&format!("/v1/tasks/{}", task.id))
        .add_header("Authorization", format!("Bearer {}", api_key))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    // 行已删除，再次取消不是异常而是400
    let response = server
        .delete(&format!("/v1/tasks/{}", task.id))
        .add_header("Authorization", format!("Bearer {}", api_key))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_is_public_and_reports_queue() {
    let (server, _, owner_id, project_id, task_repo, _) = create_test_app().await;

    task_repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["queue"]["pending"], 1);
    assert!(body["workers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_version_endpoint() {
    let (server, _, _, _, _, _) = create_test_app().await;

    let response = server.get("/v1/version").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), env!("CARGO_PKG_VERSION"));
}
