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

use axum::Extension;
use genrs::config::settings::Settings;
use genrs::domain::repositories::storage_repository::StorageRepository;
use genrs::domain::services::task_service::TaskService;
use genrs::infrastructure::database::connection;
use genrs::infrastructure::repositories::project_repo_impl::ProjectRepositoryImpl;
use genrs::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use genrs::infrastructure::storage::create_storage_repository;
use genrs::presentation::middleware::auth_middleware::{auth_middleware, AuthState};
use genrs::presentation::routes;
use genrs::providers::http_provider::HttpProvider;
use genrs::queue::scheduler::MaintenanceScheduler;
use genrs::workers::manager::WorkerManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use genrs::utils::telemetry;
use migration::{Migrator, MigratorTrait};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting genrs...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // Initialize Prometheus Metrics
    genrs::infrastructure::metrics::init_metrics(settings.server.metrics_port);

    // 3. Connect to database
    let db = connection::create_pool(&settings.database).await?;
    let db = Arc::new(db);
    info!("Database connection established");

    // Run database migrations
    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Initialize repositories
    let stale_threshold =
        chrono::Duration::seconds(settings.maintenance.stale_threshold_secs as i64);
    let task_repo = Arc::new(TaskRepositoryImpl::new(db.clone(), stale_threshold));
    let project_repo = Arc::new(ProjectRepositoryImpl::new(db.clone()));

    // 5. Initialize storage
    let storage: Arc<dyn StorageRepository> =
        Arc::from(create_storage_repository(&settings.storage)?);
    info!("Storage initialized ({})", settings.storage.storage_type);

    // 6. Initialize generation provider
    let provider = Arc::new(HttpProvider::new(&settings.provider));
    info!("Generation provider: {}", settings.provider.base_url);

    // 7. Initialize task service
    let task_service = Arc::new(TaskService::new(task_repo.clone(), project_repo.clone()));

    // 8. Start workers
    let mut worker_manager = WorkerManager::new(
        task_repo.clone(),
        storage.clone(),
        provider.clone(),
        &settings.worker,
        &settings.rate_limiting,
    );
    worker_manager.start_workers(settings.worker.count);
    let worker_manager = Arc::new(worker_manager);

    // 9. Start maintenance jobs (stale reclaim + archival)
    let scheduler = MaintenanceScheduler::new(task_repo.clone(), &settings.maintenance);
    let maintenance_handles = scheduler.start();

    // 10. Setup HTTP server
    let auth_state = AuthState { db: db.clone() };

    let app = routes::routes()
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .layer(Extension(task_service))
        .layer(Extension(task_repo.clone()))
        .layer(Extension(worker_manager.clone()))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 11. Graceful shutdown: stop workers and maintenance jobs
    worker_manager.shutdown();
    for handle in maintenance_handles {
        handle.abort();
    }
    info!("Shutdown complete");

    Ok(())
}

/// 等待关闭信号
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }
}
