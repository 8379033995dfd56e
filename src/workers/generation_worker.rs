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

use crate::domain::models::params::{ParamsError, TaskParams};
use crate::domain::models::task::{Task, TaskResult, TaskStatus};
use crate::domain::repositories::storage_repository::{StorageError, StorageRepository};
use crate::domain::repositories::task_repository::{
    RepositoryError, TaskRepository, TaskUpdate,
};
use crate::providers::traits::{GeneratedAsset, GenerativeProvider, ProviderError};
use chrono::Utc;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use metrics::{counter, histogram};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 提供商限流器类型
type ProviderRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// 单个任务执行过程中的错误
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// 负载解析失败，创建时已校验过，出现在此说明负载被破坏
    #[error("{0}")]
    InvalidBody(#[from] ParamsError),

    /// 提供商错误
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// 源素材不存在
    #[error("Source asset not found: {0}")]
    MissingSource(String),
}

impl ExecutionError {
    /// 判断错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutionError::Provider(e) => e.is_retryable(),
            ExecutionError::Storage(_) => true,
            ExecutionError::InvalidBody(_) | ExecutionError::MissingSource(_) => false,
        }
    }

    /// 写入任务结果的错误码
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionError::InvalidBody(_) => "invalid_body",
            ExecutionError::Provider(ProviderError::ContentRejected(_)) => "content_rejected",
            ExecutionError::Provider(_) => "provider_error",
            ExecutionError::Storage(_) => "storage_error",
            ExecutionError::MissingSource(_) => "missing_source",
        }
    }
}

/// 工作器运行状态快照
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    /// 工作器标识
    pub worker_id: Uuid,
    /// 当前执行中的任务数
    pub in_flight: usize,
    /// 已运行时长（秒）
    pub uptime_secs: u64,
    /// 轮询循环是否在运行
    pub running: bool,
}

/// 在途计数守卫
///
/// 任务执行结束（包括panic展开）时自动递减计数
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 生成工作器
///
/// 以固定间隔轮询任务仓库，批量领取任务并发执行，
/// 并发上限内每个任务独立运行。对提供商的调用经过
/// 进程内限流器，超出配额的请求排队等待而不是被丢弃。
///
/// 显式构造、可注入，测试可以实例化互相独立的工作器。
pub struct GenerationWorker<R, P>
where
    R: TaskRepository + 'static,
    P: GenerativeProvider + 'static,
{
    repository: Arc<R>,
    storage: Arc<dyn StorageRepository>,
    provider: Arc<P>,
    rate_limiter: Option<Arc<ProviderRateLimiter>>,
    worker_id: Uuid,
    concurrency: usize,
    poll_interval: Duration,
    in_flight: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    started_at: Instant,
}

impl<R, P> GenerationWorker<R, P>
where
    R: TaskRepository + 'static,
    P: GenerativeProvider + 'static,
{
    /// 创建新的生成工作器实例
    ///
    /// # 参数
    ///
    /// * `repository` - 任务仓库
    /// * `storage` - 对象存储
    /// * `provider` - 生成提供商
    /// * `concurrency` - 并发执行上限
    /// * `poll_interval` - 轮询间隔
    /// * `provider_rpm` - 提供商每分钟请求上限，None或0时不限流
    pub fn new(
        repository: Arc<R>,
        storage: Arc<dyn StorageRepository>,
        provider: Arc<P>,
        concurrency: usize,
        poll_interval: Duration,
        provider_rpm: Option<u32>,
    ) -> Self {
        let rate_limiter = provider_rpm
            .and_then(NonZeroU32::new)
            .map(|rpm| Arc::new(RateLimiter::direct(Quota::per_minute(rpm))));

        Self {
            repository,
            storage,
            provider,
            rate_limiter,
            worker_id: Uuid::new_v4(),
            concurrency: concurrency.max(1),
            poll_interval,
            in_flight: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            started_at: Instant::now(),
        }
    }

    /// 获取工作器标识
    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    /// 获取工作器运行状态
    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            worker_id: self.worker_id,
            in_flight: self.in_flight.load(Ordering::SeqCst),
            uptime_secs: self.started_at.elapsed().as_secs(),
            running: self.running.load(Ordering::SeqCst),
        }
    }

    /// 请求停止轮询循环，幂等
    ///
    /// 在途任务继续执行到结束；未完成就退出进程的任务
    /// 会在过期后被cleanup_stale回收
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Generation worker {} stop requested", self.worker_id);
        }
        self.shutdown.notify_waiters();
    }

    /// 运行轮询循环
    ///
    /// 重复启动是空操作。每个tick领取不超过空余并发槽数量的任务，
    /// 每个任务在独立的tokio任务上执行，单个任务的失败或panic
    /// 不会影响轮询循环和其他任务。
    pub async fn run(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Generation worker {} already running", self.worker_id);
            return;
        }

        info!(
            "Generation worker {} started (concurrency={}, poll_interval={:?})",
            self.worker_id, self.concurrency, self.poll_interval
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.notified() => {}
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let free_slots = self
                .concurrency
                .saturating_sub(self.in_flight.load(Ordering::SeqCst));
            if free_slots == 0 {
                continue;
            }

            // 基础设施错误只记录日志，下个tick重试
            let batch = match self.repository.claim(self.worker_id, free_slots as u64).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!("Worker {} claim cycle failed: {}", self.worker_id, e);
                    continue;
                }
            };

            if batch.is_empty() {
                continue;
            }

            counter!("genrs_tasks_claimed_total").increment(batch.len() as u64);
            debug!(
                "Worker {} claimed {} task(s)",
                self.worker_id,
                batch.len()
            );

            for task in batch {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                let guard = InFlightGuard(Arc::clone(&self.in_flight));
                let worker = Arc::clone(&self);
                tokio::spawn(async move {
                    let _guard = guard;
                    worker.process_task(task).await;
                });
            }
        }

        info!("Generation worker {} stopped", self.worker_id);
    }

    /// 执行一个已领取的任务
    ///
    /// 所有失败路径都被吸收为任务状态转换，不向调用方传播
    #[instrument(skip(self, task), fields(task_id = %task.id, task_type = %task.task_type, worker_id = %self.worker_id))]
    pub async fn process_task(&self, task: Task) {
        info!("Executing task");
        let started = Instant::now();

        let outcome = self.execute(&task).await;
        let duration = started.elapsed();
        histogram!("genrs_task_execution_duration_seconds").record(duration.as_secs_f64());

        match outcome {
            Ok(asset) => self.complete_task(&task, asset, duration).await,
            Err(err) => self.handle_failure(&task, err).await,
        }
    }

    /// 按任务类型分发到对应的提供商操作
    async fn execute(&self, task: &Task) -> Result<GeneratedAsset, ExecutionError> {
        let params = TaskParams::parse(task.task_type, &task.body)?;

        // 限流：超额请求在这里排队等待令牌，而不是被拒绝
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        match params {
            TaskParams::GenerateImage(p) => Ok(self.provider.generate_image(&p).await?),
            TaskParams::GenerateVideo(p) => Ok(self.provider.generate_video(&p).await?),
            TaskParams::ImageUpscale(p) => {
                let source = self.load_source(&p.source_key).await?;
                Ok(self.provider.upscale_image(&p, &source).await?)
            }
            TaskParams::ImageRemoveBackground(p) => {
                let source = self.load_source(&p.source_key).await?;
                Ok(self.provider.remove_background(&p, &source).await?)
            }
        }
    }

    /// 读取源素材
    async fn load_source(&self, source_key: &str) -> Result<Vec<u8>, ExecutionError> {
        self.storage
            .get(source_key)
            .await?
            .ok_or_else(|| ExecutionError::MissingSource(source_key.to_string()))
    }

    /// 持久化产物并将任务置为completed
    async fn complete_task(&self, task: &Task, asset: GeneratedAsset, duration: Duration) {
        let key = asset_key(task, &asset.content_type);

        let stored = match self
            .storage
            .save(&key, &asset.data, &asset.content_type)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                // 产物写入失败和执行失败同等对待，走重试路径
                return self.handle_failure(task, ExecutionError::Storage(e)).await;
            }
        };

        let result = TaskResult::success(
            key.clone(),
            stored.etag,
            asset.content_type.clone(),
            asset.data.len() as u64,
            duration.as_millis() as u64,
        );

        let update = TaskUpdate {
            status: Some(TaskStatus::Completed),
            result: Some(serde_json::to_value(&result).unwrap_or(serde_json::Value::Null)),
            worker_id: Some(None),
            claimed_at: Some(None),
            completed_at: Some(Some(Utc::now().into())),
            ..Default::default()
        };

        match self.repository.update_fields(task.id, update).await {
            Ok(_) => {
                counter!("genrs_tasks_completed_total").increment(1);
                info!("Task completed, asset stored at {}", key);
            }
            Err(RepositoryError::NotFound) => {
                // 执行期间任务被取消删除，结果落盘后丢弃即可
                debug!("Task row gone before completion, assuming cancelled");
            }
            Err(e) => {
                error!("Failed to persist completion: {}", e);
            }
        }
    }

    /// 失败处理：预算内的瞬时错误重新排队，否则永久失败
    async fn handle_failure(&self, task: &Task, err: ExecutionError) {
        let attempts = (task.retry_count + 1) as u32;

        if err.is_retryable() && task.can_retry() {
            let update = TaskUpdate {
                status: Some(TaskStatus::Pending),
                retry_count: Some(task.retry_count + 1),
                worker_id: Some(None),
                claimed_at: Some(None),
                ..Default::default()
            };

            match self.repository.update_fields(task.id, update).await {
                Ok(_) => {
                    counter!("genrs_tasks_retried_total").increment(1);
                    info!(
                        "Requeued task after attempt {}/{}: {}",
                        attempts,
                        task.max_retries + 1,
                        err
                    );
                }
                Err(RepositoryError::NotFound) => {
                    debug!("Task row gone before requeue, assuming cancelled");
                }
                Err(e) => {
                    error!("Failed to requeue task: {}", e);
                }
            }
            return;
        }

        let result = TaskResult::failure(err.code(), err.to_string(), attempts);
        let update = TaskUpdate {
            status: Some(TaskStatus::Failed),
            result: Some(serde_json::to_value(&result).unwrap_or(serde_json::Value::Null)),
            worker_id: Some(None),
            claimed_at: Some(None),
            completed_at: Some(Some(Utc::now().into())),
            ..Default::default()
        };

        match self.repository.update_fields(task.id, update).await {
            Ok(_) => {
                counter!("genrs_tasks_failed_total").increment(1);
                warn!(
                    "Task permanently failed after {} attempt(s): {} ({})",
                    attempts,
                    err,
                    err.code()
                );
            }
            Err(RepositoryError::NotFound) => {
                debug!("Task row gone before failure record, assuming cancelled");
            }
            Err(e) => {
                error!("Failed to persist failure: {}", e);
            }
        }
    }
}

/// 生成产物的存储键
fn asset_key(task: &Task, content_type: &str) -> String {
    format!(
        "assets/{}/{}/{}.{}",
        task.owner_id,
        task.project_id,
        task.id,
        extension_for(content_type)
    )
}

/// 按内容类型推导文件扩展名
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => "bin",
    }
}
