// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{RateLimitingSettings, WorkerSettings};
use crate::domain::repositories::storage_repository::StorageRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::providers::traits::GenerativeProvider;
use crate::workers::generation_worker::{GenerationWorker, WorkerStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// 工作管理器
///
/// 负责构建并启动一组生成工作器，并提供状态查询和关闭
pub struct WorkerManager<R, P>
where
    R: TaskRepository + 'static,
    P: GenerativeProvider + 'static,
{
    repository: Arc<R>,
    storage: Arc<dyn StorageRepository>,
    provider: Arc<P>,
    concurrency: usize,
    poll_interval: Duration,
    provider_rpm: Option<u32>,
    workers: Vec<Arc<GenerationWorker<R, P>>>,
    handles: Vec<JoinHandle<()>>,
}

impl<R, P> WorkerManager<R, P>
where
    R: TaskRepository + 'static,
    P: GenerativeProvider + 'static,
{
    pub fn new(
        repository: Arc<R>,
        storage: Arc<dyn StorageRepository>,
        provider: Arc<P>,
        worker_settings: &WorkerSettings,
        rate_settings: &RateLimitingSettings,
    ) -> Self {
        let provider_rpm = if rate_settings.enabled {
            Some(rate_settings.provider_rpm)
        } else {
            None
        };

        Self {
            repository,
            storage,
            provider,
            concurrency: worker_settings.concurrency,
            poll_interval: Duration::from_secs(worker_settings.poll_interval_secs),
            provider_rpm,
            workers: Vec::new(),
            handles: Vec::new(),
        }
    }

    /// 启动工作器
    ///
    /// 创建并启动指定数量的工作器，每个持有独立的标识和限流器
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作器数量
    pub fn start_workers(&mut self, count: usize) {
        for _ in 0..count {
            let worker = Arc::new(GenerationWorker::new(
                self.repository.clone(),
                self.storage.clone(),
                self.provider.clone(),
                self.concurrency,
                self.poll_interval,
                self.provider_rpm,
            ));
            self.workers.push(worker.clone());

            // 轮询循环放到独立任务上，避免阻塞启动流程
            let handle = tokio::spawn(async move {
                worker.run().await;
            });
            self.handles.push(handle);
        }

        info!("Started {} generation worker(s)", count);
    }

    /// 获取所有工作器的状态快照
    pub fn statuses(&self) -> Vec<WorkerStatus> {
        self.workers.iter().map(|w| w.status()).collect()
    }

    /// 关闭所有工作器
    ///
    /// 先请求轮询循环退出，再中止循环任务。在途任务执行到自然结束，
    /// 进程退出前没跑完的任务由过期回收机制接管。
    pub fn shutdown(&self) {
        info!("Shutting down workers...");
        for worker in &self.workers {
            worker.stop();
        }
        for handle in &self.handles {
            handle.abort();
        }
        info!("Workers shut down successfully");
    }
}
