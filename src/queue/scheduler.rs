// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MaintenanceSettings;
use crate::domain::repositories::task_repository::TaskRepository;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info};

/// 维护调度器
///
/// 两个互相独立的周期性任务：过期任务回收和终态任务归档。
/// 仓库自身的原子性保证了多实例并发执行也是安全的，
/// 部署上从任意单实例运行即可。
pub struct MaintenanceScheduler<R: TaskRepository + 'static> {
    /// 任务仓库
    repository: Arc<R>,
    /// 回收间隔（秒）
    reclaim_interval_secs: u64,
    /// 归档间隔（秒）
    archive_interval_secs: u64,
    /// 终态任务保留天数
    archive_retention_days: u32,
}

impl<R: TaskRepository + 'static> MaintenanceScheduler<R> {
    /// 创建新的维护调度器实例
    ///
    /// # 参数
    ///
    /// * `repository` - 任务仓库
    /// * `settings` - 维护配置
    ///
    /// # 返回值
    ///
    /// 返回新的维护调度器实例
    pub fn new(repository: Arc<R>, settings: &MaintenanceSettings) -> Self {
        Self {
            repository,
            reclaim_interval_secs: settings.reclaim_interval_secs,
            archive_interval_secs: settings.archive_interval_secs,
            archive_retention_days: settings.archive_retention_days,
        }
    }

    /// 启动维护后台任务
    ///
    /// # 返回值
    ///
    /// 返回回收和归档两个后台任务的句柄
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        vec![self.start_stale_reclaim(), self.start_archival()]
    }

    /// 过期任务回收：把卡在processing且领取已过期的任务重置回pending
    ///
    /// 这是崩溃或挂起的工作器留下的任务得以恢复的机制
    fn start_stale_reclaim(&self) -> JoinHandle<()> {
        let repository = self.repository.clone();
        let period = TokioDuration::from_secs(self.reclaim_interval_secs);

        tokio::spawn(async move {
            let mut ticker = interval(period);

            loop {
                ticker.tick().await;

                match repository.cleanup_stale().await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Reclaimed {} stale task(s)", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to reclaim stale tasks: {}", e);
                    }
                }
            }
        })
    }

    /// 终态任务归档：删除超过保留窗口的completed/failed任务，约束表的增长
    fn start_archival(&self) -> JoinHandle<()> {
        let repository = self.repository.clone();
        let period = TokioDuration::from_secs(self.archive_interval_secs);
        let retention = chrono::Duration::days(self.archive_retention_days as i64);

        tokio::spawn(async move {
            let mut ticker = interval(period);

            loop {
                ticker.tick().await;

                match repository.archive_terminal(retention).await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Archived {} terminal task(s)", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to archive terminal tasks: {}", e);
                    }
                }
            }
        })
    }
}
