// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use tracing::info;

/// 启动Prometheus指标导出器
///
/// 工作器在任务完成、失败、重试时写入计数器，
/// 执行耗时写入直方图，全部经由这里暴露
pub fn init_metrics(port: u16) {
    let builder = PrometheusBuilder::new();
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = builder.with_http_listener(addr).install() {
        tracing::warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
    }

    info!("Metrics exporter listening on {}", addr);
}
