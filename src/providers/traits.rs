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

use crate::domain::models::params::{
    GenerateImageParams, GenerateVideoParams, ImageRemoveBackgroundParams, ImageUpscaleParams,
};
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// 提供商错误类型
#[derive(Error, Debug)]
pub enum ProviderError {
    /// 请求失败（网络、超时）
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 提供商返回非成功状态
    #[error("Provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    /// 内容被提供商拒绝
    #[error("Content rejected: {0}")]
    ContentRejected(String),
    /// 响应格式非法
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// 判断错误是否可重试
    ///
    /// 网络错误、超时、限流和5xx视为瞬时错误；
    /// 内容拒绝和响应格式问题重试也不会成功
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::ContentRejected(_) => false,
            ProviderError::InvalidResponse(_) => false,
        }
    }
}

/// 生成产物
///
/// 提供商返回的原始输出，已统一解析为字节和内容类型
#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    /// 产物内容
    pub data: Bytes,
    /// 内容类型
    pub content_type: String,
}

/// 生成提供商特质
///
/// 每个任务类型对应一个操作。具体提供商负责把自身的
/// 线上格式（内联字节、base64或下载URL）统一解析为GeneratedAsset。
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// 文生图
    async fn generate_image(
        &self,
        params: &GenerateImageParams,
    ) -> Result<GeneratedAsset, ProviderError>;

    /// 文生视频
    async fn generate_video(
        &self,
        params: &GenerateVideoParams,
    ) -> Result<GeneratedAsset, ProviderError>;

    /// 图片放大
    async fn upscale_image(
        &self,
        params: &ImageUpscaleParams,
        source: &[u8],
    ) -> Result<GeneratedAsset, ProviderError>;

    /// 背景移除
    async fn remove_background(
        &self,
        params: &ImageRemoveBackgroundParams,
        source: &[u8],
    ) -> Result<GeneratedAsset, ProviderError>;
}
