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

use crate::config::settings::ProviderSettings;
use crate::domain::models::params::{
    GenerateImageParams, GenerateVideoParams, ImageRemoveBackgroundParams, ImageUpscaleParams,
};
use crate::providers::traits::{GeneratedAsset, GenerativeProvider, ProviderError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// 生成接口的统一响应格式
///
/// 产物以内联base64或下载URL二选一返回
#[derive(Debug, Deserialize)]
struct GenerationResponse {
    output: GenerationOutput,
}

#[derive(Debug, Deserialize)]
struct GenerationOutput {
    data_b64: Option<String>,
    url: Option<String>,
    content_type: Option<String>,
}

/// HTTP生成提供商
///
/// 基于reqwest实现的外部AI计算服务客户端
pub struct HttpProvider {
    client: Client,
    base_url: String,
}

impl HttpProvider {
    /// 创建新的HTTP提供商实例
    ///
    /// # 参数
    ///
    /// * `settings` - 提供商配置
    ///
    /// # 返回值
    ///
    /// 返回新的HTTP提供商实例
    pub fn new(settings: &ProviderSettings) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("Genrs-Worker/0.1.0"),
        );
        if let Some(api_key) = &settings.api_key {
            if let Ok(value) = header::HeaderValue::from_str(&format!("Bearer {}", api_key)) {
                headers.insert(header::AUTHORIZATION, value);
            }
        }

        let timeout = Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 发起生成请求并解析产物
    async fn post_generation(
        &self,
        path: &str,
        payload: Value,
        default_content_type: &str,
    ) -> Result<GeneratedAsset, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_error_status(status, message));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        self.resolve_output(parsed.output, default_content_type)
            .await
    }

    /// 统一解析提供商输出：内联base64直接解码，URL则下载
    async fn resolve_output(
        &self,
        output: GenerationOutput,
        default_content_type: &str,
    ) -> Result<GeneratedAsset, ProviderError> {
        let content_type = output
            .content_type
            .unwrap_or_else(|| default_content_type.to_string());

        if let Some(data_b64) = output.data_b64 {
            let data = BASE64
                .decode(data_b64.as_bytes())
                .map_err(|e| ProviderError::InvalidResponse(format!("bad base64: {}", e)))?;
            return Ok(GeneratedAsset {
                data: data.into(),
                content_type,
            });
        }

        if let Some(url) = output.url {
            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                    message: format!("asset download from {} failed", url),
                });
            }
            let data = response.bytes().await?;
            return Ok(GeneratedAsset { data, content_type });
        }

        Err(ProviderError::InvalidResponse(
            "output carries neither data_b64 nor url".to_string(),
        ))
    }
}

/// 按状态码归类提供商错误
fn classify_error_status(status: StatusCode, message: String) -> ProviderError {
    // 内容审核拒绝在响应体中带有固定错误码
    if (status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY)
        && message.contains("content_policy")
    {
        return ProviderError::ContentRejected(message);
    }
    ProviderError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl GenerativeProvider for HttpProvider {
    async fn generate_image(
        &self,
        params: &GenerateImageParams,
    ) -> Result<GeneratedAsset, ProviderError> {
        let payload = json!({
            "prompt": params.prompt,
            "negative_prompt": params.negative_prompt,
            "width": params.width,
            "height": params.height,
            "style": params.style,
            "seed": params.seed,
        });
        self.post_generation("/v1/images/generations", payload, "image/png")
            .await
    }

    async fn generate_video(
        &self,
        params: &GenerateVideoParams,
    ) -> Result<GeneratedAsset, ProviderError> {
        let payload = json!({
            "prompt": params.prompt,
            "duration_secs": params.duration_secs,
            "width": params.width,
            "height": params.height,
        });
        self.post_generation("/v1/videos/generations", payload, "video/mp4")
            .await
    }

    async fn upscale_image(
        &self,
        params: &ImageUpscaleParams,
        source: &[u8],
    ) -> Result<GeneratedAsset, ProviderError> {
        let payload = json!({
            "image_b64": BASE64.encode(source),
            "scale": params.scale.unwrap_or(2),
        });
        self.post_generation("/v1/images/upscale", payload, "image/png")
            .await
    }

    async fn remove_background(
        &self,
        _params: &ImageRemoveBackgroundParams,
        source: &[u8],
    ) -> Result<GeneratedAsset, ProviderError> {
        let payload = json!({
            "image_b64": BASE64.encode(source),
        });
        self.post_generation("/v1/images/background-removal", payload, "image/png")
            .await
    }
}
