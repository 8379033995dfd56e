// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::TaskType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 参数校验错误
#[derive(Error, Debug)]
pub enum ParamsError {
    /// 负载无法解析为对应任务类型的参数结构
    #[error("Malformed task body: {0}")]
    Malformed(String),

    /// 负载解析成功但取值不符合规则
    #[error("Invalid task body: {0}")]
    Invalid(String),
}

/// 图片生成参数
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerateImageParams {
    /// 生成提示词
    pub prompt: String,
    /// 负向提示词（可选）
    pub negative_prompt: Option<String>,
    /// 输出宽度（像素）
    pub width: Option<u32>,
    /// 输出高度（像素）
    pub height: Option<u32>,
    /// 风格预设（可选）
    pub style: Option<String>,
    /// 随机种子，固定后可复现
    pub seed: Option<u64>,
}

/// 视频生成参数
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerateVideoParams {
    /// 生成提示词
    pub prompt: String,
    /// 视频时长（秒）
    pub duration_secs: Option<u32>,
    /// 作为首帧的源图片存储键（可选）
    pub source_key: Option<String>,
    /// 输出宽度（像素）
    pub width: Option<u32>,
    /// 输出高度（像素）
    pub height: Option<u32>,
}

/// 图片放大参数
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageUpscaleParams {
    /// 源图片存储键
    pub source_key: String,
    /// 放大倍数，支持2或4
    pub scale: Option<u32>,
}

/// 背景移除参数
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageRemoveBackgroundParams {
    /// 源图片存储键
    pub source_key: String,
}

const MAX_PROMPT_LEN: usize = 2000;
const MIN_DIMENSION: u32 = 64;
const MAX_DIMENSION: u32 = 4096;
const MAX_VIDEO_SECS: u32 = 30;

/// 按任务类型解析后的强类型参数
///
/// 每个任务类型对应一个变体，分发处做穷尽匹配，
/// 新增任务类型时编译器会强制补全所有处理分支。
#[derive(Debug, Clone)]
pub enum TaskParams {
    GenerateImage(GenerateImageParams),
    GenerateVideo(GenerateVideoParams),
    ImageUpscale(ImageUpscaleParams),
    ImageRemoveBackground(ImageRemoveBackgroundParams),
}

impl TaskParams {
    /// 解析并校验任务负载
    ///
    /// 在任务创建时调用一次；工作器执行时再次调用以获得强类型参数。
    ///
    /// # 参数
    ///
    /// * `task_type` - 任务类型
    /// * `body` - 原始负载
    ///
    /// # 返回值
    ///
    /// * `Ok(TaskParams)` - 解析并校验通过的参数
    /// * `Err(ParamsError)` - 负载格式错误或取值非法
    pub fn parse(task_type: TaskType, body: &Value) -> Result<Self, ParamsError> {
        match task_type {
            TaskType::GenerateImage => {
                let params: GenerateImageParams = from_body(body)?;
                validate_prompt(&params.prompt)?;
                validate_dimensions(params.width, params.height)?;
                Ok(TaskParams::GenerateImage(params))
            }
            TaskType::GenerateVideo => {
                let params: GenerateVideoParams = from_body(body)?;
                validate_prompt(&params.prompt)?;
                validate_dimensions(params.width, params.height)?;
                if let Some(secs) = params.duration_secs {
                    if secs == 0 || secs > MAX_VIDEO_SECS {
                        return Err(ParamsError::Invalid(format!(
                            "duration_secs must be within 1..={}",
                            MAX_VIDEO_SECS
                        )));
                    }
                }
                Ok(TaskParams::GenerateVideo(params))
            }
            TaskType::ImageUpscale => {
                let params: ImageUpscaleParams = from_body(body)?;
                validate_source_key(&params.source_key)?;
                if let Some(scale) = params.scale {
                    if scale != 2 && scale != 4 {
                        return Err(ParamsError::Invalid(
                            "scale must be 2 or 4".to_string(),
                        ));
                    }
                }
                Ok(TaskParams::ImageUpscale(params))
            }
            TaskType::ImageRemoveBackground => {
                let params: ImageRemoveBackgroundParams = from_body(body)?;
                validate_source_key(&params.source_key)?;
                Ok(TaskParams::ImageRemoveBackground(params))
            }
        }
    }
}

fn from_body<T: serde::de::DeserializeOwned>(body: &Value) -> Result<T, ParamsError> {
    serde_json::from_value(body.clone()).map_err(|e| ParamsError::Malformed(e.to_string()))
}

fn validate_prompt(prompt: &str) -> Result<(), ParamsError> {
    if prompt.trim().is_empty() {
        return Err(ParamsError::Invalid("prompt cannot be empty".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(ParamsError::Invalid(format!(
            "prompt exceeds {} characters",
            MAX_PROMPT_LEN
        )));
    }
    Ok(())
}

fn validate_dimensions(width: Option<u32>, height: Option<u32>) -> Result<(), ParamsError> {
    for (name, value) in [("width", width), ("height", height)] {
        if let Some(v) = value {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&v) {
                return Err(ParamsError::Invalid(format!(
                    "{} must be within {}..={}",
                    name, MIN_DIMENSION, MAX_DIMENSION
                )));
            }
        }
    }
    Ok(())
}

fn validate_source_key(source_key: &str) -> Result<(), ParamsError> {
    if source_key.trim().is_empty() {
        return Err(ParamsError::Invalid(
            "source_key cannot be empty".to_string(),
        ));
    }
    Ok(())
}
