// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use genrs::application::dto::task_response::TaskResponseDto;
use genrs::domain::models::task::{Task, TaskResult, TaskType};
use serde_json::json;
use uuid::Uuid;

#[test]
fn test_task_type_wire_names() {
    // 线上格式与客户端约定，改动会破坏现有画布应用
    assert_eq!(
        serde_json::to_value(TaskType::GenerateImage).unwrap(),
        json!("generate_image")
    );
    assert_eq!(
        serde_json::to_value(TaskType::GenerateVideo).unwrap(),
        json!("generate_video")
    );
    assert_eq!(
        serde_json::to_value(TaskType::ImageUpscale).unwrap(),
        json!("image_upscale")
    );
    assert_eq!(
        serde_json::to_value(TaskType::ImageRemoveBackground).unwrap(),
        json!("image_remove_background")
    );
}

#[test]
fn test_task_response_shape() {
    let mut task = Task::new(
        TaskType::GenerateImage,
        Uuid::new_v4(),
        Uuid::new_v4(),
        Some("shape:poster".to_string()),
        json!({"prompt": "poster art"}),
    );
    task.result = Some(
        serde_json::to_value(TaskResult::success(
            "assets/a/b/c.png".to_string(),
            "abc123".to_string(),
            "image/png".to_string(),
            512,
            900,
        ))
        .unwrap(),
    );

    let dto: TaskResponseDto = task.into();
    let value = serde_json::to_value(&dto).unwrap();

    assert_eq!(value["status"], "pending");
    assert_eq!(value["shape_id"], "shape:poster");
    assert_eq!(value["result"]["asset_key"], "assets/a/b/c.png");
    assert_eq!(value["result"]["size_bytes"], 512);
    // 失败字段在成功结果中不出现
    assert!(value["result"].get("error_code").is_none());
}
