// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::common::{image_task, seed_owner_and_project, setup_db, task_repo};
use chrono::{Duration, Utc};
use genrs::domain::models::task::{TaskStatus, TaskType};
use genrs::domain::repositories::task_repository::{
    RepositoryError, TaskQueryParams, TaskRepository, TaskUpdate,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_cleanup_stale_resets_abandoned_tasks() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let stale_repo = task_repo(&db, 0);

    let task = stale_repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();
    stale_repo.claim(Uuid::new_v4(), 1).await.unwrap();

    let reclaimed = stale_repo.cleanup_stale().await.unwrap();
    assert_eq!(reclaimed, 1);

    let task = stale_repo
        .find_by_id(task.id, owner_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.worker_id.is_none());
    assert!(task.claimed_at.is_none());

    // 回收后可以再次被领取
    let claimed = stale_repo.claim(Uuid::new_v4(), 1).await.unwrap();
    assert_eq!(claimed.len(), 1);
}

#[tokio::test]
async fn test_cleanup_stale_leaves_fresh_claims_alone() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 3600);

    repo.create(&image_task(owner_id, project_id))
        .await
        .unwrap();
    repo.claim(Uuid::new_v4(), 1).await.unwrap();

    // 阈值一小时，刚领取的任务不会被回收
    let reclaimed = repo.cleanup_stale().await.unwrap();
    assert_eq!(reclaimed, 0);
}

#[tokio::test]
async fn test_cancel_idempotence() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    // pending任务：取消生效，重复取消返回false
    let pending = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();
    assert!(repo.cancel(pending.id, owner_id).await.unwrap());
    assert!(!repo.cancel(pending.id, owner_id).await.unwrap());
    assert!(repo
        .find_by_id(pending.id, owner_id)
        .await
        .unwrap()
        .is_none());

    // 终态任务：取消是空操作，行保持不变
    let completed = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();
    repo.update_fields(
        completed.id,
        TaskUpdate {
            status: Some(TaskStatus::Completed),
            completed_at: Some(Some(Utc::now().into())),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(!repo.cancel(completed.id, owner_id).await.unwrap());
    let untouched = repo
        .find_by_id(completed.id, owner_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_cancel_is_owner_scoped() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    let task = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();

    assert!(!repo.cancel(task.id, Uuid::new_v4()).await.unwrap());
    assert!(repo
        .find_by_id(task.id, owner_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_archive_terminal_respects_retention_window() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    let old_completed = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();
    repo.update_fields(
        old_completed.id,
        TaskUpdate {
            status: Some(TaskStatus::Completed),
            completed_at: Some(Some((Utc::now() - Duration::days(8)).into())),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let recent_failed = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();
    repo.update_fields(
        recent_failed.id,
        TaskUpdate {
            status: Some(TaskStatus::Failed),
            completed_at: Some(Some((Utc::now() - Duration::days(1)).into())),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let still_pending = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();

    let archived = repo.archive_terminal(Duration::days(7)).await.unwrap();
    assert_eq!(archived, 1);

    // 窗口外的已删除，窗口内的和非终态的保留
    assert!(repo
        .find_by_id(old_completed.id, owner_id)
        .await
        .unwrap()
        .is_none());
    assert!(repo
        .find_by_id(recent_failed.id, owner_id)
        .await
        .unwrap()
        .is_some());
    assert!(repo
        .find_by_id(still_pending.id, owner_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_update_fields_missing_row_is_not_found() {
    let db = setup_db().await;
    let (_, _, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    let result = repo
        .update_fields(
            Uuid::new_v4(),
            TaskUpdate {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
}

#[tokio::test]
async fn test_find_by_id_is_owner_scoped() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    let task = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();

    assert!(repo
        .find_by_id(task.id, owner_id)
        .await
        .unwrap()
        .is_some());
    // 他人视角下任务不存在
    assert!(repo
        .find_by_id(task.id, Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_query_tasks_filters_and_pagination() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    for age_mins in [3i64, 2, 1] {
        let mut task = image_task(owner_id, project_id);
        task.created_at = (Utc::now() - Duration::minutes(age_mins)).into();
        repo.create(&task).await.unwrap();
    }
    let video = genrs::domain::models::task::Task::new(
        TaskType::GenerateVideo,
        owner_id,
        project_id,
        None,
        json!({"prompt": "drifting clouds"}),
    );
    repo.create(&video).await.unwrap();

    // 类型过滤
    let (tasks, total) = repo
        .query_tasks(TaskQueryParams {
            owner_id,
            project_id,
            task_types: Some(vec![TaskType::GenerateVideo]),
            statuses: None,
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(tasks[0].task_type, TaskType::GenerateVideo);

    // 分页，按创建时间倒序
    let (page, total) = repo
        .query_tasks(TaskQueryParams {
            owner_id,
            project_id,
            task_types: None,
            statuses: Some(vec![TaskStatus::Pending]),
            limit: 2,
            offset: 0,
        })
        .await
        .unwrap();
    assert_eq!(total, 4);
    assert_eq!(page.len(), 2);
    assert!(page[0].created_at >= page[1].created_at);

    // 其他用户看不到任何任务
    let (foreign, total) = repo
        .query_tasks(TaskQueryParams {
            owner_id: Uuid::new_v4(),
            project_id,
            task_types: None,
            statuses: None,
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(foreign.is_empty());
}

#[tokio::test]
async fn test_stats_counts_by_status() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    for _ in 0..2 {
        repo.create(&image_task(owner_id, project_id))
            .await
            .unwrap();
    }
    let failed = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();
    repo.update_fields(
        failed.id,
        TaskUpdate {
            status: Some(TaskStatus::Failed),
            completed_at: Some(Some(Utc::now().into())),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.get(&TaskStatus::Pending), Some(&2));
    assert_eq!(stats.get(&TaskStatus::Failed), Some(&1));
    assert_eq!(stats.get(&TaskStatus::Processing), Some(&0));
    assert_eq!(stats.get(&TaskStatus::Completed), Some(&0));
}
