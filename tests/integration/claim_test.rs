// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::common::{image_task, seed_owner_and_project, setup_db, task_repo};
use chrono::{Duration, Utc};
use genrs::domain::models::task::TaskStatus;
use genrs::domain::repositories::task_repository::TaskRepository;
use std::collections::HashSet;
use uuid::Uuid;

#[tokio::test]
async fn test_claim_transitions_pending_to_processing() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    let task = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();

    let worker_id = Uuid::new_v4();
    let claimed = repo.claim(worker_id, 5).await.unwrap();

    assert_eq!(claimed.len(), 1);
    let claimed = &claimed[0];
    assert_eq!(claimed.id, task.id);
    assert_eq!(claimed.status, TaskStatus::Processing);
    assert_eq!(claimed.worker_id, Some(worker_id));
    assert!(claimed.claimed_at.is_some());
    assert!(claimed.started_at.is_some());

    // 已被领取的任务不会被第二次领走
    let second = repo.claim(Uuid::new_v4(), 5).await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn test_concurrent_claims_are_disjoint() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    for _ in 0..3 {
        repo.create(&image_task(owner_id, project_id))
            .await
            .unwrap();
    }

    let worker_a = Uuid::new_v4();
    let worker_b = Uuid::new_v4();
    let (batch_a, batch_b) = tokio::join!(repo.claim(worker_a, 5), repo.claim(worker_b, 5));
    let batch_a = batch_a.unwrap();
    let batch_b = batch_b.unwrap();

    // 两个领取者拿到互不相交的子集，总数不超过待领取任务数
    let mut seen = HashSet::new();
    for task in batch_a.iter().chain(batch_b.iter()) {
        assert!(seen.insert(task.id), "task {} claimed twice", task.id);
    }
    assert_eq!(batch_a.len() + batch_b.len(), 3);

    // 队列已空
    let rest = repo.claim(Uuid::new_v4(), 5).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_many_claimers_split_queue_without_overlap() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    for _ in 0..10 {
        repo.create(&image_task(owner_id, project_id))
            .await
            .unwrap();
    }

    let claims = (0..4).map(|_| repo.claim(Uuid::new_v4(), 3));
    let batches = futures::future::join_all(claims).await;

    let mut seen = HashSet::new();
    let mut total = 0usize;
    for batch in batches {
        for task in batch.unwrap() {
            assert!(seen.insert(task.id), "task {} claimed twice", task.id);
            total += 1;
        }
    }
    // 四个领取者每次至多3个：总领取数不超过任务数，也不超过12
    assert!(total <= 10);

    // 剩余任务仍然可以被领取，全队列恰好被消费一次
    let rest = repo.claim(Uuid::new_v4(), 10).await.unwrap();
    for task in &rest {
        assert!(seen.insert(task.id), "task {} claimed twice", task.id);
    }
    assert_eq!(total + rest.len(), 10);
}

#[tokio::test]
async fn test_claim_respects_limit_and_creation_order() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    let mut ids = Vec::new();
    for age_mins in [30i64, 20, 10] {
        let mut task = image_task(owner_id, project_id);
        task.created_at = (Utc::now() - Duration::minutes(age_mins)).into();
        ids.push(repo.create(&task).await.unwrap().id);
    }

    let claimed = repo.claim(Uuid::new_v4(), 2).await.unwrap();
    assert_eq!(claimed.len(), 2);
    // 最早创建的任务先被领取
    assert_eq!(claimed[0].id, ids[0]);
    assert_eq!(claimed[1].id, ids[1]);
}

#[tokio::test]
async fn test_claim_limit_zero_returns_empty() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    let repo = task_repo(&db, 300);

    repo.create(&image_task(owner_id, project_id))
        .await
        .unwrap();

    let claimed = repo.claim(Uuid::new_v4(), 0).await.unwrap();
    assert!(claimed.is_empty());
}

#[tokio::test]
async fn test_stale_processing_task_is_claimable_again() {
    let db = setup_db().await;
    let (owner_id, project_id, _) = seed_owner_and_project(db.as_ref()).await;
    // 阈值为0：任何已领取的任务立即视为过期
    let repo = task_repo(&db, 0);

    let task = repo
        .create(&image_task(owner_id, project_id))
        .await
        .unwrap();

    let dead_worker = Uuid::new_v4();
    let first = repo.claim(dead_worker, 1).await.unwrap();
    assert_eq!(first.len(), 1);

    // 模拟工作器崩溃：任务停留在processing，领取已过期，可被接管
    let live_worker = Uuid::new_v4();
    let second = repo.claim(live_worker, 1).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, task.id);
    assert_eq!(second[0].worker_id, Some(live_worker));
    assert_eq!(second[0].status, TaskStatus::Processing);
}
