mod common;

use common::{file_pool, memory_pool, new_activity, seed};
use sqlx::SqlitePool;
use tracker_core::models::{Attachment, DocumentType, FileType, NewAttachment};
use tracker_db::{ActivityRepository, AttachmentRepository, Error};
use uuid::Uuid;

fn contract(activity_id: &str, filename: &str) -> NewAttachment {
    let id = Uuid::now_v7();
    NewAttachment {
        id,
        activity_id: activity_id.into(),
        document_type: DocumentType::Contract,
        filename: filename.into(),
        file_type: FileType::Pdf,
        description: None,
        file_size: 1024,
        checksum: "00".repeat(32),
        storage_key: format!("{activity_id}/{id}"),
        uploaded_by: "admin".into(),
    }
}

async fn activity(pool: &SqlitePool) -> String {
    let fx = seed(pool).await;
    ActivityRepository::new(pool.clone())
        .create(&new_activity(&fx, 2026, "Clinic refurbishment"), "admin")
        .await
        .unwrap()
        .id
}

fn latest(history: &[Attachment]) -> Vec<i64> {
    history
        .iter()
        .filter(|a| a.is_latest && !a.is_deleted)
        .map(|a| a.version)
        .collect()
}

#[tokio::test]
async fn versions_increment_and_delete_promotes_previous() {
    let pool = memory_pool().await;
    let activity_id = activity(&pool).await;
    let repo = AttachmentRepository::new(pool.clone());

    let mut uploaded = Vec::new();
    for name in ["contract-a.pdf", "contract-b.pdf", "contract-c.pdf"] {
        uploaded.push(repo.insert_version(&contract(&activity_id, name)).await.unwrap());
    }
    assert_eq!(uploaded.iter().map(|a| a.version).collect::<Vec<_>>(), vec![1, 2, 3]);

    let history = repo.history(&activity_id, DocumentType::Contract).await.unwrap();
    assert_eq!(history.iter().map(|a| a.version).collect::<Vec<_>>(), vec![3, 2, 1]);
    assert_eq!(latest(&history), vec![3]);

    let deleted = repo.soft_delete(uploaded[2].id, "admin").await.unwrap();
    assert!(deleted.is_deleted);
    assert!(!deleted.is_latest);

    let history = repo.history(&activity_id, DocumentType::Contract).await.unwrap();
    assert_eq!(history.len(), 3, "deleted versions stay in the history");
    assert_eq!(latest(&history), vec![2]);
}

#[tokio::test]
async fn deleting_a_non_latest_version_keeps_the_latest() {
    let pool = memory_pool().await;
    let activity_id = activity(&pool).await;
    let repo = AttachmentRepository::new(pool.clone());

    let v1 = repo.insert_version(&contract(&activity_id, "v1.pdf")).await.unwrap();
    repo.insert_version(&contract(&activity_id, "v2.pdf")).await.unwrap();
    repo.soft_delete(v1.id, "admin").await.unwrap();

    let history = repo.history(&activity_id, DocumentType::Contract).await.unwrap();
    assert_eq!(latest(&history), vec![2]);

    let err = repo.soft_delete(v1.id, "admin").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn version_numbers_are_not_reused_after_delete() {
    let pool = memory_pool().await;
    let activity_id = activity(&pool).await;
    let repo = AttachmentRepository::new(pool.clone());

    let v1 = repo.insert_version(&contract(&activity_id, "v1.pdf")).await.unwrap();
    repo.soft_delete(v1.id, "admin").await.unwrap();
    let v2 = repo.insert_version(&contract(&activity_id, "again.pdf")).await.unwrap();

    assert_eq!(v2.version, 2);
    assert!(repo.list_active(&activity_id).await.unwrap().iter().all(|a| a.id != v1.id));
}

#[tokio::test]
async fn document_types_version_independently() {
    let pool = memory_pool().await;
    let activity_id = activity(&pool).await;
    let repo = AttachmentRepository::new(pool.clone());

    repo.insert_version(&contract(&activity_id, "c.pdf")).await.unwrap();
    let mut report = contract(&activity_id, "r.pdf");
    report.document_type = DocumentType::Report;
    let report = repo.insert_version(&report).await.unwrap();

    assert_eq!(report.version, 1);
    assert!(report.is_latest);
    assert_eq!(repo.list_active(&activity_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_uploads_leave_exactly_one_latest() {
    let dir = tempfile::tempdir().unwrap();
    let pool = file_pool(&dir).await;
    let activity_id = activity(&pool).await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let repo = AttachmentRepository::new(pool.clone());
        let new = contract(&activity_id, &format!("contract-{i}.pdf"));
        handles.push(tokio::spawn(async move { repo.insert_version(&new).await }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let history = AttachmentRepository::new(pool.clone())
        .history(&activity_id, DocumentType::Contract)
        .await
        .unwrap();
    let mut versions: Vec<i64> = history.iter().map(|a| a.version).collect();
    versions.sort();
    assert_eq!(versions, (1..=12).collect::<Vec<i64>>());
    assert_eq!(latest(&history), vec![12]);
}
