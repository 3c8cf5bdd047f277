mod common;

use tracker_core::models::attachment::{AttachmentPolicy, DocumentType};
use tracker_core::models::audit::AuditAction;
use tracker_service::attachments::AttachmentUpload;
use tracker_service::{Error, Settings};

use common::{harness, harness_with, input};

fn pdf(name: &str, body: &str) -> (String, Vec<u8>) {
    (name.to_string(), format!("%PDF-1.7\n{}", body).into_bytes())
}

fn upload(activity_id: &str, document_type: DocumentType, file: (String, Vec<u8>)) -> AttachmentUpload {
    AttachmentUpload {
        activity_id: activity_id.to_string(),
        document_type,
        filename: file.0,
        description: Some("signed copy".into()),
        bytes: file.1,
    }
}

fn stored_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                stored_files(&path)
            } else {
                1
            }
        })
        .sum()
}

#[tokio::test]
async fn three_contracts_then_deleting_the_latest_promotes_the_previous() {
    let h = harness().await;
    let activity = h.service.create_activity(&h.admin, &input("Borehole drilling", "WASH")).await.unwrap();
    let id = activity.activity.id.as_str();

    let mut versions = Vec::new();
    for n in 1..=3 {
        let file = pdf(&format!("contract-{}.pdf", n), "terms");
        let stored = h
            .service
            .upload_attachment(&h.officer, upload(id, DocumentType::Contract, file))
            .await
            .unwrap();
        versions.push(stored);
    }
    assert_eq!(versions.iter().map(|a| a.version).collect::<Vec<_>>(), vec![1, 2, 3]);

    let history = h.service.attachment_history(&h.officer, id, DocumentType::Contract).await.unwrap();
    let latest: Vec<i64> = history.iter().filter(|a| a.is_latest).map(|a| a.version).collect();
    assert_eq!(latest, vec![3]);

    h.service.delete_attachment(&h.officer, versions[2].id).await.unwrap();

    let history = h.service.attachment_history(&h.officer, id, DocumentType::Contract).await.unwrap();
    assert_eq!(history.iter().map(|a| a.version).collect::<Vec<_>>(), vec![3, 2, 1]);
    assert!(history[0].is_deleted && !history[0].is_latest);
    assert!(history[1].is_latest);

    let groups = h.service.list_attachments(&h.officer, id).await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].document_type, DocumentType::Contract);
    assert_eq!(groups[0].versions.iter().map(|a| a.version).collect::<Vec<_>>(), vec![2, 1]);

    // The deleted version's bytes stay in storage.
    assert_eq!(stored_files(h.storage.path()), 3);
}

#[tokio::test]
async fn rejected_files_never_reach_storage() {
    let settings = Settings {
        attachment_policy: AttachmentPolicy { max_bytes: 64 },
        ..Settings::default()
    };
    let h = harness_with(settings).await;
    let activity = h.service.create_activity(&h.admin, &input("Borehole drilling", "WASH")).await.unwrap();
    let id = activity.activity.id.as_str();

    let cases = [
        ("setup.exe".to_string(), b"MZ\x90\x00".to_vec()),
        ("report.pdf".to_string(), b"not a pdf".to_vec()),
        ("empty.docx".to_string(), Vec::new()),
    ];
    for file in cases {
        let err = h
            .service
            .upload_attachment(&h.admin, upload(id, DocumentType::Report, file))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileConstraint(_)), "unexpected {:?}", err);
    }

    let big = pdf("big.pdf", &"x".repeat(100));
    let err = h
        .service
        .upload_attachment(&h.admin, upload(id, DocumentType::Report, big))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FileTooLarge { limit: 64, .. }));

    assert_eq!(stored_files(h.storage.path()), 0);
}

#[tokio::test]
async fn downloads_return_the_bytes_and_are_audited() {
    let h = harness().await;
    let activity = h.service.create_activity(&h.admin, &input("Borehole drilling", "WASH")).await.unwrap();
    let id = activity.activity.id.as_str();

    let file = pdf("C:\\scans\\receipt.pdf", "paid");
    let expected = file.1.clone();
    let stored = h
        .service
        .upload_attachment(&h.admin, upload(id, DocumentType::Receipt, file))
        .await
        .unwrap();
    assert_eq!(stored.filename, "receipt.pdf");
    assert_eq!(stored.checksum.len(), 64);
    assert_eq!(stored.file_size, expected.len() as i64);

    let (meta, bytes) = h.service.download_attachment(&h.officer, stored.id).await.unwrap();
    assert_eq!(meta.id, stored.id);
    assert_eq!(bytes, expected);

    let trail = h.service.audit_trail(&h.admin, id).await.unwrap();
    assert_eq!(trail[0].action, AuditAction::AttachmentDownloaded);
    assert_eq!(trail[0].username, "mbanda");
    assert_eq!(trail[1].action, AuditAction::AttachmentUploaded);

    h.service.delete_attachment(&h.admin, stored.id).await.unwrap();
    assert!(matches!(
        h.service.download_attachment(&h.admin, stored.id).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        h.service.delete_attachment(&h.admin, stored.id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn attachments_follow_activity_visibility_and_roles() {
    let h = harness().await;
    let wash = h.service.create_activity(&h.admin, &input("Borehole drilling", "WASH")).await.unwrap();
    let health = h.service.create_activity(&h.admin, &input("Clinic outreach", "HEALTH")).await.unwrap();

    // Viewers may look but not upload.
    assert!(matches!(
        h.service
            .upload_attachment(&h.viewer, upload(&health.activity.id, DocumentType::Report, pdf("r.pdf", "")))
            .await,
        Err(Error::Permission(_))
    ));
    // The WASH officer cannot reach a HEALTH activity.
    assert!(matches!(
        h.service
            .upload_attachment(&h.officer, upload(&health.activity.id, DocumentType::Report, pdf("r.pdf", "")))
            .await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        h.service.list_attachments(&h.viewer, &wash.activity.id).await,
        Err(Error::NotFound(_))
    ));
    assert!(h.service.list_attachments(&h.viewer, &health.activity.id).await.unwrap().is_empty());
}
