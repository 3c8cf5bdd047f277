mod common;

use std::collections::HashSet;

use common::{file_pool, memory_pool, new_activity, seed};
use rust_decimal_macros::dec;
use tracker_core::access::Visibility;
use tracker_core::identifier::parse_activity_id;
use tracker_core::models::{ActivityFilter, AuditAction, MasterKind, NewAuditEntry};
use tracker_db::{ActivityRepository, AuditRepository, MasterDataRepository};

#[tokio::test]
async fn ids_are_sequential_per_year() {
    let pool = memory_pool().await;
    let fx = seed(&pool).await;
    let repo = ActivityRepository::new(pool.clone());

    let a = repo.create(&new_activity(&fx, 2026, "Borehole drilling"), "admin").await.unwrap();
    let b = repo.create(&new_activity(&fx, 2026, "Latrine construction"), "admin").await.unwrap();
    let c = repo.create(&new_activity(&fx, 2027, "Borehole drilling"), "admin").await.unwrap();

    assert_eq!(a.id, "Y26-000001");
    assert_eq!(b.id, "Y26-000002");
    // Same name, different year: its own sequence.
    assert_eq!(c.id, "Y27-000001");

    let stored = repo.get(&a.id).await.unwrap().unwrap();
    assert_eq!(stored.planned_budget, dec!(2500.75));
    assert_eq!(stored.quarter, 2);
}

#[tokio::test]
async fn retired_ids_are_never_reused() {
    let pool = memory_pool().await;
    let fx = seed(&pool).await;
    let repo = ActivityRepository::new(pool.clone());

    let first = repo.create(&new_activity(&fx, 2026, "First"), "admin").await.unwrap();
    repo.retire(&first.id, &NewAuditEntry::new("admin", AuditAction::ActivityRetired, &first.id))
        .await
        .unwrap();
    let second = repo.create(&new_activity(&fx, 2026, "Second"), "admin").await.unwrap();

    assert_eq!(second.id, "Y26-000002");
    let listed = repo.list(&ActivityFilter::default(), &Visibility::All).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].activity.id, "Y26-000002");
}

#[tokio::test]
async fn concurrent_creation_never_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let pool = file_pool(&dir).await;
    let fx = seed(&pool).await;

    let mut handles = Vec::new();
    for i in 0..24 {
        let repo = ActivityRepository::new(pool.clone());
        let new = new_activity(&fx, 2026, &format!("Activity {i}"));
        handles.push(tokio::spawn(async move { repo.create(&new, "admin").await }));
    }

    let mut sequences = Vec::new();
    for result in futures::future::join_all(handles).await {
        let activity = result.unwrap().unwrap();
        let (yy, seq) = parse_activity_id(&activity.id).unwrap();
        assert_eq!(yy, 26);
        sequences.push(seq);
    }
    let unique: HashSet<i64> = sequences.iter().copied().collect();
    assert_eq!(unique.len(), 24);
    assert_eq!(unique, (1..=24).collect::<HashSet<i64>>());
}

#[tokio::test]
async fn deactivated_master_still_displays_on_existing_records() {
    let pool = memory_pool().await;
    let fx = seed(&pool).await;
    let repo = ActivityRepository::new(pool.clone());
    let masters = MasterDataRepository::new(pool.clone());

    let created = repo.create(&new_activity(&fx, 2026, "Hand washing stations"), "admin").await.unwrap();
    masters.deactivate(MasterKind::Cluster, fx.cluster, "admin").await.unwrap();

    let view = repo.get_view(&created.id).await.unwrap().unwrap();
    assert_eq!(view.activity.cluster_id, fx.cluster);
    assert_eq!(view.cluster_code, "WASH");
    assert_eq!(view.cluster_name, "Water and Sanitation");

    let active_clusters = masters.list(MasterKind::Cluster, false).await.unwrap();
    assert!(active_clusters.is_empty());
    assert_eq!(masters.list(MasterKind::Cluster, true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn visibility_limits_listing_to_member_clusters() {
    let pool = memory_pool().await;
    let fx = seed(&pool).await;
    let repo = ActivityRepository::new(pool.clone());
    repo.create(&new_activity(&fx, 2026, "Visible"), "admin").await.unwrap();

    let mine = repo.list(&ActivityFilter::default(), &Visibility::Clusters(vec![fx.cluster])).await.unwrap();
    let none = repo.list(&ActivityFilter::default(), &Visibility::Clusters(vec![])).await.unwrap();
    let other = repo.list(&ActivityFilter::default(), &Visibility::Clusters(vec![fx.cluster + 100])).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(none.is_empty());
    assert!(other.is_empty());
}

#[tokio::test]
async fn creation_is_audited() {
    let pool = memory_pool().await;
    let fx = seed(&pool).await;
    let created = ActivityRepository::new(pool.clone())
        .create(&new_activity(&fx, 2026, "Audited"), "jbanda")
        .await
        .unwrap();

    let trail = AuditRepository::new(pool.clone()).trail(&created.id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::ActivityCreated);
    assert_eq!(trail[0].username, "jbanda");
}

#[tokio::test]
async fn audit_log_rejects_rewrites() {
    let pool = memory_pool().await;
    let fx = seed(&pool).await;
    ActivityRepository::new(pool.clone())
        .create(&new_activity(&fx, 2026, "Audited"), "admin")
        .await
        .unwrap();

    let update = sqlx::query("UPDATE audit_log SET username = 'someone'").execute(&pool).await;
    let delete = sqlx::query("DELETE FROM audit_log").execute(&pool).await;
    assert!(update.is_err());
    assert!(delete.is_err());
}
