#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use rust_decimal_macros::dec;
use tempfile::TempDir;
use tracker_core::access::{Principal, Role};
use tracker_core::models::master_data::{MasterKind, NewMasterEntry};
use tracker_core::models::user::NewUser;
use tracker_service::activities::ActivityInput;
use tracker_service::{LocalBlobStore, Settings, TrackerService};

pub struct Harness {
    pub service: TrackerService,
    pub storage: TempDir,
    pub admin: Principal,
    pub data_manager: Principal,
    /// Activity manager in WASH.
    pub officer: Principal,
    /// Viewer in HEALTH.
    pub viewer: Principal,
    pub user_manager: Principal,
    pub wash: i64,
    pub health: i64,
}

pub async fn harness() -> Harness {
    harness_with(Settings::default()).await
}

pub async fn harness_with(settings: Settings) -> Harness {
    let pool = tracker_db::connect_in_memory().await.unwrap();
    tracker_db::rebuild_database(&pool).await.unwrap();
    let storage = tempfile::tempdir().unwrap();
    let service = TrackerService::new(pool, Arc::new(LocalBlobStore::new(storage.path())), settings);

    add_user(&service, "admin", "System Administrator", Role::SystemAdmin, vec![]).await;
    let admin = service.authenticate("admin").await.unwrap();

    let wash = master(&service, &admin, MasterKind::Cluster, "WASH", "Water and Sanitation").await;
    let health = master(&service, &admin, MasterKind::Cluster, "HEALTH", "Health").await;
    master(&service, &admin, MasterKind::Funder, "GRZ", "Government of Zambia").await;
    master(&service, &admin, MasterKind::Funder, "UNICEF", "UNICEF").await;

    add_user(&service, "dm", "Data Manager", Role::DataManager, vec![]).await;
    add_user(&service, "mbanda", "Mary Banda", Role::ActivityManager, vec![wash]).await;
    add_user(&service, "viewer", "Health Viewer", Role::Viewer, vec![health]).await;
    add_user(&service, "um", "User Manager", Role::UserManager, vec![]).await;

    Harness {
        data_manager: service.authenticate("dm").await.unwrap(),
        officer: service.authenticate("mbanda").await.unwrap(),
        viewer: service.authenticate("viewer").await.unwrap(),
        user_manager: service.authenticate("um").await.unwrap(),
        service,
        storage,
        admin,
        wash,
        health,
    }
}

async fn add_user(service: &TrackerService, username: &str, full_name: &str, role: Role, clusters: Vec<i64>) {
    service
        .add_user(&NewUser {
            username: username.into(),
            full_name: full_name.into(),
            role,
            clusters,
        })
        .await
        .unwrap();
}

pub async fn master(service: &TrackerService, admin: &Principal, kind: MasterKind, code: &str, name: &str) -> i64 {
    service
        .create_master(
            admin,
            &NewMasterEntry {
                kind,
                code: code.into(),
                name: name.into(),
                is_default: false,
            },
        )
        .await
        .unwrap()
        .id
}

pub fn input(name: &str, cluster: &str) -> ActivityInput {
    ActivityInput {
        name: name.into(),
        planning_year: 2026,
        cluster: cluster.into(),
        funder: "GRZ".into(),
        status: None,
        currency: None,
        planned_month: "Aug-2026".into(),
        planned_budget: dec!(1000.00),
        disbursed_amount: None,
        responsible_officer: None,
        notes: None,
    }
}

/// Cells of one worksheet as display strings, row by row.
pub fn read_sheet(bytes: &[u8], sheet: &str) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    let range = workbook.worksheet_range(sheet).unwrap();
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

pub fn sheet_names(bytes: &[u8]) -> Vec<String> {
    let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    workbook.sheet_names()
}
