#![allow(dead_code)]

use rust_decimal_macros::dec;
use sqlx::SqlitePool;
use tracker_core::models::{MasterKind, NewActivity, NewMasterEntry};
use tracker_db::{connect, connect_in_memory, rebuild_database, MasterDataRepository};

pub async fn memory_pool() -> SqlitePool {
    let pool = connect_in_memory().await.unwrap();
    rebuild_database(&pool).await.unwrap();
    pool
}

/// A file-backed pool, for tests that need several connections at once.
pub async fn file_pool(dir: &tempfile::TempDir) -> SqlitePool {
    let url = format!("sqlite://{}", dir.path().join("tracker.db").display());
    let pool = connect(&url, 8).await.unwrap();
    rebuild_database(&pool).await.unwrap();
    pool
}

pub struct Fixture {
    pub cluster: i64,
    pub funder: i64,
    pub status: i64,
    pub currency: i64,
}

pub async fn seed(pool: &SqlitePool) -> Fixture {
    let masters = MasterDataRepository::new(pool.clone());
    let cluster = masters
        .create(
            &NewMasterEntry {
                kind: MasterKind::Cluster,
                code: "WASH".into(),
                name: "Water and Sanitation".into(),
                is_default: false,
            },
            "admin",
        )
        .await
        .unwrap();
    let funder = masters
        .create(
            &NewMasterEntry {
                kind: MasterKind::Funder,
                code: "GRZ".into(),
                name: "Government of Zambia".into(),
                is_default: false,
            },
            "admin",
        )
        .await
        .unwrap();
    let status = masters.find_by_code(MasterKind::Status, "Planned").await.unwrap().unwrap();
    let currency = masters.find_by_code(MasterKind::Currency, "ZMW").await.unwrap().unwrap();
    Fixture {
        cluster: cluster.id,
        funder: funder.id,
        status: status.id,
        currency: currency.id,
    }
}

pub fn new_activity(fx: &Fixture, year: i32, name: &str) -> NewActivity {
    NewActivity {
        name: name.into(),
        planning_year: year,
        cluster_id: fx.cluster,
        funder_id: fx.funder,
        status_id: fx.status,
        currency_id: fx.currency,
        responsible_officer: None,
        planned_month: time::Date::from_calendar_date(year, time::Month::June, 30).unwrap(),
        planned_budget: dec!(2500.75),
        disbursed_amount: None,
        notes: None,
    }
}
