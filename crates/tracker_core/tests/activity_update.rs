use rust_decimal_macros::dec;
use time::macros::date;
use time::OffsetDateTime;
use tracker_core::models::{Activity, ActivityUpdate, MasterEntry, MasterIndex, MasterKind};
use tracker_core::validation::{apply_update, fields, into_error, ValidationContext};
use tracker_core::Error;

fn master(id: i64, kind: MasterKind, code: &str, active: bool) -> MasterEntry {
    MasterEntry {
        id,
        kind,
        code: code.into(),
        name: code.into(),
        active,
        is_default: false,
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

fn stored() -> Activity {
    Activity {
        id: "Y26-000004".into(),
        name: "Solar kits for clinics".into(),
        planning_year: 2026,
        cluster_id: 2,
        funder_id: 3,
        status_id: 4,
        currency_id: 5,
        responsible_officer: None,
        planned_month: date!(2026 - 03 - 31),
        quarter: 1,
        actual_start_date: None,
        actual_completion_date: None,
        fully_implemented_by: None,
        planned_budget: dec!(1000),
        disbursed_amount: None,
        notes: None,
        retired: false,
        created_by: "admin".into(),
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

fn context() -> ValidationContext {
    // Cluster 2 (ENERGY) has been deactivated since the activity was created.
    let masters = MasterIndex::from_entries(vec![
        master(1, MasterKind::Cluster, "WASH", true),
        master(2, MasterKind::Cluster, "ENERGY", false),
        master(3, MasterKind::Funder, "GRZ", true),
    ]);
    ValidationContext::new(2026, masters, &[])
}

#[test]
fn untouched_inactive_reference_is_kept() {
    let update = ActivityUpdate { name: Some("Solar kits".into()), ..Default::default() };
    let updated = apply_update(&stored(), &update, &context()).unwrap();
    assert_eq!(updated.cluster_id, 2);
    assert_eq!(updated.name, "Solar kits");
}

#[test]
fn choosing_an_inactive_reference_is_referential_error() {
    let update = ActivityUpdate { cluster: Some("ENERGY".into()), ..Default::default() };
    let errors = apply_update(&stored(), &update, &context()).unwrap_err();
    assert_eq!(errors[0].field, fields::CLUSTER);
    assert!(matches!(into_error(&errors), Error::ReferentialIntegrity(_)));
}

#[test]
fn moving_the_month_recomputes_the_quarter() {
    let update = ActivityUpdate { planned_month: Some("Nov-26".into()), ..Default::default() };
    let updated = apply_update(&stored(), &update, &context()).unwrap();
    assert_eq!(updated.planned_month, date!(2026 - 11 - 30));
    assert_eq!(updated.quarter, 4);
}

#[test]
fn month_cannot_leave_the_planning_year() {
    let update = ActivityUpdate { planned_month: Some("2027-01".into()), ..Default::default() };
    let errors = apply_update(&stored(), &update, &context()).unwrap_err();
    assert_eq!(errors[0].field, fields::PLANNED_MONTH);
    assert!(matches!(into_error(&errors), Error::Validation(_)));
}

#[test]
fn disbursement_is_checked_against_the_new_budget() {
    let update = ActivityUpdate {
        planned_budget: Some(dec!(400)),
        disbursed_amount: Some(dec!(500)),
        ..Default::default()
    };
    let errors = apply_update(&stored(), &update, &context()).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, fields::DISBURSED_AMOUNT);
}

#[test]
fn oversized_budget_is_a_field_error() {
    let update = ActivityUpdate {
        planned_budget: Some(dec!(1000000000000000000000000000)),
        ..Default::default()
    };
    let errors = apply_update(&stored(), &update, &context()).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, fields::PLANNED_BUDGET);
    assert_eq!(errors[0].reason, "is too large");
    assert!(matches!(into_error(&errors), Error::Validation(_)));
}
