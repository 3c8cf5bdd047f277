pub mod access;
pub mod error;
pub mod identifier;
pub mod models;
pub mod period;
pub mod reporting;
pub mod validation;

pub use error::{Error, Result};

use models::master_data::MasterKind;
use validation::{rules, rules::fields, ValidationEngine};

/// The rule set applied to every uploaded row and every created activity.
/// Rules are registered in template column order, so the first error of a
/// row is the left-most failing column.
pub fn get_upload_validator() -> ValidationEngine {
    ValidationEngine::new()
        .add_rule(rules::RequiredNameRule)
        .add_rule(rules::MasterReferenceRule {
            kind: MasterKind::Cluster,
            field: fields::CLUSTER,
            required: true,
        })
        .add_rule(rules::MasterReferenceRule {
            kind: MasterKind::Funder,
            field: fields::FUNDER,
            required: true,
        })
        .add_rule(rules::PlannedMonthRule)
        .add_rule(rules::BudgetRule)
        .add_rule(rules::DisbursedRule)
        .add_rule(rules::MasterReferenceRule {
            kind: MasterKind::Currency,
            field: fields::CURRENCY,
            required: false,
        })
        .add_rule(rules::MasterReferenceRule {
            kind: MasterKind::Status,
            field: fields::STATUS,
            required: false,
        })
        .add_rule(rules::ResponsibleOfficerRule)
}
