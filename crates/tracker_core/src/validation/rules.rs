use rust_decimal::Decimal;
use time::Date;

use crate::models::master_data::MasterKind;
use crate::models::upload_batch::FieldError;
use crate::period;
use crate::validation::{ActivityDraft, CellValue, ValidationContext, ValidationRule};

/// Field names reported in row errors.
pub mod fields {
    pub const ACTIVITY_ID: &str = "activity_id";
    pub const NAME: &str = "name";
    pub const CLUSTER: &str = "cluster";
    pub const FUNDER: &str = "funder";
    pub const PLANNED_MONTH: &str = "planned_implementation_month";
    pub const PLANNED_BUDGET: &str = "planned_budget";
    pub const DISBURSED_AMOUNT: &str = "disbursed_amount";
    pub const CURRENCY: &str = "currency";
    pub const STATUS: &str = "status";
    pub const RESPONSIBLE_OFFICER: &str = "responsible_officer";
}

pub const REQUIRED: &str = "is required";
pub const NOT_A_NUMBER: &str = "must be a number";
pub const NON_NEGATIVE: &str = "must be non-negative";
pub const EXCEEDS_BUDGET: &str = "must not exceed planned_budget";
pub const TOO_LARGE: &str = "is too large";
pub(crate) const UNKNOWN_PREFIX: &str = "unknown or inactive";

pub(crate) fn unknown_user(raw: &str) -> String {
    format!("{} user '{}'", UNKNOWN_PREFIX, raw)
}

/// Largest amount the store can hold as integer cents.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(u32::MAX, i32::MAX as u32, 0, false, 2);

/// Rounds an amount to cents and checks it is storable.
pub fn check_amount(amount: Decimal) -> Result<Decimal, &'static str> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(NON_NEGATIVE);
    }
    let amount = amount.round_dp(2);
    if amount > MAX_AMOUNT {
        return Err(TOO_LARGE);
    }
    Ok(amount)
}

/// Parses a money cell. Blank is `Ok(None)`; thousands separators are allowed.
/// Amounts keep two fractional digits.
pub fn parse_amount(cell: &CellValue) -> Result<Option<Decimal>, &'static str> {
    let amount = match cell {
        CellValue::Empty => return Ok(None),
        CellValue::Number(n) => Decimal::try_from(*n).map_err(|_| NOT_A_NUMBER)?,
        CellValue::Date(_) => return Err(NOT_A_NUMBER),
        CellValue::Text(raw) => {
            let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned.parse::<Decimal>().map_err(|_| NOT_A_NUMBER)?
        }
    };
    check_amount(amount).map(Some)
}

/// Resolves the planned month to its last day and checks it lies in `year`.
pub fn resolve_month(cell: &CellValue, year: i32) -> Result<Date, FieldError> {
    let err = |reason: String| FieldError::new(fields::PLANNED_MONTH, reason);
    let date = match cell {
        CellValue::Empty => return Err(err(REQUIRED.to_string())),
        CellValue::Date(d) => Some(period::month_end(*d)),
        CellValue::Number(serial) => period::excel_serial_to_date(*serial).map(period::month_end),
        CellValue::Text(raw) if raw.trim().is_empty() => return Err(err(REQUIRED.to_string())),
        CellValue::Text(raw) => period::parse_planned_month(raw),
    };
    let date = date.ok_or_else(|| err("is not a recognisable month".to_string()))?;
    if date.year() != year {
        return Err(err(format!("must fall within planning year {}", year)));
    }
    Ok(date)
}

/// Resolves a master reference to its id. Blank cells fall back to the
/// kind's default entry, if it has one.
pub fn resolve_master(
    cell: &CellValue,
    kind: MasterKind,
    field: &str,
    ctx: &ValidationContext,
) -> Result<i64, FieldError> {
    match cell.as_text() {
        Some(raw) => ctx
            .masters
            .resolve(kind, &raw)
            .map(|e| e.id)
            .ok_or_else(|| FieldError::new(field, format!("{} {} '{}'", UNKNOWN_PREFIX, kind, raw))),
        None => ctx
            .masters
            .default_for(kind)
            .map(|e| e.id)
            .ok_or_else(|| FieldError::new(field, REQUIRED)),
    }
}

// =========================================================================
// RULE: ACT-NAME
// Every activity needs a name.
// =========================================================================
pub struct RequiredNameRule;

impl ValidationRule for RequiredNameRule {
    fn rule_id(&self) -> &str { "ACT-NAME" }

    fn check(&self, draft: &ActivityDraft, _ctx: &ValidationContext) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if draft.name.is_blank() {
            errors.push(FieldError::new(fields::NAME, REQUIRED));
        }
        errors
    }
}

// =========================================================================
// RULE: ACT-MASTER
// Cluster, funder, status and currency must resolve to active master data.
// Required references may not be blank; optional ones fall back to the
// kind's default.
// =========================================================================
pub struct MasterReferenceRule {
    pub kind: MasterKind,
    pub field: &'static str,
    pub required: bool,
}

impl MasterReferenceRule {
    fn cell<'a>(&self, draft: &'a ActivityDraft) -> &'a CellValue {
        match self.kind {
            MasterKind::Cluster => &draft.cluster,
            MasterKind::Funder => &draft.funder,
            MasterKind::Status => &draft.status,
            MasterKind::Currency => &draft.currency,
        }
    }
}

impl ValidationRule for MasterReferenceRule {
    fn rule_id(&self) -> &str { "ACT-MASTER" }

    fn check(&self, draft: &ActivityDraft, ctx: &ValidationContext) -> Vec<FieldError> {
        let cell = self.cell(draft);
        if self.required && cell.is_blank() {
            return vec![FieldError::new(self.field, REQUIRED)];
        }
        match resolve_master(cell, self.kind, self.field, ctx) {
            Ok(_) => Vec::new(),
            Err(e) => vec![e],
        }
    }
}

// =========================================================================
// RULE: ACT-MONTH
// Planned implementation month is required and must fall in the target year.
// =========================================================================
pub struct PlannedMonthRule;

impl ValidationRule for PlannedMonthRule {
    fn rule_id(&self) -> &str { "ACT-MONTH" }

    fn check(&self, draft: &ActivityDraft, ctx: &ValidationContext) -> Vec<FieldError> {
        match resolve_month(&draft.planned_month, ctx.planning_year) {
            Ok(_) => Vec::new(),
            Err(e) => vec![e],
        }
    }
}

// =========================================================================
// RULE: ACT-BUDGET
// Planned budget is a required, non-negative number.
// =========================================================================
pub struct BudgetRule;

impl ValidationRule for BudgetRule {
    fn rule_id(&self) -> &str { "ACT-BUDGET" }

    fn check(&self, draft: &ActivityDraft, _ctx: &ValidationContext) -> Vec<FieldError> {
        match parse_amount(&draft.planned_budget) {
            Ok(Some(_)) => Vec::new(),
            Ok(None) => vec![FieldError::new(fields::PLANNED_BUDGET, REQUIRED)],
            Err(reason) => vec![FieldError::new(fields::PLANNED_BUDGET, reason)],
        }
    }
}

// =========================================================================
// RULE: ACT-DISBURSED
// Disbursed amount is optional, non-negative and never above the budget.
// =========================================================================
pub struct DisbursedRule;

impl ValidationRule for DisbursedRule {
    fn rule_id(&self) -> &str { "ACT-DISBURSED" }

    fn check(&self, draft: &ActivityDraft, _ctx: &ValidationContext) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match parse_amount(&draft.disbursed_amount) {
            Err(reason) => errors.push(FieldError::new(fields::DISBURSED_AMOUNT, reason)),
            Ok(Some(disbursed)) => {
                if let Ok(Some(budget)) = parse_amount(&draft.planned_budget) {
                    if disbursed > budget {
                        errors.push(FieldError::new(fields::DISBURSED_AMOUNT, EXCEEDS_BUDGET));
                    }
                }
            }
            Ok(None) => {}
        }
        errors
    }
}

// =========================================================================
// RULE: ACT-OFFICER
// A named responsible officer must be an existing active user.
// =========================================================================
pub struct ResponsibleOfficerRule;

impl ValidationRule for ResponsibleOfficerRule {
    fn rule_id(&self) -> &str { "ACT-OFFICER" }

    fn check(&self, draft: &ActivityDraft, ctx: &ValidationContext) -> Vec<FieldError> {
        match draft.responsible_officer.as_text() {
            Some(raw) if ctx.resolve_officer(&raw).is_none() => {
                vec![FieldError::new(fields::RESPONSIBLE_OFFICER, unknown_user(&raw))]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::get_upload_validator;
    use crate::models::master_data::{MasterEntry, MasterIndex};
    use crate::models::user::User;
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal_macros::dec;
    use time::macros::date;
    use time::OffsetDateTime;

    fn master(id: i64, kind: MasterKind, code: &str, name: &str, active: bool, is_default: bool) -> MasterEntry {
        MasterEntry {
            id,
            kind,
            code: code.into(),
            name: name.into(),
            active,
            is_default,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn ctx() -> ValidationContext {
        let masters = MasterIndex::from_entries(vec![
            master(1, MasterKind::Cluster, "WASH", "Water and Sanitation", true, false),
            master(2, MasterKind::Cluster, "OLD", "Retired", false, false),
            master(3, MasterKind::Funder, "GRZ", "Government of Zambia", true, false),
            master(4, MasterKind::Status, "Planned", "Planned", true, true),
            master(5, MasterKind::Currency, "ZMW", "Zambian Kwacha", true, true),
        ]);
        let users = vec![User {
            username: "mphiri".into(),
            full_name: "Mary Phiri".into(),
            role: Role::ActivityManager,
            active: true,
            clusters: vec![1],
            created_at: OffsetDateTime::UNIX_EPOCH,
        }];
        ValidationContext::new(2026, masters, &users)
    }

    fn draft() -> ActivityDraft {
        ActivityDraft {
            name: CellValue::text("Borehole drilling"),
            cluster: CellValue::text("wash"),
            funder: CellValue::text("Government of Zambia"),
            planned_month: CellValue::text("Aug-26"),
            planned_budget: CellValue::text("1,500.50"),
            ..Default::default()
        }
    }

    #[test]
    fn clean_draft_resolves_defaults() {
        let activity = get_upload_validator().validate(&draft(), &ctx()).unwrap();
        assert_eq!(activity.cluster_id, 1);
        assert_eq!(activity.funder_id, 3);
        assert_eq!(activity.status_id, 4);
        assert_eq!(activity.currency_id, 5);
        assert_eq!(activity.planned_month, date!(2026 - 08 - 31));
        assert_eq!(activity.planned_budget, dec!(1500.50));
        assert_eq!(activity.disbursed_amount, None);
    }

    #[test]
    fn negative_budget_is_rejected() {
        let mut d = draft();
        d.planned_budget = CellValue::Number(-10.0);
        let errors = get_upload_validator().run(&d, &ctx());
        assert_eq!(errors, vec![FieldError::new(fields::PLANNED_BUDGET, NON_NEGATIVE)]);
    }

    #[test]
    fn non_numeric_budget_is_rejected() {
        let mut d = draft();
        d.planned_budget = CellValue::text("about 5k");
        let errors = get_upload_validator().run(&d, &ctx());
        assert_eq!(errors, vec![FieldError::new(fields::PLANNED_BUDGET, NOT_A_NUMBER)]);
    }

    #[test]
    fn inactive_cluster_is_a_reference_error() {
        let mut d = draft();
        d.cluster = CellValue::text("OLD");
        let errors = get_upload_validator().run(&d, &ctx());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, fields::CLUSTER);
        assert!(errors[0].reason.starts_with(UNKNOWN_PREFIX));
    }

    #[test]
    fn month_outside_planning_year_is_rejected() {
        let mut d = draft();
        d.planned_month = CellValue::Date(date!(2027 - 01 - 15));
        let errors = get_upload_validator().run(&d, &ctx());
        assert_eq!(errors[0].field, fields::PLANNED_MONTH);
        assert_eq!(errors[0].reason, "must fall within planning year 2026");
    }

    #[test]
    fn all_failures_are_reported_in_column_order() {
        let d = ActivityDraft {
            planned_budget: CellValue::text("-5"),
            disbursed_amount: CellValue::text("x"),
            responsible_officer: CellValue::text("nobody"),
            ..Default::default()
        };
        let fields_hit: Vec<String> = get_upload_validator()
            .run(&d, &ctx())
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields_hit,
            vec![
                fields::NAME,
                fields::CLUSTER,
                fields::FUNDER,
                fields::PLANNED_MONTH,
                fields::PLANNED_BUDGET,
                fields::DISBURSED_AMOUNT,
                fields::RESPONSIBLE_OFFICER,
            ]
        );
    }

    #[test]
    fn huge_month_serial_is_not_a_month() {
        let mut d = draft();
        d.planned_month = CellValue::Number(1e15);
        let errors = get_upload_validator().run(&d, &ctx());
        assert_eq!(
            errors,
            vec![FieldError::new(fields::PLANNED_MONTH, "is not a recognisable month")]
        );
    }

    #[test]
    fn disbursed_cannot_exceed_budget() {
        let mut d = draft();
        d.disbursed_amount = CellValue::Number(2000.0);
        let errors = get_upload_validator().run(&d, &ctx());
        assert_eq!(errors, vec![FieldError::new(fields::DISBURSED_AMOUNT, EXCEEDS_BUDGET)]);
    }

    #[test]
    fn officer_matches_username_or_full_name() {
        let mut d = draft();
        d.responsible_officer = CellValue::text("mary  phiri");
        let activity = get_upload_validator().validate(&d, &ctx()).unwrap();
        assert_eq!(activity.responsible_officer.as_deref(), Some("mphiri"));
    }

    #[test]
    fn amounts_accept_spreadsheet_numbers() {
        assert_eq!(parse_amount(&CellValue::Number(1234.5)), Ok(Some(dec!(1234.50))));
        assert_eq!(parse_amount(&CellValue::text("  ")), Ok(None));
        assert_eq!(parse_amount(&CellValue::text("1 000")), Ok(Some(dec!(1000))));
    }

    #[test]
    fn amounts_beyond_storable_cents_are_too_large() {
        assert_eq!((MAX_AMOUNT * dec!(100)).to_i64(), Some(i64::MAX));
        assert_eq!(check_amount(MAX_AMOUNT), Ok(MAX_AMOUNT));
        assert_eq!(parse_amount(&CellValue::text("1000000000000000000000000000")), Err(TOO_LARGE));
        assert_eq!(parse_amount(&CellValue::Number(1e20)), Err(TOO_LARGE));
        assert_eq!(parse_amount(&CellValue::Number(1e30)), Err(NOT_A_NUMBER));

        let mut d = draft();
        d.planned_budget = CellValue::text("1000000000000000000000000000");
        let errors = get_upload_validator().run(&d, &ctx());
        assert_eq!(errors, vec![FieldError::new(fields::PLANNED_BUDGET, TOO_LARGE)]);
    }
}
