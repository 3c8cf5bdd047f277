use std::collections::HashMap;

use rust_decimal::Decimal;
use time::Date;

use crate::error::Error;
use crate::models::activity::{Activity, ActivityUpdate, NewActivity};
use crate::models::master_data::{normalize_key, MasterIndex, MasterKind};
use crate::models::upload_batch::FieldError;
use crate::models::user::User;
use crate::period;

pub mod rules;

pub use rules::fields;

/// A raw cell as read from a spreadsheet or a request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(Date),
}

impl CellValue {
    pub fn text(raw: impl Into<String>) -> Self {
        CellValue::Text(raw.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed text form; `None` when blank. Whole numbers lose their `.0`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Date(d) => Some(d.to_string()),
        }
    }
}

/// One activity as entered by a person, before any checking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityDraft {
    pub name: CellValue,
    pub cluster: CellValue,
    pub funder: CellValue,
    pub planned_month: CellValue,
    pub planned_budget: CellValue,
    pub disbursed_amount: CellValue,
    pub currency: CellValue,
    pub status: CellValue,
    pub responsible_officer: CellValue,
    pub notes: CellValue,
}

impl ActivityDraft {
    pub fn is_blank(&self) -> bool {
        [
            &self.name,
            &self.cluster,
            &self.funder,
            &self.planned_month,
            &self.planned_budget,
            &self.disbursed_amount,
            &self.currency,
            &self.status,
            &self.responsible_officer,
            &self.notes,
        ]
        .iter()
        .all(|c| c.is_blank())
    }
}

/// Everything a rule may consult. Built once per request so every row sees
/// the same master data.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    pub planning_year: i32,
    pub masters: MasterIndex,
    /// Normalised username or full name -> username, active users only.
    officers: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new(planning_year: i32, masters: MasterIndex, users: &[User]) -> Self {
        let mut officers = HashMap::new();
        for user in users.iter().filter(|u| u.active) {
            officers.insert(normalize_key(&user.full_name), user.username.clone());
            officers.insert(normalize_key(&user.username), user.username.clone());
        }
        Self { planning_year, masters, officers }
    }

    pub fn resolve_officer(&self, raw: &str) -> Option<&str> {
        self.officers.get(&normalize_key(raw)).map(String::as_str)
    }
}

// The contract every rule must fulfill
pub trait ValidationRule: Send + Sync {
    fn check(&self, draft: &ActivityDraft, ctx: &ValidationContext) -> Vec<FieldError>;
    fn rule_id(&self) -> &str;
}

// The Engine that holds the registry of all rules
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule<R: ValidationRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Runs every rule; errors come back in rule registration order.
    pub fn run(&self, draft: &ActivityDraft, ctx: &ValidationContext) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            let mut rule_errors = rule.check(draft, ctx);
            errors.append(&mut rule_errors);
        }
        errors
    }

    /// Checks the draft and, when clean, resolves it into an insertable record.
    pub fn validate(
        &self,
        draft: &ActivityDraft,
        ctx: &ValidationContext,
    ) -> Result<NewActivity, Vec<FieldError>> {
        let errors = self.run(draft, ctx);
        if !errors.is_empty() {
            return Err(errors);
        }
        build(draft, ctx).map_err(|e| vec![e])
    }
}

fn build(draft: &ActivityDraft, ctx: &ValidationContext) -> Result<NewActivity, FieldError> {
    let name = draft
        .name
        .as_text()
        .ok_or_else(|| FieldError::new(fields::NAME, rules::REQUIRED))?;
    let cluster = rules::resolve_master(&draft.cluster, MasterKind::Cluster, fields::CLUSTER, ctx)?;
    let funder = rules::resolve_master(&draft.funder, MasterKind::Funder, fields::FUNDER, ctx)?;
    let status = rules::resolve_master(&draft.status, MasterKind::Status, fields::STATUS, ctx)?;
    let currency = rules::resolve_master(&draft.currency, MasterKind::Currency, fields::CURRENCY, ctx)?;
    let planned_month = rules::resolve_month(&draft.planned_month, ctx.planning_year)?;
    let planned_budget = rules::parse_amount(&draft.planned_budget)
        .map_err(|reason| FieldError::new(fields::PLANNED_BUDGET, reason))?
        .ok_or_else(|| FieldError::new(fields::PLANNED_BUDGET, rules::REQUIRED))?;
    let disbursed_amount = rules::parse_amount(&draft.disbursed_amount)
        .map_err(|reason| FieldError::new(fields::DISBURSED_AMOUNT, reason))?;
    let responsible_officer = match draft.responsible_officer.as_text() {
        Some(raw) => Some(
            ctx.resolve_officer(&raw)
                .map(str::to_string)
                .ok_or_else(|| FieldError::new(fields::RESPONSIBLE_OFFICER, rules::unknown_user(&raw)))?,
        ),
        None => None,
    };

    Ok(NewActivity {
        name,
        planning_year: ctx.planning_year,
        cluster_id: cluster,
        funder_id: funder,
        status_id: status,
        currency_id: currency,
        responsible_officer,
        planned_month,
        planned_budget,
        disbursed_amount,
        notes: draft.notes.as_text(),
    })
}

/// Applies a partial update to a stored activity.
///
/// Newly chosen references must be active; references left untouched are
/// kept even if their master entry has since been deactivated.
pub fn apply_update(
    existing: &Activity,
    update: &ActivityUpdate,
    ctx: &ValidationContext,
) -> Result<Activity, Vec<FieldError>> {
    let mut next = existing.clone();
    let mut errors = Vec::new();

    if let Some(name) = &update.name {
        match name.trim() {
            "" => errors.push(FieldError::new(fields::NAME, rules::REQUIRED)),
            trimmed => next.name = trimmed.to_string(),
        }
    }

    let references = [
        (&update.cluster, MasterKind::Cluster, fields::CLUSTER),
        (&update.funder, MasterKind::Funder, fields::FUNDER),
        (&update.currency, MasterKind::Currency, fields::CURRENCY),
    ];
    for (raw, kind, field) in references {
        let Some(raw) = raw else { continue };
        match rules::resolve_master(&CellValue::text(raw.as_str()), kind, field, ctx) {
            Ok(id) => match kind {
                MasterKind::Cluster => next.cluster_id = id,
                MasterKind::Funder => next.funder_id = id,
                _ => next.currency_id = id,
            },
            Err(e) => errors.push(e),
        }
    }

    if let Some(raw) = &update.planned_month {
        match rules::resolve_month(&CellValue::text(raw.as_str()), existing.planning_year) {
            Ok(month) => {
                next.planned_month = month;
                next.quarter = period::quarter_of(month);
            }
            Err(e) => errors.push(e),
        }
    }

    if let Some(budget) = update.planned_budget {
        match rules::check_amount(budget) {
            Ok(budget) => next.planned_budget = budget,
            Err(reason) => errors.push(FieldError::new(fields::PLANNED_BUDGET, reason)),
        }
    }
    if let Some(disbursed) = update.disbursed_amount {
        match rules::check_amount(disbursed) {
            Ok(disbursed) => next.disbursed_amount = Some(disbursed),
            Err(reason) => errors.push(FieldError::new(fields::DISBURSED_AMOUNT, reason)),
        }
    }
    if next.disbursed_amount.unwrap_or(Decimal::ZERO) > next.planned_budget {
        errors.push(FieldError::new(fields::DISBURSED_AMOUNT, rules::EXCEEDS_BUDGET));
    }

    if let Some(raw) = &update.responsible_officer {
        if raw.trim().is_empty() {
            next.responsible_officer = None;
        } else {
            match ctx.resolve_officer(raw) {
                Some(username) => next.responsible_officer = Some(username.to_string()),
                None => errors.push(FieldError::new(fields::RESPONSIBLE_OFFICER, rules::unknown_user(raw))),
            }
        }
    }

    if let Some(notes) = &update.notes {
        next.notes = Some(notes.trim().to_string()).filter(|n| !n.is_empty());
    }
    if let Some(by) = &update.fully_implemented_by {
        next.fully_implemented_by = Some(by.trim().to_string()).filter(|n| !n.is_empty());
    }
    if update.actual_start_date.is_some() {
        next.actual_start_date = update.actual_start_date;
    }
    if update.actual_completion_date.is_some() {
        next.actual_completion_date = update.actual_completion_date;
    }
    if let (Some(start), Some(end)) = (next.actual_start_date, next.actual_completion_date) {
        if end < start {
            errors.push(FieldError::new(
                "actual_completion_date",
                "must not precede actual_start_date",
            ));
        }
    }

    if errors.is_empty() {
        Ok(next)
    } else {
        Err(errors)
    }
}

/// Collapses field errors into one domain error for single-record requests.
/// A failed master or user lookup is a referential error; anything else is a
/// plain validation error.
pub fn into_error(errors: &[FieldError]) -> Error {
    let message = errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.reason))
        .collect::<Vec<_>>()
        .join("; ");
    let referential = errors
        .first()
        .is_some_and(|e| e.reason.starts_with(rules::UNKNOWN_PREFIX));
    if referential {
        Error::ReferentialIntegrity(message)
    } else {
        Error::Validation(message)
    }
}
