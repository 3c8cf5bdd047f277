pub mod activity;
pub mod attachment;
pub mod audit;
pub mod master_data;
pub mod saved_view;
pub mod upload_batch;
pub mod user;

pub use activity::ActivityRepository;
pub use attachment::AttachmentRepository;
pub use audit::AuditRepository;
pub use master_data::MasterDataRepository;
pub use saved_view::SavedViewRepository;
pub use upload_batch::UploadBatchRepository;
pub use user::UserRepository;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Amounts are stored as integer cents.
pub(crate) fn to_minor(amount: Decimal) -> Result<i64> {
    amount
        .round_dp(2)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.trunc().to_i64())
        .ok_or_else(|| Error::Database(format!("amount {} is out of range", amount)))
}

pub(crate) fn from_minor(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

pub(crate) fn parse_stored<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Database(format!("unexpected {} value '{}'", column, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_units_keep_cents() {
        assert_eq!(to_minor(dec!(1500.50)).unwrap(), 150_050);
        assert_eq!(to_minor(dec!(0.005)).unwrap(), 0);
        assert_eq!(from_minor(150_050), dec!(1500.50));
    }

    #[test]
    fn oversized_amounts_are_errors() {
        assert!(matches!(to_minor(Decimal::MAX), Err(Error::Database(_))));
        assert!(matches!(to_minor(dec!(1000000000000000000000000000)), Err(Error::Database(_))));
        assert!(matches!(to_minor(dec!(100000000000000000)), Err(Error::Database(_))));
    }
}
