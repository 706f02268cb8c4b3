use crate::error::DestinationError;
use chrono::NaiveTime;
use model::core::date::PartitionDate;
use tokio_postgres::types::{ToSql, Type};

/// The partition date converted to whatever Rust type the prepared
/// `WHERE column = $1` parameter expects.
///
/// Binary parameters are type-checked client side, so a date column needs a
/// `NaiveDate` and a text column needs a `String`.
pub struct PartitionParam(Box<dyn ToSql + Sync + Send>);

impl PartitionParam {
    /// Cast to put on `$1` so the server, not the client, turns the date into
    /// the column type.
    ///
    /// A `timestamptz` column compared with a `date` matches midnight in the
    /// session `TimeZone`, the same instant a `'YYYY-MM-DD'` literal resolves to.
    pub fn session_cast(ty: &Type) -> Option<&'static str> {
        match *ty {
            Type::TIMESTAMPTZ => Some("date"),
            _ => None,
        }
    }

    pub fn for_type(
        ty: &Type,
        column: &str,
        date: PartitionDate,
    ) -> Result<Self, DestinationError> {
        let day = date.as_naive();
        let midnight = day.and_time(NaiveTime::MIN);

        let param: Box<dyn ToSql + Sync + Send> = match *ty {
            Type::DATE => Box::new(day),
            Type::TIMESTAMP => Box::new(midnight),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                Box::new(date.to_string())
            }
            _ => {
                return Err(DestinationError::UnsupportedPartitionType {
                    column: column.to_string(),
                    type_name: ty.name().to_string(),
                });
            }
        };
        Ok(PartitionParam(param))
    }
}

impl AsRef<dyn ToSql + Sync> for PartitionParam {
    fn as_ref(&self) -> &(dyn ToSql + Sync + 'static) {
        &*self.0
    }
}
