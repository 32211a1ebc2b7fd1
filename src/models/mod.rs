use async_graphql::{InputValueError, InputValueResult, Scalar, ScalarType, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub mod booking;
pub mod fitness_class;
pub mod member;

#[derive(sqlx::Type, Clone, Copy, Debug, PartialEq)]
#[sqlx(transparent)]
pub struct GqlDateTime(pub OffsetDateTime);

#[Scalar]
impl ScalarType for GqlDateTime {
    fn parse(value: Value) -> InputValueResult<Self> {
        if let Value::String(date_str) = &value {
            if let Ok(date) = OffsetDateTime::parse(date_str, &Rfc3339) {
                return Ok(GqlDateTime(date));
            }
        }

        Err(InputValueError::expected_type(value))
    }

    fn to_value(&self) -> Value {
        self.0
            .format(&Rfc3339)
            .map(Value::String)
            .unwrap_or(Value::Null)
    }
}

impl From<OffsetDateTime> for GqlDateTime {
    fn from(time: OffsetDateTime) -> Self {
        GqlDateTime(time)
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::ScalarType;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn datetimes_round_trip_through_rfc3339() {
        let time = GqlDateTime(datetime!(2025-06-01 18:30:00 UTC));
        let value = time.to_value();
        let parsed = GqlDateTime::parse(value).unwrap();

        assert_eq!(parsed.0, time.0);
    }

    #[test]
    fn non_rfc3339_strings_are_rejected() {
        let value = Value::String("June 1st at 6:30pm".to_owned());
        assert!(GqlDateTime::parse(value).is_err());
    }
}
