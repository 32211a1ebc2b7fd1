use async_graphql::{Error, ErrorExtensions};
use axum::http::header::ToStrError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error as ThisError;

/// Everything that can go wrong while managing classes and bookings.
///
/// Each variant carries a stable code exposed through GraphQL error
/// extensions so clients can branch without parsing messages.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("this class has already started")]
    PastClass,
    #[error("this class is already full")]
    ClassFull,
    #[error("you have already booked this class")]
    DuplicateBooking,
    #[error("bookings can only be cancelled up to 24 hours before the class starts")]
    CancellationWindowClosed,
    #[error("the class time cannot be changed while bookings exist")]
    ScheduleLocked,
    #[error("{0}")]
    InvalidSchedule(&'static str),
    #[error("{0}")]
    NotFound(String),
}

impl BookingError {
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::PastClass => "PAST_CLASS",
            BookingError::ClassFull => "CLASS_FULL",
            BookingError::DuplicateBooking => "DUPLICATE_BOOKING",
            BookingError::CancellationWindowClosed => "CANCELLATION_WINDOW_CLOSED",
            BookingError::ScheduleLocked => "SCHEDULE_LOCKED",
            BookingError::InvalidSchedule(_) => "INVALID_SCHEDULE",
            BookingError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl ErrorExtensions for BookingError {
    fn extend(&self) -> Error {
        Error::new(self.to_string()).extend_with(|_err, extensions| {
            extensions.set("code", self.code());
        })
    }
}

/// Failures at the HTTP boundary, before a GraphQL request is executed.
#[derive(ThisError, Debug)]
pub enum ApiError {
    #[error("Invalid token header: {0}")]
    InvalidTokenHeader(ToStrError),
    #[error("{0}")]
    Unauthorized(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidTokenHeader(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        };

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_error_codes_are_stable() {
        assert_eq!(BookingError::PastClass.code(), "PAST_CLASS");
        assert_eq!(BookingError::ClassFull.code(), "CLASS_FULL");
        assert_eq!(BookingError::DuplicateBooking.code(), "DUPLICATE_BOOKING");
        assert_eq!(
            BookingError::CancellationWindowClosed.code(),
            "CANCELLATION_WINDOW_CLOSED"
        );
        assert_eq!(BookingError::ScheduleLocked.code(), "SCHEDULE_LOCKED");
        assert_eq!(
            BookingError::InvalidSchedule("class must end after it starts").code(),
            "INVALID_SCHEDULE"
        );
        assert_eq!(
            BookingError::NotFound("No class with id 4".to_owned()).code(),
            "NOT_FOUND"
        );
    }
}
