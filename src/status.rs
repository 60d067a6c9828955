//! Status code helpers.
//!
//! Status codes are plain [`http::StatusCode`] values. A builder that has not
//! been given one holds `None` and is written as `200 OK`.

use http::StatusCode;

/// Canonical reason phrase for `status`, or `""` for unregistered codes.
///
/// ```rust
/// use tsuki::status::status_text;
/// use http::StatusCode;
///
/// assert_eq!(status_text(StatusCode::NOT_FOUND), "Not Found");
/// ```
pub fn status_text(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

/// `true` for `500 ≤ status < 600`.
///
/// The single rule deciding whether a terminal write notifies the request's
/// error [`Hook`](crate::Hook).
pub fn is_server_error(status: StatusCode) -> bool {
    (500..600).contains(&status.as_u16())
}

/// Converts a raw code into a [`StatusCode`], falling back to `500` for values
/// outside `100..=599`.
pub(crate) fn from_code(code: u16) -> StatusCode {
    match code {
        100..=599 => StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_range() {
        for (code, expected) in [(200, false), (404, false), (499, false), (500, true), (503, true), (599, true)] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(is_server_error(status), expected, "status {code}");
        }
    }

    #[test]
    fn unknown_reason_is_empty() {
        assert_eq!(status_text(StatusCode::from_u16(599).unwrap()), "");
        assert_eq!(status_text(StatusCode::IM_A_TEAPOT), "I'm a teapot");
    }

    #[test]
    fn invalid_code_falls_back_to_500() {
        assert_eq!(from_code(0), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(from_code(404), StatusCode::NOT_FOUND);
        assert_eq!(from_code(599), StatusCode::from_u16(599).unwrap());
        assert_eq!(from_code(600), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(from_code(700), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
