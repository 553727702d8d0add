use axum::{
    Json,
    extract::{FromRequest, Request},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, FieldError};

/// Validate
///
/// Implemented by every request payload. Returns all field errors at once
/// rather than stopping at the first.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// Checks
///
/// Collector for field errors. Each check records a failure and returns
/// whether the value passed.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Character length within `min..=max`.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: Option<usize>) -> bool {
        let len = value.chars().count();
        if len < min {
            let message = if min == 1 {
                "is required".to_string()
            } else {
                format!("must contain at least {min} characters")
            };
            self.fail(field, message);
            return false;
        }
        if let Some(max) = max {
            if len > max {
                self.fail(field, format!("must contain at most {max} characters"));
                return false;
            }
        }
        true
    }

    pub fn required(&mut self, field: &str, value: &str) -> bool {
        self.length(field, value.trim(), 1, None)
    }

    pub fn present<T>(&mut self, field: &str, value: &Option<T>) -> bool {
        if value.is_none() {
            self.fail(field, "is required");
            return false;
        }
        true
    }

    pub fn email(&mut self, field: &str, value: &str) -> bool {
        if !is_email(value) {
            self.fail(field, "must be a valid email address");
            return false;
        }
        true
    }

    pub fn url(&mut self, field: &str, value: &str) -> bool {
        match reqwest::Url::parse(value) {
            Ok(url) if url.has_host() => true,
            _ => {
                self.fail(field, "must be a valid URL");
                false
            }
        }
    }

    pub fn date(&mut self, field: &str, value: &str) -> bool {
        if parse_datetime(value).is_none() {
            self.fail(field, "Invalid date");
            return false;
        }
        true
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> bool {
        if !allowed.contains(&value) {
            self.fail(field, format!("must be one of: {}", allowed.join(", ")));
            return false;
        }
        true
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Loose `local@domain.tld` shape check: no whitespace, one `@`, a dot in the domain.
pub fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (read as midnight UTC).
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    parse_date(value).map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d);
    }
    DateTime::parse_from_rfc3339(value).ok().map(|ts| ts.date_naive())
}

/// ValidJson
///
/// JSON body extractor that runs `Validate` after deserializing. Malformed
/// bodies and failed checks are rejected with the 400 error envelope.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate().map_err(ApiError::Validation)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_email("a@b.co"));
        assert!(!is_email("a@b"));
        assert!(!is_email("a b@c.de"));
        assert!(!is_email("@c.de"));
        assert!(!is_email("a@@c.de"));
    }

    #[test]
    fn dates_accept_plain_and_rfc3339() {
        assert!(parse_datetime("2024-05-01").is_some());
        assert!(parse_datetime("2024-05-01T10:00:00Z").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn checks_collect_every_failure() {
        let mut c = Checks::new();
        c.required("title", "  ");
        c.length("phone", "123", 10, Some(15));
        c.one_of("gender", "x", &["male", "female", "other"]);
        let errors = c.finish().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["title", "phone", "gender"]);
    }
}
