//! Text form fields and a collector for field-level validation errors.

use std::str::FromStr;

use crate::errors::{FieldError, ServiceError};

/// Ordered text fields as they arrived (multipart or urlencoded).
/// Repeated keys are kept, which is how multi-valued fields like `roles`
/// arrive.
#[derive(Debug, Clone, Default)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// First non-blank value, trimmed. Names match case-insensitively.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .find(|v| !v.is_empty())
    }

    /// Every non-blank value; comma-separated values are split.
    pub fn all(&self, name: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .flat_map(|(_, v)| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Whether the field was sent at all, even blank.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Accumulates every field problem so callers see them all at once.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn push(&mut self, err: FieldError) { self.0.push(err); }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn required(&mut self, form: &FormFields, name: &str) -> Option<String> {
        let v = form.text(name).map(str::to_string);
        if v.is_none() {
            self.add(name, "is required");
        }
        v
    }

    /// Parse when present; a bad value is recorded, never a panic.
    pub fn parse<T: FromStr>(&mut self, form: &FormFields, name: &str, what: &str) -> Option<T> {
        let raw = form.text(name)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.add(name, format!("must be {}", what));
                None
            }
        }
    }

    pub fn parse_required<T: FromStr>(&mut self, form: &FormFields, name: &str, what: &str) -> Option<T> {
        if form.text(name).is_none() {
            self.add(name, "is required");
            return None;
        }
        self.parse(form, name, what)
    }

    pub fn bool(&mut self, form: &FormFields, name: &str) -> Option<bool> {
        let raw = form.text(name)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Some(true),
            "false" | "0" | "off" | "no" => Some(false),
            _ => {
                self.add(name, "must be true or false");
                None
            }
        }
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn into_vec(self) -> Vec<FieldError> { self.0 }

    /// `Ok(value)` when nothing was recorded.
    pub fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ServiceError> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(ServiceError::Validation(self.0))
        }
    }
}
