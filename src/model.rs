//! Row shapes and request payloads for the catalog resources.

mod item;
mod review;
mod user;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use validator::ValidationErrors;

use crate::query_builder::SortDirection;

pub use item::{Item, ItemChanges, ItemImage, NewItem, NewItemImage};
pub use review::{NewReview, Review, ReviewChanges};
pub use user::{LoginRequest, NewUser, User, UserChanges, UserCredentials};

lazy_static! {
    /// Deliberately loose address shape: one `@`, no whitespace, a dotted domain.
    pub static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles");
}

#[must_use]
pub fn is_valid_email(candidate: &str) -> bool {
    candidate.len() <= 254 && EMAIL_RE.is_match(candidate)
}

/// Flatten derive-validation failures into one client-facing sentence.
///
/// Field messages are sorted so the text is stable across runs.
#[must_use]
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| {
                err.message
                    .as_ref()
                    .map_or_else(|| format!("{field} is invalid"), ToString::to_string)
            })
        })
        .collect();
    messages.sort();
    messages.dedup();
    messages.join("; ")
}

/// Sort and page request shared by every list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub skip: i64,
    pub limit: i64,
    pub sort_by: String,
    pub direction: SortDirection,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 10,
            sort_by: "created_at".to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// One page of a list result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the filter, across all pages.
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("kim@example.com"));
        assert!(!is_valid_email("kim@example"));
        assert!(!is_valid_email("kim example@x.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn validation_messages_are_joined() {
        use validator::Validate;

        let item = NewItem {
            name: String::new(),
            description: None,
            price: -1.0,
            tax: None,
        };
        let errors = item.validate().unwrap_err();
        assert_eq!(
            validation_message(&errors),
            "name must be 1 to 100 characters; price must be non-negative"
        );
    }
}
