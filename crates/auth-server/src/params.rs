//! Strict reading of `application/x-www-form-urlencoded` parameters
//!
//! RFC 6749 Section 3.1: parameters sent without a value are treated as
//! omitted, and request parameters must not be included more than once.

use std::collections::HashMap;

use crate::error::{GrantError, Result};

#[derive(Debug, Default)]
pub struct Params {
    values: HashMap<String, Vec<String>>,
}

impl Params {
    /// Parse a query string or form body
    pub fn parse(raw: &str) -> Self {
        Self::parse_all([raw])
    }

    /// Parse several sources into one set; a name in two sources counts as repeated
    pub fn parse_all<'a>(sources: impl IntoIterator<Item = &'a str>) -> Self {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for raw in sources {
            for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                values.entry(key.into_owned()).or_default().push(value.into_owned());
            }
        }
        Self { values }
    }

    /// A parameter that must appear exactly once with a non-empty value
    pub fn required(&self, name: &str) -> Result<String> {
        self.optional(name)?
            .ok_or_else(|| GrantError::InvalidRequest(format!("{name} is required")))
    }

    /// A parameter that may be absent but must not be repeated
    pub fn optional(&self, name: &str) -> Result<Option<String>> {
        match self.values.get(name).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([value]) if value.is_empty() => Ok(None),
            Some([value]) => Ok(Some(value.clone())),
            Some(_) => Err(GrantError::InvalidRequest(format!(
                "{name} must not be repeated"
            ))),
        }
    }
}
