use std::fmt::{Debug, Formatter};

use crate::{AppError, AppResult};

/// Bearer credential used to authenticate against the remote authority.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken {
    value: String,
}

impl ApiToken {
    /// Creates a token, rejecting empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(AppError::Validation("api token must not be empty".to_owned()));
        }

        Ok(Self { value })
    }

    /// Returns the raw token for use in an authorization header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.value.as_str()
    }
}

impl Debug for ApiToken {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("ApiToken(***)")
    }
}
