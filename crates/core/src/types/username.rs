//! Account username type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    /// The input string is empty.
    #[error("username cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("username must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a non-alphanumeric character.
    #[error("The username should only contain alphanumeric characters")]
    NotAlphanumeric,
}

/// A username made only of alphanumeric characters.
///
/// ```
/// use grocery_core::Username;
///
/// assert!(Username::parse("username1").is_ok());
/// assert!(Username::parse("user name").is_err());
/// assert!(Username::parse("user_1").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Maximum length of a username.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `Username` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or contains anything
    /// other than alphanumeric characters.
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        if s.is_empty() {
            return Err(UsernameError::Empty);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s.chars().all(char::is_alphanumeric) {
            return Err(UsernameError::NotAlphanumeric);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Username::parse("username1").is_ok());
        assert!(Username::parse("Zoë").is_ok());
    }

    #[test]
    fn test_parse_rejects_symbols() {
        assert_eq!(
            Username::parse("user-name"),
            Err(UsernameError::NotAlphanumeric)
        );
        assert_eq!(
            Username::parse("user name"),
            Err(UsernameError::NotAlphanumeric)
        );
    }

    #[test]
    fn test_parse_empty_and_long() {
        assert_eq!(Username::parse(""), Err(UsernameError::Empty));
        assert!(matches!(
            Username::parse(&"a".repeat(256)),
            Err(UsernameError::TooLong { .. })
        ));
    }
}
