use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when validating an ISBN.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsbnError {
    /// Wrong number of characters after removing separators.
    #[error("Invalid ISBN '{0}': expected 10 or 13 digits")]
    Length(String),

    /// A character other than a digit (or a trailing `X` for ISBN-10).
    #[error("Invalid ISBN '{0}': unexpected character")]
    Character(String),

    /// The check digit does not match.
    #[error("Invalid ISBN '{0}': check digit mismatch")]
    Checksum(String),
}

/// International Standard Book Number, the catalog's external book code.
///
/// Accepts ISBN-10 and ISBN-13. Hyphens and spaces are stripped and a
/// lower-case `x` check digit is upper-cased, so two spellings of the same
/// number compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    /// Validates and normalizes an ISBN.
    pub fn parse(input: &str) -> Result<Self, IsbnError> {
        let normalized: String = input
            .chars()
            .filter(|c| *c != '-' && *c != ' ')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.len() {
            10 => validate_isbn10(&normalized).map_err(|e| e.with_input(input))?,
            13 => validate_isbn13(&normalized).map_err(|e| e.with_input(input))?,
            _ => return Err(IsbnError::Length(input.to_string())),
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized ISBN.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl IsbnError {
    fn with_input(self, input: &str) -> Self {
        match self {
            IsbnError::Length(_) => IsbnError::Length(input.to_string()),
            IsbnError::Character(_) => IsbnError::Character(input.to_string()),
            IsbnError::Checksum(_) => IsbnError::Checksum(input.to_string()),
        }
    }
}

fn validate_isbn10(digits: &str) -> Result<(), IsbnError> {
    let mut sum = 0u32;
    for (i, c) in digits.chars().enumerate() {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'X' if i == 9 => 10,
            _ => return Err(IsbnError::Character(String::new())),
        };
        sum += (10 - i as u32) * value;
    }
    if sum % 11 == 0 {
        Ok(())
    } else {
        Err(IsbnError::Checksum(String::new()))
    }
}

fn validate_isbn13(digits: &str) -> Result<(), IsbnError> {
    let mut sum = 0u32;
    for (i, c) in digits.chars().enumerate() {
        let value = c
            .to_digit(10)
            .ok_or_else(|| IsbnError::Character(String::new()))?;
        sum += if i % 2 == 0 { value } else { value * 3 };
    }
    if sum % 10 == 0 {
        Ok(())
    } else {
        Err(IsbnError::Checksum(String::new()))
    }
}

impl std::fmt::Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Isbn {
    type Err = IsbnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Isbn {
    type Error = IsbnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self {
        isbn.0
    }
}

impl AsRef<str> for Isbn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
