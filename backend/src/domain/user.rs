//! Buyers and their spendable balance.
//!
//! A [`User`] is always fully constructed: every name part has been
//! validated, the username is unique login material, and the balance is a
//! non-negative [`Money`] amount. Profile edits go through [`UserProfile`],
//! which has neither a balance nor a username, so the only path that can
//! lower a balance is the purchase workflow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Money, UserId};

/// Longest accepted name component, matching the storage column width.
pub const NAME_MAX: usize = 100;
/// Shortest accepted username.
pub const USERNAME_MIN: usize = 3;
/// Longest accepted username, matching the storage column width.
pub const USERNAME_MAX: usize = 50;

/// Validation errors raised when constructing user records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    /// A required name component was blank.
    #[error("{field} must not be empty")]
    EmptyName {
        /// Which name component was blank.
        field: &'static str,
    },
    /// A name component exceeded [`NAME_MAX`] characters.
    #[error("{field} must be at most {max} characters")]
    NameTooLong {
        /// Which name component was too long.
        field: &'static str,
        /// The enforced limit.
        max: usize,
    },
    /// Gender must be `M` or `F`.
    #[error("gender must be M or F")]
    InvalidGender,
    /// Username length fell outside [`USERNAME_MIN`]..=[`USERNAME_MAX`].
    #[error("username must be between {min} and {max} characters")]
    UsernameLength {
        /// Shortest accepted length.
        min: usize,
        /// Longest accepted length.
        max: usize,
    },
    /// Usernames are ASCII letters and digits only.
    #[error("username may only contain ASCII letters and digits")]
    UsernameInvalidCharacters,
}

fn required_name(field: &'static str, value: String) -> Result<String, UserValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(UserValidationError::EmptyName { field });
    }
    optional_name(field, trimmed.to_owned())
}

fn optional_name(field: &'static str, value: String) -> Result<String, UserValidationError> {
    if value.chars().count() > NAME_MAX {
        return Err(UserValidationError::NameTooLong {
            field,
            max: NAME_MAX,
        });
    }
    Ok(value.trim().to_owned())
}

/// Gender recorded on a profile, stored as `M` or `F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Stored as `F`.
    #[serde(rename = "F")]
    Female,
    /// Stored as `M`.
    #[serde(rename = "M")]
    Male,
}

impl Gender {
    /// Single-letter storage code.
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Female => "F",
            Self::Male => "M",
        }
    }
}

impl FromStr for Gender {
    type Err = UserValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "F" => Ok(Self::Female),
            "M" => Ok(Self::Male),
            _ => Err(UserValidationError::InvalidGender),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Unique login name chosen at registration.
///
/// ## Invariants
/// - Between [`USERNAME_MIN`] and [`USERNAME_MAX`] characters.
/// - ASCII letters and digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validate and construct a [`Username`].
    pub fn new(value: impl Into<String>) -> Result<Self, UserValidationError> {
        let value = value.into();
        let length = value.chars().count();
        if !(USERNAME_MIN..=USERNAME_MAX).contains(&length) {
            return Err(UserValidationError::UsernameLength {
                min: USERNAME_MIN,
                max: USERNAME_MAX,
            });
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(UserValidationError::UsernameInvalidCharacters);
        }
        Ok(Self(value))
    }

    /// Borrow the username.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl TryFrom<String> for Username {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Editable profile fields of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UserProfileDto", into = "UserProfileDto")]
pub struct UserProfile {
    first_name: String,
    middle_name: String,
    last_name: String,
    gender: Gender,
    age: u16,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfileDto {
    first_name: String,
    #[serde(default)]
    middle_name: String,
    last_name: String,
    gender: Gender,
    age: u16,
}

impl From<UserProfile> for UserProfileDto {
    fn from(value: UserProfile) -> Self {
        Self {
            first_name: value.first_name,
            middle_name: value.middle_name,
            last_name: value.last_name,
            gender: value.gender,
            age: value.age,
        }
    }
}

impl TryFrom<UserProfileDto> for UserProfile {
    type Error = UserValidationError;

    fn try_from(value: UserProfileDto) -> Result<Self, Self::Error> {
        Self::try_new(
            value.first_name,
            value.middle_name,
            value.last_name,
            value.gender,
            value.age,
        )
    }
}

impl UserProfile {
    /// Validate and build a profile.
    ///
    /// The middle name may be empty; first and last names may not.
    pub fn try_new(
        first_name: impl Into<String>,
        middle_name: impl Into<String>,
        last_name: impl Into<String>,
        gender: Gender,
        age: u16,
    ) -> Result<Self, UserValidationError> {
        Ok(Self {
            first_name: required_name("first name", first_name.into())?,
            middle_name: optional_name("middle name", middle_name.into())?,
            last_name: required_name("last name", last_name.into())?,
            gender,
            age,
        })
    }

    /// Given name.
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    /// Middle name, possibly empty.
    pub fn middle_name(&self) -> &str {
        &self.middle_name
    }

    /// Family name.
    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// Recorded gender.
    pub fn gender(&self) -> Gender {
        self.gender
    }

    /// Age in years.
    pub fn age(&self) -> u16 {
        self.age
    }

    /// Space separated name parts, skipping an empty middle name.
    pub fn full_name(&self) -> String {
        [
            self.first_name.as_str(),
            self.middle_name.as_str(),
            self.last_name.as_str(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Registration payload: a username, a profile and the opening balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Unique login name.
    pub username: Username,
    /// Editable profile fields.
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Opening balance.
    pub balance: Money,
}

impl NewUser {
    /// Pair a validated profile and username with an opening balance.
    pub fn new(username: Username, profile: UserProfile, balance: Money) -> Self {
        Self {
            username,
            profile,
            balance,
        }
    }
}

/// Persisted buyer.
///
/// # Examples
/// ```
/// use storefront::domain::{Gender, Money, User, UserId, UserProfile, Username};
///
/// let profile =
///     UserProfile::try_new("Ada", "", "Lovelace", Gender::Female, 36).expect("valid profile");
/// let username = Username::new("ada").expect("valid username");
/// let user = User::new(UserId::random(), username, profile, Money::new(1_000).expect("balance"));
/// assert_eq!(user.full_name(), "Ada Lovelace");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: UserId,
    username: Username,
    #[serde(flatten)]
    profile: UserProfile,
    balance: Money,
}

impl User {
    /// Assemble a user from already validated parts.
    pub fn new(id: UserId, username: Username, profile: UserProfile, balance: Money) -> Self {
        Self {
            id,
            username,
            profile,
            balance,
        }
    }

    /// Stable identifier.
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Unique login name.
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Profile fields.
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Current spendable balance.
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Derived display name.
    pub fn full_name(&self) -> String {
        self.profile.full_name()
    }
}

#[cfg(test)]
mod tests;
