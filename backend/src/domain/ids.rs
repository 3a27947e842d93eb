//! Strongly typed identifiers for storefront records.
//!
//! Every identifier is a UUID v4 generated by the application at insert time.
//! The wrappers exist so a product id can never be passed where a user id is
//! expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation error raised when parsing an identifier from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} id must be a valid UUID: {input}")]
pub struct InvalidIdError {
    kind: &'static str,
    input: String,
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse an identifier from its hyphenated textual form.
            ///
            /// # Errors
            ///
            /// Returns [`InvalidIdError`] when `raw` is not a UUID.
            pub fn parse(raw: &str) -> Result<Self, InvalidIdError> {
                Uuid::parse_str(raw).map(Self).map_err(|_| InvalidIdError {
                    kind: $kind,
                    input: raw.to_owned(),
                })
            }

            /// Access the underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered buyer.
    UserId,
    "user"
);
entity_id!(
    /// Identifier of a catalogue product.
    ProductId,
    "product"
);
entity_id!(
    /// Identifier of a recorded order.
    OrderId,
    "order"
);
