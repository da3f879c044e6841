//! Strongly-typed identifier value objects.
//!
//! Two families exist:
//! - UUID identifiers for records this engine creates (subscriptions,
//!   payments, license allocations).
//! - Numeric identifiers for rows owned by the surrounding application
//!   (users, condominiums, plans, admin transfers).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier, rejecting non-positive values.
            pub fn new(value: i64) -> Result<Self, ValidationError> {
                if value <= 0 {
                    return Err(ValidationError::invalid_format(
                        $field,
                        format!("must be a positive integer, got {}", value),
                    ));
                }
                Ok(Self(value))
            }

            /// Wraps a value read back from storage.
            pub(crate) fn from_db(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw integer.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.trim().parse::<i64>().map_err(|_| {
                    ValidationError::invalid_format($field, format!("'{}' is not an integer", s))
                })?;
                Self::new(value)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a subscription.
    SubscriptionId
);

uuid_id!(
    /// Unique identifier for a payment record.
    PaymentId
);

uuid_id!(
    /// Unique identifier for a license allocation.
    AllocationId
);

numeric_id!(
    /// Identifier of an account in the surrounding application.
    UserId,
    "user_id"
);

numeric_id!(
    /// Identifier of a managed condominium.
    CondominiumId,
    "condominium_id"
);

numeric_id!(
    /// Identifier of a billing plan in the catalog.
    PlanId,
    "plan_id"
);

numeric_id!(
    /// Identifier of a pending admin transfer.
    TransferId,
    "transfer_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_id_generates_unique_values() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }

    #[test]
    fn payment_id_parses_from_display() {
        let id = PaymentId::new();
        let parsed: PaymentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn numeric_id_rejects_zero_and_negative() {
        assert!(UserId::new(0).is_err());
        assert!(CondominiumId::new(-4).is_err());
        assert_eq!(TransferId::new(7).unwrap().as_i64(), 7);
    }

    #[test]
    fn numeric_id_parses_trimmed_string() {
        let id: UserId = " 42 ".parse().unwrap();
        assert_eq!(id.as_i64(), 42);
    }

    #[test]
    fn numeric_id_parse_error_names_the_field() {
        let err = "abc".parse::<TransferId>().unwrap_err();
        assert!(err.to_string().contains("transfer_id"));
    }

    #[test]
    fn numeric_id_serializes_as_plain_integer() {
        let json = serde_json::to_string(&PlanId::new(3).unwrap()).unwrap();
        assert_eq!(json, "3");
    }
}
