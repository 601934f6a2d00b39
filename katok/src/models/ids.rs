//! Type-safe ID wrappers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Create a new ID.
            pub fn new(id: i64) -> Self {
                $name(id)
            }

            /// Check if this ID is unset (zero or negative).
            pub fn is_empty(&self) -> bool {
                self.0 <= 0
            }

            /// Get the raw value.
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(n: i64) -> Self {
                $name(n)
            }
        }

        impl From<i32> for $name {
            fn from(n: i32) -> Self {
                $name(n as i64)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map($name)
                    .map_err(|_| Error::InvalidArgument(format!("invalid {}: {:?}", stringify!($name), s)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(UserId, "A numeric user identifier assigned by the server.");
define_id!(RoomId, "A chat room identifier.");
define_id!(MessageId, "A server-assigned permanent message identifier.");
