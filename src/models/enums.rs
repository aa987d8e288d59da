use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(TestStatus {
    Pending => "pending",
    Parsed => "parsed",
    Error => "error",
});

impl TestStatus {
    /// Terminal statuses end a run; a case reaches one exactly once.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The only legal transitions are pending -> parsed and pending -> error.
    pub fn can_transition_to(&self, next: TestStatus) -> bool {
        matches!(self, Self::Pending) && next.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [TestStatus::Pending, TestStatus::Parsed, TestStatus::Error] {
            assert_eq!(TestStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_rejected() {
        let err = TestStatus::from_str("done").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn only_pending_moves_to_terminal() {
        assert!(TestStatus::Pending.can_transition_to(TestStatus::Parsed));
        assert!(TestStatus::Pending.can_transition_to(TestStatus::Error));
        assert!(!TestStatus::Pending.can_transition_to(TestStatus::Pending));
        assert!(!TestStatus::Parsed.can_transition_to(TestStatus::Error));
        assert!(!TestStatus::Error.can_transition_to(TestStatus::Parsed));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TestStatus::Parsed).unwrap();
        assert_eq!(json, "\"parsed\"");
    }
}
