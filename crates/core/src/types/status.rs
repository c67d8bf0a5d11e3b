//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Stock availability of an inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    /// Item can be sold.
    #[default]
    InStock,
    /// Item is not currently available.
    OutOfStock,
}

impl Availability {
    /// The stored token (`in-stock` / `out-of-stock`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "in-stock",
            Self::OutOfStock => "out-of-stock",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Availability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "in-stock" => Ok(Self::InStock),
            "out-of-stock" => Ok(Self::OutOfStock),
            other => Err(format!("invalid availability: {other}")),
        }
    }
}

/// Outcome carried by a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashStatus {
    /// The action succeeded.
    Success,
    /// The action failed.
    Error,
}

impl std::fmt::Display for FlashStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_tokens() {
        assert_eq!(
            "out-of-stock".parse::<Availability>().unwrap(),
            Availability::OutOfStock
        );
        assert_eq!(Availability::InStock.to_string(), "in-stock");
        assert!("sold".parse::<Availability>().is_err());
    }

    #[test]
    fn test_availability_serde_matches_display() {
        let json = serde_json::to_string(&Availability::OutOfStock).unwrap();
        assert_eq!(json, "\"out-of-stock\"");
    }

    #[test]
    fn test_flash_status_display() {
        assert_eq!(FlashStatus::Success.to_string(), "success");
        assert_eq!(FlashStatus::Error.to_string(), "error");
    }
}
