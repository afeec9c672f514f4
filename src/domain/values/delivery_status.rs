use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Stored, no delivery attempt has finished yet.
    Pending,
    /// Last attempt failed; retried on the next cycle.
    Failed,
    Delivered,
}

impl DeliveryStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "failed" => Ok(DeliveryStatus::Failed),
            "delivered" => Ok(DeliveryStatus::Delivered),
            _ => Err(format!("Unknown delivery status: {s}")),
        }
    }
}
