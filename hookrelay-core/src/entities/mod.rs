pub mod delivery;
pub mod endpoint;

use hookrelay_sdk::objects::{
    AttemptStatus as SdkAttemptStatus, DeliveryStatus as SdkDeliveryStatus,
};

/// Delivery status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see
/// `hookrelay_sdk::objects::DeliveryStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "delivery_status")]
pub enum DeliveryStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Dead,
}

impl DeliveryStatus {
    /// Terminal rows are immutable: no transition leaves these states.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Dead)
    }
}

impl From<DeliveryStatus> for SdkDeliveryStatus {
    fn from(value: DeliveryStatus) -> Self {
        match value {
            DeliveryStatus::Pending => SdkDeliveryStatus::Pending,
            DeliveryStatus::Processing => SdkDeliveryStatus::Processing,
            DeliveryStatus::Success => SdkDeliveryStatus::Success,
            DeliveryStatus::Failed => SdkDeliveryStatus::Failed,
            DeliveryStatus::Dead => SdkDeliveryStatus::Dead,
        }
    }
}

impl From<SdkDeliveryStatus> for DeliveryStatus {
    fn from(value: SdkDeliveryStatus) -> Self {
        match value {
            SdkDeliveryStatus::Pending => DeliveryStatus::Pending,
            SdkDeliveryStatus::Processing => DeliveryStatus::Processing,
            SdkDeliveryStatus::Success => DeliveryStatus::Success,
            SdkDeliveryStatus::Failed => DeliveryStatus::Failed,
            SdkDeliveryStatus::Dead => DeliveryStatus::Dead,
        }
    }
}

/// Attempt outcome for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see
/// `hookrelay_sdk::objects::AttemptStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "attempt_status")]
pub enum AttemptStatus {
    Success,
    Failed,
}

impl From<AttemptStatus> for SdkAttemptStatus {
    fn from(value: AttemptStatus) -> Self {
        match value {
            AttemptStatus::Success => SdkAttemptStatus::Success,
            AttemptStatus::Failed => SdkAttemptStatus::Failed,
        }
    }
}

impl From<SdkAttemptStatus> for AttemptStatus {
    fn from(value: SdkAttemptStatus) -> Self {
        match value {
            SdkAttemptStatus::Success => AttemptStatus::Success,
            SdkAttemptStatus::Failed => AttemptStatus::Failed,
        }
    }
}
