use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Anonymous device identity that may record its own attendance.
    Device,
    /// Holder of the shared admin passphrase.
    Admin,
}
