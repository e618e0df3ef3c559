//! Foreign-key deletion policies.

use serde::{Deserialize, Serialize};

/// What deleting a referenced row does to the rows that reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnDelete {
    /// Refuse the delete while any dependent row exists.
    Protect,
    /// Delete the dependent rows together with the referenced row.
    Cascade,
}
