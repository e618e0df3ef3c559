use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use store_core::error::require_text;
use store_core::{DomainError, DomainResult, Entity, OnDelete, row_id};

use crate::product::ProductId;

row_id!(
    /// Comment identifier.
    CommentId,
    "CommentId"
);

pub const NAME_MAX_LEN: usize = 255;

/// Moderation status of a product comment.
///
/// Any status may be assigned at any time; no transition order is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Approved,
    #[default]
    Pending,
    Rejected,
}

impl CommentStatus {
    pub const ALL: [CommentStatus; 3] = [
        CommentStatus::Approved,
        CommentStatus::Pending,
        CommentStatus::Rejected,
    ];

    /// Single-letter storage code.
    pub fn code(self) -> &'static str {
        match self {
            CommentStatus::Approved => "a",
            CommentStatus::Pending => "p",
            CommentStatus::Rejected => "r",
        }
    }

    pub fn from_code(code: &str) -> DomainResult<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| DomainError::validation(format!("unknown comment status code '{code}'")))
    }

    pub fn label(self) -> &'static str {
        match self {
            CommentStatus::Approved => "Approved",
            CommentStatus::Pending => "Pending",
            CommentStatus::Rejected => "Rejected",
        }
    }
}

/// A visitor comment on a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub product_id: ProductId,
    pub name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub status: CommentStatus,
}

impl Comment {
    /// Comments go away with their product.
    pub const PRODUCT_ON_DELETE: OnDelete = OnDelete::Cascade;
}

impl Entity for Comment {
    type Id = CommentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub product_id: ProductId,
    pub name: String,
    pub body: String,
    #[serde(default)]
    pub status: CommentStatus,
}

impl NewComment {
    pub fn validate(&self) -> DomainResult<()> {
        require_text("name", &self.name, NAME_MAX_LEN)?;
        if self.body.trim().is_empty() {
            return Err(DomainError::validation("body cannot be empty"));
        }
        Ok(())
    }

    pub fn into_comment(self, id: CommentId, now: DateTime<Utc>) -> Comment {
        Comment {
            id,
            product_id: self.product_id,
            name: self.name,
            body: self.body,
            created_at: now,
            status: self.status,
        }
    }
}
