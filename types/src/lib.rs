use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub to: String,
    pub email: String,
    pub from: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a proposal; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProposal {
    pub to: String,
    pub email: String,
    pub from: String,
    pub message: String,
}

impl NewProposal {
    /// Field names paired with their values, in schema order.
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("to", self.to.as_str()),
            ("email", self.email.as_str()),
            ("message", self.message.as_str()),
            ("from", self.from.as_str()),
        ]
    }

    pub fn into_proposal(self, id: Uuid, created_at: DateTime<Utc>) -> Proposal {
        Proposal {
            id,
            to: self.to,
            email: self.email,
            from: self.from,
            message: self.message,
            created_at,
        }
    }
}
