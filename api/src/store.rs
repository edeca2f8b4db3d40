use chrono::{DateTime, Utc};
use lovenote_types::{NewProposal, Proposal};
use sqlx::error::ErrorKind;
use std::collections::BTreeMap;
use std::future::Future;
use uuid::Uuid;

/// Field name to human-readable complaint.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Proposal validation failed: {}", describe(.0))]
    Validation(FieldErrors),

    #[error("Duplicate key on {}", .fields.join(","))]
    DuplicateKey { fields: Vec<String> },

    #[error(transparent)]
    Database(sqlx::Error),
}

fn describe(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn required_message(field: &str) -> &'static str {
    match field {
        "to" => "Bhai kisko send kar rha hai wo tho likh",
        "email" => "Please enter your email",
        "message" => "Please enter your message",
        "from" => "Please enter your name",
        _ => "Field is required",
    }
}

/// Rejects a proposal with any empty field, one entry per offending field.
pub fn validate(proposal: &NewProposal) -> Result<(), StoreError> {
    let errors: FieldErrors = proposal
        .fields()
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| (field.to_string(), required_message(field).to_string()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

/// Append-only persistence for proposals.
pub trait ProposalStore: Send + Sync + 'static {
    fn create(
        &self,
        proposal: &NewProposal,
    ) -> impl Future<Output = Result<Proposal, StoreError>> + Send;

    fn count_all(&self) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Newest first by `created_at`, later insertions winning ties.
    fn find_recent(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Proposal>, StoreError>> + Send;
}

#[derive(sqlx::FromRow)]
struct ProposalRow {
    id: Uuid,
    to: String,
    email: String,
    from: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<ProposalRow> for Proposal {
    fn from(row: ProposalRow) -> Self {
        Proposal {
            id: row.id,
            to: row.to,
            email: row.email,
            from: row.from,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct SqlxProposalStore {
    db: sqlx::Pool<sqlx::Postgres>,
}

impl SqlxProposalStore {
    pub fn new(db: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self { db }
    }
}

impl ProposalStore for SqlxProposalStore {
    #[tracing::instrument(name = "Insert proposal", skip_all)]
    async fn create(&self, proposal: &NewProposal) -> Result<Proposal, StoreError> {
        validate(proposal)?;

        let row = sqlx::query_as::<_, ProposalRow>(
            r#"
            INSERT INTO proposals (id, "to", email, "from", message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, "to", email, "from", message, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&proposal.to)
        .bind(&proposal.email)
        .bind(&proposal.from)
        .bind(&proposal.message)
        .fetch_one(&self.db)
        .await
        .map_err(classify)?;

        Ok(row.into())
    }

    async fn count_all(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM proposals")
            .fetch_one(&self.db)
            .await
            .map_err(classify)
    }

    #[tracing::instrument(name = "Fetch recent proposals", skip(self))]
    async fn find_recent(&self, limit: i64) -> Result<Vec<Proposal>, StoreError> {
        let rows = sqlx::query_as::<_, ProposalRow>(
            r#"
            SELECT id, "to", email, "from", message, created_at
            FROM proposals
            ORDER BY created_at DESC, seq DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(classify)?;

        Ok(rows.into_iter().map(Proposal::from).collect())
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let column = db_err.constraint().map(constraint_column);
        match (db_err.kind(), column) {
            (ErrorKind::UniqueViolation, column) => {
                return StoreError::DuplicateKey {
                    fields: column.into_iter().collect(),
                };
            }
            (ErrorKind::CheckViolation, Some(column)) => {
                let message = required_message(&column).to_string();
                return StoreError::Validation(FieldErrors::from([(column, message)]));
            }
            _ => {}
        }
    }

    StoreError::Database(err)
}

/// Maps Postgres' default constraint names (`proposals_<column>_check`,
/// `proposals_<column>_key`, `proposals_pkey`) back to the JSON field name.
fn constraint_column(constraint: &str) -> String {
    if constraint == "proposals_pkey" {
        return "_id".to_string();
    }

    let name = constraint.strip_prefix("proposals_").unwrap_or(constraint);
    name.strip_suffix("_check")
        .or_else(|| name.strip_suffix("_key"))
        .unwrap_or(name)
        .to_string()
}
