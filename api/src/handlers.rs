use crate::error::{ApiError, ErrorBody};
use crate::store::ProposalStore;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use lovenote_mailer::{Notification, Notifier};
use lovenote_types::{NewProposal, Proposal};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const SUBMIT_PATH: &str = "/api/v1/Proposal/m";
pub const LIST_PATH: &str = "/api/v1/Proposal/all";

/// How many proposals the listing exposes.
pub const RECENT_LIMIT: i64 = 3;

/// Process-wide resources, built once in `main` and shared by every request.
pub struct AppState<S, N> {
    pub store: S,
    pub notifier: N,
}

impl<S: ProposalStore, N: Notifier> AppState<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }
}

/// Submission body as sent by the client; any field may be absent or null.
/// Numbers and `true` are taken as their text, like any other scalar.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub message: Option<String>,
}

/// Falsy values (`null`, `false`, `0`) and non-scalars count as absent.
fn scalar_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) if number.as_f64() != Some(0.0) => {
            Some(number.to_string())
        }
        Some(Value::Bool(true)) => Some("true".to_string()),
        _ => None,
    })
}

impl SubmitRequest {
    /// `None` unless every field is present and non-empty.
    pub fn into_new_proposal(self) -> Option<NewProposal> {
        let filled = |value: Option<String>| value.filter(|v| !v.is_empty());

        Some(NewProposal {
            to: filled(self.to)?,
            email: filled(self.email)?,
            from: filled(self.from)?,
            message: filled(self.message)?,
        })
    }
}

/// Reads a [`SubmitRequest`] from a JSON or URL-encoded body. Any other
/// content type, and an empty JSON body, is an empty submission.
pub struct ProposalForm(pub SubmitRequest);

impl<S: Send + Sync> FromRequest<S> for ProposalForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mime = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|essence| essence.trim().to_ascii_lowercase());

        match mime.as_deref() {
            Some("application/x-www-form-urlencoded") => {
                let Form(body) = Form::<SubmitRequest>::from_request(req, state)
                    .await
                    .map_err(|rejection| ApiError::Unclassified {
                        status: Some(rejection.status()),
                        message: rejection.body_text(),
                    })?;
                Ok(Self(body))
            }
            Some("application/json") => {
                let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
                    ApiError::Unclassified {
                        status: Some(rejection.status()),
                        message: rejection.body_text(),
                    }
                })?;
                if bytes.trim_ascii().is_empty() {
                    return Ok(Self(SubmitRequest::default()));
                }

                let body =
                    serde_json::from_slice(&bytes).map_err(|e| ApiError::Unclassified {
                        status: Some(StatusCode::BAD_REQUEST),
                        message: format!("Failed to parse the request body as JSON: {e}"),
                    })?;
                Ok(Self(body))
            }
            _ => Ok(Self(SubmitRequest::default())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(rename = "Purpose_by")]
    pub purpose_by: Proposal,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub message: &'static str,
    pub count: i64,
    /// Only the sender name of each recent proposal.
    #[serde(rename = "Proposal")]
    pub proposal: Vec<String>,
}

/// Persists the proposal, then notifies its recipient. Any failure of either
/// step is answered with the same 500; the record stays even when mail fails.
pub async fn submit_proposal<S: ProposalStore, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    ProposalForm(request): ProposalForm,
) -> Response {
    tracing::info!("Received POST request at {SUBMIT_PATH}");

    let Some(proposal) = request.into_new_proposal() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new(ApiError::MissingFields.to_string())),
        )
            .into_response();
    };

    match create_and_notify(&state, &proposal).await {
        Ok(created) => (
            StatusCode::CREATED,
            Json(SubmitResponse {
                success: true,
                message: "Your message has been sent",
                purpose_by: created,
            }),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = ?err, "Failed to send email");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("Failed to send email").with_error(err.to_string())),
            )
                .into_response()
        }
    }
}

async fn create_and_notify<S: ProposalStore, N: Notifier>(
    state: &AppState<S, N>,
    proposal: &NewProposal,
) -> Result<Proposal, ApiError> {
    let created = state.store.create(proposal).await?;

    state
        .notifier
        .send(&Notification {
            email: &created.email,
            from: &created.from,
            message: &created.message,
            to_label: &created.to,
        })
        .await?;

    Ok(created)
}

pub async fn list_recent<S: ProposalStore, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
) -> Result<Json<ListResponse>, ApiError> {
    tracing::info!("Received GET request at {LIST_PATH}");

    let count = state.store.count_all().await?;
    let recent = state.store.find_recent(RECENT_LIMIT).await?;
    tracing::debug!(?recent, "Recent proposals");

    Ok(Json(ListResponse {
        success: true,
        message: "All proposal",
        count,
        proposal: recent.into_iter().map(|p| p.from).collect(),
    }))
}
