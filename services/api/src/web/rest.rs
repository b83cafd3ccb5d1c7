//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::generate::{self, ScrapeReport};
use crate::web::state::AppState;
use datagen_core::domain::{PreviewItem, ScrapeOutcome};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        crate::web::auth::register_handler,
        crate::web::auth::login_handler,
        submit_prompt_handler,
        scrape_callback_handler,
        get_dataset_handler,
        dashboard_handler,
        delete_dataset_handler,
        get_api_key_handler,
        set_api_key_handler,
    ),
    components(schemas(
        crate::web::auth::RegisterRequest,
        crate::web::auth::LoginRequest,
        crate::web::auth::AccountSummary,
        crate::web::auth::TokenResponse,
        SubmitPromptRequest,
        SubmitPromptResponse,
        ScrapeCallbackRequest,
        PreviewItemPayload,
        AckResponse,
        DeleteResponse,
        ApiKeyPayload,
    )),
    tags(
        (name = "Datagen API", description = "Prompt-to-dataset generation endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct AckResponse {
    pub msg: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitPromptRequest {
    pub prompt: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPromptResponse {
    pub prompt_id: Uuid,
    pub dataset_id: Uuid,
    pub keywords: Vec<String>,
    pub credits: i64,
}

/// Wire shape of one preview item in the scrape callback. Missing fields
/// default to empty strings, matching the collaborator's loose payloads.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewItemPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub keyword_used: String,
}

impl PreviewItemPayload {
    fn into_domain(self) -> PreviewItem {
        PreviewItem {
            title: self.title,
            url: self.url,
            content: self.content,
            keyword_used: self.keyword_used,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeCallbackRequest {
    /// Optional at the type level so a missing id yields our 400 message
    /// rather than a deserialization error.
    pub prompt_id: Option<Uuid>,
    pub preview: Option<Vec<PreviewItemPayload>>,
    pub download_link: Option<String>,
    pub total_items: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub msg: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyPayload {
    pub api_key: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is up", body = AckResponse))
)]
pub async fn health_handler() -> Json<AckResponse> {
    Json(AckResponse {
        msg: "Datagen API working".to_string(),
    })
}

/// Submit a prompt and run the keyword stage.
///
/// Debits 10 credits, creates the prompt and dataset records, and blocks on
/// the ML collaborator. Scraping continues out-of-band; the client polls
/// `GET /prompt/{id}` until the dataset reaches a terminal status.
#[utoipa::path(
    post,
    path = "/prompt",
    request_body = SubmitPromptRequest,
    responses(
        (status = 200, description = "Keyword stage complete", body = SubmitPromptResponse),
        (status = 400, description = "Empty prompt or not enough credits"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "ML collaborator failure")
    )
)]
pub async fn submit_prompt_handler(
    State(state): State<Arc<AppState>>,
    Extension(account_id): Extension<Uuid>,
    Json(req): Json<SubmitPromptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.prompt.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("Prompt required".to_string()));
    }

    let outcome =
        generate::run_generation(state.store.as_ref(), state.ml.as_ref(), account_id, text)
            .await?;

    Ok(Json(SubmitPromptResponse {
        prompt_id: outcome.prompt_id,
        dataset_id: outcome.dataset_id,
        keywords: outcome.keywords,
        credits: outcome.credits_remaining,
    }))
}

/// Receive the scraper collaborator's final results.
///
/// Unauthenticated: the scraper is a trusted collaborator with no account.
/// A callback for a deleted dataset is acknowledged as a no-op so the
/// scraper never retries against a record that is gone.
#[utoipa::path(
    post,
    path = "/scrape",
    request_body = ScrapeCallbackRequest,
    responses(
        (status = 200, description = "Report applied or safely ignored", body = AckResponse),
        (status = 400, description = "Missing promptId")
    )
)]
pub async fn scrape_callback_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeCallbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let prompt_id = req
        .prompt_id
        .ok_or_else(|| ApiError::Validation("promptId required".to_string()))?;

    let report = ScrapeReport {
        prompt_id,
        preview: req
            .preview
            .map(|items| items.into_iter().map(PreviewItemPayload::into_domain).collect()),
        download_link: req.download_link,
        total_items: req.total_items,
        error_message: req.error_message,
    };

    let outcome = generate::apply_scrape_report(state.store.as_ref(), &report).await?;
    let msg = match outcome {
        ScrapeOutcome::Applied => "Final dataset saved",
        ScrapeOutcome::Ignored => "Dataset already deleted, ignoring scrape",
    };

    Ok(Json(AckResponse {
        msg: msg.to_string(),
    }))
}

/// Fetch a dataset by its prompt id, with the prompt's text and creation
/// time denormalized in. This is the endpoint the client poller watches.
#[utoipa::path(
    get,
    path = "/prompt/{id}",
    params(("id" = Uuid, Path, description = "The prompt id the dataset belongs to")),
    responses(
        (status = 200, description = "The dataset with its prompt text and date"),
        (status = 404, description = "Dataset not found")
    )
)]
pub async fn get_dataset_handler(
    State(state): State<Arc<AppState>>,
    Path(prompt_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.store.get_dataset_view(prompt_id).await?;
    Ok(Json(view))
}

/// List the caller's datasets, newest first.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "The caller's datasets, newest first"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(account_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let views = state.store.list_dataset_views(account_id).await?;
    Ok(Json(views))
}

/// Delete a dataset and its prompt. Owner-scoped: a prompt belonging to a
/// different account reads as not found.
#[utoipa::path(
    delete,
    path = "/dataset/{promptId}",
    params(("promptId" = Uuid, Path, description = "The prompt id the dataset belongs to")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Not found or not owned by the caller")
    )
)]
pub async fn delete_dataset_handler(
    State(state): State<Arc<AppState>>,
    Extension(account_id): Extension<Uuid>,
    Path(prompt_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .delete_dataset_and_prompt(account_id, prompt_id)
        .await?;

    Ok(Json(DeleteResponse {
        success: true,
        msg: "Dataset deleted permanently".to_string(),
    }))
}

/// Read the caller's stored third-party API key.
#[utoipa::path(
    get,
    path = "/user/apikey",
    responses(
        (status = 200, description = "The stored key", body = ApiKeyPayload),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_api_key_handler(
    State(state): State<Arc<AppState>>,
    Extension(account_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let api_key = state.store.get_api_key(account_id).await?;
    Ok(Json(ApiKeyPayload { api_key }))
}

/// Store a third-party API key on the caller's account.
#[utoipa::path(
    post,
    path = "/user/apikey",
    request_body = ApiKeyPayload,
    responses(
        (status = 200, description = "The stored key", body = ApiKeyPayload),
        (status = 400, description = "Missing key"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn set_api_key_handler(
    State(state): State<Arc<AppState>>,
    Extension(account_id): Extension<Uuid>,
    Json(req): Json<ApiKeyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let api_key = req.api_key.trim();
    if api_key.is_empty() {
        return Err(ApiError::Validation("API key required".to_string()));
    }

    state.store.set_api_key(account_id, api_key).await?;
    Ok((
        StatusCode::OK,
        Json(ApiKeyPayload {
            api_key: api_key.to_string(),
        }),
    ))
}
