//! Route handlers
//!
//! Every handler except the trace viewer records its outcome in the trace
//! ledger before answering, including calls whose query string does not
//! parse. A ledger failure is logged and never changes the response.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use ticket_sdk::servicedesk::{Announcements, NewTicket, PageResult, TicketStatus};
use trace_ledger::{ExecutionRecord, NewExecution};

use crate::error::ApiError;
use crate::{AppState, HealthResponse, START_TIME};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PAGE_SIZE: u32 = 25;
const DEFAULT_TRACE_LIMIT: usize = 50;
const MAX_TRACE_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct CreateParams {
    pub subject: String,
    pub description: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub email: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct DisplayParams {
    pub display_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteParams {
    pub ticket_id: u64,
    pub email: String,
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteByDisplayParams {
    pub display_id: String,
    pub email: String,
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct TraceParams {
    pub limit: Option<usize>,
}

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// One trace record as shown by the trace viewer
#[derive(Debug, Serialize)]
pub struct TraceItem {
    /// `YYYY-MM-DD HH:MM:SS`, UTC
    pub date_time: String,
    pub id: u64,
    pub endpoint: String,
    pub email: Option<String>,
    pub action: Option<String>,
    pub params: Value,
    pub ok: bool,
    pub code: Option<u16>,
    pub message: String,
}

impl From<ExecutionRecord> for TraceItem {
    fn from(record: ExecutionRecord) -> Self {
        Self {
            date_time: record.ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            id: record.id,
            endpoint: record.endpoint,
            email: record.email,
            action: record.action,
            params: record.params,
            ok: record.ok,
            code: record.code,
            message: record.message,
        }
    }
}

/// What the ledger learns about a call besides its outcome
struct Call {
    endpoint: &'static str,
    action: &'static str,
    email: Option<String>,
    params: Value,
}

impl Call {
    fn new(endpoint: &'static str, action: &'static str) -> Self {
        Self {
            endpoint,
            action,
            email: None,
            params: json!({}),
        }
    }

    fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Record the outcome of `call` and turn it into a response
fn finish<T>(state: &AppState, call: Call, result: ticket_sdk::Result<T>) -> Result<Json<T>, ApiError> {
    let (execution, outcome) = match result {
        Ok(value) => (
            NewExecution::success(call.endpoint, call.action),
            Ok(Json(value)),
        ),
        Err(err) => {
            let api_error = ApiError::from(err);
            tracing::error!("{} failed: {}", call.endpoint, api_error);
            (
                NewExecution::failure(
                    call.endpoint,
                    call.action,
                    api_error.status().as_u16(),
                    api_error.to_string(),
                ),
                Err(api_error),
            )
        }
    };

    let execution = match call.email {
        Some(email) => execution.with_email(email),
        None => execution,
    };

    record(state, execution.with_params(call.params));
    outcome
}

/// Unwrap parsed query parameters, recording a rejected query as a failed call
fn accept<T>(
    state: &AppState,
    endpoint: &'static str,
    action: &'static str,
    query: Result<Query<T>, QueryRejection>,
) -> Result<T, ApiError> {
    query.map(|Query(params)| params).map_err(|rejection| {
        let api_error = ApiError::Validation(rejection.body_text());
        tracing::warn!("{} rejected: {}", endpoint, api_error);
        record(
            state,
            NewExecution::failure(
                endpoint,
                action,
                api_error.status().as_u16(),
                api_error.to_string(),
            ),
        );
        api_error
    })
}

fn record(state: &AppState, execution: NewExecution) {
    let endpoint = execution.endpoint.clone();
    if let Err(err) = state.ledger.append(execution) {
        tracing::warn!("could not record {} in trace ledger: {}", endpoint, err);
    }
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    tracing::info!("Health check requested");

    record(&state, NewExecution::success("/health", "health"));

    Json(HealthResponse {
        healthy: true,
        service_name: "servicedesk-bridge".to_string(),
        uptime_seconds: START_TIME.elapsed().as_secs() as i64,
        status: "ok".to_string(),
    })
}

pub async fn announcements_handler(
    State(state): State<AppState>,
) -> Result<Json<Announcements>, ApiError> {
    tracing::info!("Active announcements requested");

    let result = state.actions.announcements().await;
    finish(&state, Call::new("/announcements/active", "announcements"), result)
}

pub async fn create_handler(
    State(state): State<AppState>,
    query: Result<Query<CreateParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let params = accept(&state, "/intents/create", "create", query)?;

    tracing::info!(
        "Creating ticket: requester={}, subject={}",
        params.email,
        params.subject
    );

    let ticket = NewTicket::new(&params.email, &params.subject, &params.description);
    let result = state.actions.create_ticket(&ticket).await;

    let call = Call::new("/intents/create", "create")
        .email(&params.email)
        .params(json!({ "subject": params.subject }));
    finish(&state, call, result)
}

pub async fn status_handler(
    State(state): State<AppState>,
    query: Result<Query<StatusParams>, QueryRejection>,
) -> Result<Json<PageResult>, ApiError> {
    let params = accept(&state, "/intents/status", "list_mine", query)?;

    tracing::info!(
        "Listing tickets: requester={}, page={}, page_size={}",
        params.email,
        params.page,
        params.page_size
    );

    let result = state
        .actions
        .list_my_tickets(&params.email, params.page, params.page_size)
        .await;

    let call = Call::new("/intents/status", "list_mine")
        .email(&params.email)
        .params(json!({ "page": params.page, "page_size": params.page_size }));
    finish(&state, call, result)
}

pub async fn status_by_display_handler(
    State(state): State<AppState>,
    query: Result<Query<DisplayParams>, QueryRejection>,
) -> Result<Json<TicketStatus>, ApiError> {
    let params = accept(&state, "/intents/status_by_display", "status_by_display", query)?;

    tracing::info!("Ticket status requested: display_id={}", params.display_id);

    let result = state.actions.ticket_status_by_display(&params.display_id).await;

    let call = Call::new("/intents/status_by_display", "status_by_display")
        .params(json!({ "display_id": params.display_id }));
    finish(&state, call, result)
}

pub async fn note_handler(
    State(state): State<AppState>,
    query: Result<Query<NoteParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let params = accept(&state, "/intents/note", "note", query)?;

    tracing::info!(
        "Adding note: ticket_id={}, requester={}",
        params.ticket_id,
        params.email
    );

    let result = state
        .actions
        .add_note(params.ticket_id, &params.email, &params.note)
        .await;

    let call = Call::new("/intents/note", "note")
        .email(&params.email)
        .params(json!({ "ticket_id": params.ticket_id }));
    finish(&state, call, result)
}

pub async fn note_by_display_handler(
    State(state): State<AppState>,
    query: Result<Query<NoteByDisplayParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let params = accept(&state, "/intents/note_by_display", "note_by_display", query)?;

    tracing::info!(
        "Adding note: display_id={}, requester={}",
        params.display_id,
        params.email
    );

    let result = state
        .actions
        .add_note_by_display(&params.display_id, &params.email, &params.note)
        .await;

    let call = Call::new("/intents/note_by_display", "note_by_display")
        .email(&params.email)
        .params(json!({ "display_id": params.display_id }));
    finish(&state, call, result)
}

pub async fn sites_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    tracing::info!("Listing sites");

    let result = state.actions.list_sites().await;
    finish(&state, Call::new("/meta/sites", "meta_sites"), result)
}

pub async fn templates_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    tracing::info!("Listing request templates");

    let result = state.actions.list_request_templates().await;
    finish(&state, Call::new("/meta/request_templates", "meta_templates"), result)
}

/// Most recent trace records, newest first. Hidden unless dev tracing is on.
pub async fn trace_recent_handler(
    State(state): State<AppState>,
    query: Result<Query<TraceParams>, QueryRejection>,
) -> Result<Json<Vec<TraceItem>>, ApiError> {
    if !state.dev_trace_enabled {
        return Err(ApiError::NotFound("Not Found".to_string()));
    }

    let Query(params) = query.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    let limit = params.limit.unwrap_or(DEFAULT_TRACE_LIMIT);
    if !(1..=MAX_TRACE_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_TRACE_LIMIT
        )));
    }

    let items = state
        .ledger
        .recent(limit)
        .into_iter()
        .map(TraceItem::from)
        .collect();

    Ok(Json(items))
}
