//! JSON API over the quote workflow.
//!
//! The caller identity arrives in `x-actor-id` / `x-actor-role` headers
//! (authentication itself lives at the gateway in front of this service).
//! Business-rule failures map onto 4xx codes; infrastructure failures onto
//! 5xx.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use dealdesk_core::domain::lead::LeadId;
use dealdesk_core::domain::principal::{Principal, Role};
use dealdesk_core::domain::quote::{Quote, QuoteId, QuoteNumber, QuoteStatus};
use dealdesk_core::errors::{ApplicationError, DomainError};
use dealdesk_core::pricing::{DiscountMode, QuoteTotals};

use crate::render::DocumentRenderer;
use crate::workflow::{LineItemInput, NewQuoteInput, QuoteWorkflow};

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<QuoteWorkflow>,
    pub renderer: Arc<DocumentRenderer>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/quotes", post(create_quote))
        .route("/api/v1/quotes/{id}", get(get_quote))
        .route("/api/v1/quotes/{id}/clone", post(clone_quote))
        .route("/api/v1/quotes/{id}/approve", post(approve_quote))
        .route("/api/v1/quotes/{id}/reject", post(reject_quote))
        .route("/api/v1/quotes/{id}/status", post(update_status))
        .route("/api/v1/quotes/{id}/document", get(get_document))
        .route("/api/v1/leads/{lead_id}/quotes", get(list_lead_quotes))
        .route("/api/v1/leads/{lead_id}/main-quote", post(set_main_quote))
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let status = match &error {
            ApplicationError::Domain(DomainError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApplicationError::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApplicationError::Domain(DomainError::InvalidTransition { .. }) => {
                StatusCode::CONFLICT
            }
            ApplicationError::Domain(DomainError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
            ApplicationError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApplicationError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: error.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, ApiError> {
    let user_id = headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("missing x-actor-id header"))?;
    let role = headers
        .get("x-actor-role")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("missing x-actor-role header"))?
        .parse::<Role>()
        .map_err(|error| ApiError::bad_request(error.to_string()))?;
    Ok(Principal::new(user_id, role))
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub product: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    #[serde(default)]
    pub vat_percent: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuoteRequest {
    pub lead_id: String,
    pub currency: String,
    pub customer_name: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub discount_mode: DiscountMode,
    #[serde(default)]
    pub discount_value: Decimal,
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: QuoteStatus,
}

#[derive(Debug, Deserialize)]
pub struct MainQuoteRequest {
    pub quote_number: String,
}

fn quote_body(quote: &Quote) -> serde_json::Value {
    serde_json::json!({ "quote": quote })
}

fn quote_with_totals_body(quote: &Quote, totals: &QuoteTotals) -> serde_json::Value {
    serde_json::json!({ "quote": quote, "totals": totals.rounded() })
}

async fn create_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateQuoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = principal_from_headers(&headers)?;
    let correlation = correlation_id(&headers);

    let input = NewQuoteInput {
        lead_id: LeadId(request.lead_id),
        currency: request.currency,
        customer_name: request.customer_name,
        contact_person: request.contact_person,
        phone: request.phone,
        email: request.email,
        address: request.address,
        discount_mode: request.discount_mode,
        discount_value: request.discount_value,
        items: request
            .items
            .into_iter()
            .map(|line| LineItemInput {
                product: line.product,
                description: line.description,
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                margin_percent: line.margin_percent,
                vat_percent: line.vat_percent,
            })
            .collect(),
    };

    let quote = state.workflow.create_quote(&caller, input, &correlation).await?;
    Ok((StatusCode::CREATED, Json(quote_body(&quote))))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    principal_from_headers(&headers)?;
    let (quote, totals) = state.workflow.quote_with_totals(&QuoteId(id)).await?;
    Ok(Json(quote_with_totals_body(&quote, &totals)))
}

async fn clone_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = principal_from_headers(&headers)?;
    let correlation = correlation_id(&headers);
    let clone = state.workflow.clone_quote(&caller, &QuoteId(id), &correlation).await?;
    Ok((StatusCode::CREATED, Json(quote_body(&clone))))
}

async fn approve_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = principal_from_headers(&headers)?;
    let correlation = correlation_id(&headers);
    let quote = state.workflow.approve(&caller, &QuoteId(id), &correlation).await?;
    Ok(Json(quote_body(&quote)))
}

async fn reject_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RejectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = principal_from_headers(&headers)?;
    let correlation = correlation_id(&headers);
    let quote =
        state.workflow.reject(&caller, &QuoteId(id), &request.note, &correlation).await?;
    Ok(Json(quote_body(&quote)))
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = principal_from_headers(&headers)?;
    let correlation = correlation_id(&headers);
    let quote = state
        .workflow
        .update_status(&caller, &QuoteId(id), request.status, &correlation)
        .await?;
    Ok(Json(quote_body(&quote)))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = principal_from_headers(&headers)?;
    let (quote, totals) = state.workflow.quote_for_document(&caller, &QuoteId(id)).await?;
    let html = state.renderer.render_quote(&quote, &totals).map_err(|error| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: error.to_string(),
    })?;
    Ok(Html(html))
}

async fn list_lead_quotes(
    State(state): State<AppState>,
    Path(lead_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    principal_from_headers(&headers)?;
    let quotes = state.workflow.quotes_for_lead(&LeadId(lead_id)).await?;
    Ok(Json(serde_json::json!({ "quotes": quotes })))
}

async fn set_main_quote(
    State(state): State<AppState>,
    Path(lead_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<MainQuoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = principal_from_headers(&headers)?;
    let correlation = correlation_id(&headers);
    let lead = state
        .workflow
        .set_main_quote(
            &caller,
            &LeadId(lead_id),
            &QuoteNumber(request.quote_number),
            &correlation,
        )
        .await?;
    Ok(Json(serde_json::json!({ "lead": lead })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use dealdesk_core::audit::InMemoryAuditSink;
    use dealdesk_core::domain::lead::{Lead, LeadId};
    use dealdesk_db::{InMemoryLeadRepository, InMemoryQuoteRepository, LeadRepository};

    use crate::render::DocumentRenderer;
    use crate::workflow::QuoteWorkflow;

    use super::{router, AppState};

    async fn test_state() -> AppState {
        let leads = Arc::new(InMemoryLeadRepository::default());
        let now = Utc::now();
        leads
            .save(&Lead {
                id: LeadId("lead-1".to_string()),
                company: "Acme Networks".to_string(),
                main_quote_number: None,
                shared_with: None,
                share_percent: Decimal::ZERO,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed lead");

        AppState {
            workflow: Arc::new(QuoteWorkflow::new(
                Arc::new(InMemoryQuoteRepository::default()),
                leads,
                Arc::new(InMemoryAuditSink::default()),
            )),
            renderer: Arc::new(DocumentRenderer::with_embedded_templates("Dealdesk")),
        }
    }

    fn create_request(actor: &str, role: &str, margin: &str) -> Request<Body> {
        let body = serde_json::json!({
            "lead_id": "lead-1",
            "currency": "USD",
            "customer_name": "Acme Networks",
            "discount_mode": "percent",
            "discount_value": "0",
            "items": [{
                "product": "Firewall appliance",
                "quantity": "2",
                "unit_cost": "100.00",
                "margin_percent": margin,
                "vat_percent": "5"
            }]
        });
        Request::builder()
            .method("POST")
            .uri("/api/v1/quotes")
            .header("content-type", "application/json")
            .header("x-actor-id", actor)
            .header("x-actor-role", role)
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn create_returns_created_with_the_assigned_number() {
        let app = router(test_state().await);

        let response =
            app.oneshot(create_request("u-rep", "member", "12")).await.expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["quote"]["status"], "Draft");
        assert!(body["quote"]["quote_number"].as_str().expect("number").starts_with("Q-"));
    }

    #[tokio::test]
    async fn requests_without_actor_headers_are_rejected() {
        let app = router(test_state().await);

        let request = Request::builder()
            .method("GET")
            .uri("/api/v1/quotes/qt-1")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_quotes_map_to_not_found() {
        let app = router(test_state().await);

        let request = Request::builder()
            .method("GET")
            .uri("/api/v1/quotes/qt-missing")
            .header("x-actor-id", "u-rep")
            .header("x-actor-role", "member")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn member_approval_attempts_are_forbidden() {
        let state = test_state().await;
        let app = router(state.clone());

        let created =
            app.clone().oneshot(create_request("u-rep", "member", "4.5")).await.expect("create");
        let body = body_json(created).await;
        let quote_id = body["quote"]["id"].as_str().expect("id").to_string();

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/quotes/{quote_id}/approve"))
            .header("x-actor-id", "u-rep")
            .header("x-actor-role", "member")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn approving_a_draft_quote_is_a_conflict() {
        let state = test_state().await;
        let app = router(state.clone());

        let created =
            app.clone().oneshot(create_request("u-admin", "admin", "12")).await.expect("create");
        let body = body_json(created).await;
        let quote_id = body["quote"]["id"].as_str().expect("id").to_string();

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/quotes/{quote_id}/approve"))
            .header("x-actor-id", "u-admin")
            .header("x-actor-role", "admin")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn document_download_is_gated_until_approval() {
        let state = test_state().await;
        let app = router(state.clone());

        let created =
            app.clone().oneshot(create_request("u-rep", "member", "4.5")).await.expect("create");
        let body = body_json(created).await;
        let quote_id = body["quote"]["id"].as_str().expect("id").to_string();

        let member_request = Request::builder()
            .method("GET")
            .uri(format!("/api/v1/quotes/{quote_id}/document"))
            .header("x-actor-id", "u-rep")
            .header("x-actor-role", "member")
            .body(Body::empty())
            .expect("request");
        let response = app.clone().oneshot(member_request).await.expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin_request = Request::builder()
            .method("GET")
            .uri(format!("/api/v1/quotes/{quote_id}/document"))
            .header("x-actor-id", "u-admin")
            .header("x-actor-role", "admin")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(admin_request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn lead_quote_listing_returns_everything_on_the_lead() {
        let state = test_state().await;
        let app = router(state.clone());

        app.clone().oneshot(create_request("u-rep", "member", "12")).await.expect("create 1");
        app.clone().oneshot(create_request("u-rep", "member", "4.5")).await.expect("create 2");

        let request = Request::builder()
            .method("GET")
            .uri("/api/v1/leads/lead-1/quotes")
            .header("x-actor-id", "u-rep")
            .header("x-actor-role", "member")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["quotes"].as_array().expect("quotes").len(), 2);
    }

    #[tokio::test]
    async fn main_quote_selection_round_trips_through_the_api() {
        let state = test_state().await;
        let app = router(state.clone());

        let created =
            app.clone().oneshot(create_request("u-admin", "admin", "12")).await.expect("create");
        let body = body_json(created).await;
        let number = body["quote"]["quote_number"].as_str().expect("number").to_string();

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/leads/lead-1/main-quote")
            .header("content-type", "application/json")
            .header("x-actor-id", "u-admin")
            .header("x-actor-role", "admin")
            .body(Body::from(
                serde_json::json!({ "quote_number": number }).to_string(),
            ))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["lead"]["main_quote_number"].as_str(), Some(number.as_str()));
    }
}
