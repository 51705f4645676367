//! HTTP cart API. Every route is a thin transport for one cart command against
//! the caller's session.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post, put}, Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::{CartLine, ProductSnapshot};
use crate::domain::events::CartEvent;
use crate::domain::value_objects::LineId;
use crate::session::{CartSession, SessionRegistry};
use crate::storage::FileStore;
use crate::CartError;

#[derive(Clone)] pub struct AppState { pub registry: Arc<SessionRegistry> }

pub fn router(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-cart"})) }))
        .route("/api/v1/cart", post(create_cart))
        .route("/api/v1/cart/:session", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/:session/items", post(add_item))
        .route("/api/v1/cart/:session/items/:line_id", put(update_quantity).delete(remove_item))
        .route("/api/v1/checkout/:session/complete", post(complete_checkout))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(AppState { registry })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub session_id: Uuid,
    pub lines: Vec<CartLine>,
    pub total_quantity: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_value: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl CartView {
    fn of(session_id: Uuid, session: &CartSession<FileStore>) -> Self {
        let state = session.state();
        Self {
            session_id, lines: state.lines().to_vec(), total_quantity: state.total_quantity(),
            total_value: state.total_value(), updated_at: session.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)] pub struct CommandResponse { pub cart: CartView, pub events: Vec<CartEvent> }

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    #[validate]
    pub product: ProductSnapshot,
    #[validate(range(min = 1, max = 999))]
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)] pub struct UpdateQuantityRequest { pub quantity: i64 }

type ApiError = (StatusCode, String);

fn error_response(e: CartError) -> ApiError {
    let status = match &e {
        CartError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        CartError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

fn session_id(raw: &str) -> Result<Uuid, ApiError> { SessionRegistry::parse_id(raw).map_err(error_response) }

async fn create_cart(State(s): State<AppState>) -> Result<(StatusCode, Json<CartView>), ApiError> {
    let registry = Arc::clone(&s.registry);
    let view = tokio::task::spawn_blocking(move || {
        let id = registry.create_session();
        registry.with_session(id, |session| CartView::of(id, session))
    })
    .await
    .map_err(|e| error_response(e.into()))?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<Json<CartView>, ApiError> {
    let id = session_id(&session)?;
    let view = s.registry.run(id, move |session| CartView::of(id, session)).await.map_err(error_response)?;
    Ok(Json(view))
}

async fn add_item(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddItemRequest>) -> Result<Json<CommandResponse>, ApiError> {
    let id = session_id(&session)?;
    r.validate().map_err(|e| error_response(CartError::Validation(e.to_string())))?;
    let quantity = r.quantity.unwrap_or(1);
    let response = s.registry.run(id, move |session| {
        let events = session.add_item(r.product, quantity);
        CommandResponse { cart: CartView::of(id, session), events }
    }).await.map_err(error_response)?;
    Ok(Json(response))
}

async fn update_quantity(State(s): State<AppState>, Path((session, line_id)): Path<(String, String)>, Json(r): Json<UpdateQuantityRequest>) -> Result<Json<CommandResponse>, ApiError> {
    let id = session_id(&session)?;
    let line_id = LineId::from(line_id);
    let response = s.registry.run(id, move |session| {
        let events = session.update_quantity(&line_id, r.quantity);
        CommandResponse { cart: CartView::of(id, session), events }
    }).await.map_err(error_response)?;
    Ok(Json(response))
}

async fn remove_item(State(s): State<AppState>, Path((session, line_id)): Path<(String, String)>) -> Result<Json<CommandResponse>, ApiError> {
    let id = session_id(&session)?;
    let line_id = LineId::from(line_id);
    let response = s.registry.run(id, move |session| {
        let events = session.remove_item(&line_id);
        CommandResponse { cart: CartView::of(id, session), events }
    }).await.map_err(error_response)?;
    Ok(Json(response))
}

async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<StatusCode, ApiError> {
    let id = session_id(&session)?;
    s.registry.run(id, |session| { session.clear(); }).await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_checkout(State(s): State<AppState>, Path(session): Path<String>) -> Result<StatusCode, ApiError> {
    let id = session_id(&session)?;
    s.registry.run(id, |session| { session.complete_checkout(); }).await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use crate::session::RegistryConfig;

    fn app(dir: &std::path::Path) -> Router {
        router(Arc::new(SessionRegistry::new(RegistryConfig { storage_dir: dir.to_path_buf(), ..Default::default() })))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => { request = request.header("content-type", "application/json"); Body::from(v.to_string()) }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn product(stock: u32) -> Value {
        json!({"productId": "KN-1", "variantKey": "", "unitPrice": 10, "currency": "USD", "stockCeiling": stock, "minOrderQuantity": 1, "name": "Bushcraft Knife", "image": null})
    }

    #[tokio::test]
    async fn test_cart_flow() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, body) = send(&app, "POST", "/api/v1/cart", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["sessionId"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "POST", &format!("/api/v1/cart/{id}/items"), Some(json!({"product": product(3), "quantity": 2}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cart"]["totalValue"], json!(20.0));

        let (_, body) = send(&app, "POST", &format!("/api/v1/cart/{id}/items"), Some(json!({"product": product(3), "quantity": 5}))).await;
        assert_eq!(body["cart"]["lines"][0]["quantity"], json!(3));
        assert_eq!(body["events"][1]["type"], json!("quantityClamped"));

        let (_, body) = send(&app, "PUT", &format!("/api/v1/cart/{id}/items/KN-1"), Some(json!({"quantity": 1}))).await;
        assert_eq!(body["cart"]["totalQuantity"], json!(1));

        let (_, body) = send(&app, "DELETE", &format!("/api/v1/cart/{id}/items/KN-1"), None).await;
        assert_eq!(body["cart"]["lines"], json!([]));
        assert_eq!(body["cart"]["totalValue"], json!(0.0));
    }

    #[tokio::test]
    async fn test_checkout_clears_cart() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let id = Uuid::now_v7();

        send(&app, "POST", &format!("/api/v1/cart/{id}/items"), Some(json!({"product": product(5)}))).await;
        let (status, _) = send(&app, "POST", &format!("/api/v1/checkout/{id}/complete"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(&app, "GET", &format!("/api/v1/cart/{id}"), None).await;
        assert_eq!(body["totalQuantity"], json!(0));
    }

    #[tokio::test]
    async fn test_hyphenated_products_get_own_lines() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let id = Uuid::now_v7();

        let mut sheath = product(5);
        sheath["productId"] = json!("KN");
        sheath["variantKey"] = json!("1");
        sheath["unitPrice"] = json!(5);
        send(&app, "POST", &format!("/api/v1/cart/{id}/items"), Some(json!({"product": product(5)}))).await;
        let (_, body) = send(&app, "POST", &format!("/api/v1/cart/{id}/items"), Some(json!({"product": sheath}))).await;
        assert_eq!(body["cart"]["lines"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["cart"]["totalValue"], json!(15.0));

        let (_, body) = send(&app, "DELETE", &format!("/api/v1/cart/{id}/items/KN~1"), None).await;
        assert_eq!(body["cart"]["lines"][0]["lineId"], json!("KN-1"));
        assert_eq!(body["cart"]["totalValue"], json!(10.0));
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, _) = send(&app, "GET", "/api/v1/cart/not-a-session", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let id = Uuid::now_v7();
        let mut bad = product(5);
        bad["currency"] = json!("DOLLARS");
        let (status, _) = send(&app, "POST", &format!("/api/v1/cart/{id}/items"), Some(json!({"product": bad}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, "POST", &format!("/api/v1/cart/{id}/items"), Some(json!({"product": product(5), "quantity": 0}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
