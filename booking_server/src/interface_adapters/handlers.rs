use std::collections::HashMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::domain::errors::{AuthError, BookingError, StoreError};
use crate::domain::lockout::CounterCookie;
use crate::interface_adapters::protocol::{
    DeleteBookingResponse, ErrorResponse, LoginRequest, LoginResponse, PingResponse,
    SearchParams, SearchResponse, UpdateContextRequest, UpdateContextResponse,
};
use crate::interface_adapters::state::{AppState, SystemClock};
use crate::use_cases::delete_booking::{DeleteBookingUseCase, DeleteOutcome};
use crate::use_cases::login::{LoginResult, LoginUseCase};
use crate::use_cases::search_bookings::SearchBookingsUseCase;
use crate::use_cases::update_context::UpdateContextUseCase;

pub const COUNTER_COOKIE: &str = "admin_try";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

type ErrorReply = (StatusCode, Json<ErrorResponse>);

// Handler for admin login. The body is parsed after the lock check so a
// locked client always sees 423.
#[tracing::instrument(name = "login", skip_all)]
pub async fn login(State(state): State<AppState>, jar: CookieJar, body: Bytes) -> Response {
    let use_case = LoginUseCase {
        clock: SystemClock,
        codec: state.codec.clone(),
        guard: state.guard.clone(),
        account: state.admin.clone(),
        session_ttl_secs: state.session_ttl_secs,
    };
    let counter = jar.get(COUNTER_COOKIE).map(|cookie| cookie.value());

    let response = match use_case.execute(parse_login_body(&body), counter) {
        Ok(response) => response,
        Err(err) => return map_auth_error(err, AuthErrorContext::Login).into_response(),
    };
    let cookie = counter_cookie_header(&response.cookie);

    match response.result {
        LoginResult::Authenticated { token, expires_at } => {
            info!(expires_at, "admin login succeeded");
            with_cookie(
                (StatusCode::OK, Json(LoginResponse { token, expires_at })).into_response(),
                cookie,
            )
        }
        LoginResult::InvalidCredentials {
            attempts,
            max_attempts,
        } => {
            warn!(attempts, max_attempts, "admin login rejected");
            let message = format!("帳號或密碼錯誤（已嘗試 {attempts}/{max_attempts} 次）");
            let body = ErrorResponse {
                attempts: Some(attempts),
                max_attempts: Some(max_attempts),
                ..ErrorResponse::new("Invalid credentials")
                    .with_message(message)
            };
            let response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
            with_cookie(response, cookie)
        }
        LoginResult::Locked { remaining_secs } => {
            warn!(remaining_secs, "admin login locked");
            let minutes = remaining_secs.div_ceil(60);
            let body = ErrorResponse {
                retry_after_secs: Some(remaining_secs),
                ..ErrorResponse::new("Locked")
                    .with_message(format!("登入已鎖定，請 {minutes} 分鐘後再試"))
            };
            let mut response = (StatusCode::LOCKED, Json(body)).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(remaining_secs));
            with_cookie(response, cookie)
        }
    }
}

// An empty body is treated as empty credentials; anything else must be JSON.
fn parse_login_body(body: &[u8]) -> Option<LoginRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Some(LoginRequest::default());
    }
    serde_json::from_slice(body).ok()
}

fn counter_cookie_header(cookie: &CounterCookie) -> Option<HeaderValue> {
    let value = format!(
        "{COUNTER_COOKIE}={}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={}",
        cookie.value, cookie.max_age_secs
    );
    HeaderValue::from_str(&value).ok()
}

fn with_cookie(mut response: Response, cookie: Option<HeaderValue>) -> Response {
    if let Some(cookie) = cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

// Handler for booking search via query string.
#[tracing::instrument(name = "search_bookings", skip_all)]
pub async fn search_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<SearchResponse>, ErrorReply> {
    let params = SearchParams::from_map(&query_map(query));
    run_search(&state, &headers, params).await
}

// Handler for booking search via JSON body; body keys override the query string.
#[tracing::instrument(name = "search_bookings", skip_all)]
pub async fn search_bookings_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<SearchResponse>, ErrorReply> {
    let body = parse_json_object(&body)?;
    let params = SearchParams::merged(query_map(query), body);
    run_search(&state, &headers, params).await
}

async fn run_search(
    state: &AppState,
    headers: &HeaderMap,
    params: SearchParams,
) -> Result<Json<SearchResponse>, ErrorReply> {
    let use_case = SearchBookingsUseCase {
        clock: SystemClock,
        codec: state.codec.clone(),
        store: state.store.clone(),
        compiler: state.compiler.clone(),
    };

    let result = use_case
        .execute(admin_token(headers), params.into_filter())
        .await
        .map_err(|err| map_booking_error(err, BookingErrorContext::Search))?;

    Ok(Json(SearchResponse {
        count: result.records.len(),
        items: result.records,
        next_cursor: result.next_cursor,
    }))
}

// Handler for rewriting one booking's context.
#[tracing::instrument(skip_all, fields(public_id = %public_id))]
pub async fn update_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
    body: Bytes,
) -> Result<Json<UpdateContextResponse>, ErrorReply> {
    let payload: UpdateContextRequest = serde_json::from_slice(&body)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid JSON"))?;

    let use_case = UpdateContextUseCase {
        clock: SystemClock,
        codec: state.codec.clone(),
        store: state.store.clone(),
        normalizer: state.compiler.normalizer(),
    };

    let item = use_case
        .execute(admin_token(&headers), &public_id, payload.context)
        .await
        .map_err(|err| map_booking_error(err, BookingErrorContext::UpdateContext))?;

    info!("booking context updated");
    Ok(Json(UpdateContextResponse { ok: true, item }))
}

// Handler for deleting one booking.
#[tracing::instrument(skip_all, fields(public_id = %public_id))]
pub async fn delete_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> Result<Json<DeleteBookingResponse>, ErrorReply> {
    let use_case = DeleteBookingUseCase {
        clock: SystemClock,
        codec: state.codec.clone(),
        store: state.store.clone(),
    };

    let result = use_case
        .execute(admin_token(&headers), &public_id)
        .await
        .map_err(|err| map_booking_error(err, BookingErrorContext::Delete))?;

    match result {
        DeleteOutcome::Deleted { public_id } => {
            info!(deleted_id = %public_id, "booking deleted");
            Ok(Json(DeleteBookingResponse {
                success: true,
                deleted_id: public_id,
            }))
        }
        DeleteOutcome::NotFound { attempted_ids } => {
            warn!(?attempted_ids, "booking delete found nothing");
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    attempted_ids: Some(attempted_ids),
                    ..ErrorResponse::new("Not found")
                        .with_message("無法刪除：可能 public_id 錯誤或不存在")
                }),
            ))
        }
    }
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        ok: true,
        now: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn admin_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
        })
}

fn query_map(query: HashMap<String, String>) -> Map<String, Value> {
    query
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

fn parse_json_object(body: &[u8]) -> Result<Map<String, Value>, ErrorReply> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        _ => Err(error_response(StatusCode::BAD_REQUEST, "Invalid JSON")),
    }
}

// Helper to build a JSON error response.
fn error_response(status: StatusCode, error: &str) -> ErrorReply {
    (status, Json(ErrorResponse::new(error)))
}

// Maps domain errors to HTTP responses by endpoint context.
enum AuthErrorContext {
    Login,
}

fn map_auth_error(err: AuthError, context: AuthErrorContext) -> ErrorReply {
    match context {
        AuthErrorContext::Login => match err {
            AuthError::MalformedRequest => error_response(StatusCode::BAD_REQUEST, "Invalid JSON"),
            AuthError::InvalidToken => error_response(StatusCode::UNAUTHORIZED, "Unauthorized"),
            AuthError::Signing(err) => {
                error!(error = %err, "failed to sign login token");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Admin auth not configured",
                )
            }
        },
    }
}

enum BookingErrorContext {
    Search,
    UpdateContext,
    Delete,
}

fn map_booking_error(err: BookingError, context: BookingErrorContext) -> ErrorReply {
    match err {
        BookingError::Unauthorized => error_response(StatusCode::UNAUTHORIZED, "Unauthorized"),
        BookingError::InvalidInput(message) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid request").with_message(message)),
        ),
        BookingError::NotFound => {
            let body = ErrorResponse::new("Not found")
                .with_message("找不到這筆預約資料");
            (StatusCode::NOT_FOUND, Json(body))
        }
        BookingError::Store(err) => {
            error!(error = %err, "document store call failed");
            let (status, label) = match context {
                BookingErrorContext::Search => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Document store search failed")
                }
                BookingErrorContext::UpdateContext => (StatusCode::BAD_GATEWAY, "Update failed"),
                BookingErrorContext::Delete => (StatusCode::BAD_GATEWAY, "Delete failed"),
            };
            (
                status,
                Json(ErrorResponse::new(label).with_detail(store_detail(err))),
            )
        }
    }
}

// Upstream bodies are echoed for operators; transport errors only by kind.
fn store_detail(err: StoreError) -> String {
    match err {
        StoreError::Upstream { status, body } => format!("upstream {status}: {body}"),
        other => other.to_string(),
    }
}
