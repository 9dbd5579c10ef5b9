//! Axum HTTP surface for the issue and relay flows.
//!
//! | Route | Method | Success body |
//! | --- | --- | --- |
//! | `/api/create-link` | `POST` | `{ "disguisedId": "..." }` |
//! | `/api/send-message` | `POST` | `{ "message": "Message sent successfully!" }` |
//! | `/api/stats` | `GET` | `{ "count": 0 }` |
//! | `/health` | `GET` | empty `200` |
//!
//! Every failure is a JSON `{ "error": "..." }` body. Client-caused outcomes carry the error's own
//! message; upstream and internal failures get a generic one.

// std
use std::{io, net::SocketAddr};
// crates.io
use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::{HeaderValue, StatusCode, header::RETRY_AFTER},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	config::ServiceConfig,
	error::ConfigError,
	flows::{CooldownMode, RelayGateway, TokenIssuer},
	store::LinkStore,
	upstream::{ReqwestUpstreamClient, UpstreamClient},
};

/// Body returned by a successful relay.
pub const MESSAGE_SENT: &str = "Message sent successfully!";

/// Gateway over a type-erased upstream client, as held by [`AppState`].
pub type DynRelayGateway = RelayGateway<dyn UpstreamClient>;

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
	/// Store backing both flows and the stats route.
	pub store: Arc<dyn LinkStore>,
	/// Token issuer.
	pub issuer: TokenIssuer,
	/// Relay gateway.
	pub gateway: DynRelayGateway,
}
impl AppState {
	/// Wires an issuer and gateway around one store and upstream client.
	pub fn new(
		store: Arc<dyn LinkStore>,
		upstream: Arc<dyn UpstreamClient>,
		mode: CooldownMode,
	) -> Self {
		let issuer = TokenIssuer::new(store.clone());
		let gateway = RelayGateway::new(store.clone(), upstream).with_cooldown_mode(mode);

		Self { store, issuer, gateway }
	}

	/// Builds the state from service configuration with a reqwest upstream client.
	pub fn from_config(
		store: Arc<dyn LinkStore>,
		config: &ServiceConfig,
	) -> Result<Self, ConfigError> {
		let upstream: Arc<dyn UpstreamClient> =
			Arc::new(ReqwestUpstreamClient::from_config(config)?);

		Ok(Self::new(store, upstream, config.cooldown_mode))
	}
}
impl Debug for AppState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppState")
			.field("issuer", &self.issuer)
			.field("gateway", &self.gateway)
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CreateLinkRequest {
	#[serde(alias = "nglUsername")]
	provider_username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkResponse {
	disguised_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SendMessageRequest {
	disguised_id: String,
	message_text: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
	message: &'static str,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
	count: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: String,
}

/// Flow error rendered as a JSON response; `internal` replaces the message of system failures.
struct ApiError {
	error: Error,
	internal: &'static str,
}
impl ApiError {
	fn issue(error: Error) -> Self {
		Self { error, internal: "Something went wrong while creating the link." }
	}

	fn relay(error: Error) -> Self {
		Self { error, internal: "Something went wrong while sending the message." }
	}

	fn stats(error: Error) -> Self {
		Self { error, internal: "Something went wrong while reading the usage counter." }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = status_of(&self.error);
		let message = match &self.error {
			Error::Upstream(_) => "Failed to deliver the message to the provider.".to_owned(),
			_ if status == StatusCode::INTERNAL_SERVER_ERROR => self.internal.to_owned(),
			e => e.to_string(),
		};
		let mut response = (status, Json(ErrorBody { error: message })).into_response();

		if let Error::RateLimited { remaining_seconds } = self.error {
			response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(remaining_seconds));
		}

		response
	}
}

/// Maps a flow error to its HTTP status.
pub fn status_of(error: &Error) -> StatusCode {
	match error {
		Error::InvalidInput { .. } | Error::TokenExpired { .. } => StatusCode::BAD_REQUEST,
		Error::TokenNotFound => StatusCode::NOT_FOUND,
		Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
		Error::Upstream(_) | Error::StoreConflict | Error::Storage(_) | Error::Config(_) =>
			StatusCode::INTERNAL_SERVER_ERROR,
	}
}

/// Builds the router for `state`.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/api/create-link", post(create_link).fallback(method_not_allowed))
		.route("/api/send-message", post(send_message).fallback(method_not_allowed))
		.route("/api/stats", get(stats))
		.route("/health", get(healthcheck))
		.with_state(state)
}

/// Binds `addr` and serves [`router`] until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> io::Result<()> {
	let listener = TcpListener::bind(addr).await?;

	tracing::info!(addr = %listener.local_addr()?, "Listening for requests.");

	axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => tracing::info!("Shutdown signal received."),
		Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C; shutting down."),
	}
}

async fn healthcheck() -> impl IntoResponse {
	StatusCode::OK
}

async fn method_not_allowed() -> impl IntoResponse {
	(StatusCode::METHOD_NOT_ALLOWED, Json(ErrorBody { error: "Method not allowed.".into() }))
}

async fn create_link(
	State(state): State<AppState>,
	payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<Json<CreateLinkResponse>, ApiError> {
	let request = payload.map(|Json(request)| request).unwrap_or_default();
	let token = state
		.issuer
		.issue_token(&request.provider_username)
		.await
		.map_err(ApiError::issue)?;

	Ok(Json(CreateLinkResponse { disguised_id: token.into() }))
}

async fn send_message(
	State(state): State<AppState>,
	payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
	let request = payload.map(|Json(request)| request).unwrap_or_default();

	state
		.gateway
		.relay_message(&request.disguised_id, &request.message_text)
		.await
		.map_err(ApiError::relay)?;

	Ok(Json(MessageResponse { message: MESSAGE_SENT }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
	let count = state.store.ensure_counter().await.map_err(|e| ApiError::stats(e.into()))?;

	Ok(Json(StatsResponse { count }))
}
