//! HTTP server for the sweeper API.
//!
//! Exposes a health check, a manual sweep trigger and the sweep settings.

use crate::apis::{self, error::APIError, sweep::SweepResponse};
use axum::{
	extract::State,
	response::Json,
	routing::{get, post},
	Router,
};
use serde_json::{json, Value};
use sweeper_config::ApiConfig;
use sweeper_core::SweepScheduler;
use sweeper_types::{RawSettings, SweepSettings};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Scheduler used for manual triggers; shares the run lock with the
	/// periodic loop.
	pub scheduler: SweepScheduler,
}

/// Builds the router with all routes and middleware.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(handle_health))
		.nest(
			"/api",
			Router::new()
				.route("/sweeps", post(handle_sweep))
				.route("/settings", get(handle_get_settings).put(handle_put_settings)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(state)
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	scheduler: SweepScheduler,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { scheduler });

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Sweeper API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

async fn handle_health(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"status": "ok",
		"sweep_running": state.scheduler.is_running(),
	}))
}

/// Handles POST /api/sweeps requests.
///
/// Returns 409 when a sweep is already running.
async fn handle_sweep(State(state): State<AppState>) -> Result<Json<SweepResponse>, APIError> {
	match apis::sweep::trigger_sweep(&state.scheduler).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Manual sweep rejected: {}", e);
			Err(e)
		},
	}
}

async fn handle_get_settings(
	State(state): State<AppState>,
) -> Result<Json<SweepSettings>, APIError> {
	apis::settings::get_settings(state.scheduler.engine().settings())
		.await
		.map(Json)
}

/// Handles PUT /api/settings requests, returning the normalized settings.
async fn handle_put_settings(
	State(state): State<AppState>,
	Json(raw): Json<RawSettings>,
) -> Result<Json<SweepSettings>, APIError> {
	apis::settings::update_settings(state.scheduler.engine().settings(), raw)
		.await
		.map(Json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use axum::body::{to_bytes, Body};
	use axum::http::{Request, StatusCode};
	use chrono::{Duration as ChronoDuration, Utc};
	use std::sync::Arc;
	use std::time::Duration;
	use sweeper_core::{EventBus, SweepEngine, SweepOptions};
	use sweeper_orders::implementations::memory::MemoryOrderRepository;
	use sweeper_orders::{OrderError, OrderQuery, OrderRepository};
	use sweeper_storage::implementations::memory::MemoryStorage;
	use sweeper_storage::{SettingsStore, StorageService};
	use sweeper_types::{ConfigSchema, Order, OrderId, OrderStatus, StatusKey};
	use tokio::sync::Notify;
	use tower::ServiceExt;

	fn scheduler_with(orders: Arc<dyn OrderRepository>) -> SweepScheduler {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let engine = SweepEngine::new(
			SettingsStore::new(storage),
			orders,
			SweepOptions::default(),
			EventBus::new(100),
		);
		SweepScheduler::new(engine, Duration::from_secs(3600), Duration::from_secs(300))
	}

	async fn body_json(response: axum::response::Response) -> Value {
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	/// Repository whose availability check blocks until released.
	struct GatedRepository {
		inner: MemoryOrderRepository,
		gate: Arc<Notify>,
	}

	#[async_trait]
	impl OrderRepository for GatedRepository {
		async fn is_available(&self) -> bool {
			self.gate.notified().await;
			true
		}

		async fn query(&self, query: &OrderQuery) -> Result<Vec<Order>, OrderError> {
			self.inner.query(query).await
		}

		async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
			self.inner.get(id).await
		}

		async fn transition(
			&self,
			id: OrderId,
			target: OrderStatus,
			note: Option<String>,
		) -> Result<(), OrderError> {
			self.inner.transition(id, target, note).await
		}

		async fn upsert(&self, order: Order) -> Result<(), OrderError> {
			self.inner.upsert(order).await
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	#[tokio::test]
	async fn test_health() {
		let app = router(AppState {
			scheduler: scheduler_with(Arc::new(MemoryOrderRepository::new())),
		});

		let response = app
			.oneshot(Request::get("/health").body(Body::empty()).unwrap())
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["status"], "ok");
		assert_eq!(body["sweep_running"], false);
	}

	#[tokio::test]
	async fn test_manual_sweep_returns_result() {
		let repo = MemoryOrderRepository::with_orders([Order::new(
			5,
			OrderStatus::Pending,
			Utc::now() - ChronoDuration::hours(30),
		)]);
		let app = router(AppState {
			scheduler: scheduler_with(Arc::new(repo.clone())),
		});

		let response = app
			.oneshot(Request::post("/api/sweeps").body(Body::empty()).unwrap())
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["result"]["per_status"]["pending"]["cancelled"], 1);
		assert!(body["message"]
			.as_str()
			.unwrap()
			.starts_with("Auto-cancel task executed."));
		assert_eq!(repo.get(OrderId(5)).await.unwrap().status, OrderStatus::Cancelled);
	}

	#[tokio::test]
	async fn test_manual_sweep_conflicts_with_running_sweep() {
		let gate = Arc::new(Notify::new());
		let scheduler = scheduler_with(Arc::new(GatedRepository {
			inner: MemoryOrderRepository::new(),
			gate: gate.clone(),
		}));
		let app = router(AppState {
			scheduler: scheduler.clone(),
		});

		let running = tokio::spawn({
			let scheduler = scheduler.clone();
			async move { scheduler.run_now().await }
		});
		while !scheduler.is_running() {
			tokio::task::yield_now().await;
		}

		let response = app
			.oneshot(Request::post("/api/sweeps").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::CONFLICT);
		let body = body_json(response).await;
		assert_eq!(body["error"], "SWEEP_IN_PROGRESS");

		gate.notify_one();
		assert!(running.await.unwrap().is_ok());
	}

	#[tokio::test]
	async fn test_settings_round_trip() {
		let scheduler = scheduler_with(Arc::new(MemoryOrderRepository::new()));
		let app = router(AppState {
			scheduler: scheduler.clone(),
		});

		let response = app
			.clone()
			.oneshot(Request::get("/api/settings").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["enabled"], true);
		assert_eq!(body["hours_by_status"]["on-hold"], 72);

		let update = json!({
			"enabled": true,
			"statuses": ["on-hold", "shipped", "on-hold"],
			"hours": { "on-hold": "0", "pending": "abc" },
			"note_template": "Stale <b>order</b>\n{order_id}",
		});
		let response = app
			.oneshot(
				Request::put("/api/settings")
					.header("content-type", "application/json")
					.body(Body::from(update.to_string()))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["target_statuses"], json!(["on-hold"]));
		assert_eq!(body["hours_by_status"]["on-hold"], 1);
		assert_eq!(body["hours_by_status"]["pending"], 24);
		assert_eq!(body["add_note"], false);
		assert_eq!(body["note_template"], "Stale order {order_id}");

		let stored = scheduler.engine().settings().read().await.unwrap();
		assert_eq!(stored.hours_for(StatusKey::OnHold), 1);
	}

	#[tokio::test]
	async fn test_malformed_settings_body_is_rejected() {
		let app = router(AppState {
			scheduler: scheduler_with(Arc::new(MemoryOrderRepository::new())),
		});

		let response = app
			.oneshot(
				Request::put("/api/settings")
					.header("content-type", "application/json")
					.body(Body::from("{not json"))
					.unwrap(),
			)
			.await
			.unwrap();
		assert!(response.status().is_client_error());
	}
}
