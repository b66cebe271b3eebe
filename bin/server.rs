// Org-Ledger - Web Server
// REST API over the hierarchy and collection report engine

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use org_ledger::{
    CollectionReport, LedgerConfig, NodeType, Payment, PaymentMode, ReportAssembler, SqliteStore,
    StoreError,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    rank_depth: usize,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

/// Map store failures onto HTTP statuses. `Unavailable` is the only
/// retryable one and must not look like an empty result.
fn store_error_response(e: StoreError) -> (StatusCode, Json<ApiResponse<()>>) {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
        StoreError::InvalidInput(_) | StoreError::Hierarchy(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status == StatusCode::SERVICE_UNAVAILABLE {
        error!("store unavailable: {}", e);
    }
    (status, Json(ApiResponse::err(e.to_string())))
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Deserialize)]
struct YearQuery {
    year: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNodeBody {
    parent_id: String,
    name: String,
    /// Level label; omitted means "one step below the parent"
    #[serde(rename = "type")]
    node_type: Option<String>,
}

#[derive(Deserialize)]
struct RenameBody {
    name: String,
}

#[derive(Deserialize)]
struct DeleteBody {
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMemberBody {
    branch_id: String,
    name: String,
    phone: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody {
    member_id: String,
    amount: f64,
    /// YYYY-MM-DD
    date: String,
    mode: String,
    #[serde(default)]
    description: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/collections/:node_id?year= - Full collection report
async fn get_collection_report(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> impl IntoResponse {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let store = state.store.lock().unwrap();

    let result: Result<CollectionReport, StoreError> = (|| {
        let node = store.node_by_id(&node_id)?;
        let assembler = ReportAssembler::with_rank_depth(state.rank_depth);
        assembler.assemble(&*store, &node, year)
    })();

    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

/// GET /api/collections/total/:node_id - All-time subtree total
async fn get_total_collection(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    match store.node_total_collection(&node_id) {
        Ok(total) => (StatusCode::OK, Json(ApiResponse::ok(total))).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

/// GET /api/collections/summary/:node_id - Headline numbers
async fn get_summary(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    match store.summary(&node_id) {
        Ok(summary) => {
            (StatusCode::OK, Json(ApiResponse::ok(summary))).into_response()
        }
        Err(e) => store_error_response(e).into_response(),
    }
}

/// GET /api/nodes/code/:code - Node with ancestor path and children
async fn get_node_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    match store.node_by_code(&code) {
        Ok(details) => {
            (StatusCode::OK, Json(ApiResponse::ok(details))).into_response()
        }
        Err(e) => store_error_response(e).into_response(),
    }
}

/// GET /api/nodes/:id/children - Direct children in canonical order
async fn get_node_children(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    match store.children_of(&id) {
        Ok(children) => {
            (StatusCode::OK, Json(ApiResponse::ok(children))).into_response()
        }
        Err(e) => store_error_response(e).into_response(),
    }
}

/// POST /api/nodes - Create a node under a parent
async fn create_node(
    State(state): State<AppState>,
    Json(body): Json<CreateNodeBody>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    let result = match &body.node_type {
        Some(label) => match NodeType::parse(label) {
            Some(node_type) => store.create_node(&body.parent_id, &body.name, node_type),
            None => Err(StoreError::InvalidInput(format!(
                "unknown node type {:?}",
                label
            ))),
        },
        None => store.create_child(&body.parent_id, &body.name),
    };

    match result {
        Ok(node) => {
            info!("created {} {:?}", node.node_type, node.node_code);
            (StatusCode::CREATED, Json(ApiResponse::ok(node))).into_response()
        }
        Err(e) => store_error_response(e).into_response(),
    }
}

/// PATCH /api/nodes/:id - Rename in place
async fn rename_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RenameBody>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    match store.rename_node(&id, &body.name) {
        Ok(node) => (StatusCode::OK, Json(ApiResponse::ok(node))).into_response(),
        Err(e) => store_error_response(e).into_response(),
    }
}

/// DELETE /api/nodes/:id - Single-node delete with password confirmation
async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DeleteBody>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    match store.delete_node(&id, &body.password) {
        Ok(()) => {
            info!("deleted node {}", id);
            (StatusCode::OK, Json(ApiResponse::ok("deleted"))).into_response()
        }
        Err(e) => store_error_response(e).into_response(),
    }
}

/// POST /api/members - Attach a member to a branch
async fn create_member(
    State(state): State<AppState>,
    Json(body): Json<CreateMemberBody>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    match store.add_member(&body.branch_id, &body.name, &body.phone) {
        Ok(member) => {
            (StatusCode::CREATED, Json(ApiResponse::ok(member))).into_response()
        }
        Err(e) => store_error_response(e).into_response(),
    }
}

/// POST /api/payments - Record one ledger row
async fn create_payment(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentBody>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();

    let result: Result<Payment, StoreError> = (|| {
        let date = NaiveDate::parse_from_str(&body.date, "%Y-%m-%d")
            .map_err(|_| StoreError::InvalidInput(format!("bad date {:?}", body.date)))?;
        let mode = PaymentMode::parse(&body.mode)
            .ok_or_else(|| StoreError::InvalidInput(format!("bad payment mode {:?}", body.mode)))?;
        store.record_payment(&body.member_id, body.amount, date, mode, &body.description)
    })();

    match result {
        Ok(payment) => {
            (StatusCode::CREATED, Json(ApiResponse::ok(payment))).into_response()
        }
        Err(e) => store_error_response(e).into_response(),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = LedgerConfig::resolve(None).expect("Failed to resolve configuration");

    let store = SqliteStore::open(&config.db_path).expect("Failed to open database");
    info!("database opened: {:?}", config.db_path);

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        rank_depth: config.rank_depth,
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/collections/:node_id", get(get_collection_report))
        .route("/collections/total/:node_id", get(get_total_collection))
        .route("/collections/summary/:node_id", get(get_summary))
        .route("/nodes/code/:code", get(get_node_by_code))
        .route("/nodes/:id/children", get(get_node_children))
        .route("/nodes", post(create_node))
        .route("/nodes/:id", patch(rename_node).delete(delete_node))
        .route("/members", post(create_member))
        .route("/payments", post(create_payment))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    info!("ledger-server {} listening on {}", org_ledger::VERSION, config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
