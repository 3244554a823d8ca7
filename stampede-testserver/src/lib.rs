//! In-process mock of the e-commerce API the load scenarios target.
//!
//! Only the response shapes the scenarios inspect are modeled. Coupon issuance keeps a
//! per-coupon stock and a set of users who already hold it, so races show up as
//! 409/410 responses exactly as against the real backend.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

pub const PATH_HEALTH: &str = "/actuator/health";
pub const PATH_PRODUCTS: &str = "/api/products";
pub const PATH_PRODUCT: &str = "/api/products/{id}";
pub const PATH_POPULAR_DB: &str = "/api/products/popular";
pub const PATH_POPULAR_REALTIME: &str = "/api/products/popular/realtime";
pub const PATH_POPULAR_REALTIME_STATS: &str = "/api/products/popular/realtime/stats";
pub const PATH_COUPONS_AVAILABLE: &str = "/api/coupons/available";
pub const PATH_COUPON_ISSUE: &str = "/api/coupons/{id}/issue";
pub const PATH_ORDERS: &str = "/api/orders";
pub const PATH_ORDER: &str = "/api/orders/{id}";

pub const DEFAULT_PRODUCT_COUNT: u64 = 100;
pub const DEFAULT_COUPON_LIMIT: u64 = 100;
const CATEGORY_COUNT: u64 = 5;

#[derive(Debug, Clone)]
pub struct TestServerOptions {
    pub products: u64,
    /// Stock of coupon 1.
    pub coupon_limit: u64,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            products: DEFAULT_PRODUCT_COUNT,
            coupon_limit: DEFAULT_COUPON_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    coupons_issued: Arc<AtomicU64>,
    orders_created: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn coupons_issued(&self) -> u64 {
        self.coupons_issued.load(Ordering::Relaxed)
    }

    pub fn orders_created(&self) -> u64 {
        self.orders_created.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Product {
    id: u64,
    name: String,
    price: u64,
    category_id: u64,
    stock: u64,
}

#[derive(Debug)]
struct CouponStock {
    id: u64,
    name: String,
    limit: u64,
    holders: HashSet<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    id: u64,
    order_number: String,
    user_id: u64,
    user_coupon_id: Option<u64>,
    status: &'static str,
    total_amount: u64,
}

#[derive(Debug, Default)]
struct OrderBook {
    by_id: HashMap<u64, Order>,
    by_idempotency_key: HashMap<String, u64>,
}

struct ShopState {
    stats: TestServerStats,
    products: Vec<Product>,
    coupons: Mutex<HashMap<u64, CouponStock>>,
    next_user_coupon_id: AtomicU64,
    orders: Mutex<OrderBook>,
    next_order_id: AtomicU64,
}

type Shared = Arc<ShopState>;

impl ShopState {
    fn new(opts: &TestServerOptions, stats: TestServerStats) -> Self {
        let products = (1..=opts.products)
            .map(|id| Product {
                id,
                name: format!("Product {id}"),
                price: 1_000 + (id * 137) % 9_000,
                category_id: (id - 1) % CATEGORY_COUNT + 1,
                stock: 1_000,
            })
            .collect();

        let mut coupons = HashMap::new();
        coupons.insert(
            1,
            CouponStock {
                id: 1,
                name: "First-come coupon".to_string(),
                limit: opts.coupon_limit,
                holders: HashSet::new(),
            },
        );

        Self {
            stats,
            products,
            coupons: Mutex::new(coupons),
            next_user_coupon_id: AtomicU64::new(1),
            orders: Mutex::new(OrderBook::default()),
            next_order_id: AtomicU64::new(1),
        }
    }

    fn product(&self, id: u64) -> Option<&Product> {
        id.checked_sub(1)
            .and_then(|idx| self.products.get(idx as usize))
    }

    /// Deterministic "best sellers": highest ids first.
    fn popular(&self, top_n: usize) -> impl Iterator<Item = &Product> {
        self.products.iter().rev().take(top_n)
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({ "status": status.as_u16(), "message": message })),
    )
        .into_response()
}

async fn handle_health(State(state): State<Shared>) -> Json<serde_json::Value> {
    state.stats.inc_requests_total();
    Json(serde_json::json!({ "status": "UP" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductListQuery {
    #[serde(default)]
    page: u64,
    #[serde(default = "default_page_size")]
    size: u64,
    category_id: Option<u64>,
}

fn default_page_size() -> u64 {
    20
}

async fn handle_products(
    State(state): State<Shared>,
    Query(q): Query<ProductListQuery>,
) -> Response {
    state.stats.inc_requests_total();

    if q.size == 0 {
        return error(StatusCode::BAD_REQUEST, "size must be positive");
    }

    let matching: Vec<&Product> = state
        .products
        .iter()
        .filter(|p| q.category_id.is_none_or(|c| p.category_id == c))
        .collect();

    let total = matching.len() as u64;
    let content: Vec<&Product> = matching
        .into_iter()
        .skip(q.page.saturating_mul(q.size) as usize)
        .take(q.size as usize)
        .collect();

    Json(serde_json::json!({
        "content": content,
        "pageable": { "pageNumber": q.page, "pageSize": q.size },
        "totalElements": total,
        "totalPages": total.div_ceil(q.size),
    }))
    .into_response()
}

async fn handle_product(State(state): State<Shared>, Path(id): Path<u64>) -> Response {
    state.stats.inc_requests_total();
    match state.product(id) {
        Some(p) => Json(p).into_response(),
        None => error(StatusCode::NOT_FOUND, "product not found"),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopNQuery {
    #[serde(default = "default_top_n")]
    top_n: usize,
}

fn default_top_n() -> usize {
    10
}

async fn handle_popular_db(State(state): State<Shared>) -> Json<Vec<Product>> {
    state.stats.inc_requests_total();
    Json(state.popular(5).cloned().collect())
}

async fn handle_popular_realtime(
    State(state): State<Shared>,
    Query(q): Query<TopNQuery>,
) -> Json<Vec<Product>> {
    state.stats.inc_requests_total();
    Json(state.popular(q.top_n).cloned().collect())
}

async fn handle_popular_realtime_stats(
    State(state): State<Shared>,
    Query(q): Query<TopNQuery>,
) -> Json<Vec<serde_json::Value>> {
    state.stats.inc_requests_total();
    let items = state
        .popular(q.top_n)
        .enumerate()
        .map(|(i, p)| {
            serde_json::json!({
                "product": p,
                "salesCount": 1_000 - (i as u64) * 10,
                "rank": i + 1,
            })
        })
        .collect();
    Json(items)
}

async fn handle_coupons_available(State(state): State<Shared>) -> Json<Vec<serde_json::Value>> {
    state.stats.inc_requests_total();
    let coupons = state.coupons.lock().await;
    let mut out: Vec<serde_json::Value> = coupons
        .values()
        .filter(|c| (c.holders.len() as u64) < c.limit)
        .map(|c| {
            serde_json::json!({
                "id": c.id,
                "name": c.name,
                "remainingQuantity": c.limit - c.holders.len() as u64,
            })
        })
        .collect();
    out.sort_by_key(|v| v["id"].as_u64());
    Json(out)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueCouponRequest {
    user_id: u64,
}

async fn handle_coupon_issue(
    State(state): State<Shared>,
    Path(coupon_id): Path<u64>,
    Json(req): Json<IssueCouponRequest>,
) -> Response {
    state.stats.inc_requests_total();

    let mut coupons = state.coupons.lock().await;
    let Some(coupon) = coupons.get_mut(&coupon_id) else {
        return error(StatusCode::NOT_FOUND, "coupon not found");
    };

    if coupon.holders.contains(&req.user_id) {
        return error(StatusCode::CONFLICT, "coupon already issued to user");
    }
    if coupon.holders.len() as u64 >= coupon.limit {
        return error(StatusCode::GONE, "coupon sold out");
    }

    coupon.holders.insert(req.user_id);
    state.stats.coupons_issued.fetch_add(1, Ordering::Relaxed);
    let user_coupon_id = state.next_user_coupon_id.fetch_add(1, Ordering::Relaxed);

    Json(serde_json::json!({
        "userCouponId": user_coupon_id,
        "couponId": coupon_id,
        "userId": req.user_id,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest {
    user_id: u64,
    user_coupon_id: Option<u64>,
    idempotency_key: Option<String>,
}

async fn handle_create_order(
    State(state): State<Shared>,
    Json(req): Json<CreateOrderRequest>,
) -> Response {
    state.stats.inc_requests_total();

    let mut book = state.orders.lock().await;

    if let Some(key) = &req.idempotency_key
        && let Some(order) = book
            .by_idempotency_key
            .get(key)
            .and_then(|id| book.by_id.get(id))
    {
        return (StatusCode::CREATED, Json(order.clone())).into_response();
    }

    let id = state.next_order_id.fetch_add(1, Ordering::Relaxed);
    let order = Order {
        id,
        order_number: format!("ORD-{id:08}"),
        user_id: req.user_id,
        user_coupon_id: req.user_coupon_id,
        status: "PAID",
        total_amount: state.product(id % DEFAULT_PRODUCT_COUNT + 1).map_or(0, |p| p.price),
    };

    if let Some(key) = req.idempotency_key {
        book.by_idempotency_key.insert(key, id);
    }
    book.by_id.insert(id, order.clone());
    state.stats.orders_created.fetch_add(1, Ordering::Relaxed);

    (StatusCode::CREATED, Json(order)).into_response()
}

async fn handle_order(State(state): State<Shared>, Path(id): Path<u64>) -> Response {
    state.stats.inc_requests_total();
    match state.orders.lock().await.by_id.get(&id) {
        Some(order) => Json(order.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "order not found"),
    }
}

pub fn router(opts: &TestServerOptions, stats: TestServerStats) -> Router {
    let state: Shared = Arc::new(ShopState::new(opts, stats));

    Router::new()
        .route(PATH_HEALTH, get(handle_health))
        .route(PATH_PRODUCTS, get(handle_products))
        .route(PATH_POPULAR_DB, get(handle_popular_db))
        .route(PATH_POPULAR_REALTIME, get(handle_popular_realtime))
        .route(
            PATH_POPULAR_REALTIME_STATS,
            get(handle_popular_realtime_stats),
        )
        .route(PATH_PRODUCT, get(handle_product))
        .route(PATH_COUPONS_AVAILABLE, get(handle_coupons_available))
        .route(PATH_COUPON_ISSUE, post(handle_coupon_issue))
        .route(PATH_ORDERS, post(handle_create_order))
        .route(PATH_ORDER, get(handle_order))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(TestServerOptions::default()).await
    }

    pub async fn start_with(opts: TestServerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(&opts, stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
