mod common;

use adsync::db::models::DailyStoreMetric;
use adsync::db::{MetricsStorage, SqlitePool, StoreStorage};
use adsync::server::{AppState, admin_router};
use adsync::vendors::{DailyOrders, DailySpend};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use common::{FakeFacebook, FakeGoogle, FakeShopify, VendorCalls};
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

const TEST_KEY: &str = "route-test-key";

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn test_app(pool: &SqlitePool, calls: Arc<VendorCalls>) -> Router {
    unsafe { std::env::set_var("ADSYNC_ADMIN_KEY", TEST_KEY) };

    let shopify = FakeShopify {
        orders: vec![DailyOrders {
            date: d("2024-11-01"),
            sold_orders: 2,
            order_value: 80.0,
            sold_items: 3,
        }],
        ..FakeShopify::empty(calls.clone())
    };
    let facebook = FakeFacebook {
        spend: vec![DailySpend { date: d("2024-11-01"), spend: 12.0 }],
        calls: calls.clone(),
    };
    let google = FakeGoogle { spend: Vec::new(), fail_store: None, calls };

    let orch = common::orchestrator_with(
        pool,
        Arc::new(shopify),
        Arc::new(facebook),
        Arc::new(google),
    );
    admin_router(AppState::new(Arc::new(orch)))
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not json")
}

#[tokio::test]
async fn healthz_needs_no_key() {
    let (pool, path) = common::temp_db("route-healthz").await;
    let app = test_app(&pool, Arc::new(VendorCalls::default()));

    let resp = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn admin_routes_reject_missing_or_wrong_key() {
    let (pool, path) = common::temp_db("route-auth").await;
    let app = test_app(&pool, Arc::new(VendorCalls::default()));

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/metrics/summary")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/admin/metrics/summary")
                .header("x-admin-key", "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn sync_of_unknown_store_is_404() {
    let (pool, path) = common::temp_db("route-404").await;
    let app = test_app(&pool, Arc::new(VendorCalls::default()));

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/stores/4242/sync")
                .header("x-admin-key", TEST_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"]["code"], "STORE_NOT_FOUND");

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn inverted_backfill_range_is_400_with_no_vendor_calls() {
    let (pool, path) = common::temp_db("route-backfill").await;
    let stores = StoreStorage::new(pool.clone());
    let store_id = stores
        .insert(&common::store_with_all_vendors("acme"))
        .await
        .unwrap();

    let calls = Arc::new(VendorCalls::default());
    let app = test_app(&pool, calls.clone());

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/stores/{store_id}/backfill"))
                .header("x-admin-key", TEST_KEY)
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"start_date":"2025-02-01","end_date":"2025-01-01"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"]["code"], "INVALID_DATE_RANGE");
    assert_eq!(calls.shopify.load(Ordering::SeqCst), 0);
    assert_eq!(calls.facebook.load(Ordering::SeqCst), 0);
    assert_eq!(calls.google.load(Ordering::SeqCst), 0);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn backfill_then_metrics_round_trip() {
    let (pool, path) = common::temp_db("route-roundtrip").await;
    let stores = StoreStorage::new(pool.clone());
    let store_id = stores
        .insert(&common::store_with_all_vendors("acme"))
        .await
        .unwrap();

    let app = test_app(&pool, Arc::new(VendorCalls::default()));

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/stores/{store_id}/backfill"))
                .header("x-admin-key", TEST_KEY)
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"start_date":"2024-11-01","end_date":"2024-11-01"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_json(resp).await;
    assert_eq!(report["processed_dates"], 1);

    let resp = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/admin/stores/{store_id}/metrics?start_date=2024-11-01&end_date=2024-11-01"
                ))
                .header("x-admin-key", TEST_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let metrics = body["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0]["facebook_meta_spend"], 12.0);
    assert_eq!(metrics[0]["shopify_sold_orders"], 2);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn summary_reflects_stored_rows() {
    let (pool, path) = common::temp_db("route-summary").await;
    let stores = StoreStorage::new(pool.clone());
    let metrics = MetricsStorage::new(pool.clone());
    let store_id = stores
        .insert(&common::store_with_all_vendors("acme"))
        .await
        .unwrap();

    let mut row = DailyStoreMetric::empty(store_id, d("2024-11-01"));
    row.google_ad_spend = 75.0;
    row.shopify_order_value = 900.0;
    metrics.create_or_update(&row).await.unwrap();

    let app = test_app(&pool, Arc::new(VendorCalls::default()));
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/admin/metrics/summary?start_date=2024-11-01&end_date=2024-11-30")
                .header("x-admin-key", TEST_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["totals"]["google_ad_spend"], 75.0);
    assert_eq!(body["totals"]["shopify_order_value"], 900.0);
    assert_eq!(body["stores"].as_array().unwrap().len(), 1);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn unknown_facebook_insight_level_is_400() {
    let (pool, path) = common::temp_db("route-fb-level").await;
    let stores = StoreStorage::new(pool.clone());
    let store_id = stores
        .insert(&common::store_with_all_vendors("acme"))
        .await
        .unwrap();

    let app = test_app(&pool, Arc::new(VendorCalls::default()));
    let resp = app
        .oneshot(
            Request::builder()
                .uri(format!("/admin/stores/{store_id}/facebook/bogus"))
                .header("x-admin-key", TEST_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"]["code"], "INVALID_PARAMETER");

    let _ = fs::remove_file(&path);
}
