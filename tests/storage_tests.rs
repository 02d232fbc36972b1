mod common;

use adsync::db::models::{DailyStoreMetric, ProductMetric, TrafficMetric};
use adsync::db::{MetricsStorage, ProductMetricsStorage, StoreStorage, TrafficMetricsStorage};
use adsync::error::SyncError;
use adsync::sync::window::DateWindow;
use chrono::NaiveDate;
use std::fs;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn daily_metric_resync_overwrites_instead_of_duplicating() {
    let (pool, path) = common::temp_db("daily-upsert").await;
    let stores = StoreStorage::new(pool.clone());
    let metrics = MetricsStorage::new(pool.clone());

    let store_id = stores
        .insert(&common::store_with_all_vendors("acme"))
        .await
        .unwrap();

    let mut row = DailyStoreMetric::empty(store_id, d("2024-11-01"));
    row.facebook_meta_spend = 40.0;
    row.shopify_sold_orders = 5;
    metrics.create_or_update(&row).await.unwrap();

    // Second sync of the same day carries corrected values.
    row.facebook_meta_spend = 55.5;
    row.shopify_sold_orders = 7;
    row.shopify_order_value = 320.0;
    metrics.create_or_update(&row).await.unwrap();

    let window = DateWindow::new(d("2024-11-01"), d("2024-11-01"));
    let found = metrics.find_by_store(store_id, window).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].facebook_meta_spend, 55.5);
    assert_eq!(found[0].shopify_sold_orders, 7);
    assert_eq!(found[0].shopify_order_value, 320.0);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn product_reset_then_resync_matches_fresh_batch_exactly() {
    let (pool, path) = common::temp_db("product-reset").await;
    let stores = StoreStorage::new(pool.clone());
    let products = ProductMetricsStorage::new(pool.clone());

    let store_id = stores
        .insert(&common::store_with_all_vendors("acme"))
        .await
        .unwrap();

    let batch = |qty: i64, revenue: f64| {
        vec![ProductMetric {
            store_id,
            product_id: "gid://shopify/Product/1".to_string(),
            product_name: "Widget".to_string(),
            product_image: None,
            product_url: None,
            total_quantity_sold: qty,
            total_revenue: revenue,
            last_sync_date: None,
        }]
    };

    // Two applications accumulate.
    products.apply(&batch(5, 50.0)).await.unwrap();
    products.apply(&batch(3, 30.0)).await.unwrap();
    let rows = products.list_for_store(store_id).await.unwrap();
    assert_eq!(rows[0].total_quantity_sold, 8);
    assert_eq!(rows[0].total_revenue, 80.0);

    // Reset-then-resync lands on exactly the fresh batch sums.
    products.reset_for_store(store_id).await.unwrap();
    products.apply(&batch(4, 44.0)).await.unwrap();
    let rows = products.list_for_store(store_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total_quantity_sold, 4);
    assert_eq!(rows[0].total_revenue, 44.0);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn traffic_replacement_preserves_rows_before_new_window() {
    let (pool, path) = common::temp_db("traffic-window").await;
    let stores = StoreStorage::new(pool.clone());
    let traffic = TrafficMetricsStorage::new(pool.clone());

    let store_id = stores
        .insert(&common::store_with_all_vendors("acme"))
        .await
        .unwrap();

    let row = |path: &str, start: &str, end: &str, sessions: i64| TrafficMetric {
        store_id,
        landing_page_path: path.to_string(),
        landing_page_type: "product".to_string(),
        window_start: d(start),
        window_end: d(end),
        online_store_visitors: sessions,
        sessions,
        sessions_with_cart_additions: 1,
        sessions_reached_checkout: 0,
    };

    // Older 30-day window plus a stale 7-day window.
    traffic
        .replace(&[
            row("/products/widget", "2024-10-01", "2024-10-31", 900),
            row("/products/widget", "2024-10-25", "2024-11-01", 120),
        ])
        .await
        .unwrap();

    // New 7-day sync starting 2024-10-25 replaces only windows from there on.
    traffic
        .delete_from_window_start(store_id, d("2024-10-25"))
        .await
        .unwrap();
    traffic
        .replace(&[row("/products/widget", "2024-10-25", "2024-11-01", 150)])
        .await
        .unwrap();

    let rows = traffic.list_for_store(store_id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].window_start, d("2024-10-01"));
    assert_eq!(rows[0].sessions, 900);
    assert_eq!(rows[1].window_start, d("2024-10-25"));
    assert_eq!(rows[1].sessions, 150);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn aggregate_sums_per_store_and_filters() {
    let (pool, path) = common::temp_db("aggregate").await;
    let stores = StoreStorage::new(pool.clone());
    let metrics = MetricsStorage::new(pool.clone());

    let a = stores
        .insert(&common::store_with_all_vendors("alpha"))
        .await
        .unwrap();
    let b = stores
        .insert(&common::store_with_all_vendors("beta"))
        .await
        .unwrap();

    for (store_id, date, spend, orders) in [
        (a, "2024-11-01", 10.0, 1_i64),
        (a, "2024-11-02", 15.0, 2),
        (b, "2024-11-01", 100.0, 4),
    ] {
        let mut row = DailyStoreMetric::empty(store_id, d(date));
        row.facebook_meta_spend = spend;
        row.shopify_sold_orders = orders;
        metrics.create_or_update(&row).await.unwrap();
    }

    let window = DateWindow::new(d("2024-11-01"), d("2024-11-30"));
    let report = metrics.aggregate(window, None).await.unwrap();
    assert_eq!(report.stores.len(), 2);
    assert_eq!(report.totals.facebook_meta_spend, 125.0);
    assert_eq!(report.totals.shopify_sold_orders, 7);

    let filtered = metrics.aggregate(window, Some(&[a])).await.unwrap();
    assert_eq!(filtered.stores.len(), 1);
    assert_eq!(filtered.stores[0].store_id, a);
    assert_eq!(filtered.totals.facebook_meta_spend, 25.0);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn aggregate_without_lower_bound_covers_all_history() {
    let (pool, path) = common::temp_db("aggregate-all-time").await;
    let stores = StoreStorage::new(pool.clone());
    let metrics = MetricsStorage::new(pool.clone());

    let a = stores
        .insert(&common::store_with_all_vendors("alpha"))
        .await
        .unwrap();
    let b = stores
        .insert(&common::store_with_all_vendors("beta"))
        .await
        .unwrap();

    // Rows years apart; an open-start window must pick up both.
    for (store_id, date, spend) in [
        (a, "2020-01-15", 10.0),
        (a, "2024-11-01", 20.0),
        (b, "2024-11-01", 100.0),
    ] {
        let mut row = DailyStoreMetric::empty(store_id, d(date));
        row.google_ad_spend = spend;
        metrics.create_or_update(&row).await.unwrap();
    }

    let all_time = DateWindow::all_time();
    let report = metrics.aggregate(all_time, None).await.unwrap();
    assert_eq!(report.stores.len(), 2);
    assert_eq!(report.totals.google_ad_spend, 130.0);

    let filtered = metrics.aggregate(all_time, Some(&[a])).await.unwrap();
    assert_eq!(filtered.stores.len(), 1);
    assert_eq!(filtered.totals.google_ad_spend, 30.0);

    // An explicit empty id filter matches nothing.
    let none = metrics.aggregate(all_time, Some(&[])).await.unwrap();
    assert!(none.stores.is_empty());
    assert_eq!(none.totals.google_ad_spend, 0.0);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn removing_a_store_purges_only_that_stores_rows() {
    let (pool, path) = common::temp_db("store-purge").await;
    let stores = StoreStorage::new(pool.clone());
    let metrics = MetricsStorage::new(pool.clone());
    let products = ProductMetricsStorage::new(pool.clone());
    let traffic = TrafficMetricsStorage::new(pool.clone());

    let gone = stores
        .insert(&common::store_with_all_vendors("closing"))
        .await
        .unwrap();
    let kept = stores
        .insert(&common::store_with_all_vendors("ongoing"))
        .await
        .unwrap();

    for store_id in [gone, kept] {
        let mut row = DailyStoreMetric::empty(store_id, d("2024-11-01"));
        row.facebook_meta_spend = 12.0;
        metrics.create_or_update(&row).await.unwrap();

        products
            .apply(&[ProductMetric {
                store_id,
                product_id: "gid://shopify/Product/1".to_string(),
                product_name: "Widget".to_string(),
                product_image: None,
                product_url: None,
                total_quantity_sold: 3,
                total_revenue: 30.0,
                last_sync_date: None,
            }])
            .await
            .unwrap();

        traffic
            .replace(&[TrafficMetric {
                store_id,
                landing_page_path: "/products/widget".to_string(),
                landing_page_type: "product".to_string(),
                window_start: d("2024-10-25"),
                window_end: d("2024-11-01"),
                online_store_visitors: 40,
                sessions: 50,
                sessions_with_cart_additions: 5,
                sessions_reached_checkout: 1,
            }])
            .await
            .unwrap();
    }

    metrics.delete_by_store_id(gone).await.unwrap();
    products.delete_by_store_id(gone).await.unwrap();
    traffic.delete_by_store_id(gone).await.unwrap();

    let window = DateWindow::new(d("2024-11-01"), d("2024-11-01"));
    assert!(metrics.find_by_store(gone, window).await.unwrap().is_empty());
    assert!(products.list_for_store(gone).await.unwrap().is_empty());
    assert!(traffic.list_for_store(gone).await.unwrap().is_empty());

    assert_eq!(metrics.find_by_store(kept, window).await.unwrap().len(), 1);
    assert_eq!(products.list_for_store(kept).await.unwrap().len(), 1);
    assert_eq!(traffic.list_for_store(kept).await.unwrap().len(), 1);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn missing_store_lookup_is_a_not_found_error() {
    let (pool, path) = common::temp_db("missing-store").await;
    let stores = StoreStorage::new(pool.clone());

    let err = stores.find_one(4242).await.unwrap_err();
    assert!(matches!(err, SyncError::StoreNotFound(4242)));

    let _ = fs::remove_file(&path);
}
