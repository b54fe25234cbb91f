mod common;

use axum::http::StatusCode;
use tower::ServiceExt;

use common::*;
use unitedpay_gateway::domain::{OrderStatus, PaymentStatus};
use unitedpay_gateway::gateway::hash::HashVerdict;
use unitedpay_gateway::ports::{OrderStore, PendingPaymentStore};

/// Runs checkout for `order_id` and returns the hosted page path.
async fn start_payment(app: &TestApp, order_id: i64) -> String {
    let response = app
        .router
        .clone()
        .oneshot(post_empty(&format!("/orders/{}/payment", order_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["result"], "success");
    let redirect = body["redirect"].as_str().unwrap().to_string();
    assert!(redirect.starts_with("http://localhost:3000/sandbox/payment?threeDTrxCode="));
    assert!(redirect.ends_with("&RedirectType=0"));
    path_and_query(&redirect)
}

fn trx_code_of(page_path: &str) -> String {
    let url = url::Url::parse(&format!("http://localhost{}", page_path)).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "threeDTrxCode")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn test_approved_sandbox_payment_completes_order_end_to_end() {
    let app = spawn_app(config(true, &[]));
    seed_order(&app, 42, 75).await;

    let page = start_payment(&app, 42).await;

    let order = app.orders.find(42).await.unwrap().unwrap();
    assert!(order.payment.code_for_hash.is_some());
    assert!(order
        .notes
        .iter()
        .any(|n| n.note.starts_with("United Payment payment initiated. CodeForHash:")));

    let response = app.router.clone().oneshot(get(&page)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("75.00 GEL"));
    assert!(html.contains("payment_action"));

    let response = app
        .router
        .clone()
        .oneshot(post_form(&page, &[("payment_action", "success")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let callback = location(&response);
    assert!(callback.starts_with("http://localhost:3000/callback?order_id=42&order_key="));
    assert!(callback.contains("sandbox_payment=1"));
    assert!(callback.contains("resultCode=Success"));

    let response = app
        .router
        .clone()
        .oneshot(get(&path_and_query(&callback)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(CONFIRMATION_URL));

    let order = app.orders.find(42).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.payment.payment_status, PaymentStatus::Success);
    // The digest matched on its own; the bypass flag was not needed.
    assert_eq!(order.payment.last_verdict, Some(HashVerdict::Success));
    assert!(order
        .payment
        .trx_code
        .as_deref()
        .unwrap()
        .starts_with("ORDER-"));
}

#[tokio::test]
async fn test_declined_sandbox_payment_fails_order() {
    let app = spawn_app(config(true, &[]));
    seed_order(&app, 43, 20).await;

    let page = start_payment(&app, 43).await;
    let response = app
        .router
        .clone()
        .oneshot(post_form(&page, &[("payment_action", "failed")]))
        .await
        .unwrap();
    let callback = location(&response);
    assert!(callback.contains("resultCode=Failed"));

    let response = app
        .router
        .clone()
        .oneshot(get(&path_and_query(&callback)))
        .await
        .unwrap();
    assert_eq!(location(&response), CHECKOUT_URL);

    let order = app.orders.find(43).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(order.payment.last_verdict, Some(HashVerdict::Failure));
}

#[tokio::test]
async fn test_sandbox_session_is_single_use() {
    let app = spawn_app(config(true, &[]));
    seed_order(&app, 44, 10).await;

    let page = start_payment(&app, 44).await;
    let first = app
        .router
        .clone()
        .oneshot(post_form(&page, &[("payment_action", "success")]))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let second = app
        .router
        .clone()
        .oneshot(post_form(&page, &[("payment_action", "success")]))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::GONE);
    assert_eq!(body_json(second).await["error"], "Payment session expired.");

    let shown = app.router.clone().oneshot(get(&page)).await.unwrap();
    assert_eq!(shown.status(), StatusCode::GONE);
    assert!(app.pending.get(&trx_code_of(&page)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sandbox_rejects_bad_input() {
    let app = spawn_app(config(true, &[]));
    seed_order(&app, 45, 10).await;
    let page = start_payment(&app, 45).await;

    let response = app
        .router
        .clone()
        .oneshot(get("/sandbox/payment"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid payment parameters.");

    let response = app
        .router
        .clone()
        .oneshot(post_form(&page, &[("payment_action", "maybe")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // A rejected submission does not burn the session.
    assert!(app.pending.get(&trx_code_of(&page)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_zero_amount_is_rejected_without_pending_session() {
    let app = spawn_app(config(true, &[]));
    seed_order(&app, 46, 0).await;

    let response = app
        .router
        .clone()
        .oneshot(post_empty("/orders/46/payment"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["result"], "failure");
    assert!(body["message"].as_str().unwrap().starts_with("Payment error:"));

    let order = app.orders.find(46).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.payment.code_for_hash.is_none());
    assert!(order
        .notes
        .iter()
        .any(|n| n.note.starts_with("United Payment payment failed:")));
}

#[tokio::test]
async fn test_sandbox_routes_are_absent_in_live_mode() {
    let app = spawn_app(config(false, &[]));
    let response = app
        .router
        .clone()
        .oneshot(get("/sandbox/payment?threeDTrxCode=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
