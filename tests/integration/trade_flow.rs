//! End-to-end flow over canned listings and books.

use chrono::{TimeZone, Utc};
use serde_json::json;

use btc5m::config::TraderConfig;
use btc5m::engine::executor::{ExecutionOutcome, Executor, OrderTicket};
use btc5m::platforms::polymarket::{select_window, GammaMarket};
use btc5m::strategy::{check_window, evaluate};
use btc5m::types::{
    FillWarning, MarketWindow, OrderBookSnapshot, OrderKind, OrderQuantity, OrderSide, Side, TraderError,
};

use crate::mock_gateway::MockGateway;

fn listings() -> Vec<GammaMarket> {
    serde_json::from_value(json!([
        {
            "question": "Ethereum price 5 min up or down?",
            "endDate": "2026-10-18T12:01:00Z",
            "clobTokenIds": "[\"eth-yes\", \"eth-no\"]"
        },
        {
            "question": "Bitcoin Price 5 min: 12:10 window",
            "endDate": "2026-10-18T12:10:00Z",
            "clobTokenIds": "[\"late-yes\", \"late-no\"]",
            "liquidityClob": "900"
        },
        {
            "question": "Bitcoin price 5 min: 12:05 window",
            "endDate": "2026-10-18T12:05:00Z",
            "clobTokenIds": "[\"btc-yes\", \"btc-no\"]",
            "liquidityClob": "4200.5"
        }
    ]))
    .unwrap()
}

fn scenario_book() -> OrderBookSnapshot {
    serde_json::from_value(json!({
        "asks": [
            {"price": "0.55", "size": "30"},
            {"price": "0.50", "size": "20"}
        ],
        "bids": [
            {"price": "0.47", "size": "15"},
            {"price": "0.48", "size": "10"}
        ]
    }))
    .unwrap()
}

fn discover() -> MarketWindow {
    let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 2, 0).unwrap();
    select_window(&listings(), now).unwrap()
}

#[test]
fn test_discovery_picks_soonest_btc_window() {
    let window = discover();

    assert_eq!(window.title, "Bitcoin price 5 min: 12:05 window");
    assert_eq!(window.yes_token, "btc-yes");
    assert_eq!(window.no_token, "btc-no");
    assert_eq!(window.seconds_remaining, 180);
    assert_eq!(window.end_label, "12:05:00 UTC");
    assert_eq!(window.liquidity, 4200.5);
}

#[test]
fn test_gate_then_price_scenario() {
    let cfg = TraderConfig::default();
    let window = discover();
    check_window(&window, cfg.min_time_remaining).unwrap();

    let estimate = evaluate(&scenario_book(), 20.0, &cfg.slippage_policy());

    assert_eq!(estimate.best_ask, Some(0.5));
    assert_eq!(estimate.best_bid, Some(0.48));
    assert!((estimate.shares - 38.1818).abs() < 1e-4);
    assert!((estimate.cost - 20.0).abs() < 1e-9);
    assert_eq!(estimate.avg_price, Some(0.5238));
    assert_eq!(estimate.slippage_pct, 4.76);
    assert!(!estimate.blocked);
    assert!(estimate
        .warnings
        .iter()
        .any(|w| matches!(w, FillWarning::HighSlippage { .. })));
}

#[test]
fn test_gate_refuses_late_window() {
    let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 4, 50).unwrap();
    let window = select_window(&listings(), now).unwrap();

    match check_window(&window, 30) {
        Err(TraderError::WindowTooShort { remaining, minimum }) => {
            assert_eq!(remaining, 10);
            assert_eq!(minimum, 30);
        }
        other => panic!("expected WindowTooShort, got {other:?}"),
    }
}

#[test]
fn test_no_btc_listing() {
    let listings: Vec<GammaMarket> =
        serde_json::from_value(json!([{"question": "Ethereum price 5 min", "clobTokenIds": ["a", "b"]}]))
            .unwrap();
    assert!(matches!(
        select_window(&listings, Utc::now()),
        Err(TraderError::NoActiveMarket)
    ));
}

#[tokio::test]
async fn test_dry_run_flow_sends_nothing() {
    let gateway = MockGateway::new("LIVE");
    let cfg = TraderConfig::default();
    let window = discover();
    let estimate = evaluate(&scenario_book(), 20.0, &cfg.slippage_policy());

    let executor = Executor::new(Some(Box::new(gateway.clone())), true, cfg.sig_type);
    let ticket = OrderTicket {
        side: Side::Yes,
        kind: OrderKind::Gtc,
        notional: 20.0,
        limit_price: Some(0.52),
    };
    let request = executor.prepare(&window, &estimate, &ticket, false).unwrap();
    let outcome = executor.execute(&request).await.unwrap();

    assert!(matches!(outcome, ExecutionOutcome::DryRun { .. }));
    assert!(gateway.placed().is_empty());
}

#[tokio::test]
async fn test_live_fok_on_no_token() {
    let gateway = MockGateway::new("MATCHED");
    let cfg = TraderConfig::default();
    let window = discover();
    let estimate = evaluate(&scenario_book(), 20.0, &cfg.slippage_policy());

    let executor = Executor::new(Some(Box::new(gateway.clone())), false, cfg.sig_type);
    let ticket = OrderTicket {
        side: Side::No,
        kind: OrderKind::Fok,
        notional: 20.0,
        limit_price: None,
    };
    let request = executor.prepare(&window, &estimate, &ticket, false).unwrap();

    match executor.execute(&request).await.unwrap() {
        ExecutionOutcome::Placed(ack) => {
            assert_eq!(ack.status, "MATCHED");
            assert_eq!(ack.order_id_or_na(), "0xmock0001");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let placed = gateway.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].token_id, "btc-no");
    assert_eq!(placed[0].side, OrderSide::Buy);
    assert_eq!(placed[0].quantity, OrderQuantity::Amount(20.0));
}

#[tokio::test]
async fn test_blocked_estimate_never_reaches_gateway() {
    let gateway = MockGateway::new("MATCHED");
    let cfg = TraderConfig {
        slippage_warn: 1.0,
        slippage_block: 2.0,
        ..TraderConfig::default()
    };
    let window = discover();
    let estimate = evaluate(&scenario_book(), 20.0, &cfg.slippage_policy());
    assert!(estimate.blocked);

    let executor = Executor::new(Some(Box::new(gateway.clone())), false, cfg.sig_type);
    let ticket = OrderTicket {
        side: Side::Yes,
        kind: OrderKind::Fok,
        notional: 20.0,
        limit_price: None,
    };

    assert!(matches!(
        executor.prepare(&window, &estimate, &ticket, false),
        Err(TraderError::SlippageBlocked { .. })
    ));
    assert!(gateway.placed().is_empty());

    let forced = executor.prepare(&window, &estimate, &ticket, true).unwrap();
    executor.execute(&forced).await.unwrap();
    assert_eq!(gateway.placed().len(), 1);
}

#[tokio::test]
async fn test_live_gtc_then_list_and_cancel() {
    let gateway = MockGateway::new("LIVE");
    let window = discover();
    let estimate = evaluate(&scenario_book(), 20.0, &TraderConfig::default().slippage_policy());

    let executor = Executor::new(Some(Box::new(gateway.clone())), false, 1);
    let ticket = OrderTicket {
        side: Side::Yes,
        kind: OrderKind::Gtc,
        notional: 20.0,
        limit_price: Some(0.5),
    };
    let request = executor.prepare(&window, &estimate, &ticket, false).unwrap();
    assert_eq!(request.quantity, OrderQuantity::Size(40.0));
    executor.execute(&request).await.unwrap();

    let open = executor.open_orders().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, "0xmock0001");

    executor.cancel("0xmock0001").await.unwrap();
    assert!(executor.open_orders().await.unwrap().is_empty());
    assert_eq!(gateway.cancelled(), vec!["0xmock0001".to_string()]);

    assert!(matches!(
        executor.cancel("0xmock0001").await,
        Err(TraderError::OrderRejected { .. })
    ));
}

#[tokio::test]
async fn test_unexpected_status_and_transport_failure() {
    let gateway = MockGateway::new("DELAYED");
    let window = discover();
    let estimate = evaluate(&scenario_book(), 20.0, &TraderConfig::default().slippage_policy());
    let executor = Executor::new(Some(Box::new(gateway.clone())), false, 1);
    let ticket = OrderTicket {
        side: Side::Yes,
        kind: OrderKind::Fok,
        notional: 20.0,
        limit_price: None,
    };
    let request = executor.prepare(&window, &estimate, &ticket, false).unwrap();

    let err = executor.execute(&request).await.unwrap_err();
    match &err {
        TraderError::OrderRejected { status, order_id, .. } => {
            assert_eq!(status, "DELAYED");
            assert_eq!(order_id.as_deref(), Some("0xmock0001"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("0xmock0001"));

    gateway.set_error("signer unavailable");
    assert!(matches!(
        executor.execute(&request).await,
        Err(TraderError::Transport { status: Some(503), .. })
    ));
}
