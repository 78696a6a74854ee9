//! Full scan pipeline: listing → dedup → enrichment → policy → alert.

use std::sync::Arc;
use std::time::Duration;

use launchscout::alerts::AlertSink;
use launchscout::engine::criteria::CriteriaEvaluator;
use launchscout::engine::market_data::MarketDataClient;
use launchscout::engine::monitor::{MonitorController, MonitorState, MonitorSwitch, StartOutcome};
use launchscout::engine::rate_limit::{RateBudget, Unmetered};
use launchscout::engine::scanner::{ScanOrchestrator, ScanSettings, ScanStatus};
use launchscout::types::{Candidate, Overview, SecurityProfile};

use crate::mock_market::{fresh_overview, safe_security, MockMarket, RecordingSink};

struct Harness {
    market: MockMarket,
    sink: RecordingSink,
    budget: Arc<Unmetered>,
    orchestrator: Arc<ScanOrchestrator>,
}

fn harness_with(settings: ScanSettings) -> Harness {
    let market = MockMarket::new();
    let sink = RecordingSink::new();
    let budget = Arc::new(Unmetered::default());
    let client = MarketDataClient::new(Arc::new(market.clone()), budget.clone(), 50);
    let switch = MonitorSwitch::new();
    switch.activate();
    let orchestrator = Arc::new(ScanOrchestrator::new(
        client,
        CriteriaEvaluator::default(),
        Arc::new(sink.clone()),
        switch,
        settings,
    ));
    Harness {
        market,
        sink,
        budget,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with(ScanSettings::immediate(20))
}

#[tokio::test]
async fn test_passing_candidate_is_alerted() {
    let h = harness();
    h.market.add_token(
        Candidate::new("X1", "Foo", "ABCX"),
        fresh_overview(),
        safe_security(),
    );

    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.accepted, 1);
    assert_eq!(h.sink.addresses(), vec!["X1".to_string()]);
}

#[tokio::test]
async fn test_low_liquidity_is_rejected() {
    let h = harness();
    h.market.add_token(
        Candidate::new("X1", "Foo", "ABCX"),
        Overview {
            liquidity: Some(1_000.0),
            ..fresh_overview()
        },
        safe_security(),
    );

    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.rejected, 1);
    assert!(h.sink.addresses().is_empty());
    assert!(h.orchestrator.seen().lock().await.has("X1"));
}

#[tokio::test]
async fn test_denylisted_symbol_is_never_enriched() {
    let h = harness();
    h.market.add_token(
        Candidate::new("So11111111111111111111111111111111111111112", "Wrapped SOL", "SOL"),
        fresh_overview(),
        safe_security(),
    );

    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.skipped_denylisted, 1);
    assert_eq!(h.market.total_detail_calls(), 0);
    assert!(h
        .orchestrator
        .seen()
        .lock()
        .await
        .has("So11111111111111111111111111111111111111112"));
}

#[tokio::test]
async fn test_empty_listing_costs_one_request() {
    let h = harness();

    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.status, ScanStatus::Empty);
    assert_eq!(h.market.listing_calls(), 1);
    assert_eq!(h.market.total_detail_calls(), 0);
    assert_eq!(h.budget.granted(), 1);
    assert!(h.sink.addresses().is_empty());
}

#[tokio::test]
async fn test_repeat_listing_is_evaluated_once() {
    let h = harness();
    h.market.add_token(
        Candidate::new("X1", "Foo", "ABCX"),
        fresh_overview(),
        safe_security(),
    );

    h.orchestrator.run_scan().await;
    let second = h.orchestrator.run_scan().await;
    let third = h.orchestrator.run_scan().await;

    assert_eq!(second.skipped_seen, 1);
    assert_eq!(third.evaluated, 0);
    assert_eq!(h.market.detail_calls_for("X1"), 2);
    assert_eq!(h.sink.addresses().len(), 1);
}

#[tokio::test]
async fn test_alerts_follow_listing_order() {
    let h = harness();
    for (addr, sym) in [("A1", "AAA"), ("B2", "BBB"), ("C3", "CCC")] {
        h.market.add_token(
            Candidate::new(addr, "Token", sym),
            fresh_overview(),
            safe_security(),
        );
    }

    h.orchestrator.run_scan().await;
    assert_eq!(h.sink.addresses(), vec!["A1", "B2", "C3"]);
}

#[tokio::test]
async fn test_failed_detail_fetch_degrades_to_reject() {
    let h = harness();
    h.market.add_token(
        Candidate::new("X1", "Foo", "ABCX"),
        fresh_overview(),
        safe_security(),
    );
    h.market.add_token(
        Candidate::new("Y2", "Bar", "BARR"),
        fresh_overview(),
        safe_security(),
    );
    h.market.break_details_for("X1");

    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.evaluated, 2);
    assert_eq!(report.candidate_errors, 0);
    assert_eq!(h.sink.addresses(), vec!["Y2".to_string()]);
    assert!(h.orchestrator.seen().lock().await.has("X1"));
}

#[tokio::test]
async fn test_sink_failure_does_not_stop_scan() {
    let h = harness();
    h.market.add_token(
        Candidate::new("X1", "Foo", "ABCX"),
        fresh_overview(),
        safe_security(),
    );
    h.market.add_token(
        Candidate::new("Y2", "Bar", "BARR"),
        fresh_overview(),
        safe_security(),
    );
    h.sink.set_failing(true);

    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.accepted, 2);
    assert_eq!(report.alerts_failed, 2);
    assert_eq!(report.total_processed, 2);

    // Failed alerts are not retried on the next cycle.
    h.sink.set_failing(false);
    h.orchestrator.run_scan().await;
    assert!(h.sink.addresses().is_empty());
}

#[tokio::test]
async fn test_panicking_sink_is_isolated_per_candidate() {
    let h = harness();
    h.market.add_token(
        Candidate::new("A1", "Foo", "ABCX"),
        fresh_overview(),
        safe_security(),
    );
    h.market.add_token(
        Candidate::new("B2", "Bar", "BARR"),
        fresh_overview(),
        safe_security(),
    );
    h.sink.panic_on("A1");

    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.candidate_errors, 1);
    assert_eq!(report.accepted, 1);
    assert_eq!(h.sink.addresses(), vec!["B2".to_string()]);

    // The panicking candidate is marked seen and not retried.
    assert!(h.orchestrator.seen().lock().await.has("A1"));
    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.candidate_errors, 0);
    assert_eq!(report.skipped_seen, 2);
}

#[tokio::test]
async fn test_only_scan_depth_candidates_are_examined() {
    let h = harness_with(ScanSettings::immediate(3));
    for i in 0..10 {
        h.market.add_token(
            Candidate::new(format!("ADDR{i}"), "Token", "TOKN"),
            fresh_overview(),
            safe_security(),
        );
    }

    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.listed, 3);
    assert_eq!(h.sink.addresses(), vec!["ADDR0", "ADDR1", "ADDR2"]);
    assert_eq!(h.market.detail_calls_for("ADDR5"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_listing_waits_cooldown() {
    let h = harness_with(ScanSettings {
        throttle_cooldown: Duration::from_secs(30),
        ..ScanSettings::immediate(20)
    });
    h.market.set_throttled(true);

    let started = tokio::time::Instant::now();
    let report = h.orchestrator.run_scan().await;
    assert_eq!(report.status, ScanStatus::Throttled);
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(h.market.total_detail_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_alert_spacing_applies_after_each_publish() {
    let h = harness_with(ScanSettings {
        alert_spacing: Duration::from_secs(3),
        ..ScanSettings::immediate(20)
    });
    for (addr, sym) in [("A1", "AAA"), ("B2", "BBB")] {
        h.market.add_token(
            Candidate::new(addr, "Token", sym),
            fresh_overview(),
            safe_security(),
        );
    }
    h.market.add_token(
        Candidate::new("C3", "Token", "CCC"),
        Overview {
            liquidity: Some(10.0),
            ..fresh_overview()
        },
        safe_security(),
    );

    let started = tokio::time::Instant::now();
    h.orchestrator.run_scan().await;
    let elapsed = started.elapsed();
    // Two publishes, no pause for the rejected one.
    assert!(elapsed >= Duration::from_secs(6));
    assert!(elapsed < Duration::from_secs(9));
}

#[tokio::test]
async fn test_recording_sink_accepts_publish() {
    let sink = RecordingSink::new();
    let candidate = Candidate::new("Z9", "Zed", "ZED");
    tokio_test::assert_ok!(
        sink.publish(&candidate, &Overview::default(), &SecurityProfile::default())
            .await
    );
    assert_eq!(sink.addresses(), vec!["Z9".to_string()]);
}

// ---------------------------------------------------------------------------
// Monitor lifecycle
// ---------------------------------------------------------------------------

fn stopped_controller(market: &MockMarket, sink: &RecordingSink) -> MonitorController {
    let client = MarketDataClient::new(
        Arc::new(market.clone()),
        Arc::new(Unmetered::default()),
        50,
    );
    let orchestrator = ScanOrchestrator::new(
        client,
        CriteriaEvaluator::default(),
        Arc::new(sink.clone()),
        MonitorSwitch::new(),
        ScanSettings::immediate(20),
    );
    MonitorController::new(Arc::new(orchestrator), Duration::from_secs(60))
}

#[tokio::test(start_paused = true)]
async fn test_monitor_picks_up_new_listings_each_tick() {
    let market = MockMarket::new();
    let sink = RecordingSink::new();
    market.add_token(
        Candidate::new("X1", "Foo", "ABCX"),
        fresh_overview(),
        safe_security(),
    );
    let ctl = stopped_controller(&market, &sink);

    assert_eq!(ctl.start(), StartOutcome::Started);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.addresses(), vec!["X1".to_string()]);

    market.add_token(
        Candidate::new("Y2", "Bar", "BARR"),
        Overview {
            last_trade_time: Some(chrono::Utc::now()),
            ..fresh_overview()
        },
        safe_security(),
    );
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(sink.addresses(), vec!["X1".to_string(), "Y2".to_string()]);

    let status = ctl.status().await;
    assert_eq!(status.state, MonitorState::Active);
    assert_eq!(status.total_processed, 2);
    ctl.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_stopped_monitor_makes_no_requests() {
    let market = MockMarket::new();
    let sink = RecordingSink::new();
    let ctl = stopped_controller(&market, &sink);

    let report = ctl.orchestrator().run_scan().await;
    assert_eq!(report.status, ScanStatus::Inactive);

    ctl.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    ctl.stop();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(market.listing_calls(), 1);
    assert_eq!(ctl.status().await.state, MonitorState::Stopped);
}
