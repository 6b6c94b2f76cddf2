//! Integration tests for the breakout scanner
//!
//! These tests drive the scanner and scheduler end to end against an
//! in-memory broker with scripted responses.

use approx::assert_relative_eq;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use breakout_scanner::broker::{
    AccountInfo, Broker, BrokerError, BrokerResult, OrderAck, PositionInfo,
};
use breakout_scanner::config::ScanConfig;
use breakout_scanner::indicators;
use breakout_scanner::orders::BracketOrder;
use breakout_scanner::risk::position_size;
use breakout_scanner::scanner::{CycleOutcome, Scanner};
use breakout_scanner::scheduler::{Scheduler, TickOutcome};
use breakout_scanner::screener::{screen_bars, ScreenParams};
use breakout_scanner::{Bar, Clock, Snapshot, TradingStatus};

// =============================================================================
// Test Utilities
// =============================================================================

fn bar(i: usize, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap()
            + ChronoDuration::minutes(i as i64),
        open: close,
        high,
        low,
        close,
        volume,
    }
}

/// Flat 106-108 range, then a breakout bar closing `jump` above 108.
/// All prices are multiplied by `scale`. With `scale = 1, jump = 2` every
/// true range is 2, so ATR = 2 and the breakout closes at 110.
fn breakout_bars(count: usize, scale: f64, jump: f64) -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..count - 2)
        .map(|i| bar(i, 108.0 * scale, 106.0 * scale, 107.0 * scale, 500_000.0))
        .collect();
    bars.push(bar(
        count - 2,
        108.0 * scale,
        106.0 * scale,
        108.0 * scale,
        500_000.0,
    ));
    bars.push(bar(
        count - 1,
        (108.0 + jump) * scale,
        108.0 * scale,
        (108.0 + jump) * scale,
        1_000_000.0,
    ));
    bars
}

/// Quiet series that never breaks out
fn flat_bars(count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| bar(i, 108.0, 106.0, 107.0, 500_000.0))
        .collect()
}

/// Deterministic zig-zag walk, the shape the screener sees most of the day
fn generate_mock_bars(count: usize, base_price: f64, volatility: f64, seed: usize) -> Vec<Bar> {
    let mut price = base_price;
    (0..count)
        .map(|i| {
            let change = match (i + seed) % 3 {
                0 => volatility,
                1 => -volatility * 0.5,
                _ => volatility * 0.3,
            };
            price += change;
            let volume = 400_000.0 + ((i * 7919 + seed * 104_729) % 900_000) as f64;
            bar(
                i,
                price + volatility * 0.5,
                price - volatility * 0.5,
                price,
                volume,
            )
        })
        .collect()
}

/// Scripted broker. `None` responses become errors.
struct MockBroker {
    market_open: Option<bool>,
    account: Option<AccountInfo>,
    positions: Option<Vec<PositionInfo>>,
    bars: HashMap<String, Vec<Bar>>,
    statuses: HashMap<String, TradingStatus>,
    snapshot_failures: HashSet<String>,
    reject_orders: bool,

    clock_calls: AtomicUsize,
    account_calls: AtomicUsize,
    bar_requests: Mutex<Vec<String>>,
    orders: Mutex<Vec<BracketOrder>>,
}

impl MockBroker {
    fn new(buying_power: f64) -> Self {
        Self {
            market_open: Some(true),
            account: Some(AccountInfo {
                buying_power: Some(buying_power.to_string()),
                equity: Some(buying_power.to_string()),
                trading_blocked: false,
            }),
            positions: Some(Vec::new()),
            bars: HashMap::new(),
            statuses: HashMap::new(),
            snapshot_failures: HashSet::new(),
            reject_orders: false,
            clock_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            bar_requests: Mutex::new(Vec::new()),
            orders: Mutex::new(Vec::new()),
        }
    }

    fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    fn with_status(mut self, symbol: &str, status: TradingStatus) -> Self {
        self.statuses.insert(symbol.to_string(), status);
        self
    }

    fn with_positions(mut self, count: usize) -> Self {
        let positions = (0..count)
            .map(|i| PositionInfo {
                symbol: format!("HOLD{}", i),
                qty: "10".to_string(),
            })
            .collect();
        self.positions = Some(positions);
        self
    }

    fn orders(&self) -> Vec<BracketOrder> {
        self.orders.lock().unwrap().clone()
    }

    fn bar_requests(&self) -> Vec<String> {
        self.bar_requests.lock().unwrap().clone()
    }
}

impl Broker for MockBroker {
    async fn clock(&self) -> BrokerResult<Clock> {
        self.clock_calls.fetch_add(1, Ordering::SeqCst);
        match self.market_open {
            Some(is_open) => Ok(Clock {
                is_open,
                next_open: None,
                next_close: None,
            }),
            None => Err(BrokerError::Timeout),
        }
    }

    async fn account(&self) -> BrokerResult<AccountInfo> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.account.clone().ok_or(BrokerError::Api {
            status: 401,
            body: "unauthorized".into(),
        })
    }

    async fn positions(&self) -> BrokerResult<Vec<PositionInfo>> {
        self.positions
            .clone()
            .ok_or(BrokerError::Transport("connection reset".into()))
    }

    async fn bars(&self, symbol: &str, _timeframe: &str, limit: usize) -> BrokerResult<Vec<Bar>> {
        self.bar_requests.lock().unwrap().push(symbol.to_string());
        let bars = self
            .bars
            .get(symbol)
            .ok_or(BrokerError::MissingField("bars"))?;
        let start = bars.len().saturating_sub(limit);
        Ok(bars[start..].to_vec())
    }

    async fn snapshot(&self, symbol: &str) -> BrokerResult<Snapshot> {
        if self.snapshot_failures.contains(symbol) {
            return Err(BrokerError::RetriesExhausted {
                attempts: 3,
                last: Box::new(BrokerError::RateLimited),
            });
        }
        Ok(Snapshot {
            trading_status: self.statuses.get(symbol).cloned().unwrap_or_default(),
        })
    }

    async fn place_bracket_order(&self, order: &BracketOrder) -> BrokerResult<OrderAck> {
        self.orders.lock().unwrap().push(order.clone());
        if self.reject_orders {
            return Err(BrokerError::Api {
                status: 403,
                body: "insufficient buying power".into(),
            });
        }
        Ok(OrderAck {
            id: format!("order-{}", self.orders.lock().unwrap().len()),
            status: "accepted".to_string(),
        })
    }
}

fn scan_config(universe: &[&str]) -> ScanConfig {
    ScanConfig {
        universe: universe.iter().map(|s| s.to_string()).collect(),
        ..ScanConfig::default()
    }
}

// =============================================================================
// Scan Cycle Tests
// =============================================================================

#[tokio::test]
async fn test_breakout_scenario_submits_one_bracket_order() {
    let broker = MockBroker::new(50_000.0).with_bars("X", breakout_bars(120, 1.0, 2.0));
    let scanner = Scanner::new(broker, scan_config(&["X"]));

    let outcome = scanner.run_cycle().await.unwrap();

    let orders = scanner.broker().orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.symbol, "X");
    assert_eq!(order.qty, 250);
    assert_eq!(order.stop_price, dec!(108.00));
    assert_eq!(order.take_profit_price, dec!(114.00));
    assert_eq!(order.time_in_force, "day");

    match outcome {
        CycleOutcome::Submitted { order, ack } => {
            assert_eq!(order.qty, 250);
            assert_eq!(ack.status, "accepted");
        }
        other => panic!("expected submission, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_candidates_submits_nothing() {
    let broker = MockBroker::new(50_000.0)
        .with_bars("AAA", flat_bars(120))
        .with_bars("BBB", flat_bars(120));
    let scanner = Scanner::new(broker, scan_config(&["AAA", "BBB"]));

    let outcome = scanner.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::NoCandidates);
    assert!(scanner.broker().orders().is_empty());
    assert_eq!(scanner.broker().bar_requests(), vec!["AAA", "BBB"]);
}

#[tokio::test]
async fn test_strongest_candidate_wins() {
    let broker = MockBroker::new(50_000.0)
        .with_bars("WEAK", breakout_bars(120, 1.0, 2.0))
        .with_bars("FLAT", flat_bars(120))
        .with_bars("STRONG", breakout_bars(120, 1.0, 4.0));
    let scanner = Scanner::new(broker, scan_config(&["WEAK", "FLAT", "STRONG"]));

    let outcome = scanner.run_cycle().await.unwrap();

    let orders = scanner.broker().orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].symbol, "STRONG");
    assert!(outcome.traded());
}

#[tokio::test]
async fn test_unaffordable_leader_falls_through_to_next() {
    // 1% of 500 is a 5 risk budget. STRONG trades near 560 with ATR ~10.7,
    // so it sizes to zero; WEAK (ATR 2) sizes to 2 shares.
    let broker = MockBroker::new(500.0)
        .with_bars("STRONG", breakout_bars(120, 5.0, 4.0))
        .with_bars("WEAK", breakout_bars(120, 1.0, 2.0));
    let scanner = Scanner::new(broker, scan_config(&["STRONG", "WEAK"]));

    scanner.run_cycle().await.unwrap();

    let orders = scanner.broker().orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].symbol, "WEAK");
    assert_eq!(orders[0].qty, 2);
}

#[tokio::test]
async fn test_all_sized_to_zero() {
    let broker = MockBroker::new(50.0).with_bars("X", breakout_bars(120, 1.0, 2.0));
    let scanner = Scanner::new(broker, scan_config(&["X"]));

    let outcome = scanner.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::AllSizedToZero { candidates: 1 });
    assert!(scanner.broker().orders().is_empty());
}

#[tokio::test]
async fn test_position_cap_skips_screening() {
    let broker = MockBroker::new(50_000.0)
        .with_bars("X", breakout_bars(120, 1.0, 2.0))
        .with_positions(5);
    let scanner = Scanner::new(broker, scan_config(&["X"]));

    let outcome = scanner.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::AtCapacity { open: 5, cap: 5 });
    assert!(scanner.broker().bar_requests().is_empty());
    assert!(scanner.broker().orders().is_empty());
}

#[tokio::test]
async fn test_account_unavailable_ends_cycle() {
    let mut broker = MockBroker::new(50_000.0).with_bars("X", breakout_bars(120, 1.0, 2.0));
    broker.account = None;
    let scanner = Scanner::new(broker, scan_config(&["X"]));

    let outcome = scanner.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::AccountUnavailable);
    assert!(scanner.broker().bar_requests().is_empty());
}

#[tokio::test]
async fn test_trading_blocked_ends_cycle() {
    let mut broker = MockBroker::new(50_000.0).with_bars("X", breakout_bars(120, 1.0, 2.0));
    if let Some(account) = broker.account.as_mut() {
        account.trading_blocked = true;
    }
    let scanner = Scanner::new(broker, scan_config(&["X"]));

    assert_eq!(
        scanner.run_cycle().await.unwrap(),
        CycleOutcome::TradingBlocked
    );
    assert!(scanner.broker().orders().is_empty());
}

#[tokio::test]
async fn test_positions_unavailable_ends_cycle() {
    let mut broker = MockBroker::new(50_000.0).with_bars("X", breakout_bars(120, 1.0, 2.0));
    broker.positions = None;
    let scanner = Scanner::new(broker, scan_config(&["X"]));

    assert_eq!(
        scanner.run_cycle().await.unwrap(),
        CycleOutcome::PositionsUnavailable
    );
    assert!(scanner.broker().bar_requests().is_empty());
}

#[tokio::test]
async fn test_malformed_account_is_error() {
    let mut broker = MockBroker::new(50_000.0);
    broker.account = Some(AccountInfo {
        buying_power: Some("n/a".into()),
        equity: None,
        trading_blocked: false,
    });
    let scanner = Scanner::new(broker, scan_config(&["X"]));

    let err = scanner.run_cycle().await.unwrap_err();
    assert!(err.to_string().contains("buying_power"));
}

#[tokio::test]
async fn test_untradeable_status_rejected() {
    let broker = MockBroker::new(50_000.0)
        .with_bars("HALT", breakout_bars(120, 1.0, 4.0))
        .with_status("HALT", TradingStatus::Halted)
        .with_bars("NEWS", breakout_bars(120, 1.0, 4.0))
        .with_status("NEWS", TradingStatus::from_code("T1"))
        .with_bars("OK", breakout_bars(120, 1.0, 2.0));
    let scanner = Scanner::new(broker, scan_config(&["HALT", "NEWS", "OK"]));

    scanner.run_cycle().await.unwrap();

    let orders = scanner.broker().orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].symbol, "OK");
}

#[tokio::test]
async fn test_missing_data_skips_symbol() {
    let mut broker = MockBroker::new(50_000.0)
        .with_bars("SNAPFAIL", breakout_bars(120, 1.0, 4.0))
        .with_bars("SHORT", breakout_bars(39, 1.0, 4.0));
    broker.snapshot_failures.insert("SNAPFAIL".to_string());
    // NOBARS has no scripted bars at all
    let scanner = Scanner::new(broker, scan_config(&["NOBARS", "SNAPFAIL", "SHORT"]));

    let outcome = scanner.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::NoCandidates);
    assert!(scanner.broker().orders().is_empty());
}

#[tokio::test]
async fn test_dry_run_sends_nothing() {
    let broker = MockBroker::new(50_000.0).with_bars("X", breakout_bars(120, 1.0, 2.0));
    let mut config = scan_config(&["X"]);
    config.dry_run = true;
    let scanner = Scanner::new(broker, config);

    let outcome = scanner.run_cycle().await.unwrap();

    match outcome {
        CycleOutcome::DryRun { order } => {
            assert_eq!(order.qty, 250);
            assert_eq!(order.stop_price, dec!(108.00));
        }
        other => panic!("expected dry run, got {:?}", other),
    }
    assert!(scanner.broker().orders().is_empty());
}

#[tokio::test]
async fn test_order_failure_is_not_retried_on_next_candidate() {
    let mut broker = MockBroker::new(50_000.0)
        .with_bars("A", breakout_bars(120, 1.0, 4.0))
        .with_bars("B", breakout_bars(120, 1.0, 2.0));
    broker.reject_orders = true;
    let scanner = Scanner::new(broker, scan_config(&["A", "B"]));

    let outcome = scanner.run_cycle().await.unwrap();

    assert_eq!(scanner.broker().orders().len(), 1);
    match outcome {
        CycleOutcome::OrderFailed { order, reason } => {
            assert_eq!(order.symbol, "A");
            assert!(reason.contains("403"));
        }
        other => panic!("expected order failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scan_limited_to_configured_prefix() {
    let broker = MockBroker::new(50_000.0)
        .with_bars("A", flat_bars(120))
        .with_bars("B", breakout_bars(120, 1.0, 2.0));
    let mut config = scan_config(&["A", "B"]);
    config.max_symbols_per_scan = 1;
    let scanner = Scanner::new(broker, config);

    assert_eq!(
        scanner.run_cycle().await.unwrap(),
        CycleOutcome::NoCandidates
    );
    assert_eq!(scanner.broker().bar_requests(), vec!["A"]);
}

// =============================================================================
// Scheduler Tests
// =============================================================================

#[tokio::test]
async fn test_closed_market_skips_cycle() {
    let mut broker = MockBroker::new(50_000.0).with_bars("X", breakout_bars(120, 1.0, 2.0));
    broker.market_open = Some(false);
    let scheduler = Scheduler::new(Scanner::new(broker, scan_config(&["X"])));

    assert_eq!(scheduler.tick().await.unwrap(), TickOutcome::MarketClosed);
    let broker = scheduler.scanner().broker();
    assert_eq!(broker.account_calls.load(Ordering::SeqCst), 0);
    assert!(broker.orders().is_empty());
}

#[tokio::test]
async fn test_clock_failure_counts_as_closed() {
    let mut broker = MockBroker::new(50_000.0);
    broker.market_open = None;
    let scheduler = Scheduler::new(Scanner::new(broker, scan_config(&["X"])));

    assert_eq!(scheduler.tick().await.unwrap(), TickOutcome::MarketClosed);
    assert_eq!(
        scheduler.scanner().broker().account_calls.load(Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn test_open_market_runs_cycle() {
    let broker = MockBroker::new(50_000.0).with_bars("X", breakout_bars(120, 1.0, 2.0));
    let scheduler = Scheduler::new(Scanner::new(broker, scan_config(&["X"])));

    match scheduler.tick().await.unwrap() {
        TickOutcome::Cycle(CycleOutcome::Submitted { order, .. }) => assert_eq!(order.qty, 250),
        other => panic!("expected a submitted cycle, got {:?}", other),
    }
}

#[tokio::test]
async fn test_run_until_stops_after_ready_shutdown() {
    let broker = MockBroker::new(50_000.0).with_bars("X", flat_bars(120));
    let scheduler = Scheduler::new(Scanner::new(broker, scan_config(&["X"])))
        .with_interval(Duration::from_secs(3600));

    let stats = scheduler.run_until(async {}).await;

    assert_eq!(stats.ticks, 1);
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.failures, 0);
    assert_eq!(scheduler.scanner().broker().clock_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_ticks_keep_loop_alive() {
    let mut broker = MockBroker::new(50_000.0);
    broker.account = Some(AccountInfo {
        buying_power: Some("garbage".into()),
        equity: None,
        trading_blocked: false,
    });
    let scheduler = Scheduler::new(Scanner::new(broker, scan_config(&["X"])))
        .with_interval(Duration::from_secs(3600))
        .with_recovery_pause(Duration::from_millis(1));

    let stats = scheduler
        .run_until(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    assert!(stats.ticks >= 2, "expected several ticks, got {:?}", stats);
    assert_eq!(stats.failures, stats.ticks);
    assert_eq!(stats.cycles, 0);
}

// =============================================================================
// Screening and Sizing Properties
// =============================================================================

#[test]
fn test_indicators_undefined_below_minimum_history() {
    let values: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
    for period in 1..=20 {
        for len in 0..period {
            assert!(indicators::sma(&values[..len], period).is_none());
            assert!(indicators::highest(&values[..len], period).is_none());
        }
        // ATR needs one extra close for the first true range
        for len in 0..=period {
            let slice = &values[..len];
            assert!(indicators::atr(slice, slice, slice, period).is_none());
        }
    }
}

#[test]
fn test_atr_of_constant_series_is_zero() {
    let prices = vec![42.0; 30];
    let atr = indicators::atr(&prices, &prices, &prices, indicators::DEFAULT_ATR_PERIOD);
    assert_eq!(atr, Some(0.0));
}

#[test]
fn test_every_candidate_has_ordered_bracket() {
    let mut cases = 0;
    let mut produced = 0;

    for scale in [0.25, 1.0, 3.0, 6.0] {
        for jump in [0.5, 2.0, 4.0, 8.0] {
            for (stop_mult, take_mult) in [(0.5, 1.0), (1.0, 2.0), (2.0, 3.0)] {
                let params = ScreenParams {
                    stop_atr_mult: stop_mult,
                    take_profit_atr_mult: take_mult,
                    ..ScreenParams::from(&ScanConfig::default())
                };
                cases += 1;

                let bars = breakout_bars(120, scale, jump);
                let candidate = match screen_bars("SYM", &bars, &params) {
                    Ok(candidate) => candidate,
                    Err(_) => continue,
                };
                produced += 1;

                assert!(candidate.stop < candidate.entry);
                assert!(candidate.entry < candidate.take);
                assert_relative_eq!(candidate.atr, (26.0 + jump) / 14.0 * scale, epsilon = 1e-9);

                let order = BracketOrder::from_candidate(&candidate, 1, "day").unwrap();
                assert!(order.stop_price < order.take_profit_price);
            }
        }
    }

    // Every series breaks out inside the default price band
    assert!(produced > 0);
    assert_eq!(produced, cases);
}

#[test]
fn test_no_candidate_without_price_breakout() {
    let params = ScreenParams::from(&ScanConfig::default());

    for seed in 0..30 {
        let mut bars = generate_mock_bars(120, 100.0, 1.5, seed);
        let n = bars.len();
        let prior_high = bars[n - 21..n - 1]
            .iter()
            .map(|b| b.high)
            .fold(f64::MIN, f64::max);

        // Huge volume, close pinned at or below the prior 20-bar high
        bars[n - 1].volume = 50_000_000.0;
        bars[n - 1].close = prior_high - (seed % 3) as f64 * 0.25;
        bars[n - 1].high = bars[n - 1].close;

        assert!(screen_bars("SYM", &bars, &params).is_err());
    }
}

#[test]
fn test_no_candidate_when_only_volume_surges() {
    let params = ScreenParams::from(&ScanConfig::default());
    let mut bars = flat_bars(120);
    let n = bars.len();
    bars[n - 1].volume = 10_000_000.0;

    assert!(screen_bars("SYM", &bars, &params).is_err());
}

#[test]
fn test_sizing_examples() {
    assert_eq!(position_size(100_000.0, 100.0, 99.0, 0.01), 1000);
    assert_eq!(position_size(500.0, 100.0, 99.0, 0.01), 5);
    assert_eq!(position_size(50_000.0, 110.0, 108.0, 0.01), 250);
    assert_eq!(position_size(50_000.0, 0.0, 0.0, 0.01), 0);
    assert_eq!(position_size(50_000.0, -5.0, -6.0, 0.01), 0);

    // Capital clamp: a tight stop would buy more than the account can pay for
    assert_eq!(position_size(10_000.0, 100.0, 99.99, 0.5), 100);
}

#[test]
fn test_scenario_candidate_values() {
    let params = ScreenParams::from(&ScanConfig::default());
    let candidate = screen_bars("X", &breakout_bars(120, 1.0, 2.0), &params).unwrap();

    assert_relative_eq!(candidate.atr, 2.0, epsilon = 1e-9);
    assert_relative_eq!(candidate.breakout_level, 108.0);
    assert_relative_eq!(candidate.stop, 108.0, epsilon = 1e-9);
    assert_relative_eq!(candidate.take, 114.0, epsilon = 1e-9);
}
