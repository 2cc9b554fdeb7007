use std::sync::Arc;
use std::time::Duration;

use portalsim::churn;
use portalsim::engine::{EngineConfig, EngineError, OverlayConfig, SimulationEngine};
use portalsim::faults::{FaultConfig, RoutePolicy};
use portalsim::model::*;
use portalsim::session::SessionConfig;

// ── Test infrastructure ──────────────────────────────────────

/// Deterministic engine: seeded RNG, pinned reference month, no injected
/// faults or overlay noise unless a test opts in.
fn quiet_engine(seed: u64) -> SimulationEngine {
    SimulationEngine::new(EngineConfig {
        seed: Some(seed),
        reference_month: Some(MonthKey::new(2026, 8)),
        ..EngineConfig::quiet()
    })
}

fn seed_open_day(engine: &SimulationEngine, date: &str) -> BucketKey {
    let date: DateKey = date.parse().unwrap();
    let key = BucketKey::new(date.month_key(), "DXB", "Tourist");
    engine.store().insert_day(
        &key,
        date,
        DayRecord::with_default_slots(DayStatus::Available, SlotStatus::Available),
    );
    key
}

// ── The whole client journey against one engine ──────────────

#[tokio::test]
async fn full_portal_journey() {
    let engine = quiet_engine(501);
    seed_open_day(&engine, "2026-08-10");

    // login
    let grant = engine.login("applicant", "secret").await.unwrap();
    assert_eq!(grant.expires_in, 420);
    let token = grant.session_token;

    // session check
    let status = engine.validate_session(&token).await.unwrap();
    assert!(status.valid);
    assert!(status.time_remaining <= 420);

    // current month: standard grid straight from the store
    let reply = engine.calendar(&token, "2026-08", "DXB", "Tourist").await.unwrap();
    let grid = match reply {
        CalendarReply::Grid(g) => g,
        CalendarReply::Condensed(_) => panic!("standard month must be a grid"),
    };
    assert_eq!(grid.days.len(), 1);
    assert!(grid.days[0].is_open);

    // day drill-down
    let detail = engine
        .time_slots(&token, "2026-08-10", "DXB", "Tourist")
        .await
        .unwrap();
    assert_eq!(detail.total_slots, 40);
    assert_eq!(detail.available_slots, 40);

    // logout ends it for good
    engine.logout(&token).await.unwrap();
    let err = engine
        .calendar(&token, "2026-08", "DXB", "Tourist")
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::SessionExpired);
}

#[tokio::test]
async fn profile_cycle_over_six_months() {
    let engine = quiet_engine(502);
    let token = engine.login("a", "b").await.unwrap().session_token;

    // +1 condensed, +3 all-na, +4 all-full, +6 standard again
    let reply = engine.calendar(&token, "2026-09", "DXB", "Tourist").await.unwrap();
    assert!(matches!(reply, CalendarReply::Condensed(_)));

    let reply = engine.calendar(&token, "2026-11", "DXB", "Tourist").await.unwrap();
    match reply {
        CalendarReply::Grid(g) => {
            assert_eq!(g.days.len(), 30);
            assert!(g.days.iter().all(|d| d.status == DayStatus::Na));
        }
        _ => panic!("expected grid"),
    }

    let reply = engine.calendar(&token, "2026-12", "DXB", "Tourist").await.unwrap();
    match reply {
        CalendarReply::Grid(g) => {
            assert_eq!(g.days.len(), 31);
            assert!(g.days.iter().all(|d| d.status == DayStatus::Full));
        }
        _ => panic!("expected grid"),
    }

    let reply = engine.calendar(&token, "2027-02", "DXB", "Tourist").await.unwrap();
    match reply {
        CalendarReply::Grid(g) => assert!(g.days.is_empty()), // standard, empty store
        _ => panic!("expected grid"),
    }
}

#[tokio::test]
async fn injected_faults_surface_with_delay() {
    let engine = SimulationEngine::new(EngineConfig {
        seed: Some(503),
        faults: FaultConfig {
            generic: RoutePolicy::new(5, 10, 1.0),
            ..FaultConfig::disabled()
        },
        reference_month: Some(MonthKey::new(2026, 8)),
        session: SessionConfig::reliable(),
        overlay: OverlayConfig::transparent(),
    });
    // logout is a generic route; every call must fail 429 or 503, but only
    // after its delay has been served
    let before = std::time::Instant::now();
    let err = engine.logout("ust_whatever").await.unwrap_err();
    assert!(err.is_injected());
    assert!(before.elapsed() >= Duration::from_millis(5));
}

#[tokio::test(start_paused = true)]
async fn churn_feeds_the_calendar() {
    let engine = Arc::new(SimulationEngine::new(EngineConfig {
        seed: Some(504),
        reference_month: Some(MonthKey::new(2026, 8)),
        ..EngineConfig::quiet()
    }));
    // all days closed: only Activate/Wipe can touch them at first
    let key = BucketKey::new(MonthKey::new(2026, 8), "DXB", "Tourist");
    for date in key.month.dates() {
        engine.store().insert_day(
            &key,
            date,
            DayRecord::with_default_slots(DayStatus::Na, SlotStatus::Booked),
        );
    }

    let handle = tokio::spawn(churn::run_churn(engine.clone()));
    tokio::time::sleep(Duration::from_secs(600)).await;
    handle.abort();

    let event = engine.last_mutation().expect("churn ran at least once");
    assert!(event.at > 0);

    // the store still parses into a coherent calendar
    let token = engine.login("a", "b").await.unwrap().session_token;
    let reply = engine.calendar(&token, "2026-08", "DXB", "Tourist").await.unwrap();
    match reply {
        CalendarReply::Grid(g) => assert_eq!(g.days.len(), 31),
        _ => panic!("expected grid"),
    }
}

#[tokio::test]
async fn seeded_engines_replay_identically() {
    async fn transcript(seed: u64) -> Vec<String> {
        let engine = quiet_engine(seed);
        let key = BucketKey::new(MonthKey::new(2026, 8), "DXB", "Tourist");
        engine.store().seed_month(&key, 0.5, engine.rng());
        let mut out = Vec::new();
        for _ in 0..20 {
            let event = engine.run_auto_mutation().await;
            out.push(format!(
                "{}:{}:{}",
                event.kind.label(),
                event
                    .target
                    .as_ref()
                    .map(|(_, d)| d.to_string())
                    .unwrap_or_default(),
                event.slots_changed
            ));
        }
        out
    }

    let a = transcript(505).await;
    let b = transcript(505).await;
    assert_eq!(a, b);
    let c = transcript(506).await;
    assert_ne!(a, c);
}
