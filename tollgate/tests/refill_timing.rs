//! Timer-driven refill behavior, under tokio's paused test clock.
//!
//! With `start_paused = true`, `sleep()` cooperatively yields to the
//! spawned refill task while auto-advancing the mock clock, so each test
//! walks through real refill deadlines in microseconds.

use std::time::Duration;

use tollgate::{LimitDefinition, Throttler};

fn def(id: &str, interval_seconds: u64, tokens_per_interval: u64) -> LimitDefinition {
    LimitDefinition {
        id: id.to_string(),
        interval_seconds,
        tokens_per_interval,
    }
}

fn assert_just_n(throttler: &Throttler, id: &str, n: usize) {
    for i in 0..n {
        assert!(throttler.allow(id), "call {} for {id} should be allowed", i + 1);
    }
    assert!(!throttler.allow(id), "call {} for {id} should be rejected", n + 1);
}

async fn sleep_secs_f64(secs: f64) {
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn two_limits_refill_on_their_own_cadences() {
    let throttler = Throttler::new();
    throttler
        .load_config(vec![def("ID1", 5, 10), def("ID2", 10, 100)])
        .unwrap();
    throttler.start().unwrap();

    // t=0: both budgets are full.
    assert_just_n(&throttler, "ID1", 10);
    assert_just_n(&throttler, "ID2", 100);

    // t=6s: ID1 refilled at 5s, ID2 not due until 10s.
    sleep_secs_f64(6.0).await;
    assert_just_n(&throttler, "ID1", 10);
    assert_just_n(&throttler, "ID2", 0);

    // t=11s: ID2 refilled at 10s (and ID1 again at 10s).
    sleep_secs_f64(5.0).await;
    assert_just_n(&throttler, "ID1", 10);
    assert_just_n(&throttler, "ID2", 100);

    throttler.stop();
}

#[tokio::test(start_paused = true)]
async fn refill_restores_exactly_after_deep_debt() {
    let throttler = Throttler::new();
    throttler.load_config(vec![def("a", 1, 2)]).unwrap();
    throttler.start().unwrap();

    // Hammer the id far past its budget.
    for _ in 0..50 {
        throttler.allow("a");
    }

    sleep_secs_f64(1.1).await;
    assert_just_n(&throttler, "a", 2);

    throttler.stop();
}

#[tokio::test(start_paused = true)]
async fn exhausting_one_id_leaves_others_untouched() {
    let throttler = Throttler::new();
    throttler
        .load_config(vec![def("a", 1, 1), def("b", 3, 1)])
        .unwrap();
    throttler.start().unwrap();

    assert_just_n(&throttler, "a", 1);
    assert_just_n(&throttler, "b", 1);

    // t=1.2s: a refilled at 1s, b still waiting for 3s.
    sleep_secs_f64(1.2).await;
    assert!(throttler.allow("a"));
    assert!(!throttler.allow("b"));

    // t=3.2s: b refilled at 3s.
    sleep_secs_f64(2.0).await;
    assert!(throttler.allow("b"));

    throttler.stop();
}

#[tokio::test(start_paused = true)]
async fn distinct_intervals_keep_exact_cadence_under_one_timer() {
    let throttler = Throttler::new();
    throttler
        .load_config(vec![def("f", 2, 1), def("g", 3, 1), def("h", 5, 1)])
        .unwrap();
    throttler.start().unwrap();

    for id in ["f", "g", "h"] {
        assert_just_n(&throttler, id, 1);
    }

    // t=1.5s: nothing due yet.
    sleep_secs_f64(1.5).await;
    for id in ["f", "g", "h"] {
        assert!(!throttler.allow(id), "{id} should still be exhausted");
    }

    // t=2.5s: only f (2s) has refilled. Spend its token again.
    sleep_secs_f64(1.0).await;
    assert!(throttler.allow("f"));
    assert!(!throttler.allow("g"));
    assert!(!throttler.allow("h"));

    // t=3.5s: g (3s) refilled; f's next refill is 4s, h's is 5s.
    sleep_secs_f64(1.0).await;
    assert!(throttler.allow("g"));
    assert!(!throttler.allow("f"));
    assert!(!throttler.allow("h"));

    // t=5.5s: h refilled at 5s and f at 4s; g not again until 6s.
    sleep_secs_f64(2.0).await;
    assert!(throttler.allow("h"));
    assert!(throttler.allow("f"));
    assert!(!throttler.allow("g"));

    throttler.stop();
}

#[tokio::test(start_paused = true)]
async fn stopped_throttler_schedules_nothing() {
    let throttler = Throttler::new();
    throttler.load_config(vec![def("a", 1, 1)]).unwrap();
    throttler.start().unwrap();
    assert_just_n(&throttler, "a", 1);
    throttler.stop();

    // No timer left armed; time passing changes nothing.
    sleep_secs_f64(10.0).await;
    assert!(!throttler.allow("a"));

    // A fresh start re-initializes and re-arms the chain.
    throttler.start().unwrap();
    assert_just_n(&throttler, "a", 1);
    sleep_secs_f64(1.1).await;
    assert!(throttler.allow("a"));

    throttler.stop();
}

#[tokio::test(start_paused = true)]
async fn reload_while_running_terminates_the_old_chain() {
    let throttler = Throttler::new();
    throttler.load_config(vec![def("old", 1, 1)]).unwrap();
    throttler.start().unwrap();
    assert!(throttler.allow("old"));

    throttler.load_config(vec![def("new", 2, 1)]).unwrap();

    // The old timer must not fire against the new bucket set.
    sleep_secs_f64(5.0).await;
    assert!(!throttler.allow("old"));
    assert!(!throttler.allow("new"));

    throttler.start().unwrap();
    assert_just_n(&throttler, "new", 1);
    sleep_secs_f64(2.1).await;
    assert!(throttler.allow("new"));

    throttler.stop();
}

#[tokio::test(start_paused = true)]
async fn refills_keep_the_start_phase() {
    let throttler = Throttler::new();
    throttler.load_config(vec![def("a", 2, 1)]).unwrap();
    throttler.start().unwrap();

    // Deadlines stay on the 2s grid pinned at start, regardless of when
    // tokens are spent.
    sleep_secs_f64(1.9).await;
    assert_just_n(&throttler, "a", 1);
    // t=2.1s: refill happened at 2s even though the token went at 1.9s.
    sleep_secs_f64(0.2).await;
    assert!(throttler.allow("a"));
    // t=3.9s: the token spent at 2.1s is gone and the next refill is 4s.
    sleep_secs_f64(1.8).await;
    assert!(!throttler.allow("a"));
    // t=4.05s: refilled at 4s, not at 2.1s + 2s.
    sleep_secs_f64(0.15).await;
    assert!(throttler.allow("a"));

    throttler.stop();
}
