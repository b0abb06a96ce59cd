#![no_main]

use std::sync::Arc;
use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use tollgate_core::clock::ManualClock;
use tollgate_core::token_bucket::TokenBucket;

fn param(byte: u8) -> f64 {
    f64::from(byte % 64 + 1) / 4.0
}

fuzz_target!(|data: &[u8]| {
    let [cap, rate, interval, ops @ ..] = data else {
        return;
    };
    let capacity = param(*cap);
    let clock = Arc::new(ManualClock::new());
    let Ok(bucket) =
        TokenBucket::with_clock(capacity, param(*rate), param(*interval), Arc::clone(&clock))
    else {
        return;
    };

    let mut consumed = 0.0;
    for pair in ops.chunks_exact(2) {
        let (op, arg) = (pair[0], pair[1]);
        match op % 6 {
            0 | 1 => {
                let requested = f64::from(arg) / 8.0;
                let before = bucket.total_consumed();
                let ok = bucket.consume(requested).expect("non-negative request");
                if ok {
                    consumed += requested;
                    assert!((bucket.total_consumed() - before - requested).abs() < 1e-9);
                } else {
                    assert!(requested > 0.0, "zero request denied");
                    assert_eq!(bucket.total_consumed(), before);
                }
            }
            2 => clock.advance(Duration::from_millis(u64::from(arg) * 37)),
            3 => {
                let requested = f64::from(arg) / 8.0;
                let wait = bucket.wait_time(requested).expect("non-negative request");
                if requested > capacity {
                    assert_eq!(wait, Duration::MAX);
                } else if wait == Duration::ZERO {
                    assert!(bucket.get_available_tokens() >= requested);
                }
            }
            4 => bucket.reset(),
            _ => {
                assert!(bucket.consume(-f64::from(arg) - 1.0).is_err());
            }
        }

        let available = bucket.get_available_tokens();
        assert!(available >= 0.0, "negative tokens: {available}");
        assert!(available <= capacity, "{available} > capacity {capacity}");
    }
    assert!((bucket.total_consumed() - consumed).abs() < 1e-6);
});
