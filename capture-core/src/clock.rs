use chrono::{NaiveDateTime, Utc};

/// Supplies the wall-clock timestamp attributed to a write.
///
/// Injected at construction time rather than read globally, so that tests can
/// substitute a fixed or stepped clock without touching the system clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Default `Clock` backed by the OS wall clock, recorded in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// A clock that advances by one second on every call, for deterministic
    /// ordering assertions in tests.
    pub struct StepClock {
        start: NaiveDateTime,
        ticks: AtomicI64,
    }

    impl StepClock {
        pub fn new(start: NaiveDateTime) -> Self {
            Self { start, ticks: AtomicI64::new(0) }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> NaiveDateTime {
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
            self.start + chrono::Duration::seconds(tick)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::NaiveDate;

        #[test]
        fn step_clock_advances_by_one_second_per_call() {
            let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
            let clock = StepClock::new(start);
            assert_eq!(clock.now(), start);
            assert_eq!(clock.now(), start + chrono::Duration::seconds(1));
            assert_eq!(clock.now(), start + chrono::Duration::seconds(2));
        }
    }
}
