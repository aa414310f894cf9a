use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

/// Source of "now" for validation and checkpoint timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant. Used by tests and replayed sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Midday UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        let noon = date.and_time(NaiveTime::MIN) + chrono::Duration::hours(12);
        Self { now: Utc.from_utc_datetime(&noon) }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
