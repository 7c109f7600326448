use super::Period;
use chrono::{DateTime, Days, NaiveTime, TimeDelta, Timelike, Utc};

/// Time granularity for bucketing.
///
/// All bucket boundaries are UTC, matching the `datetimeHour` and `date`
/// dimensions of the Cloudflare analytics dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    const fn format_str(self) -> &'static str {
        match self {
            Self::Hour => "%Y-%m-%dT%H:00:00Z",
            Self::Day => "%Y-%m-%d",
        }
    }

    fn step(self) -> TimeDelta {
        match self {
            Self::Hour => TimeDelta::hours(1),
            Self::Day => TimeDelta::days(1),
        }
    }

    /// Name of the GraphQL dimension whose values are this granularity's keys.
    pub const fn dimension(self) -> &'static str {
        match self {
            Self::Hour => "datetimeHour",
            Self::Day => "date",
        }
    }
}

/// Ordered, gap-free set of bucket keys covering one reporting period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketGrid {
    granularity: Granularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    keys: Vec<String>,
}

impl BucketGrid {
    /// Build the grid for `period` ending at the bucket that contains `now`.
    ///
    /// The last bucket is the partial current hour (or day); its samples may
    /// be incomplete.
    pub fn generate(period: Period, now: DateTime<Utc>) -> Self {
        let granularity = period.granularity();
        let count = period.bucket_count();
        let today = now.date_naive();
        let back = u32::try_from(count.saturating_sub(1)).unwrap_or(0);

        let start = match granularity {
            Granularity::Hour => {
                let current_hour = today.and_time(NaiveTime::MIN).and_utc()
                    + TimeDelta::hours(i64::from(now.hour()));
                current_hour - TimeDelta::hours(i64::from(back))
            }
            Granularity::Day => (today - Days::new(u64::from(back)))
                .and_time(NaiveTime::MIN)
                .and_utc(),
        };

        let fmt = granularity.format_str();
        let step = granularity.step();
        let keys = (0..count)
            .scan(start, |bucket, _| {
                let key = bucket.format(fmt).to_string();
                *bucket += step;
                Some(key)
            })
            .collect();

        Self {
            granularity,
            start,
            end: now,
            keys,
        }
    }

    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Start of the first bucket.
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// The instant the grid was generated for.
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
