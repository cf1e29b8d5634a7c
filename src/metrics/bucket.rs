use serde::ser::{Serialize, SerializeMap, Serializer};

// ─── Status classes ──────────────────────────────────────────────

/// The four response classes a bucket counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Success,
    Redirect,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub const ALL: [StatusClass; 4] = [
        StatusClass::Success,
        StatusClass::Redirect,
        StatusClass::ClientError,
        StatusClass::ServerError,
    ];

    /// `None` for anything outside 2xx..5xx (1xx, garbage codes).
    pub fn from_status(status: u16) -> Option<Self> {
        match status / 100 {
            2 => Some(Self::Success),
            3 => Some(Self::Redirect),
            4 => Some(Self::ClientError),
            5 => Some(Self::ServerError),
            _ => None,
        }
    }

    /// A timed-out request is a server error whatever it eventually returns.
    pub fn classify(status: u16, timed_out: bool) -> Option<Self> {
        if timed_out {
            Some(Self::ServerError)
        } else {
            Self::from_status(status)
        }
    }

    /// Leading digit of the class, also the JSON key.
    pub fn digit(self) -> u8 {
        match self {
            Self::Success => 2,
            Self::Redirect => 3,
            Self::ClientError => 4,
            Self::ServerError => 5,
        }
    }

    fn index(self) -> usize {
        (self.digit() - 2) as usize
    }
}

// ─── Response bucket ─────────────────────────────────────────────

/// Aggregate of the request outcomes seen during one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBucket {
    counts: [u64; 4],
    count: u64,
    mean: f64,
    /// Epoch milliseconds at which the bucket opened.
    timestamp: i64,
}

impl ResponseBucket {
    /// New bucket holding a single observation.
    pub fn open(started_at_ms: i64, response_time_ms: f64, class: StatusClass) -> Self {
        let mut counts = [0; 4];
        counts[class.index()] = 1;
        Self {
            counts,
            count: 1,
            mean: response_time_ms,
            timestamp: started_at_ms,
        }
    }

    /// Empty bucket the sampler appends so silent intervals still get one.
    pub fn placeholder(started_at_ms: i64) -> Self {
        Self {
            counts: [0; 4],
            count: 0,
            mean: 0.0,
            timestamp: started_at_ms,
        }
    }

    /// Incremental mean; exact up to float accumulation error.
    pub fn fold(&mut self, response_time_ms: f64, class: StatusClass) {
        self.count += 1;
        self.counts[class.index()] += 1;
        self.mean += (response_time_ms - self.mean) / self.count as f64;
    }

    /// Still accepting folds at `now_ms`.
    pub fn is_open(&self, now_ms: i64, interval_secs: u64) -> bool {
        now_ms < self.closes_at(interval_secs)
    }

    fn closes_at(&self, interval_secs: u64) -> i64 {
        self.timestamp
            .saturating_add((interval_secs as i64).saturating_mul(1000))
    }

    pub fn count_of(&self, class: StatusClass) -> u64 {
        self.counts[class.index()]
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// `{"2":n,"3":n,"4":n,"5":n,"count":n,"mean":ms,"timestamp":ms}`
impl Serialize for ResponseBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        for class in StatusClass::ALL {
            map.serialize_entry(&class.digit().to_string(), &self.count_of(class))?;
        }
        map.serialize_entry("count", &self.count)?;
        map.serialize_entry("mean", &self.mean)?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.end()
    }
}
