//! Per-client visit counting
//!
//! Each client carries two entries in whatever store the hosting layer
//! gives it (a cookie pair or a session mapping): a `visits` counter and a
//! `last_visit` timestamp. On every tracked request the counter is bumped
//! once the configured threshold has passed since the last counted visit.
//!
//! The decision itself is a pure function of the store contents and the
//! current time; writing the entries back is left to the caller.

pub mod cookie;
pub mod session;
pub mod signing;

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub use cookie::CookieStore;
pub use session::SessionStore;
pub use signing::CookieSigner;

/// Store key holding the string-encoded visit counter
pub const VISITS_KEY: &str = "visits";

/// Store key holding the encoded timestamp of the last counted visit
pub const LAST_VISIT_KEY: &str = "last_visit";

/// Logical storage format of `last_visit`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A new visit is counted once a full day has passed
pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(24 * 60 * 60);

/// Short threshold for manual testing
pub const DEBUG_THRESHOLD: Duration = Duration::from_secs(5);

/// Key-value view of one client's persistent store.
///
/// Implementations own the wire encoding of the timestamp entry, so the
/// default methods describe the plain `YYYY-MM-DD HH:MM:SS` form and
/// stores that add extra framing override them.
pub trait PerClientStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String);

    fn encode_timestamp(&self, at: NaiveDateTime) -> String {
        format_timestamp(at)
    }

    fn decode_timestamp(&self, raw: &str) -> Option<NaiveDateTime> {
        parse_timestamp(raw)
    }
}

impl PerClientStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }
}

/// Why a store entry could not be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("entry '{0}' is missing")]
    Missing(&'static str),
    #[error("entry '{key}' is malformed: {value:?}")]
    Malformed { key: &'static str, value: String },
}

/// Outcome of evaluating one request against a client's store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitState {
    /// Count to show on the page
    pub visits: u64,
    /// Whether both entries must be written back
    pub should_persist: bool,
    /// Encoded `now`, present only when persisting
    pub last_visit: Option<String>,
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

fn read_visits<S: PerClientStore + ?Sized>(store: &S) -> Result<u64, EntryError> {
    let raw = store
        .get(VISITS_KEY)
        .ok_or(EntryError::Missing(VISITS_KEY))?;

    match raw.trim().parse::<u64>() {
        Ok(count) if count >= 1 => Ok(count),
        _ => Err(EntryError::Malformed {
            key: VISITS_KEY,
            value: raw,
        }),
    }
}

fn read_last_visit<S: PerClientStore + ?Sized>(store: &S) -> Result<NaiveDateTime, EntryError> {
    let raw = store
        .get(LAST_VISIT_KEY)
        .ok_or(EntryError::Missing(LAST_VISIT_KEY))?;

    store
        .decode_timestamp(&raw)
        .ok_or(EntryError::Malformed {
            key: LAST_VISIT_KEY,
            value: raw,
        })
}

/// Decide whether this request counts as a new visit.
///
/// Missing or malformed entries never fail the request: a bad counter
/// reads as 1 and a bad timestamp reads as "no prior visit".
pub fn compute_visit_state<S: PerClientStore + ?Sized>(
    store: &S,
    now: NaiveDateTime,
    threshold: Duration,
) -> VisitState {
    let visits = read_visits(store).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "defaulting visit count to 1");
        1
    });

    let (visits, should_persist) = match read_last_visit(store) {
        Ok(last_visit) => {
            // A timestamp from the future (clock skew) never counts
            let elapsed_enough = (now - last_visit)
                .to_std()
                .map(|elapsed| elapsed >= threshold)
                .unwrap_or(false);

            if elapsed_enough {
                (visits.saturating_add(1), true)
            } else {
                (visits, false)
            }
        }
        Err(err) => {
            tracing::debug!(error = %err, "treating request as first visit");
            (visits, true)
        }
    };

    VisitState {
        visits,
        should_persist,
        last_visit: should_persist.then(|| store.encode_timestamp(now)),
    }
}

/// Visit counting with a fixed threshold
#[derive(Debug, Clone, Copy)]
pub struct VisitTracker {
    threshold: Duration,
}

impl Default for VisitTracker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl VisitTracker {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn compute<S: PerClientStore + ?Sized>(&self, store: &S, now: NaiveDateTime) -> VisitState {
        compute_visit_state(store, now, self.threshold)
    }

    /// Evaluate the request and write both entries back when needed.
    /// Returns the count for the rendering context.
    pub fn track<S: PerClientStore + ?Sized>(&self, store: &mut S, now: NaiveDateTime) -> u64 {
        let state = self.compute(store, now);

        if let Some(last_visit) = state.last_visit {
            store.set(VISITS_KEY, state.visits.to_string());
            store.set(LAST_VISIT_KEY, last_visit);
        }

        state.visits
    }

    /// Count currently stored, without counting this request
    pub fn current_visits<S: PerClientStore + ?Sized>(&self, store: &S) -> u64 {
        read_visits(store).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap()
    }

    fn store(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_store_is_first_visit() {
        let state = compute_visit_state(&store(&[]), now(), DEFAULT_THRESHOLD);

        assert_eq!(
            state,
            VisitState {
                visits: 1,
                should_persist: true,
                last_visit: Some("2024-03-15 12:30:45".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_last_visit_keeps_stored_count() {
        let state = compute_visit_state(&store(&[("visits", "7")]), now(), DEFAULT_THRESHOLD);

        assert_eq!(state.visits, 7);
        assert!(state.should_persist);
        assert!(state.last_visit.is_some());
    }

    #[test]
    fn test_elapsed_past_threshold_increments() {
        let last = format_timestamp(now() - TimeDelta::hours(25));
        let state = compute_visit_state(
            &store(&[("visits", "4"), ("last_visit", &last)]),
            now(),
            DEFAULT_THRESHOLD,
        );

        assert_eq!(state.visits, 5);
        assert!(state.should_persist);
        assert_eq!(state.last_visit.as_deref(), Some("2024-03-15 12:30:45"));
    }

    #[test]
    fn test_elapsed_below_threshold_is_unchanged() {
        let last = format_timestamp(now() - TimeDelta::hours(1));
        let state = compute_visit_state(
            &store(&[("visits", "4"), ("last_visit", &last)]),
            now(),
            DEFAULT_THRESHOLD,
        );

        assert_eq!(
            state,
            VisitState {
                visits: 4,
                should_persist: false,
                last_visit: None,
            }
        );
    }

    #[test]
    fn test_exactly_threshold_counts() {
        let last = format_timestamp(now() - TimeDelta::hours(24));
        let state = compute_visit_state(
            &store(&[("visits", "2"), ("last_visit", &last)]),
            now(),
            DEFAULT_THRESHOLD,
        );

        assert_eq!(state.visits, 3);
        assert!(state.should_persist);
    }

    #[test]
    fn test_debug_threshold() {
        let last = format_timestamp(now() - TimeDelta::seconds(6));
        let entries = store(&[("visits", "2"), ("last_visit", &last)]);

        assert_eq!(compute_visit_state(&entries, now(), DEBUG_THRESHOLD).visits, 3);
        assert_eq!(compute_visit_state(&entries, now(), DEFAULT_THRESHOLD).visits, 2);
    }

    #[test]
    fn test_future_timestamp_does_not_count() {
        let last = format_timestamp(now() + TimeDelta::days(3));
        let state = compute_visit_state(
            &store(&[("visits", "2"), ("last_visit", &last)]),
            now(),
            DEFAULT_THRESHOLD,
        );

        assert_eq!(state.visits, 2);
        assert!(!state.should_persist);
    }

    #[test]
    fn test_malformed_visits_treated_as_missing() {
        let last = format_timestamp(now() - TimeDelta::hours(1));

        for bad in ["abc", "", "0", "-3", "4.5"] {
            let malformed = compute_visit_state(
                &store(&[("visits", bad), ("last_visit", &last)]),
                now(),
                DEFAULT_THRESHOLD,
            );
            let missing =
                compute_visit_state(&store(&[("last_visit", &last)]), now(), DEFAULT_THRESHOLD);

            assert_eq!(malformed, missing, "visits={bad:?}");
            assert_eq!(malformed.visits, 1);
        }
    }

    #[test]
    fn test_malformed_last_visit_treated_as_missing() {
        let state = compute_visit_state(
            &store(&[("visits", "9"), ("last_visit", "yesterday-ish")]),
            now(),
            DEFAULT_THRESHOLD,
        );

        assert_eq!(state.visits, 9);
        assert!(state.should_persist);
        assert_eq!(state.last_visit.as_deref(), Some("2024-03-15 12:30:45"));
    }

    #[test]
    fn test_timestamp_round_trip() {
        let original = now();
        let parsed = parse_timestamp(&format_timestamp(original)).unwrap();
        assert_eq!(parsed, original);

        let with_millis = original + TimeDelta::milliseconds(250);
        let parsed = parse_timestamp(&format_timestamp(with_millis)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_track_persists_only_when_flagged() {
        let tracker = VisitTracker::default();
        let mut entries = store(&[]);

        assert_eq!(tracker.track(&mut entries, now()), 1);
        assert_eq!(entries.get("visits").map(String::as_str), Some("1"));
        assert_eq!(
            entries.get("last_visit").map(String::as_str),
            Some("2024-03-15 12:30:45")
        );

        // Within the threshold nothing is rewritten
        let later = now() + TimeDelta::hours(2);
        assert_eq!(tracker.track(&mut entries, later), 1);
        assert_eq!(
            entries.get("last_visit").map(String::as_str),
            Some("2024-03-15 12:30:45")
        );

        let next_day = now() + TimeDelta::hours(30);
        assert_eq!(tracker.track(&mut entries, next_day), 2);
        assert_eq!(entries.get("visits").map(String::as_str), Some("2"));
        assert_eq!(
            entries.get("last_visit").map(String::as_str),
            Some("2024-03-16 18:30:45")
        );
    }

    #[test]
    fn test_count_never_decreases() {
        let tracker = VisitTracker::new(Duration::from_secs(60));
        let mut entries = store(&[]);
        let mut previous = 0;

        for minutes in [0, 1, 30, 61, 62, 200, 199, 500] {
            let count = tracker.track(&mut entries, now() + TimeDelta::minutes(minutes));
            assert!(count >= previous);
            previous = count;
        }
    }

    #[test]
    fn test_current_visits_does_not_count() {
        let tracker = VisitTracker::default();
        assert_eq!(tracker.threshold(), DEFAULT_THRESHOLD);
        let entries = store(&[("visits", "12")]);

        assert_eq!(tracker.current_visits(&entries), 12);
        assert_eq!(tracker.current_visits(&store(&[])), 1);
        assert_eq!(tracker.current_visits(&store(&[("visits", "x")])), 1);
    }
}
