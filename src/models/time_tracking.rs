use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One finalized interval of tracked work on a task.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub start: Timestamp,
    pub end: Timestamp,
    /// Length of the session in milliseconds
    pub duration: i64,
}

/// Time-tracking record embedded in every task. At most one task in the
/// whole collection may have `is_active == true`; the timer service
/// maintains that invariant.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeTracking {
    /// Whether a session is currently open on this task
    pub is_active: bool,
    /// Start of the open session, cleared when it closes
    pub active_session_start: Option<Timestamp>,
    /// Finalized sessions, append-only
    pub sessions: Vec<Session>,
    /// Sum of all finalized session durations in milliseconds
    pub total_time: i64,
}

impl TimeTracking {
    pub fn open_session(&mut self, now: Timestamp) {
        self.is_active = true;
        self.active_session_start = Some(now);
    }

    /// Finalizes the open session, if any, and returns it. `total_time`
    /// grows by the session's duration.
    pub fn close_session(&mut self, now: Timestamp) -> Option<Session> {
        let start = self.active_session_start.take()?;
        self.is_active = false;

        let duration = now.as_millisecond() - start.as_millisecond();
        let session = Session {
            start,
            end: now,
            duration,
        };
        self.total_time += duration;
        self.sessions.push(session.clone());
        Some(session)
    }

    /// Elapsed milliseconds of the open session, computed from the wall
    /// clock on every call, never persisted.
    pub fn current_duration(&self, now: Timestamp) -> Option<i64> {
        if !self.is_active {
            return None;
        }
        self.active_session_start
            .map(|start| now.as_millisecond() - start.as_millisecond())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_millisecond(millis).unwrap()
    }

    #[test]
    fn test_close_session_finalizes_and_accumulates() {
        let mut tracking = TimeTracking::default();
        tracking.open_session(ts(1_000));
        assert!(tracking.is_active);

        let session = tracking.close_session(ts(4_500)).unwrap();
        assert_eq!(session.duration, 3_500);
        assert_eq!(session.start, ts(1_000));
        assert_eq!(session.end, ts(4_500));

        assert!(!tracking.is_active);
        assert!(tracking.active_session_start.is_none());
        assert_eq!(tracking.sessions.len(), 1);
        assert_eq!(tracking.total_time, 3_500);
    }

    #[test]
    fn test_total_time_equals_sum_of_sessions() {
        let mut tracking = TimeTracking::default();
        tracking.open_session(ts(0));
        tracking.close_session(ts(100));
        tracking.open_session(ts(200));
        tracking.close_session(ts(450));

        let sum: i64 = tracking.sessions.iter().map(|s| s.duration).sum();
        assert_eq!(tracking.total_time, sum);
        assert_eq!(tracking.total_time, 350);
    }

    #[test]
    fn test_close_session_without_open_session_is_noop() {
        let mut tracking = TimeTracking::default();
        assert!(tracking.close_session(ts(1_000)).is_none());
        assert_eq!(tracking.sessions.len(), 0);
        assert_eq!(tracking.total_time, 0);
    }

    #[test]
    fn test_current_duration_only_while_active() {
        let mut tracking = TimeTracking::default();
        assert!(tracking.current_duration(ts(5_000)).is_none());

        tracking.open_session(ts(2_000));
        assert_eq!(tracking.current_duration(ts(5_000)), Some(3_000));

        tracking.close_session(ts(5_000));
        assert!(tracking.current_duration(ts(9_000)).is_none());
    }
}
