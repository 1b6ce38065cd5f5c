//! Per-run farming state and pacing.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Seconds added to the server's farming end before a claim is attempted.
pub const FARMING_GRACE_SECS: i64 = 240;

/// Naive timestamp layouts the backend uses.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Gets current Unix timestamp in seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Parses a server timestamp into Unix seconds.
///
/// Offsets (`Z`, `+03:00`) are honored; naive timestamps are read as local time.
pub fn parse_server_time(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.timestamp())
}

/// Timers and counters that live across loop iterations of one account run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FarmState {
    /// Unix time after which a farming claim is attempted.
    pub farming_end_at: i64,

    /// Unix time of the next star bonus check.
    pub next_stars_check: i64,

    /// Unix time of the next combo check.
    pub next_combo_check: i64,

    /// Mini-game plays left in the current cycle.
    pub tickets: u32,
}

impl FarmState {
    /// Creates a fresh state; every timer is due immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if the farming cycle can be claimed.
    #[must_use]
    pub const fn farming_due(&self, now: i64) -> bool {
        now > self.farming_end_at
    }

    /// Tracks a server-reported farming end, plus the grace period.
    pub fn track_farming_end(&mut self, server_end_at: i64) {
        self.farming_end_at = server_end_at + FARMING_GRACE_SECS;
    }

    /// Tracks a farming cycle seen in the balance, if it is still running.
    ///
    /// Returns `true` when the cycle was tracked.
    pub fn observe_farming(&mut self, server_end_at: i64, now: i64) -> bool {
        if server_end_at > now {
            self.track_farming_end(server_end_at);
            true
        } else {
            false
        }
    }

    /// Seconds until the tracked farming end (zero when already passed).
    #[must_use]
    pub fn seconds_until_farming(&self, now: i64) -> u64 {
        u64::try_from(self.farming_end_at - now).unwrap_or(0)
    }

    #[must_use]
    pub const fn stars_due(&self, now: i64) -> bool {
        self.next_stars_check < now
    }

    #[must_use]
    pub const fn combo_due(&self, now: i64) -> bool {
        self.next_combo_check < now
    }

    /// Consumes one ticket; returns `false` when none are left.
    pub fn use_ticket(&mut self) -> bool {
        if self.tickets == 0 {
            return false;
        }
        self.tickets -= 1;
        true
    }
}

/// Sleeps inserted between steps of the loop.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Pause after a successful login.
    pub after_login: Duration,

    /// Pause between steps.
    pub step: Duration,

    /// Pause after a transient request failure.
    pub backoff: Duration,

    /// Simulated duration of one mini-game.
    pub game_duration: Duration,

    /// Pause after a claimed task.
    pub after_task: Duration,

    /// Pause before the run ends on a failed login.
    pub login_cooldown: Duration,

    /// Lower bound of the end-of-cycle sleep.
    pub min_cycle_sleep: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            after_login: Duration::from_secs(1),
            step: Duration::from_millis(1500),
            backoff: Duration::from_secs(1),
            game_duration: Duration::from_secs(30),
            after_task: Duration::from_secs(2),
            login_cooldown: Duration::from_secs(3600),
            min_cycle_sleep: Duration::from_secs(60),
        }
    }
}

impl Pacing {
    /// Pacing without any sleeps.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            after_login: Duration::ZERO,
            step: Duration::ZERO,
            backoff: Duration::ZERO,
            game_duration: Duration::ZERO,
            after_task: Duration::ZERO,
            login_cooldown: Duration::ZERO,
            min_cycle_sleep: Duration::ZERO,
        }
    }

    /// Time to sleep at the end of a cycle.
    #[must_use]
    pub fn cycle_sleep(&self, state: &FarmState, now: i64) -> Duration {
        Duration::from_secs(state.seconds_until_farming(now)).max(self.min_cycle_sleep)
    }
}

/// Sleeps for `duration`, skipping the timer entirely when it is zero.
pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_due() {
        let state = FarmState::new();
        let now = now_unix();
        assert!(state.farming_due(now));
        assert!(state.stars_due(now));
        assert!(state.combo_due(now));
        assert_eq!(state.tickets, 0);
    }

    #[test]
    fn test_track_farming_end_adds_grace() {
        let mut state = FarmState::new();
        state.track_farming_end(1_000);
        assert_eq!(state.farming_end_at, 1_240);
        assert!(!state.farming_due(1_240));
        assert!(state.farming_due(1_241));
    }

    #[test]
    fn test_observe_farming_ignores_finished_cycle() {
        let mut state = FarmState::new();
        assert!(!state.observe_farming(900, 1_000));
        assert_eq!(state.farming_end_at, 0);

        assert!(state.observe_farming(5_000, 1_000));
        assert_eq!(state.farming_end_at, 5_000 + FARMING_GRACE_SECS);
    }

    #[test]
    fn test_use_ticket_never_goes_negative() {
        let mut state = FarmState {
            tickets: 2,
            ..FarmState::default()
        };
        assert!(state.use_ticket());
        assert!(state.use_ticket());
        assert!(!state.use_ticket());
        assert_eq!(state.tickets, 0);
    }

    #[test]
    fn test_cycle_sleep() {
        let mut state = FarmState::new();
        state.track_farming_end(10_000);

        let pacing = Pacing::default();
        assert_eq!(pacing.cycle_sleep(&state, 10_000), Duration::from_secs(240));
        assert_eq!(pacing.cycle_sleep(&state, 20_000), Duration::from_secs(60));
        assert_eq!(Pacing::none().cycle_sleep(&state, 20_000), Duration::ZERO);
    }

    #[test]
    fn test_login_cooldown_is_one_hour() {
        assert_eq!(Pacing::default().login_cooldown, Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_server_time() {
        assert_eq!(parse_server_time("1970-01-01T00:01:40Z"), Some(100));
        assert_eq!(parse_server_time("1970-01-01T03:01:40+03:00"), Some(100));
        assert_eq!(parse_server_time(""), None);
        assert_eq!(parse_server_time("tomorrow"), None);

        let naive = NaiveDateTime::parse_from_str("2024-06-01 12:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let expected = Local.from_local_datetime(&naive).earliest().unwrap().timestamp();
        assert_eq!(parse_server_time("2024-06-01 12:00:00"), Some(expected));
        assert_eq!(parse_server_time("2024-06-01T12:00:00"), Some(expected));
    }
}
