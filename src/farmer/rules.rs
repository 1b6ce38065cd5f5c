//! Decisions the loop takes from server data.

use std::ops::RangeInclusive;

use rand::Rng;

use super::state::parse_server_time;
use crate::api::{ComboTask, StarsTask, Task};
use crate::config::FALLBACK_REF_ID;

/// Task type that is never run automatically.
pub const EXCLUDED_TASK_TYPE: &str = "wallet";

/// Probability of using the configured referral code.
const OWN_REF_PROBABILITY: f64 = 0.7;

/// Points reported for one mini-game.
pub const GAME_POINTS: RangeInclusive<u32> = 400..=600;

/// Star task statuses above this one mean the bonus was taken.
const STARS_CLAIMED_ABOVE: i64 = 2;

/// What to do with a time-windowed bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusAction {
    /// Already taken this window.
    AlreadyClaimed,
    /// Open and not taken yet.
    Claim,
    /// Window closed or unreadable.
    Unavailable,
}

fn window_open(end: Option<&str>, now: i64) -> bool {
    end.and_then(parse_server_time).is_some_and(|end| end > now)
}

/// Decides the star bonus.
pub fn stars_action(task: &StarsTask, now: i64) -> BonusAction {
    if task.status > STARS_CLAIMED_ABOVE {
        BonusAction::AlreadyClaimed
    } else if window_open(task.end_time.as_deref(), now) {
        BonusAction::Claim
    } else {
        BonusAction::Unavailable
    }
}

/// Decides the hidden combo.
pub fn combo_action(task: &ComboTask, now: i64) -> BonusAction {
    if task.status > 0 {
        BonusAction::AlreadyClaimed
    } else if task.status == 0 && window_open(task.end.as_deref(), now) {
        BonusAction::Claim
    } else {
        BonusAction::Unavailable
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

/// Checks whether a catalog task should be run now.
///
/// Windowed tasks run while `now` is inside their window; the rest run unless
/// they are of the excluded type.
pub fn is_task_selectable(task: &Task, now: i64) -> bool {
    if !task.enable {
        return false;
    }

    match (non_empty(task.start_time.as_ref()), non_empty(task.end_time.as_ref())) {
        (Some(start), Some(end)) => match (parse_server_time(start), parse_server_time(end)) {
            (Some(start), Some(end)) => (start..=end).contains(&now),
            _ => false,
        },
        _ => task.kind.as_deref() != Some(EXCLUDED_TASK_TYPE),
    }
}

/// Filters the catalog down to the tasks to run now.
pub fn select_tasks(tasks: Vec<Task>, now: i64) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| is_task_selectable(task, now))
        .collect()
}

/// Picks the referral code for this run.
pub fn pick_ref_id<'a, R: Rng + ?Sized>(own: &'a str, rng: &mut R) -> &'a str {
    if rng.random_bool(OWN_REF_PROBABILITY) {
        own
    } else {
        FALLBACK_REF_ID
    }
}

/// Picks the startup delay (seconds) within inclusive bounds.
pub fn start_delay<R: Rng + ?Sized>(bounds: (u64, u64), rng: &mut R) -> u64 {
    let (min, max) = bounds;
    rng.random_range(min.min(max)..=max.max(min))
}

/// Picks the points reported for one mini-game.
pub fn game_points<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.random_range(GAME_POINTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    const NOW: i64 = 1_717_000_000;

    fn iso(ts: i64) -> String {
        chrono::DateTime::from_timestamp(ts, 0).unwrap().to_rfc3339()
    }

    fn task(value: serde_json::Value) -> Task {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_wallet_task_without_window_is_excluded() {
        let wallet = task(json!({"taskId": 1, "enable": true, "startTime": null, "type": "wallet"}));
        assert!(!is_task_selectable(&wallet, NOW));

        let link = task(json!({"taskId": 2, "enable": true, "startTime": null, "type": "link"}));
        assert!(is_task_selectable(&link, NOW));
    }

    #[test]
    fn test_disabled_task_is_excluded() {
        let disabled = task(json!({"taskId": 3, "enable": false, "type": "link"}));
        assert!(!is_task_selectable(&disabled, NOW));
    }

    #[test]
    fn test_windowed_task_selection() {
        let open = task(json!({
            "taskId": 4, "enable": true, "type": "wallet",
            "startTime": iso(NOW - 60), "endTime": iso(NOW + 60)
        }));
        assert!(is_task_selectable(&open, NOW));

        let future = task(json!({
            "taskId": 5, "enable": true, "type": "link",
            "startTime": iso(NOW + 60), "endTime": iso(NOW + 120)
        }));
        assert!(!is_task_selectable(&future, NOW));

        let expired = task(json!({
            "taskId": 6, "enable": true,
            "startTime": iso(NOW - 120), "endTime": iso(NOW - 60)
        }));
        assert!(!is_task_selectable(&expired, NOW));
    }

    #[test]
    fn test_half_window_falls_back_to_type_rule() {
        let start_only = task(json!({
            "taskId": 7, "enable": true, "type": "link", "startTime": iso(NOW + 600)
        }));
        assert!(is_task_selectable(&start_only, NOW));

        let empty = task(json!({
            "taskId": 8, "enable": true, "type": "wallet", "startTime": "", "endTime": ""
        }));
        assert!(!is_task_selectable(&empty, NOW));
    }

    #[test]
    fn test_select_tasks_keeps_order() {
        let tasks = vec![
            task(json!({"taskId": 1, "enable": true, "type": "link"})),
            task(json!({"taskId": 2, "enable": true, "type": "wallet"})),
            task(json!({"taskId": 3, "enable": true, "type": "emoji"})),
        ];
        let ids: Vec<i64> = select_tasks(tasks, NOW).iter().map(|t| t.task_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_stars_action() {
        let stars = |status: i64, end: i64| StarsTask {
            status,
            task_id: 9,
            end_time: Some(iso(end)),
        };
        assert_eq!(stars_action(&stars(3, NOW + 60), NOW), BonusAction::AlreadyClaimed);
        assert_eq!(stars_action(&stars(2, NOW + 60), NOW), BonusAction::Claim);
        assert_eq!(stars_action(&stars(0, NOW - 60), NOW), BonusAction::Unavailable);
    }

    #[test]
    fn test_combo_action() {
        let combo = |status: i64, end: i64| ComboTask {
            status,
            task_id: 11,
            end: Some(iso(end)),
            score: 5000.0,
            code: None,
        };
        assert_eq!(combo_action(&combo(1, NOW + 60), NOW), BonusAction::AlreadyClaimed);
        assert_eq!(combo_action(&combo(0, NOW + 60), NOW), BonusAction::Claim);
        assert_eq!(combo_action(&combo(0, NOW - 60), NOW), BonusAction::Unavailable);
        assert_eq!(combo_action(&combo(-1, NOW + 60), NOW), BonusAction::Unavailable);
    }

    #[test]
    fn test_pick_ref_id_prefers_own_code() {
        let mut rng = StdRng::seed_from_u64(7);
        let own = (0..10_000)
            .filter(|_| pick_ref_id("MINE", &mut rng) == "MINE")
            .count();
        assert!((6_500..7_500).contains(&own), "own code picked {own} times");
    }

    #[test]
    fn test_start_delay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert!((5..=30).contains(&start_delay((5, 30), &mut rng)));
        }
        assert_eq!(start_delay((7, 7), &mut rng), 7);
    }

    #[test]
    fn test_game_points_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1_000 {
            assert!(GAME_POINTS.contains(&game_points(&mut rng)));
        }
    }
}
