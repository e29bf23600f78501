use crate::changes::{Change, ChangeKind};
use crate::models::{Habit, HabitStats, MonthProgress, OwnerId, ToggleResponse};
use crate::repository::{CompletionRepository, DateRange, HabitRepository};
use crate::streaks::{DEFAULT_WINDOW_DAYS, compute_metrics, monthly_progress, weekly_progress};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::debug;
use uuid::Uuid;

pub fn habit_stats<R>(repo: &R, owner: &OwnerId, habit: &Habit, now: DateTime<Utc>) -> HabitStats
where
    R: CompletionRepository + ?Sized,
{
    let events: Vec<DateTime<Utc>> = repo
        .list_completions(owner, habit.id, DateRange::all())
        .into_iter()
        .map(|event| event.completed_at)
        .collect();
    let metrics = compute_metrics(&events, DEFAULT_WINDOW_DAYS, now);

    HabitStats {
        habit_id: habit.id,
        name: habit.name.clone(),
        current_streak: metrics.current_streak,
        longest_streak: metrics.longest_streak,
        completion_rate: metrics.completion_rate_percent,
        weekly: weekly_progress(&events, now),
        monthly: monthly_progress(&events, now),
    }
}

pub fn all_habit_stats<R>(repo: &R, owner: &OwnerId, now: DateTime<Utc>) -> Vec<HabitStats>
where
    R: HabitRepository + CompletionRepository + ?Sized,
{
    repo.list_habits(owner)
        .iter()
        .map(|habit| habit_stats(repo, owner, habit, now))
        .collect()
}

/// Month overview across every habit of the owner: a day counts once any
/// habit was completed on it.
pub fn dashboard_month<R>(repo: &R, owner: &OwnerId, now: DateTime<Utc>) -> MonthProgress
where
    R: CompletionRepository + ?Sized,
{
    let events: Vec<DateTime<Utc>> = repo
        .list_owner_completions(owner, DateRange::all())
        .into_iter()
        .map(|event| event.completed_at)
        .collect();
    monthly_progress(&events, now)
}

/// Flips the done mark of `habit_id` on `day`. Returns `None` for an unknown
/// habit, otherwise the new state and the change to publish.
pub fn toggle_completion<R>(
    repo: &mut R,
    owner: &OwnerId,
    habit_id: Uuid,
    day: NaiveDate,
) -> Option<(ToggleResponse, Change)>
where
    R: HabitRepository + CompletionRepository + ?Sized,
{
    repo.get_habit(owner, habit_id)?;

    let (completed, change) = match repo.find_completion_on_day(owner, habit_id, day) {
        Some(existing) => {
            repo.delete_completion(owner, existing.id);
            let change = Change::completion(ChangeKind::Delete, owner, existing.id, habit_id);
            (false, change)
        }
        None => {
            let at = day.and_time(NaiveTime::MIN).and_utc();
            let event = repo.insert_completion(owner, habit_id, at);
            let change = Change::completion(ChangeKind::Insert, owner, event.id, habit_id);
            (true, change)
        }
    };

    debug!(%owner, %habit_id, %day, completed, "toggled completion");
    Some((
        ToggleResponse {
            habit_id,
            date: day,
            completed,
        },
        change,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppData, HabitCategory, HabitInput};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 18, 18, 0, 0).unwrap()
    }

    fn setup() -> (AppData, OwnerId, Habit) {
        let mut data = AppData::default();
        let owner = OwnerId::new("alice");
        let habit = data.create_habit(
            &owner,
            &HabitInput {
                name: "Meditate".to_string(),
                category: HabitCategory::SpiritualMental,
                description: "ten minutes".to_string(),
            },
            now(),
        );
        (data, owner, habit)
    }

    #[test]
    fn habit_stats_derive_from_stored_completions() {
        let (mut data, owner, habit) = setup();
        for offset in 0..5 {
            data.insert_completion(&owner, habit.id, now() - Duration::days(offset));
        }
        data.insert_completion(&owner, habit.id, now() - Duration::hours(3));

        let stats = habit_stats(&data, &owner, &habit, now());
        assert_eq!(stats.name, "Meditate");
        assert_eq!(stats.current_streak, 5);
        assert_eq!(stats.longest_streak, 5);
        assert_eq!(stats.completion_rate, 17);
        assert_eq!(stats.weekly.iter().filter(|d| d.completed).count(), 3);
        assert_eq!(stats.monthly.completed_days, 5);
    }

    #[test]
    fn stats_ignore_other_owners() {
        let (mut data, owner, habit) = setup();
        data.insert_completion(&OwnerId::new("mallory"), habit.id, now());

        let stats = habit_stats(&data, &owner, &habit, now());
        assert_eq!(stats.current_streak, 0);
        assert!(all_habit_stats(&data, &OwnerId::new("mallory"), now()).is_empty());
        assert_eq!(all_habit_stats(&data, &owner, now()).len(), 1);
    }

    #[test]
    fn toggle_inserts_then_removes() {
        let (mut data, owner, habit) = setup();
        let day = now().date_naive();

        let (response, change) = toggle_completion(&mut data, &owner, habit.id, day).unwrap();
        assert!(response.completed);
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.habit_id, Some(habit.id));
        assert_eq!(habit_stats(&data, &owner, &habit, now()).current_streak, 1);

        let (response, change) = toggle_completion(&mut data, &owner, habit.id, day).unwrap();
        assert!(!response.completed);
        assert_eq!(change.kind, ChangeKind::Delete);
        assert!(data.list_completions(&owner, habit.id, DateRange::all()).is_empty());
    }

    #[test]
    fn toggle_rejects_unknown_or_foreign_habit() {
        let (mut data, _owner, habit) = setup();
        let day = now().date_naive();
        assert!(toggle_completion(&mut data, &OwnerId::new("bob"), habit.id, day).is_none());
        let unknown = Uuid::new_v4();
        assert!(toggle_completion(&mut data, &OwnerId::new("alice"), unknown, day).is_none());
        assert!(data.completions.is_empty());
    }

    #[test]
    fn dashboard_month_merges_habits() {
        let (mut data, owner, habit) = setup();
        let other = data.create_habit(
            &owner,
            &HabitInput {
                name: "Walk".to_string(),
                category: HabitCategory::Health,
                description: "after lunch".to_string(),
            },
            now(),
        );
        data.insert_completion(&owner, habit.id, now());
        data.insert_completion(&owner, other.id, now());
        data.insert_completion(&owner, other.id, now() - Duration::days(1));

        let month = dashboard_month(&data, &owner, now());
        assert_eq!(month.completed_days, 2);
    }
}
