use crate::changes::{Change, ChangeFeed};
use crate::coach::Coach;
use crate::errors::AppError;
use crate::models::AppData;
use crate::storage::persist_data;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub data: Arc<Mutex<AppData>>,
    pub changes: ChangeFeed,
    pub coach: Arc<Coach>,
}

impl AppState {
    pub fn new(data_path: PathBuf, data: AppData, coach: Coach) -> Self {
        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
            changes: ChangeFeed::new(),
            coach: Arc::new(coach),
        }
    }

    /// Applies `apply` to a copy of the store and swaps it in once the copy is
    /// on disk. Subscribers hear about the changes only after that. If `apply`
    /// or the write fails, the store is left as it was.
    pub async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut AppData) -> Result<(T, Vec<Change>), AppError>,
    ) -> Result<T, AppError> {
        let mut data = self.data.lock().await;
        let mut draft = data.clone();
        let (value, changes) = apply(&mut draft)?;

        persist_data(&self.data_path, &draft).await?;
        *data = draft;

        for change in changes {
            self.changes.publish(change);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeFilter, ChangeKind, Table};
    use crate::models::{HabitCategory, HabitInput, OwnerId};
    use crate::repository::HabitRepository;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    fn input() -> HabitInput {
        HabitInput {
            name: "Meditate".to_string(),
            category: HabitCategory::SpiritualMental,
            description: "ten minutes".to_string(),
        }
    }

    fn state_at(data_path: PathBuf) -> AppState {
        AppState::new(data_path, AppData::default(), Coach::disabled())
    }

    fn create(data: &mut AppData, owner: &OwnerId) -> Result<(Uuid, Vec<Change>), AppError> {
        let habit = data.create_habit(owner, &input(), Utc::now());
        let change = Change::new(Table::Habits, ChangeKind::Insert, owner, Some(habit.id));
        Ok((habit.id, vec![change]))
    }

    #[tokio::test]
    async fn successful_write_updates_store_and_notifies() {
        let mut path = std::env::temp_dir();
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        path.push(format!("habit_tracker_state_{}_{nanos}.json", std::process::id()));
        let state = state_at(path.clone());
        let owner = OwnerId::new("alice");
        let mut subscription = state
            .changes
            .subscribe(ChangeFilter::table(Table::Habits, owner.clone()));

        let id = state.mutate(|data| create(data, &owner)).await.unwrap();

        assert!(state.data.lock().await.get_habit(&owner, id).is_some());
        let change = timeout(Duration::from_secs(1), subscription.next())
            .await
            .expect("timed out");
        assert_eq!(change.and_then(|change| change.record_id), Some(id));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn failed_write_leaves_store_untouched() {
        let mut path = std::env::temp_dir();
        path.push("habit_tracker_missing_dir");
        path.push("nested");
        path.push("state.json");
        let state = state_at(path);
        let owner = OwnerId::new("alice");
        let mut subscription = state
            .changes
            .subscribe(ChangeFilter::table(Table::Habits, owner.clone()));

        let result = state.mutate(|data| create(data, &owner)).await;

        assert!(result.is_err());
        assert!(state.data.lock().await.list_habits(&owner).is_empty());
        let pending = timeout(Duration::from_millis(100), subscription.next()).await;
        assert!(pending.is_err(), "no change may be published");
    }

    #[tokio::test]
    async fn rejected_update_is_not_persisted() {
        let state = state_at(PathBuf::from("unused.json"));
        let result: Result<(), AppError> = state
            .mutate(|data| {
                data.create_habit(&OwnerId::new("alice"), &input(), Utc::now());
                Err(AppError::not_found("habit"))
            })
            .await;

        assert!(result.is_err());
        assert!(state.data.lock().await.habits.is_empty());
    }
}
