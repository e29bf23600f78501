use crate::errors::AppError;
use crate::models::AppData;
use std::path::Path;
use tokio::fs;
use tracing::{error, info};

pub async fn load_data(path: &Path) -> AppData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<AppData>(&bytes) {
            Ok(data) => {
                info!(
                    habits = data.habits.len(),
                    completions = data.completions.len(),
                    "loaded data file"
                );
                data
            }
            Err(err) => {
                error!("failed to parse data file: {err}");
                AppData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            AppData::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &AppData) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(data).map_err(AppError::internal)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HabitCategory, HabitInput, OwnerId};
    use crate::repository::HabitRepository;
    use chrono::Utc;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        path.push(format!("habit_tracker_{}_{nanos}_{name}.json", std::process::id()));
        path
    }

    #[tokio::test]
    async fn missing_file_loads_empty_store() {
        let data = load_data(&temp_path("missing")).await;
        assert!(data.habits.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty_store() {
        let path = temp_path("corrupt");
        fs::write(&path, b"{ not json").await.unwrap();
        let data = load_data(&path).await;
        assert!(data.completions.is_empty());
        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn persisted_data_loads_back() {
        let path = temp_path("persist");
        let mut data = AppData::default();
        let owner = OwnerId::new("alice");
        let habit = data.create_habit(
            &owner,
            &HabitInput {
                name: "Read".to_string(),
                category: HabitCategory::Learning,
                description: "ten pages".to_string(),
            },
            Utc::now(),
        );

        persist_data(&path, &data).await.unwrap();
        let loaded = load_data(&path).await;
        let name = loaded.get_habit(&owner, habit.id).map(|h| h.name);
        assert_eq!(name.as_deref(), Some("Read"));
        let _ = fs::remove_file(&path).await;
    }
}
