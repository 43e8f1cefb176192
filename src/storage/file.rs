use super::{Collections, Medium};
use crate::errors::StorageError;
use crate::models::{Checkin, Habit, PartialSettings};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, warn};

pub const DB_NAME: &str = "AuraHabitDB";
pub const DB_VERSION: u32 = 1;

const SETTINGS_ID: &str = "main";

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseFile {
    name: String,
    version: u32,
    #[serde(default)]
    habits: Vec<Habit>,
    #[serde(default)]
    checkins: Vec<Checkin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settings: Option<SettingsRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsRecord {
    id: String,
    #[serde(flatten)]
    fields: PartialSettings,
}

/// One JSON document on disk holding the whole database.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl Medium for JsonFile {
    fn describe(&self) -> String {
        format!("{DB_NAME}@{}", self.path.display())
    }

    async fn load(&self) -> Result<Collections, StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|err| {
                StorageError::Unavailable(format!("cannot create {}: {err}", parent.display()))
            })?;
        }

        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Collections::default()),
            Err(err) => {
                error!("failed to read data file: {err}");
                return Err(StorageError::Unavailable(err.to_string()));
            }
        };

        let file: DatabaseFile = serde_json::from_slice(&bytes).map_err(|err| {
            error!("failed to parse data file: {err}");
            StorageError::Unavailable(format!("corrupt data file: {err}"))
        })?;

        if file.version > DB_VERSION {
            return Err(StorageError::Unavailable(format!(
                "data file version {} is newer than supported version {DB_VERSION}",
                file.version
            )));
        }

        let mut data = Collections::default();
        for habit in file.habits {
            data.habits.insert(habit.id.clone(), habit);
        }
        for checkin in file.checkins {
            if !checkin.completed {
                warn!(
                    habit_id = %checkin.habit_id,
                    date = %checkin.date_iso,
                    "dropping stored incomplete check-in"
                );
                continue;
            }
            data.put_checkin(&checkin.habit_id, &checkin.date_iso);
        }
        data.settings = file.settings.map(|record| record.fields);
        Ok(data)
    }

    async fn flush(&self, data: &Collections) -> Result<(), StorageError> {
        let file = DatabaseFile {
            name: DB_NAME.to_string(),
            version: DB_VERSION,
            habits: data.habits.values().cloned().collect(),
            checkins: data.checkins.values().cloned().collect(),
            settings: data.settings.clone().map(|fields| SettingsRecord {
                id: SETTINGS_ID.to_string(),
                fields,
            }),
        };
        let payload = serde_json::to_vec_pretty(&file)
            .map_err(|err| StorageError::TransactionFailed(err.to_string()))?;

        let staging = self.staging_path();
        fs::write(&staging, payload)
            .await
            .map_err(|err| StorageError::TransactionFailed(err.to_string()))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|err| StorageError::TransactionFailed(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_record_carries_sentinel_id() {
        let record = SettingsRecord {
            id: SETTINGS_ID.to_string(),
            fields: PartialSettings {
                notifications_enabled: Some(true),
                ..PartialSettings::default()
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "id": "main", "notificationsEnabled": true })
        );
    }

    #[test]
    fn staging_file_sits_next_to_data_file() {
        let file = JsonFile::new("data/state.json");
        assert_eq!(file.staging_path(), PathBuf::from("data/state.json.tmp"));
    }
}
