//! Storage provider: the only owner of habits, check-ins and settings.
//!
//! Callers reach the three collections through [`StorageProvider`]. Every
//! operation is atomic on its own; nothing spans several operations, so a
//! caller that saw an error re-reads whole collections to reconcile.

mod file;
mod memory;

pub use file::{JsonFile, DB_NAME, DB_VERSION};
pub use memory::Memory;

use crate::errors::StorageError;
use crate::models::{Checkin, Habit, PartialSettings, Settings, Snapshot};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[async_trait]
pub trait HabitStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Habit>, StorageError>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Habit>, StorageError>;
    /// Insert or fully replace the habit stored under `habit.id`.
    async fn save(&self, habit: &Habit) -> Result<(), StorageError>;
    /// Deleting an unknown id is a no-op.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CheckinStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Checkin>, StorageError>;
    async fn get_by_date(&self, date_iso: &str) -> Result<Vec<Checkin>, StorageError>;
    /// The only write path for check-ins. `completed = false` deletes the record.
    async fn toggle(
        &self,
        habit_id: &str,
        date_iso: &str,
        completed: bool,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self) -> Result<Settings, StorageError>;
    async fn save(&self, settings: &Settings) -> Result<(), StorageError>;
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn habits(&self) -> &dyn HabitStore;
    fn checkins(&self) -> &dyn CheckinStore;
    fn settings(&self) -> &dyn SettingsStore;
    /// After close every operation fails with `StorageError::Unavailable`.
    async fn close(&self);
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    File(PathBuf),
    Memory,
}

/// Opens the backend chosen at startup.
pub async fn open_provider(
    backend: &StorageBackend,
) -> Result<Arc<dyn StorageProvider>, StorageError> {
    let provider: Arc<dyn StorageProvider> = match backend {
        StorageBackend::File(path) => Arc::new(LocalStore::open(JsonFile::new(path.clone())).await?),
        StorageBackend::Memory => Arc::new(LocalStore::open(Memory).await?),
    };
    Ok(provider)
}

/// Reads all three collections; the UI reconciles against this after a failed write.
pub async fn load_snapshot(storage: &dyn StorageProvider) -> Result<Snapshot, StorageError> {
    let (habits, checkins, settings) = tokio::try_join!(
        storage.habits().get_all(),
        storage.checkins().get_all(),
        storage.settings().get(),
    )?;
    Ok(Snapshot {
        habits,
        checkins,
        settings,
    })
}

/// Deletes a habit and then un-toggles each of its check-ins. Returns how
/// many check-ins were removed. A failure part way leaves the remaining
/// check-ins in place; callers reconcile with a fresh snapshot.
pub async fn delete_habit_with_checkins(
    storage: &dyn StorageProvider,
    habit_id: &str,
) -> Result<usize, StorageError> {
    storage.habits().delete(habit_id).await?;

    let orphans: Vec<Checkin> = storage
        .checkins()
        .get_all()
        .await?
        .into_iter()
        .filter(|checkin| checkin.habit_id == habit_id)
        .collect();
    for checkin in &orphans {
        storage
            .checkins()
            .toggle(habit_id, &checkin.date_iso, false)
            .await?;
    }
    Ok(orphans.len())
}

/// In-memory image of the three collections.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    habits: BTreeMap<String, Habit>,
    checkins: BTreeMap<(String, String), Checkin>,
    by_date: BTreeMap<String, BTreeSet<String>>,
    settings: Option<PartialSettings>,
}

impl Collections {
    fn put_checkin(&mut self, habit_id: &str, date_iso: &str) {
        self.checkins.insert(
            (habit_id.to_string(), date_iso.to_string()),
            Checkin {
                habit_id: habit_id.to_string(),
                date_iso: date_iso.to_string(),
                completed: true,
            },
        );
        self.by_date
            .entry(date_iso.to_string())
            .or_default()
            .insert(habit_id.to_string());
    }

    fn remove_checkin(&mut self, habit_id: &str, date_iso: &str) -> bool {
        let key = (habit_id.to_string(), date_iso.to_string());
        if self.checkins.remove(&key).is_none() {
            return false;
        }
        if let Some(ids) = self.by_date.get_mut(date_iso) {
            ids.remove(habit_id);
            if ids.is_empty() {
                self.by_date.remove(date_iso);
            }
        }
        true
    }

    fn checkins_on(&self, date_iso: &str) -> Vec<Checkin> {
        let Some(ids) = self.by_date.get(date_iso) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| {
                self.checkins
                    .get(&(id.clone(), date_iso.to_string()))
                    .cloned()
            })
            .collect()
    }
}

/// Where a [`LocalStore`] loads from and flushes to.
#[async_trait]
pub trait Medium: Send + Sync + 'static {
    fn describe(&self) -> String;
    async fn load(&self) -> Result<Collections, StorageError>;
    async fn flush(&self, data: &Collections) -> Result<(), StorageError>;
}

/// Store backed by any [`Medium`]. Writes go to a copy of the collections,
/// the copy is flushed, and only then does it replace the live state.
pub struct LocalStore<M> {
    medium: M,
    state: Mutex<Option<Collections>>,
}

pub type JsonFileStore = LocalStore<JsonFile>;
pub type MemoryStore = LocalStore<Memory>;

impl<M: Medium> LocalStore<M> {
    pub async fn open(medium: M) -> Result<Self, StorageError> {
        let data = medium.load().await?;
        info!(
            store = %medium.describe(),
            habits = data.habits.len(),
            checkins = data.checkins.len(),
            "storage opened"
        );
        Ok(Self {
            medium,
            state: Mutex::new(Some(data)),
        })
    }

    async fn read<R>(&self, query: impl FnOnce(&Collections) -> R) -> Result<R, StorageError> {
        let guard = self.state.lock().await;
        let data = guard.as_ref().ok_or_else(closed)?;
        Ok(query(data))
    }

    /// `apply` reports whether it changed anything; unchanged writes skip the flush.
    async fn write(
        &self,
        op: &'static str,
        apply: impl FnOnce(&mut Collections) -> bool,
    ) -> Result<(), StorageError> {
        let mut guard = self.state.lock().await;
        let mut next = guard.as_ref().ok_or_else(closed)?.clone();
        if !apply(&mut next) {
            debug!(op, "write was a no-op");
            return Ok(());
        }
        if let Err(err) = self.medium.flush(&next).await {
            warn!(op, error = %err, "write rejected, state unchanged");
            return Err(err);
        }
        *guard = Some(next);
        debug!(op, "write committed");
        Ok(())
    }
}

fn closed() -> StorageError {
    StorageError::Unavailable("store is closed".to_string())
}

#[async_trait]
impl<M: Medium> HabitStore for LocalStore<M> {
    async fn get_all(&self) -> Result<Vec<Habit>, StorageError> {
        self.read(|data| data.habits.values().cloned().collect())
            .await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Habit>, StorageError> {
        self.read(|data| data.habits.get(id).cloned()).await
    }

    async fn save(&self, habit: &Habit) -> Result<(), StorageError> {
        self.write("habits.save", |data| {
            data.habits.insert(habit.id.clone(), habit.clone());
            true
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.write("habits.delete", |data| data.habits.remove(id).is_some())
            .await
    }
}

#[async_trait]
impl<M: Medium> CheckinStore for LocalStore<M> {
    async fn get_all(&self) -> Result<Vec<Checkin>, StorageError> {
        self.read(|data| data.checkins.values().cloned().collect())
            .await
    }

    async fn get_by_date(&self, date_iso: &str) -> Result<Vec<Checkin>, StorageError> {
        self.read(|data| data.checkins_on(date_iso)).await
    }

    async fn toggle(
        &self,
        habit_id: &str,
        date_iso: &str,
        completed: bool,
    ) -> Result<(), StorageError> {
        self.write("checkins.toggle", |data| {
            if completed {
                let present = data
                    .checkins
                    .contains_key(&(habit_id.to_string(), date_iso.to_string()));
                data.put_checkin(habit_id, date_iso);
                !present
            } else {
                data.remove_checkin(habit_id, date_iso)
            }
        })
        .await
    }
}

#[async_trait]
impl<M: Medium> SettingsStore for LocalStore<M> {
    async fn get(&self) -> Result<Settings, StorageError> {
        self.read(|data| {
            data.settings
                .as_ref()
                .map(Settings::merged)
                .unwrap_or_default()
        })
        .await
    }

    async fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        self.write("settings.save", |data| {
            data.settings = Some(PartialSettings::from(*settings));
            true
        })
        .await
    }
}

#[async_trait]
impl<M: Medium> StorageProvider for LocalStore<M> {
    fn habits(&self) -> &dyn HabitStore {
        self
    }

    fn checkins(&self) -> &dyn CheckinStore {
        self
    }

    fn settings(&self) -> &dyn SettingsStore {
        self
    }

    async fn close(&self) {
        if self.state.lock().await.take().is_some() {
            info!(store = %self.medium.describe(), "storage closed");
        }
    }
}
