use super::{Collections, Medium};
use crate::errors::StorageError;
use async_trait::async_trait;

/// Nothing is persisted; every open starts empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct Memory;

#[async_trait]
impl Medium for Memory {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<Collections, StorageError> {
        Ok(Collections::default())
    }

    async fn flush(&self, _data: &Collections) -> Result<(), StorageError> {
        Ok(())
    }
}
