use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use crate::db::{Database, LabelRecord, NewLabel, crud};
use crate::error::Result;

/// 标签记录存储
///
/// 识别引擎只通过这个接口读写标签，实现必须可以并发使用。
pub trait LabelStore: Send + Sync {
    /// 获取指定类别的所有标签，迭代顺序必须稳定
    fn get_by_category(&self, category: &str) -> impl Future<Output = Result<Vec<LabelRecord>>> + Send;

    fn get_by_id(&self, id: i64) -> impl Future<Output = Result<Option<LabelRecord>>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<LabelRecord>>> + Send;

    /// 写入标签，`label.id` 已存在时覆盖旧记录，返回记录 ID
    fn upsert(&self, label: NewLabel) -> impl Future<Output = Result<i64>> + Send;

    /// 删除标签，ID 不存在时不报错
    fn delete_by_id(&self, id: i64) -> impl Future<Output = Result<()>> + Send;

    fn count(&self) -> impl Future<Output = Result<usize>> + Send;
}

/// 基于 SQLite 的标签存储
#[derive(Clone)]
pub struct SqliteLabelStore {
    db: Database,
}

impl SqliteLabelStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl LabelStore for SqliteLabelStore {
    async fn get_by_category(&self, category: &str) -> Result<Vec<LabelRecord>> {
        Ok(crud::get_labels_by_category(&self.db, category).await?)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<LabelRecord>> {
        Ok(crud::get_label(&self.db, id).await?)
    }

    async fn get_all(&self) -> Result<Vec<LabelRecord>> {
        Ok(crud::get_labels(&self.db).await?)
    }

    async fn upsert(&self, label: NewLabel) -> Result<i64> {
        Ok(crud::upsert_label(&self.db, &label).await?)
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        crud::delete_label(&self.db, id).await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(crud::count_labels(&self.db).await? as usize)
    }
}

/// 内存中的标签存储，重启后数据丢失，适用于测试或临时使用
#[derive(Default)]
pub struct MemoryLabelStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    records: BTreeMap<i64, LabelRecord>,
    last_id: i64,
}

impl MemoryLabelStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut MemoryStoreInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }
}

impl LabelStore for MemoryLabelStore {
    async fn get_by_category(&self, category: &str) -> Result<Vec<LabelRecord>> {
        Ok(self.with_inner(|inner| {
            inner.records.values().filter(|r| r.category == category).cloned().collect()
        }))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<LabelRecord>> {
        Ok(self.with_inner(|inner| inner.records.get(&id).cloned()))
    }

    async fn get_all(&self) -> Result<Vec<LabelRecord>> {
        Ok(self.with_inner(|inner| inner.records.values().cloned().collect()))
    }

    async fn upsert(&self, label: NewLabel) -> Result<i64> {
        Ok(self.with_inner(|inner| {
            // 与 AUTOINCREMENT 一致：新 ID 总是大于出现过的最大 ID
            let id = label.id.unwrap_or(inner.last_id + 1);
            inner.last_id = inner.last_id.max(id);
            let record = LabelRecord {
                id,
                category: label.category,
                name: label.name,
                feature: label.feature,
                created_at: label.created_at,
            };
            inner.records.insert(id, record);
            id
        }))
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        self.with_inner(|inner| inner.records.remove(&id));
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.with_inner(|inner| inner.records.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_label(id: Option<i64>, category: &str, name: &str) -> NewLabel {
        NewLabel {
            id,
            category: category.to_owned(),
            name: name.to_owned(),
            feature: "[1.0]".to_owned(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn memory_store_upsert_assigns_ids() {
        let store = MemoryLabelStore::new();
        let a = store.upsert(new_label(None, "bottle", "a")).await.unwrap();
        let b = store.upsert(new_label(None, "bottle", "b")).await.unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn memory_store_upsert_overwrites() {
        let store = MemoryLabelStore::new();
        let id = store.upsert(new_label(None, "bottle", "old")).await.unwrap();
        let id2 = store.upsert(new_label(Some(id), "bottle", "new")).await.unwrap();
        assert_eq!(id, id2);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get_by_id(id).await.unwrap().unwrap().name, "new");
    }

    #[tokio::test]
    async fn memory_store_ids_not_reused() {
        let store = MemoryLabelStore::new();
        let id = store.upsert(new_label(None, "cup", "a")).await.unwrap();
        store.delete_by_id(id).await.unwrap();
        let id2 = store.upsert(new_label(None, "cup", "b")).await.unwrap();
        assert!(id2 > id);
    }

    #[tokio::test]
    async fn memory_store_category_filter() {
        let store = MemoryLabelStore::new();
        store.upsert(new_label(None, "cup", "a")).await.unwrap();
        store.upsert(new_label(None, "bottle", "b")).await.unwrap();
        store.upsert(new_label(None, "cup", "c")).await.unwrap();

        let cups = store.get_by_category("cup").await.unwrap();
        let names = cups.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["a", "c"]);
        assert!(store.get_by_category("plant").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_delete_missing() {
        let store = MemoryLabelStore::new();
        store.delete_by_id(42).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
