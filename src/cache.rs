use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 检测器分配的跟踪 ID，只在一次相机会话内有效
pub type TrackingId = i32;

/// 已识别物体的缓存项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// 自定义名称
    pub name: String,
    /// 标签记录 ID
    pub record_id: i64,
}

impl CacheEntry {
    pub fn new(name: impl Into<String>, record_id: i64) -> Self {
        Self { name: name.into(), record_id }
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<TrackingId, CacheEntry>,
    /// 本次会话中已删除的记录 ID
    tombstones: HashSet<i64>,
    /// 用户写入（保存、删除、重置会话）的次数
    epoch: u64,
}

/// 跟踪 ID 到自定义标签的会话级缓存
///
/// 后台识别和前台交互同时访问，内部使用单个互斥锁。只缓存命中结果，未命中时
/// 每一帧都会重新匹配。
#[derive(Default)]
pub struct RecognitionCache {
    inner: Mutex<CacheInner>,
}

impl RecognitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 查询缓存，引用已删除记录的缓存项会在这里被移除
    pub fn get(&self, tracking_id: TrackingId) -> Option<CacheEntry> {
        let mut inner = self.lock();
        let record_id = inner.entries.get(&tracking_id)?.record_id;
        if inner.tombstones.contains(&record_id) {
            inner.entries.remove(&tracking_id);
            return None;
        }
        inner.entries.get(&tracking_id).cloned()
    }

    /// 当前的用户写入版本，后台匹配开始前读取，写回时传给 [`Self::populate`]
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// 写入后台匹配结果
    ///
    /// 如果匹配期间发生过用户写入，则放弃本次写入并返回 false，避免用旧快照覆盖
    /// 用户刚刚做出的修改。
    pub fn populate(&self, tracking_id: TrackingId, entry: CacheEntry, epoch: u64) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch || inner.tombstones.contains(&entry.record_id) {
            return false;
        }
        inner.entries.insert(tracking_id, entry);
        true
    }

    /// 用户保存标签后立即更新缓存，总是覆盖旧值
    pub fn put(&self, tracking_id: TrackingId, entry: CacheEntry) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.tombstones.remove(&entry.record_id);
        inner.entries.insert(tracking_id, entry);
    }

    /// 用户删除标签后移除对应的缓存项
    ///
    /// 其他引用同一记录的跟踪 ID 不会被立即清理，而是在下次查询时移除。
    pub fn remove(&self, tracking_id: Option<TrackingId>, record_id: i64) -> Option<CacheEntry> {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.tombstones.insert(record_id);
        tracking_id.and_then(|id| inner.entries.remove(&id))
    }

    /// 清空缓存，相机会话结束时调用
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.entries.clear();
        inner.tombstones.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
