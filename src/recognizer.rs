use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use image::RgbImage;
use log::{debug, info, warn};
use serde::Serialize;

use crate::cache::{CacheEntry, RecognitionCache, TrackingId};
use crate::codec;
use crate::db::{LabelRecord, NewLabel, init_db};
use crate::detection::{BoundingBox, Detection};
use crate::error::{LabelError, Result};
use crate::histogram::{DEFAULT_BINS, FeatureVector, extract_color_histogram};
use crate::matcher::{DEFAULT_THRESHOLD, LabelMatch, LabelMatcher};
use crate::metrics;
use crate::store::{LabelStore, SqliteLabelStore};

/// 检测结果最终显示的标签
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Label {
    /// 检测器给出的通用类别
    Generic { category: String },
    /// 用户自定义的名称
    Custom {
        name: String,
        record_id: i64,
        /// 本次匹配的相似度，来自缓存时为空
        score: Option<f32>,
    },
}

impl Label {
    pub fn text(&self) -> &str {
        match self {
            Self::Generic { category } => category,
            Self::Custom { name, .. } => name,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom { .. })
    }

    pub fn record_id(&self) -> Option<i64> {
        match self {
            Self::Generic { .. } => None,
            Self::Custom { record_id, .. } => Some(*record_id),
        }
    }
}

/// 单个检测结果的识别结果
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    pub bounding_box: BoundingBox,
    pub category: String,
    pub tracking_id: Option<TrackingId>,
    pub label: Label,
    /// 是否直接命中缓存
    pub cached: bool,
}

/// 识别引擎：缓存、特征提取、标签匹配与标签读写
pub struct Recognizer<S> {
    store: Arc<S>,
    cache: RecognitionCache,
    matcher: LabelMatcher,
    bins: u32,
}

impl<S: LabelStore> Recognizer<S> {
    pub fn new(store: Arc<S>, bins: u32, threshold: f32) -> Self {
        Self { store, cache: RecognitionCache::new(), matcher: LabelMatcher::new(threshold), bins }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &RecognitionCache {
        &self.cache
    }

    pub fn matcher(&self) -> &LabelMatcher {
        &self.matcher
    }

    pub fn bins(&self) -> u32 {
        self.bins
    }

    /// 计算图片的特征向量
    pub fn fingerprint(&self, image: &RgbImage) -> FeatureVector {
        extract_color_histogram(image, self.bins)
    }

    /// 在存储中查找与图片最相似的同类别标签，不读写缓存
    pub async fn find_match(&self, category: &str, image: &RgbImage) -> Result<Option<LabelMatch>> {
        let start = Instant::now();
        let fingerprint = self.fingerprint(image);
        let candidates = self.store.get_by_category(category).await?;
        let result = self.matcher.find_best_match(category, &fingerprint, &candidates);
        metrics::observe_match(result.as_ref().map(|m| m.score), start.elapsed().as_secs_f32());
        debug!(
            "{} 个 {} 候选，匹配结果: {:?}",
            candidates.len(),
            category,
            result.as_ref().map(|m| (&m.record.name, m.score))
        );
        Ok(result)
    }

    /// 识别单个检测结果
    ///
    /// 先按跟踪 ID 查询缓存，未命中时计算特征并匹配，匹配成功则写入缓存。
    /// 没有跟踪 ID 时不使用缓存，没有裁剪图片时直接返回通用类别。
    pub async fn recognize(&self, detection: &Detection) -> Result<Recognition> {
        let category = detection.category().to_owned();
        let recognition = |label, cached| Recognition {
            bounding_box: detection.bounding_box,
            category: category.clone(),
            tracking_id: detection.tracking_id,
            label,
            cached,
        };

        if let Some(tracking_id) = detection.tracking_id {
            let entry = self.cache.get(tracking_id);
            metrics::inc_cache_lookup(entry.is_some());
            if let Some(entry) = entry {
                let label = Label::Custom { name: entry.name, record_id: entry.record_id, score: None };
                return Ok(recognition(label, true));
            }
        }

        let Some(crop) = &detection.crop else {
            return Ok(recognition(Label::Generic { category: category.clone() }, false));
        };

        let epoch = self.cache.epoch();
        let label = match self.find_match(&category, crop).await? {
            Some(m) => {
                if let Some(tracking_id) = detection.tracking_id {
                    let entry = CacheEntry::new(&m.record.name, m.record.id);
                    if !self.cache.populate(tracking_id, entry, epoch) {
                        debug!("跟踪 ID {} 在匹配期间被修改，放弃写入缓存", tracking_id);
                    }
                }
                Label::Custom { name: m.record.name, record_id: m.record.id, score: Some(m.score) }
            }
            None => Label::Generic { category: category.clone() },
        };
        Ok(recognition(label, false))
    }

    /// 识别一帧中的所有检测结果
    ///
    /// 单个检测结果识别失败时记录警告并退回通用类别，不影响同一帧的其他结果。
    pub async fn recognize_frame(&self, detections: &[Detection]) -> Vec<Recognition> {
        let mut result = Vec::with_capacity(detections.len());
        for detection in detections {
            let recognition = match self.recognize(detection).await {
                Ok(recognition) => recognition,
                Err(e) => {
                    warn!("识别失败，使用通用类别: {}", e);
                    Recognition {
                        bounding_box: detection.bounding_box,
                        category: detection.category().to_owned(),
                        tracking_id: detection.tracking_id,
                        label: Label::Generic { category: detection.category().to_owned() },
                        cached: false,
                    }
                }
            };
            result.push(recognition);
        }
        result
    }

    /// 为检测到的物体保存自定义名称，返回标签 ID
    ///
    /// `existing_id` 不为空时覆盖该标签。写入存储成功后立即更新缓存。
    pub async fn save_label(
        &self,
        detection: &Detection,
        name: &str,
        existing_id: Option<i64>,
    ) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LabelError::EmptyName);
        }
        let crop = detection.crop.as_ref().ok_or(LabelError::MissingImage)?;
        let category = detection.category();
        let label = NewLabel {
            id: existing_id,
            category: category.to_owned(),
            name: name.to_owned(),
            feature: codec::encode(&self.fingerprint(crop)),
            created_at: now_millis(),
        };

        let id = self.store.upsert(label).await?;
        info!("保存标签 #{}: {} ({})", id, name, category);

        if let Some(tracking_id) = detection.tracking_id {
            self.cache.put(tracking_id, CacheEntry::new(name, id));
        }
        Ok(id)
    }

    /// 删除标签，并移除对应跟踪 ID 的缓存
    pub async fn delete_label(&self, record_id: i64, tracking_id: Option<TrackingId>) -> Result<()> {
        self.store.delete_by_id(record_id).await?;
        info!("删除标签 #{}", record_id);
        self.cache.remove(tracking_id, record_id);
        Ok(())
    }

    /// 查询跟踪 ID 当前对应的标签，用于点击物体后决定是新建还是编辑
    ///
    /// 会确认标签仍然存在，已被其他途径删除的缓存项在此时清理。
    pub async fn existing_label(&self, tracking_id: TrackingId) -> Result<Option<CacheEntry>> {
        let Some(entry) = self.cache.get(tracking_id) else {
            return Ok(None);
        };
        if self.store.get_by_id(entry.record_id).await?.is_some() {
            return Ok(Some(entry));
        }
        debug!("跟踪 ID {} 引用的标签 #{} 已不存在", tracking_id, entry.record_id);
        self.cache.remove(Some(tracking_id), entry.record_id);
        Ok(None)
    }

    /// 所有标签
    pub async fn labels(&self) -> Result<Vec<LabelRecord>> {
        self.store.get_all().await
    }

    /// 开始新的相机会话，跟踪 ID 不能跨会话使用
    pub fn start_session(&self) {
        info!("开始新的识别会话，清理 {} 条缓存", self.cache.len());
        self.cache.clear();
    }
}

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or_default()
}

/// 构建使用 SQLite 存储的识别引擎
pub struct RecognizerBuilder {
    database: PathBuf,
    wal: bool,
    bins: u32,
    threshold: f32,
}

impl RecognizerBuilder {
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self { database: database.into(), wal: true, bins: DEFAULT_BINS, threshold: DEFAULT_THRESHOLD }
    }

    pub fn wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    pub fn bins(mut self, bins: u32) -> Self {
        self.bins = bins;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub async fn open(self) -> Result<Recognizer<SqliteLabelStore>> {
        let db = init_db(&self.database, self.wal).await?;
        let store = Arc::new(SqliteLabelStore::new(db));
        Ok(Recognizer::new(store, self.bins, self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::store::MemoryLabelStore;

    fn detection(category: &str, tracking_id: Option<TrackingId>, color: Option<[u8; 3]>) -> Detection {
        Detection {
            bounding_box: BoundingBox::new(0, 0, 10, 10),
            labels: vec![category.to_owned()],
            tracking_id,
            crop: color.map(|c| RgbImage::from_pixel(10, 10, Rgb(c))),
        }
    }

    fn recognizer() -> Recognizer<MemoryLabelStore> {
        Recognizer::new(Arc::new(MemoryLabelStore::new()), DEFAULT_BINS, DEFAULT_THRESHOLD)
    }

    #[tokio::test]
    async fn test_save_then_recognize_new_session() {
        let r = recognizer();
        let id = r.save_label(&detection("cup", Some(1), Some([255, 0, 0])), "Mug", None).await.unwrap();

        r.start_session();
        let rec = r.recognize(&detection("cup", Some(1), Some([250, 5, 5]))).await.unwrap();
        assert_eq!(rec.label.record_id(), Some(id));
        assert_eq!(rec.label.text(), "Mug");
        assert!(!rec.cached);

        let rec = r.recognize(&detection("cup", Some(1), Some([0, 0, 255]))).await.unwrap();
        assert!(rec.cached);
        assert_eq!(rec.label.text(), "Mug");
    }

    #[tokio::test]
    async fn test_no_match_is_not_cached() {
        let r = recognizer();
        r.save_label(&detection("cup", None, Some([255, 0, 0])), "Mug", None).await.unwrap();
        let rec = r.recognize(&detection("cup", Some(3), Some([0, 0, 255]))).await.unwrap();
        assert_eq!(rec.label, Label::Generic { category: "cup".into() });
        assert!(r.cache().is_empty());
    }

    #[tokio::test]
    async fn test_without_crop() {
        let r = recognizer();
        r.save_label(&detection("cup", None, Some([255, 0, 0])), "Mug", None).await.unwrap();
        let rec = r.recognize(&detection("cup", Some(3), None)).await.unwrap();
        assert!(!rec.label.is_custom());
    }

    #[tokio::test]
    async fn test_without_tracking_id() {
        let r = recognizer();
        r.save_label(&detection("cup", None, Some([255, 0, 0])), "Mug", None).await.unwrap();
        let rec = r.recognize(&detection("cup", None, Some([255, 0, 0]))).await.unwrap();
        assert_eq!(rec.label.text(), "Mug");
        assert!(r.cache().is_empty());
    }

    #[tokio::test]
    async fn test_category_scoped() {
        let r = recognizer();
        r.save_label(&detection("cup", None, Some([255, 0, 0])), "Mug", None).await.unwrap();
        let rec = r.recognize(&detection("bottle", None, Some([255, 0, 0]))).await.unwrap();
        assert_eq!(rec.label.text(), "bottle");
    }

    #[tokio::test]
    async fn test_save_validation() {
        let r = recognizer();
        let err = r.save_label(&detection("cup", None, Some([1, 2, 3])), "  ", None).await;
        assert!(matches!(err, Err(LabelError::EmptyName)));
        let err = r.save_label(&detection("cup", None, None), "Mug", None).await;
        assert!(matches!(err, Err(LabelError::MissingImage)));
        assert_eq!(r.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_and_existing_label() {
        let r = recognizer();
        let det = detection("cup", Some(5), Some([255, 0, 0]));
        let id = r.save_label(&det, "Mug", None).await.unwrap();
        assert_eq!(r.existing_label(5).await.unwrap(), Some(CacheEntry::new("Mug", id)));

        r.delete_label(id, Some(5)).await.unwrap();
        assert_eq!(r.existing_label(5).await.unwrap(), None);
        let rec = r.recognize(&det).await.unwrap();
        assert!(!rec.label.is_custom());
    }

    #[tokio::test]
    async fn test_existing_label_removed_elsewhere() {
        let r = recognizer();
        let id = r.save_label(&detection("cup", Some(5), Some([255, 0, 0])), "Mug", None).await.unwrap();
        r.store().delete_by_id(id).await.unwrap();
        assert_eq!(r.existing_label(5).await.unwrap(), None);
        assert!(r.cache().is_empty());
    }
}
