use log::{debug, warn};

use crate::codec;
use crate::db::LabelRecord;
use crate::histogram::FeatureVector;
use crate::similarity::cosine_similarity;

/// 默认相似度阈值
pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// 匹配结果
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatch {
    pub record: LabelRecord,
    /// 余弦相似度
    pub score: f32,
}

/// 在同类别的已存标签中查找与新特征最相似的一个
#[derive(Debug, Clone, Copy)]
pub struct LabelMatcher {
    threshold: f32,
}

impl Default for LabelMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl LabelMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// 返回得分严格大于阈值且最高的候选，得分相同时保留先出现的
    ///
    /// 类别不一致的候选直接跳过，特征无法解码或维数不同的候选视为不可比较。
    pub fn find_best_match(
        &self,
        category: &str,
        fingerprint: &FeatureVector,
        candidates: &[LabelRecord],
    ) -> Option<LabelMatch> {
        let mut best: Option<&LabelRecord> = None;
        let mut best_score = self.threshold;

        for record in candidates {
            if record.category != category {
                continue;
            }
            let stored = match codec::decode(&record.feature) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("跳过无法解码的标签 #{}: {}", record.id, e);
                    continue;
                }
            };
            if stored.len() != fingerprint.len() {
                debug!("标签 #{} 维数不一致: {} != {}", record.id, stored.len(), fingerprint.len());
                continue;
            }
            let score = cosine_similarity(fingerprint.as_slice(), stored.as_slice());
            debug!("标签 #{} ({}) 相似度: {:.4}", record.id, record.name, score);
            if score > best_score {
                best_score = score;
                best = Some(record);
            }
        }

        best.map(|record| LabelMatch { record: record.clone(), score: best_score })
    }
}
