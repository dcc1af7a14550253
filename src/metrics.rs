use std::sync::LazyLock;

use prometheus::*;

static METRIC_CACHE_LOOKUP: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "im_label_cache_lookup",
        "count of recognition cache lookups",
        &["result"]
    )
    .unwrap()
});

static METRIC_MATCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("im_label_match_count", "count of label match attempts", &["result"])
        .unwrap()
});

static METRIC_MATCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "im_label_match_duration",
        "duration of the per-detection fingerprint match in seconds",
        exponential_buckets(0.0001, 2.0, 14).unwrap()
    )
    .unwrap()
});

static METRIC_MATCH_SCORE: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "im_label_match_score",
        "similarity score of the matched label",
        (50..=100).step_by(5).map(|x| x as f64 / 100.).collect()
    )
    .unwrap()
});

/// 记录一次缓存查询
pub fn inc_cache_lookup(hit: bool) {
    METRIC_CACHE_LOOKUP.with_label_values(&[if hit { "hit" } else { "miss" }]).inc();
}

/// 记录一次特征匹配的结果和耗时
pub fn observe_match(score: Option<f32>, duration: f32) {
    let result = if score.is_some() { "match" } else { "none" };
    METRIC_MATCH_COUNT.with_label_values(&[result]).inc();
    METRIC_MATCH_DURATION.observe(duration as f64);
    if let Some(score) = score {
        METRIC_MATCH_SCORE.observe(score as f64);
    }
}

/// 以文本格式导出所有指标
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&gather()).unwrap_or_default()
}
