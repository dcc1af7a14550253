use image::RgbImage;
use serde::{Deserialize, Serialize};

/// 默认每个颜色通道的量化桶数量
pub const DEFAULT_BINS: u32 = 4;
/// 允许的最大量化桶数量，16³ = 4096 维
pub const MAX_BINS: u32 = 16;

/// 归一化的颜色分布直方图，用作物体的外观指纹
///
/// 元素个数为 bins³，像素数大于 0 时所有元素之和为 1，空图片则全为 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    /// 维数
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// 所有分量之和
    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    /// 是否为全零向量
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// 计算图片的 RGB 颜色直方图
///
/// 每个通道按 `ceil(256 / bins)` 等宽量化，三个通道的桶下标按 `r*bins² + g*bins + b`
/// 合并为一维下标，最后除以像素总数归一化。
///
/// `bins` 会被限制在 `1..=MAX_BINS` 之间。
pub fn extract_color_histogram(image: &RgbImage, bins: u32) -> FeatureVector {
    let bins = bins.clamp(1, MAX_BINS) as usize;
    let bin_size = 256_usize.div_ceil(bins);
    let quantize = |c: u8| (c as usize / bin_size).min(bins - 1);

    let mut counts = vec![0u32; bins * bins * bins];
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        let index = quantize(r) * bins * bins + quantize(g) * bins + quantize(b);
        counts[index] += 1;
    }

    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return FeatureVector(vec![0.0; counts.len()]);
    }
    let total = total as f64;
    FeatureVector(counts.into_iter().map(|c| (c as f64 / total) as f32).collect())
}
