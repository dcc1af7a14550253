use std::path::Path;

use image::RgbImage;
use indicatif::ProgressStyle;

use crate::detection::{BoundingBox, crop_detection};
use crate::error::Result;

/// 读取图片并转换为 RGB 格式
pub fn imread(path: impl AsRef<Path>) -> Result<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

/// 从内存解码图片并转换为 RGB 格式
pub fn imdecode(bytes: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// 按检测框裁剪图片，没有检测框时返回整张图片
pub fn crop_or_full(image: RgbImage, bbox: Option<BoundingBox>) -> Option<RgbImage> {
    match bbox {
        Some(bbox) => crop_detection(&image, bbox),
        None => Some(image),
    }
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {wide_bar} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
