use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use image::{RgbImage, imageops};
use serde::{Deserialize, Serialize};

use crate::cache::TrackingId;

/// 检测器没有给出类别时使用的类别名
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// 检测框，坐标为帧内像素，右、下边界不包含在内
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// 覆盖整张图片的检测框
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.top, self.right, self.bottom)
    }
}

/// 解析 `LEFT,TOP,RIGHT,BOTTOM` 格式的检测框
impl FromStr for BoundingBox {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split(',').map(|p| p.trim().parse::<i32>()).collect::<Result<Vec<_>, _>>()?;
        match parts[..] {
            [left, top, right, bottom] => Ok(Self::new(left, top, right, bottom)),
            _ => Err(anyhow!("无效的检测框: {}", s)),
        }
    }
}

/// 检测器对单个物体的输出
#[derive(Debug, Clone)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    /// 检测器给出的类别，按置信度排列
    pub labels: Vec<String>,
    /// 跟踪 ID，检测器未启用跟踪时为空
    pub tracking_id: Option<TrackingId>,
    /// 检测框内的裁剪图片
    pub crop: Option<RgbImage>,
}

impl Detection {
    /// 使用第一个标签作为类别
    pub fn category(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or(UNKNOWN_CATEGORY)
    }

    /// 从整帧图片裁剪出检测框内的区域
    pub fn with_crop_from(mut self, frame: &RgbImage) -> Self {
        self.crop = crop_detection(frame, self.bounding_box);
        self
    }
}

/// 裁剪检测框，检测框会被限制在图片范围内，且至少保留 1x1 像素
///
/// 检测框完全位于图片之外时返回 `None`
pub fn crop_detection(frame: &RgbImage, bbox: BoundingBox) -> Option<RgbImage> {
    let (fw, fh) = (frame.width() as i64, frame.height() as i64);
    let left = (bbox.left as i64).max(0);
    let top = (bbox.top as i64).max(0);
    let right = (bbox.right as i64).min(fw);
    let bottom = (bbox.bottom as i64).min(fh);
    // 完全位于左侧或上方的检测框同样视为在图片之外
    let before = (bbox.right <= 0 && bbox.left < 0) || (bbox.bottom <= 0 && bbox.top < 0);
    if left >= fw || top >= fh || before {
        return None;
    }
    let width = (right - left).max(1);
    let height = (bottom - top).max(1);
    Some(imageops::crop_imm(frame, left as u32, top as u32, width as u32, height as u32).to_image())
}

/// 外部物体检测器
pub trait Detector: Send + 'static {
    type Error: fmt::Display;

    /// 检测一帧图片中的物体
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn frame() -> RgbImage {
        RgbImage::from_fn(10, 8, |x, y| Rgb([x as u8, y as u8, 0]))
    }

    #[test]
    fn test_category() {
        let mut det = Detection {
            bounding_box: BoundingBox::new(0, 0, 1, 1),
            labels: vec![],
            tracking_id: None,
            crop: None,
        };
        assert_eq!(det.category(), UNKNOWN_CATEGORY);
        det.labels = vec!["bottle".into(), "cup".into()];
        assert_eq!(det.category(), "bottle");
    }

    #[test]
    fn test_crop_inside() {
        let crop = crop_detection(&frame(), BoundingBox::new(2, 3, 5, 7)).unwrap();
        assert_eq!(crop.dimensions(), (3, 4));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([2, 3, 0]));
    }

    #[test]
    fn test_crop_clamped() {
        let crop = crop_detection(&frame(), BoundingBox::new(-5, -5, 100, 100)).unwrap();
        assert_eq!(crop.dimensions(), (10, 8));
    }

    #[test]
    fn test_crop_degenerate() {
        let crop = crop_detection(&frame(), BoundingBox::new(4, 4, 4, 2)).unwrap();
        assert_eq!(crop.dimensions(), (1, 1));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([4, 4, 0]));
    }

    #[test]
    fn test_crop_outside() {
        assert!(crop_detection(&frame(), BoundingBox::new(10, 0, 20, 5)).is_none());
        assert!(crop_detection(&frame(), BoundingBox::new(0, 8, 5, 20)).is_none());
        assert!(crop_detection(&frame(), BoundingBox::new(-20, 0, -10, 5)).is_none());
        assert!(crop_detection(&frame(), BoundingBox::new(0, -20, 5, -10)).is_none());
        assert!(crop_detection(&frame(), BoundingBox::new(-5, 0, 0, 5)).is_none());
    }

    #[test]
    fn test_crop_degenerate_at_origin() {
        let crop = crop_detection(&frame(), BoundingBox::new(0, 0, 0, 0)).unwrap();
        assert_eq!(crop.dimensions(), (1, 1));
    }

    #[test]
    fn test_parse_bbox() {
        assert_eq!("1, 2,3,4".parse::<BoundingBox>().unwrap(), BoundingBox::new(1, 2, 3, 4));
        assert_eq!(BoundingBox::new(1, 2, 3, 4).to_string(), "1,2,3,4");
        assert!("1,2,3".parse::<BoundingBox>().is_err());
        assert!("a,b,c,d".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn test_contains() {
        let b = BoundingBox::new(0, 0, 2, 2);
        assert!(b.contains(1, 1));
        assert!(!b.contains(2, 1));
    }
}
