use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::cache::CacheEntry;
use crate::db::LabelRecord;

/// 识别请求参数
#[derive(TryFromMultipart)]
pub struct RecognizeRequest {
    pub file: Bytes,
    pub category: String,
    pub bbox: Option<String>,
    pub tracking_id: Option<i32>,
}

/// 识别表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct RecognizeForm {
    /// 整帧图片，或已裁剪好的物体图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 检测器给出的类别
    pub category: String,
    /// 物体所在区域，格式为 `LEFT,TOP,RIGHT,BOTTOM`，不填则使用整张图片
    pub bbox: Option<String>,
    /// 跟踪 ID，填写后会使用并更新会话缓存
    pub tracking_id: Option<i32>,
}

/// 识别响应
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct RecognizeResponse {
    /// 识别耗时，单位为毫秒
    pub time: u32,
    /// 显示的名称，未匹配时为类别名
    pub label: String,
    /// 匹配到的标签 ID
    pub record_id: Option<i64>,
    /// 相似度，来自缓存时为空
    pub score: Option<f32>,
    /// 是否命中缓存
    pub cached: bool,
}

/// 保存标签请求参数
#[derive(TryFromMultipart)]
pub struct SaveLabelRequest {
    pub file: Bytes,
    pub category: String,
    pub name: String,
    pub bbox: Option<String>,
    pub tracking_id: Option<i32>,
    pub id: Option<i64>,
}

/// 保存标签表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SaveLabelForm {
    /// 整帧图片，或已裁剪好的物体图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 检测器给出的类别
    pub category: String,
    /// 自定义名称
    pub name: String,
    /// 物体所在区域，格式为 `LEFT,TOP,RIGHT,BOTTOM`
    pub bbox: Option<String>,
    /// 跟踪 ID，填写后立即写入会话缓存
    pub tracking_id: Option<i32>,
    /// 要覆盖的标签 ID，不填则新建
    pub id: Option<i64>,
}

/// 标签列表查询参数
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// 只返回指定类别的标签
    pub category: Option<String>,
}

/// 删除标签的查询参数
#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteQuery {
    /// 同时移除该跟踪 ID 的缓存
    pub tracking_id: Option<i32>,
}

/// 标签信息，不包含特征向量
#[derive(Debug, Serialize, ToSchema)]
pub struct LabelItem {
    pub id: i64,
    pub category: String,
    pub name: String,
    /// 创建时间，毫秒时间戳
    pub created_at: i64,
}

impl From<LabelRecord> for LabelItem {
    fn from(record: LabelRecord) -> Self {
        Self { id: record.id, category: record.category, name: record.name, created_at: record.created_at }
    }
}

/// 跟踪 ID 当前对应的标签
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackResponse {
    pub name: String,
    pub record_id: i64,
}

impl From<CacheEntry> for TrackResponse {
    fn from(entry: CacheEntry) -> Self {
        Self { name: entry.name, record_id: entry.record_id }
    }
}
