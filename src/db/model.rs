use serde::Serialize;
use sqlx::FromRow;

/// 自定义标签记录
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct LabelRecord {
    /// 标签 ID，创建时分配
    pub id: i64,
    /// 保存时检测器给出的类别
    pub category: String,
    /// 用户输入的自定义名称
    pub name: String,
    /// 编码后的特征向量
    pub feature: String,
    /// 创建时间，毫秒时间戳
    pub created_at: i64,
}

/// 待写入的标签，`id` 为空时新建，否则覆盖同 ID 的旧记录
#[derive(Debug, Clone)]
pub struct NewLabel {
    pub id: Option<i64>,
    pub category: String,
    pub name: String,
    pub feature: String,
    pub created_at: i64,
}
