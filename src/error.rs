use thiserror::Error;

/// 识别与标签操作的错误
#[derive(Debug, Error)]
pub enum LabelError {
    /// 存储的特征向量无法解析
    #[error("特征向量解码失败: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("自定义名称不能为空")]
    EmptyName,

    /// 检测结果没有附带裁剪图片，无法计算特征
    #[error("检测结果缺少裁剪图片")]
    MissingImage,

    #[error("标签存储错误: {0}")]
    Store(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("图片处理失败: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T, E = LabelError> = std::result::Result<T, E>;
