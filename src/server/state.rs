use std::sync::Arc;

use crate::recognizer::Recognizer;
use crate::store::SqliteLabelStore;

use super::error::AppError;

/// 应用状态
pub struct AppState {
    /// 识别引擎，整个服务共用一个会话缓存
    pub recognizer: Arc<Recognizer<SqliteLabelStore>>,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(recognizer: Arc<Recognizer<SqliteLabelStore>>, token: String) -> Arc<Self> {
        Arc::new(AppState { recognizer, token })
    }

    /// 校验修改类请求携带的 token
    pub fn check_token(&self, token: &str) -> Result<(), AppError> {
        if token != self.token {
            return Err(AppError::unauthorized());
        }
        Ok(())
    }
}
