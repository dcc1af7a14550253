use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use log::info;
use serde_json::{Value, json};
use tokio::task::block_in_place;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::detection::{BoundingBox, Detection};
use crate::recognizer::Label;
use crate::store::LabelStore;
use crate::{metrics, utils};

/// 解码上传的图片并按检测框裁剪
fn decode_detection(
    file: &Bytes,
    category: &str,
    bbox: Option<&str>,
    tracking_id: Option<i32>,
) -> Result<Detection> {
    let bbox = bbox
        .map(|s| s.parse::<BoundingBox>())
        .transpose()
        .map_err(|e| AppError::bad_request(e.to_string()))?;
    let image = block_in_place(|| utils::imdecode(file))?;
    let bounding_box = bbox.unwrap_or(BoundingBox::full(image.width(), image.height()));
    let crop = utils::crop_or_full(image, bbox)
        .ok_or_else(|| AppError::bad_request("检测框位于图片之外"))?;
    Ok(Detection { bounding_box, labels: vec![category.to_owned()], tracking_id, crop: Some(crop) })
}

/// 识别上传图片中的物体
#[utoipa::path(
    post,
    path = "/recognize",
    request_body(content = RecognizeForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = RecognizeResponse),
    )
)]
pub async fn recognize_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<RecognizeRequest>,
) -> Result<Json<Value>> {
    let start = Instant::now();
    let detection =
        decode_detection(&data.file, &data.category, data.bbox.as_deref(), data.tracking_id)?;
    let recognition = state.recognizer.recognize(&detection).await?;
    let score = match &recognition.label {
        Label::Custom { score, .. } => *score,
        _ => None,
    };

    Ok(Json(json!({
        "time": start.elapsed().as_millis(),
        "label": recognition.label.text(),
        "record_id": recognition.label.record_id(),
        "score": score,
        "cached": recognition.cached,
    })))
}

/// 列出标签
#[utoipa::path(
    get,
    path = "/labels",
    params(ListQuery),
    responses(
        (status = 200, body = Vec<LabelItem>),
    )
)]
pub async fn list_labels_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<LabelItem>>> {
    let labels = match &query.category {
        Some(category) => state.recognizer.store().get_by_category(category).await?,
        None => state.recognizer.labels().await?,
    };
    Ok(Json(labels.into_iter().map(LabelItem::from).collect()))
}

/// 保存自定义标签
#[utoipa::path(
    post,
    path = "/labels",
    request_body(content = SaveLabelForm, content_type = "multipart/form-data"),
    security(("token" = []))
)]
pub async fn save_label_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    data: TypedMultipart<SaveLabelRequest>,
) -> Result<Json<Value>> {
    state.check_token(&token)?;
    let detection =
        decode_detection(&data.file, &data.category, data.bbox.as_deref(), data.tracking_id)?;
    let id = state.recognizer.save_label(&detection, &data.name, data.id).await?;
    Ok(Json(json!({ "id": id })))
}

/// 删除标签
#[utoipa::path(
    delete,
    path = "/labels/{id}",
    params(("id" = i64, Path, description = "标签 ID"), DeleteQuery),
    security(("token" = []))
)]
pub async fn delete_label_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> Result<()> {
    state.check_token(&token)?;
    if state.recognizer.store().get_by_id(id).await?.is_none() {
        return Err(AppError::not_found(format!("标签 #{} 不存在", id)));
    }
    state.recognizer.delete_label(id, query.tracking_id).await?;
    Ok(())
}

/// 查询跟踪 ID 当前对应的标签
#[utoipa::path(
    get,
    path = "/tracks/{tracking_id}",
    params(("tracking_id" = i32, Path, description = "跟踪 ID")),
    responses(
        (status = 200, body = TrackResponse, description = "没有对应标签时返回 null"),
    )
)]
pub async fn track_handler(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<i32>,
) -> Result<Json<Option<TrackResponse>>> {
    let entry = state.recognizer.existing_label(tracking_id).await?;
    Ok(Json(entry.map(TrackResponse::from)))
}

/// 开始新的识别会话，清空缓存
#[utoipa::path(post, path = "/session/reset", security(("token" = [])))]
pub async fn reset_session_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<()> {
    state.check_token(&token)?;
    info!("收到重置会话请求");
    state.recognizer.start_session();
    Ok(())
}

/// 导出 prometheus 指标
#[utoipa::path(get, path = "/metrics")]
pub async fn metrics_handler() -> String {
    metrics::gather_text()
}
