use sqlx::{Executor, Result, Sqlite};

use super::{LabelRecord, NewLabel};

/// 插入或覆盖标签记录，返回记录 ID
pub async fn upsert_label<'c, E>(executor: E, label: &NewLabel) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        INSERT INTO label (id, category, name, feature, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            category = excluded.category,
            name = excluded.name,
            feature = excluded.feature,
            created_at = excluded.created_at
        RETURNING id
        "#,
    )
    .bind(label.id)
    .bind(&label.category)
    .bind(&label.name)
    .bind(&label.feature)
    .bind(label.created_at)
    .fetch_one(executor)
    .await
}

/// 获取指定类别的所有标签，按 ID 升序
pub async fn get_labels_by_category<'c, E>(executor: E, category: &str) -> Result<Vec<LabelRecord>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT id, category, name, feature, created_at FROM label
        WHERE category = ? ORDER BY id ASC
        "#,
    )
    .bind(category)
    .fetch_all(executor)
    .await
}

/// 获取所有标签，按 ID 升序
pub async fn get_labels<'c, E>(executor: E) -> Result<Vec<LabelRecord>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT id, category, name, feature, created_at FROM label ORDER BY id ASC
        "#,
    )
    .fetch_all(executor)
    .await
}

pub async fn get_label<'c, E>(executor: E, id: i64) -> Result<Option<LabelRecord>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT id, category, name, feature, created_at FROM label WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// 删除标签，返回是否确实删除了记录
pub async fn delete_label<'c, E>(executor: E, id: i64) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM label WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 查询标签数量
pub async fn count_labels<'c, E>(executor: E) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM label"#).fetch_one(executor).await
}
