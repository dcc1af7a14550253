use std::path::Path;

use log::info;
use sqlx::{SqlitePool, sqlite::*};

use crate::error::Result;

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

/// 打开数据库连接池并执行迁移
///
/// * `wal` - 是否启用 WAL 模式
pub async fn init_db(filename: impl AsRef<Path>, wal: bool) -> Result<Database> {
    let filename = filename.as_ref();
    info!("初始化数据库连接: {}", filename.display());

    if let Some(parent) = filename.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }
    }

    let journal_mode = if wal { SqliteJournalMode::Wal } else { SqliteJournalMode::Delete };
    let options = SqliteConnectOptions::new()
        .journal_mode(journal_mode)
        .synchronous(SqliteSynchronous::Normal)
        .filename(filename)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;

    info!("检查数据库迁移");
    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}
