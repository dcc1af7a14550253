use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{MatchOptions, Opts};
use crate::store::LabelStore;

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// 标签 ID
    pub id: i64,
}

impl SubCommandExtend for DeleteCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let recognizer = opts.conf_dir.recognizer(&MatchOptions::default()).open().await?;
        if recognizer.store().get_by_id(self.id).await?.is_none() {
            return Err(anyhow!("标签 #{} 不存在", self.id));
        }
        recognizer.delete_label(self.id, None).await?;
        info!("删除完成");
        Ok(())
    }
}
