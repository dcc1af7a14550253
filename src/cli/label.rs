use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{MatchOptions, Opts};
use crate::detection::{BoundingBox, Detection};
use crate::utils::{crop_or_full, imread};

#[derive(Parser, Debug, Clone)]
pub struct LabelCommand {
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 图片路径
    pub image: String,
    /// 自定义名称
    pub name: String,
    /// 物体类别
    #[arg(short = 'C', long)]
    pub category: String,
    /// 物体所在区域，格式为 LEFT,TOP,RIGHT,BOTTOM，默认使用整张图片
    #[arg(short, long, value_name = "BOX")]
    pub bbox: Option<BoundingBox>,
    /// 覆盖指定 ID 的标签，而不是新建
    #[arg(long, value_name = "ID")]
    pub id: Option<i64>,
}

impl SubCommandExtend for LabelCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let image = block_in_place(|| imread(&self.image))?;
        let bounding_box = self.bbox.unwrap_or(BoundingBox::full(image.width(), image.height()));
        let crop = crop_or_full(image, self.bbox).ok_or_else(|| anyhow!("检测框位于图片之外"))?;

        let recognizer = opts.conf_dir.recognizer(&self.matching).open().await?;
        let detection = Detection {
            bounding_box,
            labels: vec![self.category.clone()],
            tracking_id: None,
            crop: Some(crop),
        };
        let id = recognizer.save_label(&detection, &self.name, self.id).await?;

        info!("标签已保存");
        println!("{}", id);
        Ok(())
    }
}
