use anyhow::{Result, anyhow};
use clap::Parser;
use serde_json::json;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{MatchOptions, Opts, OutputFormat};
use crate::detection::BoundingBox;
use crate::matcher::LabelMatch;
use crate::utils::{crop_or_full, imread};

#[derive(Parser, Debug, Clone)]
pub struct RecognizeCommand {
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 被识别的图片路径
    pub image: String,
    /// 物体类别，只会与同类别的标签比较
    #[arg(short = 'C', long)]
    pub category: String,
    /// 物体所在区域，格式为 LEFT,TOP,RIGHT,BOTTOM，默认使用整张图片
    #[arg(short, long, value_name = "BOX")]
    pub bbox: Option<BoundingBox>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for RecognizeCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let image = block_in_place(|| imread(&self.image))?;
        let crop = crop_or_full(image, self.bbox).ok_or_else(|| anyhow!("检测框位于图片之外"))?;

        let recognizer = opts.conf_dir.recognizer(&self.matching).open().await?;
        let result = recognizer.find_match(&self.category, &crop).await?;

        print_result(result.as_ref(), &self.category, self.output_format)
    }
}

fn print_result(result: Option<&LabelMatch>, category: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = match result {
                Some(m) => json!({
                    "category": category,
                    "name": m.record.name,
                    "id": m.record.id,
                    "score": m.score,
                }),
                None => json!({ "category": category, "name": null }),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => match result {
            Some(m) => println!("{:.4}\t#{}\t{}", m.score, m.record.id, m.record.name),
            None => println!("-\t-\t{}", category),
        },
    }
    Ok(())
}
