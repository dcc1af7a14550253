use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{MatchOptions, Opts, OutputFormat};
use crate::store::LabelStore;

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// 只列出指定类别的标签
    #[arg(short = 'C', long)]
    pub category: Option<String>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ListCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let recognizer = opts.conf_dir.recognizer(&MatchOptions::default()).open().await?;
        let labels = match &self.category {
            Some(category) => recognizer.store().get_by_category(category).await?,
            None => recognizer.labels().await?,
        };

        match self.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&labels)?),
            OutputFormat::Table => {
                for label in labels {
                    println!("#{}\t{}\t{}", label.id, label.category, label.name);
                }
            }
        }
        Ok(())
    }
}
