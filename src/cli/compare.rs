use anyhow::Result;
use clap::Parser;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{MatchOptions, Opts};
use crate::histogram::extract_color_histogram;
use crate::similarity::cosine_similarity;
use crate::utils::imread;

#[derive(Parser, Debug, Clone)]
pub struct CompareCommand {
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 第一张图片
    pub image1: String,
    /// 第二张图片
    pub image2: String,
}

impl SubCommandExtend for CompareCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let score = block_in_place(|| -> Result<f32> {
            let a = extract_color_histogram(&imread(&self.image1)?, self.matching.bins);
            let b = extract_color_histogram(&imread(&self.image2)?, self.matching.bins);
            Ok(cosine_similarity(a.as_slice(), b.as_slice()))
        })?;

        let verdict = if score > self.matching.threshold { "match" } else { "different" };
        println!("{:.4}\t{}", score, verdict);
        Ok(())
    }
}
