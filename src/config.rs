use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;
use crate::histogram::{DEFAULT_BINS, MAX_BINS};
use crate::matcher::DEFAULT_THRESHOLD;
use crate::recognizer::RecognizerBuilder;

static CONF_DIR: LazyLock<String> = LazyLock::new(|| {
    ProjectDirs::from("", "imlabel", "imlabel")
        .map(|dirs| dirs.config_dir().to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from(".imlabel"))
});

fn default_config_dir() -> &'static str {
    CONF_DIR.as_str()
}

#[derive(Parser, Debug, Clone)]
pub struct MatchOptions {
    /// 颜色直方图每个通道的量化桶数量，特征维数为其三次方
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BINS, value_parser = clap::value_parser!(u32).range(1..=MAX_BINS as i64))]
    pub bins: u32,
    /// 判定为同一物体所需的最小余弦相似度（不含），范围从 0 到 1
    #[arg(short, long, value_name = "SCORE", default_value_t = DEFAULT_THRESHOLD, value_parser = parse_threshold)]
    pub threshold: f32,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { bins: DEFAULT_BINS, threshold: DEFAULT_THRESHOLD }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imlabel", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imlabel 配置文件目录
    #[arg(short, long, global = true, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 批量导入目录中的图片作为自定义标签
    Add(AddCommand),
    /// 为一张图片中的物体保存自定义标签
    Label(LabelCommand),
    /// 识别一张图片中的物体
    Recognize(RecognizeCommand),
    /// 列出已保存的标签
    List(ListCommand),
    /// 删除标签
    Delete(DeleteCommand),
    /// 比较两张图片的颜色直方图相似度
    Compare(CompareCommand),
    /// 按清单回放帧序列，模拟实时识别
    Replay(ReplayCommand),
    /// 启动 HTTP 识别服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("imlabel.db")
    }

    /// 使用此目录下的数据库构建识别引擎
    pub fn recognizer(&self, opts: &MatchOptions) -> RecognizerBuilder {
        RecognizerBuilder::new(self.database()).bins(opts.bins).threshold(opts.threshold)
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

fn parse_threshold(s: &str) -> anyhow::Result<f32> {
    let v: f32 = s.parse()?;
    if !(0.0..=1.0).contains(&v) {
        return Err(anyhow::anyhow!("阈值必须在 0 到 1 之间: {}", s));
    }
    Ok(v)
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}
