use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use regex::Regex;
use tokio::task::block_in_place;
use walkdir::WalkDir;

use crate::cli::SubCommandExtend;
use crate::config::{MatchOptions, Opts};
use crate::detection::{BoundingBox, Detection};
use crate::store::LabelStore;
use crate::utils::{imread, pb_style};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 图片所在目录，每张图片保存为一个标签
    pub path: PathBuf,
    /// 图片中物体的类别，需要与检测器输出的类别一致
    #[arg(short = 'C', long)]
    pub category: String,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,png,webp")]
    pub suffix: String,
    /// 默认使用文件名（不含后缀）作为标签名称，也可以使用正则表达式对图片路径进行处理
    /// 例：--replace '.*/(?<name>[^/]+)/[^/]+$' '$name'
    #[arg(short, long, value_names = ["REGEX", "REPLACE"], num_args = 2, verbatim_doc_comment)]
    pub replace: Vec<String>,
    /// 如果同类别下已有同名标签，是否覆盖旧的记录
    #[arg(long)]
    pub overwrite: bool,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = Regex::new(&format!("(?i)^({})$", self.suffix.replace(',', "|")))?;
        let replace = match &self.replace[..] {
            [re, replace] => Some((Regex::new(re)?, replace.clone())),
            _ => None,
        };

        let recognizer = opts.conf_dir.recognizer(&self.matching).open().await?;
        let mut existing = recognizer
            .store()
            .get_by_category(&self.category)
            .await?
            .into_iter()
            .map(|record| (record.name, record.id))
            .collect::<HashMap<_, _>>();

        info!("开始扫描目录: {}", self.path.display());
        let entries = scan_directory(&self.path, &re_suf);
        info!("扫描完成，共 {} 张图片", entries.len());

        let pb = ProgressBar::new(entries.len() as u64).with_style(pb_style());

        for path in entries {
            let name = label_name(&path, replace.as_ref());
            if name.trim().is_empty() {
                pb.println(format!("标签名称为空，跳过: {}", path.display()));
                pb.inc(1);
                continue;
            }
            let existing_id = existing.get(&name).copied();
            if existing_id.is_some() && !self.overwrite {
                pb.set_message(format!("跳过已存在的标签: {}", name));
                pb.inc(1);
                continue;
            }

            let image = match block_in_place(|| imread(&path)) {
                Ok(image) => image,
                Err(e) => {
                    pb.println(format!("读取图片失败: {}: {}", path.display(), e));
                    pb.inc(1);
                    continue;
                }
            };
            let detection = Detection {
                bounding_box: BoundingBox::full(image.width(), image.height()),
                labels: vec![self.category.clone()],
                tracking_id: None,
                crop: Some(image),
            };
            let id = recognizer.save_label(&detection, &name, existing_id).await?;
            pb.set_message(format!("#{} {}", id, name));
            existing.insert(name, id);
            pb.inc(1);
        }

        pb.finish_with_message("标签导入完成");

        Ok(())
    }
}

fn scan_directory(path: &Path, re_suf: &Regex) -> Vec<PathBuf> {
    let mut entries = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| re_suf.is_match(&ext.to_string_lossy()))
        })
        .collect::<Vec<_>>();
    // 保证导入顺序稳定
    entries.sort();
    entries
}

/// 根据图片路径生成标签名称
fn label_name(path: &Path, replace: Option<&(Regex, String)>) -> String {
    match replace {
        Some((re, replace)) => re.replace(&path.to_string_lossy(), replace.as_str()).into_owned(),
        None => path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
    }
}
