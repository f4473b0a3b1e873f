// 该文件是 Linzhi （林芝） 项目的一部分。
// src/bin/detect_folder.rs - 对整个目录的图像做检测并输出标注结果
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use anyhow::Result;
use clap::Parser;
use url::Url;

use linzhi::{
  FromUrl,
  args::PipelineArgs,
  detect::DetectionPipeline,
  input::InputWrapper,
  model::{Detector, TensorFileModel},
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};
use tracing::info;

/// Linzhi 目录检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 网络输出张量目录，例如 tensor:///data/outputs?format=json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 folder:///data/images
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 folder:///data/annotated?record=json
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 最多处理的图像数量
  #[arg(long, value_name = "MAX_FRAMES")]
  pub max_frames: Option<usize>,

  /// 使用 rayon 线程池并行处理
  #[cfg(feature = "rayon")]
  #[arg(long)]
  pub parallel: bool,

  #[command(flatten)]
  pub pipeline: PipelineArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("张量目录: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = args.pipeline.into_config()?;
  let pipeline = DetectionPipeline::new(config)?;

  let input = InputWrapper::from_url(&args.input)?;
  let model = Detector::new(TensorFileModel::from_url(&args.model)?, pipeline);
  let output = OutputWrapper::from_url(&args.output)?;

  #[cfg(feature = "rayon")]
  if args.parallel {
    if args.max_frames.is_some() {
      tracing::warn!("并行模式下忽略 --max-frames");
    }
    linzhi::task::ParallelTask.run_task(input, model, output)?;
    return Ok(());
  }

  ContinuousTask::default()
    .with_frame_number(args.max_frames)
    .with_interrupt(true)
    .run_task(input, model, output)?;

  Ok(())
}
