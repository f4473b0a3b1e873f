// 该文件是 Linzhi （林芝） 项目的一部分。
// src/task.rs - 任务编排
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

use std::{thread, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

use crate::{
  frame::ImageFrame,
  model::{DetectResult, Model},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error>;
}

/// 一次任务的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
  pub frames: usize,
  pub skipped: usize,
  pub detections: usize,
}

impl TaskSummary {
  fn log(&self) {
    info!(
      "任务完成: 处理 {} 张图像, 跳过 {} 张, 共 {} 个检测结果",
      self.frames, self.skipped, self.detections
    );
  }
}

fn log_result(frame: &ImageFrame, result: &DetectResult, elapsed: Duration) {
  info!(
    "{}: 检测到 {} 个对象, 耗时 {:.2?}",
    frame.file_name(),
    result.len(),
    elapsed
  );
}

pub struct OneShotTask;

impl<IE, ME, RE, I, M, O> Task<I, M, O> for OneShotTask
where
  IE: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<ImageFrame, IE>>,
  M: Model<Input = ImageFrame, Output = DetectResult, Error = ME>,
  O: Render<ImageFrame, DetectResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))??;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    log_result(&frame, &result, now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    let summary = TaskSummary {
      frames: 1,
      skipped: 0,
      detections: result.len(),
    };
    summary.log();
    Ok(summary)
  }
}

/// 逐张处理，单张图像读取或推理失败时记录并跳过
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理，在两张图像之间响应中断；每个进程只能安装一次
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }
}

impl<IE, ME, RE, I, M, O> Task<I, M, O> for ContinuousTask
where
  IE: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<ImageFrame, IE>>,
  M: Model<Input = ImageFrame, Output = DetectResult, Error = ME>,
  O: Render<ImageFrame, DetectResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    if self.handle_interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，处理完当前图像后退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })
      .context("无法设置 Ctrl-C 处理函数")?;
    }

    let mut summary = TaskSummary::default();
    loop {
      if self.frame_number.is_some_and(|n| summary.frames >= n) {
        info!("达到指定帧数 {}, 退出任务循环", summary.frames);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
      let Some(frame) = input.next() else {
        break;
      };

      let frame = match frame {
        Ok(frame) => frame,
        Err(e) => {
          warn!("读取图像失败，跳过: {}", e);
          summary.skipped += 1;
          continue;
        }
      };

      let now = std::time::Instant::now();
      let result = match model.infer(&frame) {
        Ok(result) => result,
        Err(e) => {
          warn!("{} 推理失败，跳过: {}", frame.file_name(), e);
          summary.skipped += 1;
          continue;
        }
      };
      log_result(&frame, &result, now.elapsed());

      output
        .render_result(&frame, &result)
        .with_context(|| format!("渲染 {} 失败", frame.file_name()))?;

      summary.frames += 1;
      summary.detections += result.len();
    }

    summary.log();
    Ok(summary)
  }
}

/// 用 rayon 线程池并行处理，每张图像相互独立
#[cfg(feature = "rayon")]
#[derive(Default, Debug)]
pub struct ParallelTask;

#[cfg(feature = "rayon")]
impl<IE, ME, RE, I, M, O> Task<I, M, O> for ParallelTask
where
  IE: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<ImageFrame, IE>> + Send,
  M: Model<Input = ImageFrame, Output = DetectResult, Error = ME> + Sync,
  O: Render<ImageFrame, DetectResult, Error = RE> + Sync,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    use rayon::iter::{ParallelBridge, ParallelIterator};
    use std::sync::atomic::{AtomicUsize, Ordering};

    info!("开始并行任务, 线程数 {}", rayon::current_num_threads());
    let frames = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let detections = AtomicUsize::new(0);

    input.par_bridge().try_for_each(|frame| -> anyhow::Result<()> {
      let frame = match frame {
        Ok(frame) => frame,
        Err(e) => {
          warn!("读取图像失败，跳过: {}", e);
          skipped.fetch_add(1, Ordering::Relaxed);
          return Ok(());
        }
      };

      let now = std::time::Instant::now();
      let result = match model.infer(&frame) {
        Ok(result) => result,
        Err(e) => {
          warn!("{} 推理失败，跳过: {}", frame.file_name(), e);
          skipped.fetch_add(1, Ordering::Relaxed);
          return Ok(());
        }
      };
      log_result(&frame, &result, now.elapsed());

      output
        .render_result(&frame, &result)
        .with_context(|| format!("渲染 {} 失败", frame.file_name()))?;

      frames.fetch_add(1, Ordering::Relaxed);
      detections.fetch_add(result.len(), Ordering::Relaxed);
      Ok(())
    })?;

    let summary = TaskSummary {
      frames: frames.into_inner(),
      skipped: skipped.into_inner(),
      detections: detections.into_inner(),
    };
    summary.log();
    Ok(summary)
  }
}
