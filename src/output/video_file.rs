// 该文件是 yolo-labeler 项目的一部分。
// src/output/video_file.rs - 通过 ffmpeg 管道写视频文件
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

//! 视频文件输出
//!
//! 原始 rgb24 帧经标准输入送入 ffmpeg 子进程，编码为 MPEG-4 Part 2
//! （`mp4v`），宽高与帧率与输入视频一致。需要系统安装 ffmpeg。

use std::{
  io::{Read, Write},
  path::{Path, PathBuf},
  process::{Child, ChildStdin, Command, Stdio},
  thread::JoinHandle,
};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{input::VideoInfo, output::FrameSink};

#[derive(Error, Debug)]
pub enum VideoFileOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法启动 ffmpeg (请确保已安装): {0}")]
  Spawn(std::io::Error),
  #[error("帧尺寸不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  FrameSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
  #[error("视频编码错误: {0}")]
  EncodingError(String),
  #[error("写入器已结束")]
  Finished,
}

pub struct VideoFileOutput {
  path: PathBuf,
  size: (u32, u32),
  child: Option<Child>,
  stdin: Option<ChildStdin>,
  /// 后台读取 ffmpeg 的错误输出，避免管道写满阻塞编码
  stderr: Option<JoinHandle<String>>,
  frames_written: u64,
}

impl VideoFileOutput {
  pub fn create(path: impl AsRef<Path>, info: &VideoInfo) -> Result<Self, VideoFileOutputError> {
    let path = path.as_ref().to_path_buf();

    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    info!(
      "创建视频输出: {}x{} @ {} fps -> {}",
      info.width,
      info.height,
      info.frame_rate,
      path.display()
    );

    let mut child = Command::new("ffmpeg")
      .arg("-y")
      .arg("-loglevel")
      .arg("error")
      .arg("-f")
      .arg("rawvideo")
      .arg("-pix_fmt")
      .arg("rgb24")
      .arg("-s")
      .arg(format!("{}x{}", info.width, info.height))
      .arg("-framerate")
      .arg(info.frame_rate.to_string())
      .arg("-i")
      .arg("-")
      .arg("-c:v")
      .arg("mpeg4")
      .arg("-vtag")
      .arg("mp4v")
      .arg(&path)
      .stdin(Stdio::piped())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(VideoFileOutputError::Spawn)?;

    let stdin = child.stdin.take();
    let stderr = child.stderr.take().map(|mut pipe| {
      std::thread::spawn(move || {
        let mut text = String::new();
        if let Err(e) = pipe.read_to_string(&mut text) {
          warn!("读取 ffmpeg 输出失败: {}", e);
        }
        text
      })
    });

    Ok(Self {
      path,
      size: (info.width, info.height),
      child: Some(child),
      stdin,
      stderr,
      frames_written: 0,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn collect_stderr(&mut self) -> String {
    match self.stderr.take().map(JoinHandle::join) {
      Some(Ok(text)) => text,
      Some(Err(_)) => {
        warn!("ffmpeg 输出读取线程异常退出");
        String::new()
      }
      None => String::new(),
    }
  }
}

impl FrameSink for VideoFileOutput {
  type Error = VideoFileOutputError;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error> {
    if image.dimensions() != self.size {
      return Err(VideoFileOutputError::FrameSizeMismatch {
        expected: self.size,
        actual: image.dimensions(),
      });
    }

    let stdin = self.stdin.as_mut().ok_or(VideoFileOutputError::Finished)?;
    if let Err(e) = stdin.write_all(image.as_raw()) {
      // ffmpeg 提前退出时带上它的错误输出
      if e.kind() == std::io::ErrorKind::BrokenPipe {
        self.finish()?;
      }
      return Err(e.into());
    }
    self.frames_written += 1;
    debug!("写入第 {} 帧", self.frames_written);
    Ok(())
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    // 关闭管道让 ffmpeg 结束编码
    drop(self.stdin.take());

    let Some(mut child) = self.child.take() else {
      return Ok(());
    };

    let status = child.wait()?;
    let stderr = self.collect_stderr();
    if !status.success() {
      error!("ffmpeg 错误: {}", stderr.trim());
      return Err(VideoFileOutputError::EncodingError(format!(
        "ffmpeg 退出状态 {}: {}",
        status,
        stderr.trim()
      )));
    }

    info!(
      "视频编码完成: {} 帧 -> {}",
      self.frames_written,
      self.path.display()
    );
    Ok(())
  }

  fn frames_written(&self) -> u64 {
    self.frames_written
  }
}

impl Drop for VideoFileOutput {
  fn drop(&mut self) {
    drop(self.stdin.take());
    if let Some(mut child) = self.child.take() {
      warn!("视频输出未正常结束: {}", self.path.display());
      if let Err(e) = child.wait() {
        warn!("等待 ffmpeg 退出失败: {}", e);
      }
    }
    self.collect_stderr();
  }
}
