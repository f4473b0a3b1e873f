// 该文件是 Linzhi （林芝） 项目的一部分。
// src/detect/palette.rs - 标签配色
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

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const SATURATION: f32 = 0.8;
const VALUE: f32 = 0.9;

/// 由标签字符串确定的显示颜色，与运行次数、进程无关
pub fn label_color(label: &str) -> [u8; 3] {
  let hash = label
    .bytes()
    .fold(FNV_OFFSET_BASIS, |h, b| (h ^ b as u32).wrapping_mul(FNV_PRIME));
  let hue = (hash % 360) as f32;
  hsv_to_rgb(hue, SATURATION, VALUE)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  [
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_label_same_color() {
    assert_eq!(label_color("person"), label_color("person"));
    assert_eq!(label_color(""), label_color(""));
  }

  #[test]
  fn labels_spread_over_palette() {
    let colors: std::collections::HashSet<_> = crate::label::VOC_LABELS
      .iter()
      .map(|l| label_color(l))
      .collect();
    assert!(colors.len() > 10);
  }

  #[test]
  fn primary_hues() {
    assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [255, 0, 0]);
    assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), [0, 255, 0]);
    assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), [0, 0, 255]);
  }
}
