//! Line charts of trajectories.

use crate::ode::S;
use crate::table::check_variable_names;
use crate::trajectory::Trajectory;
use crate::Result;
use image::{ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use tracing::info;

const PALETTE: [[u8; 3]; 10] = [
  [31, 119, 180],
  [255, 127, 14],
  [44, 160, 44],
  [214, 39, 40],
  [148, 103, 189],
  [140, 86, 75],
  [227, 119, 194],
  [127, 127, 127],
  [188, 189, 34],
  [23, 190, 207],
];

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChartOptions {
  pub width: u32,
  pub height: u32,
  pub margin: u32,
}

impl Default for ChartOptions {
  fn default() -> Self {
    Self {
      width: 800,
      height: 600,
      margin: 40,
    }
  }
}

pub fn series_color(idx: usize) -> Rgb<u8> {
  Rgb(PALETTE[idx % PALETTE.len()])
}

fn finite_range(values: impl Iterator<Item = S>) -> Option<(S, S)> {
  values.filter(|v| v.is_finite()).fold(None, |range, v| match range {
    None => Some((v, v)),
    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
  })
}

fn widen(lo: S, hi: S) -> (S, S) {
  if hi > lo {
    (lo, hi)
  } else {
    let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.5 };
    (lo - pad, hi + pad)
  }
}

fn draw_line(
  image: &mut RgbImage,
  (x0, y0): (i64, i64),
  (x1, y1): (i64, i64),
  color: Rgb<u8>,
) {
  let dx = (x1 - x0).abs();
  let dy = -(y1 - y0).abs();
  let sx = if x0 < x1 { 1 } else { -1 };
  let sy = if y0 < y1 { 1 } else { -1 };
  let (mut x, mut y) = (x0, y0);
  let mut err = dx + dy;

  loop {
    if x >= 0
      && y >= 0
      && (x as u32) < image.width()
      && (y as u32) < image.height()
    {
      image.put_pixel(x as u32, y as u32, color);
    }

    if x == x1 && y == y1 {
      break;
    }

    let e2 = 2 * err;
    if e2 >= dy {
      err += dy;
      x += sx;
    }
    if e2 <= dx {
      err += dx;
      y += sy;
    }
  }
}

fn draw_series(
  times: &[S],
  series: &[(Vec<S>, Rgb<u8>)],
  options: &ChartOptions,
) -> RgbImage {
  let mut image =
    RgbImage::from_pixel(options.width, options.height, BACKGROUND);

  let left = options.margin as i64;
  let top = options.margin as i64;
  let right = options.width.saturating_sub(options.margin) as i64;
  let bottom = options.height.saturating_sub(options.margin) as i64;

  draw_line(&mut image, (left, bottom), (right, bottom), AXIS);
  draw_line(&mut image, (left, bottom), (left, top), AXIS);

  let (t_lo, t_hi) = match finite_range(times.iter().cloned()) {
    Some((lo, hi)) => widen(lo, hi),
    None => return image,
  };
  let (v_lo, v_hi) = match finite_range(
    series.iter().flat_map(|(values, _)| values.iter().cloned()),
  ) {
    Some((lo, hi)) => widen(lo, hi),
    None => return image,
  };

  let to_pixel = |t: S, v: S| {
    let x = left as S + (t - t_lo) / (t_hi - t_lo) * (right - left) as S;
    let y = bottom as S - (v - v_lo) / (v_hi - v_lo) * (bottom - top) as S;
    (x.round() as i64, y.round() as i64)
  };

  for (values, color) in series {
    let mut last = None;

    for (&t, &v) in times.iter().zip(values) {
      if !t.is_finite() || !v.is_finite() {
        last = None;
        continue;
      }

      let point = to_pixel(t, v);
      draw_line(&mut image, last.unwrap_or(point), point, *color);
      last = Some(point);
    }
  }

  image
}

/// Draws every component against time on shared axes.
///
/// Non finite values break the line instead of being plotted.
pub fn draw_chart(trajectory: &Trajectory, options: &ChartOptions) -> RgbImage {
  let series: Vec<_> = (0..trajectory.dimension())
    .map(|idx| (trajectory.component(idx), series_color(idx)))
    .collect();

  draw_series(trajectory.times(), &series, options)
}

/// Draws component `idx` alone, scaled to its own range, in the same color
/// it has in [`draw_chart`].
pub fn draw_component(
  trajectory: &Trajectory,
  idx: usize,
  options: &ChartOptions,
) -> RgbImage {
  draw_series(
    trajectory.times(),
    &[(trajectory.component(idx), series_color(idx))],
    options,
  )
}

/// `<stem>_<name>.png` next to `path`, with anything but ASCII
/// alphanumerics, `-` and `_` in `name` replaced by `_`.
fn component_path(path: &Path, name: &str) -> PathBuf {
  let stem = path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default();
  let name: String = name
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
        c
      } else {
        '_'
      }
    })
    .collect();

  path.with_file_name(format!("{}_{}.png", stem, name))
}

/// Writes a PNG chart of `trajectory` to `path`, plus one chart per
/// component named after its variable.
///
/// Returns every path written, the combined chart first.
pub fn render_chart(
  path: &Path,
  trajectory: &Trajectory,
  names: &[String],
  options: &ChartOptions,
) -> Result<Vec<PathBuf>> {
  check_variable_names(names, trajectory.dimension())?;

  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      std::fs::create_dir_all(parent)?;
    }
  }

  draw_chart(trajectory, options).save_with_format(path, ImageFormat::Png)?;
  let mut written = vec![path.to_path_buf()];

  for (idx, name) in names.iter().enumerate() {
    let component_path = component_path(path, name);
    draw_component(trajectory, idx, options)
      .save_with_format(&component_path, ImageFormat::Png)?;

    let Rgb([r, g, b]) = series_color(idx);
    info!(
      series = %name,
      color = %format!("#{:02x}{:02x}{:02x}", r, g, b),
      path = %component_path.display(),
      "plotted"
    );
    written.push(component_path);
  }

  Ok(written)
}

#[cfg(test)]
use crate::{
  models::BuiltinModel,
  ode::{IntegratorType, StateVector},
  trajectory::IntegrationParams,
};
#[cfg(test)]
use tempfile::tempdir;

#[cfg(test)]
fn lotka_volterra() -> Trajectory {
  let model = BuiltinModel::LotkaVolterra;
  model
    .definition()
    .unwrap()
    .simulate(&IntegrationParams {
      integrator_type: IntegratorType::RK4,
      span: model.default_span(),
    })
    .unwrap()
}

#[test]
fn draws_each_series() {
  let trajectory = lotka_volterra();
  let options = ChartOptions::default();
  let image = draw_chart(&trajectory, &options);

  assert_eq!(image.dimensions(), (options.width, options.height));
  for idx in 0..trajectory.dimension() {
    let color = series_color(idx);
    assert!(image.pixels().any(|pixel| *pixel == color));
  }
  assert_eq!(*image.get_pixel(options.margin, options.margin / 2), BACKGROUND);
}

#[test]
fn render_writes_png() {
  let dir = tempdir().unwrap();
  let path = dir.path().join("charts").join("lv.png");
  let trajectory = lotka_volterra();
  let names = vec!["x".to_owned(), "y".to_owned()];

  let written =
    render_chart(&path, &trajectory, &names, &ChartOptions::default())
      .unwrap();

  assert_eq!(
    written,
    vec![
      path.clone(),
      dir.path().join("charts").join("lv_x.png"),
      dir.path().join("charts").join("lv_y.png"),
    ]
  );
  let loaded = image::open(&path).unwrap();
  assert_eq!(loaded.width(), 800);

  let prey = image::open(&written[1]).unwrap().to_rgb8();
  assert!(prey.pixels().any(|pixel| *pixel == series_color(0)));
  assert!(!prey.pixels().any(|pixel| *pixel == series_color(1)));
}

#[test]
fn component_paths_are_sanitised() {
  assert_eq!(
    component_path(Path::new("out/run.png"), "n/a b"),
    PathBuf::from("out/run_n_a_b.png")
  );
  assert_eq!(
    component_path(Path::new("chart"), "x-1"),
    PathBuf::from("chart_x-1.png")
  );
}

#[test]
fn flat_and_degenerate_series() {
  let trajectory = Trajectory::from_parts(
    vec![0.0, 1.0, 2.0],
    vec![
      StateVector::from_vec(vec![1.0]),
      StateVector::from_vec(vec![S::NAN]),
      StateVector::from_vec(vec![1.0]),
    ],
  );

  let image = draw_chart(&trajectory, &ChartOptions::default());

  assert!(image.pixels().any(|pixel| *pixel == series_color(0)));
}
