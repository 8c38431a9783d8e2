use crate::ode::S;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("step size must be finite and positive, got {0}")]
  InvalidStepSize(S),

  #[error("invalid time span: start {start}, stop {stop}")]
  InvalidTimeSpan { start: S, stop: S },

  #[error("state has {actual} components, model expects {expected}")]
  StateLengthMismatch { expected: usize, actual: usize },

  #[error("got {actual} constants, model expects {expected}")]
  ConstantsLengthMismatch { expected: usize, actual: usize },

  #[error("got {actual} variable names for {expected} state components")]
  VariableNamesMismatch { expected: usize, actual: usize },

  #[error("variable name {0:?} cannot be used as a column label")]
  InvalidVariableName(String),

  #[error("an output path is required when rendering a chart")]
  MissingOutputPath,

  #[error("constant index {index} out of range ({len} constants)")]
  UnknownConstant { index: usize, len: usize },

  #[error("{failed} of {total} sweep runs failed")]
  SweepFailed { failed: usize, total: usize },

  #[error("{} exists and is not a directory", .0.display())]
  NotADirectory(PathBuf),

  #[error("invalid model definition: {0}")]
  ModelDefinition(String),

  #[error("line {line}: {message}")]
  Parse { line: usize, message: String },

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error("chart rendering failed: {0}")]
  Chart(#[from] image::ImageError),
}
