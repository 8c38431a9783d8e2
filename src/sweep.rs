//! Batches of independent runs.
//!
//! Every case gets its own integrator and its own result; a case failing
//! validation does not stop its siblings.

use crate::models::ModelDefinition;
use crate::ode::{Constants, IntegratorType, Model, S};
use crate::sink::OutputTarget;
use crate::table::write_trajectory;
use crate::trajectory::{IntegrationParams, TimeSpan, Trajectory};
use crate::{Error, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct SweepCase {
  pub label: String,
  pub constants: Constants,
  pub span: TimeSpan,
}

#[derive(Debug)]
pub struct SweepRun {
  pub label: String,
  pub result: Result<Trajectory>,
}

/// One case per value, each replacing constant `index` of `definition`.
pub fn constant_cases<M: Model>(
  definition: &ModelDefinition<M>,
  span: TimeSpan,
  index: usize,
  values: &[S],
) -> Result<Vec<SweepCase>> {
  let base = definition.constants();

  values
    .iter()
    .map(|value| {
      let constants = base.with_value(index, *value).ok_or(
        Error::UnknownConstant {
          index,
          len: base.len(),
        },
      )?;

      Ok(SweepCase {
        label: format!("c{}={}", index, value),
        constants,
        span,
      })
    })
    .collect()
}

pub fn run_sweep<M: Model + Sync>(
  definition: &ModelDefinition<M>,
  integrator_type: IntegratorType,
  cases: &[SweepCase],
  progress: Option<&ProgressBar>,
) -> Vec<SweepRun> {
  debug!(cases = cases.len(), %integrator_type, "starting sweep");

  cases
    .par_iter()
    .map(|case| {
      let result = definition.simulate_with(
        &case.constants,
        &IntegrationParams {
          integrator_type,
          span: case.span,
        },
      );

      if let Err(err) = &result {
        warn!(case = %case.label, %err, "sweep case failed");
      }

      if let Some(progress) = progress {
        progress.inc(1);
      }

      SweepRun {
        label: case.label.clone(),
        result,
      }
    })
    .collect()
}

/// What [`write_sweep`] managed to put on disk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
  pub written: Vec<PathBuf>,
  /// Runs that failed to simulate or whose table could not be written.
  pub failed: usize,
}

impl SweepSummary {
  pub fn total(&self) -> usize {
    self.written.len() + self.failed
  }

  /// `Err(Error::SweepFailed)` if any run failed.
  pub fn check(&self) -> Result<()> {
    if self.failed > 0 {
      return Err(Error::SweepFailed {
        failed: self.failed,
        total: self.total(),
      });
    }

    Ok(())
  }
}

/// Creates `output_dir` unless it already exists as a directory.
pub fn prepare_output_dir(output_dir: &Path) -> Result<()> {
  if output_dir.exists() {
    if !output_dir.is_dir() {
      return Err(Error::NotADirectory(output_dir.to_path_buf()));
    }
  } else {
    create_dir_all(output_dir)?;
  }

  Ok(())
}

/// Writes run `idx` to `run_<idx>.csv` in `output_dir`.
///
/// A failed run or a failed write is logged and counted; the remaining
/// runs are still written.
pub fn write_sweep(
  runs: &[SweepRun],
  output_dir: &Path,
  names: Option<&[String]>,
) -> SweepSummary {
  let mut summary = SweepSummary::default();

  for (idx, run) in runs.iter().enumerate() {
    let trajectory = match &run.result {
      Ok(trajectory) => trajectory,
      Err(err) => {
        error!(case = %run.label, %err, "run failed");
        summary.failed += 1;
        continue;
      }
    };

    let path = output_dir.join(format!("run_{}.csv", idx));
    let written = OutputTarget::File(path.clone())
      .write_with(|writer| write_trajectory(writer, trajectory, names));

    match written {
      Ok(()) => {
        info!(case = %run.label, path = %path.display(), "wrote run");
        summary.written.push(path);
      }
      Err(err) => {
        error!(case = %run.label, path = %path.display(), %err, "write failed");
        summary.failed += 1;
      }
    }
  }

  if summary.failed > 0 {
    warn!(failed = summary.failed, total = runs.len(), "some runs failed");
  }

  summary
}

/// Sweeps constant `index` over `values` and writes one table per value.
///
/// The span and the constant index are checked before `output_dir` is
/// touched, so a misconfigured sweep leaves nothing behind.
pub fn sweep_to_dir<M: Model + Sync>(
  definition: &ModelDefinition<M>,
  params: &IntegrationParams,
  index: usize,
  values: &[S],
  output_dir: &Path,
  header: bool,
  progress: Option<&ProgressBar>,
) -> Result<SweepSummary> {
  params.span.validate()?;
  let cases = constant_cases(definition, params.span, index, values)?;

  prepare_output_dir(output_dir)?;

  let runs = run_sweep(definition, params.integrator_type, &cases, progress);

  Ok(write_sweep(
    &runs,
    output_dir,
    header.then(|| definition.variable_names()),
  ))
}

#[cfg(test)]
use crate::models::BuiltinModel;
#[cfg(test)]
use std::fs;
#[cfg(test)]
use tempfile::tempdir;

#[test]
fn failing_case_is_isolated() {
  let definition = BuiltinModel::Decay.definition().unwrap();
  let span = TimeSpan::new(0.0, 1.0, 0.1);
  let mut cases =
    constant_cases(&definition, span, 0, &[0.1, 0.5, 1.0]).unwrap();
  cases.insert(
    1,
    SweepCase {
      label: "bad step".into(),
      constants: definition.constants().clone(),
      span: TimeSpan::new(0.0, 1.0, 0.0),
    },
  );
  cases.push(SweepCase {
    label: "bad constants".into(),
    constants: Constants::new(vec![1.0, 2.0]),
    span,
  });

  let progress = ProgressBar::hidden();
  let runs =
    run_sweep(&definition, IntegratorType::RK4, &cases, Some(&progress));

  assert_eq!(progress.position(), cases.len() as u64);
  let labels: Vec<&str> = runs.iter().map(|run| run.label.as_str()).collect();
  assert_eq!(
    labels,
    vec!["c0=0.1", "bad step", "c0=0.5", "c0=1", "bad constants"]
  );
  assert!(matches!(runs[1].result, Err(Error::InvalidStepSize(_))));
  assert!(matches!(
    runs[4].result,
    Err(Error::ConstantsLengthMismatch { .. })
  ));

  let finals: Vec<S> = [0, 2, 3]
    .iter()
    .map(|idx| runs[*idx].result.as_ref().unwrap().final_state().unwrap()[0])
    .collect();
  assert!(finals[0] > finals[1] && finals[1] > finals[2]);
}

#[test]
fn unknown_constant_rejected_up_front() {
  let definition = BuiltinModel::Decay.definition().unwrap();

  assert!(matches!(
    constant_cases(&definition, TimeSpan::new(0.0, 1.0, 0.1), 3, &[1.0]),
    Err(Error::UnknownConstant { index: 3, len: 1 })
  ));
}

#[test]
fn sweep_matches_serial_runs() {
  let definition = BuiltinModel::LotkaVolterra.definition().unwrap();
  let span = TimeSpan::new(0.0, 2.0, 0.01);
  let cases =
    constant_cases(&definition, span, 1, &[0.2, 0.3, 0.4, 0.5]).unwrap();

  let runs = run_sweep(&definition, IntegratorType::Midpoint, &cases, None);

  for (case, run) in cases.iter().zip(&runs) {
    let serial = definition
      .simulate_with(
        &case.constants,
        &IntegrationParams {
          integrator_type: IntegratorType::Midpoint,
          span,
        },
      )
      .unwrap();
    assert_eq!(run.result.as_ref().unwrap(), &serial);
  }
}

#[cfg(test)]
fn decay_params(step: S) -> IntegrationParams {
  IntegrationParams {
    integrator_type: IntegratorType::RK4,
    span: TimeSpan::new(0.0, 1.0, step),
  }
}

#[test]
fn blocked_write_does_not_stop_the_rest() {
  let definition = BuiltinModel::Decay.definition().unwrap();
  let dir = tempdir().unwrap();
  fs::create_dir(dir.path().join("run_1.csv")).unwrap();

  let summary = sweep_to_dir(
    &definition,
    &decay_params(0.1),
    0,
    &[0.1, 0.5, 1.0],
    dir.path(),
    true,
    None,
  )
  .unwrap();

  assert_eq!(summary.failed, 1);
  assert_eq!(
    summary.written,
    vec![dir.path().join("run_0.csv"), dir.path().join("run_2.csv")]
  );
  assert!(summary.written.iter().all(|path| path.is_file()));
  assert!(matches!(
    summary.check(),
    Err(Error::SweepFailed {
      failed: 1,
      total: 3
    })
  ));
}

#[test]
fn failed_runs_are_counted_and_skipped() {
  let definition = BuiltinModel::Decay.definition().unwrap();
  let span = TimeSpan::new(0.0, 1.0, 0.1);
  let mut cases = constant_cases(&definition, span, 0, &[0.1, 0.5]).unwrap();
  cases.push(SweepCase {
    label: "bad step".into(),
    constants: definition.constants().clone(),
    span: TimeSpan::new(0.0, 1.0, 0.0),
  });
  let runs = run_sweep(&definition, IntegratorType::Euler, &cases, None);
  let dir = tempdir().unwrap();

  let summary = write_sweep(&runs, dir.path(), None);

  assert_eq!(summary.failed, 1);
  assert_eq!(summary.written.len(), 2);
  assert!(!dir.path().join("run_2.csv").exists());
  assert_eq!(summary.total(), 3);
}

#[test]
fn misconfigured_sweep_leaves_no_directory() {
  let definition = BuiltinModel::Decay.definition().unwrap();
  let dir = tempdir().unwrap();
  let output_dir = dir.path().join("runs");

  assert!(matches!(
    sweep_to_dir(
      &definition,
      &decay_params(0.0),
      0,
      &[0.5],
      &output_dir,
      true,
      None,
    ),
    Err(Error::InvalidStepSize(_))
  ));
  assert!(matches!(
    sweep_to_dir(
      &definition,
      &decay_params(0.1),
      4,
      &[0.5],
      &output_dir,
      true,
      None,
    ),
    Err(Error::UnknownConstant { index: 4, len: 1 })
  ));
  assert!(!output_dir.exists());
}

#[test]
fn output_dir_must_be_a_directory() {
  let dir = tempdir().unwrap();
  let file = dir.path().join("taken");
  fs::write(&file, "").unwrap();

  assert!(matches!(
    prepare_output_dir(&file),
    Err(Error::NotADirectory(path)) if path == file
  ));

  let nested = dir.path().join("a").join("b");
  prepare_output_dir(&nested).unwrap();
  assert!(nested.is_dir());
  prepare_output_dir(&nested).unwrap();
}
