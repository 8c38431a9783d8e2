//! A single simulation from an output request to a written table or chart.

use crate::chart::{render_chart, ChartOptions};
use crate::models::ModelDefinition;
use crate::ode::Model;
use crate::sink::OutputTarget;
use crate::table::write_trajectory;
use crate::trajectory::{IntegrationParams, Trajectory};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the result of a run goes.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutput {
  Table { target: OutputTarget, header: bool },
  Chart { path: PathBuf, options: ChartOptions },
}

impl RunOutput {
  /// A chart needs a file to go to; a table falls back to stdout.
  pub fn select(
    output: Option<&Path>,
    chart: bool,
    header: bool,
  ) -> Result<Self> {
    match (chart, output) {
      (true, Some(path)) => Ok(Self::Chart {
        path: path.to_path_buf(),
        options: ChartOptions::default(),
      }),
      (true, None) => Err(Error::MissingOutputPath),
      (false, output) => Ok(Self::Table {
        target: OutputTarget::from_path(output),
        header,
      }),
    }
  }
}

/// Simulates `definition` and writes the trajectory to `output`.
///
/// Nothing is written unless the simulation succeeds.
pub fn run_model<M: Model>(
  definition: &ModelDefinition<M>,
  params: &IntegrationParams,
  output: &RunOutput,
) -> Result<Trajectory> {
  info!(
    method = %params.integrator_type,
    start = params.span.start,
    stop = params.span.stop,
    step = params.span.step,
    "simulating"
  );

  let trajectory = definition.simulate(params)?;

  match output {
    RunOutput::Chart { path, options } => {
      render_chart(path, &trajectory, definition.variable_names(), options)?;
    }
    RunOutput::Table { target, header } => {
      target.write_with(|writer| {
        write_trajectory(
          writer,
          &trajectory,
          header.then(|| definition.variable_names()),
        )
      })?;
    }
  }

  Ok(trajectory)
}

#[cfg(test)]
use crate::{
  ode::{Constants, IntegratorType, RateFn, StateVector},
  table::read_trajectory,
  trajectory::TimeSpan,
};
#[cfg(test)]
use std::cell::Cell;
#[cfg(test)]
use std::fs::File;
#[cfg(test)]
use std::io::BufReader;
#[cfg(test)]
use tempfile::tempdir;

#[cfg(test)]
fn counted_decay(
  evaluations: &Cell<usize>,
) -> ModelDefinition<impl Model + '_> {
  let model = RateFn::new(1, 0, move |_, x: &StateVector, _: &Constants| {
    evaluations.set(evaluations.get() + 1);
    x * -1.0
  });

  ModelDefinition::new(
    model,
    StateVector::from_vec(vec![1.0]),
    Constants::empty(),
    vec!["y".to_owned()],
  )
  .unwrap()
}

#[cfg(test)]
fn decay_params() -> IntegrationParams {
  IntegrationParams {
    integrator_type: IntegratorType::Euler,
    span: TimeSpan::new(0.0, 1.0, 0.25),
  }
}

#[test]
fn chart_without_output_fails_before_evaluation() {
  let evaluations = Cell::new(0);
  let definition = counted_decay(&evaluations);

  let result = RunOutput::select(None, true, true)
    .and_then(|output| run_model(&definition, &decay_params(), &output));

  assert!(matches!(result, Err(Error::MissingOutputPath)));
  assert_eq!(evaluations.get(), 0);
}

#[test]
fn dash_selects_stdout_table() {
  assert_eq!(
    RunOutput::select(Some(Path::new("-")), false, false).unwrap(),
    RunOutput::Table {
      target: OutputTarget::Stdout,
      header: false
    }
  );
}

#[test]
fn table_run_writes_file() {
  let evaluations = Cell::new(0);
  let definition = counted_decay(&evaluations);
  let dir = tempdir().unwrap();
  let path = dir.path().join("decay.csv");

  let output = RunOutput::select(Some(&path), false, true).unwrap();
  let trajectory = run_model(&definition, &decay_params(), &output).unwrap();

  assert_eq!(evaluations.get(), 4);
  let parsed =
    read_trajectory(BufReader::new(File::open(&path).unwrap())).unwrap();
  assert_eq!(parsed.names, Some(vec!["y".to_owned()]));
  assert_eq!(parsed.trajectory.len(), trajectory.len());
}

#[test]
fn failed_run_writes_nothing() {
  let evaluations = Cell::new(0);
  let definition = counted_decay(&evaluations);
  let dir = tempdir().unwrap();
  let path = dir.path().join("decay.csv");
  let params = IntegrationParams {
    span: TimeSpan::new(0.0, 1.0, 0.0),
    ..decay_params()
  };

  let output = RunOutput::select(Some(&path), false, true).unwrap();

  assert!(matches!(
    run_model(&definition, &params, &output),
    Err(Error::InvalidStepSize(_))
  ));
  assert!(!path.exists());
  assert_eq!(evaluations.get(), 0);
}

#[test]
fn chart_run_writes_png() {
  let evaluations = Cell::new(0);
  let definition = counted_decay(&evaluations);
  let dir = tempdir().unwrap();
  let path = dir.path().join("decay.png");

  let output = RunOutput::select(Some(&path), true, true).unwrap();
  run_model(&definition, &decay_params(), &output).unwrap();

  assert!(path.exists());
  assert!(dir.path().join("decay_y.png").exists());
}
