//! Time grids, trajectories and the driver producing them.

use crate::ode::{
  Constants, Integrator, IntegratorType, Model, StateVector, S,
};
use crate::{Error, Result};
use tracing::debug;

/// A grid candidate this close to `stop` (relative to the step) is treated
/// as landing on it.
const LANDING_TOLERANCE: S = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSpan {
  pub start: S,
  pub stop: S,
  pub step: S,
}

impl TimeSpan {
  pub fn new(start: S, stop: S, step: S) -> Self {
    Self { start, stop, step }
  }

  pub fn validate(&self) -> Result<()> {
    if !self.step.is_finite() || self.step <= 0.0 {
      return Err(Error::InvalidStepSize(self.step));
    }

    if !self.start.is_finite()
      || !self.stop.is_finite()
      || self.stop < self.start
    {
      return Err(Error::InvalidTimeSpan {
        start: self.start,
        stop: self.stop,
      });
    }

    Ok(())
  }

  /// `start, start + step, ...` while below `stop`, then `stop` itself, so
  /// only the final interval can be shorter than `step`.
  pub fn grid(&self) -> Result<Vec<S>> {
    self.validate()?;

    let tolerance = self.step * LANDING_TOLERANCE;
    let mut times = vec![self.start];

    for i in 1.. {
      let time = self.start + i as S * self.step;
      if time >= self.stop - tolerance {
        break;
      }

      // step too small to move time at this magnitude
      if time <= times[times.len() - 1] {
        return Err(Error::InvalidStepSize(self.step));
      }

      times.push(time);
    }

    if self.stop > times[times.len() - 1] {
      times.push(self.stop);
    }

    Ok(times)
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegrationParams {
  pub integrator_type: IntegratorType,
  pub span: TimeSpan,
}

/// States recorded on a time grid, one state per time point.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
  times: Vec<S>,
  states: Vec<StateVector>,
}

impl Trajectory {
  pub(crate) fn from_parts(times: Vec<S>, states: Vec<StateVector>) -> Self {
    debug_assert_eq!(times.len(), states.len());

    Self { times, states }
  }

  pub fn times(&self) -> &[S] {
    &self.times
  }

  pub fn states(&self) -> &[StateVector] {
    &self.states
  }

  pub fn len(&self) -> usize {
    self.times.len()
  }

  pub fn is_empty(&self) -> bool {
    self.times.is_empty()
  }

  pub fn dimension(&self) -> usize {
    self.states.first().map_or(0, |state| state.len())
  }

  pub fn initial_state(&self) -> Option<&StateVector> {
    self.states.first()
  }

  pub fn final_state(&self) -> Option<&StateVector> {
    self.states.last()
  }

  pub fn iter(&self) -> impl Iterator<Item = (S, &StateVector)> + '_ {
    self.times.iter().cloned().zip(self.states.iter())
  }

  /// Values of one state component over time.
  pub fn component(&self, idx: usize) -> Vec<S> {
    self.states.iter().map(|state| state[idx]).collect()
  }
}

/// Checks everything a run depends on before the first evaluation.
pub fn validate_run<M: Model>(
  model: &M,
  initial_state: &StateVector,
  constants: &Constants,
  span: &TimeSpan,
) -> Result<Vec<S>> {
  if initial_state.len() != model.dimension() {
    return Err(Error::StateLengthMismatch {
      expected: model.dimension(),
      actual: initial_state.len(),
    });
  }

  if constants.len() != model.n_constants() {
    return Err(Error::ConstantsLengthMismatch {
      expected: model.n_constants(),
      actual: constants.len(),
    });
  }

  span.grid()
}

/// Integrates `model` from `initial_state` over `span`.
///
/// Every state after the first is produced by one call to
/// [`Integrator::advance`] from its predecessor. All steps use
/// `span.step` except the last, which ends exactly on `span.stop`.
pub fn simulate<M: Model, I: Integrator>(
  integrator: &mut I,
  model: &M,
  initial_state: &StateVector,
  constants: &Constants,
  span: &TimeSpan,
) -> Result<Trajectory> {
  let times = validate_run(model, initial_state, constants, span)?;

  debug!(
    points = times.len(),
    dimension = model.dimension(),
    "integrating"
  );

  let last = times.len() - 1;
  let mut states: Vec<StateVector> = Vec::with_capacity(times.len());
  states.push(initial_state.clone());

  for idx in 1..times.len() {
    let time = times[idx - 1];
    let time_step = if idx == last {
      times[idx] - time
    } else {
      span.step
    };

    let next =
      integrator.advance(model, &states[idx - 1], constants, time, time_step);
    states.push(next);
  }

  Ok(Trajectory::from_parts(times, states))
}

#[cfg(test)]
use crate::ode::{RateFn, SwappableIntegrator};
#[cfg(test)]
use proptest::prelude::*;
#[cfg(test)]
use std::cell::Cell;

#[cfg(test)]
fn decay_final_error(integrator_type: IntegratorType, step: S) -> S {
  let model = RateFn::new(1, 1, |_, x: &StateVector, c: &Constants| {
    x * -c[0]
  });
  let trajectory = simulate(
    &mut SwappableIntegrator::new(integrator_type),
    &model,
    &StateVector::from_vec(vec![1.0]),
    &Constants::new(vec![1.0]),
    &TimeSpan::new(0.0, 1.0, step),
  )
  .unwrap();

  (trajectory.final_state().unwrap()[0] - (-1.0 as S).exp()).abs()
}

#[test]
fn quarter_step_grid() {
  let span = TimeSpan::new(0.0, 1.0, 0.25);
  let times = span.grid().unwrap();

  assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75, 1.0]);

  let model =
    RateFn::new(1, 0, |_, x: &StateVector, _: &Constants| x.clone());
  let trajectory = simulate(
    &mut SwappableIntegrator::new(IntegratorType::Euler),
    &model,
    &StateVector::from_vec(vec![1.0]),
    &Constants::empty(),
    &span,
  )
  .unwrap();

  assert_eq!(trajectory.times(), &times[..]);
  assert_eq!(trajectory.len(), times.len());
}

#[test]
fn grid_clips_final_point() {
  let times = TimeSpan::new(0.0, 1.0, 0.3).grid().unwrap();

  assert_eq!(times.len(), 5);
  assert_eq!(times[3], 3.0 * 0.3);
  assert_eq!(times[4], 1.0);
  assert!(times.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn grid_absorbs_rounding_at_stop() {
  // 3 * 0.1 overshoots 0.3 by one ulp
  let times = TimeSpan::new(0.0, 0.3, 0.1).grid().unwrap();

  assert_eq!(times, vec![0.0, 0.1, 0.2, 0.3]);
}

#[test]
fn empty_span_is_single_point() {
  let model =
    RateFn::new(1, 0, |_, x: &StateVector, _: &Constants| x.clone());
  let trajectory = simulate(
    &mut SwappableIntegrator::new(IntegratorType::RK4),
    &model,
    &StateVector::from_vec(vec![4.0]),
    &Constants::empty(),
    &TimeSpan::new(2.0, 2.0, 0.1),
  )
  .unwrap();

  assert_eq!(trajectory.times(), &[2.0]);
  assert_eq!(trajectory.states()[0][0], 4.0);
}

#[test]
fn rk4_beats_euler_on_decay() {
  for step in [0.2, 0.1, 0.05] {
    assert!(
      decay_final_error(IntegratorType::RK4, step)
        < decay_final_error(IntegratorType::Euler, step)
    );
  }
}

#[test]
fn convergence_orders() {
  for (integrator_type, steps) in [
    (IntegratorType::Euler, [0.01, 0.005, 0.0025]),
    (IntegratorType::Midpoint, [0.02, 0.01, 0.005]),
    (IntegratorType::RK4, [0.1, 0.05, 0.025]),
  ] {
    let expected = (2.0 as S).powi(integrator_type.order() as i32);
    let errors: Vec<S> = steps
      .iter()
      .map(|step| decay_final_error(integrator_type, *step))
      .collect();
    let coarse_ratio = errors[0] / errors[1];
    let fine_ratio = errors[1] / errors[2];

    assert!(
      (fine_ratio - expected).abs() < 0.05 * expected,
      "{} ratio {}",
      integrator_type,
      fine_ratio
    );
    assert!((fine_ratio - expected).abs() < (coarse_ratio - expected).abs());
  }
}

#[test]
fn zero_step_fails_before_evaluation() {
  let evaluations = Cell::new(0);
  let model = RateFn::new(1, 0, |_, x: &StateVector, _: &Constants| {
    evaluations.set(evaluations.get() + 1);
    x.clone()
  });

  let result = simulate(
    &mut SwappableIntegrator::new(IntegratorType::RK4),
    &model,
    &StateVector::from_vec(vec![1.0]),
    &Constants::empty(),
    &TimeSpan::new(0.0, 1.0, 0.0),
  );

  assert!(matches!(result, Err(Error::InvalidStepSize(step)) if step == 0.0));
  assert_eq!(evaluations.get(), 0);
}

#[test]
fn configuration_errors() {
  let model = RateFn::new(2, 1, |_, x: &StateVector, _: &Constants| {
    x.clone()
  });
  let run = |state: Vec<S>, constants: Vec<S>, span: TimeSpan| {
    simulate(
      &mut SwappableIntegrator::new(IntegratorType::Euler),
      &model,
      &StateVector::from_vec(state),
      &Constants::new(constants),
      &span,
    )
  };
  let span = TimeSpan::new(0.0, 1.0, 0.1);

  assert!(matches!(
    run(vec![1.0], vec![1.0], span),
    Err(Error::StateLengthMismatch {
      expected: 2,
      actual: 1
    })
  ));
  assert!(matches!(
    run(vec![1.0, 1.0], vec![], span),
    Err(Error::ConstantsLengthMismatch {
      expected: 1,
      actual: 0
    })
  ));
  assert!(matches!(
    run(vec![1.0, 1.0], vec![1.0], TimeSpan::new(1.0, 0.0, 0.1)),
    Err(Error::InvalidTimeSpan { .. })
  ));
  assert!(matches!(
    run(vec![1.0, 1.0], vec![1.0], TimeSpan::new(0.0, 1.0, -0.1)),
    Err(Error::InvalidStepSize(_))
  ));
  assert!(matches!(
    run(vec![1.0, 1.0], vec![1.0], TimeSpan::new(0.0, S::NAN, 0.1)),
    Err(Error::InvalidTimeSpan { .. })
  ));
}

#[test]
fn degenerate_values_propagate() {
  let model =
    RateFn::new(1, 0, |_, x: &StateVector, _: &Constants| x.map(|v| 1.0 / v));
  let trajectory = simulate(
    &mut SwappableIntegrator::new(IntegratorType::Euler),
    &model,
    &StateVector::from_vec(vec![0.0]),
    &Constants::empty(),
    &TimeSpan::new(0.0, 0.3, 0.1),
  )
  .unwrap();

  assert_eq!(trajectory.len(), 4);
  assert!(trajectory.states()[1][0].is_infinite());
  assert!(trajectory.final_state().unwrap()[0].is_infinite());
}

#[cfg(test)]
proptest! {
#[test]
fn zero_rate_keeps_initial_state(
  initial in prop::collection::vec(-1e6f64..1e6, 1..6),
  start in -10.0f64..10.0,
  length in 0.0f64..5.0,
  step in 0.01f64..1.0,
  integrator_type: IntegratorType,
) {
  let dimension = initial.len();
  let model = RateFn::new(dimension, 0, |_, x: &StateVector, _: &Constants| {
    StateVector::zeros(x.len())
  });
  let initial = StateVector::from_vec(initial);

  let trajectory = simulate(
    &mut SwappableIntegrator::new(integrator_type),
    &model,
    &initial,
    &Constants::empty(),
    &TimeSpan::new(start, start + length, step),
  )
  .unwrap();

  prop_assert_eq!(trajectory.initial_state(), Some(&initial));
  for state in trajectory.states() {
    prop_assert_eq!(state, &initial);
  }
}

#[test]
fn runs_are_bit_identical(
  initial in prop::collection::vec(0.1f64..10.0, 2),
  rate in 0.01f64..2.0,
  step in 0.01f64..0.5,
  integrator_type: IntegratorType,
) {
  let model = RateFn::new(2, 1, |t, x: &StateVector, c: &Constants| {
    StateVector::from_vec(vec![
      -c[0] * x[0] * x[1] + t.sin(),
      c[0] * x[0] - x[1] / (1.0 + t),
    ])
  });
  let initial = StateVector::from_vec(initial);
  let constants = Constants::new(vec![rate]);
  let span = TimeSpan::new(0.0, 3.0, step);
  let run = || {
    simulate(
      &mut SwappableIntegrator::new(integrator_type),
      &model,
      &initial,
      &constants,
      &span,
    )
    .unwrap()
  };

  let first = run();
  let second = run();

  prop_assert_eq!(first.times().len(), second.times().len());
  for (a, b) in first.states().iter().zip(second.states()) {
    for (a, b) in a.iter().zip(b.iter()) {
      prop_assert_eq!(a.to_bits(), b.to_bits());
    }
  }
}

#[test]
fn grid_is_strictly_increasing(
  start in -100.0f64..100.0,
  length in 0.0f64..50.0,
  step in 0.001f64..10.0,
) {
  let span = TimeSpan::new(start, start + length, step);
  let times = span.grid().unwrap();

  prop_assert_eq!(times[0], start);
  prop_assert_eq!(*times.last().unwrap(), span.stop);
  prop_assert!(times.windows(2).all(|w| w[0] < w[1]));
  prop_assert!(times.windows(2).all(|w| w[1] - w[0] <= step * (1.0 + 1e-6)));
}
}
