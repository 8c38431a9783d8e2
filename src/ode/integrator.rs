use crate::ode::{Constants, Model, StateVector, S};

/// A fixed step method advancing a state by one time increment.
pub trait Integrator {
  type Settings: Clone;

  fn new(settings: Self::Settings) -> Self;

  fn step_internal<M: Model>(
    &mut self,
    model: &M,
    state: &mut StateVector,
    constants: &Constants,
    time: S,
    time_step: S,
  );

  fn step<M: Model>(
    &mut self,
    model: &M,
    state: &mut StateVector,
    constants: &Constants,
    time: &mut S,
    time_step: S,
  ) {
    self.step_internal(model, state, constants, *time, time_step);

    *time += time_step;
  }

  fn n_steps<M: Model>(
    &mut self,
    model: &M,
    state: &mut StateVector,
    constants: &Constants,
    time: &mut S,
    time_step: S,
    steps: usize,
  ) {
    for _ in 0..steps {
      self.step(model, state, constants, time, time_step);
    }
  }

  /// Returns the state one step after `state`, leaving `state` untouched.
  fn advance<M: Model>(
    &mut self,
    model: &M,
    state: &StateVector,
    constants: &Constants,
    time: S,
    time_step: S,
  ) -> StateVector {
    let mut next = state.clone();

    self.step_internal(model, &mut next, constants, time, time_step);

    next
  }
}
