use crate::ode::{
  Constants, Integrator, Model, ModelState, NullSettings, StateVector, S,
};

pub type MidpointSettings = NullSettings;

pub struct Midpoint {
  dxdt: StateVector,
  midpoint_state: StateVector,
}

impl Integrator for Midpoint {
  type Settings = MidpointSettings;

  fn new(_: Self::Settings) -> Self {
    Self {
      dxdt: StateVector::zeros(0),
      midpoint_state: StateVector::zeros(0),
    }
  }

  fn step_internal<M: Model>(
    &mut self,
    model: &M,
    state: &mut StateVector,
    constants: &Constants,
    time: S,
    time_step: S,
  ) {
    self.dxdt.zeros_as(state);
    self.midpoint_state.zeros_as(state);

    model.derivative(time, state, constants, &mut self.dxdt);

    let half_time_step = time_step * 0.5;

    for ((midpoint_state, state), dxdt) in self
      .midpoint_state
      .iter_mut()
      .zip(state.iter())
      .zip(self.dxdt.iter())
    {
      *midpoint_state = *state + half_time_step * *dxdt
    }

    let midpoint_time = time + half_time_step;

    model.derivative(
      midpoint_time,
      &self.midpoint_state,
      constants,
      &mut self.dxdt,
    );

    for (state, dxdt) in state.iter_mut().zip(self.dxdt.iter()) {
      *state += time_step * *dxdt
    }
  }
}

#[cfg(test)]
use crate::{assert_float_eq, ode::RateFn};

#[test]
fn midpoint_single_step_decay() {
  let model =
    RateFn::new(1, 0, |_, x: &StateVector, _: &Constants| x * -1.0);
  let mut midpoint = Midpoint::new(MidpointSettings::default());

  let next = midpoint.advance(
    &model,
    &StateVector::from_vec(vec![1.0]),
    &Constants::empty(),
    0.0,
    0.1,
  );

  // 1 - h + h^2 / 2
  assert_float_eq!(next[0], 0.905, 1e-12);
}
