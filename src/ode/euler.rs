use crate::ode::{
  Constants, Integrator, Model, ModelState, NullSettings, StateVector, S,
};

pub type EulerSettings = NullSettings;

pub struct Euler {
  dxdt: StateVector,
}

impl Integrator for Euler {
  type Settings = EulerSettings;

  fn new(_: Self::Settings) -> Self {
    Self {
      dxdt: StateVector::zeros(0),
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

    model.derivative(time, state, constants, &mut self.dxdt);

    for (state, dxdt) in state.iter_mut().zip(self.dxdt.iter()) {
      *state += time_step * *dxdt
    }
  }
}

#[cfg(test)]
use crate::{assert_float_eq, ode::RateFn};

#[test]
fn euler_single_step_decay() {
  let model = RateFn::new(1, 1, |_, x: &StateVector, c: &Constants| {
    x * -c[0]
  });
  let mut euler = Euler::new(EulerSettings::default());
  let mut state = StateVector::from_vec(vec![1.0]);
  let mut time = 0.0;

  euler.step(&model, &mut state, &Constants::new(vec![1.0]), &mut time, 0.1);

  assert_float_eq!(state[0], 0.9, 1e-12);
  assert_float_eq!(time, 0.1, 1e-12);
}
