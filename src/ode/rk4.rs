use crate::ode::{
  Constants, Integrator, Model, ModelState, NullSettings, StateVector, S,
};

pub type RK4Settings = NullSettings;

/// Classical fourth order Runge-Kutta.
///
/// Stage derivatives and the perturbed stage inputs live in scratch buffers
/// which are reused between steps.
pub struct RK4 {
  intermediate_state: StateVector,
  k: [StateVector; 4],
}

impl Integrator for RK4 {
  type Settings = RK4Settings;

  fn new(_: Self::Settings) -> Self {
    Self {
      intermediate_state: StateVector::zeros(0),
      k: [
        StateVector::zeros(0),
        StateVector::zeros(0),
        StateVector::zeros(0),
        StateVector::zeros(0),
      ],
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
    let mut last_multiplier: S = 0.0;
    self.intermediate_state.zeros_as(state);
    for (k_idx, multiplier) in
      [Some(0.5), Some(0.5), Some(1.0), None].iter().enumerate()
    {
      self.k[k_idx].zeros_as(state);

      let stage_state = if k_idx == 0 {
        &*state
      } else {
        &self.intermediate_state
      };

      model.derivative(
        time + last_multiplier * time_step,
        stage_state,
        constants,
        &mut self.k[k_idx],
      );

      if let Some(multiplier) = *multiplier {
        let stage_step = multiplier * time_step;

        for ((next_state, state), k_val) in self
          .intermediate_state
          .iter_mut()
          .zip(state.iter())
          .zip(self.k[k_idx].iter())
        {
          *next_state = *state + stage_step * *k_val;
        }

        last_multiplier = multiplier;
      }
    }

    let sixth = time_step / 6.0;

    for ((((state, k_0), k_1), k_2), k_3) in state
      .iter_mut()
      .zip(self.k[0].iter())
      .zip(self.k[1].iter())
      .zip(self.k[2].iter())
      .zip(self.k[3].iter())
    {
      *state += sixth * (*k_0 + 2.0 * *k_1 + 2.0 * *k_2 + *k_3);
    }
  }
}

#[cfg(test)]
use crate::{assert_float_eq, ode::RateFn};
#[cfg(test)]
use std::cell::RefCell;

#[test]
fn rk4_single_step_decay() {
  let model =
    RateFn::new(1, 0, |_, x: &StateVector, _: &Constants| x * -1.0);
  let mut rk4 = RK4::new(RK4Settings::default());

  let next = rk4.advance(
    &model,
    &StateVector::from_vec(vec![1.0]),
    &Constants::empty(),
    0.0,
    0.1,
  );

  // truncated taylor series of exp(-h)
  let h: S = 0.1;
  let expected = 1.0 - h + h * h / 2.0 - h * h * h / 6.0 + h * h * h * h / 24.0;
  assert_float_eq!(next[0], expected, 1e-12);
}

#[test]
fn rk4_stage_times_and_constants() {
  let calls = RefCell::new(Vec::new());
  let constants = Constants::new(vec![2.0, 3.0]);
  let model = RateFn::new(1, 2, |t, x: &StateVector, c: &Constants| {
    calls.borrow_mut().push((t, x[0], c.to_vec()));
    StateVector::from_element(1, 1.0)
  });
  let mut rk4 = RK4::new(RK4Settings::default());
  let start = StateVector::from_vec(vec![0.0]);

  let next = rk4.advance(&model, &start, &constants, 2.0, 0.5);

  let calls = calls.into_inner();
  let times: Vec<S> = calls.iter().map(|(t, _, _)| *t).collect();
  let inputs: Vec<S> = calls.iter().map(|(_, x, _)| *x).collect();
  assert_eq!(times, vec![2.0, 2.25, 2.25, 2.5]);
  assert_eq!(inputs, vec![0.0, 0.25, 0.25, 0.5]);
  for (_, _, c) in &calls {
    assert_eq!(c, &vec![2.0, 3.0]);
  }
  assert_float_eq!(next[0], 0.5, 1e-12);
  assert_eq!(start[0], 0.0);
}
