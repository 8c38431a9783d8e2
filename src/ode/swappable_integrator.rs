use crate::ode::{
  Constants, Euler, Integrator, Midpoint, Model, StateVector, RK4, S,
};
use clap::ValueEnum;
use std::fmt;

#[cfg(test)]
use proptest_derive::Arbitrary;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum IntegratorType {
  Euler,
  Midpoint,
  #[value(name = "rk4")]
  RK4,
}

impl IntegratorType {
  pub fn order(self) -> u32 {
    match self {
      Self::Euler => 1,
      Self::Midpoint => 2,
      Self::RK4 => 4,
    }
  }

  pub fn evaluations_per_step(self) -> usize {
    match self {
      Self::Euler => 1,
      Self::Midpoint => 2,
      Self::RK4 => 4,
    }
  }
}

impl fmt::Display for IntegratorType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Euler => "euler",
      Self::Midpoint => "midpoint",
      Self::RK4 => "rk4",
    })
  }
}

pub enum SwappableIntegrator {
  Euler(Euler),
  Midpoint(Midpoint),
  RK4(RK4),
}

impl Integrator for SwappableIntegrator {
  type Settings = IntegratorType;

  fn new(t: IntegratorType) -> Self {
    match t {
      IntegratorType::Euler => Self::Euler(Euler::new(Default::default())),
      IntegratorType::Midpoint => {
        Self::Midpoint(Midpoint::new(Default::default()))
      }
      IntegratorType::RK4 => Self::RK4(RK4::new(Default::default())),
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
    match self {
      Self::Euler(method) => {
        method.step_internal(model, state, constants, time, time_step)
      }
      Self::Midpoint(method) => {
        method.step_internal(model, state, constants, time, time_step)
      }
      Self::RK4(method) => {
        method.step_internal(model, state, constants, time, time_step)
      }
    }
  }
}

#[cfg(test)]
use crate::ode::RateFn;
#[cfg(test)]
use std::cell::Cell;

#[test]
fn swappable_dispatches_to_each_method() {
  for integrator_type in
    [IntegratorType::Euler, IntegratorType::Midpoint, IntegratorType::RK4]
  {
    let evaluations = Cell::new(0);
    let model = RateFn::new(2, 0, |_, x: &StateVector, _: &Constants| {
      evaluations.set(evaluations.get() + 1);
      x * -1.0
    });
    let mut integrator = SwappableIntegrator::new(integrator_type);

    let mut state = StateVector::from_vec(vec![1.0, 2.0]);
    let mut time = 0.0;
    integrator.n_steps(
      &model,
      &mut state,
      &Constants::empty(),
      &mut time,
      0.1,
      3,
    );

    assert_eq!(evaluations.get(), 3 * integrator_type.evaluations_per_step());
    assert!(state[0] < 1.0 && state[0] > 0.0);
  }
}

#[test]
fn integrator_type_names_round_trip() {
  for integrator_type in IntegratorType::value_variants() {
    let parsed =
      IntegratorType::from_str(&integrator_type.to_string(), false).unwrap();
    assert_eq!(parsed, *integrator_type);
  }
}
