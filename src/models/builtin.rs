use crate::models::ModelDefinition;
use crate::ode::{Constants, Model, StateVector, S};
use crate::trajectory::TimeSpan;
use crate::Result;
use clap::ValueEnum;

#[cfg(test)]
use proptest_derive::Arbitrary;

/// Models shipped with the crate.
///
/// - `Decay`: `y' = -k y`
/// - `LotkaVolterra`: `x' = alpha x - beta x y`, `y' = omega x y - gamma y`
/// - `Abc`: `A' = A B`, `B' = -A B`, `C' = A B / C`
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum BuiltinModel {
  Decay,
  LotkaVolterra,
  Abc,
}

impl BuiltinModel {
  pub fn definition(self) -> Result<ModelDefinition<Self>> {
    let (initial_state, constants, names) = match self {
      Self::Decay => (vec![1.0], vec![0.5], vec!["y"]),
      Self::LotkaVolterra => {
        (vec![10.0, 5.0], vec![1.1, 0.4, 0.1, 0.4], vec!["x", "y"])
      }
      Self::Abc => (vec![1.0, 0.5, 1.0], vec![], vec!["A", "B", "C"]),
    };

    ModelDefinition::new(
      self,
      StateVector::from_vec(initial_state),
      Constants::new(constants),
      names.into_iter().map(String::from).collect(),
    )
  }

  pub fn default_span(self) -> TimeSpan {
    match self {
      Self::Decay => TimeSpan::new(0.0, 10.0, 0.1),
      Self::LotkaVolterra => TimeSpan::new(0.0, 50.0, 0.01),
      Self::Abc => TimeSpan::new(0.0, 10.0, 0.01),
    }
  }
}

impl Model for BuiltinModel {
  fn dimension(&self) -> usize {
    match self {
      Self::Decay => 1,
      Self::LotkaVolterra => 2,
      Self::Abc => 3,
    }
  }

  fn n_constants(&self) -> usize {
    match self {
      Self::Decay => 1,
      Self::LotkaVolterra => 4,
      Self::Abc => 0,
    }
  }

  fn derivative(
    &self,
    _: S,
    x: &StateVector,
    constants: &Constants,
    dxdt: &mut StateVector,
  ) {
    match self {
      Self::Decay => {
        let k = constants[0];
        dxdt[0] = -k * x[0];
      }
      Self::LotkaVolterra => {
        let (alpha, beta, omega, gamma) =
          (constants[0], constants[1], constants[2], constants[3]);
        let (prey, predator) = (x[0], x[1]);
        dxdt[0] = alpha * prey - beta * prey * predator;
        dxdt[1] = omega * prey * predator - gamma * predator;
      }
      Self::Abc => {
        let (a, b, c) = (x[0], x[1], x[2]);
        dxdt[0] = a * b;
        dxdt[1] = -(a * b);
        dxdt[2] = a * b / c;
      }
    }
  }
}

#[cfg(test)]
use crate::{
  assert_float_eq,
  ode::IntegratorType,
  table::write_trajectory,
  trajectory::IntegrationParams,
};
#[cfg(test)]
use proptest::prelude::*;

#[test]
fn decay_matches_closed_form() {
  let definition = BuiltinModel::Decay.definition().unwrap();
  let trajectory = definition
    .simulate(&IntegrationParams {
      integrator_type: IntegratorType::RK4,
      span: BuiltinModel::Decay.default_span(),
    })
    .unwrap();

  for (t, state) in trajectory.iter() {
    assert_float_eq!(state[0], (-0.5 * t).exp(), 1e-6);
  }
}

#[test]
fn abc_conserves_a_plus_b() {
  let definition = BuiltinModel::Abc.definition().unwrap();
  let trajectory = definition
    .simulate(&IntegrationParams {
      integrator_type: IntegratorType::RK4,
      span: TimeSpan::new(0.0, 2.0, 0.01),
    })
    .unwrap();

  for state in trajectory.states() {
    assert_float_eq!(state[0] + state[1], 1.5, 1e-9);
  }
}

#[test]
fn abc_singularity_is_written_verbatim() {
  let definition = ModelDefinition::new(
    BuiltinModel::Abc,
    StateVector::from_vec(vec![1.0, 0.5, 0.0]),
    Constants::empty(),
    vec!["A".into(), "B".into(), "C".into()],
  )
  .unwrap();

  let trajectory = definition
    .simulate(&IntegrationParams {
      integrator_type: IntegratorType::Euler,
      span: TimeSpan::new(0.0, 0.1, 0.05),
    })
    .unwrap();

  let mut out = Vec::new();
  write_trajectory(&mut out, &trajectory, None).unwrap();
  let text = String::from_utf8(out).unwrap();
  assert!(text.lines().nth(1).unwrap().ends_with(",inf"));
}

#[cfg(test)]
proptest! {
#[test]
fn builtin_definitions_are_consistent(model: BuiltinModel) {
  let definition = model.definition().unwrap();

  prop_assert_eq!(definition.initial_state().len(), model.dimension());
  prop_assert_eq!(definition.constants().len(), model.n_constants());
  prop_assert!(model.default_span().validate().is_ok());
}
}
