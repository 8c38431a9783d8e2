pub mod builtin;
pub mod definition;

pub use builtin::BuiltinModel;
pub use definition::{ExpressionModel, ModelFile};

use crate::ode::{
  Constants, Integrator, Model, StateVector, SwappableIntegrator, S,
};
use crate::table::check_variable_names;
use crate::trajectory::{simulate, IntegrationParams, Trajectory};
use crate::{Error, Result};

/// Everything needed to run a model: its rate function, initial condition,
/// constants and column labels.
#[derive(Clone, Debug)]
pub struct ModelDefinition<M> {
  model: M,
  initial_state: StateVector,
  constants: Constants,
  variable_names: Vec<String>,
}

impl<M: Model> ModelDefinition<M> {
  pub fn new(
    model: M,
    initial_state: StateVector,
    constants: Constants,
    variable_names: Vec<String>,
  ) -> Result<Self> {
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

    check_variable_names(&variable_names, model.dimension())?;

    Ok(Self {
      model,
      initial_state,
      constants,
      variable_names,
    })
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn initial_state(&self) -> &StateVector {
    &self.initial_state
  }

  pub fn constants(&self) -> &Constants {
    &self.constants
  }

  pub fn variable_names(&self) -> &[String] {
    &self.variable_names
  }

  pub fn map_model<N: Model>(
    self,
    f: impl FnOnce(M) -> N,
  ) -> Result<ModelDefinition<N>> {
    ModelDefinition::new(
      f(self.model),
      self.initial_state,
      self.constants,
      self.variable_names,
    )
  }

  pub fn simulate(&self, params: &IntegrationParams) -> Result<Trajectory> {
    self.simulate_with(&self.constants, params)
  }

  /// Runs with `constants` in place of the definition's own.
  pub fn simulate_with(
    &self,
    constants: &Constants,
    params: &IntegrationParams,
  ) -> Result<Trajectory> {
    simulate(
      &mut SwappableIntegrator::new(params.integrator_type),
      &self.model,
      &self.initial_state,
      constants,
      &params.span,
    )
  }
}

/// Any model the command line can select.
#[derive(Clone, Debug)]
pub enum AnyModel {
  Builtin(BuiltinModel),
  Expression(ExpressionModel),
}

impl Model for AnyModel {
  fn dimension(&self) -> usize {
    match self {
      Self::Builtin(model) => model.dimension(),
      Self::Expression(model) => model.dimension(),
    }
  }

  fn n_constants(&self) -> usize {
    match self {
      Self::Builtin(model) => model.n_constants(),
      Self::Expression(model) => model.n_constants(),
    }
  }

  fn derivative(
    &self,
    t: S,
    x: &StateVector,
    constants: &Constants,
    dxdt: &mut StateVector,
  ) {
    match self {
      Self::Builtin(model) => model.derivative(t, x, constants, dxdt),
      Self::Expression(model) => model.derivative(t, x, constants, dxdt),
    }
  }
}

#[cfg(test)]
use crate::ode::RateFn;

#[cfg(test)]
fn linear_model() -> impl Model {
  RateFn::new(2, 1, |_, x: &StateVector, c: &Constants| x * c[0])
}

#[test]
fn definition_checks_lengths() {
  let names = || vec!["a".to_owned(), "b".to_owned()];

  assert!(ModelDefinition::new(
    linear_model(),
    StateVector::zeros(2),
    Constants::new(vec![1.0]),
    names(),
  )
  .is_ok());
  assert!(matches!(
    ModelDefinition::new(
      linear_model(),
      StateVector::zeros(3),
      Constants::new(vec![1.0]),
      names(),
    ),
    Err(Error::StateLengthMismatch { .. })
  ));
  assert!(matches!(
    ModelDefinition::new(
      linear_model(),
      StateVector::zeros(2),
      Constants::new(vec![1.0, 2.0]),
      names(),
    ),
    Err(Error::ConstantsLengthMismatch { .. })
  ));
  assert!(matches!(
    ModelDefinition::new(
      linear_model(),
      StateVector::zeros(2),
      Constants::new(vec![1.0]),
      vec!["a".to_owned()],
    ),
    Err(Error::VariableNamesMismatch { .. })
  ));
}
