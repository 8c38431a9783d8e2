use nalgebra::DVector;
use std::ops::Deref;

pub type S = f64;

pub type StateVector = DVector<S>;

pub trait ModelState {
  fn zeros_as(&mut self, other: &Self);
}

impl ModelState for StateVector {
  fn zeros_as(&mut self, other: &Self) {
    if self.len() == other.len() {
      self.fill(0.0);
    } else {
      *self = StateVector::zeros(other.len());
    }
  }
}

/// Model specific parameters, passed unchanged to every derivative
/// evaluation of a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constants(Vec<S>);

impl Constants {
  pub fn new(values: Vec<S>) -> Self {
    Self(values)
  }

  pub fn empty() -> Self {
    Self(Vec::new())
  }

  /// Copy with the constant at `index` replaced, `None` if out of range.
  pub fn with_value(&self, index: usize, value: S) -> Option<Self> {
    let mut values = self.0.clone();
    *values.get_mut(index)? = value;
    Some(Self(values))
  }
}

impl Deref for Constants {
  type Target = [S];

  fn deref(&self) -> &[S] {
    &self.0
  }
}

/// Right hand side of `dx/dt = f(t, x, constants)`.
///
/// Implementations must be pure: the integrators evaluate them at
/// intermediate times and states which never show up in the trajectory.
pub trait Model {
  /// Length of the state vector.
  fn dimension(&self) -> usize;

  fn n_constants(&self) -> usize;

  fn derivative(
    &self,
    t: S,
    x: &StateVector,
    constants: &Constants,
    dxdt: &mut StateVector,
  );
}

impl<M: Model + ?Sized> Model for &M {
  fn dimension(&self) -> usize {
    (**self).dimension()
  }

  fn n_constants(&self) -> usize {
    (**self).n_constants()
  }

  fn derivative(
    &self,
    t: S,
    x: &StateVector,
    constants: &Constants,
    dxdt: &mut StateVector,
  ) {
    (**self).derivative(t, x, constants, dxdt)
  }
}

/// Adapts a closure returning the derivative into a [`Model`].
#[derive(Clone)]
pub struct RateFn<F> {
  dimension: usize,
  n_constants: usize,
  f: F,
}

impl<F> RateFn<F>
where
  F: Fn(S, &StateVector, &Constants) -> StateVector,
{
  pub fn new(dimension: usize, n_constants: usize, f: F) -> Self {
    Self {
      dimension,
      n_constants,
      f,
    }
  }
}

impl<F> Model for RateFn<F>
where
  F: Fn(S, &StateVector, &Constants) -> StateVector,
{
  fn dimension(&self) -> usize {
    self.dimension
  }

  fn n_constants(&self) -> usize {
    self.n_constants
  }

  fn derivative(
    &self,
    t: S,
    x: &StateVector,
    constants: &Constants,
    dxdt: &mut StateVector,
  ) {
    *dxdt = (self.f)(t, x, constants);
    debug_assert_eq!(dxdt.len(), x.len());
  }
}

#[test]
fn zeros_as_resizes_and_clears() {
  let mut buffer = StateVector::from_vec(vec![1.0, 2.0]);
  buffer.zeros_as(&StateVector::zeros(3));
  assert_eq!(buffer, StateVector::zeros(3));

  let mut buffer = StateVector::from_vec(vec![1.0, 2.0, 3.0]);
  buffer.zeros_as(&StateVector::from_vec(vec![7.0, 8.0, 9.0]));
  assert_eq!(buffer, StateVector::zeros(3));
}

#[test]
fn constants_with_value() {
  let constants = Constants::new(vec![1.0, 2.0]);

  assert_eq!(
    constants.with_value(1, 5.0),
    Some(Constants::new(vec![1.0, 5.0]))
  );
  assert_eq!(constants.with_value(2, 5.0), None);
  assert_eq!(&constants[..], &[1.0, 2.0]);
}

#[test]
fn rate_fn_writes_derivative() {
  let model = RateFn::new(2, 1, |_, x: &StateVector, c: &Constants| {
    x * c[0]
  });
  let mut dxdt = StateVector::zeros(2);

  model.derivative(
    0.0,
    &StateVector::from_vec(vec![1.0, -2.0]),
    &Constants::new(vec![3.0]),
    &mut dxdt,
  );

  assert_eq!(dxdt, StateVector::from_vec(vec![3.0, -6.0]));
  assert_eq!(model.dimension(), 2);
  assert_eq!(model.n_constants(), 1);
}
