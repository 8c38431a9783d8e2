//! Models described in JSON.
//!
//! Value arguments named by an equation are populations (the state), every
//! other value argument is a constant. Composite arguments combine other
//! arguments and literals left to right with one operation; a `-`
//! contribution negates its component before combining.

use crate::models::ModelDefinition;
use crate::ode::{Constants, Model, StateVector, S};
use crate::trajectory::TimeSpan;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Metadata {
  pub name: String,
  #[serde(default)]
  pub start_time: S,
  pub delta_time: S,
  pub end_time: S,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  #[serde(rename = "+")]
  Add,
  #[serde(rename = "-")]
  Subtract,
  #[serde(rename = "*")]
  Multiply,
  #[serde(rename = "/")]
  Divide,
}

impl Operation {
  fn apply(self, l: S, r: S) -> S {
    match self {
      Self::Add => l + r,
      Self::Subtract => l - r,
      Self::Multiply => l * r,
      Self::Divide => l / r,
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contribution {
  #[serde(rename = "+")]
  Positive,
  #[serde(rename = "-")]
  Negative,
}

impl Contribution {
  fn apply(self, value: S) -> S {
    match self {
      Self::Positive => value,
      Self::Negative => -value,
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Argument {
  Value {
    name: String,
    value: S,
  },
  Composite {
    name: String,
    operation: Operation,
    composition: Vec<Component>,
  },
}

impl Argument {
  pub fn name(&self) -> &str {
    match self {
      Argument::Value { name, .. } | Argument::Composite { name, .. } => name,
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Component {
  Argument {
    name: String,
    contribution: Contribution,
  },
  Constant {
    value: S,
    contribution: Contribution,
  },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Equation {
  pub population: String,
  pub derivative: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelFile {
  pub metadata: Metadata,
  pub arguments: Vec<Argument>,
  pub equations: Vec<Equation>,
}

/// Where a term takes its value from. `Node` indexes an earlier compiled
/// composite.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Operand {
  State(usize),
  Constant(usize),
  Literal(S),
  Node(usize),
}

impl Operand {
  fn value(self, x: &StateVector, constants: &Constants, nodes: &[S]) -> S {
    match self {
      Operand::State(idx) => x[idx],
      Operand::Constant(idx) => constants[idx],
      Operand::Literal(value) => value,
      Operand::Node(idx) => nodes[idx],
    }
  }
}

/// One composite argument, folded left to right.
#[derive(Clone, Debug, PartialEq)]
struct Node {
  operation: Operation,
  terms: Vec<(Contribution, Operand)>,
}

impl Node {
  fn eval(&self, x: &StateVector, constants: &Constants, nodes: &[S]) -> S {
    let mut values = self.terms.iter().map(|(contribution, operand)| {
      contribution.apply(operand.value(x, constants, nodes))
    });
    let first = values.next().unwrap_or(0.0);
    values.fold(first, |acc, value| self.operation.apply(acc, value))
  }
}

/// A model compiled from a [`ModelFile`].
///
/// Every composite reachable from an equation is compiled once into
/// `nodes`, ordered so each node only reads nodes before it.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionModel {
  name: String,
  nodes: Vec<Node>,
  derivatives: Vec<Operand>,
  n_constants: usize,
}

impl ExpressionModel {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Number of distinct composite arguments evaluated per derivative call.
  pub fn n_nodes(&self) -> usize {
    self.nodes.len()
  }
}

impl Model for ExpressionModel {
  fn dimension(&self) -> usize {
    self.derivatives.len()
  }

  fn n_constants(&self) -> usize {
    self.n_constants
  }

  fn derivative(
    &self,
    _: S,
    x: &StateVector,
    constants: &Constants,
    dxdt: &mut StateVector,
  ) {
    let mut values: Vec<S> = Vec::with_capacity(self.nodes.len());
    for node in &self.nodes {
      let value = node.eval(x, constants, &values);
      values.push(value);
    }

    for (dxdt, operand) in dxdt.iter_mut().zip(&self.derivatives) {
      *dxdt = operand.value(x, constants, &values);
    }
  }
}

fn invalid(message: String) -> Error {
  Error::ModelDefinition(message)
}

struct Compiler<'a> {
  arguments: HashMap<&'a str, &'a Argument>,
  populations: HashMap<&'a str, usize>,
  constants: HashMap<&'a str, usize>,
  nodes: Vec<Node>,
  compiled: HashMap<&'a str, usize>,
}

impl<'a> Compiler<'a> {
  fn resolve(
    &mut self,
    name: &'a str,
    stack: &mut Vec<&'a str>,
  ) -> Result<Operand> {
    if let Some(idx) = self.compiled.get(name) {
      return Ok(Operand::Node(*idx));
    }

    if stack.contains(&name) {
      return Err(invalid(format!(
        "cycle through {} -> {}",
        stack.join(" -> "),
        name
      )));
    }

    let argument: &'a Argument = match self.arguments.get(name) {
      Some(argument) => *argument,
      None => return Err(invalid(format!("unknown argument {:?}", name))),
    };

    match argument {
      Argument::Value { .. } => {
        match (self.populations.get(name), self.constants.get(name)) {
          (Some(idx), _) => Ok(Operand::State(*idx)),
          (None, Some(idx)) => Ok(Operand::Constant(*idx)),
          (None, None) => Err(invalid(format!("unresolved value {:?}", name))),
        }
      }
      Argument::Composite {
        operation,
        composition,
        ..
      } => {
        if composition.is_empty() {
          return Err(invalid(format!("{:?} has no components", name)));
        }

        stack.push(name);
        let mut terms = Vec::with_capacity(composition.len());
        for component in composition {
          terms.push(match component {
            Component::Argument { name, contribution } => {
              (*contribution, self.resolve(name, stack)?)
            }
            Component::Constant {
              value,
              contribution,
            } => (*contribution, Operand::Literal(*value)),
          });
        }
        stack.pop();

        let idx = self.nodes.len();
        self.nodes.push(Node {
          operation: *operation,
          terms,
        });
        self.compiled.insert(name, idx);

        Ok(Operand::Node(idx))
      }
    }
  }
}

impl ModelFile {
  pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
    Ok(serde_json::from_reader(reader)?)
  }

  pub fn load(path: &Path) -> Result<Self> {
    debug!(path = %path.display(), "loading model definition");

    Self::from_reader(BufReader::new(File::open(path)?))
  }

  pub fn span(&self) -> TimeSpan {
    TimeSpan::new(
      self.metadata.start_time,
      self.metadata.end_time,
      self.metadata.delta_time,
    )
  }

  /// Resolves every name and builds the rate function.
  pub fn compile(&self) -> Result<ModelDefinition<ExpressionModel>> {
    let mut arguments = HashMap::new();
    for argument in &self.arguments {
      if arguments.insert(argument.name(), argument).is_some() {
        return Err(invalid(format!(
          "duplicate argument {:?}",
          argument.name()
        )));
      }
    }

    let mut populations = HashMap::new();
    let mut initial_state = Vec::with_capacity(self.equations.len());
    for equation in &self.equations {
      let population = equation.population.as_str();
      match arguments.get(population) {
        Some(Argument::Value { value, .. }) => {
          let idx = populations.len();
          if populations.insert(population, idx).is_some() {
            return Err(invalid(format!(
              "more than one equation for {:?}",
              population
            )));
          }
          initial_state.push(*value);
        }
        Some(Argument::Composite { .. }) => {
          return Err(invalid(format!(
            "population {:?} must be a value argument",
            population
          )));
        }
        None => {
          return Err(invalid(format!("unknown population {:?}", population)));
        }
      }
    }

    let mut constant_idxs = HashMap::new();
    let mut constants = Vec::new();
    for argument in &self.arguments {
      if let Argument::Value { name, value } = argument {
        if !populations.contains_key(name.as_str()) {
          constant_idxs.insert(name.as_str(), constants.len());
          constants.push(*value);
        }
      }
    }

    let mut compiler = Compiler {
      arguments,
      populations,
      constants: constant_idxs,
      nodes: Vec::new(),
      compiled: HashMap::new(),
    };
    let derivatives = self
      .equations
      .iter()
      .map(|equation| compiler.resolve(&equation.derivative, &mut Vec::new()))
      .collect::<Result<Vec<_>>>()?;

    debug!(
      name = %self.metadata.name,
      nodes = compiler.nodes.len(),
      "compiled model definition"
    );

    ModelDefinition::new(
      ExpressionModel {
        name: self.metadata.name.clone(),
        nodes: compiler.nodes,
        derivatives,
        n_constants: constants.len(),
      },
      StateVector::from_vec(initial_state),
      Constants::new(constants),
      self
        .equations
        .iter()
        .map(|equation| equation.population.clone())
        .collect(),
    )
  }
}

#[cfg(test)]
use crate::{
  models::BuiltinModel, ode::IntegratorType, trajectory::IntegrationParams,
};

#[cfg(test)]
const LOTKA_VOLTERRA: &str =
  include_str!("../../definitions/lotka_volterra.json");

#[cfg(test)]
const ABC: &str = include_str!("../../definitions/abc.json");

#[cfg(test)]
fn parse(json: &str) -> Result<ModelDefinition<ExpressionModel>> {
  ModelFile::from_reader(json.as_bytes())?.compile()
}

#[test]
fn lotka_volterra_matches_builtin() {
  let file = ModelFile::from_reader(LOTKA_VOLTERRA.as_bytes()).unwrap();
  let from_file = file.compile().unwrap();
  let builtin = BuiltinModel::LotkaVolterra.definition().unwrap();

  assert_eq!(from_file.model().name(), "Lotka-Volterra");
  assert_eq!(from_file.variable_names(), builtin.variable_names());
  assert_eq!(from_file.initial_state(), builtin.initial_state());
  assert_eq!(from_file.constants(), builtin.constants());
  assert_eq!(file.span(), BuiltinModel::LotkaVolterra.default_span());

  let params = IntegrationParams {
    integrator_type: IntegratorType::RK4,
    span: TimeSpan::new(0.0, 5.0, 0.01),
  };
  assert_eq!(
    from_file.simulate(&params).unwrap(),
    builtin.simulate(&params).unwrap()
  );
}

#[test]
fn abc_rates() {
  let file = ModelFile::from_reader(ABC.as_bytes()).unwrap();
  let definition = file.compile().unwrap();

  assert_eq!(file.span(), TimeSpan::new(0.0, 10.0, 0.1));
  assert_eq!(&definition.constants()[..], &[0.5]);

  let mut dxdt = StateVector::zeros(2);
  definition.model().derivative(
    0.0,
    definition.initial_state(),
    definition.constants(),
    &mut dxdt,
  );
  assert_eq!(dxdt, StateVector::from_vec(vec![30.0, 15.0]));
}

#[test]
fn literals_and_negative_contributions() {
  let definition = parse(
    r#"{
      "metadata": { "name": "n", "delta_time": 0.1, "end_time": 1.0 },
      "arguments": [
        { "name": "x", "value": 3.0 },
        { "name": "dx", "operation": "/", "composition": [
          { "name": "x", "contribution": "-" },
          { "value": 2.0, "contribution": "+" }
        ] }
      ],
      "equations": [ { "population": "x", "derivative": "dx" } ]
    }"#,
  )
  .unwrap();

  let mut dxdt = StateVector::zeros(1);
  definition.model().derivative(
    0.0,
    definition.initial_state(),
    definition.constants(),
    &mut dxdt,
  );
  assert_eq!(dxdt[0], -1.5);
  assert_eq!(definition.model().n_constants(), 0);
}

#[test]
fn rejects_broken_definitions() {
  let with = |arguments: &str, equations: &str| {
    parse(&format!(
      r#"{{
        "metadata": {{ "name": "n", "delta_time": 0.1, "end_time": 1.0 }},
        "arguments": [{}],
        "equations": [{}]
      }}"#,
      arguments, equations
    ))
  };
  let x = r#"{ "name": "x", "value": 1.0 }"#;
  let eq = r#"{ "population": "x", "derivative": "dx" }"#;

  assert!(matches!(
    with(x, eq),
    Err(Error::ModelDefinition(message)) if message.contains("unknown")
  ));
  assert!(matches!(
    with(&format!("{}, {}", x, x), eq),
    Err(Error::ModelDefinition(message)) if message.contains("duplicate")
  ));
  assert!(matches!(
    with(
      &format!(
        r#"{}, {{ "name": "dx", "operation": "+", "composition": [
          {{ "name": "dy", "contribution": "+" }} ] }},
        {{ "name": "dy", "operation": "+", "composition": [
          {{ "name": "dx", "contribution": "+" }} ] }}"#,
        x
      ),
      eq
    ),
    Err(Error::ModelDefinition(message)) if message.contains("cycle")
  ));
  assert!(matches!(
    with(
      &format!(
        r#"{}, {{ "name": "dx", "operation": "*", "composition": [] }}"#,
        x
      ),
      eq
    ),
    Err(Error::ModelDefinition(message)) if message.contains("no components")
  ));
  assert!(matches!(
    with(
      &format!(
        r#"{}, {{ "name": "dx", "operation": "+", "composition": [
          {{ "name": "x", "contribution": "+" }} ] }}"#,
        x
      ),
      r#"{ "population": "dx", "derivative": "x" }"#
    ),
    Err(Error::ModelDefinition(message)) if message.contains("value argument")
  ));
  assert!(matches!(
    with(
      &format!(
        r#"{}, {{ "name": "dx", "operation": "^", "composition": [
          {{ "name": "x", "contribution": "+" }} ] }}"#,
        x
      ),
      eq
    ),
    Err(Error::Json(_))
  ));
}

#[test]
fn shared_composites_compile_once() {
  let depth = 40;
  let mut arguments = vec![
    r#"{ "name": "x", "value": 1.0 }"#.to_owned(),
    r#"{ "name": "d0", "operation": "+", "composition": [
      { "name": "x", "contribution": "+" },
      { "name": "x", "contribution": "+" } ] }"#
      .to_owned(),
  ];
  for idx in 1..=depth {
    arguments.push(format!(
      r#"{{ "name": "d{idx}", "operation": "+", "composition": [
        {{ "name": "d{prev}", "contribution": "+" }},
        {{ "name": "d{prev}", "contribution": "+" }} ] }}"#,
      idx = idx,
      prev = idx - 1
    ));
  }
  let definition = parse(&format!(
    r#"{{
      "metadata": {{ "name": "chain", "delta_time": 0.1, "end_time": 1.0 }},
      "arguments": [{}],
      "equations": [ {{ "population": "x", "derivative": "d{}" }} ]
    }}"#,
    arguments.join(", "),
    depth
  ))
  .unwrap();

  assert_eq!(definition.model().n_nodes(), depth + 1);

  let mut dxdt = StateVector::zeros(1);
  definition.model().derivative(
    0.0,
    definition.initial_state(),
    definition.constants(),
    &mut dxdt,
  );
  assert_eq!(dxdt[0], (2.0 as S).powi(depth as i32 + 1));
}

#[test]
fn derivative_may_name_a_value_directly() {
  let definition = parse(
    r#"{
      "metadata": { "name": "n", "delta_time": 0.1, "end_time": 1.0 },
      "arguments": [
        { "name": "x", "value": 2.0 },
        { "name": "k", "value": 0.25 }
      ],
      "equations": [ { "population": "x", "derivative": "k" } ]
    }"#,
  )
  .unwrap();

  let mut dxdt = StateVector::zeros(1);
  definition.model().derivative(
    0.0,
    definition.initial_state(),
    definition.constants(),
    &mut dxdt,
  );
  assert_eq!(dxdt[0], 0.25);
  assert_eq!(definition.model().n_nodes(), 0);
}
