//! Comma separated trajectory tables.
//!
//! ```text
//! time,x,y
//! 0.0000,10.0000,5.0000
//! 0.0100,10.0103,4.9981
//! ```
//!
//! The header is optional. Every number is printed with [`PRECISION`]
//! decimals; non finite values are printed as `NaN`, `inf` and `-inf`, which
//! [`read_trajectory`] accepts back.

use crate::ode::{StateVector, S};
use crate::trajectory::Trajectory;
use crate::{Error, Result};
use std::io::{BufRead, Write};

pub const PRECISION: usize = 4;

pub const TIME_COLUMN: &str = "time";

const DELIMITER: char = ',';

pub fn check_variable_names(names: &[String], dimension: usize) -> Result<()> {
  if names.len() != dimension {
    return Err(Error::VariableNamesMismatch {
      expected: dimension,
      actual: names.len(),
    });
  }

  match names
    .iter()
    .find(|name| name.is_empty() || name.contains([DELIMITER, '\n', '\r']))
  {
    Some(name) => Err(Error::InvalidVariableName(name.clone())),
    None => Ok(()),
  }
}

pub fn write_trajectory<W: Write + ?Sized>(
  writer: &mut W,
  trajectory: &Trajectory,
  names: Option<&[String]>,
) -> Result<()> {
  if let Some(names) = names {
    let dimension = if trajectory.is_empty() {
      names.len()
    } else {
      trajectory.dimension()
    };
    check_variable_names(names, dimension)?;

    write!(writer, "{}", TIME_COLUMN)?;
    for name in names {
      write!(writer, "{}{}", DELIMITER, name)?;
    }
    writeln!(writer)?;
  }

  for (time, state) in trajectory.iter() {
    write!(writer, "{:.*}", PRECISION, time)?;
    for value in state.iter() {
      write!(writer, "{}{:.*}", DELIMITER, PRECISION, value)?;
    }
    writeln!(writer)?;
  }

  Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedTable {
  /// Column labels after the time column, if the table had a header.
  pub names: Option<Vec<String>>,
  pub trajectory: Trajectory,
}

fn parse_field(field: &str, line: usize) -> Result<S> {
  field.trim().parse().map_err(|_| Error::Parse {
    line,
    message: format!("invalid number {:?}", field),
  })
}

/// Parses a table written by [`write_trajectory`].
pub fn read_trajectory<R: BufRead>(reader: R) -> Result<ParsedTable> {
  let mut names = None;
  let mut width = None;
  let mut times = Vec::new();
  let mut states = Vec::new();

  for (idx, line) in reader.lines().enumerate() {
    let line = line?;
    let line_no = idx + 1;

    if line.trim().is_empty() {
      return Err(Error::Parse {
        line: line_no,
        message: "blank line".into(),
      });
    }

    let fields: Vec<&str> = line.split(DELIMITER).collect();

    if idx == 0 && fields[0].trim().parse::<S>().is_err() {
      names = Some(fields[1..].iter().map(|s| s.trim().to_owned()).collect());
      width = Some(fields.len());
      continue;
    }

    let expected = *width.get_or_insert(fields.len());
    if fields.len() != expected {
      return Err(Error::Parse {
        line: line_no,
        message: format!("expected {} fields, got {}", expected, fields.len()),
      });
    }

    times.push(parse_field(fields[0], line_no)?);
    states.push(StateVector::from_vec(
      fields[1..]
        .iter()
        .map(|field| parse_field(field, line_no))
        .collect::<Result<Vec<_>>>()?,
    ));
  }

  Ok(ParsedTable {
    names,
    trajectory: Trajectory::from_parts(times, states),
  })
}

#[cfg(test)]
use crate::{
  assert_float_eq,
  ode::{Constants, Integrator, IntegratorType, RateFn, SwappableIntegrator},
  trajectory::{simulate, TimeSpan},
};
#[cfg(test)]
use proptest::prelude::*;
#[cfg(test)]
use std::io::Cursor;

#[cfg(test)]
fn oscillator_trajectory() -> Trajectory {
  let model = RateFn::new(2, 0, |_, x: &StateVector, _: &Constants| {
    StateVector::from_vec(vec![x[1], -x[0]])
  });

  simulate(
    &mut SwappableIntegrator::new(IntegratorType::RK4),
    &model,
    &StateVector::from_vec(vec![1.0, 0.0]),
    &Constants::empty(),
    &TimeSpan::new(0.0, 1.0, 0.25),
  )
  .unwrap()
}

#[cfg(test)]
fn to_string(trajectory: &Trajectory, names: Option<&[String]>) -> String {
  let mut out = Vec::new();
  write_trajectory(&mut out, trajectory, names).unwrap();
  String::from_utf8(out).unwrap()
}

#[test]
fn writes_header_and_rows() {
  let trajectory = oscillator_trajectory();
  let names = vec!["x".to_owned(), "v".to_owned()];

  let text = to_string(&trajectory, Some(&names));
  let lines: Vec<&str> = text.lines().collect();

  assert_eq!(lines.len(), 6);
  assert_eq!(lines[0], "time,x,v");
  assert_eq!(lines[1], "0.0000,1.0000,0.0000");
  assert_eq!(lines[5].split(',').count(), 3);
  assert!(text.ends_with('\n'));
  assert!(!text.contains(",\n"));
  assert!(!text.contains("\n\n"));
}

#[test]
fn header_must_match_state() {
  let trajectory = oscillator_trajectory();
  let mut out = Vec::new();

  assert!(matches!(
    write_trajectory(&mut out, &trajectory, Some(&["x".to_owned()])),
    Err(Error::VariableNamesMismatch {
      expected: 2,
      actual: 1
    })
  ));
  assert!(matches!(
    write_trajectory(
      &mut out,
      &trajectory,
      Some(&["x".to_owned(), "a,b".to_owned()])
    ),
    Err(Error::InvalidVariableName(_))
  ));
}

#[test]
fn round_trip_with_header() {
  let trajectory = oscillator_trajectory();
  let names = vec!["x".to_owned(), "v".to_owned()];

  let parsed =
    read_trajectory(Cursor::new(to_string(&trajectory, Some(&names))))
      .unwrap();

  assert_eq!(parsed.names, Some(names));
  assert_eq!(parsed.trajectory.len(), trajectory.len());
  for ((t, state), (parsed_t, parsed_state)) in
    trajectory.iter().zip(parsed.trajectory.iter())
  {
    assert_float_eq!(t, parsed_t, 5e-5);
    for (value, parsed_value) in state.iter().zip(parsed_state.iter()) {
      assert_float_eq!(*value, *parsed_value, 5e-5);
    }
  }
}

#[test]
fn non_finite_values_survive() {
  let trajectory = Trajectory::from_parts(
    vec![0.0, 1.0],
    vec![
      StateVector::from_vec(vec![S::NAN, 1.0]),
      StateVector::from_vec(vec![S::INFINITY, S::NEG_INFINITY]),
    ],
  );

  let text = to_string(&trajectory, None);
  assert_eq!(text, "0.0000,NaN,1.0000\n1.0000,inf,-inf\n");

  let parsed = read_trajectory(Cursor::new(text)).unwrap();
  assert_eq!(parsed.names, None);
  let states = parsed.trajectory.states();
  assert!(states[0][0].is_nan());
  assert_eq!(states[1][0], S::INFINITY);
  assert_eq!(states[1][1], S::NEG_INFINITY);
}

#[test]
fn rejects_malformed_tables() {
  let parse = |text: &str| read_trajectory(Cursor::new(text.to_owned()));

  assert!(matches!(
    parse("time,x\n0.0,1.0\n0.1\n"),
    Err(Error::Parse { line: 3, .. })
  ));
  assert!(matches!(
    parse("0.0,1.0\n\n0.2,1.0\n"),
    Err(Error::Parse { line: 2, .. })
  ));
  assert!(matches!(
    parse("0.0,1.0\n0.1,abc\n"),
    Err(Error::Parse { line: 2, .. })
  ));
}

#[cfg(test)]
proptest! {
#[test]
fn round_trip_within_precision(
  rows in prop::collection::vec(
    (-1e6f64..1e6, prop::collection::vec(-1e6f64..1e6, 3)),
    0..20,
  ),
  header: bool,
) {
  let (times, states): (Vec<S>, Vec<StateVector>) = rows
    .into_iter()
    .map(|(t, state)| (t, StateVector::from_vec(state)))
    .unzip();
  let trajectory = Trajectory::from_parts(times, states);
  let names: Vec<String> = vec!["a".into(), "b".into(), "c".into()];

  let text = to_string(&trajectory, header.then(|| &names[..]));
  let parsed = read_trajectory(Cursor::new(text)).unwrap();

  prop_assert_eq!(parsed.names.is_some(), header);
  prop_assert_eq!(parsed.trajectory.len(), trajectory.len());
  for ((t, state), (parsed_t, parsed_state)) in
    trajectory.iter().zip(parsed.trajectory.iter())
  {
    prop_assert!((t - parsed_t).abs() <= 5e-5 + 1e-9 * t.abs());
    for (value, parsed_value) in state.iter().zip(parsed_state.iter()) {
      prop_assert!(
        (value - parsed_value).abs() <= 5e-5 + 1e-9 * value.abs()
      );
    }
  }
}
}
