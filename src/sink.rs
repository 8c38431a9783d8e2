//! Where tables are written to and read from.
//!
//! A target is either a named file or a standard stream. Callers hand a
//! closure to [`OutputTarget::write_with`] / [`InputSource::read_with`] and
//! never see which one they got.

use crate::Result;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputTarget {
  Stdout,
  File(PathBuf),
}

impl OutputTarget {
  /// `None` and `-` select stdout.
  pub fn from_path(path: Option<&Path>) -> Self {
    match path {
      Some(path) if path != Path::new("-") => Self::File(path.to_path_buf()),
      _ => Self::Stdout,
    }
  }

  /// Runs `f` against the opened target and flushes it afterwards.
  ///
  /// A file is only created once this is called, and is removed again when
  /// `f` fails, so an aborted write leaves nothing behind.
  pub fn write_with<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut dyn Write) -> Result<T>,
  {
    match self {
      Self::Stdout => {
        let stdout = io::stdout();
        let mut writer = BufWriter::new(stdout.lock());
        let out = f(&mut writer)?;
        writer.flush()?;

        Ok(out)
      }
      Self::File(path) => {
        if let Some(parent) = path.parent() {
          if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
          }
        }

        let mut writer = BufWriter::new(File::create(path)?);
        let out = f(&mut writer).and_then(|out| {
          writer.flush()?;
          Ok(out)
        });

        if out.is_err() {
          drop(writer);
          if let Err(err) = fs::remove_file(path) {
            warn!(
              path = %path.display(),
              %err,
              "failed to remove partial output"
            );
          }
        } else {
          debug!(path = %path.display(), "wrote output");
        }

        out
      }
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
  Stdin,
  File(PathBuf),
}

impl InputSource {
  /// `None` and `-` select stdin.
  pub fn from_path(path: Option<&Path>) -> Self {
    match path {
      Some(path) if path != Path::new("-") => Self::File(path.to_path_buf()),
      _ => Self::Stdin,
    }
  }

  pub fn read_with<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut dyn BufRead) -> Result<T>,
  {
    match self {
      Self::Stdin => {
        let stdin = io::stdin();
        let mut reader = stdin.lock();
        f(&mut reader)
      }
      Self::File(path) => {
        let mut reader = BufReader::new(File::open(path)?);
        f(&mut reader)
      }
    }
  }
}

#[cfg(test)]
use crate::Error;
#[cfg(test)]
use tempfile::tempdir;

#[test]
fn dash_selects_standard_streams() {
  assert_eq!(OutputTarget::from_path(None), OutputTarget::Stdout);
  assert_eq!(
    OutputTarget::from_path(Some(Path::new("-"))),
    OutputTarget::Stdout
  );
  assert_eq!(
    InputSource::from_path(Some(Path::new("out.csv"))),
    InputSource::File(PathBuf::from("out.csv"))
  );
}

#[test]
fn file_round_trip_creates_parents() {
  let dir = tempdir().unwrap();
  let path = dir.path().join("nested").join("out.txt");
  let target = OutputTarget::from_path(Some(&path));

  target
    .write_with(|w| {
      writeln!(w, "hello")?;
      Ok(())
    })
    .unwrap();

  let read = InputSource::from_path(Some(&path))
    .read_with(|r| {
      let mut line = String::new();
      r.read_line(&mut line)?;
      Ok(line)
    })
    .unwrap();

  assert_eq!(read, "hello\n");
}

#[test]
fn failed_write_removes_file() {
  let dir = tempdir().unwrap();
  let path = dir.path().join("out.txt");

  let result: Result<()> = OutputTarget::File(path.clone()).write_with(|w| {
    writeln!(w, "partial")?;
    Err(Error::MissingOutputPath)
  });

  assert!(result.is_err());
  assert!(!path.exists());
}
