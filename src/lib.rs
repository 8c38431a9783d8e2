pub mod chart;
pub mod error;
pub mod models;
pub mod ode;
pub mod run;
pub mod sink;
pub mod sweep;
pub mod table;
pub mod trajectory;
pub mod utils;

pub use chart::{render_chart, ChartOptions};
pub use error::{Error, Result};
pub use models::{AnyModel, BuiltinModel, ModelDefinition, ModelFile};
pub use run::{run_model, RunOutput};
pub use sink::{InputSource, OutputTarget};
pub use sweep::{
  constant_cases, run_sweep, sweep_to_dir, write_sweep, SweepCase, SweepRun,
  SweepSummary,
};
pub use table::{read_trajectory, write_trajectory, ParsedTable};
pub use trajectory::{simulate, IntegrationParams, TimeSpan, Trajectory};
