use clap::{Args, Parser, Subcommand};
use indicatif::ProgressBar;
use odesim::{
  ode::IntegratorType, read_trajectory, run_model, sweep_to_dir, AnyModel,
  BuiltinModel, InputSource, IntegrationParams, ModelDefinition, ModelFile,
  RunOutput, TimeSpan,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "odesim", version, author = "Ryan G.")]
#[command(about = "Fixed step simulation of coupled ODE models")]
struct Opts {
  #[command(subcommand)]
  command: Command,
}

#[derive(Args, Clone, Debug)]
struct ModelArgs {
  /// Built in model to simulate
  #[arg(long, value_enum, default_value_t = BuiltinModel::LotkaVolterra)]
  model: BuiltinModel,

  /// JSON model definition, used instead of --model
  #[arg(short, long, conflicts_with = "model")]
  definition: Option<PathBuf>,

  /// Start time, defaults to the model's
  #[arg(long, allow_negative_numbers = true)]
  start: Option<f64>,

  /// Stop time, defaults to the model's
  #[arg(long, allow_negative_numbers = true)]
  stop: Option<f64>,

  /// Step size, defaults to the model's
  #[arg(long, allow_negative_numbers = true)]
  step: Option<f64>,

  #[arg(short, long, value_enum, default_value_t = IntegratorType::RK4)]
  method: IntegratorType,
}

#[derive(Subcommand)]
enum Command {
  /// Simulate one model and write a table or chart
  Run {
    #[command(flatten)]
    model: ModelArgs,

    /// Output file, stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Render a PNG chart instead of a table (requires --output)
    #[arg(long)]
    chart: bool,

    /// Leave out the header row
    #[arg(long)]
    no_header: bool,
  },
  /// Run the model once per value of one constant
  Sweep {
    #[command(flatten)]
    model: ModelArgs,

    /// Index of the constant to vary
    #[arg(long)]
    constant: usize,

    /// Values for the constant
    #[arg(
      long,
      value_delimiter = ',',
      required = true,
      allow_negative_numbers = true
    )]
    values: Vec<f64>,

    /// Directory receiving one table per run
    #[arg(long)]
    output_dir: PathBuf,

    /// Leave out the header rows
    #[arg(long)]
    no_header: bool,
  },
  /// Summarise a table, read from a file or stdin
  Inspect { input: Option<PathBuf> },
}

fn load_model(
  args: &ModelArgs,
) -> odesim::Result<(ModelDefinition<AnyModel>, IntegrationParams)> {
  let (definition, default_span) = match &args.definition {
    Some(path) => {
      let file = ModelFile::load(path)?;
      let span = file.span();
      (file.compile()?.map_model(AnyModel::Expression)?, span)
    }
    None => (
      args.model.definition()?.map_model(AnyModel::Builtin)?,
      args.model.default_span(),
    ),
  };

  let span = TimeSpan::new(
    args.start.unwrap_or(default_span.start),
    args.stop.unwrap_or(default_span.stop),
    args.step.unwrap_or(default_span.step),
  );
  span.validate()?;

  Ok((
    definition,
    IntegrationParams {
      integrator_type: args.method,
      span,
    },
  ))
}

fn run(
  model: &ModelArgs,
  output: Option<&Path>,
  chart: bool,
  header: bool,
) -> odesim::Result<()> {
  let output = RunOutput::select(output, chart, header)?;
  let (definition, params) = load_model(model)?;

  run_model(&definition, &params, &output)?;

  Ok(())
}

fn sweep(
  model: &ModelArgs,
  constant: usize,
  values: &[f64],
  output_dir: &Path,
  header: bool,
) -> odesim::Result<()> {
  let (definition, params) = load_model(model)?;

  let progress = ProgressBar::new(values.len() as u64);
  let summary = sweep_to_dir(
    &definition,
    &params,
    constant,
    values,
    output_dir,
    header,
    Some(&progress),
  )?;
  progress.finish();

  summary.check()
}

fn inspect(input: Option<&Path>) -> odesim::Result<()> {
  let table = InputSource::from_path(input)
    .read_with(|reader| read_trajectory(reader))?;
  let trajectory = &table.trajectory;

  println!("points: {}", trajectory.len());
  if let (Some(first), Some(last)) =
    (trajectory.times().first(), trajectory.times().last())
  {
    println!("time: {} .. {}", first, last);
  }

  for idx in 0..trajectory.dimension() {
    let name = table
      .names
      .as_ref()
      .and_then(|names| names.get(idx).cloned())
      .unwrap_or_else(|| format!("column {}", idx + 1));
    let values = trajectory.component(idx);
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let last = values.last().cloned().unwrap_or(f64::NAN);

    println!("{}: min {} max {} final {}", name, min, max, last);
  }

  Ok(())
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .with_writer(std::io::stderr)
    .init();

  let opts: Opts = Opts::parse();

  let result = match &opts.command {
    Command::Run {
      model,
      output,
      chart,
      no_header,
    } => run(model, output.as_deref(), *chart, !no_header),
    Command::Sweep {
      model,
      constant,
      values,
      output_dir,
      no_header,
    } => sweep(model, *constant, values, output_dir, !no_header),
    Command::Inspect { input } => inspect(input.as_deref()),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{}", err);
      ExitCode::FAILURE
    }
  }
}
