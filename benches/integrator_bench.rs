use criterion::{black_box, criterion_group, criterion_main, Criterion};
use odesim::ode::{Integrator, IntegratorType, SwappableIntegrator};
use odesim::BuiltinModel;

const INTEGRATOR_TYPES: [IntegratorType; 3] = [
  IntegratorType::Euler,
  IntegratorType::Midpoint,
  IntegratorType::RK4,
];

fn integrator_step(c: &mut Criterion) {
  let definition = BuiltinModel::LotkaVolterra
    .definition()
    .expect("built in models are well formed");

  for integrator_type in INTEGRATOR_TYPES.iter() {
    let mut integrator = SwappableIntegrator::new(*integrator_type);
    let mut state = definition.initial_state().clone();
    let mut time = 0.0;
    let time_step = 0.01;

    c.bench_function(
      &format!("integrator {} lotka-volterra step", integrator_type),
      |b| {
        b.iter(|| {
          integrator.step(
            definition.model(),
            &mut state,
            definition.constants(),
            &mut time,
            black_box(time_step),
          )
        })
      },
    );
  }
}

fn full_run(c: &mut Criterion) {
  let model = BuiltinModel::LotkaVolterra;
  let definition = model.definition().expect("built in models are well formed");

  for integrator_type in INTEGRATOR_TYPES.iter() {
    let params = odesim::IntegrationParams {
      integrator_type: *integrator_type,
      span: model.default_span(),
    };

    c.bench_function(
      &format!("integrator {} lotka-volterra full run", integrator_type),
      |b| b.iter(|| definition.simulate(black_box(&params))),
    );
  }
}

criterion_group!(benches, integrator_step, full_run);
criterion_main!(benches);
