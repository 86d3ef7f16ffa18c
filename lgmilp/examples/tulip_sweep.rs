use env_logger::Builder;
use lgmilp::sweep::{run_sweep, SweepConfig};
use lgmilp::tulips::{Generation, TulipModel};
use lgmilp::MicroLp;
use log::LevelFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::new().filter_level(LevelFilter::Info).init();

    for model in TulipModel::all() {
        let spec = model.spec(Generation::Named);
        let cfg = SweepConfig {
            sample_sizes: vec![10, 100, 1000],
            trials: 10,
            big_m: model.big_m(),
            ..SweepConfig::default()
        };
        let report = run_sweep(&spec, &MicroLp, &cfg)?;
        let path = format!("{}_sweep.json", spec.name);
        std::fs::write(&path, report.to_pretty_json()?)?;
        eprintln!("wrote {}", path);
    }
    Ok(())
}
