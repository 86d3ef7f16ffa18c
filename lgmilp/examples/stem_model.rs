use env_logger::Builder;
use lgmilp::tulips::{Generation, TulipModel, TULIP_TYPE, WATER};
use lgmilp::{compile, estimate_reward, CompileOptions, MicroLp, PosteriorOptions};
use log::LevelFilter;

fn main() -> Result<(), lgmilp::Error> {
    Builder::new().filter_level(LevelFilter::Debug).init();

    let model = TulipModel::Stem;
    let spec = model.spec(Generation::Literal);
    spec.debug_print();

    let opts = CompileOptions {
        sample_size: 100,
        seed: 42,
        big_m: model.big_m(),
    };
    let program = compile(&spec, &opts)?;

    // Readable by SCIP: `scip -c "read stem.lp optimize display solution quit"`
    println!("{}", program.to_lp_string());

    let solved = program.solve(&MicroLp)?;
    let (mean, stdev) = solved.latent_stats("stem")?;
    println!(
        "type = {}, water = {:.1} mL",
        solved.decision(TULIP_TYPE)?,
        solved.decision(WATER)?
    );
    println!("stem ~ N({:.4}, {:.4}), objective {:.4}", mean, stdev, solved.objective());

    let report = solved.verify();
    println!(
        "max discrepancy {:.2e}, budget {:?}",
        report.max_discrepancy(),
        report.budget
    );

    let reward = estimate_reward(&solved, 1000, &PosteriorOptions::default())?;
    println!("sampled reward {:.4} ± {:.4}", reward.mean, reward.std_dev);
    Ok(())
}
