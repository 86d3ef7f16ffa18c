use lgmilp::sweep::Stats;
use lgmilp::tulips::{self, Generation, TulipModel, TULIP_TYPE, WATER};
use lgmilp::{
    compile, estimate_reward, AffineDecl, BigM, BudgetDecl, CompileError, CompileOptions,
    Error, LatentDecl, MicroLp, ModelSpec, Operand, PosteriorOptions, SolveError, SolvedProgram,
    StatDecl,
};
use ntest::timeout;

fn solve(spec: &ModelSpec, opts: &CompileOptions) -> SolvedProgram {
    compile(spec, opts).unwrap().solve(&MicroLp).unwrap()
}

fn opts(model: TulipModel, n: usize, seed: u64) -> CompileOptions {
    CompileOptions {
        sample_size: n,
        seed,
        big_m: model.big_m(),
    }
}

#[test]
fn same_seed_gives_same_program_and_optimum() {
    let spec = tulips::stem_flower_roots_v2();
    let o = opts(TulipModel::StemFlowerRoots, 50, 7);
    assert_eq!(
        compile(&spec, &o).unwrap().to_lp_string(),
        compile(&spec, &o).unwrap().to_lp_string()
    );
    let a = solve(&spec, &o);
    let b = solve(&spec, &o);
    assert_eq!(a.decisions(), b.decisions());
    assert_eq!(a.objective(), b.objective());
    for l in ["leaf", "stem", "flower", "roots"] {
        assert_eq!(
            a.program().sample_mean(l).unwrap(),
            b.program().sample_mean(l).unwrap()
        );
    }
}

#[test]
fn solved_statistics_follow_the_selected_profile() {
    for model in TulipModel::all() {
        for gen in [Generation::Literal, Generation::Named] {
            let solved = solve(&model.spec(gen), &opts(model, 40, 5));
            let report = solved.verify();
            assert!(
                report.is_consistent(1e-4),
                "{:?}/{:?}: {:?}",
                model,
                gen,
                report
            );
        }
    }
}

#[test]
fn budget_is_respected() {
    for model in TulipModel::all() {
        let solved = solve(&model.spec(Generation::Literal), &opts(model, 30, 1));
        assert!(solved.budget_spent().unwrap() <= 12.0 + 1e-6);
    }
}

#[test]
fn concrete_stem_scenario() {
    let solved = solve(&tulips::stem_v1(), &opts(TulipModel::Stem, 100, 42));
    let water = solved.decision(WATER).unwrap();
    let (mean, stdev) = solved.latent_stats("stem").unwrap();
    assert!((250.0..=1000.0).contains(&water));
    if solved.decision(TULIP_TYPE).unwrap() > 0.5 {
        // 1.5 + 0.015 * water <= 12
        assert!((water - 700.0).abs() < 1e-4);
        assert!((mean - (15.0 + 0.0011 * water)).abs() < 1e-6);
        assert!((stdev - (5.0 - 0.001 * water)).abs() < 1e-6);
    } else {
        assert!((water - 11.0 / 0.015).abs() < 1e-4);
        assert!((mean - (15.0 + 0.001 * water)).abs() < 1e-6);
        assert!((stdev - (10.0 - 0.005 * water)).abs() < 1e-6);
    }
    let draws = solved.program().sample_draws("stem").unwrap();
    assert_eq!(draws.len(), 100);
    let d = solved.program().sample_mean("stem").unwrap();
    assert!((d - draws.iter().sum::<f64>() / 100.0).abs() < 1e-12);
    assert!((solved.objective() - (mean + d * stdev)).abs() < 1e-6);
}

#[test]
fn ancestor_realization_is_bound_to_its_sample_average() {
    let solved = solve(
        &tulips::stem_flower_v1(),
        &opts(TulipModel::StemFlower, 60, 2),
    );
    let (mean, stdev) = solved.latent_stats("leaf").unwrap();
    let d = solved.program().sample_mean("leaf").unwrap();
    let realized = solved.value("leaf_value").unwrap();
    assert!((realized - (mean + d * stdev)).abs() < 1e-6);
    let (stem_mean, stem_stdev) = solved.latent_stats("stem").unwrap();
    assert!((stem_mean - 0.1 * realized).abs() < 1e-6);
    assert!((stem_stdev - 0.05 * realized).abs() < 1e-6);
}

#[test]
fn objective_spread_shrinks_with_sample_size() {
    let spec = tulips::stem_v1();
    let spread = |n: usize| {
        let objectives: Vec<f64> = (0..12)
            .map(|seed| solve(&spec, &opts(TulipModel::Stem, n, seed)).objective())
            .collect();
        Stats::from_samples(&objectives).std_dev
    };
    assert!(spread(2000) < spread(10));
}

#[test]
fn non_negative_draws_follow_the_truncated_normal() {
    let spec = ModelSpec::new("half_normal").with_latent(
        LatentDecl::new(
            "x",
            StatDecl::Fixed(AffineDecl::constant(0.0)),
            StatDecl::Fixed(AffineDecl::constant(1.0)),
        )
        .non_negative(),
    );
    let solved = solve(&spec, &CompileOptions::default());
    let est = estimate_reward(&solved, 20_000, &PosteriorOptions::default()).unwrap();
    assert_eq!(est.clamped_draws, 0);
    // E[X | X >= 0] = sqrt(2 / pi)
    assert!((est.mean - (2.0 / std::f64::consts::PI).sqrt()).abs() < 0.03);
    assert!(est.latent_mins[0].1 >= 0.0);
}

#[test]
fn invalid_headroom_is_rejected_before_solving() {
    let o = CompileOptions {
        big_m: BigM::Derived { headroom: 0.0 },
        ..opts(TulipModel::StemFlower, 40, 5)
    };
    assert!(matches!(
        compile(&tulips::stem_flower_v1(), &o).unwrap_err(),
        Error::Compile(CompileError::InvalidBigM(_))
    ));
    let o = CompileOptions {
        big_m: BigM::Fixed(f64::NAN),
        ..opts(TulipModel::Stem, 40, 5)
    };
    assert!(matches!(
        compile(&tulips::stem_v1(), &o).unwrap_err(),
        Error::Compile(CompileError::InvalidBigM(_))
    ));
}

#[test]
#[timeout(2000)]
fn cyclic_latents_are_rejected() {
    let spec = ModelSpec::new("cycle")
        .with_latent(LatentDecl::new(
            "a",
            StatDecl::Fixed(AffineDecl::constant(0.0).plus(Operand::latent("b"), 0.5)),
            StatDecl::Fixed(AffineDecl::constant(1.0)),
        ))
        .with_latent(LatentDecl::new(
            "b",
            StatDecl::Fixed(AffineDecl::constant(0.0).plus(Operand::latent("a"), 0.5)),
            StatDecl::Fixed(AffineDecl::constant(1.0)),
        ));
    match compile(&spec, &CompileOptions::default()).unwrap_err() {
        Error::Compile(CompileError::CyclicDependency(names)) => {
            assert!(names.contains(&"a".to_string()));
            assert!(names.contains(&"b".to_string()));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn undersized_big_m_is_rejected() {
    let o = CompileOptions {
        big_m: BigM::Fixed(10.0),
        ..opts(TulipModel::StemFlower, 10, 0)
    };
    assert!(matches!(
        compile(&tulips::stem_flower_v1(), &o).unwrap_err(),
        Error::Compile(CompileError::BigMTooSmall { .. })
    ));
}

#[test]
fn unaffordable_budget_is_infeasible() {
    let mut spec = tulips::stem_v1();
    spec.budget = Some(
        BudgetDecl::new(1.0)
            .cost(Operand::decision(TULIP_TYPE), 1.5)
            .cost(Operand::complement(TULIP_TYPE), 1.0)
            .cost(Operand::decision(WATER), 0.015),
    );
    let err = compile(&spec, &opts(TulipModel::Stem, 10, 0))
        .unwrap()
        .solve(&MicroLp)
        .unwrap_err();
    assert_eq!(err, Error::Solve(SolveError::Infeasible));
}
