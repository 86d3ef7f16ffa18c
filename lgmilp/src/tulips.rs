//! The tulip-care models as schema data.
//!
//! Each model comes in two generations: `Literal` writes every coefficient
//! inline (`StatDecl::ByType`), `Named` looks them up in red/purple tables
//! (`StatDecl::Profiled`). Red is the type = 1 profile, purple type = 0.
//! Decisions: tulip type, weekly water (mL), an outdoor flag and a count of
//! fertilizer pellets. The weekly budget is 12.

use crate::saa_codegen::BigM;
use crate::{
    AffineDecl, BudgetDecl, Coef, DecisionDecl, LatentDecl, ModelSpec, Operand, Sense,
    SideConstraint, StatDecl,
};
use serde::{Deserialize, Serialize};

pub const TULIP_TYPE: &str = "tulip_type";
pub const WATER: &str = "water";
pub const OUTDOOR: &str = "outdoor";
pub const PELLETS: &str = "pellets";

const BUDGET: f64 = 12.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TulipModel {
    /// stem height only
    Stem,
    /// leaf surface area feeding stem height, plus flower petal height
    StemFlower,
    /// adds root length and fertilizer pellets
    StemFlowerRoots,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Generation {
    Literal,
    Named,
}

impl TulipModel {
    pub fn all() -> [TulipModel; 3] {
        [TulipModel::Stem, TulipModel::StemFlower, TulipModel::StemFlowerRoots]
    }

    pub fn spec(self, gen: Generation) -> ModelSpec {
        match (self, gen) {
            (TulipModel::Stem, Generation::Literal) => stem_v1(),
            (TulipModel::Stem, Generation::Named) => stem_v2(),
            (TulipModel::StemFlower, Generation::Literal) => stem_flower_v1(),
            (TulipModel::StemFlower, Generation::Named) => stem_flower_v2(),
            (TulipModel::StemFlowerRoots, Generation::Literal) => stem_flower_roots_v1(),
            (TulipModel::StemFlowerRoots, Generation::Named) => stem_flower_roots_v2(),
        }
    }

    /// The M each model was tuned with.
    pub fn big_m(self) -> BigM {
        match self {
            TulipModel::Stem => BigM::Fixed(1_000.0),
            TulipModel::StemFlower | TulipModel::StemFlowerRoots => BigM::Fixed(10_000.0),
        }
    }
}

fn dec(name: &str) -> Operand {
    Operand::decision(name)
}

fn lit(base: f64, terms: &[(Operand, f64)]) -> AffineDecl {
    terms
        .iter()
        .fold(AffineDecl::constant(base), |e, (op, c)| e.plus(op.clone(), *c))
}

fn named(base: &str, terms: &[(Operand, &str)]) -> AffineDecl {
    terms
        .iter()
        .fold(AffineDecl::constant(base), |e, (op, c)| e.plus(op.clone(), *c))
}

fn by_type(a: AffineDecl, b: AffineDecl) -> StatDecl {
    StatDecl::ByType { a, b }
}

fn base(name: &str, outdoor: bool, pellets: bool) -> ModelSpec {
    let mut spec = ModelSpec::new(name)
        .with_decision(DecisionDecl::binary(TULIP_TYPE))
        .with_decision(DecisionDecl::continuous(WATER, 250.0, 1000.0))
        .with_type_selector(TULIP_TYPE);
    if outdoor {
        spec = spec.with_decision(DecisionDecl::binary(OUTDOOR));
    }
    if pellets {
        spec = spec
            .with_decision(DecisionDecl::integer(PELLETS, 2, 5))
            .with_side_constraint(SideConstraint {
                name: "water_per_pellet".to_string(),
                lhs: lit(0.0, &[(dec(WATER), 1.0), (dec(PELLETS), -200.0)]),
                sense: Sense::Ge,
                rhs: 0.0,
            });
    }
    spec
}

/// `1.5 * type + 1.0 * (1 - type) + 0.015 * water`, plus `2 * (1 - outdoor)`
/// and `0.05 * pellets` when the model has them.
fn budget(costs: [Coef; 5], outdoor: bool, pellets: bool) -> BudgetDecl {
    let [red, purple, water, out, pel] = costs;
    let mut b = BudgetDecl::new(BUDGET)
        .cost(dec(TULIP_TYPE), red)
        .cost(Operand::complement(TULIP_TYPE), purple)
        .cost(dec(WATER), water);
    if outdoor {
        b = b.cost(Operand::complement(OUTDOOR), out);
    }
    if pellets {
        b = b.cost(dec(PELLETS), pel);
    }
    b
}

fn literal_costs() -> [Coef; 5] {
    [
        Coef::Lit(1.5),
        Coef::Lit(1.0),
        Coef::Lit(0.015),
        Coef::Lit(2.0),
        Coef::Lit(0.05),
    ]
}

fn named_costs() -> [Coef; 5] {
    ["Red Tulip".into(), "Purple Tulip".into(), "Water".into(), "Outdoor".into(), "Pellets".into()]
}

fn with_cost_params(spec: ModelSpec) -> ModelSpec {
    spec.with_param("Red Tulip", 1.5)
        .with_param("Purple Tulip", 1.0)
        .with_param("Water", 0.015)
        .with_param("Outdoor", 2.0)
        .with_param("Pellets", 0.05)
}

/// Stem height as a fixed share of the realized leaf surface area.
fn stem_from_leaf() -> LatentDecl {
    LatentDecl::new(
        "stem",
        StatDecl::Fixed(lit(0.0, &[(Operand::latent("leaf"), 0.1)])),
        StatDecl::Fixed(lit(0.0, &[(Operand::latent("leaf"), 0.05)])),
    )
}

pub fn stem_v1() -> ModelSpec {
    base("stem_v1", false, false)
        .with_latent(LatentDecl::new(
            "stem",
            by_type(
                lit(15.0, &[(dec(WATER), 0.0011)]),
                lit(15.0, &[(dec(WATER), 0.001)]),
            ),
            by_type(
                lit(5.0, &[(dec(WATER), -0.001)]),
                lit(10.0, &[(dec(WATER), -0.005)]),
            ),
        ))
        .with_budget(budget(literal_costs(), false, false))
}

pub fn stem_v2() -> ModelSpec {
    let spec = base("stem_v2", false, false)
        .with_profiles(
            [
                ("Stem Base Avg", 15.0),
                ("Stem Water Ratio Avg", 0.0012),
                ("Stem Base Stdev", 5.0),
                ("Stem Water Ratio Stdev", -0.001),
            ],
            [
                ("Stem Base Avg", 15.0),
                ("Stem Water Ratio Avg", 0.001),
                ("Stem Base Stdev", 10.0),
                ("Stem Water Ratio Stdev", -0.005),
            ],
        )
        .with_latent(LatentDecl::new(
            "stem",
            StatDecl::Profiled(named("Stem Base Avg", &[(dec(WATER), "Stem Water Ratio Avg")])),
            StatDecl::Profiled(named("Stem Base Stdev", &[(dec(WATER), "Stem Water Ratio Stdev")])),
        ))
        .with_budget(budget(named_costs(), false, false));
    with_cost_params(spec)
}

fn leaf_v1(pellets: bool) -> LatentDecl {
    let mut red = lit(131.0, &[(dec(WATER), 0.05), (dec(OUTDOOR), 20.0)]);
    let mut purple = lit(150.0, &[(dec(WATER), 0.005), (dec(OUTDOOR), 5.0)]);
    if pellets {
        red = red.plus(dec(PELLETS), -15.0);
        purple = purple.plus(dec(PELLETS), -5.0);
    }
    LatentDecl::new(
        "leaf",
        by_type(red, purple),
        by_type(
            lit(65.0, &[(dec(WATER), -0.001), (dec(OUTDOOR), 1.0)]),
            lit(30.0, &[(dec(WATER), -0.005), (dec(OUTDOOR), 1.0)]),
        ),
    )
    .non_negative()
    .unrewarded()
}

fn flower_v1() -> LatentDecl {
    LatentDecl::new(
        "flower",
        by_type(
            lit(6.0, &[(dec(WATER), -0.001), (Operand::complement(OUTDOOR), 2.0)]),
            lit(8.0, &[(dec(WATER), -0.0015), (Operand::complement(OUTDOOR), 1.0)]),
        ),
        by_type(
            lit(1.35, &[(dec(OUTDOOR), 1.0)]),
            lit(0.75, &[(dec(OUTDOOR), 1.0)]),
        ),
    )
}

fn roots_v1() -> LatentDecl {
    LatentDecl::new(
        "roots",
        by_type(
            lit(15.0, &[(dec(PELLETS), 1.65), (dec(OUTDOOR), 0.25)]),
            lit(16.0, &[(dec(PELLETS), 0.45), (dec(OUTDOOR), 0.25)]),
        ),
        by_type(
            lit(1.0, &[(dec(OUTDOOR), 1.0)]),
            lit(2.0, &[(dec(OUTDOOR), 1.0)]),
        ),
    )
}

pub fn stem_flower_v1() -> ModelSpec {
    base("stem_flower_v1", true, false)
        .with_latent(leaf_v1(false))
        .with_latent(stem_from_leaf())
        .with_latent(flower_v1())
        .with_budget(budget(literal_costs(), true, false))
}

pub fn stem_flower_roots_v1() -> ModelSpec {
    base("stem_flower_roots_v1", true, true)
        .with_latent(leaf_v1(true))
        .with_latent(stem_from_leaf())
        .with_latent(flower_v1())
        .with_latent(roots_v1())
        .with_budget(budget(literal_costs(), true, true))
}

fn leaf_flower_tables(spec: ModelSpec, pellets: bool) -> ModelSpec {
    let mut red = vec![
        ("Leaf Base Avg", 131.0),
        ("Leaf Water Ratio Avg", 0.05),
        ("Leaf Outdoor Ratio Avg", 20.0),
        ("Leaf Base Stdev", 65.0),
        ("Leaf Water Ratio Stdev", -0.001),
        ("Leaf Outdoor Ratio Stdev", 1.0),
        ("Flower Base Avg", 6.0),
        ("Flower Water Ratio Avg", -0.001),
        ("Flower Outdoor Ratio Avg", 2.0),
        ("Flower Base Stdev", 1.35),
        ("Flower Outdoor Ratio Stdev", 1.0),
    ];
    let mut purple = vec![
        ("Leaf Base Avg", 150.0),
        ("Leaf Water Ratio Avg", 0.005),
        ("Leaf Outdoor Ratio Avg", 5.0),
        ("Leaf Base Stdev", 30.0),
        ("Leaf Water Ratio Stdev", -0.005),
        ("Leaf Outdoor Ratio Stdev", 1.0),
        ("Flower Base Avg", 8.0),
        ("Flower Water Ratio Avg", -0.0015),
        ("Flower Outdoor Ratio Avg", 1.0),
        ("Flower Base Stdev", 0.75),
        ("Flower Outdoor Ratio Stdev", 1.0),
    ];
    if pellets {
        red.extend([
            ("Leaf Pellets Ratio Avg", -15.0),
            ("Roots Base Avg", 15.0),
            ("Roots Pellets Ratio Avg", 1.65),
            ("Roots Outdoor Ratio Avg", 0.25),
            ("Roots Base Stdev", 1.0),
            ("Roots Outdoor Ratio Stdev", 1.0),
        ]);
        purple.extend([
            ("Leaf Pellets Ratio Avg", -5.0),
            ("Roots Base Avg", 16.0),
            ("Roots Pellets Ratio Avg", 0.45),
            ("Roots Outdoor Ratio Avg", 0.25),
            ("Roots Base Stdev", 2.0),
            ("Roots Outdoor Ratio Stdev", 1.0),
        ]);
    }
    spec.with_profiles(red, purple)
}

fn leaf_v2(pellets: bool) -> LatentDecl {
    let mut mean = named(
        "Leaf Base Avg",
        &[
            (dec(WATER), "Leaf Water Ratio Avg"),
            (dec(OUTDOOR), "Leaf Outdoor Ratio Avg"),
        ],
    );
    if pellets {
        mean = mean.plus(dec(PELLETS), "Leaf Pellets Ratio Avg");
    }
    LatentDecl::new(
        "leaf",
        StatDecl::Profiled(mean),
        StatDecl::Profiled(named(
            "Leaf Base Stdev",
            &[
                (dec(WATER), "Leaf Water Ratio Stdev"),
                (dec(OUTDOOR), "Leaf Outdoor Ratio Stdev"),
            ],
        )),
    )
    .non_negative()
    .unrewarded()
}

fn flower_v2() -> LatentDecl {
    LatentDecl::new(
        "flower",
        StatDecl::Profiled(named(
            "Flower Base Avg",
            &[
                (dec(WATER), "Flower Water Ratio Avg"),
                (dec(OUTDOOR), "Flower Outdoor Ratio Avg"),
            ],
        )),
        StatDecl::Profiled(named(
            "Flower Base Stdev",
            &[(dec(OUTDOOR), "Flower Outdoor Ratio Stdev")],
        )),
    )
}

fn roots_v2() -> LatentDecl {
    LatentDecl::new(
        "roots",
        StatDecl::Profiled(named(
            "Roots Base Avg",
            &[
                (dec(PELLETS), "Roots Pellets Ratio Avg"),
                (dec(OUTDOOR), "Roots Outdoor Ratio Avg"),
            ],
        )),
        StatDecl::Profiled(named(
            "Roots Base Stdev",
            &[(dec(OUTDOOR), "Roots Outdoor Ratio Stdev")],
        )),
    )
}

pub fn stem_flower_v2() -> ModelSpec {
    let spec = leaf_flower_tables(base("stem_flower_v2", true, false), false)
        .with_latent(leaf_v2(false))
        .with_latent(stem_from_leaf())
        .with_latent(flower_v2())
        .with_budget(budget(named_costs(), true, false));
    with_cost_params(spec)
}

pub fn stem_flower_roots_v2() -> ModelSpec {
    let spec = leaf_flower_tables(base("stem_flower_roots_v2", true, true), true)
        .with_latent(leaf_v2(true))
        .with_latent(stem_from_leaf())
        .with_latent(flower_v2())
        .with_latent(roots_v2())
        .with_budget(budget(named_costs(), true, true));
    with_cost_params(spec)
}
