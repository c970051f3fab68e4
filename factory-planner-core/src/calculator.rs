// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! The A→B→C→D→E→F→G→H pipeline: given a [`Database`], [`Skills`], and
//! [`Build`], produces the [`Calc`] snapshot the scheduler writes into
//! `state.calc` (spec.md §2 "Data flow").

use crate::aggregate::{self, Calc};
use crate::build::Build;
use crate::database::Database;
use crate::efficiency;
use crate::skills::Skills;
use crate::tree::{FlatId, FlatTree};

/// One full recompute pass. Total: never panics, never returns `Result` —
/// missing data collapses to zero rates per spec.md §7.
pub struct Calculator;

/// Output of one [`Calculator::run`]: the aggregate snapshot plus the
/// per-machine efficiencies and per-connection actual rates it was derived
/// from, since the renderer needs those directly (spec.md §2).
pub struct CalculatorOutput {
    pub calc: Calc,
    pub tree: FlatTree,
    pub efficiencies: std::collections::HashMap<FlatId, f32>,
    pub actual_rates: std::collections::HashMap<FlatId, f32>,
}

impl Calculator {
    /// Runs component C (flatten) through H (aggregate) over `build`.
    pub fn run(build: &Build, database: &Database, skills: &Skills) -> CalculatorOutput {
        let tree = FlatTree::build(build, database);
        let efficiencies = efficiency::solve(&tree, database, skills);
        let actual_rates = efficiency::actual_rates(&tree, database, skills, &efficiencies);
        let calc = aggregate::aggregate(&tree, database, skills, &actual_rates);

        CalculatorOutput {
            calc,
            tree,
            efficiencies,
            actual_rates,
        }
    }
}
