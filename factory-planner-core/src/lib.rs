// Copyright 2021 Zachary Stewart
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//! The production-flow engine for an offline, browser-hosted factory
//! planner: a mutable catalog of materials/machines/recipes/blueprints
//! (component A), a per-workspace graph of placed machines and belts, and
//! the solver pipeline (components C-I) that turns that graph into a
//! steady-state rate/efficiency snapshot every time the scheduler decides
//! it's time to recompute.

mod aggregate;
mod blueprint;
mod build;
mod calculator;
mod database;
mod distribution;
mod efficiency;
mod ids;
mod rates;
mod scheduler;
mod skills;
mod storage;
mod tree;

/// Universal epsilon for rate/cost comparisons (spec.md §4.E "Tolerance 0.01
/// is the universal epsilon for rate comparisons").
pub const EPSILON: f32 = 0.01;

pub use aggregate::{Calc, StorageFillItem};
pub use blueprint::{
    create_template_body, instantiate, reconnect_by_material, BlueprintBody, BlueprintConnection,
    BlueprintEditStack, BlueprintError, BlueprintMachine, BlueprintTemplate, BoundaryPort,
    BoundarySignature, CountBreakdown, InternalId, MachineCountCache, PortMapping, PortMappings,
};
pub use build::{
    Build, Camera, Connection, ManualInventoryEntry, PlacedMachine, PlacedMachineKind, Topper,
    ValidationIssue,
};
pub use calculator::{Calculator, CalculatorOutput};
pub use database::{
    CatalogError, Database, Footprint, FurnaceRequirement, ItemAmount, Machine, MachineKind,
    Material, MaterialRole, Recipe,
};
pub use ids::{BlueprintId, Id, MachineId, MaterialId, Port, RecipeId};
pub use scheduler::{Invalidation, RunOutcome, Scheduler};
pub use skills::Skills;
pub use storage::StorageAllocation;
pub use tree::{BuildGraphView, FlatConnection, FlatId, FlatMachine, FlatTree, GraphView};
