mod catalog;
mod engine;
mod error;
mod ranking;
mod sampling;
mod stats;
mod types;

pub use catalog::{default_catalog, default_fields};
pub use engine::{evaluate_allocation, market_capped_income, run_model, run_trials};
pub use error::{SimError, SimResult};
pub use ranking::{
    MAX_ALLOCATIONS, allocation_count, build_dominance_matrix, dominates, enumerate_allocations,
    rank_by_mean,
};
pub use sampling::{Distribution, Rng, derive_seed};
pub use stats::{OutcomeAccumulator, OutcomeSummary, confidence_interval, population_std_dev};
pub use types::{
    Allocation, AllocationFailure, AllocationStats, CropType, DEFAULT_CONFIDENCE_Z,
    DEFAULT_ITERATIONS, DEFAULT_PENALTY_MULTIPLIER, DominanceMatrix, Field, ModelResult, Plant,
    PlantSpec, SimulationConfig,
};
