use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::error::{SimError, SimResult};
use super::ranking::{build_dominance_matrix, enumerate_allocations, rank_by_mean};
use super::sampling::{Rng, derive_seed};
use super::stats::OutcomeAccumulator;
use super::types::{
    Allocation, AllocationFailure, AllocationStats, Field, ModelResult, Plant, SimulationConfig,
};

/// Income of one field's harvest given how much of the same crop has
/// already been sold this iteration. Tonnage beyond `cap` sells at
/// `price * penalty`.
pub fn market_capped_income(
    already_sold: f64,
    cap: f64,
    harvested: f64,
    price: f64,
    penalty: f64,
) -> f64 {
    if already_sold >= cap {
        harvested * price * penalty
    } else if already_sold + harvested > cap {
        let full = cap - already_sold;
        let over = harvested - full;
        full * price + over * price * penalty
    } else {
        harvested * price
    }
}

/// Tonnage produced per catalog crop within a single iteration.
struct SellLedger {
    produced: Vec<f64>,
}

impl SellLedger {
    fn new(crop_count: usize) -> Self {
        Self {
            produced: vec![0.0; crop_count],
        }
    }

    /// Sells one field's harvest and records its tonnage, uncapped.
    fn sell(
        &mut self,
        plant_idx: usize,
        plant: &Plant,
        field: Field,
        yield_per_ha: f64,
        price: f64,
        penalty: f64,
    ) -> f64 {
        let already = self.produced[plant_idx];
        let cap = plant.market_cap_tons();
        let harvested = field.harvested_tons(yield_per_ha);
        let income = if already + harvested <= cap {
            field.gross_income(yield_per_ha, price)
        } else {
            market_capped_income(already, cap, harvested, price, penalty)
        };
        self.produced[plant_idx] = already + harvested;
        income
    }
}

/// One stochastic snapshot of an allocation. Fields are processed in
/// index order, which decides who sells at full price once a cap is hit.
fn simulate_iteration(
    fields: &[Field],
    catalog: &[Plant],
    allocation: &Allocation,
    penalty: f64,
    rng: &mut Rng,
) -> SimResult<f64> {
    let mut ledger = SellLedger::new(catalog.len());
    let mut total = 0.0;

    for (field, &plant_idx) in fields.iter().zip(allocation.plant_indices()) {
        let plant = &catalog[plant_idx];
        let price = plant.sample_price_per_ton(rng)?;
        let yield_per_ha = plant.sample_yield_per_ha(rng)?;
        total += ledger.sell(plant_idx, plant, *field, yield_per_ha, price, penalty);
    }

    Ok(total)
}

/// Runs `config.iterations` independent trials of one allocation.
pub fn run_trials(
    config: &SimulationConfig,
    allocation: &Allocation,
    allocation_index: usize,
    rng: &mut Rng,
) -> SimResult<OutcomeAccumulator> {
    if allocation.plant_indices().len() != config.fields().len() {
        return Err(SimError::InvalidParameter(format!(
            "allocation {allocation_index} covers {} fields, expected {}",
            allocation.plant_indices().len(),
            config.fields().len()
        )));
    }
    if let Some(&bad) = allocation
        .plant_indices()
        .iter()
        .find(|&&idx| idx >= config.catalog().len())
    {
        return Err(SimError::InvalidParameter(format!(
            "allocation {allocation_index} references unknown crop index {bad}"
        )));
    }

    let mut outcome = OutcomeAccumulator::with_capacity(config.iterations as usize);
    for iteration in 0..config.iterations {
        let income = simulate_iteration(
            config.fields(),
            config.catalog(),
            allocation,
            config.penalty_multiplier,
            rng,
        )?;
        if !income.is_finite() {
            return Err(SimError::NumericOverflow {
                allocation: allocation_index,
                iteration,
            });
        }
        outcome.record(income);
    }
    Ok(outcome)
}

/// Trial run plus aggregation for one allocation, on its own draw stream.
pub fn evaluate_allocation(
    config: &SimulationConfig,
    allocation: &Allocation,
    allocation_index: usize,
) -> SimResult<AllocationStats> {
    let mut rng = Rng::new(derive_seed(config.seed, allocation_index));
    let outcome = run_trials(config, allocation, allocation_index, &mut rng)?;
    let summary = outcome.summarize(config.confidence_z);

    Ok(AllocationStats {
        index: allocation_index,
        crops: allocation.crops(config.catalog()),
        iterations: summary.iterations,
        mean: summary.mean,
        min: summary.min,
        max: summary.max,
        std_dev: summary.std_dev,
        ci_left: summary.ci_left,
        ci_right: summary.ci_right,
        median: summary.median,
        p10: summary.p10,
        p90: summary.p90,
    })
}

enum AllocationOutcome {
    Completed(AllocationStats),
    Failed(AllocationFailure),
    Cancelled,
}

/// Called with the allocation index once it completes or fails.
type FinishHook<'a> = &'a (dyn Fn(usize) + Sync);

fn run_one(
    config: &SimulationConfig,
    allocation: &Allocation,
    index: usize,
    cancel: &AtomicBool,
    on_finished: FinishHook<'_>,
) -> AllocationOutcome {
    if cancel.load(Ordering::Relaxed) {
        return AllocationOutcome::Cancelled;
    }
    let outcome = match evaluate_allocation(config, allocation, index) {
        Ok(stats) => {
            debug!(index, crops = ?stats.crops, mean = stats.mean, "allocation evaluated");
            AllocationOutcome::Completed(stats)
        }
        Err(err) => {
            warn!(index, error = %err, "allocation failed");
            AllocationOutcome::Failed(AllocationFailure {
                index,
                crops: allocation.crops(config.catalog()),
                message: err.to_string(),
            })
        }
    };
    on_finished(index);
    outcome
}

/// Evaluates every allocation, ranks the results and builds the dominance
/// matrix. `cancel` is checked before each allocation starts.
pub fn run_model(config: &SimulationConfig, cancel: &AtomicBool) -> SimResult<ModelResult> {
    run_batch(config, cancel, &|_: usize| {})
}

fn run_batch(
    config: &SimulationConfig,
    cancel: &AtomicBool,
    on_finished: FinishHook<'_>,
) -> SimResult<ModelResult> {
    config.validate()?;
    let allocations = enumerate_allocations(config.catalog().len(), config.fields().len())?;
    info!(
        fields = config.fields().len(),
        crops = config.catalog().len(),
        allocations = allocations.len(),
        iterations = config.iterations,
        workers = config.workers,
        "starting simulation batch"
    );

    let outcomes: Vec<AllocationOutcome> = if config.workers <= 1 {
        allocations
            .iter()
            .enumerate()
            .map(|(idx, allocation)| run_one(config, allocation, idx, cancel, on_finished))
            .collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .map_err(|err| SimError::InvalidParameter(format!("worker pool: {err}")))?;
        pool.install(|| {
            allocations
                .par_iter()
                .enumerate()
                .map(|(idx, allocation)| run_one(config, allocation, idx, cancel, on_finished))
                .collect()
        })
    };

    let mut ranked = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    let mut cancelled_allocations = 0;
    for outcome in outcomes {
        match outcome {
            AllocationOutcome::Completed(stats) => ranked.push(stats),
            AllocationOutcome::Failed(failure) => failures.push(failure),
            AllocationOutcome::Cancelled => cancelled_allocations += 1,
        }
    }
    if cancelled_allocations > 0 {
        warn!(cancelled_allocations, "batch cancelled before completion");
    }

    rank_by_mean(&mut ranked);
    let dominance = build_dominance_matrix(&ranked);
    info!(
        completed = ranked.len(),
        failed = failures.len(),
        "simulation batch finished"
    );

    Ok(ModelResult {
        ranked,
        dominance,
        failures,
        total_allocations: allocations.len(),
        cancelled_allocations,
    })
}
