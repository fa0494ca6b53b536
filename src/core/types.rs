use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{SimError, SimResult};
use super::ranking::allocation_count;
use super::sampling::{Distribution, Rng};

/// Crop identifier from an open set, e.g. `BARLEY` or `CORN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CropType(pub String);

impl CropType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog entry as it arrives from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantSpec {
    pub crop: CropType,
    pub price_per_ton: Vec<(f64, f64)>,
    pub yield_per_ha: Vec<(f64, f64)>,
    pub market_cap_tons: f64,
}

/// Validated crop with its price and yield distributions and farm-wide cap.
#[derive(Debug, Clone, PartialEq)]
pub struct Plant {
    crop: CropType,
    price_per_ton: Distribution,
    yield_per_ha: Distribution,
    market_cap_tons: f64,
}

impl Plant {
    pub fn new(
        crop: CropType,
        price_per_ton: Distribution,
        yield_per_ha: Distribution,
        market_cap_tons: f64,
    ) -> SimResult<Self> {
        if !market_cap_tons.is_finite() || market_cap_tons <= 0.0 {
            return Err(SimError::InvalidParameter(format!(
                "market cap for {crop} must be > 0, got {market_cap_tons}"
            )));
        }
        Ok(Self {
            crop,
            price_per_ton,
            yield_per_ha,
            market_cap_tons,
        })
    }

    pub fn from_spec(spec: &PlantSpec) -> SimResult<Self> {
        let price = Distribution::new(
            spec.price_per_ton.clone(),
            &format!("{} price per ton", spec.crop),
        )?;
        let yield_dist = Distribution::new(
            spec.yield_per_ha.clone(),
            &format!("{} yield per hectare", spec.crop),
        )?;
        Self::new(spec.crop.clone(), price, yield_dist, spec.market_cap_tons)
    }

    pub fn to_spec(&self) -> PlantSpec {
        PlantSpec {
            crop: self.crop.clone(),
            price_per_ton: self.price_per_ton.entries().to_vec(),
            yield_per_ha: self.yield_per_ha.entries().to_vec(),
            market_cap_tons: self.market_cap_tons,
        }
    }

    pub fn crop(&self) -> &CropType {
        &self.crop
    }

    pub fn market_cap_tons(&self) -> f64 {
        self.market_cap_tons
    }

    /// Price for one iteration; the caller owns it for that iteration only.
    pub fn sample_price_per_ton(&self, rng: &mut Rng) -> SimResult<f64> {
        self.price_per_ton.sample(rng)
    }

    pub fn sample_yield_per_ha(&self, rng: &mut Rng) -> SimResult<f64> {
        self.yield_per_ha.sample(rng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    hectares: f64,
}

impl Field {
    pub fn new(hectares: f64) -> SimResult<Self> {
        if !hectares.is_finite() || hectares <= 0.0 {
            return Err(SimError::InvalidParameter(format!(
                "field area must be > 0 hectares, got {hectares}"
            )));
        }
        Ok(Self { hectares })
    }

    pub fn hectares(self) -> f64 {
        self.hectares
    }

    pub fn harvested_tons(self, yield_per_ha: f64) -> f64 {
        self.hectares * yield_per_ha
    }

    /// Uncapped income; the market cap is applied by the revenue rule.
    pub fn gross_income(self, yield_per_ha: f64, price_per_ton: f64) -> f64 {
        self.hectares * yield_per_ha * price_per_ton
    }
}

/// One crop per field position, stored as indices into the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Allocation(pub Vec<usize>);

impl Allocation {
    pub fn plant_indices(&self) -> &[usize] {
        &self.0
    }

    pub fn crops(&self, catalog: &[Plant]) -> Vec<CropType> {
        self.0.iter().map(|&idx| catalog[idx].crop.clone()).collect()
    }
}

pub const DEFAULT_ITERATIONS: u32 = 10_000;
pub const DEFAULT_PENALTY_MULTIPLIER: f64 = 0.4;
pub const DEFAULT_CONFIDENCE_Z: f64 = 1.96;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    fields: Vec<Field>,
    catalog: Vec<Plant>,
    pub iterations: u32,
    pub penalty_multiplier: f64,
    pub confidence_z: f64,
    pub seed: u64,
    /// 1 runs allocations on the calling thread; more uses a worker pool.
    pub workers: usize,
}

impl SimulationConfig {
    pub fn new(fields: Vec<Field>, catalog: Vec<Plant>) -> SimResult<Self> {
        if fields.is_empty() {
            return Err(SimError::EmptyConfiguration(
                "at least one field is required".to_string(),
            ));
        }
        if catalog.is_empty() {
            return Err(SimError::EmptyConfiguration(
                "at least one crop type is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for plant in &catalog {
            if !seen.insert(plant.crop.clone()) {
                return Err(SimError::InvalidParameter(format!(
                    "crop type {} appears more than once in the catalog",
                    plant.crop
                )));
            }
        }

        Ok(Self {
            fields,
            catalog,
            iterations: DEFAULT_ITERATIONS,
            penalty_multiplier: DEFAULT_PENALTY_MULTIPLIER,
            confidence_z: DEFAULT_CONFIDENCE_Z,
            seed: 42,
            workers: 1,
        })
    }

    pub fn from_parts(hectares: &[f64], specs: &[PlantSpec]) -> SimResult<Self> {
        let fields = hectares
            .iter()
            .enumerate()
            .map(|(idx, &ha)| {
                Field::new(ha).map_err(|err| match err {
                    SimError::InvalidParameter(msg) => {
                        SimError::InvalidParameter(format!("field {}: {msg}", idx + 1))
                    }
                    other => other,
                })
            })
            .collect::<SimResult<Vec<_>>>()?;
        let catalog = specs
            .iter()
            .map(Plant::from_spec)
            .collect::<SimResult<Vec<_>>>()?;
        Self::new(fields, catalog)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn catalog(&self) -> &[Plant] {
        &self.catalog
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.iterations == 0 {
            return Err(SimError::InvalidParameter(
                "iteration count must be > 0".to_string(),
            ));
        }
        if !(self.penalty_multiplier > 0.0 && self.penalty_multiplier < 1.0) {
            return Err(SimError::InvalidParameter(format!(
                "penalty multiplier must be in (0, 1), got {}",
                self.penalty_multiplier
            )));
        }
        if !self.confidence_z.is_finite() || self.confidence_z <= 0.0 {
            return Err(SimError::InvalidParameter(format!(
                "confidence z-value must be > 0, got {}",
                self.confidence_z
            )));
        }
        if self.workers == 0 {
            return Err(SimError::InvalidParameter(
                "worker count must be >= 1".to_string(),
            ));
        }
        allocation_count(self.catalog.len(), self.fields.len())?;
        Ok(())
    }
}

/// Summary statistics of one allocation's trial run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationStats {
    pub index: usize,
    pub crops: Vec<CropType>,
    pub iterations: u32,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub ci_left: f64,
    pub ci_right: f64,
    pub median: f64,
    pub p10: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationFailure {
    pub index: usize,
    pub crops: Vec<CropType>,
    pub message: String,
}

/// Pairwise dominance over the ranked allocation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DominanceMatrix {
    pub cells: Vec<Vec<u8>>,
    pub row_counts: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResult {
    pub ranked: Vec<AllocationStats>,
    pub dominance: DominanceMatrix,
    pub failures: Vec<AllocationFailure>,
    pub total_allocations: usize,
    pub cancelled_allocations: usize,
}
