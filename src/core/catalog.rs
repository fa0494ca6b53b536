//! Built-in demo farm: four cereal and oilseed crops with eight-point price
//! and yield distributions, and four fields.

use super::types::{CropType, PlantSpec};

pub fn default_fields() -> Vec<f64> {
    vec![15.0, 8.0, 5.0, 10.0]
}

pub fn default_catalog() -> Vec<PlantSpec> {
    vec![
        PlantSpec {
            crop: CropType::new("BARLEY"),
            price_per_ton: vec![
                (540.63, 0.05),
                (564.74, 0.06),
                (600.5, 0.10),
                (620.6, 0.13),
                (654.7, 0.20),
                (680.6, 0.21),
                (690.02, 0.18),
                (720.74, 0.07),
            ],
            yield_per_ha: vec![
                (1.41, 0.02),
                (2.0, 0.06),
                (2.7, 0.10),
                (3.5, 0.13),
                (4.4, 0.23),
                (5.66, 0.36),
                (7.38, 0.08),
                (9.45, 0.02),
            ],
            market_cap_tons: 20.0,
        },
        PlantSpec {
            crop: CropType::new("WHEAT"),
            price_per_ton: vec![
                (679.48, 0.05),
                (700.74, 0.06),
                (715.6, 0.10),
                (730.68, 0.13),
                (793.33, 0.20),
                (832.57, 0.21),
                (851.02, 0.18),
                (921.84, 0.07),
            ],
            yield_per_ha: vec![
                (2.00, 0.02),
                (2.67, 0.06),
                (3.11, 0.10),
                (3.56, 0.13),
                (4.22, 0.23),
                (4.72, 0.36),
                (5.87, 0.08),
                (6.00, 0.02),
            ],
            market_cap_tons: 30.0,
        },
        PlantSpec {
            crop: CropType::new("OAT"),
            price_per_ton: vec![
                (559.22, 0.05),
                (562.87, 0.06),
                (566.47, 0.10),
                (569.75, 0.13),
                (577.99, 0.20),
                (583.29, 0.21),
                (591.31, 0.18),
                (595.23, 0.07),
            ],
            yield_per_ha: vec![
                (2.10, 0.02),
                (2.33, 0.06),
                (3.03, 0.10),
                (3.36, 0.13),
                (3.67, 0.23),
                (3.93, 0.36),
                (4.55, 0.08),
                (5.62, 0.02),
            ],
            market_cap_tons: 50.0,
        },
        PlantSpec {
            crop: CropType::new("COLZA"),
            price_per_ton: vec![
                (1586.67, 0.05),
                (1600.00, 0.06),
                (1623.34, 0.10),
                (1656.88, 0.13),
                (1699.89, 0.20),
                (1710.96, 0.21),
                (1733.45, 0.18),
                (1811.00, 0.07),
            ],
            yield_per_ha: vec![
                (1.58, 0.02),
                (1.79, 0.06),
                (1.98, 0.10),
                (2.23, 0.13),
                (2.46, 0.23),
                (2.88, 0.36),
                (3.19, 0.08),
                (4.46, 0.02),
            ],
            market_cap_tons: 10.0,
        },
    ]
}
