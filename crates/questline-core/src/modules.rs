//! The static catalog of idle-economy production modules.

use questline_types::ModuleId;

/// Production and pricing of one module type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleCatalogEntry {
    /// Catalog key.
    pub id: &'static str,
    /// Energy per second per level.
    pub base_production: f64,
    /// Multiplier applied to the cost for each level already owned.
    pub cost_growth_factor: f64,
    /// Cost of the first paid upgrade before growth.
    pub base_cost: f64,
}

impl ModuleCatalogEntry {
    /// The module id as a typed key.
    pub fn module_id(&self) -> ModuleId {
        ModuleId::from(self.id)
    }

    /// Cost to move from `level` to `level + 1`:
    /// `floor(base_cost * cost_growth_factor ^ level)`.
    pub fn upgrade_cost(&self, level: u32) -> f64 {
        let exponent = i32::try_from(level).unwrap_or(i32::MAX);
        (self.base_cost * self.cost_growth_factor.powi(exponent)).floor()
    }
}

/// Every module, in display order.
pub const MODULES: &[ModuleCatalogEntry] = &[
    ModuleCatalogEntry {
        id: "solar",
        base_production: 10.0,
        cost_growth_factor: 1.15,
        base_cost: 50.0,
    },
    ModuleCatalogEntry {
        id: "wind",
        base_production: 25.0,
        cost_growth_factor: 1.15,
        base_cost: 200.0,
    },
    ModuleCatalogEntry {
        id: "hydro",
        base_production: 60.0,
        cost_growth_factor: 1.2,
        base_cost: 750.0,
    },
    ModuleCatalogEntry {
        id: "fusion",
        base_production: 200.0,
        cost_growth_factor: 1.25,
        base_cost: 5_000.0,
    },
];

/// Look up a module by id.
pub fn find(id: &str) -> Option<&'static ModuleCatalogEntry> {
    MODULES.iter().find(|module| module.id == id)
}
