//! Current pipeline lease prices, written by news parsing and read by the
//! transport engine.

use crate::config::RouteConfig;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct PipelineCosts {
    costs: HashMap<String, Decimal>,
}

impl PipelineCosts {
    /// Seed every route's pipeline with its configured default cost.
    pub fn from_routes(routes: &[RouteConfig]) -> Self {
        Self {
            costs: routes
                .iter()
                .map(|r| (r.pipeline.to_uppercase(), r.default_lease_cost))
                .collect(),
        }
    }

    pub fn get(&self, pipeline: &str) -> Option<Decimal> {
        self.costs.get(&pipeline.to_uppercase()).copied()
    }

    pub fn routes(&self) -> Vec<String> {
        self.costs.keys().cloned().collect()
    }

    /// Overwrite a pipeline's cost; returns the previous value.
    pub fn update(&mut self, pipeline: &str, cost: Decimal) -> Option<Decimal> {
        let previous = self.costs.insert(pipeline.to_uppercase(), cost);
        info!(%pipeline, %cost, previous = ?previous, "Pipeline lease cost updated");
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use rust_decimal_macros::dec;

    #[test]
    fn test_seed_and_update() {
        let mut costs = PipelineCosts::from_routes(&TransportConfig::default().routes);
        assert_eq!(costs.get("AK-CS-PIPE"), Some(dec!(50000)));
        assert_eq!(costs.update("ak-cs-pipe", dec!(42000)), Some(dec!(50000)));
        assert_eq!(costs.get("AK-CS-PIPE"), Some(dec!(42000)));
        assert_eq!(costs.get("UNKNOWN-PIPE"), None);
    }
}
