use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceGeneratorConfig {
    pub initial_price: f64,
    /// Max relative move per tick is volatility / 2
    pub volatility: f64,
    /// Lowest price the walk can reach
    pub floor: f64,
}

impl Default for PriceGeneratorConfig {
    fn default() -> Self {
        Self {
            initial_price: 1.0,
            volatility: 0.008,
            floor: 0.1,
        }
    }
}

/// Bounded multiplicative random walk
#[derive(Debug, Clone)]
pub struct PriceGenerator {
    rng: StdRng,
    price: f64,
    volatility: f64,
    floor: f64,
}

impl PriceGenerator {
    pub fn new(config: PriceGeneratorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn seeded(config: PriceGeneratorConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: PriceGeneratorConfig, rng: StdRng) -> Self {
        assert!(
            config.floor.is_finite() && config.floor > 0.0,
            "floor must be finite and positive"
        );
        assert!(
            config.volatility.is_finite() && config.volatility >= 0.0,
            "volatility must be finite and non-negative"
        );
        let price = if config.initial_price.is_finite() {
            config.initial_price.max(config.floor)
        } else {
            config.floor
        };

        Self {
            rng,
            price,
            volatility: config.volatility,
            floor: config.floor,
        }
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    /// Resume the walk from a known price
    pub fn reset_to(&mut self, price: f64) {
        if price.is_finite() {
            self.price = price.max(self.floor);
        }
    }

    pub fn next_price(&mut self) -> f64 {
        let unit: f64 = self.rng.gen::<f64>() - 0.5;
        self.price = step(self.price, unit, self.volatility, self.floor);
        self.price
    }
}

/// One walk step for a draw `unit` in [-0.5, 0.5)
pub(crate) fn step(current: f64, unit: f64, volatility: f64, floor: f64) -> f64 {
    let change = unit * current * volatility;
    (current + change).max(floor)
}

#[cfg(test)]
mod tests {
    use super::{step, PriceGenerator, PriceGeneratorConfig};

    #[test]
    fn seeded_generators_are_deterministic() {
        let config = PriceGeneratorConfig::default();
        let mut a = PriceGenerator::seeded(config, 42);
        let mut b = PriceGenerator::seeded(config, 42);

        let walk_a: Vec<f64> = (0..20).map(|_| a.next_price()).collect();
        let walk_b: Vec<f64> = (0..20).map(|_| b.next_price()).collect();
        assert_eq!(walk_a, walk_b);
    }

    #[test]
    fn price_never_drops_below_floor() {
        let config = PriceGeneratorConfig {
            initial_price: 0.1,
            volatility: 1.0,
            floor: 0.1,
        };
        let mut generator = PriceGenerator::seeded(config, 7);
        for _ in 0..10_000 {
            assert!(generator.next_price() >= 0.1);
        }
    }

    #[test]
    fn step_is_bounded_by_half_volatility() {
        let up = step(100.0, 0.5, 0.008, 0.1);
        let down = step(100.0, -0.5, 0.008, 0.1);
        assert!((up - 100.4).abs() < 1e-9);
        assert!((down - 99.6).abs() < 1e-9);
        assert_eq!(step(0.1, -0.5, 1.0, 0.1), 0.1);
    }

    #[test]
    fn initial_price_is_clamped_to_floor() {
        let config = PriceGeneratorConfig {
            initial_price: 0.0,
            ..PriceGeneratorConfig::default()
        };
        assert_eq!(PriceGenerator::seeded(config, 1).price(), 0.1);
    }

    #[test]
    #[should_panic(expected = "floor must be finite and positive")]
    fn rejects_non_positive_floor() {
        let config = PriceGeneratorConfig {
            floor: 0.0,
            ..PriceGeneratorConfig::default()
        };
        let _ = PriceGenerator::seeded(config, 1);
    }
}
