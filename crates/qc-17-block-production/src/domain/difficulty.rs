//! Difficulty adjustment
//!
//! Implements the Homestead-era difficulty formula (Ethereum Yellow Paper
//! §4.3.4), with the pre-Homestead time-bomb-free predecessor formula kept
//! for blocks before the fork.
//!
//! Difficulty here is a genuine PoW difficulty (higher = harder), not a
//! Bitcoin-style target (lower = harder) — the sign conventions below are
//! the opposite of what a target-based reader might expect.

use primitive_types::U256;

/// Difficulty adjustment configuration.
#[derive(Clone, Debug)]
pub struct DifficultyConfig {
    /// Genesis difficulty, `D_0`.
    pub genesis_difficulty: U256,
    /// Block number at which the Homestead adjustment formula takes over
    /// from the pre-Homestead one.
    pub homestead_block: u64,
    /// Block-number divisor used by the exponential ice-age term.
    pub difficulty_bomb_period: u64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            genesis_difficulty: U256::from(131_072u64),
            homestead_block: 1_150_000,
            difficulty_bomb_period: 100_000,
        }
    }
}

/// Block information needed to derive the next block's difficulty.
#[derive(Clone, Debug)]
pub struct BlockInfo {
    /// Block height.
    pub height: u64,
    /// Block timestamp (Unix epoch seconds).
    pub timestamp: u64,
    /// Difficulty recorded in this block's header.
    pub difficulty: U256,
}

/// Computes each new block's difficulty from its parent.
#[derive(Clone)]
pub struct DifficultyAdjuster {
    config: DifficultyConfig,
}

impl DifficultyAdjuster {
    /// Creates an adjuster bound to `config`.
    #[must_use]
    pub fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    /// Difficulty for the block following `parent`, mined at `timestamp`.
    #[must_use]
    pub fn calculate_next_difficulty(&self, parent: &BlockInfo, timestamp: u64) -> U256 {
        let number = parent.height + 1;
        if number == 0 {
            return self.config.genesis_difficulty;
        }

        let x = parent.difficulty / U256::from(2048u64);

        let sign: i64 = if number < self.config.homestead_block {
            if timestamp < parent.timestamp + 13 {
                1
            } else {
                -1
            }
        } else {
            let elapsed = timestamp.saturating_sub(parent.timestamp);
            (1 - (elapsed / 10) as i64).max(-99)
        };

        let adjustment = if sign >= 0 {
            x.saturating_mul(U256::from(sign as u64))
        } else {
            U256::zero()
        };
        let mut difficulty = if sign >= 0 {
            parent.difficulty.saturating_add(adjustment)
        } else {
            let penalty = x.saturating_mul(U256::from((-sign) as u64));
            parent.difficulty.saturating_sub(penalty)
        };

        let epoch = number / self.config.difficulty_bomb_period;
        if epoch >= 2 {
            let bomb = U256::from(2u64).pow(U256::from(epoch - 2));
            difficulty = difficulty.saturating_add(bomb);
        }

        difficulty.max(self.config.genesis_difficulty)
    }

    /// Whether `candidate` gas limit is admissible for a block whose parent
    /// had `parent_gas_limit`: within `±parent/1024` and above the 125,000
    /// floor.
    #[must_use]
    pub fn gas_limit_is_admissible(parent_gas_limit: u64, candidate: u64) -> bool {
        if candidate <= 125_000 {
            return false;
        }
        let bound = parent_gas_limit / 1024;
        candidate >= parent_gas_limit.saturating_sub(bound) && candidate <= parent_gas_limit + bound
    }

    /// A human-readable description of a difficulty value, for logging.
    #[must_use]
    pub fn describe_difficulty(difficulty: U256) -> String {
        format!("{difficulty}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(height: u64, timestamp: u64, difficulty: u64) -> BlockInfo {
        BlockInfo { height, timestamp, difficulty: U256::from(difficulty) }
    }

    #[test]
    fn genesis_is_the_configured_floor() {
        let config = DifficultyConfig::default();
        let adjuster = DifficultyAdjuster::new(config.clone());

        // A fictitious "block -1" parent isn't meaningful; callers special-case
        // genesis themselves. This test checks the floor is never undercut.
        let p = parent(0, 0, 1);
        let next = adjuster.calculate_next_difficulty(&p, 13);
        assert_eq!(next, config.genesis_difficulty);
    }

    #[test]
    fn pre_homestead_fast_block_increases_difficulty() {
        let adjuster = DifficultyAdjuster::new(DifficultyConfig::default());
        let p = parent(100, 1000, 10_000_000);

        let next = adjuster.calculate_next_difficulty(&p, 1005);
        assert!(next > p.difficulty, "fast block should raise difficulty pre-Homestead");
    }

    #[test]
    fn pre_homestead_slow_block_decreases_difficulty() {
        let adjuster = DifficultyAdjuster::new(DifficultyConfig::default());
        let p = parent(100, 1000, 10_000_000);

        let next = adjuster.calculate_next_difficulty(&p, 1020);
        assert!(next < p.difficulty, "slow block should lower difficulty pre-Homestead");
    }

    #[test]
    fn post_homestead_uses_elapsed_over_ten() {
        let config = DifficultyConfig { homestead_block: 0, ..Default::default() };
        let adjuster = DifficultyAdjuster::new(config);
        let p = parent(2_000_000, 1000, 10_000_000);

        // Elapsed 5s -> sign = 1 - 0 = 1 (still an increase).
        let fast = adjuster.calculate_next_difficulty(&p, 1005);
        assert!(fast > p.difficulty);

        // Elapsed 25s -> sign = 1 - 2 = -1 (a decrease).
        let slow = adjuster.calculate_next_difficulty(&p, 1025);
        assert!(slow < p.difficulty);
    }

    #[test]
    fn ice_age_adds_once_bomb_period_reached() {
        let config = DifficultyConfig { difficulty_bomb_period: 100, homestead_block: 0, ..Default::default() };
        let adjuster = DifficultyAdjuster::new(config);

        // height 199 -> next number 200, epoch = 2, bomb = 2^0 = 1.
        let p = parent(199, 1000, 10_000_000);
        let next = adjuster.calculate_next_difficulty(&p, 1005);
        let without_bomb = p.difficulty + p.difficulty / U256::from(2048u64);
        assert_eq!(next, without_bomb + U256::from(1u64));
    }

    #[test]
    fn gas_limit_window_rejects_outside_bounds() {
        assert!(DifficultyAdjuster::gas_limit_is_admissible(4_000_000, 4_003_000));
        assert!(!DifficultyAdjuster::gas_limit_is_admissible(4_000_000, 4_010_000));
        assert!(!DifficultyAdjuster::gas_limit_is_admissible(4_000_000, 100_000));
    }
}
