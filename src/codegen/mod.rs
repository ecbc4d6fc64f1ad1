//! Code generators (spec §4.5/§4.6): the ~25 recipes `CodeGenMutator`
//! and recursive builder calls draw from, selected by an Exp3.1 bandit
//! over "which generator is currently paying off" instead of uniform
//! round-robin.

pub mod bandit;
pub mod generators;

pub use bandit::{Bandit, RewardNormalizer};

use rand::RngCore;

use crate::builder::{BuilderResult, ProgramBuilder};
use crate::config::BanditConfig;
use crate::ir::{Context, JsType, Variable};

/// One recipe: the context it needs open, the input types it asks the
/// builder to resolve before running, and the body that actually emits
/// instructions. `body` takes `pool` too so control-flow generators can
/// recurse into further generation via `ProgramBuilder::build_recursive`.
#[derive(Clone)]
pub struct CodeGenerator {
    pub name: &'static str,
    pub required_context: Context,
    pub input_types: Vec<JsType>,
    pub body: fn(&mut ProgramBuilder<'_>, &[Variable], &mut GeneratorPool) -> BuilderResult<()>,
}

pub struct GeneratorPool {
    generators: Vec<CodeGenerator>,
    bandit: Bandit,
    reward_normalizer: RewardNormalizer,
}

impl GeneratorPool {
    pub fn new(generators: Vec<CodeGenerator>, gamma: f64, restart_after: u64) -> Self {
        let bandit = Bandit::new(generators.len(), gamma, restart_after);
        GeneratorPool { generators, bandit, reward_normalizer: RewardNormalizer::new() }
    }

    pub fn default_pool() -> Self {
        Self::new(generators::all(), 0.1, 10_000)
    }

    pub fn from_config(config: &BanditConfig) -> Self {
        Self::new(generators::all(), config.gamma, config.restart_after_iterations)
    }

    pub fn eligible_indices(&self, context: Context) -> Vec<usize> {
        self.generators
            .iter()
            .enumerate()
            .filter(|(_, g)| context.contains(g.required_context))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn select(&self, context: Context, rng: &mut dyn RngCore) -> Option<usize> {
        let eligible = self.eligible_indices(context);
        self.bandit.select(&eligible, rng)
    }

    pub fn generator(&self, idx: usize) -> &CodeGenerator {
        &self.generators[idx]
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// `reward` is the raw per-outcome signal (e.g. a binary success
    /// indicator); it is normalized against the running reward
    /// distribution before it ever reaches the bandit, so one generator's
    /// outlier outcome doesn't swing its weight disproportionately to
    /// another's.
    pub fn record_outcome(&mut self, idx: usize, reward: f64) {
        let normalized = self.reward_normalizer.normalize(reward);
        self.bandit.record_outcome(idx, normalized);
    }

    pub fn restart(&mut self) {
        self.bandit.restart();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FuzzerConfig;
    use crate::ir::Context;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn default_pool_has_at_least_one_generator_eligible_in_script_context() {
        let pool = GeneratorPool::default_pool();
        assert!(!pool.eligible_indices(Context::SCRIPT).is_empty());
    }

    #[test]
    fn generating_from_default_pool_produces_code() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut pool = GeneratorPool::default_pool();
        let mut b = ProgramBuilder::new(&config, &mut rng);
        b.build(10, crate::builder::BuildStrategy::Generating, &mut pool, None).unwrap();
        assert!(b.code_len() >= 10);
    }
}
