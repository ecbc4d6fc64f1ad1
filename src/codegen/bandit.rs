//! Exp3.1 multi-armed bandit (spec §4.6): picks which code generator to
//! run next, weighting by observed reward instead of round-robin or
//! uniform sampling. One arm per generator.

use rand::Rng;

/// Per-arm bookkeeping (spec §4.6: "State per arm: weight, invocation
/// count, accumulated reward, estimated total reward, running sum and
/// sum-of-squares of raw rewards").
#[derive(Debug, Clone)]
struct ArmState {
    weight: f64,
    invocations: u64,
    /// Sum of rewards after clamping to `[0, 1]` — the numerator feeding
    /// the importance-weighted estimator below.
    accumulated_reward: f64,
    /// Sum of importance-weighted rewards (`reward / p_i`), the unbiased
    /// total-reward estimate the epoch-advance rule compares across arms.
    estimated_total_reward: f64,
    /// Sum and sum-of-squares of the raw (unclamped) reward signal.
    running_sum: f64,
    running_sum_sq: f64,
}

impl ArmState {
    fn new() -> Self {
        ArmState { weight: 1.0, invocations: 0, accumulated_reward: 0.0, estimated_total_reward: 0.0, running_sum: 0.0, running_sum_sq: 0.0 }
    }

    fn reset_rewards(&mut self) {
        self.accumulated_reward = 0.0;
        self.estimated_total_reward = 0.0;
        self.running_sum = 0.0;
        self.running_sum_sq = 0.0;
    }
}

/// `e - 1`, the normalizing constant in Exp3.1's guessed-best-action and
/// gamma-recomputation formulas (Auer et al., "The Nonstochastic
/// Multi-armed Bandit Problem", algorithm Exp3.1).
const EULER_MINUS_ONE: f64 = std::f64::consts::E - 1.0;

fn best_action_guess(k: f64, epoch: u64) -> f64 {
    (k / EULER_MINUS_ONE) * 2f64.powi(epoch as i32)
}

fn gamma_for_epoch(k: f64, epoch: u64) -> f64 {
    let g = best_action_guess(k, epoch).max(f64::EPSILON);
    ((k * k.ln().max(f64::EPSILON)) / (EULER_MINUS_ONE * g)).sqrt().min(1.0)
}

/// `gamma` trades exploration for exploitation: `0` collapses to greedy
/// weighted sampling, `1` to uniform sampling. `restart_after_iterations`
/// is a belt-and-suspenders cap independent of the epoch-advance rule
/// below, bounding floating-point weight growth even in a run whose
/// reward signal never triggers an epoch boundary.
#[derive(Debug, Clone)]
pub struct Bandit {
    arms: Vec<ArmState>,
    gamma: f64,
    epoch: u64,
    max_estimated_total_reward: f64,
    restart_after: u64,
    iterations: u64,
}

impl Bandit {
    pub fn new(num_arms: usize, gamma: f64, restart_after: u64) -> Self {
        let num_arms = num_arms.max(1);
        Bandit {
            arms: (0..num_arms).map(|_| ArmState::new()).collect(),
            gamma,
            epoch: 0,
            max_estimated_total_reward: 0.0,
            restart_after,
            iterations: 0,
        }
    }

    fn weights(&self) -> Vec<f64> {
        self.arms.iter().map(|a| a.weight).collect()
    }

    fn probabilities(&self) -> Vec<f64> {
        let k = self.arms.len() as f64;
        let sum: f64 = self.arms.iter().map(|a| a.weight).sum();
        self.arms.iter().map(|a| (1.0 - self.gamma) * (a.weight / sum) + self.gamma / k).collect()
    }

    /// Draw an arm index among those in `eligible` (a subset filter
    /// applied by the caller, e.g. "generators whose required context is
    /// open here"). Probabilities are renormalized over just the
    /// eligible subset so an arm excluded by context never steals mass.
    pub fn select(&self, eligible: &[usize], rng: &mut dyn rand::RngCore) -> Option<usize> {
        if eligible.is_empty() {
            return None;
        }
        let probs = self.probabilities();
        let total: f64 = eligible.iter().map(|&i| probs[i]).sum();
        let mut roll = rng.gen_range(0.0..total);
        for &i in eligible {
            roll -= probs[i];
            if roll <= 0.0 {
                return Some(i);
            }
        }
        eligible.last().copied()
    }

    /// Feed back a reward in `[0, 1]` for the arm that was just played:
    /// updates that arm's bookkeeping, applies the Exp3 importance-weighted
    /// update to its weight, then runs the epoch-advance check.
    pub fn record_outcome(&mut self, arm: usize, reward: f64) {
        let probs = self.probabilities();
        let k = self.arms.len() as f64;
        let p = probs[arm].max(f64::EPSILON);
        let clamped = reward.clamp(0.0, 1.0);
        let x_hat = clamped / p;

        let a = &mut self.arms[arm];
        a.invocations += 1;
        a.running_sum += reward;
        a.running_sum_sq += reward * reward;
        a.accumulated_reward += clamped;
        a.estimated_total_reward += x_hat;
        a.weight *= (self.gamma * x_hat / k).exp();

        self.iterations += 1;
        self.epoch_advance();
        if self.iterations >= self.restart_after {
            self.restart();
        }
    }

    /// Exp3.1's restart rule (spec §4.6): once the best arm's estimated
    /// total reward exceeds this epoch's guessed ceiling (minus the
    /// `K/gamma` slack the estimator can be off by), the guess was too
    /// low — reset the running max, move to the next epoch, and shrink
    /// gamma to match the new, larger guess.
    fn epoch_advance(&mut self) {
        let k = self.arms.len() as f64;
        let max_reward = self.arms.iter().map(|a| a.estimated_total_reward).fold(f64::MIN, f64::max);
        self.max_estimated_total_reward = self.max_estimated_total_reward.max(max_reward);

        let threshold = best_action_guess(k, self.epoch) - k / self.gamma.max(f64::EPSILON);
        if self.max_estimated_total_reward > threshold {
            self.max_estimated_total_reward = 0.0;
            self.epoch += 1;
            self.gamma = gamma_for_epoch(k, self.epoch);
        }
    }

    /// Rescale weights into `[1, 2K]` and reset every arm's reward
    /// bookkeeping (spec §4.6). Unlike a hard reset to uniform weights,
    /// this preserves the *relative* standing between arms instead of
    /// discarding everything learned so far.
    pub fn restart(&mut self) {
        let k = self.arms.len() as f64;
        let weights = self.weights();
        let min_w = weights.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_w = weights.iter().cloned().fold(f64::MIN, f64::max);
        let span = (max_w - min_w).max(f64::EPSILON);
        for a in self.arms.iter_mut() {
            let normalized = (a.weight - min_w) / span;
            a.weight = 1.0 + normalized * (2.0 * k - 1.0);
            a.reset_rewards();
        }
        self.iterations = 0;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Maps a raw execution signal (e.g. "did this generator's output reach
/// new coverage") into the `[0, 1]` reward the bandit expects: a z-score
/// against the running mean/variance, squashed through a logistic curve
/// (spec §4.6, "reward normalization").
#[derive(Debug, Clone, Default)]
pub struct RewardNormalizer {
    mean: f64,
    variance: f64,
    count: u64,
}

impl RewardNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, raw: f64) -> f64 {
        self.count += 1;
        let delta = raw - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = raw - self.mean;
        self.variance += delta * delta2;
        let std_dev = if self.count > 1 { (self.variance / (self.count - 1) as f64).sqrt() } else { 1.0 };
        let z = if std_dev > f64::EPSILON { (raw - self.mean) / std_dev } else { 0.0 };
        1.0 / (1.0 + (-z).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn select_picks_only_from_eligible_arms() {
        let bandit = Bandit::new(4, 0.1, 1000);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            let arm = bandit.select(&[1, 3], &mut rng).unwrap();
            assert!(arm == 1 || arm == 3);
        }
    }

    #[test]
    fn high_reward_arm_gains_weight() {
        let mut bandit = Bandit::new(2, 0.1, 100_000);
        for _ in 0..200 {
            bandit.record_outcome(0, 1.0);
            bandit.record_outcome(1, 0.0);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut arm0_wins = 0;
        for _ in 0..1000 {
            if bandit.select(&[0, 1], &mut rng) == Some(0) {
                arm0_wins += 1;
            }
        }
        assert!(arm0_wins > 600, "arm with consistent reward should dominate selection, got {arm0_wins}/1000");
    }

    #[test]
    fn record_outcome_accumulates_per_arm_reward_state() {
        let mut bandit = Bandit::new(2, 0.1, 100_000);
        bandit.record_outcome(0, 1.0);
        bandit.record_outcome(0, 0.5);
        let arm = &bandit.arms[0];
        assert_eq!(arm.invocations, 2);
        assert!(arm.accumulated_reward > 0.0);
        assert!(arm.estimated_total_reward > 0.0);
        assert_eq!(arm.running_sum, 1.5);
        assert_eq!(arm.running_sum_sq, 1.0 * 1.0 + 0.5 * 0.5);
    }

    #[test]
    fn restart_rescales_weights_into_expected_range_and_clears_rewards() {
        let mut bandit = Bandit::new(3, 0.1, 1000);
        bandit.record_outcome(0, 1.0);
        bandit.record_outcome(1, 0.2);
        bandit.restart();
        let k = bandit.arms.len() as f64;
        for arm in &bandit.arms {
            assert!(arm.weight >= 1.0 && arm.weight <= 2.0 * k, "weight {} outside [1, 2K]", arm.weight);
            assert_eq!(arm.accumulated_reward, 0.0);
            assert_eq!(arm.estimated_total_reward, 0.0);
            assert_eq!(arm.running_sum, 0.0);
            assert_eq!(arm.running_sum_sq, 0.0);
        }
        assert_eq!(bandit.iterations, 0);
    }

    #[test]
    fn epoch_advances_once_the_leading_arm_exceeds_its_guessed_ceiling() {
        let mut bandit = Bandit::new(2, 0.9, 1_000_000);
        let start_epoch = bandit.epoch();
        for _ in 0..5000 {
            bandit.record_outcome(0, 1.0);
        }
        assert!(bandit.epoch() > start_epoch, "epoch should have advanced under sustained high reward");
    }

    #[test]
    fn normalizer_maps_outliers_toward_extremes() {
        let mut n = RewardNormalizer::new();
        for _ in 0..50 {
            n.normalize(1.0);
        }
        let squashed = n.normalize(1000.0);
        assert!(squashed > 0.5);
    }
}
