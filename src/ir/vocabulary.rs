//! Small fixed vocabularies used whenever a mutator or generator needs to
//! sample a fresh property name, builtin, or string literal. Kept as data
//! (not hardcoded per call site) so `OperationMutator` and the code
//! generators draw from the same pool, matching real-world property
//! names and builtins closely enough to produce plausible programs.

use rand::seq::SliceRandom;
use rand::Rng;

const PROPERTY_NAMES: &[&str] =
    &["length", "size", "value", "name", "a", "b", "x", "y", "prototype", "constructor", "__proto__"];
const METHOD_NAMES: &[&str] =
    &["push", "pop", "slice", "map", "forEach", "toString", "valueOf", "call", "apply", "bind"];
const BUILTIN_NAMES: &[&str] =
    &["Object", "Array", "Math", "JSON", "Symbol", "Proxy", "Reflect", "Error", "Promise"];
const STRING_LITERALS: &[&str] = &["", "a", "hello", "0", "-1", "NaN", "undefined"];

#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub property_names: Vec<String>,
    pub method_names: Vec<String>,
    pub builtin_names: Vec<String>,
    pub string_literals: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Vocabulary {
            property_names: PROPERTY_NAMES.iter().map(|s| s.to_string()).collect(),
            method_names: METHOD_NAMES.iter().map(|s| s.to_string()).collect(),
            builtin_names: BUILTIN_NAMES.iter().map(|s| s.to_string()).collect(),
            string_literals: STRING_LITERALS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Vocabulary {
    pub fn random_property_name(&self, rng: &mut dyn rand::RngCore) -> String {
        self.property_names.choose(rng).cloned().unwrap_or_else(|| "p".to_string())
    }

    pub fn random_method_name(&self, rng: &mut dyn rand::RngCore) -> String {
        self.method_names.choose(rng).cloned().unwrap_or_else(|| "m".to_string())
    }

    pub fn random_builtin_name(&self, rng: &mut dyn rand::RngCore) -> String {
        self.builtin_names.choose(rng).cloned().unwrap_or_else(|| "Object".to_string())
    }

    pub fn random_string_literal(&self, rng: &mut dyn rand::RngCore) -> String {
        self.string_literals.choose(rng).cloned().unwrap_or_default()
    }

    pub fn random_regexp_pattern(&self, rng: &mut dyn rand::RngCore) -> String {
        const PATTERNS: &[&str] = &["a+", "[a-z]*", "\\d+", ".*", "^$"];
        PATTERNS.choose(rng).map(|s| s.to_string()).unwrap_or_default()
    }

    pub fn random_int(&self, rng: &mut dyn rand::RngCore) -> i64 {
        const INTS: &[i64] = &[0, 1, -1, 42, i32::MAX as i64, i32::MIN as i64];
        *INTS.choose(rng).unwrap_or(&0)
    }

    pub fn random_float(&self, rng: &mut dyn rand::RngCore) -> f64 {
        const FLOATS: &[f64] = &[0.0, 1.0, -1.0, 13.37, f64::NAN, f64::INFINITY];
        *FLOATS.choose(rng).unwrap_or(&0.0)
    }

    pub fn random_bigint(&self, rng: &mut dyn rand::RngCore) -> String {
        rng.gen_range(0i64..1_000_000).to_string()
    }
}
