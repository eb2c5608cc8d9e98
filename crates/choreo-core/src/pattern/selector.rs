//! Uniform pattern selection with an injectable seed.

use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;

use super::{builtin_catalog, Pacing, TimingPattern};
use crate::error::PatternConfigError;

/// Picks one pattern per run, uniformly over a validated catalog.
///
/// With a seed the sequence of picks is reproducible; without one the
/// generator is seeded from OS entropy.
#[derive(Debug, Clone)]
pub struct PatternSelector {
    catalog: Vec<TimingPattern>,
    rng: Mcg128Xsl64,
}

impl PatternSelector {
    /// Validate every pattern against `pacing` and build a selector.
    pub fn new(
        catalog: Vec<TimingPattern>,
        pacing: &Pacing,
        seed: Option<u64>,
    ) -> Result<Self, PatternConfigError> {
        if catalog.is_empty() {
            return Err(PatternConfigError::EmptyCatalog);
        }
        for pattern in &catalog {
            pattern.validate(pacing)?;
        }
        let rng = match seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        Ok(Self { catalog, rng })
    }

    /// Selector over the built-in catalog.
    pub fn builtin(pacing: &Pacing, seed: Option<u64>) -> Result<Self, PatternConfigError> {
        Self::new(builtin_catalog(), pacing, seed)
    }

    pub fn catalog(&self) -> &[TimingPattern] {
        &self.catalog
    }

    pub fn select_index(&mut self) -> usize {
        self.rng.gen_range(0..self.catalog.len())
    }

    /// Pick the pattern for the next run.
    pub fn select(&mut self) -> TimingPattern {
        let index = self.select_index();
        tracing::debug!(index, name = %self.catalog[index].name, "pattern selected");
        self.catalog[index].clone()
    }
}
