use std::sync::Arc;

use crate::distance::DistanceFunction;
use crate::error::{Error, Result};
use crate::generator::{
    CartesianGridGenerator, LatinHypercubeGenerator, ParameterGenerator, RandomGenerator,
};

/// Builds a generator, optionally seeded.
pub type GeneratorFactory = fn(Option<u64>) -> Arc<dyn ParameterGenerator>;

/// Lookup tables for the named pieces of a sampling run.
///
/// A registry is built once (usually via [`Registry::standard`]) and passed by
/// reference wherever names have to be resolved: parsing range files,
/// decoding descriptors, applying a [`SamplingConfig`](crate::SamplingConfig).
#[derive(Clone)]
pub struct Registry {
    distances: Vec<DistanceFunction>,
    generators: Vec<(String, GeneratorFactory)>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            distances: Vec::new(),
            generators: Vec::new(),
        }
    }

    /// Every built-in distance function and the three built-in generators.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            distances: DistanceFunction::ALL.to_vec(),
            generators: vec![
                (RandomGenerator::NAME.to_owned(), random_factory as GeneratorFactory),
                (LatinHypercubeGenerator::NAME.to_owned(), latin_hypercube_factory),
                (CartesianGridGenerator::NAME.to_owned(), grid_factory),
            ],
        }
    }

    /// Register a distance function. Re-registering is a no-op.
    #[must_use]
    pub fn with_distance(mut self, function: DistanceFunction) -> Self {
        if !self.distances.contains(&function) {
            self.distances.push(function);
        }
        self
    }

    /// Register (or replace) a generator under `name`.
    #[must_use]
    pub fn with_generator(mut self, name: impl Into<String>, factory: GeneratorFactory) -> Self {
        let name = name.into();
        self.generators.retain(|(n, _)| *n != name);
        self.generators.push((name, factory));
        self
    }

    /// Resolve a distance function by short name.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDistanceFunction` if no registered function has that name.
    pub fn distance(&self, short_name: &str) -> Result<DistanceFunction> {
        self.distances
            .iter()
            .copied()
            .find(|f| f.short_name() == short_name)
            .ok_or_else(|| Error::UnknownDistanceFunction(short_name.to_owned()))
    }

    /// Registered distance functions, in registration order.
    #[must_use]
    pub fn distances(&self) -> &[DistanceFunction] {
        &self.distances
    }

    /// Registered generator names, in registration order.
    pub fn generator_names(&self) -> impl Iterator<Item = &str> {
        self.generators.iter().map(|(name, _)| name.as_str())
    }

    /// Build the generator registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownGenerator` if nothing is registered under `name`.
    pub fn generator(&self, name: &str, seed: Option<u64>) -> Result<Arc<dyn ParameterGenerator>> {
        self.generators
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory(seed))
            .ok_or_else(|| Error::UnknownGenerator(name.to_owned()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

fn random_factory(seed: Option<u64>) -> Arc<dyn ParameterGenerator> {
    Arc::new(seed.map_or_else(RandomGenerator::new, RandomGenerator::with_seed))
}

fn latin_hypercube_factory(seed: Option<u64>) -> Arc<dyn ParameterGenerator> {
    Arc::new(seed.map_or_else(LatinHypercubeGenerator::new, LatinHypercubeGenerator::with_seed))
}

fn grid_factory(_seed: Option<u64>) -> Arc<dyn ParameterGenerator> {
    Arc::new(CartesianGridGenerator::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_resolves_names() {
        let registry = Registry::standard();
        assert_eq!(registry.distance("js").ok(), Some(DistanceFunction::JensenShannon));
        assert!(matches!(
            registry.distance("bogus"),
            Err(Error::UnknownDistanceFunction(name)) if name == "bogus"
        ));
        let names: Vec<&str> = registry.generator_names().collect();
        assert_eq!(names, ["Random", "Latin Hypercube", "Cartesian Grid"]);
        for name in names {
            let generator = registry.generator(name, Some(1)).unwrap();
            assert_eq!(generator.name(), name);
        }
        assert!(matches!(
            registry.generator("Sobol", None),
            Err(Error::UnknownGenerator(_))
        ));
    }

    #[test]
    fn empty_registry_knows_nothing() {
        let registry = Registry::empty().with_distance(DistanceFunction::L2);
        assert!(registry.distance("l1").is_err());
        assert!(registry.distance("l2").is_ok());
        assert_eq!(registry.generator_names().count(), 0);
    }
}
