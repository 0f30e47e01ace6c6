//! Helper functions

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use rand::Rng;

/// Draws from an exponential distribution with the given mean by inverting
/// its CDF.
pub fn sample_exponential<R: Rng + ?Sized>(rng: &mut R, mean: f64) -> f64 {
    // gen() is in [0, 1), so 1 - u is never 0
    let u: f64 = rng.gen();
    -mean * (1.0 - u).ln()
}

/// Median of `values`, averaging the two middle values for even lengths.
///
/// ## Panics
/// Panics if `values` is empty.
pub fn median_of_floats(mut values: Vec<f64>) -> f64 {
    assert!(!values.is_empty(), "median of an empty set");

    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Function with a name, compared, ordered, and hashed by that name alone.
#[derive(Clone)]
pub struct NamedFn<Input, Output> {
    name: String,
    func: Arc<dyn Fn(Input) -> Output + Send + Sync + 'static>,
}

impl<I, O> NamedFn<I, O> {
    pub fn new<N, F>(name: N, func: F) -> Self
    where
        N: Into<String>,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        Self { name: name.into(), func: Arc::new(func) }
    }

    pub fn call(&self, input: I) -> O {
        (self.func)(input)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<I, O> fmt::Debug for NamedFn<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

impl<I, O> PartialEq for NamedFn<I, O> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<I, O> Eq for NamedFn<I, O> {}

impl<I, O> PartialOrd for NamedFn<I, O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I, O> Ord for NamedFn<I, O> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl<I, O> Hash for NamedFn<I, O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
