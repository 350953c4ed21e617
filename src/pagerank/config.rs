use crate::{
    error::{Error, Result},
    types::NodeId,
};

pub const DAMPING_FACTOR: f64 = 0.85;

pub const THRESHOLD: f64 = 1.0;

/// The snapshot a new rank vector is compared against to measure convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaReference {
    /// The ranks as they were at the start of the iteration.
    Snapshot,
    /// The ranks after division by out-degree, before they are replaced.
    Normalized,
}

impl DeltaReference {
    pub fn new(name: &str) -> Result<Self> {
        match name {
            "snapshot" => Ok(DeltaReference::Snapshot),
            "normalized" => Ok(DeltaReference::Normalized),
            _ => Err(Error::Config(format!("unknown delta reference: {}", name))),
        }
    }
}

/// Where the random surfer restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Teleport {
    /// Every valid node.
    Uniform,
    /// Only the given nodes.
    Topic(Vec<NodeId>),
}

#[derive(Debug, Clone)]
pub struct PageRankConfig {
    pub(crate) damping_factor: f64,
    pub(crate) threshold: f64,
    pub(crate) delta_reference: DeltaReference,
    pub(crate) max_iterations: Option<usize>,
    pub(crate) num_threads: Option<usize>,
    pub(crate) teleport: Teleport,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping_factor: DAMPING_FACTOR,
            threshold: THRESHOLD,
            delta_reference: DeltaReference::Snapshot,
            max_iterations: None,
            num_threads: None,
            teleport: Teleport::Uniform,
        }
    }
}

impl PageRankConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn damping_factor(&mut self, damping_factor: f64) -> &mut Self {
        self.damping_factor = damping_factor;
        self
    }

    /// Iteration stops once the delta drops below `threshold`.
    pub fn threshold(&mut self, threshold: f64) -> &mut Self {
        self.threshold = threshold;
        self
    }

    pub fn delta_reference(&mut self, delta_reference: DeltaReference) -> &mut Self {
        self.delta_reference = delta_reference;
        self
    }

    pub fn max_iterations(&mut self, max_iterations: Option<usize>) -> &mut Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Defaults to the number of CPUs.
    pub fn num_threads(&mut self, num_threads: Option<usize>) -> &mut Self {
        self.num_threads = num_threads;
        self
    }

    pub fn teleport(&mut self, teleport: Teleport) -> &mut Self {
        self.teleport = teleport;
        self
    }

    /// The configured number of threads, or the number of CPUs.
    pub fn thread_count(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            sys_info::cpu_num()
                .map(|n| n as usize)
                .unwrap_or_else(|_| rayon::current_num_threads())
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.damping_factor) {
            return Err(Error::Config(format!(
                "damping factor {} is not in [0, 1]",
                self.damping_factor
            )));
        }
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(Error::Config(format!(
                "threshold {} is not a non-negative number",
                self.threshold
            )));
        }
        if self.num_threads == Some(0) {
            return Err(Error::Config(String::from(
                "the number of threads must be positive",
            )));
        }
        if matches!(&self.teleport, Teleport::Topic(nodes) if nodes.is_empty()) {
            return Err(Error::Config(String::from("the topic is empty")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PageRankConfig::new();
        assert_eq!(config.damping_factor, 0.85);
        assert_eq!(config.threshold, 1.0);
        assert_eq!(config.delta_reference, DeltaReference::Snapshot);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(PageRankConfig::new()
            .damping_factor(1.5)
            .validate()
            .is_err());
        assert!(PageRankConfig::new()
            .threshold(f64::NAN)
            .validate()
            .is_err());
        assert!(PageRankConfig::new()
            .num_threads(Some(0))
            .validate()
            .is_err());
        assert!(PageRankConfig::new()
            .teleport(Teleport::Topic(vec![]))
            .validate()
            .is_err());
        assert!(PageRankConfig::new()
            .damping_factor(0.5)
            .threshold(0.0)
            .num_threads(Some(2))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_thread_count() {
        assert_eq!(PageRankConfig::new().num_threads(Some(3)).thread_count(), 3);
        assert!(PageRankConfig::new().thread_count() >= 1);
    }

    #[test]
    fn test_delta_reference() {
        assert_eq!(
            DeltaReference::new("normalized").unwrap(),
            DeltaReference::Normalized
        );
        assert!(DeltaReference::new("previous").is_err());
    }
}
