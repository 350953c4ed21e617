use super::config::{DeltaReference, PageRankConfig, Teleport};
use crate::{
    error::{try_alloc, Error, Result},
    helpers::HelperArrays,
    partition::Partition,
    rle::RecordStream,
    types::{NodeId, Rank},
};
use log::{info, warn};
use rayon::prelude::*;
use std::{
    mem::size_of,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Iterating,
    Converged,
}

#[derive(Debug, Clone, Copy)]
pub struct IterationStats {
    pub iteration: usize,
    pub delta: f64,
    pub sink_share: f64,
    pub elapsed: Duration,
}

/// The final rank vector, indexed by node id.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranks {
    ranks: Vec<Rank>,
    iterations: usize,
    delta: f64,
}

impl Ranks {
    pub fn as_slice(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn into_vec(self) -> Vec<Rank> {
        self.ranks
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The delta of the last iteration.
    pub fn delta(&self) -> f64 {
        self.delta
    }
}

/// The iterative PageRank computation over one graph.
pub struct PageRank<'a> {
    stream: &'a RecordStream,
    helpers: &'a HelperArrays,
    partitions: &'a [Partition],
    config: PageRankConfig,
    pool: rayon::ThreadPool,
    teleport: Option<Vec<f64>>,
    previous: Vec<Rank>,
    current: Vec<Rank>,
    next: Vec<Rank>,
    state: State,
    iteration: usize,
    delta: f64,
}

impl<'a> PageRank<'a> {
    pub fn new(
        stream: &'a RecordStream,
        helpers: &'a HelperArrays,
        partitions: &'a [Partition],
        config: &PageRankConfig,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(max_node_id) = stream.max_node_id() {
            if max_node_id as usize >= helpers.len() {
                return Err(Error::Range {
                    stage: "engine",
                    node: max_node_id as usize,
                    bound: helpers.len(),
                });
            }
        }
        check_partitions(stream, helpers, partitions)?;
        let teleport = match &config.teleport {
            Teleport::Uniform => None,
            Teleport::Topic(nodes) => Some(topic_weights(nodes, helpers)?),
        };
        let num_threads = config.thread_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("pagerank-{}", i))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        info!(
            "{} threads, {} partitions, damping factor {}, threshold {}",
            num_threads,
            partitions.len(),
            config.damping_factor,
            config.threshold
        );
        Ok(Self {
            stream,
            helpers,
            partitions,
            config: config.clone(),
            pool,
            teleport,
            previous: Vec::new(),
            current: Vec::new(),
            next: Vec::new(),
            state: State::Init,
            iteration: 0,
            delta: f64::INFINITY,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The current rank vector.
    pub fn ranks(&self) -> &[Rank] {
        &self.current
    }

    fn init(&mut self) -> Result<()> {
        let len = self.helpers.len();
        warn_if_low_memory(3 * len * size_of::<Rank>());
        self.previous = try_alloc("previous ranks", len, 0.0)?;
        self.current = try_alloc("current ranks", len, 0.0)?;
        self.next = try_alloc("next ranks", len, 0.0)?;
        for (rank, &valid) in self.current.iter_mut().zip(self.helpers.validity()) {
            if valid {
                *rank = 1.0;
            }
        }
        self.state = if self.helpers.num_valid() == 0 {
            State::Converged
        } else {
            State::Iterating
        };
        Ok(())
    }

    /// Runs one iteration.
    pub fn step(&mut self) -> Result<IterationStats> {
        if self.state == State::Init {
            self.init()?;
        }
        if self.state == State::Converged {
            return Err(Error::Config(String::from("the ranks have converged")));
        }
        let time_now = Instant::now();
        self.iteration += 1;
        self.previous.copy_from_slice(&self.current);
        let sink_pool = normalize(&mut self.current, self.helpers);
        let sink_share = sink_pool / self.helpers.num_valid() as f64;
        self.accumulate()?;
        let reference = match self.config.delta_reference {
            DeltaReference::Snapshot => &self.previous,
            DeltaReference::Normalized => &self.current,
        };
        let delta = dampen(
            &mut self.next,
            reference,
            self.helpers.validity(),
            self.teleport.as_deref(),
            self.config.damping_factor,
            sink_share,
            self.iteration,
        )?;
        std::mem::swap(&mut self.current, &mut self.next);
        let (pool, next) = (&self.pool, &mut self.next);
        pool.install(|| next.par_iter_mut().for_each(|rank| *rank = 0.0));
        self.delta = delta;
        let stats = IterationStats {
            iteration: self.iteration,
            delta,
            sink_share,
            elapsed: time_now.elapsed(),
        };
        info!(
            "iteration {}: delta={} sink_share={} ({}ms)",
            stats.iteration,
            stats.delta,
            stats.sink_share,
            stats.elapsed.as_millis()
        );
        if delta < self.config.threshold {
            info!("delta threshold crossed");
            self.state = State::Converged;
        } else if matches!(self.config.max_iterations, Some(max) if self.iteration >= max) {
            warn!(
                "stopped after {} iterations with delta {}",
                self.iteration, delta
            );
            self.state = State::Converged;
        }
        Ok(stats)
    }

    /// Adds the normalized ranks of every group's sources into `next`, one task per partition.
    fn accumulate(&mut self) -> Result<()> {
        let (stream, partitions, pool, current) =
            (self.stream, self.partitions, &self.pool, &self.current);
        let slices = carve(&mut self.next, partitions);
        pool.install(|| {
            partitions
                .par_iter()
                .zip(slices)
                .try_for_each(|(partition, out)| {
                    accumulate_partition(stream, partition, current, out)
                })
        })
    }

    /// Iterates until convergence.
    pub fn run(mut self) -> Result<Ranks> {
        let time_now = Instant::now();
        if self.state == State::Init {
            self.init()?;
        }
        while self.state == State::Iterating {
            self.step()?;
        }
        info!(
            "converged after {} iterations ({}ms)",
            self.iteration,
            time_now.elapsed().as_millis()
        );
        Ok(Ranks {
            ranks: self.current,
            iterations: self.iteration,
            delta: if self.iteration == 0 { 0.0 } else { self.delta },
        })
    }
}

/// Divides the rank of every valid node by its out-degree and returns the total rank of sinks.
pub fn normalize(ranks: &mut [Rank], helpers: &HelperArrays) -> f64 {
    let mut sink_pool = 0.0;
    for ((rank, &valid), &out_degree) in ranks
        .iter_mut()
        .zip(helpers.validity())
        .zip(helpers.out_degree())
    {
        if !valid {
            continue;
        }
        if out_degree > 0 {
            *rank /= out_degree as f64;
        } else {
            sink_pool += *rank;
        }
    }
    sink_pool
}

/// Splits `next` into the disjoint node ranges owned by each partition.
fn carve<'b>(mut next: &'b mut [Rank], partitions: &[Partition]) -> Vec<&'b mut [Rank]> {
    let mut slices = Vec::with_capacity(partitions.len());
    let mut pos = 0;
    for partition in partitions {
        let (_, rest) = std::mem::take(&mut next).split_at_mut(partition.nodes.start - pos);
        let (owned, rest) = rest.split_at_mut(partition.nodes.len());
        slices.push(owned);
        next = rest;
        pos = partition.nodes.end;
    }
    slices
}

fn accumulate_partition(
    stream: &RecordStream,
    partition: &Partition,
    current: &[Rank],
    out: &mut [Rank],
) -> Result<()> {
    let base = partition.nodes.start;
    for group in stream.groups_in(partition.records.clone()) {
        let node = group.destination as usize;
        let slot = node
            .checked_sub(base)
            .and_then(|i| out.get_mut(i))
            .ok_or(Error::Range {
                stage: "accumulate",
                node,
                bound: partition.nodes.end,
            })?;
        *slot += group
            .sources
            .iter()
            .map(|&source| current[source as usize])
            .sum::<Rank>();
    }
    Ok(())
}

/// Applies damping to every valid node and returns the delta against `reference`.
fn dampen(
    next: &mut [Rank],
    reference: &[Rank],
    validity: &[bool],
    teleport: Option<&[f64]>,
    damping_factor: f64,
    sink_share: f64,
    iteration: usize,
) -> Result<f64> {
    let mut delta = 0.0;
    for (node, rank) in next.iter_mut().enumerate() {
        if validity[node] {
            let restart = teleport.map_or(1.0, |weights| weights[node]);
            *rank = (*rank + sink_share) * damping_factor + (1.0 - damping_factor) * restart;
            if !rank.is_finite() {
                return Err(Error::Numeric { node, iteration });
            }
        }
        delta += (*rank - reference[node]).abs();
    }
    Ok(delta)
}

/// Spreads the restart mass of all valid nodes evenly over `nodes`.
fn topic_weights(nodes: &[NodeId], helpers: &HelperArrays) -> Result<Vec<f64>> {
    let mut weights = try_alloc("topic weights", helpers.len(), 0.0)?;
    let mut num_topic = 0;
    for &node in nodes {
        if !helpers.is_valid(node) {
            return Err(Error::Config(format!(
                "topic node {} is not a valid node",
                node
            )));
        }
        let weight = &mut weights[node as usize];
        if *weight == 0.0 {
            *weight = 1.0;
            num_topic += 1;
        }
    }
    let weight = helpers.num_valid() as f64 / num_topic as f64;
    weights
        .iter_mut()
        .filter(|w| **w > 0.0)
        .for_each(|w| *w = weight);
    Ok(weights)
}

fn check_partitions(
    stream: &RecordStream,
    helpers: &HelperArrays,
    partitions: &[Partition],
) -> Result<()> {
    let invalid = |reason: &str| Err(Error::Config(format!("invalid partitions: {}", reason)));
    if partitions.is_empty() {
        return invalid("no partitions");
    }
    let mut offsets = stream.groups().map(|group| group.offset).peekable();
    let (mut records_end, mut nodes_end) = (0, 0);
    for partition in partitions {
        if partition.records.start != records_end || partition.records.end < records_end {
            return invalid("records are not contiguous");
        }
        if !partition.records.is_empty() {
            while offsets
                .next_if(|&offset| offset < partition.records.start)
                .is_some()
            {}
            if offsets.peek() != Some(&partition.records.start) {
                return invalid("records do not start at a group");
            }
        }
        if partition.nodes.start < nodes_end || partition.nodes.end < partition.nodes.start {
            return invalid("node ranges overlap");
        }
        records_end = partition.records.end;
        nodes_end = partition.nodes.end;
    }
    if records_end != stream.len() {
        return invalid("records do not cover the stream");
    }
    if nodes_end > helpers.len() {
        return Err(Error::Range {
            stage: "partitions",
            node: nodes_end - 1,
            bound: helpers.len(),
        });
    }
    Ok(())
}

fn warn_if_low_memory(num_bytes: usize) {
    if let Ok(mem) = sys_info::mem_info() {
        if (mem.avail as usize).saturating_mul(1024) < num_bytes {
            warn!(
                "rank vectors need {}M but only {}M are available",
                num_bytes / 1024 / 1024,
                mem.avail / 1024
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{helpers::build_helper_arrays, partition::split, rle::encode, types::Edge};

    fn graph(mut edges: Vec<Edge>) -> (RecordStream, HelperArrays) {
        edges.sort_by_key(|&(src, dst)| (dst, src));
        let stream = encode(edges).unwrap();
        let helpers = build_helper_arrays(&stream).unwrap();
        (stream, helpers)
    }

    /// A 3-cycle whose members also link to the sink 4.
    fn cycle_with_sink() -> (RecordStream, HelperArrays) {
        graph(vec![(1, 2), (2, 3), (3, 1), (1, 4), (2, 4), (3, 4)])
    }

    #[test]
    fn test_normalize() {
        let (_, helpers) = cycle_with_sink();
        let mut ranks = vec![0.0, 1.0, 1.0, 1.0, 1.0];
        let sink_pool = normalize(&mut ranks, &helpers);
        assert_eq!(ranks, vec![0.0, 0.5, 0.5, 0.5, 1.0]);
        assert_eq!(sink_pool, 1.0);
        let spread: f64 = ranks
            .iter()
            .zip(helpers.out_degree())
            .map(|(&rank, &deg)| rank * deg as f64)
            .sum();
        assert!((spread + sink_pool - helpers.num_valid() as f64).abs() < 1e-12);
    }

    #[test]
    fn test_carve() {
        let mut next = vec![0.0; 10];
        let partitions = vec![
            Partition {
                records: 0..4,
                nodes: 1..3,
            },
            Partition {
                records: 4..4,
                nodes: 3..3,
            },
            Partition {
                records: 4..9,
                nodes: 3..8,
            },
        ];
        let slices = carve(&mut next, &partitions);
        assert_eq!(
            slices.iter().map(|s| s.len()).collect::<Vec<_>>(),
            vec![2, 0, 5]
        );
    }

    #[test]
    fn test_first_step() {
        let (stream, helpers) = cycle_with_sink();
        let partitions = split(&stream, 2).unwrap();
        let mut pagerank = PageRank::new(
            &stream,
            &helpers,
            &partitions,
            PageRankConfig::new().num_threads(Some(2)),
        )
        .unwrap();
        assert_eq!(pagerank.state(), State::Init);
        let stats = pagerank.step().unwrap();
        assert_eq!(pagerank.state(), State::Iterating);
        assert_eq!(stats.iteration, 1);
        assert_eq!(stats.sink_share, 0.25);
        let expected = [0.0, 0.7875, 0.7875, 0.7875, 1.6375];
        for (rank, expected) in pagerank.ranks().iter().zip(&expected) {
            assert!((rank - expected).abs() < 1e-12);
        }
        assert!((stats.delta - 3.0 * 0.2125 - 0.6375).abs() < 1e-12);
    }

    #[test]
    fn test_cycle_with_sink() {
        let (stream, helpers) = cycle_with_sink();
        let partitions = split(&stream, 3).unwrap();
        let mut pagerank = PageRank::new(
            &stream,
            &helpers,
            &partitions,
            PageRankConfig::new().threshold(1e-10),
        )
        .unwrap();
        let mut deltas = vec![];
        while pagerank.state() != State::Converged {
            deltas.push(pagerank.step().unwrap().delta);
            assert!(deltas.len() <= 30);
        }
        for window in deltas.windows(2) {
            assert!(window[1] < window[0]);
        }
        let ranks = pagerank.ranks();
        let (r, s) = (1.0 / 1.2125, 4.0 - 3.0 / 1.2125);
        for node in 1..4 {
            assert!((ranks[node] - r).abs() < 1e-9);
        }
        assert!((ranks[4] - s).abs() < 1e-9);
        assert_eq!(ranks[0], 0.0);
    }

    #[test]
    fn test_pure_cycle() {
        let (stream, helpers) = graph(vec![(1, 2), (2, 3), (3, 1)]);
        let partitions = split(&stream, 2).unwrap();
        let ranks = run_ranks(
            &stream,
            &helpers,
            &partitions,
            PageRankConfig::new().threshold(1e-10),
        );
        assert_eq!(ranks.iterations(), 1);
        assert_eq!(ranks.delta(), 0.0);
        assert_eq!(ranks.as_slice(), &[0.0, 1.0, 1.0, 1.0]);
    }

    fn run_ranks(
        stream: &RecordStream,
        helpers: &HelperArrays,
        partitions: &[Partition],
        config: &PageRankConfig,
    ) -> Ranks {
        PageRank::new(stream, helpers, partitions, config)
            .unwrap()
            .run()
            .unwrap()
    }

    #[test]
    fn test_delta_reference() {
        let (stream, helpers) = cycle_with_sink();
        let partitions = split(&stream, 1).unwrap();
        let snapshot = run_ranks(
            &stream,
            &helpers,
            &partitions,
            PageRankConfig::new().threshold(1e-10),
        );
        assert!(snapshot.iterations() <= 20);
        let normalized = run_ranks(
            &stream,
            &helpers,
            &partitions,
            PageRankConfig::new()
                .threshold(0.0)
                .max_iterations(Some(40))
                .delta_reference(DeltaReference::Normalized),
        );
        // The cycle members' ranks are halved by normalization, so the delta settles at 1.5 r.
        assert!((normalized.delta() - 1.5 / 1.2125).abs() < 1e-9);
        for (a, b) in snapshot.as_slice().iter().zip(normalized.as_slice()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_max_iterations() {
        let (stream, helpers) = cycle_with_sink();
        let partitions = split(&stream, 2).unwrap();
        let ranks = run_ranks(
            &stream,
            &helpers,
            &partitions,
            PageRankConfig::new().threshold(0.0).max_iterations(Some(4)),
        );
        assert_eq!(ranks.iterations(), 4);
        assert!(ranks.delta() > 0.0);
    }

    #[test]
    fn test_step_after_convergence() {
        let (stream, helpers) = graph(vec![(1, 2), (2, 1)]);
        let partitions = split(&stream, 1).unwrap();
        let mut pagerank =
            PageRank::new(&stream, &helpers, &partitions, &PageRankConfig::new()).unwrap();
        pagerank.step().unwrap();
        assert_eq!(pagerank.state(), State::Converged);
        assert!(matches!(pagerank.step(), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_graph() {
        let stream = RecordStream::default();
        let helpers = build_helper_arrays(&stream).unwrap();
        let partitions = split(&stream, 4).unwrap();
        let ranks = run_ranks(&stream, &helpers, &partitions, &PageRankConfig::new());
        assert!(ranks.as_slice().is_empty());
        assert_eq!(ranks.iterations(), 0);
    }

    #[test]
    fn test_topic() {
        let (stream, helpers) = cycle_with_sink();
        let partitions = split(&stream, 2).unwrap();
        let ranks = run_ranks(
            &stream,
            &helpers,
            &partitions,
            PageRankConfig::new()
                .threshold(1e-10)
                .teleport(Teleport::Topic(vec![1, 1])),
        );
        let ranks = ranks.as_slice();
        assert!(ranks[1] > ranks[2] && ranks[2] > ranks[3]);
        assert!((ranks.iter().sum::<f64>() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_topic() {
        let (stream, helpers) = cycle_with_sink();
        let partitions = split(&stream, 2).unwrap();
        assert!(matches!(
            PageRank::new(
                &stream,
                &helpers,
                &partitions,
                PageRankConfig::new().teleport(Teleport::Topic(vec![0])),
            ),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_stale_helpers() {
        let (stream, _) = cycle_with_sink();
        let (_, small) = graph(vec![(1, 2)]);
        let partitions = split(&stream, 2).unwrap();
        assert!(matches!(
            PageRank::new(&stream, &small, &partitions, &PageRankConfig::new()),
            Err(Error::Range { node: 4, .. })
        ));
    }

    #[test]
    fn test_partitions_not_covering() {
        let (stream, helpers) = cycle_with_sink();
        let partitions = vec![Partition {
            records: 0..stream.len() - 1,
            nodes: 0..5,
        }];
        assert!(matches!(
            PageRank::new(&stream, &helpers, &partitions, &PageRankConfig::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_misaligned_partitions() {
        // Groups 1 <- {3, 4}, 2 <- {1, 4}, 3 <- {2}; offset 2 is the first source of node 1.
        let (stream, helpers) = graph(vec![(3, 1), (4, 1), (1, 2), (4, 2), (2, 3)]);
        let partitions = vec![
            Partition {
                records: 0..2,
                nodes: 0..2,
            },
            Partition {
                records: 2..stream.len(),
                nodes: 2..5,
            },
        ];
        assert!(matches!(
            PageRank::new(&stream, &helpers, &partitions, &PageRankConfig::new()),
            Err(Error::Config(_))
        ));
        let partitions = split(&stream, 2).unwrap();
        let ranks = PageRank::new(&stream, &helpers, &partitions, &PageRankConfig::new())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(ranks.as_slice().len(), 5);
        assert_eq!(ranks.as_slice()[0], 0.0);
    }

    #[test]
    fn test_inconsistent_helpers() {
        // A non-finite rank is reported, not propagated.
        let (stream, helpers) = graph(vec![(1, 2), (2, 1)]);
        let partitions = split(&stream, 1).unwrap();
        let mut pagerank =
            PageRank::new(&stream, &helpers, &partitions, &PageRankConfig::new()).unwrap();
        pagerank.init().unwrap();
        pagerank.current[1] = f64::INFINITY;
        assert!(matches!(
            pagerank.step(),
            Err(Error::Numeric {
                node: 2,
                iteration: 1
            })
        ));
    }
}
