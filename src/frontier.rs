use std::collections::{HashSet, VecDeque};

use crate::config::TraversalPolicy;

/// A URL waiting in (or claimed from) the frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    /// Link distance from the seed.
    pub depth: u32,
}

#[derive(Debug)]
enum PendingOrder {
    Fifo(VecDeque<FrontierEntry>),
    Lifo(Vec<FrontierEntry>),
}

impl PendingOrder {
    fn new(policy: TraversalPolicy) -> Self {
        match policy {
            TraversalPolicy::BreadthFirst => Self::Fifo(VecDeque::new()),
            TraversalPolicy::DepthFirst => Self::Lifo(Vec::new()),
        }
    }

    fn push(&mut self, entry: FrontierEntry) {
        match self {
            Self::Fifo(queue) => queue.push_back(entry),
            Self::Lifo(stack) => stack.push(entry),
        }
    }

    fn pop(&mut self) -> Option<FrontierEntry> {
        match self {
            Self::Fifo(queue) => queue.pop_front(),
            Self::Lifo(stack) => stack.pop(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Fifo(queue) => queue.len(),
            Self::Lifo(stack) => stack.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pending work plus the visited set for one crawl.
///
/// A URL is in at most one of three states at a time: pending, in flight
/// (claimed by a worker but not yet accounted for), or visited. Membership is
/// tracked in hash sets so `add_url` is O(1) regardless of queue length.
/// In-flight URLs count against `max_pages`, which keeps concurrent workers
/// from overshooting the page budget.
#[derive(Debug)]
pub struct Frontier {
    order: PendingOrder,
    pending: HashSet<String>,
    in_flight: HashSet<String>,
    visited: HashSet<String>,
    max_pages: usize,
}

impl Frontier {
    pub fn new<I, S>(policy: TraversalPolicy, seeds: I, max_pages: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frontier = Self {
            order: PendingOrder::new(policy),
            pending: HashSet::new(),
            in_flight: HashSet::new(),
            visited: HashSet::new(),
            max_pages,
        };
        for seed in seeds {
            frontier.add_url(seed, 0);
        }
        tracing::debug!(%policy, seeds = frontier.pending_len(), max_pages, "frontier initialized");
        frontier
    }

    /// True when something is pending and the page budget has room left.
    pub fn has_next(&self) -> bool {
        !self.order.is_empty() && self.budget_remaining() > 0
    }

    fn budget_remaining(&self) -> usize {
        self.max_pages
            .saturating_sub(self.visited.len() + self.in_flight.len())
    }

    /// Claims the next URL according to the traversal policy. The URL moves to
    /// the in-flight state until [`Frontier::mark_visited`] or
    /// [`Frontier::release`] is called for it.
    pub fn pop_next(&mut self) -> Option<FrontierEntry> {
        if self.budget_remaining() == 0 {
            return None;
        }
        while let Some(entry) = self.order.pop() {
            self.pending.remove(&entry.url);
            if self.visited.contains(&entry.url) || self.in_flight.contains(&entry.url) {
                continue;
            }
            self.in_flight.insert(entry.url.clone());
            return Some(entry);
        }
        None
    }

    /// Schedules `url` unless it is already pending, in flight or visited.
    /// Returns whether the URL was added.
    pub fn add_url(&mut self, url: impl Into<String>, depth: u32) -> bool {
        let url = url.into();
        if self.visited.contains(&url) || self.in_flight.contains(&url) || self.pending.contains(&url)
        {
            return false;
        }
        self.pending.insert(url.clone());
        self.order.push(FrontierEntry { url, depth });
        true
    }

    /// Records that a fetch attempt for `url` has been made and accounted for.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.in_flight.remove(url);
        self.pending.remove(url);
        self.visited.insert(url.to_owned())
    }

    /// Drops a claim whose fetch never started. The URL is not rescheduled.
    pub fn release(&mut self, url: &str) {
        self.in_flight.remove(url);
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn pending_len(&self) -> usize {
        self.order.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Consumes the frontier. URLs still in flight (their worker never
    /// reported back) count as visited.
    pub fn into_visited(self) -> HashSet<String> {
        let mut visited = self.visited;
        visited.extend(self.in_flight);
        visited
    }
}
