//! The event-wait state machine.
//!
//! A wait blocks until every (entity, required-pattern) combination implied
//! by the input collection has matched in the per-host event streams, fails
//! immediately when a forbidden pattern appears, and fails with the partial
//! match state when the deadline passes. On success each entity's read
//! position lands just past its last matched line, so repeated waits never
//! rematch a consumed event while later lines stay available to waits on
//! other entity classes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use regex::Regex;
use tracing::debug;
use tracing::trace;

use crate::events::EventFilter;
use crate::events::EventStream;
use crate::events::PositionKey;
use crate::events::PositionStore;
use crate::topology::EntityClass;
use crate::EventError;
use crate::Result;

/// One entity's scope within a wait: which host stream to scan and which
/// lines in it pertain to the entity.
#[derive(Debug, Clone)]
pub struct WaitTarget {
    pub host: String,
    pub label: String,
    pub filter: EventFilter,
}

/// A full wait invocation.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    pub class: EntityClass,
    pub targets: Vec<WaitTarget>,
    /// Every pattern must match at least once per target.
    pub required: Vec<String>,
    /// Forbidden patterns that are acceptable for the duration of this wait.
    pub suppressed: Vec<String>,
    pub timeout: Option<Duration>,
    /// Anchor patterns at word starts. Disabled only for raw markers.
    pub word_boundary: bool,
}

impl WaitSpec {
    pub fn new(class: EntityClass, targets: Vec<WaitTarget>, required: Vec<String>) -> Self {
        Self {
            class,
            targets,
            required,
            suppressed: Vec::new(),
            timeout: None,
            word_boundary: true,
        }
    }
}

/// One satisfied required pattern: the full set of capture groups, in
/// stream order, for assertions beyond pure presence.
#[derive(Debug, Clone)]
pub struct EventMatch {
    pub host: String,
    pub entity: String,
    /// Index into the wait's required-pattern list.
    pub pattern: usize,
    /// Capture groups including the whole match at index 0; groups that did
    /// not participate are empty.
    pub captures: Vec<String>,
    pub line: String,
}

pub struct EventTracker {
    streams: HashMap<String, EventStream>,
    positions: PositionStore,
    last_class: Option<EntityClass>,
    default_timeout: Duration,
    poll_interval: Duration,
}

impl EventTracker {
    pub fn new(
        positions_dir: impl Into<PathBuf>,
        default_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        Ok(Self {
            streams: HashMap::new(),
            positions: PositionStore::open(positions_dir)?,
            last_class: None,
            default_timeout,
            poll_interval,
        })
    }

    /// Register (or replace) the event stream file of one host.
    pub fn register_stream(&mut self, host: impl Into<String>, path: impl Into<PathBuf>) {
        let host = host.into();
        self.streams.insert(host, EventStream::new(path));
    }

    pub fn has_stream(&self, host: &str) -> bool {
        self.streams.contains_key(host)
    }

    /// Block until the wait resolves. See the module docs for the state
    /// machine; `forbidden` is the owning resource's forbidden set, from
    /// which the wait's suppressed patterns are subtracted.
    pub fn wait(&mut self, spec: &WaitSpec, forbidden: &[String]) -> Result<Vec<EventMatch>> {
        if spec.targets.is_empty() {
            return Ok(Vec::new());
        }
        for target in &spec.targets {
            if !self.streams.contains_key(&target.host) {
                return Err(EventError::StreamMissing(target.host.clone()).into());
            }
        }

        let required = compile_all(&spec.required, spec.word_boundary)?;
        let active_forbidden: Vec<&String> = forbidden
            .iter()
            .filter(|p| !spec.suppressed.iter().any(|s| s == *p))
            .collect();
        let forbidden_res: Vec<(String, Regex)> = active_forbidden
            .iter()
            .map(|p| compile(p, true).map(|re| ((*p).clone(), re)))
            .collect::<std::result::Result<_, _>>()?;

        // Re-base positions when the waited-on entity class changed since
        // the previous wait, so lines consumed under another class are not
        // double-counted.
        if self.last_class != Some(spec.class) {
            let mut hosts: Vec<&str> = spec.targets.iter().map(|t| t.host.as_str()).collect();
            hosts.sort_unstable();
            hosts.dedup();
            for host in hosts {
                self.positions.rebase_class(host, spec.class);
            }
            self.last_class = Some(spec.class);
        }

        let keys: Vec<PositionKey> = spec
            .targets
            .iter()
            .map(|t| PositionKey {
                host: t.host.clone(),
                class: spec.class,
                label: t.label.clone(),
            })
            .collect();
        for key in &keys {
            self.positions.ensure(key);
        }

        let timeout = spec.timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();
        let mut satisfied = vec![vec![false; required.len()]; spec.targets.len()];
        // Per target, the absolute position just past its last matched line.
        let mut match_high = vec![0usize; spec.targets.len()];
        let mut matches: Vec<EventMatch> = Vec::new();

        debug!(
            class = %spec.class,
            targets = spec.targets.len(),
            required = ?spec.required,
            "waiting for events"
        );

        loop {
            let mut hosts: Vec<&str> = spec.targets.iter().map(|t| t.host.as_str()).collect();
            hosts.sort_unstable();
            hosts.dedup();
            for host in hosts {
                if let Some(stream) = self.streams.get_mut(host) {
                    stream.refresh()?;
                }
            }

            for (t_index, target) in spec.targets.iter().enumerate() {
                let from = self.positions.get(&keys[t_index]);
                let lines: Vec<String> = {
                    let stream = &self.streams[&target.host];
                    stream.lines().get(from..).unwrap_or(&[]).to_vec()
                };

                for (offset, line) in lines.iter().enumerate() {
                    // Forbidden detection takes priority over any required
                    // match still pending on this or any other line.
                    for (pattern, re) in &forbidden_res {
                        if re.is_match(line) {
                            self.positions.advance(&keys[t_index], from + offset + 1);
                            return Err(EventError::ForbiddenPattern {
                                host: target.host.clone(),
                                pattern: pattern.clone(),
                                line: line.clone(),
                            }
                            .into());
                        }
                    }

                    if !target.filter.matches(line) {
                        continue;
                    }
                    for (p_index, re) in required.iter().enumerate() {
                        if satisfied[t_index][p_index] {
                            continue;
                        }
                        if let Some(caps) = re.captures(line) {
                            trace!(host = target.host, entity = target.label, line, "matched");
                            satisfied[t_index][p_index] = true;
                            match_high[t_index] = match_high[t_index].max(from + offset + 1);
                            matches.push(EventMatch {
                                host: target.host.clone(),
                                entity: target.label.clone(),
                                pattern: p_index,
                                captures: caps
                                    .iter()
                                    .map(|g| g.map(|m| m.as_str().to_string()).unwrap_or_default())
                                    .collect(),
                                line: line.clone(),
                            });
                        }
                    }
                }
            }

            if satisfied.iter().all(|per_target| per_target.iter().all(|s| *s)) {
                // Only a successful wait consumes input, and only up to each
                // entity's last matched line; unmatched tails stay readable
                // for waits scoped to other entities or classes.
                for (t_index, key) in keys.iter().enumerate() {
                    self.positions.advance(key, match_high[t_index]);
                }
                return Ok(matches);
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                let missing = missing_cells(spec, &satisfied);
                return Err(EventError::Timeout { elapsed, missing }.into());
            }
            std::thread::sleep(self.poll_interval.min(timeout - elapsed));
        }
    }
}

fn compile(pattern: &str, word_boundary: bool) -> std::result::Result<Regex, EventError> {
    let effective = if word_boundary {
        format!(r"(?:^|\s)(?:{})", pattern)
    } else {
        pattern.to_string()
    };
    Regex::new(&effective).map_err(|source| EventError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_all(patterns: &[String], word_boundary: bool) -> std::result::Result<Vec<Regex>, EventError> {
    patterns.iter().map(|p| compile(p, word_boundary)).collect()
}

fn missing_cells(spec: &WaitSpec, satisfied: &[Vec<bool>]) -> Vec<String> {
    let mut missing = Vec::new();
    for (t_index, target) in spec.targets.iter().enumerate() {
        for (p_index, pattern) in spec.required.iter().enumerate() {
            if !satisfied[t_index][p_index] {
                missing.push(format!("{} ~ /{}/", target.label, pattern));
            }
        }
    }
    missing
}
