//! Shared test helpers: a scripted command executor and ready-made cluster
//! fixtures. Only compiled for tests.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::exec::CommandExecutor;
use crate::exec::ExecOptions;
use crate::exec::ExecOutcome;
use crate::topology::Cluster;
use crate::topology::HostId;
use crate::topology::ProtocolVersion;
use crate::EventConfig;
use crate::HarnessConfig;
use crate::Result;
use crate::Settings;

/// One command as the executor received it.
#[derive(Debug, Clone)]
pub struct IssuedCommand {
    pub host: String,
    pub argv: Vec<String>,
    pub stdin: Option<String>,
}

impl IssuedCommand {
    pub fn joined(&self) -> String {
        self.argv.join(" ")
    }
}

/// What a scripted rule makes the executor do.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub status: i32,
    pub stdout: String,
    /// Event lines appended to the issuing host's stream file, simulating
    /// the state changes the command would cause.
    pub events: Vec<String>,
}

impl Reaction {
    pub fn ok() -> Self {
        Self {
            status: 0,
            stdout: String::new(),
            events: Vec::new(),
        }
    }

    pub fn ok_with_events(lines: &[&str]) -> Self {
        Self {
            events: lines.iter().map(|l| l.to_string()).collect(),
            ..Self::ok()
        }
    }

    pub fn fail(status: i32) -> Self {
        Self {
            status,
            ..Self::ok()
        }
    }
}

struct Rule {
    needle: String,
    reaction: Reaction,
}

struct Inner {
    log_dir: PathBuf,
    issued: Mutex<Vec<IssuedCommand>>,
    rules: Mutex<Vec<Rule>>,
}

/// In-process stand-in for the remote transport. Commands succeed by
/// default; `script` installs reactions matched by substring against the
/// joined argv, first match wins.
#[derive(Clone)]
pub struct ScriptedExecutor {
    inner: Arc<Inner>,
}

impl ScriptedExecutor {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                log_dir: log_dir.into(),
                issued: Mutex::new(Vec::new()),
                rules: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn script(&self, needle: &str, reaction: Reaction) {
        self.inner.rules.lock().push(Rule {
            needle: needle.to_string(),
            reaction,
        });
    }

    pub fn issued(&self) -> Vec<IssuedCommand> {
        self.inner.issued.lock().clone()
    }

    pub fn issued_on(&self, host: &str) -> Vec<IssuedCommand> {
        self.issued().into_iter().filter(|c| c.host == host).collect()
    }

    /// Append raw lines to one host's event stream, simulating events that
    /// arrive independently of any command.
    pub fn emit(&self, host: &str, lines: &[&str]) {
        append_events(&self.inner.log_dir, host, lines);
    }

    pub fn events_path(&self, host: &str) -> PathBuf {
        self.inner
            .log_dir
            .join(format!("{}{}", crate::constants::EVENTS_FILE_PREFIX, host))
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, host: &str, argv: &[String], options: &ExecOptions) -> Result<ExecOutcome> {
        self.inner.issued.lock().push(IssuedCommand {
            host: host.to_string(),
            argv: argv.to_vec(),
            stdin: options.stdin.clone(),
        });

        let joined = argv.join(" ");
        let rules = self.inner.rules.lock();
        let reaction = rules
            .iter()
            .find(|r| joined.contains(&r.needle))
            .map(|r| r.reaction.clone())
            .unwrap_or_else(Reaction::ok);
        drop(rules);

        if !reaction.events.is_empty() {
            let lines: Vec<&str> = reaction.events.iter().map(String::as_str).collect();
            append_events(&self.inner.log_dir, host, &lines);
        }
        Ok(ExecOutcome {
            status: reaction.status,
            stdout: reaction.stdout,
        })
    }
}

pub fn append_events(log_dir: &Path, host: &str, lines: &[&str]) {
    let path = log_dir.join(format!("{}{}", crate::constants::EVENTS_FILE_PREFIX, host));
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
}

/// A cluster wired to a [`ScriptedExecutor`], with the temporary log
/// directory kept alive for the test's duration.
pub struct TestCluster {
    pub cluster: Cluster,
    pub exec: ScriptedExecutor,
    pub hosts: Vec<HostId>,
    _dir: TempDir,
}

pub fn test_settings(dir: &TempDir) -> Settings {
    Settings {
        harness: HarnessConfig {
            log_dir: dir.path().join("log"),
            ..Default::default()
        },
        events: EventConfig {
            default_timeout_secs: 2,
            poll_interval_ms: 5,
        },
    }
}

/// Two modern hosts "alpha" and "beta", event streams seeded with their
/// initial state dump markers and already consumed.
pub fn two_node_cluster() -> TestCluster {
    cluster_with_hosts(&[
        ("alpha", ProtocolVersion(9, 1, 0)),
        ("beta", ProtocolVersion(9, 1, 0)),
    ])
}

pub fn cluster_with_hosts(specs: &[(&str, ProtocolVersion)]) -> TestCluster {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir);
    let log_dir = settings.harness.log_dir.clone();
    std::fs::create_dir_all(&log_dir).unwrap();

    let exec = ScriptedExecutor::new(&log_dir);
    let mut cluster = Cluster::new(settings, Box::new(exec.clone())).unwrap();

    let mut hosts = Vec::new();
    for (index, (name, protocol)) in specs.iter().enumerate() {
        let address = format!("192.168.100.{}", index + 1);
        hosts.push(cluster.add_host(*name, address, *protocol).unwrap());
        append_events(&log_dir, name, &["exists -"]);
    }
    cluster.listen_to_events().unwrap();

    TestCluster {
        cluster,
        exec,
        hosts,
        _dir: dir,
    }
}
