//! In-memory repository that counts every remote call

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use ::common::remote::{DirectoryChild, DirectoryDetail, PathStat, RemoteError, Repository};
use hanafs::paths;

pub const TIMESTAMP_MS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone)]
pub enum FakeNode {
    File(Vec<u8>),
    /// Child names in listing order
    Dir(Vec<String>),
}

#[derive(Default)]
pub struct FakeRepo {
    tree: Mutex<HashMap<String, FakeNode>>,
    /// Files whose content reads fail with a 500
    unreadable: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    stat_calls: AtomicUsize,
    list_calls: AtomicUsize,
    read_calls: AtomicUsize,
    in_flight_reads: AtomicUsize,
    max_in_flight_reads: AtomicUsize,
}

impl FakeRepo {
    pub fn empty() -> Arc<Self> {
        let repo = Self::default();
        repo.insert("/", FakeNode::Dir(Vec::new()));
        Arc::new(repo)
    }

    /// `/pkg` holding `a.txt` ("hello world") and the empty directory `sub`
    pub fn with_package() -> Arc<Self> {
        let repo = Self::empty();
        repo.insert("/", FakeNode::Dir(vec!["pkg".into()]));
        repo.insert("/pkg", FakeNode::Dir(vec!["a.txt".into(), "sub".into()]));
        repo.insert("/pkg/a.txt", FakeNode::File(b"hello world".to_vec()));
        repo.insert("/pkg/sub", FakeNode::Dir(Vec::new()));
        repo
    }

    pub fn insert(&self, path: &str, node: FakeNode) {
        self.tree
            .lock()
            .unwrap()
            .insert(paths::normalize(path), node);
    }

    pub fn remove(&self, path: &str) {
        self.tree.lock().unwrap().remove(&paths::normalize(path));
    }

    pub fn make_unreadable(&self, path: &str) {
        self.unreadable.lock().unwrap().insert(paths::normalize(path));
    }

    pub fn delay_reads(&self, path: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(paths::normalize(path), delay);
    }

    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight_reads(&self) -> usize {
        self.max_in_flight_reads.load(Ordering::SeqCst)
    }

    fn node(&self, path: &str) -> Result<FakeNode, RemoteError> {
        self.tree
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    fn is_dir(&self, path: &str) -> bool {
        matches!(
            self.tree.lock().unwrap().get(path),
            Some(FakeNode::Dir(_))
        )
    }
}

#[async_trait]
impl Repository for FakeRepo {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight_reads.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_reads.fetch_max(in_flight, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight_reads.fetch_sub(1, Ordering::SeqCst);

        if self.unreadable.lock().unwrap().contains(path) {
            return Err(RemoteError::UnexpectedStatus {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                path: path.to_string(),
            });
        }
        match self.node(path)? {
            FakeNode::File(content) => Ok(content),
            FakeNode::Dir(_) => Ok(b"{}".to_vec()),
        }
    }

    async fn read_directory(&self, path: &str) -> Result<DirectoryDetail, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let FakeNode::Dir(names) = self.node(path)? else {
            return Err(RemoteError::UnexpectedStatus {
                status: StatusCode::BAD_REQUEST,
                path: path.to_string(),
            });
        };

        let children = names
            .into_iter()
            .map(|name| {
                let child = paths::join(path, &name);
                DirectoryChild {
                    directory: self.is_dir(&child),
                    content_location: format!("/sap/hana/xs/dt/base/file{child}"),
                    name,
                }
            })
            .collect();
        Ok(DirectoryDetail {
            name: paths::normalize(path),
            content_location: format!("/sap/hana/xs/dt/base/file{path}"),
            children,
        })
    }

    async fn stat(&self, path: &str) -> Result<PathStat, RemoteError> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        let stat = match self.node(path)? {
            FakeNode::Dir(_) => PathStat {
                directory: true,
                timestamp_ms: TIMESTAMP_MS,
                ..PathStat::default()
            },
            FakeNode::File(_) => PathStat {
                executable: true,
                activated: true,
                timestamp_ms: TIMESTAMP_MS,
                ..PathStat::default()
            },
        };
        Ok(stat)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
