//! In-memory endpoint for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::endpoint::{Endpoint, FailureKind, Transactional, TransactionSettings};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("query error: {0}")]
    Query(String),
}

pub struct MockTx {
    pub settings: TransactionSettings,
    pub statements: Vec<String>,
}

pub struct MockEndpoint {
    name: &'static str,
    down: AtomicBool,
    delay: Mutex<Duration>,
    begin_delay: Mutex<Duration>,
    commit_delay: Mutex<Duration>,
    panic_on_execute: AtomicBool,
    calls: AtomicUsize,
    /// Outcomes consumed by the next calls, before `down` is consulted
    script: Mutex<VecDeque<Result<(), MockError>>>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    last_settings: Mutex<Option<TransactionSettings>>,
}

impl MockEndpoint {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            down: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            begin_delay: Mutex::new(Duration::ZERO),
            commit_delay: Mutex::new(Duration::ZERO),
            panic_on_execute: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            begins: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
            last_settings: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Stall `begin` before it answers
    pub fn set_begin_delay(&self, delay: Duration) {
        *self.begin_delay.lock() = delay;
    }

    /// Stall `commit` before it answers
    pub fn set_commit_delay(&self, delay: Duration) {
        *self.commit_delay.lock() = delay;
    }

    /// Make `execute` panic after counting the call
    pub fn set_panic(&self, panic: bool) {
        self.panic_on_execute.store(panic, Ordering::SeqCst);
    }

    pub fn push_outcome(&self, outcome: Result<(), MockError>) {
        self.script.lock().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn last_settings(&self) -> Option<TransactionSettings> {
        *self.last_settings.lock()
    }

    fn check(&self) -> Result<(), MockError> {
        if let Some(outcome) = self.script.lock().pop_front() {
            return outcome;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(MockError::ConnectionRefused);
        }
        Ok(())
    }
}

#[async_trait]
impl Endpoint for MockEndpoint {
    type Query = String;
    type Output = String;
    type Error = MockError;

    async fn execute(&self, query: &String) -> Result<String, MockError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_execute.load(Ordering::SeqCst) {
            panic!("{} driver crashed", self.name);
        }
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        Ok(format!("{}:{}", self.name, query))
    }

    fn probe_query(&self) -> String {
        "SELECT 1".to_string()
    }

    fn classify(error: &MockError) -> FailureKind {
        match error {
            MockError::ConnectionRefused => FailureKind::Connection,
            MockError::Query(_) => FailureKind::Query,
        }
    }
}

#[async_trait]
impl Transactional for MockEndpoint {
    type Tx = MockTx;

    async fn begin(&self, settings: &TransactionSettings) -> Result<MockTx, MockError> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        *self.last_settings.lock() = Some(*settings);
        let delay = *self.begin_delay.lock();
        stall(delay).await;
        if self.down.load(Ordering::SeqCst) {
            return Err(MockError::ConnectionRefused);
        }
        Ok(MockTx {
            settings: *settings,
            statements: Vec::new(),
        })
    }

    async fn commit(&self, _tx: MockTx) -> Result<(), MockError> {
        let delay = *self.commit_delay.lock();
        stall(delay).await;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, _tx: MockTx) -> Result<(), MockError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn stall(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
