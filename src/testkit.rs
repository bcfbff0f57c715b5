//! Scripted stand-ins for the store, settings, process and directory collaborators.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::DatabaseParams;
use crate::errors::{AppError, Result};
use crate::process::{CommandSpec, EXIT_OK, ProcessRunner};
use crate::store::{SettingsStore, Store, TextRow};
use crate::utils::directories::StorageDirectories;

pub fn test_params() -> DatabaseParams {
    DatabaseParams {
        host: "db.local".into(),
        port: 3306,
        user: "mythtv".into(),
        password: "s3cret".into(),
        name: "mythconverg".into(),
    }
}

pub fn text_row(values: &[&str]) -> TextRow {
    values.iter().map(|v| Some(v.to_string())).collect()
}

/// Records every statement and answers from canned rows keyed by statement prefix.
pub struct FakeStore {
    params: DatabaseParams,
    connected: bool,
    responses: Mutex<Vec<(String, VecDeque<Vec<TextRow>>)>>,
    failures: Mutex<Vec<String>>,
    statements: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            params: test_params(),
            connected: true,
            responses: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new()
        }
    }

    /// Queues `rows` as the answer for statements starting with `prefix`.
    /// The last queued answer repeats once the queue is drained.
    pub fn with_rows(self, prefix: &str, rows: Vec<TextRow>) -> Self {
        {
            let mut responses = self.responses.lock().unwrap();
            match responses.iter_mut().find(|(p, _)| p == prefix) {
                Some((_, queue)) => queue.push_back(rows),
                None => responses.push((prefix.to_string(), VecDeque::from([rows]))),
            }
        }
        self
    }

    pub fn with_tables(self, tables: &[&str]) -> Self {
        let rows = tables.iter().map(|t| text_row(&[t])).collect();
        self.with_rows("SELECT CONCAT(", rows)
    }

    /// Statements starting with `prefix` fail.
    pub fn fail_on(self, prefix: &str) -> Self {
        self.failures.lock().unwrap().push(prefix.to_string());
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn executed(&self) -> Vec<(String, Vec<String>)> {
        self.statements.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, binds: &[&str]) -> Result<()> {
        self.statements.lock().unwrap().push((
            sql.to_string(),
            binds.iter().map(|b| b.to_string()).collect(),
        ));
        if self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| sql.starts_with(prefix.as_str()))
        {
            return Err(AppError::query("Injected failure", sql));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn query_rows(&self, sql: &str, _columns: &[&str]) -> Result<Vec<TextRow>> {
        if !self.connected {
            return Err(AppError::ConnectionUnavailable("fake store offline".into()));
        }
        self.record(sql, &[])?;

        let mut responses = self.responses.lock().unwrap();
        let answer = responses
            .iter_mut()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, queue)| {
                if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                }
            });
        Ok(answer.unwrap_or_default())
    }

    async fn execute(&self, sql: &str, binds: &[&str]) -> Result<u64> {
        if !self.connected {
            return Err(AppError::ConnectionUnavailable("fake store offline".into()));
        }
        self.record(sql, binds)?;
        Ok(1)
    }

    fn params(&self) -> &DatabaseParams {
        &self.params
    }
}

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
    saves: Mutex<Vec<String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    /// Keys saved so far, in order.
    pub fn saved_keys(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get_setting(&self, key: &str) -> Option<String> {
        self.value(key)
    }

    async fn save_setting_on_host(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.saves.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

type RunHook = Box<dyn Fn(&CommandSpec) + Send + Sync>;

/// Records commands instead of running them.
///
/// Statuses are matched by a substring of the program path; unmatched programs exit 0.
#[derive(Default)]
pub struct ScriptedRunner {
    statuses: Vec<(String, i32)>,
    hooks: Vec<RunHook>,
    commands: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_for(mut self, program: &str, status: i32) -> Self {
        self.statuses.push((program.to_string(), status));
        self
    }

    /// Called with each command while it "runs".
    pub fn on_run(mut self, hook: impl Fn(&CommandSpec) + Send + Sync + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<i32> {
        self.commands.lock().unwrap().push(command.clone());
        for hook in &self.hooks {
            hook(command);
        }
        let program = command.program.display().to_string();
        Ok(self
            .statuses
            .iter()
            .find(|(name, _)| program.contains(name.as_str()))
            .map(|(_, status)| *status)
            .unwrap_or(EXIT_OK))
    }
}

/// Directory service answering with a fixed list; the first entry is "most free".
pub struct FixedDirectories(pub Vec<PathBuf>);

impl StorageDirectories for FixedDirectories {
    fn dir_list(&self, _purpose: &str) -> Vec<PathBuf> {
        self.0.clone()
    }

    fn most_free(&self, _purpose: &str) -> Option<PathBuf> {
        self.0.first().cloned()
    }
}
