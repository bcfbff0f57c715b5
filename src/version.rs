//! Server version probing and comparison.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, error};

use crate::errors::{AppError, Result};
use crate::store::{SettingsStore, Store};

/// Settings key that replaces the server-reported version string.
pub const VERSION_OVERRIDE_SETTING: &str = "DBMSVersionOverride";

/// Value an unknown component contributes to a comparison difference.
const UNKNOWN_COMPONENT: i64 = -1;

fn digit_groups() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// `(major, minor, point)` parsed from one version string. `None` is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub major: Option<u32>,
    pub minor: Option<u32>,
    pub point: Option<u32>,
}

impl VersionInfo {
    /// Takes the first three runs of digits, left to right. A run that does not
    /// fit a `u32` is unknown rather than truncated.
    pub fn parse(raw: &str) -> Self {
        let mut components = digit_groups()
            .find_iter(raw)
            .take(3)
            .map(|group| group.as_str().parse::<u32>().ok());

        Self {
            major: components.next().flatten(),
            minor: components.next().flatten(),
            point: components.next().flatten(),
        }
    }

    /// Like [`parse`](Self::parse), but a string without any version number is an error.
    pub fn parse_known(raw: &str) -> Result<Self> {
        let info = Self::parse(raw);
        if info.is_known() {
            Ok(info)
        } else {
            Err(AppError::ParseAmbiguous(format!(
                "no version number in DBMS version string '{}'",
                raw
            )))
        }
    }

    pub fn is_known(&self) -> bool {
        self.major.is_some()
    }

    /// Signed difference at the first differing component, or 0.
    ///
    /// A component that is unknown here and requested as exactly 0 is skipped,
    /// so `compare(10, 3, 0)` matches a bare "10.3".
    pub fn compare(&self, major: i64, minor: i64, point: i64) -> i64 {
        let have = [self.major, self.minor, self.point];
        let want = [major, minor, point];

        for (component, requested) in have.into_iter().zip(want) {
            if component.is_none() && requested == 0 {
                continue;
            }
            let difference = component.map_or(UNKNOWN_COMPONENT, i64::from) - requested;
            if difference != 0 {
                return difference;
            }
        }
        0
    }
}

/// Memoized server version for one coordinator.
#[derive(Debug, Default)]
pub struct VersionProbe {
    version: String,
    parsed: Option<VersionInfo>,
}

impl VersionProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// The server version string, querying it when nothing is cached yet.
    /// An empty answer is cached as empty, so the next call probes again.
    pub async fn version_string(
        &mut self,
        store: &dyn Store,
        settings: &dyn SettingsStore,
    ) -> String {
        if self.version.is_empty() {
            self.query_version(store, settings).await;
        }
        self.version.clone()
    }

    /// Compares the server version with `major.minor.point`.
    ///
    /// Returns `None` when the version cannot be determined.
    pub async fn compare(
        &mut self,
        store: &dyn Store,
        settings: &dyn SettingsStore,
        major: i64,
        minor: i64,
        point: i64,
    ) -> Option<i64> {
        let info = match self.parsed.filter(VersionInfo::is_known) {
            Some(info) => info,
            None => self.parse(store, settings).await?,
        };
        Some(info.compare(major, minor, point))
    }

    /// Forgets the cached string and components.
    pub fn reprobe(&mut self) {
        self.version.clear();
        self.parsed = None;
    }

    async fn parse(
        &mut self,
        store: &dyn Store,
        settings: &dyn SettingsStore,
    ) -> Option<VersionInfo> {
        if self.version.is_empty() && !self.query_version(store, settings).await {
            self.parsed = None;
            return None;
        }

        // Replaced as a whole: no component survives from an earlier parse
        match VersionInfo::parse_known(&self.version) {
            Ok(info) => {
                self.parsed = Some(info);
                Some(info)
            }
            Err(e) => {
                self.parsed = Some(VersionInfo::default());
                debug!("{}", e);
                None
            }
        }
    }

    async fn query_version(&mut self, store: &dyn Store, settings: &dyn SettingsStore) -> bool {
        // Servers built with a mangled version string can be overridden
        if let Some(version) = settings
            .get_setting(VERSION_OVERRIDE_SETTING)
            .await
            .filter(|v| !v.is_empty())
        {
            debug!(version = %version, "Using DBMS version override");
            self.version = version;
            return true;
        }

        self.version = match store.query_rows("SELECT VERSION() AS version;", &["version"]).await {
            Ok(rows) => rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next().flatten())
                .unwrap_or_default(),
            Err(e) => {
                error!("Unable to determine MySQL version: {}", e);
                String::new()
            }
        };
        !self.version.is_empty()
    }
}
