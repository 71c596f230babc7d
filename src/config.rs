//! Strongly-typed configuration for extraction runs.
//!
//! Configuration values can be constructed from defaults, loaded from
//! environment variables (with optional `.env` support), or merged with
//! explicit overrides for ergonomic programmatic updates. The defaults mirror
//! the fixed launch literals of a one-shot scrape: headless, GPU disabled,
//! a 1920x1080 window.

use std::env;
use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;

use dotenvy::dotenv;
use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde::ser::{Serialize, Serializer};
use serde::{Deserialize as DeriveDeserialize, Serialize as DeriveSerialize};
use thiserror::Error;

use crate::logging::LogCallback;

/// Verbosity level for run logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Minimal,
    Medium,
    Detailed,
}

impl Verbosity {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Verbosity::Minimal => 0,
            Verbosity::Medium => 1,
            Verbosity::Detailed => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Verbosity::Minimal),
            1 => Some(Verbosity::Medium),
            2 => Some(Verbosity::Detailed),
            _ => None,
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Medium
    }
}

impl Serialize for Verbosity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Verbosity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Verbosity::from_u8(value).ok_or_else(|| {
            DeError::custom(format!(
                "invalid verbosity value {value}; expected 0, 1, or 2"
            ))
        })
    }
}

/// Browser window dimensions, applied both as the launch argument and the
/// emulated viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveSerialize, DeriveDeserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        WindowSize {
            width: 1920,
            height: 1080,
        }
    }
}

impl WindowSize {
    /// Parse a `WIDTHxHEIGHT` string such as `1920x1080`.
    fn parse(value: &str) -> Option<Self> {
        let (w, h) = value.trim().split_once(['x', 'X'])?;
        Some(WindowSize {
            width: w.trim().parse().ok()?,
            height: h.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration values for the extractor.
#[derive(DeriveSerialize, DeriveDeserialize, Clone)]
#[serde(default)]
pub struct GleanerConfig {
    pub headless: bool,
    #[serde(alias = "disableGpu")]
    pub disable_gpu: bool,
    #[serde(alias = "windowSize")]
    pub window_size: WindowSize,
    #[serde(alias = "chromeExecutable")]
    pub chrome_executable: Option<PathBuf>,
    #[serde(alias = "extraArgs")]
    pub extra_args: Vec<String>,
    pub verbose: Verbosity,
    #[serde(skip_serializing, skip_deserializing)]
    pub logger: Option<LogCallback>,
}

impl Default for GleanerConfig {
    fn default() -> Self {
        GleanerConfig {
            headless: true,
            disable_gpu: true,
            window_size: WindowSize::default(),
            chrome_executable: None,
            extra_args: Vec::new(),
            verbose: Verbosity::default(),
            logger: None,
        }
    }
}

impl GleanerConfig {
    /// Construct a configuration by reading relevant environment variables,
    /// after loading a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();
        let mut config = GleanerConfig::default();

        if let Some(value) = env_var("GLEANER_HEADLESS") {
            config.headless = parse_bool("GLEANER_HEADLESS", &value)?;
        }

        if let Some(value) = env_var("GLEANER_DISABLE_GPU") {
            config.disable_gpu = parse_bool("GLEANER_DISABLE_GPU", &value)?;
        }

        if let Some(value) = env_var("GLEANER_WINDOW_SIZE") {
            config.window_size =
                WindowSize::parse(&value).ok_or(ConfigError::InvalidWindowSize { value })?;
        }

        if let Some(value) = env_var("GLEANER_CHROME_BIN") {
            config.chrome_executable = Some(PathBuf::from(value));
        }

        if let Some(value) = env_var("GLEANER_EXTRA_ARGS") {
            config.extra_args = value
                .split_whitespace()
                .map(|arg| arg.to_string())
                .collect();
        }

        if let Some(value) = env_var("GLEANER_VERBOSE") {
            let parsed = parse_u8("GLEANER_VERBOSE", &value)?;
            config.verbose =
                Verbosity::from_u8(parsed).ok_or_else(|| ConfigError::InvalidEnumVariant {
                    field: "GLEANER_VERBOSE",
                    value: parsed.to_string(),
                })?;
        }

        Ok(config)
    }

    /// Create a new configuration with explicit field overrides applied.
    pub fn with_overrides(&self, overrides: GleanerConfigOverrides) -> GleanerConfig {
        let mut next = self.clone();

        if let Some(value) = overrides.headless {
            next.headless = value;
        }
        if let Some(value) = overrides.disable_gpu {
            next.disable_gpu = value;
        }
        if let Some(value) = overrides.window_size {
            next.window_size = value;
        }
        if let Some(value) = overrides.chrome_executable {
            next.chrome_executable = value;
        }
        if let Some(value) = overrides.extra_args {
            next.extra_args = value;
        }
        if let Some(value) = overrides.verbose {
            next.verbose = value;
        }
        if let Some(value) = overrides.logger {
            next.logger = value;
        }

        next
    }
}

/// Field-level overrides for [`GleanerConfig::with_overrides`].
#[derive(Default, Clone)]
pub struct GleanerConfigOverrides {
    pub headless: Option<bool>,
    pub disable_gpu: Option<bool>,
    pub window_size: Option<WindowSize>,
    pub chrome_executable: Option<Option<PathBuf>>,
    pub extra_args: Option<Vec<String>>,
    pub verbose: Option<Verbosity>,
    pub logger: Option<Option<LogCallback>>,
}

impl GleanerConfigOverrides {
    /// Builder-style helper to set the `headless` override.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Builder-style helper to set the `chrome_executable` override.
    pub fn chrome_executable<T: Into<Option<PathBuf>>>(mut self, path: T) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    /// Builder-style helper to set the `verbose` override.
    pub fn verbose(mut self, verbose: Verbosity) -> Self {
        self.verbose = Some(verbose);
        self
    }
}

impl fmt::Debug for GleanerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GleanerConfig")
            .field("headless", &self.headless)
            .field("disable_gpu", &self.disable_gpu)
            .field("window_size", &self.window_size)
            .field("chrome_executable", &self.chrome_executable)
            .field("extra_args", &self.extra_args)
            .field("verbose", &self.verbose)
            .field("logger_present", &self.logger.is_some())
            .finish()
    }
}

impl fmt::Debug for GleanerConfigOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GleanerConfigOverrides")
            .field("headless", &self.headless)
            .field("disable_gpu", &self.disable_gpu)
            .field("window_size", &self.window_size)
            .field("chrome_executable", &self.chrome_executable)
            .field("extra_args", &self.extra_args)
            .field("verbose", &self.verbose)
            .field("logger", &self.logger.as_ref().map(|inner| inner.is_some()))
            .finish()
    }
}

/// Errors that can arise while constructing a [`GleanerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {field}")]
    InvalidEnumVariant { field: &'static str, value: String },
    #[error("invalid boolean '{value}' for {field}")]
    InvalidBool { field: &'static str, value: String },
    #[error("invalid number '{value}' for {field}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid window size '{value}'; expected WIDTHxHEIGHT")]
    InvalidWindowSize { value: String },
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, ConfigError> {
    value
        .trim()
        .parse::<u8>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[derive(Debug)]
    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(vars: &[(&str, Option<&str>)]) -> Self {
            let saved = vars
                .iter()
                .map(|(key, value)| {
                    let original = env::var(key).ok();
                    match value {
                        Some(v) => unsafe {
                            env::set_var(key, v);
                        },
                        None => unsafe {
                            env::remove_var(key);
                        },
                    };
                    ((*key).to_string(), original)
                })
                .collect();
            EnvGuard { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => unsafe {
                        env::set_var(&key, v);
                    },
                    None => unsafe {
                        env::remove_var(&key);
                    },
                }
            }
        }
    }

    fn with_env<F, T>(vars: &[(&str, Option<&str>)], f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let lock = env_lock().lock().expect("env mutex poisoned");
        let guard = EnvGuard::new(vars);
        let result = f();
        drop(guard);
        drop(lock);
        result
    }

    #[test]
    fn defaults_match_one_shot_launch_literals() {
        let config = GleanerConfig::default();
        assert!(config.headless);
        assert!(config.disable_gpu);
        assert_eq!(config.window_size, WindowSize::default());
        assert_eq!(config.window_size.to_string(), "1920x1080");
        assert!(config.chrome_executable.is_none());
        assert!(config.extra_args.is_empty());
        assert_eq!(config.verbose, Verbosity::Medium);
    }

    #[test]
    fn from_env_parses_and_normalises_values() {
        let vars = [
            ("GLEANER_HEADLESS", Some("false")),
            ("GLEANER_DISABLE_GPU", Some("no")),
            ("GLEANER_WINDOW_SIZE", Some("1280x720")),
            ("GLEANER_CHROME_BIN", Some("/usr/bin/chromium")),
            ("GLEANER_EXTRA_ARGS", Some("--lang=en-US --no-first-run")),
            ("GLEANER_VERBOSE", Some("2")),
        ];

        with_env(&vars, || {
            let config = GleanerConfig::from_env().expect("config from env");
            assert!(!config.headless);
            assert!(!config.disable_gpu);
            assert_eq!(
                config.window_size,
                WindowSize {
                    width: 1280,
                    height: 720
                }
            );
            assert_eq!(
                config.chrome_executable.as_deref(),
                Some(std::path::Path::new("/usr/bin/chromium"))
            );
            assert_eq!(config.extra_args, vec!["--lang=en-US", "--no-first-run"]);
            assert_eq!(config.verbose, Verbosity::Detailed);
        });
    }

    #[test]
    fn from_env_rejects_bad_window_size() {
        with_env(&[("GLEANER_WINDOW_SIZE", Some("huge"))], || {
            let err = GleanerConfig::from_env().expect_err("should reject");
            assert!(err.to_string().contains("invalid window size"));
        });
    }

    #[test]
    fn overrides_support_setting_values_to_none() {
        let base = GleanerConfig {
            chrome_executable: Some(PathBuf::from("/opt/chrome")),
            ..GleanerConfig::default()
        };
        let overrides = GleanerConfigOverrides::default()
            .headless(false)
            .chrome_executable(None);

        let updated = base.with_overrides(overrides);
        assert!(!updated.headless);
        assert!(updated.chrome_executable.is_none());
        assert!(updated.disable_gpu);
    }
}
