use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Application configuration, loaded once at startup from `ledgerwatch.toml`
/// (path overridable via LEDGERWATCH_CONFIG). Missing file means defaults.
/// Nothing re-reads this at runtime; handlers receive the parsed struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: Option<PathBuf>,
    pub http: HttpConfig,
    pub scheduler: SchedulerConfig,
    pub evaluators: EvaluatorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Master switch. When false, execute_if_due() always denies with "disabled".
    pub enabled: bool,
    /// Start the interval timer automatically at boot.
    pub autostart: bool,
    /// Timer period for the periodic loop.
    pub interval_minutes: u32,
    /// Minimum spacing between executions, enforced for the timer and for
    /// opportunistic ticks alike.
    pub min_interval_minutes: u32,
    /// Hard daily cap on executions, counted across timer, opportunistic and
    /// manual runs. Resets at local midnight.
    pub max_executions_per_day: u32,
    /// A user counts as active when they have transactions within this window.
    pub active_user_window_days: u32,
    /// Upper bound for one full orchestrator pass.
    pub run_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorsConfig {
    pub budget: BudgetEvaluatorConfig,
    pub loan: LoanEvaluatorConfig,
    pub investment: InvestmentEvaluatorConfig,
    pub obligation: ObligationEvaluatorConfig,
    pub task: TaskEvaluatorConfig,
    pub anomaly: AnomalyEvaluatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetEvaluatorConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanEvaluatorConfig {
    pub enabled: bool,
    /// Days ahead of the next installment date at which an alert fires.
    pub lookahead_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestmentEvaluatorConfig {
    pub enabled: bool,
    pub lookahead_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObligationEvaluatorConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskEvaluatorConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyEvaluatorConfig {
    pub enabled: bool,
    /// Flag a transaction above mean + k·stddev of its category history.
    pub stddev_multiplier: f64,
    /// Escalate to HIGH above this many stddevs. Deliberately well above the
    /// flag threshold so ordinary outliers stay MEDIUM.
    pub escalation_multiplier: f64,
    /// Trailing window the category statistics are computed over.
    pub window_days: i64,
    /// Minimum prior transactions in a category before it can be flagged.
    pub min_samples: usize,
    /// Only transactions this recent are candidates for flagging; anything
    /// older contributes history only. Evaluation passes run at least daily,
    /// so every transaction is examined while still inside this window, and
    /// spending older than it never generates a fresh alert.
    pub recent_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            http: HttpConfig::default(),
            scheduler: SchedulerConfig::default(),
            evaluators: EvaluatorsConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 9430 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            autostart: true,
            interval_minutes: 60,
            min_interval_minutes: 60,
            max_executions_per_day: 24,
            active_user_window_days: 7,
            run_timeout_seconds: 120,
        }
    }
}

impl Default for EvaluatorsConfig {
    fn default() -> Self {
        Self {
            budget: BudgetEvaluatorConfig::default(),
            loan: LoanEvaluatorConfig::default(),
            investment: InvestmentEvaluatorConfig::default(),
            obligation: ObligationEvaluatorConfig::default(),
            task: TaskEvaluatorConfig::default(),
            anomaly: AnomalyEvaluatorConfig::default(),
        }
    }
}

impl Default for BudgetEvaluatorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoanEvaluatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookahead_days: 3,
        }
    }
}

impl Default for InvestmentEvaluatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookahead_days: 7,
        }
    }
}

impl Default for ObligationEvaluatorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for TaskEvaluatorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for AnomalyEvaluatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stddev_multiplier: 2.0,
            escalation_multiplier: 6.0,
            window_days: 90,
            min_samples: 5,
            recent_days: 3,
        }
    }
}

impl AppConfig {
    /// Load from the given path, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            let cfg = Self::default();
            cfg.validate()?;
            return Ok(cfg);
        }
        let content = std::fs::read_to_string(path)?;
        let cfg: AppConfig = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        tracing::info!(path = %path.display(), "Config loaded");
        Ok(cfg)
    }

    /// Resolve the config path: LEDGERWATCH_CONFIG env var, else ./ledgerwatch.toml.
    pub fn default_path() -> PathBuf {
        std::env::var("LEDGERWATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("ledgerwatch.toml"))
    }

    /// Directory for the SQLite database: configured data_dir, else the
    /// platform data dir, else the current directory.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("ledgerwatch"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let s = &self.scheduler;
        if s.interval_minutes == 0 {
            return Err(AppError::Config("scheduler.interval_minutes must be >= 1".into()));
        }
        if s.max_executions_per_day == 0 {
            return Err(AppError::Config(
                "scheduler.max_executions_per_day must be >= 1".into(),
            ));
        }
        let a = &self.evaluators.anomaly;
        if a.stddev_multiplier <= 0.0 || a.escalation_multiplier < a.stddev_multiplier {
            return Err(AppError::Config(
                "evaluators.anomaly multipliers must be positive and escalation >= base".into(),
            ));
        }
        if self.evaluators.loan.lookahead_days < 0 || self.evaluators.investment.lookahead_days < 0
        {
            return Err(AppError::Config("evaluator lookahead_days must be >= 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.scheduler.max_executions_per_day, 24);
        assert_eq!(cfg.scheduler.min_interval_minutes, 60);
        assert_eq!(cfg.evaluators.loan.lookahead_days, 3);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = AppConfig::load(Path::new("/nonexistent/ledgerwatch.toml")).unwrap();
        assert_eq!(cfg.http.port, 9430);
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerwatch.toml");
        std::fs::write(
            &path,
            "[scheduler]\nmax_executions_per_day = 12\n\n[evaluators.anomaly]\nmin_samples = 10\n",
        )
        .unwrap();
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.scheduler.max_executions_per_day, 12);
        assert_eq!(cfg.evaluators.anomaly.min_samples, 10);
        // untouched sections keep defaults
        assert_eq!(cfg.scheduler.interval_minutes, 60);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerwatch.toml");
        std::fs::write(&path, "[scheduler]\ninterval_minutes = 0\n").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(AppError::Config(_))));
    }
}
