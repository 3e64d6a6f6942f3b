//! Learner configuration

use super::callback::Callback;
use crate::io::ModelFormat;
use crate::optim::{HyperValue, OptimizerKind};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_lr() -> HyperValue {
    HyperValue::up_to(3e-3)
}

fn default_wd() -> f32 {
    1e-2
}

fn default_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_true() -> bool {
    true
}

fn default_smooth_beta() -> f32 {
    0.98
}

/// Construction-time settings of a [`super::Learner`]
///
/// ```yaml
/// lr: { stop: 0.003 }
/// wd: 0.01
/// opt:
///   type: adam
/// model_dir: checkpoints
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Learning rate used when `fit` is not given one
    #[serde(default = "default_lr")]
    pub lr: HyperValue,

    /// Weight decay used when `fit` is not given one
    #[serde(default = "default_wd")]
    pub wd: f32,

    /// Optimizer recipe
    #[serde(default)]
    pub opt: OptimizerKind,

    /// Base directory
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Checkpoint directory, relative to `path`
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Checkpoint format
    #[serde(default)]
    pub format: ModelFormat,

    /// Apply weight decay to normalisation and bias parameters
    #[serde(default)]
    pub wd_bn_bias: bool,

    /// Keep normalisation parameters trainable in frozen groups
    #[serde(default = "default_true")]
    pub train_bn: bool,

    /// Append the epoch duration to each logged row
    #[serde(default = "default_true")]
    pub add_time: bool,

    /// Compute metrics on the training set too
    #[serde(default)]
    pub train_metrics: bool,

    /// Smoothing factor of the reported training loss
    #[serde(default = "default_smooth_beta")]
    pub smooth_beta: f32,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            lr: default_lr(),
            wd: default_wd(),
            opt: OptimizerKind::default(),
            path: default_path(),
            model_dir: default_model_dir(),
            format: ModelFormat::default(),
            wd_bn_bias: false,
            train_bn: true,
            add_time: true,
            train_metrics: false,
            smooth_beta: default_smooth_beta(),
        }
    }
}

impl LearnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse YAML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject settings no learner can run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.smooth_beta) {
            return Err(Error::Config(format!(
                "smooth_beta must be in [0, 1), got {}",
                self.smooth_beta
            )));
        }
        Ok(())
    }

    /// Directory checkpoints are written to
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.path.join(&self.model_dir)
    }

    pub fn with_lr(mut self, lr: impl Into<HyperValue>) -> Self {
        self.lr = lr.into();
        self
    }

    pub fn with_wd(mut self, wd: f32) -> Self {
        self.wd = wd;
        self
    }

    pub fn with_opt(mut self, opt: OptimizerKind) -> Self {
        self.opt = opt;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_model_dir(mut self, model_dir: impl Into<PathBuf>) -> Self {
        self.model_dir = model_dir.into();
        self
    }

    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_wd_bn_bias(mut self, wd_bn_bias: bool) -> Self {
        self.wd_bn_bias = wd_bn_bias;
        self
    }

    pub fn with_train_bn(mut self, train_bn: bool) -> Self {
        self.train_bn = train_bn;
        self
    }

    pub fn with_add_time(mut self, add_time: bool) -> Self {
        self.add_time = add_time;
        self
    }

    pub fn with_train_metrics(mut self, train_metrics: bool) -> Self {
        self.train_metrics = train_metrics;
        self
    }

    pub fn with_smooth_beta(mut self, beta: f32) -> Self {
        self.smooth_beta = beta;
        self
    }
}

/// Optional arguments of [`super::Learner::fit`]
#[derive(Default)]
pub struct FitOptions {
    /// Overrides [`LearnerConfig::lr`]
    pub lr: Option<HyperValue>,
    /// Overrides [`LearnerConfig::wd`]
    pub wd: Option<f32>,
    /// Callbacks attached for this call only
    pub cbs: Vec<Box<dyn Callback>>,
    /// Build a fresh optimizer even if one exists
    pub reset_opt: bool,
}

impl FitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lr(mut self, lr: impl Into<HyperValue>) -> Self {
        self.lr = Some(lr.into());
        self
    }

    pub fn wd(mut self, wd: f32) -> Self {
        self.wd = Some(wd);
        self
    }

    pub fn cb(mut self, cb: impl Callback + 'static) -> Self {
        self.cbs.push(Box::new(cb));
        self
    }

    pub fn reset_opt(mut self) -> Self {
        self.reset_opt = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = LearnerConfig::default();
        assert_eq!(config.lr, HyperValue::up_to(3e-3));
        assert_eq!(config.wd, 1e-2);
        assert_eq!(config.opt, OptimizerKind::sgd());
        assert!(!config.wd_bn_bias);
        assert!(config.train_bn);
        assert_eq!(config.checkpoint_dir(), PathBuf::from("./models"));
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
lr: 0.1
wd: 0.0
opt:
  type: adam
  mom: 0.8
model_dir: ckpt
format: yaml
train_metrics: true
"#;
        let config = LearnerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.lr, HyperValue::Scalar(0.1));
        assert_eq!(config.wd, 0.0);
        assert_eq!(config.opt.name(), "adam");
        assert_eq!(config.format, ModelFormat::Yaml);
        assert!(config.train_metrics);
        assert!(config.add_time);
    }

    #[test]
    fn test_range_lr_from_yaml() {
        let config = LearnerConfig::from_yaml_str("lr: { start: 0.0001, stop: 0.01 }").unwrap();
        assert_eq!(config.lr, HyperValue::range(1e-4, 1e-2));
    }

    #[test]
    fn test_invalid_beta() {
        assert!(matches!(
            LearnerConfig::from_yaml_str("smooth_beta: 1.5"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "wd: 0.1").unwrap();
        let config = LearnerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.wd, 0.1);

        assert!(LearnerConfig::from_file("/nonexistent/learner.yaml").is_err());
    }

    #[test]
    fn test_builder() {
        let config = LearnerConfig::new()
            .with_lr(0.5f32)
            .with_path("/tmp/run")
            .with_model_dir("m")
            .with_add_time(false);
        assert_eq!(config.lr, HyperValue::Scalar(0.5));
        assert_eq!(config.checkpoint_dir(), PathBuf::from("/tmp/run/m"));
        assert!(!config.add_time);
    }
}
