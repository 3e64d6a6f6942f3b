//! End-to-end tests of the learner: fitting, metrics and checkpoints

use aprendiz::io::{load_checkpoint, ModelFormat};
use aprendiz::optim::OptimizerKind;
use aprendiz::train::{
    mae, AffineModel, AvgMetric, Batch, DataBunch, FitOptions, Learner, LearnerConfig, MSELoss,
    Metric, Model, NoopLogger, VerboseCallback, TRAIN_IDX,
};
use aprendiz::Error;
use approx::assert_abs_diff_eq;
use tempfile::TempDir;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Samples of y = 2x + 1
fn line_data() -> DataBunch {
    let batch = |xs: &[f32]| {
        let ys = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        Batch::from_vecs(xs.to_vec(), ys)
    };
    DataBunch::new(
        vec![batch(&[0.0, 0.5]), batch(&[1.0, 1.5]), batch(&[-1.0, -0.5])],
        vec![batch(&[2.0, -2.0])],
    )
}

fn learner(config: LearnerConfig) -> Learner {
    let metrics: Vec<Box<dyn Metric>> = vec![Box::new(AvgMetric::new("mae", mae))];
    let mut learn = Learner::new(
        AffineModel::new(0.0, 0.0),
        line_data(),
        MSELoss::default(),
        config.with_add_time(false),
        metrics,
    )
    .unwrap();
    learn.set_logger(NoopLogger);
    learn
}

fn valid_loss(learn: &mut Learner) -> f32 {
    learn.validate().unwrap()[0].as_f32().unwrap()
}

#[test]
fn test_fit_reduces_validation_loss() {
    init_logger();
    let mut learn = learner(LearnerConfig::default());
    let before = valid_loss(&mut learn);

    learn.fit(30, FitOptions::new().lr(0.05f32)).unwrap();
    let recorder = learn.recorder().unwrap();
    assert_eq!(recorder.losses().len(), 90);
    assert_eq!(recorder.lrs().len(), 90);
    assert!(recorder.lrs().iter().all(|&lr| lr == 0.05));

    let after = valid_loss(&mut learn);
    assert!(after < before / 10.0, "{before} -> {after}");
}

#[test]
fn test_validate_resets_recorder_history() {
    let mut learn = learner(LearnerConfig::default());
    learn.fit(2, FitOptions::new().lr(0.05f32)).unwrap();
    assert_eq!(learn.recorder().unwrap().losses().len(), 6);
    assert_eq!(learn.recorder().unwrap().values().len(), 2);

    learn.validate().unwrap();

    let recorder = learn.recorder().unwrap();
    assert!(recorder.losses().is_empty());
    assert!(recorder.lrs().is_empty());
    assert_eq!(recorder.values().len(), 1);
}

#[test]
fn test_adam_fits_the_line() {
    let config = LearnerConfig::default().with_opt(OptimizerKind::adam());
    let mut learn = learner(config);
    learn.fit(150, FitOptions::new().lr(0.05f32)).unwrap();

    let model = learn.model();
    let (w, b) = (model.parameters()[0].data()[0], model.parameters()[1].data()[0]);
    assert_abs_diff_eq!(w, 2.0, epsilon = 0.1);
    assert_abs_diff_eq!(b, 1.0, epsilon = 0.1);
}

#[test]
fn test_metric_columns() {
    let mut learn = learner(LearnerConfig::default().with_train_metrics(true));
    learn.fit(1, FitOptions::new().cb(VerboseCallback)).unwrap();

    let recorder = learn.recorder().unwrap();
    assert_eq!(
        recorder.metric_names(),
        ["epoch", "train_loss", "train_mae", "valid_loss", "valid_mae"]
    );
    let row = &recorder.values()[0];
    assert_eq!(row.len(), 4);
    assert!(row.iter().all(|v| v.as_f32().is_some()));
}

#[test]
fn test_validate_reports_mae() {
    let mut learn = learner(LearnerConfig::default());
    // predictions are 0 for targets 5 and -3
    let row = learn.validate().unwrap();
    assert_abs_diff_eq!(row[0].as_f32().unwrap(), 17.0, epsilon = 1e-5);
    assert_abs_diff_eq!(row[1].as_f32().unwrap(), 4.0, epsilon = 1e-5);
}

#[test]
fn test_checkpoint_round_trip() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let config = LearnerConfig::default()
        .with_path(dir.path())
        .with_opt(OptimizerKind::adam());

    let mut learn = learner(config.clone());
    learn.fit(2, FitOptions::new().lr(0.1f32)).unwrap();
    let path = learn.save("line", true).unwrap();
    assert_eq!(path, dir.path().join("models").join("line.json"));

    let saved = load_checkpoint(&path).unwrap();
    assert!(saved.has_optimizer());

    let mut restored = learner(config);
    restored.load("line", None, true).unwrap();
    for (got, want) in restored.model().parameters().iter().zip(learn.model().parameters()) {
        assert_eq!(got.data(), want.data());
    }
    let opt = restored.opt().unwrap();
    assert_eq!(opt.state(0).unwrap().count("step"), Some(6));
    assert_eq!(opt.hypers()[0]["lr"], 0.1);
    assert_eq!(opt.state_dict(), learn.opt().unwrap().state_dict());
}

#[test]
fn test_malformed_optimizer_state_only_warns_by_default() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let config = LearnerConfig::default().with_path(dir.path());

    let mut learn = learner(config.clone());
    learn.fit(1, FitOptions::new().lr(0.1f32)).unwrap();
    let path = learn.save("broken", true).unwrap();

    let mut raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    raw["optimizer"]["hypers"] = serde_json::json!("garbage");
    std::fs::write(&path, raw.to_string()).unwrap();

    let mut required = learner(config.clone());
    let err = required.load("broken", Some(true), true).unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
    assert_eq!(required.model().parameters()[0].data()[0], 0.0);

    let mut restored = learner(config);
    restored.load("broken", None, true).unwrap();
    assert_eq!(
        restored.model().parameters()[0].data(),
        learn.model().parameters()[0].data()
    );
}

#[test]
fn test_model_only_checkpoint() {
    let dir = TempDir::new().unwrap();
    let config = LearnerConfig::default()
        .with_path(dir.path())
        .with_format(ModelFormat::Yaml);

    let mut learn = learner(config.clone());
    learn.fit(1, FitOptions::new().lr(0.1f32)).unwrap();
    let path = learn.save("weights", false).unwrap();
    assert_eq!(path.extension().unwrap(), "yaml");

    let mut restored = learner(config);
    restored.load("weights", Some(true), true).unwrap();
    assert!(restored.opt().is_none());
    assert_eq!(
        restored.model().parameters()[1].data(),
        learn.model().parameters()[1].data()
    );
}

#[test]
fn test_load_rejects_mismatched_model() {
    let dir = TempDir::new().unwrap();
    let config = LearnerConfig::default().with_path(dir.path());
    let learn = learner(config.clone());
    learn.save("one_layer", false).unwrap();

    let mut stacked = Learner::new(
        AffineModel::stack(&[(3.0, 3.0), (3.0, 3.0)]),
        line_data(),
        MSELoss::default(),
        config,
        Vec::new(),
    )
    .unwrap();

    let err = stacked.load("one_layer", None, true).unwrap_err();
    assert!(matches!(err, Error::StateDictMismatch(_)));
    assert_eq!(stacked.model().parameters()[0].data()[0], 3.0);

    // the first layer shares its names with the saved model
    stacked.load("one_layer", None, false).unwrap();
    let params = stacked.model().parameters();
    assert_eq!(params[0].data()[0], 0.0);
    assert_eq!(params[1].data()[0], 0.0);
    assert_eq!(params[2].data()[0], 3.0);
}

#[test]
fn test_optimizer_mismatch_is_fatal_only_when_required() {
    let dir = TempDir::new().unwrap();
    let config = LearnerConfig::default().with_path(dir.path());

    let mut learn = learner(config.clone());
    learn.fit(1, FitOptions::new()).unwrap();
    learn.save("sgd", true).unwrap();

    // same parameters, but split over two groups
    let mut mismatched = Learner::new(
        SplitAffine(AffineModel::new(0.0, 0.0)),
        line_data(),
        MSELoss::default(),
        config,
        Vec::new(),
    )
    .unwrap();
    let err = mismatched.load("sgd", Some(true), true).unwrap_err();
    assert!(matches!(err, Error::StateDictMismatch(_)));

    mismatched.load("sgd", None, true).unwrap();
    assert_eq!(
        mismatched.model().parameters()[0].data(),
        learn.model().parameters()[0].data()
    );
}

/// An affine model whose weight and bias sit in separate groups
struct SplitAffine(AffineModel);

impl Model for SplitAffine {
    fn forward(&mut self, inputs: &aprendiz::Tensor) -> aprendiz::Result<aprendiz::Tensor> {
        self.0.forward(inputs)
    }

    fn parameters(&self) -> &[aprendiz::Tensor] {
        self.0.parameters()
    }

    fn parameters_mut(&mut self) -> &mut [aprendiz::Tensor] {
        self.0.parameters_mut()
    }

    fn param_names(&self) -> Vec<String> {
        self.0.param_names()
    }

    fn param_groups(&self) -> Vec<Vec<usize>> {
        vec![vec![0], vec![1]]
    }
}

#[test]
fn test_get_preds_matches_model() {
    let mut learn = learner(LearnerConfig::default());
    learn.fit(20, FitOptions::new().lr(0.05f32)).unwrap();

    let preds = learn.get_preds(TRAIN_IDX, true).unwrap();
    assert_eq!(preds.preds.len(), 6);
    let losses = preds.losses.unwrap();
    for ((p, t), l) in preds.preds.iter().zip(&preds.targets).zip(&losses) {
        assert_abs_diff_eq!((p - t) * (p - t), *l, epsilon = 1e-5);
    }
}

#[test]
fn test_config_from_yaml() {
    let config = LearnerConfig::from_yaml_str(
        "lr: 0.02\nopt:\n  type: sgd\n  mom: 0.9\nmodel_dir: ckpt\nadd_time: false\n",
    )
    .unwrap();
    let mut learn = learner(config);
    learn.fit(1, FitOptions::new()).unwrap();

    let opt = learn.opt().unwrap();
    assert_eq!(opt.hypers()[0]["lr"], 0.02);
    assert_eq!(opt.hypers()[0]["mom"], 0.9);
    assert!(learn.checkpoint_path("x").starts_with("./ckpt"));
}
