//! Event-driven training loop
//!
//! A [`Learner`] drives a model through fit, epoch, phase and batch scopes,
//! dispatching an [`Event`] at each step to the attached [`Callback`]s.
//! Callbacks share a mutable [`TrainState`] and may cancel any scope by
//! returning a [`CallbackAction`]; the scope then runs its cancel and
//! cleanup events and the loop carries on with the next step of the
//! enclosing scope.
//!
//! # Example
//!
//! ```no_run
//! use aprendiz::optim::OptimizerKind;
//! use aprendiz::train::{
//!     mae, AffineModel, AvgMetric, Batch, DataBunch, FitOptions, Learner, LearnerConfig,
//!     MSELoss,
//! };
//!
//! let train = vec![Batch::from_vecs(vec![0.0, 1.0], vec![1.0, 3.0])];
//! let valid = vec![Batch::from_vecs(vec![2.0], vec![5.0])];
//!
//! let config = LearnerConfig::default().with_opt(OptimizerKind::adam());
//! let mut learn = Learner::new(
//!     AffineModel::new(0.0, 0.0),
//!     DataBunch::new(train, valid),
//!     MSELoss::default(),
//!     config,
//!     vec![Box::new(AvgMetric::new("mae", mae))],
//! )
//! .unwrap();
//!
//! learn.fit(10, FitOptions::new().lr(0.1f32)).unwrap();
//! println!("{:?}", learn.validate().unwrap());
//! ```

mod batch;
pub mod callback;
mod cancel;
mod config;
mod data;
mod event;
mod learner;
pub mod logger;
mod loss;
mod metrics;
mod model;
mod names;
mod state;

pub use batch::Batch;
pub use callback::{
    route, AsAny, Callback, CallbackManager, GatherPredsCallback, Predictions, Recorder,
    TrainEvalCallback, VerboseCallback,
};
pub use cancel::{CallbackAction, CancelSignal};
pub use config::{FitOptions, LearnerConfig};
pub use data::{DataBunch, DataSource, Device, TRAIN_IDX, VALID_IDX};
pub use event::Event;
pub use learner::{AddedCallbacks, Learner, LossNotReduced, NoLogging};
pub use logger::{format_time, LogValue, NoopLogger, PrintLogger, RowLogger};
pub use loss::{LossFn, MSELoss, Reduction};
pub use metrics::{mae, AvgLoss, AvgMetric, AvgSmoothLoss, Metric};
pub use model::{AffineModel, Model};
pub use names::{camel2snake, class2attr};
pub use state::TrainState;
