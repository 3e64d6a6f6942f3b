//! Parameter update rules
//!
//! Every stepper moves the parameter in place. Weight decay and L2
//! regularisation are steppers too, so that they compose in front of the
//! update they modify.

use super::pipeline::{grad_of, StepArgs, Stepper};
use crate::{Result, Tensor};
use ndarray::Array1;

/// `damp * (1 - mom^step) / (1 - mom)`
fn debias(mom: f32, damp: f32, step: u64) -> f32 {
    damp * (1.0 - mom.powi(step as i32)) / (1.0 - mom)
}

fn rms(a: &Array1<f32>) -> f32 {
    a.mapv(|x| x * x).mean().unwrap_or(0.0).sqrt()
}

/// Plain gradient descent: `p -= lr * grad`
#[derive(Clone, Copy, Debug, Default)]
pub struct SgdStep;

impl Stepper for SgdStep {
    fn name(&self) -> &'static str {
        "sgd_step"
    }

    fn required(&self) -> &'static [&'static str] {
        &["lr"]
    }

    fn step(&self, param: &mut Tensor, args: &StepArgs<'_>) -> Result<()> {
        let lr = args.scalar("lr")?;
        let grad = grad_of(param)?;
        param.data_mut().scaled_add(-lr, &grad);
        Ok(())
    }
}

/// Decoupled weight decay: `p *= 1 - lr * wd`, skipped when `do_wd` is off
#[derive(Clone, Copy, Debug, Default)]
pub struct WeightDecay;

impl Stepper for WeightDecay {
    fn name(&self) -> &'static str {
        "weight_decay"
    }

    fn defaults(&self) -> Vec<(&'static str, f32)> {
        vec![("wd", 0.0)]
    }

    fn required(&self) -> &'static [&'static str] {
        &["lr", "wd"]
    }

    fn step(&self, param: &mut Tensor, args: &StepArgs<'_>) -> Result<()> {
        if !args.flag("do_wd", true) {
            return Ok(());
        }
        let factor = 1.0 - args.scalar("lr")? * args.scalar("wd")?;
        param.data_mut().mapv_inplace(|x| x * factor);
        Ok(())
    }
}

/// L2 regularisation: `grad += wd * p`, skipped when `do_wd` is off
#[derive(Clone, Copy, Debug, Default)]
pub struct L2Reg;

impl Stepper for L2Reg {
    fn name(&self) -> &'static str {
        "l2_reg"
    }

    fn defaults(&self) -> Vec<(&'static str, f32)> {
        vec![("wd", 0.0)]
    }

    fn required(&self) -> &'static [&'static str] {
        &["wd"]
    }

    fn step(&self, param: &mut Tensor, args: &StepArgs<'_>) -> Result<()> {
        if !args.flag("do_wd", true) {
            return Ok(());
        }
        let wd = args.scalar("wd")?;
        let mut grad = grad_of(param)?;
        grad.scaled_add(wd, param.data());
        param.set_grad(grad);
        Ok(())
    }
}

/// SGD with momentum: `p -= lr * grad_avg`
#[derive(Clone, Copy, Debug, Default)]
pub struct MomentumStep;

impl Stepper for MomentumStep {
    fn name(&self) -> &'static str {
        "momentum_step"
    }

    fn required(&self) -> &'static [&'static str] {
        &["lr"]
    }

    fn step(&self, param: &mut Tensor, args: &StepArgs<'_>) -> Result<()> {
        let lr = args.scalar("lr")?;
        let grad_avg = args.require_array("grad_avg")?;
        param.data_mut().scaled_add(-lr, grad_avg);
        Ok(())
    }
}

/// RMSProp: `p -= lr * g / (sqrt(sqr_avg) + eps)` where `g` is `grad_avg`
/// when momentum is tracked, the raw gradient otherwise
#[derive(Clone, Copy, Debug, Default)]
pub struct RmsPropStep;

impl Stepper for RmsPropStep {
    fn name(&self) -> &'static str {
        "rms_prop_step"
    }

    fn defaults(&self) -> Vec<(&'static str, f32)> {
        vec![("eps", 1e-8)]
    }

    fn required(&self) -> &'static [&'static str] {
        &["lr", "eps"]
    }

    fn step(&self, param: &mut Tensor, args: &StepArgs<'_>) -> Result<()> {
        let lr = args.scalar("lr")?;
        let eps = args.scalar("eps")?;
        let sqr_avg = args.require_array("sqr_avg")?;
        let numer = match args.array("grad_avg") {
            Some(avg) => avg.clone(),
            None => grad_of(param)?,
        };

        let denom = sqr_avg.mapv(|v| v.sqrt() + eps);
        param.data_mut().scaled_add(-lr, &(numer / denom));
        Ok(())
    }
}

/// Adam with bias correction of both moving averages
#[derive(Clone, Copy, Debug, Default)]
pub struct AdamStep;

impl Stepper for AdamStep {
    fn name(&self) -> &'static str {
        "adam_step"
    }

    fn defaults(&self) -> Vec<(&'static str, f32)> {
        vec![("eps", 1e-5)]
    }

    fn required(&self) -> &'static [&'static str] {
        &["lr", "mom", "sqr_mom", "eps"]
    }

    fn step(&self, param: &mut Tensor, args: &StepArgs<'_>) -> Result<()> {
        let lr = args.scalar("lr")?;
        let mom = args.scalar("mom")?;
        let sqr_mom = args.scalar("sqr_mom")?;
        let eps = args.scalar("eps")?;
        let step = args.require_count("step")?;
        let grad_avg = args.require_array("grad_avg")?;
        let sqr_avg = args.require_array("sqr_avg")?;

        let debias1 = debias(mom, 1.0 - mom, step);
        let debias2 = debias(sqr_mom, 1.0 - sqr_mom, step);
        let denom = sqr_avg.mapv(|v| (v / debias2).sqrt() + eps);

        param
            .data_mut()
            .scaled_add(-lr / debias1, &(grad_avg / &denom));
        Ok(())
    }
}

/// LARC: `p -= local_lr * g`, with `local_lr` from [`super::LarcLayerLr`]
#[derive(Clone, Copy, Debug, Default)]
pub struct LarcStep;

impl Stepper for LarcStep {
    fn name(&self) -> &'static str {
        "larc_step"
    }

    fn step(&self, param: &mut Tensor, args: &StepArgs<'_>) -> Result<()> {
        let local_lr = args.scalar("local_lr")?;
        let direction = match args.array("grad_avg") {
            Some(avg) => avg.clone(),
            None => grad_of(param)?,
        };
        param.data_mut().scaled_add(-local_lr, &direction);
        Ok(())
    }
}

/// LAMB: the Adam direction scaled by the layer trust ratio
///
/// The ratio is `min(rms(p) / rms(step), 10)`, or exactly 1 when either
/// norm is zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct LambStep;

impl Stepper for LambStep {
    fn name(&self) -> &'static str {
        "lamb_step"
    }

    fn defaults(&self) -> Vec<(&'static str, f32)> {
        vec![("eps", 1e-6)]
    }

    fn required(&self) -> &'static [&'static str] {
        &["lr", "mom", "sqr_mom", "eps"]
    }

    fn step(&self, param: &mut Tensor, args: &StepArgs<'_>) -> Result<()> {
        let lr = args.scalar("lr")?;
        let mom = args.scalar("mom")?;
        let sqr_mom = args.scalar("sqr_mom")?;
        let eps = args.scalar("eps")?;
        let step = args.require_count("step")?;
        let grad_avg = args.require_array("grad_avg")?;
        let sqr_avg = args.require_array("sqr_avg")?;

        let debias1 = debias(mom, 1.0 - mom, step);
        let debias2 = debias(sqr_mom, 1.0 - sqr_mom, step);

        let r1 = rms(param.data());
        let denom = sqr_avg.mapv(|v| (v / debias2).sqrt() + eps);
        let update = (grad_avg / debias1) / denom;
        let r2 = rms(&update);

        let q = if r1 == 0.0 || r2 == 0.0 {
            1.0
        } else {
            (r1 / r2).min(10.0)
        };
        param.data_mut().scaled_add(-lr * q, &update);
        Ok(())
    }
}
