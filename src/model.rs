//! GPT-2 Model Driver
//!
//! The [`Gpt2`] struct owns the four flat buffers (parameters, parameter
//! gradients, activations, activation gradients) and drives the per-layer
//! loop over the primitive ops in [`crate::ops`]:
//!
//! ```text
//! tokens ─ encoder ─┬─ LN1 → QKV matmul → attention → out-proj ─(+)─┐
//!                   └──────────────────────────────────────────────┘
//!                   ┬─ LN2 → up-matmul → GELU → down-matmul ─(+)─┐   × L
//!                   └────────────────────────────────────────────┘
//!                   → final LN → tied-wte logits → softmax → CE loss
//! ```
//!
//! Every intermediate lands in its named activation slab, so the backward
//! pass can mirror the loop exactly, accumulating gradients with `+=`
//! throughout. The token embedding is tied: `wte` is read both by the
//! encoder and as the logits weight, and its gradient slab receives both
//! backward contributions.
//!
//! ## Lifecycle
//!
//! - Parameters are allocated at construction and never move.
//! - Activations are allocated lazily on the first `forward(B, T)`; later
//!   forwards may shrink but never grow the batch shape.
//! - Gradients are allocated lazily on the first `backward`.
//! - AdamW moments are allocated lazily on the first `update`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use touchstone::{Gpt2, TouchstoneError};
//!
//! # fn main() -> Result<(), TouchstoneError> {
//! let mut model = Gpt2::from_checkpoint("gpt2_124M.bin")?;
//! let inputs: Vec<i32> = vec![50256; 4 * 64];
//! let targets: Vec<i32> = vec![50256; 4 * 64];
//! model.forward(&inputs, Some(&targets), 4, 64)?;
//! model.zero_grad();
//! model.backward()?;
//! model.update(1e-4, 0.9, 0.999, 1e-8, 0.0, 1)?;
//! println!("loss {:?}", model.mean_loss());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{self, CheckpointFile};
use crate::error::{Result, TouchstoneError};
use crate::ops::{
    attention_backward, attention_forward, crossentropy_forward, crossentropy_softmax_backward,
    encoder_backward, encoder_forward, gelu_backward, gelu_forward, layernorm_backward,
    layernorm_forward, matmul_backward, matmul_forward, residual_backward, residual_forward,
    softmax_forward,
};
use crate::optimizer::AdamW;
use crate::plan::{disjoint_views_mut, ActPlan, ActTensor, ParamPlan, ParamTensor};
use crate::sampler::{sample_multinomial, Rng};

/// Model hyperparameters, immutable after load
///
/// # Fields
///
/// - `max_seq_len`: maximum supported position index (context window)
/// - `vocab_size`: number of tokens in the vocabulary
/// - `num_layers`: number of transformer blocks
/// - `num_heads`: attention heads per block; must divide `channels`
/// - `channels`: model width
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub max_seq_len: usize,
    pub vocab_size: usize,
    pub num_layers: usize,
    pub num_heads: usize,
    pub channels: usize,
}

impl Default for Config {
    /// GPT-2 124M
    fn default() -> Self {
        Self {
            max_seq_len: 1024,
            vocab_size: 50257,
            num_layers: 12,
            num_heads: 12,
            channels: 768,
        }
    }
}

impl Config {
    /// Per-head channel count
    pub fn head_size(&self) -> usize {
        self.channels / self.num_heads
    }

    /// A tiny configuration for tests and quick experiments
    pub fn tiny(vocab_size: usize) -> Self {
        Self {
            max_seq_len: 16,
            vocab_size,
            num_layers: 2,
            num_heads: 2,
            channels: 8,
        }
    }
}

/// The training engine: parameters, gradients, activations, optimizer
/// state, all as views into flat buffers
pub struct Gpt2 {
    config: Config,
    param_plan: ParamPlan,
    params: Vec<f32>,
    grads: Option<Vec<f32>>,
    opt: Option<AdamW>,
    act_plan: Option<ActPlan>,
    acts: Option<Vec<f32>>,
    grads_acts: Option<Vec<f32>>,
    inputs: Vec<i32>,
    targets: Vec<i32>,
    cur_b: usize,
    cur_t: usize,
    mean_loss: Option<f32>,
}

impl Gpt2 {
    fn from_parts(config: Config, params: Vec<f32>) -> Self {
        let param_plan = ParamPlan::new(&config);
        debug_assert_eq!(params.len(), param_plan.total_len());
        Self {
            config,
            param_plan,
            params,
            grads: None,
            opt: None,
            act_plan: None,
            acts: None,
            grads_acts: None,
            inputs: Vec::new(),
            targets: Vec::new(),
            cur_b: 0,
            cur_t: 0,
            mean_loss: None,
        }
    }

    /// Load hyperparameters and weights from a checkpoint file
    pub fn from_checkpoint(path: impl AsRef<Path>) -> Result<Self> {
        let CheckpointFile { config, params } = checkpoint::read_checkpoint(path)?;
        Ok(Self::from_parts(config, params))
    }

    /// Build a freshly initialized model
    ///
    /// Weight matrices and the token embedding draw from N(0, 0.02), the
    /// position embedding from N(0, 0.01); LayerNorm scales start at one,
    /// every bias and shift at zero.
    pub fn from_config(config: &Config, seed: u64) -> Self {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        use rand_distr::{Distribution, Normal};

        let plan = ParamPlan::new(config);
        let mut params = vec![0.0f32; plan.total_len()];
        let mut rng = StdRng::seed_from_u64(seed);
        let weight_init = Normal::new(0.0f32, 0.02).unwrap();
        let pos_init = Normal::new(0.0f32, 0.01).unwrap();

        for tensor in [
            ParamTensor::Wte,
            ParamTensor::QkvW,
            ParamTensor::AttProjW,
            ParamTensor::FcW,
            ParamTensor::FcProjW,
        ] {
            for x in &mut params[plan.range(tensor)] {
                *x = weight_init.sample(&mut rng);
            }
        }
        for x in &mut params[plan.range(ParamTensor::Wpe)] {
            *x = pos_init.sample(&mut rng);
        }
        for tensor in [ParamTensor::Ln1W, ParamTensor::Ln2W, ParamTensor::LnfW] {
            params[plan.range(tensor)].fill(1.0);
        }

        Self::from_parts(config.clone(), params)
    }

    /// Re-emit the parameter buffer as a checkpoint file
    pub fn write_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        checkpoint::write_checkpoint(path, &self.config, &self.params)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn num_parameters(&self) -> usize {
        self.params.len()
    }

    /// The flat parameter buffer, in checkpoint order
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Mean cross-entropy of the last targeted forward, `None` after a
    /// forward without targets
    pub fn mean_loss(&self) -> Option<f32> {
        self.mean_loss
    }

    /// Probability row of position `(bi, ti)` from the last forward
    pub fn probs_row(&self, bi: usize, ti: usize) -> Result<&[f32]> {
        let (plan, acts) = match (self.act_plan.as_ref(), self.acts.as_ref()) {
            (Some(plan), Some(acts)) => (plan, acts),
            _ => {
                return Err(TouchstoneError::StateViolation {
                    reason: "probabilities require a prior forward",
                })
            }
        };
        assert!(bi < self.cur_b && ti < self.cur_t);
        let v = self.config.vocab_size;
        let probs = &acts[plan.view(ActTensor::Probs, self.cur_b, self.cur_t)];
        Ok(&probs[(bi * self.cur_t + ti) * v..(bi * self.cur_t + ti + 1) * v])
    }

    /// Forward pass over a `(b, t)` batch of token ids
    ///
    /// With `targets`, also computes per-position cross-entropy and the
    /// mean loss; without, `mean_loss` is cleared and `backward` is
    /// rejected until the next targeted forward.
    ///
    /// The first call fixes the activation allocation; later calls must
    /// satisfy `b' <= b` and `t' <= t` or fail with `ShapeOverflow`. A
    /// first call with `t` beyond the model's context window fails with
    /// `ContextOverflow` before anything is allocated.
    pub fn forward(
        &mut self,
        inputs: &[i32],
        targets: Option<&[i32]>,
        b: usize,
        t: usize,
    ) -> Result<()> {
        use ActTensor::*;
        use ParamTensor::*;

        let v = self.config.vocab_size;
        let nl = self.config.num_layers;
        let nh = self.config.num_heads;
        let c = self.config.channels;

        assert!(inputs.len() >= b * t, "inputs shorter than B*T");
        if let Some(targets) = targets {
            assert!(targets.len() >= b * t, "targets shorter than B*T");
        }

        match self.act_plan.as_ref() {
            None => {
                // nothing allocated yet: the batch size is unbounded here,
                // only the context window caps T
                if t > self.config.max_seq_len {
                    return Err(TouchstoneError::ContextOverflow {
                        max_seq_len: self.config.max_seq_len,
                        t,
                    });
                }
                let plan = ActPlan::new(&self.config, b, t);
                self.acts = Some(vec![0.0; plan.total_len()]);
                self.inputs = vec![0; b * t];
                self.targets = vec![0; b * t];
                self.act_plan = Some(plan);
            }
            Some(plan) => {
                if b > plan.batch_size || t > plan.seq_len {
                    return Err(TouchstoneError::ShapeOverflow {
                        max_b: plan.batch_size,
                        max_t: plan.seq_len,
                        b,
                        t,
                    });
                }
            }
        }
        self.cur_b = b;
        self.cur_t = t;
        self.inputs[..b * t].copy_from_slice(&inputs[..b * t]);
        if let Some(targets) = targets {
            self.targets[..b * t].copy_from_slice(&targets[..b * t]);
        }

        let plan = self.act_plan.as_ref().unwrap();
        let pplan = &self.param_plan;
        let params = &self.params;
        let acts = self.acts.as_mut().unwrap();

        {
            let [encoded] = disjoint_views_mut(acts, [plan.view(Encoded, b, t)]);
            encoder_forward(
                encoded,
                &self.inputs[..b * t],
                &params[pplan.range(Wte)],
                &params[pplan.range(Wpe)],
                b,
                t,
                c,
            );
        }

        for li in 0..nl {
            let lv = |tensor| plan.layer_view(tensor, li, b, t);
            let plr = |tensor| pplan.layer_range(tensor, li);
            // the block's input stream: the previous block's output
            let residual = if li == 0 {
                plan.view(Encoded, b, t)
            } else {
                plan.layer_view(Residual3, li - 1, b, t)
            };

            {
                let [ln1, mean, rstd, inp] = disjoint_views_mut(
                    acts,
                    [lv(Ln1), lv(Ln1Mean), lv(Ln1Rstd), residual.clone()],
                );
                layernorm_forward(
                    ln1,
                    mean,
                    rstd,
                    inp,
                    &params[plr(Ln1W)],
                    &params[plr(Ln1B)],
                    b,
                    t,
                    c,
                );
            }
            {
                let [qkv, ln1] = disjoint_views_mut(acts, [lv(Qkv), lv(Ln1)]);
                matmul_forward(
                    qkv,
                    ln1,
                    &params[plr(QkvW)],
                    Some(&params[plr(QkvB)]),
                    b,
                    t,
                    c,
                    3 * c,
                );
            }
            {
                let [atty, preatt, att, qkv] =
                    disjoint_views_mut(acts, [lv(Atty), lv(PreAtt), lv(Att), lv(Qkv)]);
                attention_forward(atty, preatt, att, qkv, b, t, c, nh);
            }
            {
                let [attproj, atty] = disjoint_views_mut(acts, [lv(AttProj), lv(Atty)]);
                matmul_forward(
                    attproj,
                    atty,
                    &params[plr(AttProjW)],
                    Some(&params[plr(AttProjB)]),
                    b,
                    t,
                    c,
                    c,
                );
            }
            {
                let [residual2, res, attproj] =
                    disjoint_views_mut(acts, [lv(Residual2), residual.clone(), lv(AttProj)]);
                residual_forward(residual2, res, attproj);
            }
            {
                let [ln2, mean, rstd, inp] =
                    disjoint_views_mut(acts, [lv(Ln2), lv(Ln2Mean), lv(Ln2Rstd), lv(Residual2)]);
                layernorm_forward(
                    ln2,
                    mean,
                    rstd,
                    inp,
                    &params[plr(Ln2W)],
                    &params[plr(Ln2B)],
                    b,
                    t,
                    c,
                );
            }
            {
                let [fch, ln2] = disjoint_views_mut(acts, [lv(Fch), lv(Ln2)]);
                matmul_forward(
                    fch,
                    ln2,
                    &params[plr(FcW)],
                    Some(&params[plr(FcB)]),
                    b,
                    t,
                    c,
                    4 * c,
                );
            }
            {
                let [fch_gelu, fch] = disjoint_views_mut(acts, [lv(FchGelu), lv(Fch)]);
                gelu_forward(fch_gelu, fch);
            }
            {
                let [fcproj, fch_gelu] = disjoint_views_mut(acts, [lv(FcProj), lv(FchGelu)]);
                matmul_forward(
                    fcproj,
                    fch_gelu,
                    &params[plr(FcProjW)],
                    Some(&params[plr(FcProjB)]),
                    b,
                    t,
                    4 * c,
                    c,
                );
            }
            {
                let [residual3, residual2, fcproj] =
                    disjoint_views_mut(acts, [lv(Residual3), lv(Residual2), lv(FcProj)]);
                residual_forward(residual3, residual2, fcproj);
            }
        }

        {
            let res = plan.layer_view(Residual3, nl - 1, b, t);
            let [lnf, mean, rstd, inp] = disjoint_views_mut(
                acts,
                [
                    plan.view(Lnf, b, t),
                    plan.view(LnfMean, b, t),
                    plan.view(LnfRstd, b, t),
                    res,
                ],
            );
            layernorm_forward(
                lnf,
                mean,
                rstd,
                inp,
                &params[pplan.range(LnfW)],
                &params[pplan.range(LnfB)],
                b,
                t,
                c,
            );
        }
        {
            // tied embedding as the output projection, no bias
            let [logits, lnf] =
                disjoint_views_mut(acts, [plan.view(Logits, b, t), plan.view(Lnf, b, t)]);
            matmul_forward(logits, lnf, &params[pplan.range(Wte)], None, b, t, c, v);
        }
        {
            let [probs, logits] =
                disjoint_views_mut(acts, [plan.view(Probs, b, t), plan.view(Logits, b, t)]);
            softmax_forward(probs, logits, b, t, v);
        }

        if targets.is_some() {
            let mean = {
                let [losses, probs] =
                    disjoint_views_mut(acts, [plan.view(Losses, b, t), plan.view(Probs, b, t)]);
                crossentropy_forward(losses, probs, &self.targets[..b * t], b, t, v);
                losses.iter().sum::<f32>() / (b * t) as f32
            };
            self.mean_loss = Some(mean);
        } else {
            self.mean_loss = None;
        }
        Ok(())
    }

    /// Zero both gradient buffers; a no-op before they exist
    pub fn zero_grad(&mut self) {
        if let Some(grads) = self.grads.as_mut() {
            grads.fill(0.0);
        }
        if let Some(grads_acts) = self.grads_acts.as_mut() {
            grads_acts.fill(0.0);
        }
    }

    /// Backward pass, mirroring the last targeted forward
    ///
    /// Allocates and zeroes the gradient buffers on first use. Every write
    /// accumulates; the uniform seed of the loss gradient is the only
    /// overwrite, and `zero_grad` is the only zeroer.
    pub fn backward(&mut self) -> Result<()> {
        use ActTensor::*;
        use ParamTensor::*;

        if self.mean_loss.is_none() {
            return Err(TouchstoneError::StateViolation {
                reason: "backward requires a prior forward with targets",
            });
        }
        if self.grads.is_none() {
            self.grads = Some(vec![0.0; self.param_plan.total_len()]);
            self.grads_acts = Some(vec![0.0; self.act_plan.as_ref().unwrap().total_len()]);
        }

        let (b, t) = (self.cur_b, self.cur_t);
        let v = self.config.vocab_size;
        let nl = self.config.num_layers;
        let nh = self.config.num_heads;
        let c = self.config.channels;

        let plan = self.act_plan.as_ref().unwrap();
        let pplan = &self.param_plan;
        let params = &self.params;
        let acts = self.acts.as_ref().unwrap();
        let grads = self.grads.as_mut().unwrap();
        let grads_acts = self.grads_acts.as_mut().unwrap();

        {
            // kick off the chain with dL/dloss_i = 1/(B*T); the one overwrite
            let [dlosses] = disjoint_views_mut(grads_acts, [plan.view(Losses, b, t)]);
            dlosses.fill(1.0 / (b * t) as f32);
        }
        {
            let [dlogits, dlosses] = disjoint_views_mut(
                grads_acts,
                [plan.view(Logits, b, t), plan.view(Losses, b, t)],
            );
            crossentropy_softmax_backward(
                dlogits,
                dlosses,
                &acts[plan.view(Probs, b, t)],
                &self.targets[..b * t],
                b,
                t,
                v,
            );
        }
        {
            // tied projection: this is the first of wte's two contributions
            let [dlnf, dlogits] =
                disjoint_views_mut(grads_acts, [plan.view(Lnf, b, t), plan.view(Logits, b, t)]);
            let [dwte] = disjoint_views_mut(grads, [pplan.range(Wte)]);
            matmul_backward(
                dlnf,
                dwte,
                None,
                dlogits,
                &acts[plan.view(Lnf, b, t)],
                &params[pplan.range(Wte)],
                b,
                t,
                c,
                v,
            );
        }
        {
            let res = plan.layer_view(Residual3, nl - 1, b, t);
            let [dres, dlnf] =
                disjoint_views_mut(grads_acts, [res.clone(), plan.view(Lnf, b, t)]);
            let [dlnfw, dlnfb] =
                disjoint_views_mut(grads, [pplan.range(LnfW), pplan.range(LnfB)]);
            layernorm_backward(
                dres,
                dlnfw,
                dlnfb,
                dlnf,
                &acts[res],
                &params[pplan.range(LnfW)],
                &acts[plan.view(LnfMean, b, t)],
                &acts[plan.view(LnfRstd, b, t)],
                b,
                t,
                c,
            );
        }

        for li in (0..nl).rev() {
            let lv = |tensor| plan.layer_view(tensor, li, b, t);
            let plr = |tensor| pplan.layer_range(tensor, li);
            let residual = if li == 0 {
                plan.view(Encoded, b, t)
            } else {
                plan.layer_view(Residual3, li - 1, b, t)
            };

            {
                let [dres2, dfcproj, dres3] =
                    disjoint_views_mut(grads_acts, [lv(Residual2), lv(FcProj), lv(Residual3)]);
                residual_backward(dres2, dfcproj, dres3);
            }
            {
                let [dfch_gelu, dfcproj] =
                    disjoint_views_mut(grads_acts, [lv(FchGelu), lv(FcProj)]);
                let [dw, db] = disjoint_views_mut(grads, [plr(FcProjW), plr(FcProjB)]);
                matmul_backward(
                    dfch_gelu,
                    dw,
                    Some(db),
                    dfcproj,
                    &acts[lv(FchGelu)],
                    &params[plr(FcProjW)],
                    b,
                    t,
                    4 * c,
                    c,
                );
            }
            {
                let [dfch, dfch_gelu] = disjoint_views_mut(grads_acts, [lv(Fch), lv(FchGelu)]);
                gelu_backward(dfch, &acts[lv(Fch)], dfch_gelu);
            }
            {
                let [dln2, dfch] = disjoint_views_mut(grads_acts, [lv(Ln2), lv(Fch)]);
                let [dw, db] = disjoint_views_mut(grads, [plr(FcW), plr(FcB)]);
                matmul_backward(
                    dln2,
                    dw,
                    Some(db),
                    dfch,
                    &acts[lv(Ln2)],
                    &params[plr(FcW)],
                    b,
                    t,
                    c,
                    4 * c,
                );
            }
            {
                let [dres2, dln2] = disjoint_views_mut(grads_acts, [lv(Residual2), lv(Ln2)]);
                let [dw, db] = disjoint_views_mut(grads, [plr(Ln2W), plr(Ln2B)]);
                layernorm_backward(
                    dres2,
                    dw,
                    db,
                    dln2,
                    &acts[lv(Residual2)],
                    &params[plr(Ln2W)],
                    &acts[lv(Ln2Mean)],
                    &acts[lv(Ln2Rstd)],
                    b,
                    t,
                    c,
                );
            }
            {
                let [dres, dattproj, dres2] =
                    disjoint_views_mut(grads_acts, [residual.clone(), lv(AttProj), lv(Residual2)]);
                residual_backward(dres, dattproj, dres2);
            }
            {
                let [datty, dattproj] = disjoint_views_mut(grads_acts, [lv(Atty), lv(AttProj)]);
                let [dw, db] = disjoint_views_mut(grads, [plr(AttProjW), plr(AttProjB)]);
                matmul_backward(
                    datty,
                    dw,
                    Some(db),
                    dattproj,
                    &acts[lv(Atty)],
                    &params[plr(AttProjW)],
                    b,
                    t,
                    c,
                    c,
                );
            }
            {
                let [dqkv, dpreatt, datt, datty] =
                    disjoint_views_mut(grads_acts, [lv(Qkv), lv(PreAtt), lv(Att), lv(Atty)]);
                attention_backward(
                    dqkv,
                    dpreatt,
                    datt,
                    datty,
                    &acts[lv(Qkv)],
                    &acts[lv(Att)],
                    b,
                    t,
                    c,
                    nh,
                );
            }
            {
                let [dln1, dqkv] = disjoint_views_mut(grads_acts, [lv(Ln1), lv(Qkv)]);
                let [dw, db] = disjoint_views_mut(grads, [plr(QkvW), plr(QkvB)]);
                matmul_backward(
                    dln1,
                    dw,
                    Some(db),
                    dqkv,
                    &acts[lv(Ln1)],
                    &params[plr(QkvW)],
                    b,
                    t,
                    c,
                    3 * c,
                );
            }
            {
                let [dres, dln1] =
                    disjoint_views_mut(grads_acts, [residual.clone(), lv(Ln1)]);
                let [dw, db] = disjoint_views_mut(grads, [plr(Ln1W), plr(Ln1B)]);
                layernorm_backward(
                    dres,
                    dw,
                    db,
                    dln1,
                    &acts[residual.clone()],
                    &params[plr(Ln1W)],
                    &acts[lv(Ln1Mean)],
                    &acts[lv(Ln1Rstd)],
                    b,
                    t,
                    c,
                );
            }
        }

        {
            // wte's second contribution, plus all of wpe
            let [dwte, dwpe] = disjoint_views_mut(grads, [pplan.range(Wte), pplan.range(Wpe)]);
            encoder_backward(
                dwte,
                dwpe,
                &grads_acts[plan.view(Encoded, b, t)],
                &self.inputs[..b * t],
                b,
                t,
                c,
            );
        }
        Ok(())
    }

    /// One AdamW step over the whole parameter buffer
    ///
    /// `step` is 1-based. Moments are created lazily here; calling before
    /// any `backward` is a `StateViolation`.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        eps: f32,
        weight_decay: f32,
        step: usize,
    ) -> Result<()> {
        if self.grads.is_none() {
            return Err(TouchstoneError::StateViolation {
                reason: "update requires a prior backward",
            });
        }
        if self.opt.is_none() {
            self.opt = Some(AdamW::new(self.params.len()));
        }
        let grads = self.grads.as_ref().unwrap();
        let opt = self.opt.as_mut().unwrap();
        opt.update(
            &mut self.params,
            grads,
            learning_rate,
            beta1,
            beta2,
            eps,
            weight_decay,
            step,
        );
        Ok(())
    }

    /// Autoregressive sampling from the current model
    ///
    /// Re-runs the forward pass for every generated token; fine for sanity
    /// checks, wasteful for real inference. The activation allocation must
    /// already cover `(1, max_tokens - 1)`, which a prior training forward
    /// provides.
    pub fn generate(
        &mut self,
        prompt: &[i32],
        max_tokens: usize,
        rng: &mut Rng,
    ) -> Result<Vec<i32>> {
        let mut tokens = prompt.to_vec();
        while tokens.len() < max_tokens {
            let t = tokens.len();
            self.forward(&tokens, None, 1, t)?;
            let probs = self.probs_row(0, t - 1)?;
            let coin = rng.random_f32();
            let next = sample_multinomial(probs, coin) as i32;
            tokens.push(next);
        }
        Ok(tokens)
    }
}
