//! Flat-Buffer Tensor Plans
//!
//! The engine keeps all parameters in one contiguous `Vec<f32>` and all
//! activations in another. Each named tensor is a `{offset, length}` view
//! carved out of its owning allocation; nothing here holds a pointer, only
//! ranges. The same two plans are used four times over: parameters,
//! parameter gradients, activations, activation gradients (and the AdamW
//! moment vectors mirror the parameter plan as well).
//!
//! ## Why flat buffers?
//!
//! - One allocation per lifetime class instead of dozens per layer
//! - `zero_grad` and the optimizer step become single linear sweeps
//! - The checkpoint payload is exactly the parameter buffer, byte for byte
//!
//! ## Layout
//!
//! Tensors are packed in a fixed declaration order. Per-layer tensors store
//! all `L` layer slabs contiguously, so layer `l` of tensor `t` lives at
//! `offset(t) + l * per_layer_len(t)`.

use std::ops::Range;

use crate::model::Config;

/// Number of named parameter tensors
pub const NUM_PARAM_TENSORS: usize = 16;

/// Number of named activation tensors
pub const NUM_ACT_TENSORS: usize = 23;

/// The sixteen parameter tensors, in buffer order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamTensor {
    /// Token embedding (V, C); also the tied logits weight
    Wte,
    /// Position embedding (maxT, C)
    Wpe,
    /// Pre-attention LayerNorm scale (L, C)
    Ln1W,
    /// Pre-attention LayerNorm shift (L, C)
    Ln1B,
    /// Fused Q/K/V projection (L, 3C, C)
    QkvW,
    /// QKV bias (L, 3C)
    QkvB,
    /// Attention output projection (L, C, C)
    AttProjW,
    /// Attention output projection bias (L, C)
    AttProjB,
    /// Pre-MLP LayerNorm scale (L, C)
    Ln2W,
    /// Pre-MLP LayerNorm shift (L, C)
    Ln2B,
    /// MLP up-projection (L, 4C, C)
    FcW,
    /// MLP up-projection bias (L, 4C)
    FcB,
    /// MLP down-projection (L, C, 4C)
    FcProjW,
    /// MLP down-projection bias (L, C)
    FcProjB,
    /// Final LayerNorm scale (C)
    LnfW,
    /// Final LayerNorm shift (C)
    LnfB,
}

impl ParamTensor {
    /// All tensors in buffer order
    pub const ALL: [ParamTensor; NUM_PARAM_TENSORS] = [
        ParamTensor::Wte,
        ParamTensor::Wpe,
        ParamTensor::Ln1W,
        ParamTensor::Ln1B,
        ParamTensor::QkvW,
        ParamTensor::QkvB,
        ParamTensor::AttProjW,
        ParamTensor::AttProjB,
        ParamTensor::Ln2W,
        ParamTensor::Ln2B,
        ParamTensor::FcW,
        ParamTensor::FcB,
        ParamTensor::FcProjW,
        ParamTensor::FcProjB,
        ParamTensor::LnfW,
        ParamTensor::LnfB,
    ];

    /// Whether the leading dimension is the layer index
    pub fn is_per_layer(self) -> bool {
        !matches!(
            self,
            ParamTensor::Wte | ParamTensor::Wpe | ParamTensor::LnfW | ParamTensor::LnfB
        )
    }
}

/// Size and offset table for the flat parameter buffer
#[derive(Clone, Debug)]
pub struct ParamPlan {
    sizes: [usize; NUM_PARAM_TENSORS],
    offsets: [usize; NUM_PARAM_TENSORS],
    total: usize,
    layers: usize,
}

impl ParamPlan {
    pub fn new(config: &Config) -> Self {
        let v = config.vocab_size;
        let max_t = config.max_seq_len;
        let l = config.num_layers;
        let c = config.channels;

        let sizes = [
            v * c,             // wte
            max_t * c,         // wpe
            l * c,             // ln1w
            l * c,             // ln1b
            l * 3 * c * c,     // qkvw
            l * 3 * c,         // qkvb
            l * c * c,         // attprojw
            l * c,             // attprojb
            l * c,             // ln2w
            l * c,             // ln2b
            l * 4 * c * c,     // fcw
            l * 4 * c,         // fcb
            l * c * 4 * c,     // fcprojw
            l * c,             // fcprojb
            c,                 // lnfw
            c,                 // lnfb
        ];

        let mut offsets = [0usize; NUM_PARAM_TENSORS];
        let mut total = 0usize;
        for i in 0..NUM_PARAM_TENSORS {
            offsets[i] = total;
            total += sizes[i];
        }

        Self {
            sizes,
            offsets,
            total,
            layers: l,
        }
    }

    /// Total element count of the flat buffer
    pub fn total_len(&self) -> usize {
        self.total
    }

    /// Element count of one named tensor
    pub fn len(&self, tensor: ParamTensor) -> usize {
        self.sizes[tensor as usize]
    }

    /// Range of the whole named tensor within the flat buffer
    pub fn range(&self, tensor: ParamTensor) -> Range<usize> {
        let i = tensor as usize;
        self.offsets[i]..self.offsets[i] + self.sizes[i]
    }

    /// Range of layer `l`'s slab of a per-layer tensor
    pub fn layer_range(&self, tensor: ParamTensor, l: usize) -> Range<usize> {
        assert!(tensor.is_per_layer(), "{:?} has no layer dimension", tensor);
        assert!(l < self.layers);
        let i = tensor as usize;
        let per_layer = self.sizes[i] / self.layers;
        let start = self.offsets[i] + l * per_layer;
        start..start + per_layer
    }
}

/// The twenty-three activation tensors, in buffer order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActTensor {
    /// Token + position embedding sum (B, T, C)
    Encoded,
    /// Pre-attention LayerNorm output (L, B, T, C)
    Ln1,
    /// Cached LayerNorm means (L, B, T)
    Ln1Mean,
    /// Cached LayerNorm reciprocal stddevs (L, B, T)
    Ln1Rstd,
    /// Fused Q/K/V projections (L, B, T, 3C)
    Qkv,
    /// Attention mix output (L, B, T, C)
    Atty,
    /// Pre-softmax attention scores (L, B, NH, T, T)
    PreAtt,
    /// Post-softmax attention weights (L, B, NH, T, T)
    Att,
    /// Attention output projection (L, B, T, C)
    AttProj,
    /// First residual sum (L, B, T, C)
    Residual2,
    /// Pre-MLP LayerNorm output (L, B, T, C)
    Ln2,
    /// Cached LayerNorm means (L, B, T)
    Ln2Mean,
    /// Cached LayerNorm reciprocal stddevs (L, B, T)
    Ln2Rstd,
    /// MLP hidden pre-activation (L, B, T, 4C)
    Fch,
    /// MLP hidden post-GELU (L, B, T, 4C)
    FchGelu,
    /// MLP down-projection (L, B, T, C)
    FcProj,
    /// Second residual sum, the block output (L, B, T, C)
    Residual3,
    /// Final LayerNorm output (B, T, C)
    Lnf,
    /// Cached final LayerNorm means (B, T)
    LnfMean,
    /// Cached final LayerNorm reciprocal stddevs (B, T)
    LnfRstd,
    /// Tied-weight logits (B, T, V)
    Logits,
    /// Softmax probabilities (B, T, V)
    Probs,
    /// Per-position cross-entropy losses (B, T)
    Losses,
}

impl ActTensor {
    /// All tensors in buffer order
    pub const ALL: [ActTensor; NUM_ACT_TENSORS] = [
        ActTensor::Encoded,
        ActTensor::Ln1,
        ActTensor::Ln1Mean,
        ActTensor::Ln1Rstd,
        ActTensor::Qkv,
        ActTensor::Atty,
        ActTensor::PreAtt,
        ActTensor::Att,
        ActTensor::AttProj,
        ActTensor::Residual2,
        ActTensor::Ln2,
        ActTensor::Ln2Mean,
        ActTensor::Ln2Rstd,
        ActTensor::Fch,
        ActTensor::FchGelu,
        ActTensor::FcProj,
        ActTensor::Residual3,
        ActTensor::Lnf,
        ActTensor::LnfMean,
        ActTensor::LnfRstd,
        ActTensor::Logits,
        ActTensor::Probs,
        ActTensor::Losses,
    ];

    /// Whether the leading dimension is the layer index
    pub fn is_per_layer(self) -> bool {
        matches!(
            self,
            ActTensor::Ln1
                | ActTensor::Ln1Mean
                | ActTensor::Ln1Rstd
                | ActTensor::Qkv
                | ActTensor::Atty
                | ActTensor::PreAtt
                | ActTensor::Att
                | ActTensor::AttProj
                | ActTensor::Residual2
                | ActTensor::Ln2
                | ActTensor::Ln2Mean
                | ActTensor::Ln2Rstd
                | ActTensor::Fch
                | ActTensor::FchGelu
                | ActTensor::FcProj
                | ActTensor::Residual3
        )
    }
}

/// Size and offset table for the flat activation buffer
///
/// Sized by the `(B, T)` of the first forward pass; the owning model
/// rejects larger shapes afterwards. Smaller shapes reuse the same
/// allocation: each tensor's base offset is fixed by the allocation sizes,
/// while the per-layer views are laid out densely at the *current* shape,
/// which always fits inside the allocated slab.
#[derive(Clone, Debug)]
pub struct ActPlan {
    sizes: [usize; NUM_ACT_TENSORS],
    offsets: [usize; NUM_ACT_TENSORS],
    total: usize,
    vocab_size: usize,
    layers: usize,
    heads: usize,
    channels: usize,
    /// Batch size the plan was sized for
    pub batch_size: usize,
    /// Sequence length the plan was sized for
    pub seq_len: usize,
}

/// Per-tensor element counts at shape `(b, t)`; per-layer entries are the
/// size of a single layer slab
fn act_slab_sizes(
    v: usize,
    nh: usize,
    c: usize,
    b: usize,
    t: usize,
) -> [usize; NUM_ACT_TENSORS] {
    [
        b * t * c,          // encoded
        b * t * c,          // ln1
        b * t,              // ln1_mean
        b * t,              // ln1_rstd
        b * t * 3 * c,      // qkv
        b * t * c,          // atty
        b * nh * t * t,     // preatt
        b * nh * t * t,     // att
        b * t * c,          // attproj
        b * t * c,          // residual2
        b * t * c,          // ln2
        b * t,              // ln2_mean
        b * t,              // ln2_rstd
        b * t * 4 * c,      // fch
        b * t * 4 * c,      // fch_gelu
        b * t * c,          // fcproj
        b * t * c,          // residual3
        b * t * c,          // lnf
        b * t,              // lnf_mean
        b * t,              // lnf_rstd
        b * t * v,          // logits
        b * t * v,          // probs
        b * t,              // losses
    ]
}

impl ActPlan {
    pub fn new(config: &Config, b: usize, t: usize) -> Self {
        let v = config.vocab_size;
        let l = config.num_layers;
        let nh = config.num_heads;
        let c = config.channels;

        let mut sizes = act_slab_sizes(v, nh, c, b, t);
        for (i, size) in sizes.iter_mut().enumerate() {
            if ActTensor::ALL[i].is_per_layer() {
                *size *= l;
            }
        }

        let mut offsets = [0usize; NUM_ACT_TENSORS];
        let mut total = 0usize;
        for i in 0..NUM_ACT_TENSORS {
            offsets[i] = total;
            total += sizes[i];
        }

        Self {
            sizes,
            offsets,
            total,
            vocab_size: v,
            layers: l,
            heads: nh,
            channels: c,
            batch_size: b,
            seq_len: t,
        }
    }

    /// Total element count of the flat buffer
    pub fn total_len(&self) -> usize {
        self.total
    }

    /// Allocated element count of one named tensor
    pub fn len(&self, tensor: ActTensor) -> usize {
        self.sizes[tensor as usize]
    }

    /// Range of the whole allocated tensor within the flat buffer
    pub fn range(&self, tensor: ActTensor) -> Range<usize> {
        let i = tensor as usize;
        self.offsets[i]..self.offsets[i] + self.sizes[i]
    }

    /// Range of a non-per-layer tensor at the current shape `(b, t)`
    pub fn view(&self, tensor: ActTensor, b: usize, t: usize) -> Range<usize> {
        assert!(!tensor.is_per_layer(), "{:?} needs a layer index", tensor);
        debug_assert!(b <= self.batch_size && t <= self.seq_len);
        let i = tensor as usize;
        let len = act_slab_sizes(self.vocab_size, self.heads, self.channels, b, t)[i];
        self.offsets[i]..self.offsets[i] + len
    }

    /// Range of layer `l`'s slab of a per-layer tensor at the current
    /// shape `(b, t)`
    pub fn layer_view(&self, tensor: ActTensor, l: usize, b: usize, t: usize) -> Range<usize> {
        assert!(tensor.is_per_layer(), "{:?} has no layer dimension", tensor);
        assert!(l < self.layers);
        debug_assert!(b <= self.batch_size && t <= self.seq_len);
        let i = tensor as usize;
        let slab = act_slab_sizes(self.vocab_size, self.heads, self.channels, b, t)[i];
        let start = self.offsets[i] + l * slab;
        start..start + slab
    }
}

/// Borrow pairwise-disjoint ranges of one flat buffer as mutable slices
///
/// Returns the views in the order the ranges were given, independent of
/// their position in the buffer. Panics if any two ranges overlap; the
/// plans above only hand out non-overlapping ranges, so a panic here means
/// a driver bug, not a data condition.
pub fn disjoint_views_mut<const N: usize>(
    buf: &mut [f32],
    ranges: [Range<usize>; N],
) -> [&mut [f32]; N] {
    let mut order: [usize; N] = std::array::from_fn(|i| i);
    order.sort_unstable_by_key(|&i| ranges[i].start);
    for w in order.windows(2) {
        assert!(
            ranges[w[0]].end <= ranges[w[1]].start,
            "overlapping views: {:?} and {:?}",
            ranges[w[0]],
            ranges[w[1]]
        );
    }

    let mut views: [Option<&mut [f32]>; N] = std::array::from_fn(|_| None);
    let mut rest = buf;
    let mut consumed = 0usize;
    for &i in &order {
        let range = ranges[i].clone();
        let tail = std::mem::take(&mut rest);
        let (_, tail) = tail.split_at_mut(range.start - consumed);
        let (view, tail) = tail.split_at_mut(range.end - range.start);
        rest = tail;
        consumed = range.end;
        views[i] = Some(view);
    }
    views.map(|v| v.expect("every requested range yields a view"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> Config {
        Config {
            max_seq_len: 8,
            vocab_size: 11,
            num_layers: 2,
            num_heads: 2,
            channels: 4,
        }
    }

    #[test]
    fn test_param_plan_totals_gpt2_124m() {
        let config = Config {
            max_seq_len: 1024,
            vocab_size: 50257,
            num_layers: 12,
            num_heads: 12,
            channels: 768,
        };
        let plan = ParamPlan::new(&config);
        // Known parameter count of the GPT-2 124M checkpoint
        assert_eq!(plan.total_len(), 124_439_808);
    }

    #[test]
    fn test_param_plan_is_contiguous_and_ordered() {
        let plan = ParamPlan::new(&tiny_config());
        let mut cursor = 0usize;
        for tensor in ParamTensor::ALL {
            let r = plan.range(tensor);
            assert_eq!(r.start, cursor, "{:?} not contiguous", tensor);
            assert_eq!(r.len(), plan.len(tensor));
            cursor = r.end;
        }
        assert_eq!(cursor, plan.total_len());
    }

    #[test]
    fn test_param_layer_ranges_tile_the_tensor() {
        let config = tiny_config();
        let plan = ParamPlan::new(&config);
        let full = plan.range(ParamTensor::QkvW);
        let r0 = plan.layer_range(ParamTensor::QkvW, 0);
        let r1 = plan.layer_range(ParamTensor::QkvW, 1);
        assert_eq!(r0.start, full.start);
        assert_eq!(r0.end, r1.start);
        assert_eq!(r1.end, full.end);
        assert_eq!(r0.len(), 3 * config.channels * config.channels);
    }

    #[test]
    #[should_panic(expected = "no layer dimension")]
    fn test_param_layer_range_rejects_global_tensor() {
        let plan = ParamPlan::new(&tiny_config());
        plan.layer_range(ParamTensor::Wte, 0);
    }

    #[test]
    fn test_act_plan_sizes() {
        let config = tiny_config();
        let (b, t) = (3, 5);
        let plan = ActPlan::new(&config, b, t);
        let c = config.channels;
        let nh = config.num_heads;
        let l = config.num_layers;
        assert_eq!(plan.len(ActTensor::Encoded), b * t * c);
        assert_eq!(plan.len(ActTensor::Qkv), l * b * t * 3 * c);
        assert_eq!(plan.len(ActTensor::Att), l * b * nh * t * t);
        assert_eq!(plan.len(ActTensor::Logits), b * t * config.vocab_size);
        assert_eq!(plan.len(ActTensor::Losses), b * t);

        let mut cursor = 0usize;
        for tensor in ActTensor::ALL {
            let r = plan.range(tensor);
            assert_eq!(r.start, cursor);
            cursor = r.end;
        }
        assert_eq!(cursor, plan.total_len());
    }

    #[test]
    fn test_act_layer_view_at_allocated_shape() {
        let config = tiny_config();
        let (b, t) = (2, 4);
        let plan = ActPlan::new(&config, b, t);
        let full = plan.range(ActTensor::Residual3);
        let per_layer = full.len() / config.num_layers;
        let r1 = plan.layer_view(ActTensor::Residual3, 1, b, t);
        assert_eq!(r1.start, full.start + per_layer);
        assert_eq!(r1.len(), per_layer);
    }

    #[test]
    fn test_act_views_shrink_with_current_shape() {
        // A smaller forward reuses the allocation with dense layer slabs
        let config = tiny_config();
        let plan = ActPlan::new(&config, 4, 6);
        let (b, t) = (1, 3);
        let c = config.channels;

        let enc = plan.view(ActTensor::Encoded, b, t);
        assert_eq!(enc.len(), b * t * c);
        assert_eq!(enc.start, plan.range(ActTensor::Encoded).start);

        let qkv1 = plan.layer_view(ActTensor::Qkv, 1, b, t);
        assert_eq!(qkv1.len(), b * t * 3 * c);
        assert_eq!(
            qkv1.start,
            plan.range(ActTensor::Qkv).start + b * t * 3 * c
        );
        // the last layer's dense slab still fits inside the allocation
        let last = plan.layer_view(ActTensor::Qkv, config.num_layers - 1, b, t);
        assert!(last.end <= plan.range(ActTensor::Qkv).end);
    }

    #[test]
    fn test_disjoint_views_mut_orders_and_writes() {
        let mut buf: Vec<f32> = (0..10).map(|i| i as f32).collect();
        // Ranges intentionally out of buffer order
        let [hi, lo] = disjoint_views_mut(&mut buf, [6..9, 1..3]);
        assert_eq!(&hi[..], &[6.0, 7.0, 8.0]);
        assert_eq!(&lo[..], &[1.0, 2.0]);
        hi[0] = -1.0;
        lo[1] = -2.0;
        assert_eq!(buf[6], -1.0);
        assert_eq!(buf[2], -2.0);
    }

    #[test]
    #[should_panic(expected = "overlapping views")]
    fn test_disjoint_views_mut_rejects_overlap() {
        let mut buf = vec![0.0f32; 8];
        disjoint_views_mut(&mut buf, [0..4, 3..6]);
    }
}
