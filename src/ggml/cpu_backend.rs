//! CPU backend for ggml ops.
//!
//! Tensors live in host byte buffers. Kernels run on rayon, either on the
//! global pool or on a dedicated pool sized by [`BackendConfig::num_threads`].
//! Every op has completed when `execute_op` returns.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::BackendConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::ggml::{GgmlBackend, Op, TensorDesc, TensorId, TensorView, TensorViewMut};
use crate::kernels::element::sigmoid;
use crate::kernels::quant::{dequantize_tensor, quantize_tensor};
use crate::kernels::reduce::{group_norm, sum_rows};
use crate::kernels::sort::argsort;
use crate::shape_error;

/// CPU backend over host byte buffers
pub struct CpuBackend {
    config: BackendConfig,
    pool: Option<Arc<ThreadPool>>,
    tensors: HashMap<TensorId, (TensorDesc, Vec<u8>)>,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    /// Backend with the default configuration on rayon's global pool
    pub fn new() -> Self {
        Self {
            config: BackendConfig::default(),
            pool: None,
            tensors: HashMap::new(),
        }
    }

    /// Backend with a validated configuration.
    ///
    /// Builds a dedicated worker pool when `num_threads` is set.
    pub fn with_config(config: BackendConfig) -> ForgeResult<Self> {
        config.validate()?;
        let pool = match config.num_threads {
            Some(threads) => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("tensorforge-cpu-{}", i))
                    .build()?;
                Some(Arc::new(pool))
            }
            None => None,
        };
        tracing::info!(
            subgroup_size = config.subgroup_size,
            max_local_size = config.max_local_size,
            num_threads = ?config.num_threads,
            "CPU backend created"
        );
        Ok(Self {
            config,
            pool,
            tensors: HashMap::new(),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Number of worker threads kernels run on
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    /// Run `kernel` over `input` and `output`.
    ///
    /// The output entry is taken out of the map for the duration of the
    /// kernel so the input can be borrowed alongside it. An op whose input
    /// and output are the same tensor reads from a snapshot.
    fn run_unary<F>(&mut self, op: &Op, input: TensorId, output: TensorId, kernel: F) -> ForgeResult<()>
    where
        F: FnOnce(&TensorView<'_>, &mut TensorViewMut<'_>) -> ForgeResult<()> + Send,
    {
        let (out_desc, mut out_buf) = self
            .tensors
            .remove(&output)
            .ok_or(ForgeError::TensorNotFound(output.0))?;

        tracing::debug!(
            op = op.name(),
            input = input.0,
            output = output.0,
            src_type = %self.tensors.get(&input).map_or(out_desc.dtype, |(d, _)| d.dtype),
            dst_type = %out_desc.dtype,
            "execute_op"
        );

        let pool = self.pool.as_deref();
        let result = if input == output {
            let snapshot = out_buf.clone();
            launch(pool, &out_desc, &snapshot, &out_desc, &mut out_buf, kernel)
        } else {
            match self.tensors.get(&input) {
                Some((in_desc, in_buf)) => launch(pool, in_desc, in_buf, &out_desc, &mut out_buf, kernel),
                None => Err(ForgeError::TensorNotFound(input.0)),
            }
        };

        self.tensors.insert(output, (out_desc, out_buf));
        if let Err(err) = &result {
            tracing::warn!(op = op.name(), error = %err, "op rejected");
        }
        result
    }
}

fn launch<F>(
    pool: Option<&ThreadPool>,
    in_desc: &TensorDesc,
    in_buf: &[u8],
    out_desc: &TensorDesc,
    out_buf: &mut [u8],
    kernel: F,
) -> ForgeResult<()>
where
    F: FnOnce(&TensorView<'_>, &mut TensorViewMut<'_>) -> ForgeResult<()> + Send,
{
    let run = move || {
        let src = TensorView::from_desc(in_buf, in_desc)?;
        let mut dst = TensorViewMut::from_desc(out_buf, out_desc)?;
        kernel(&src, &mut dst)
    };
    match pool {
        Some(pool) => pool.install(run),
        None => run(),
    }
}

fn unary_operands(op: &Op, inputs: &[TensorId], outputs: &[TensorId]) -> ForgeResult<(TensorId, TensorId)> {
    if inputs.len() != 1 || outputs.len() != 1 {
        return Err(shape_error!(
            "{} requires 1 input and 1 output, got {} inputs and {} outputs",
            op.name(),
            inputs.len(),
            outputs.len()
        ));
    }
    Ok((inputs[0], outputs[0]))
}

impl GgmlBackend for CpuBackend {
    type Buffer = Vec<u8>;

    fn alloc(&mut self, desc: &TensorDesc) -> ForgeResult<()> {
        let buffer = vec![0u8; desc.required_bytes()];
        self.tensors.insert(desc.id, (desc.clone(), buffer));
        Ok(())
    }

    fn bind(&mut self, desc: &TensorDesc, buffer: Self::Buffer) -> ForgeResult<()> {
        let required = desc.required_bytes();
        if buffer.len() < required {
            return Err(ForgeError::ViewOutOfBounds {
                required,
                available: buffer.len(),
            });
        }
        self.tensors.insert(desc.id, (desc.clone(), buffer));
        Ok(())
    }

    fn free(&mut self, id: TensorId) -> ForgeResult<()> {
        self.tensors
            .remove(&id)
            .map(|_| ())
            .ok_or(ForgeError::TensorNotFound(id.0))
    }

    fn tensor_desc(&self, id: TensorId) -> Option<&TensorDesc> {
        self.tensors.get(&id).map(|(desc, _)| desc)
    }

    fn buffer(&self, id: TensorId) -> Option<&Self::Buffer> {
        self.tensors.get(&id).map(|(_, buf)| buf)
    }

    fn buffer_mut(&mut self, id: TensorId) -> Option<&mut Self::Buffer> {
        self.tensors.get_mut(&id).map(|(_, buf)| buf)
    }

    fn execute_op(
        &mut self,
        op: &Op,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> ForgeResult<()> {
        let (input, output) = unary_operands(op, inputs, outputs)?;
        match op {
            Op::Sigmoid => self.run_unary(op, input, output, |src, dst| sigmoid(src, dst)),
            Op::SumRows => self.run_unary(op, input, output, |src, dst| sum_rows(src, dst)),
            Op::GroupNorm { group_size, eps } => {
                let (group_size, eps) = (*group_size, *eps);
                let local_size = self.config.subgroup_size;
                self.run_unary(op, input, output, move |src, dst| {
                    group_norm(src, dst, group_size, eps, local_size)
                })
            }
            Op::ArgSort { order } => {
                let order = *order;
                let max_local_size = self.config.max_local_size;
                self.run_unary(op, input, output, move |src, dst| {
                    argsort(src, dst, order, max_local_size)
                })
            }
            Op::Quantize => self.run_unary(op, input, output, |src, dst| quantize_tensor(src, dst)),
            Op::Dequantize => self.run_unary(op, input, output, |src, dst| dequantize_tensor(src, dst)),
        }
    }

    fn synchronize(&mut self) -> ForgeResult<()> {
        Ok(())
    }
}
