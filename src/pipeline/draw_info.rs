//! Per-pass draw lists of a spatial group.
//!
//! A [`DrawInfoList`] exclusively owns the buffers and batches of every pass
//! of its group until the pass is rebuilt. Batches refer to faces through
//! generation-checked [`FaceRef`](crate::pipeline::batch::FaceRef)s; stale
//! ones are dropped, never dereferenced.

use crate::pipeline::batch::{BatchBuffer, BatchOutput, DrawBatch, FaceRef};
use crate::pipeline::classify::{PassSet, RenderPass};
use crate::pipeline::collaborators::Rasterizer;
use crate::scene::ObjectKey;

#[derive(Debug, Clone, Default)]
struct PassDrawInfo {
    buffers: Vec<BatchBuffer>,
    batches: Vec<DrawBatch>,
}

#[derive(Debug, Clone, Default)]
pub struct DrawInfoList {
    passes: [PassDrawInfo; RenderPass::COUNT],
}

impl DrawInfoList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents of `pass` with a fresh build.
    pub fn set_pass(&mut self, pass: RenderPass, output: BatchOutput) {
        let slot = &mut self.passes[pass.index()];
        slot.buffers = output.buffers;
        slot.batches = output.batches;
    }

    #[inline]
    #[must_use]
    pub fn pass(&self, pass: RenderPass) -> &[DrawBatch] {
        &self.passes[pass.index()].batches
    }

    #[inline]
    #[must_use]
    pub fn buffers(&self, pass: RenderPass) -> &[BatchBuffer] {
        &self.passes[pass.index()].buffers
    }

    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.passes.iter().map(|p| p.batches.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.iter().all(|p| p.batches.is_empty())
    }

    /// Whether any batch still draws a face of `object`.
    #[must_use]
    pub fn references(&self, object: ObjectKey) -> bool {
        self.passes
            .iter()
            .flat_map(|p| &p.batches)
            .any(|b| b.references(object))
    }

    /// Removes every batch containing a face of `object`.
    ///
    /// Other faces sharing those batches disappear with them; the returned
    /// passes must be rebuilt.
    pub fn retract_object(&mut self, object: ObjectKey) -> PassSet {
        self.retain_batches(|b| !b.references(object))
    }

    /// Removes batches with any member for which `is_live` is false.
    /// Returns the passes that lost batches.
    pub fn drop_stale<F>(&mut self, mut is_live: F) -> PassSet
    where
        F: FnMut(&FaceRef) -> bool,
    {
        self.retain_batches(|b| b.members.iter().all(|m| is_live(&m.face)))
    }

    fn retain_batches<F>(&mut self, mut keep: F) -> PassSet
    where
        F: FnMut(&DrawBatch) -> bool,
    {
        let mut touched = PassSet::EMPTY;
        for pass in RenderPass::ALL {
            let batches = &mut self.passes[pass.index()].batches;
            let before = batches.len();
            batches.retain(|b| keep(b));
            if batches.len() != before {
                touched.insert(pass);
            }
        }
        touched
    }

    /// Hands the batches of `pass` to the rasterizer, if there are any.
    pub fn submit(&self, pass: RenderPass, rasterizer: &mut dyn Rasterizer) {
        let batches = self.pass(pass);
        if !batches.is_empty() {
            rasterizer.draw_pass(pass, batches);
        }
    }
}
