//! Face classification.
//!
//! Maps a face's material state onto one of a closed set of render passes.
//! Classification is a pure function over plain data: O(1) per face, no
//! allocation, no dispatch on material type.
//!
//! Precedence (first match wins):
//!
//! | # | Condition                                   | Pass                                      |
//! |---|---------------------------------------------|-------------------------------------------|
//! | 1 | texture is alpha-only                       | `Invisible`                               |
//! | 2 | translucent                                 | `AlphaMask` if maskable, else `Alpha`     |
//! | 3 | shiny and bump shading enabled              | `Shiny` / `FullbrightShiny`               |
//! | 4 | fullbright                                  | `Fullbright`                              |
//! | 5 | bump map and bump shading enabled           | `Bump`                                    |
//! | 6 | otherwise                                   | `Simple`                                  |
//!
//! Glow is orthogonal: any face with non-zero glow is also drawn in the
//! additive `Glow` pass.

use bitflags::bitflags;

use crate::pipeline::context::RenderContext;
use crate::resources::material::{MaterialEntry, Shininess};
use crate::resources::shape::VolumeFace;

/// Render passes, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RenderPass {
    Simple = 0,
    Fullbright,
    Bump,
    Shiny,
    FullbrightShiny,
    Invisible,
    AlphaMask,
    FullbrightAlphaMask,
    Alpha,
    Glow,
}

impl RenderPass {
    pub const COUNT: usize = 10;

    /// Every pass in the order the rasterizer receives them.
    pub const ALL: [RenderPass; Self::COUNT] = [
        RenderPass::Simple,
        RenderPass::Fullbright,
        RenderPass::Bump,
        RenderPass::Shiny,
        RenderPass::FullbrightShiny,
        RenderPass::Invisible,
        RenderPass::AlphaMask,
        RenderPass::FullbrightAlphaMask,
        RenderPass::Alpha,
        RenderPass::Glow,
    ];

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Blended passes must be drawn back-to-front.
    #[inline]
    #[must_use]
    pub fn is_distance_sorted(self) -> bool {
        matches!(self, RenderPass::Alpha)
    }

    #[inline]
    #[must_use]
    pub fn batch_mode(self) -> BatchMode {
        if self.is_distance_sorted() {
            BatchMode::DistanceSorted
        } else {
            BatchMode::MaterialSorted
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RenderPass::Simple => "simple",
            RenderPass::Fullbright => "fullbright",
            RenderPass::Bump => "bump",
            RenderPass::Shiny => "shiny",
            RenderPass::FullbrightShiny => "fullbright_shiny",
            RenderPass::Invisible => "invisible",
            RenderPass::AlphaMask => "alpha_mask",
            RenderPass::FullbrightAlphaMask => "fullbright_alpha_mask",
            RenderPass::Alpha => "alpha",
            RenderPass::Glow => "glow",
        }
    }
}

/// How a pass orders faces before batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchMode {
    /// Back-to-front by camera distance; order is preserved into batches.
    DistanceSorted,
    /// By batch-breaking state, to maximize texture-compatible runs.
    MaterialSorted,
}

bitflags! {
    /// Per-face state orthogonal to the main pass.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PassFlags: u8 {
        /// Also drawn in the glow pass.
        const GLOW             = 1 << 0;
        /// Private texture-coordinate animation; never shares a batch.
        const ANIMATED_TEXTURE = 1 << 1;
        /// Needs a second UV set and binormals.
        const NEEDS_BINORMAL   = 1 << 2;
        const FULLBRIGHT       = 1 << 3;
    }
}

/// Result of classifying one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceClass {
    pub pass: RenderPass,
    pub flags: PassFlags,
}

impl FaceClass {
    #[inline]
    #[must_use]
    pub fn new(pass: RenderPass, flags: PassFlags) -> Self {
        Self { pass, flags }
    }

    /// The main pass, plus `Glow` for glowing faces.
    pub fn passes(self) -> impl Iterator<Item = RenderPass> {
        std::iter::once(self.pass).chain(
            self.flags
                .contains(PassFlags::GLOW)
                .then_some(RenderPass::Glow),
        )
    }
}

/// Set of render passes, one bit per [`RenderPass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PassSet(u16);

impl PassSet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self((1 << RenderPass::COUNT) - 1);

    #[inline]
    pub fn insert(&mut self, pass: RenderPass) {
        self.0 |= 1 << pass.index();
    }

    #[inline]
    pub fn extend(&mut self, other: PassSet) {
        self.0 |= other.0;
    }

    #[inline]
    #[must_use]
    pub fn contains(self, pass: RenderPass) -> bool {
        self.0 & (1 << pass.index()) != 0
    }

    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = RenderPass> {
        RenderPass::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<RenderPass> for PassSet {
    fn from_iter<I: IntoIterator<Item = RenderPass>>(iter: I) -> Self {
        let mut set = PassSet::EMPTY;
        for pass in iter {
            set.insert(pass);
        }
        set
    }
}

/// Assigns `face` to a render pass.
///
/// `animated_texture` marks a face whose texture matrix is animating this
/// frame. Binormals are only requested when the face has texture coordinates
/// to derive them from.
#[must_use]
pub fn classify_face(
    face: &VolumeFace,
    material: &MaterialEntry,
    animated_texture: bool,
    ctx: &RenderContext,
) -> FaceClass {
    let toggles = &ctx.toggles;

    let mut flags = PassFlags::empty();
    if material.fullbright {
        flags |= PassFlags::FULLBRIGHT;
    }
    if animated_texture {
        flags |= PassFlags::ANIMATED_TEXTURE;
    }
    if toggles.glow_enabled && material.glow_byte() > 0 {
        flags |= PassFlags::GLOW;
    }
    let bumped = toggles.bump_enabled && material.bump != 0;
    if bumped && !face.uvs.is_empty() {
        flags |= PassFlags::NEEDS_BINORMAL;
    }

    let pass = if material.texture.is_some_and(|t| t.is_alpha_only()) {
        RenderPass::Invisible
    } else if material.is_translucent() {
        if toggles.alpha_mask_enabled && material.can_render_as_mask() {
            if material.fullbright {
                RenderPass::FullbrightAlphaMask
            } else {
                RenderPass::AlphaMask
            }
        } else {
            RenderPass::Alpha
        }
    } else if material.shiny != Shininess::None && toggles.bump_enabled {
        if material.fullbright {
            RenderPass::FullbrightShiny
        } else {
            RenderPass::Shiny
        }
    } else if material.fullbright {
        RenderPass::Fullbright
    } else if bumped {
        RenderPass::Bump
    } else {
        RenderPass::Simple
    };

    FaceClass { pass, flags }
}
