use serde::{Deserialize, Serialize};

/// Opaque texture identity handed out by the texture cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TextureId(pub u64);

/// Primary pixel format of a texture, as far as classification cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Rgb,
    Rgba,
    Luminance,
    LuminanceAlpha,
    /// Alpha-only textures mark invisible (depth-only) surfaces.
    Alpha,
}

/// What the alpha channel of a texture contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaKind {
    #[default]
    Opaque,
    /// Every texel is fully opaque or fully transparent.
    Binary,
    Blended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureInfo {
    pub id: TextureId,
    pub format: PixelFormat,
    pub alpha: AlphaKind,
}

impl TextureInfo {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id: TextureId(id),
            format: PixelFormat::Rgb,
            alpha: AlphaKind::Opaque,
        }
    }

    #[must_use]
    pub fn with_alpha(mut self, alpha: AlphaKind) -> Self {
        self.format = PixelFormat::Rgba;
        self.alpha = alpha;
        self
    }

    #[must_use]
    pub fn alpha_only(mut self) -> Self {
        self.format = PixelFormat::Alpha;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_alpha_only(&self) -> bool {
        self.format == PixelFormat::Alpha
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Shininess {
    #[default]
    None,
    Low,
    Medium,
    High,
}

/// Per-face material state (one entry per face slot of an object).
///
/// This is plain data; the render pass a face lands in is decided by
/// [`classify_face`](crate::pipeline::classify_face), not by the material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialEntry {
    pub texture: Option<TextureInfo>,
    /// Alpha of the face tint color.
    pub color_alpha: f32,
    pub fullbright: bool,
    pub shiny: Shininess,
    /// Bump map id; `0` means none.
    pub bump: u8,
    /// Glow intensity in `[0, 1]`.
    pub glow: f32,
}

impl Default for MaterialEntry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl MaterialEntry {
    /// Opaque, untextured, lit.
    pub const DEFAULT: Self = Self {
        texture: None,
        color_alpha: 1.0,
        fullbright: false,
        shiny: Shininess::None,
        bump: 0,
        glow: 0.0,
    };

    #[must_use]
    pub fn textured(texture: TextureInfo) -> Self {
        Self {
            texture: Some(texture),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn texture_id(&self) -> Option<TextureId> {
        self.texture.map(|t| t.id)
    }

    /// Blended either through the tint color or the texture's alpha channel.
    #[inline]
    #[must_use]
    pub fn is_translucent(&self) -> bool {
        self.color_alpha < 1.0
            || self
                .texture
                .is_some_and(|t| t.alpha != AlphaKind::Opaque && !t.is_alpha_only())
    }

    /// The alpha channel can be thresholded instead of blended.
    #[inline]
    #[must_use]
    pub fn can_render_as_mask(&self) -> bool {
        self.color_alpha >= 1.0 && self.texture.is_some_and(|t| t.alpha == AlphaKind::Binary)
    }

    /// Glow quantized to a byte; batches only merge faces with equal values.
    #[inline]
    #[must_use]
    pub fn glow_byte(&self) -> u8 {
        (self.glow.clamp(0.0, 1.0) * 255.0) as u8
    }
}
