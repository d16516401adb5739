use bitflags::bitflags;

bitflags! {
    /// Vertex channels a batch buffer must carry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AttributeMask: u32 {
        const POSITION      = 1 << 0;
        const NORMAL        = 1 << 1;
        const TEXCOORD0     = 1 << 2;
        const TEXCOORD1     = 1 << 3;
        const COLOR         = 1 << 4;
        const BINORMAL      = 1 << 5;
        const WEIGHT        = 1 << 6;
        const WEIGHT4       = 1 << 7;
        const TEXTURE_INDEX = 1 << 8;
    }
}

impl AttributeMask {
    /// Lit opaque geometry.
    pub const SIMPLE: Self = Self::POSITION
        .union(Self::NORMAL)
        .union(Self::TEXCOORD0)
        .union(Self::COLOR);
    /// Unlit geometry does not need normals.
    pub const FULLBRIGHT: Self = Self::POSITION.union(Self::TEXCOORD0).union(Self::COLOR);
    /// Bump mapping adds a second UV set and binormals.
    pub const BUMP: Self = Self::SIMPLE.union(Self::TEXCOORD1).union(Self::BINORMAL);

    /// Byte size of one vertex carrying these channels.
    ///
    /// Positions, normals and binormals are stored padded to four floats.
    #[must_use]
    pub fn vertex_size(self) -> u32 {
        const SIZES: [(AttributeMask, u32); 9] = [
            (AttributeMask::POSITION, 16),
            (AttributeMask::NORMAL, 16),
            (AttributeMask::TEXCOORD0, 8),
            (AttributeMask::TEXCOORD1, 8),
            (AttributeMask::COLOR, 4),
            (AttributeMask::BINORMAL, 16),
            (AttributeMask::WEIGHT, 4),
            (AttributeMask::WEIGHT4, 16),
            (AttributeMask::TEXTURE_INDEX, 4),
        ];
        SIZES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, size)| size)
            .sum()
    }
}
