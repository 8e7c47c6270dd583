//! Block catalog: static attributes for every voxel type

use crate::core::error::Error;
use crate::core::types::Result;

/// Small integer identifying a block type in a voxel buffer.
pub type BlockId = u8;

/// How a block hides the faces of its neighbors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullMask {
    /// Empty space, hides nothing.
    None,
    /// Water-like: hides only faces of the same block.
    Transparent,
    /// Foliage: leaves (self-occluding) and billboard plants.
    Cross,
    /// Solid cube, hides every face behind it.
    Opaque,
}

/// Immutable attributes of one block type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockType {
    pub name: &'static str,
    /// Atlas tile per face, ordered north, east, south, west, top, bottom.
    pub atlas: [u8; 6],
    pub cull: CullMask,
    /// Light levels lost when light passes through this block.
    pub light_loss: u8,
    /// Added to stored light when shading faces that look into this block.
    pub illumination: u8,
    /// Drawn as two crossed billboards instead of a cube.
    pub cross_section: bool,
}

impl BlockType {
    const fn solid(name: &'static str, atlas: [u8; 6]) -> Self {
        Self { name, atlas, cull: CullMask::Opaque, light_loss: 15, illumination: 0, cross_section: false }
    }

    const fn uniform(name: &'static str, tile: u8) -> Self {
        Self::solid(name, [tile; 6])
    }

    const fn billboard(name: &'static str, tile: u8) -> Self {
        Self { name, atlas: [tile; 6], cull: CullMask::Cross, light_loss: 0, illumination: 1, cross_section: true }
    }

    /// Whether the block is empty space.
    pub fn is_air(&self) -> bool {
        self.cull == CullMask::None
    }
}

pub const AIR: BlockId = 0;
pub const STONE: BlockId = 1;
pub const GRASS: BlockId = 2;
pub const LOG: BlockId = 3;
pub const LEAF: BlockId = 4;
pub const SNOW: BlockId = 5;
pub const DIRT: BlockId = 6;
pub const PLANT: BlockId = 7;
pub const TUFT: BlockId = 8;
pub const WATER: BlockId = 9;
pub const SAND: BlockId = 10;
pub const SANDSTONE: BlockId = 11;
pub const MARSH: BlockId = 12;
pub const TWIG: BlockId = 13;
pub const GOLD: BlockId = 14;
pub const IRON: BlockId = 15;
pub const COAL: BlockId = 16;
pub const DIAMOND: BlockId = 17;
pub const MOSSY_BRICK: BlockId = 18;
pub const PATCH: BlockId = 19;

static BLOCKS: [BlockType; 20] = [
    BlockType { name: "air", atlas: [0; 6], cull: CullMask::None, light_loss: 0, illumination: 1, cross_section: false },
    BlockType::uniform("stone", 1),
    BlockType::solid("grass", [3, 3, 3, 3, 0, 2]),
    BlockType::solid("log", [116, 116, 116, 116, 21, 21]),
    BlockType { name: "leaf", atlas: [52; 6], cull: CullMask::Cross, light_loss: 1, illumination: 1, cross_section: false },
    BlockType::uniform("snow", 66),
    BlockType::uniform("dirt", 2),
    BlockType::billboard("plant", 28),
    BlockType::billboard("tuft", 39),
    BlockType { name: "water", atlas: [222; 6], cull: CullMask::Transparent, light_loss: 1, illumination: 1, cross_section: false },
    BlockType::uniform("sand", 18),
    BlockType::uniform("sandstone", 142),
    BlockType::uniform("marsh", 78),
    BlockType::billboard("twig", 55),
    BlockType::uniform("gold", 32),
    BlockType::uniform("iron", 33),
    BlockType::uniform("coal", 34),
    BlockType::uniform("diamond", 50),
    BlockType::uniform("mossy_brick", 100),
    BlockType::uniform("patch", 64),
];

/// Look up a block type by id.
pub fn lookup(id: BlockId) -> Result<&'static BlockType> {
    BLOCKS.get(id as usize).ok_or(Error::InvalidBlockId(id))
}

/// Number of entries in the catalog.
pub fn count() -> usize {
    BLOCKS.len()
}

/// Find a block id by name.
pub fn id_of(name: &str) -> Option<BlockId> {
    BLOCKS.iter().position(|b| b.name == name).map(|i| i as BlockId)
}

/// Membership table over block ids, used for conditional writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSet([bool; 256]);

impl BlockSet {
    pub const fn of(ids: &[BlockId]) -> Self {
        let mut table = [false; 256];
        let mut i = 0;
        while i < ids.len() {
            table[ids[i] as usize] = true;
            i += 1;
        }
        Self(table)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.0[id as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_in_range() {
        assert_eq!(lookup(AIR).unwrap().name, "air");
        assert_eq!(lookup(WATER).unwrap().cull, CullMask::Transparent);
        assert_eq!(lookup(PATCH).unwrap().name, "patch");
    }

    #[test]
    fn test_lookup_out_of_range() {
        assert!(matches!(lookup(20), Err(Error::InvalidBlockId(20))));
        assert!(matches!(lookup(255), Err(Error::InvalidBlockId(255))));
    }

    #[test]
    fn test_ids_match_names() {
        let named = [
            (STONE, "stone"), (GRASS, "grass"), (LOG, "log"), (LEAF, "leaf"),
            (SNOW, "snow"), (DIRT, "dirt"), (PLANT, "plant"), (TUFT, "tuft"),
            (SAND, "sand"), (SANDSTONE, "sandstone"), (MARSH, "marsh"), (TWIG, "twig"),
            (GOLD, "gold"), (IRON, "iron"), (COAL, "coal"), (DIAMOND, "diamond"),
            (MOSSY_BRICK, "mossy_brick"),
        ];
        for (id, name) in named {
            assert_eq!(id_of(name), Some(id));
        }
        assert_eq!(count(), 20);
    }

    #[test]
    fn test_light_attenuation_is_consistent() {
        for id in 0..count() as BlockId {
            let block = lookup(id).unwrap();
            match block.cull {
                CullMask::Opaque => {
                    assert_eq!(block.light_loss, 15);
                    assert_eq!(block.illumination, 0);
                }
                CullMask::None => assert_eq!(block.light_loss, 0),
                CullMask::Transparent => assert_eq!(block.light_loss, 1),
                CullMask::Cross if block.cross_section => assert_eq!(block.light_loss, 0),
                CullMask::Cross => assert_eq!(block.light_loss, 1),
            }
        }
    }

    #[test]
    fn test_block_set() {
        let set = BlockSet::of(&[STONE, DIRT]);
        assert!(set.contains(STONE));
        assert!(set.contains(DIRT));
        assert!(!set.contains(AIR));
        assert!(!set.contains(255));
    }
}
