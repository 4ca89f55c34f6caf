//! Owning container for every block of a source.
//!
//! Blocks refer to each other by name through [`BlockLookup`]; no block
//! holds a pointer to another. Resolving one block needs it mutably while
//! the rest stay readable, which [`BlockArena::split_at_key`] provides.

use crate::block::DataBlock;
use crate::feature::BlockKey;

/// Read access to blocks by name.
pub trait BlockLookup {
    /// Block called `name`, if declared.
    fn lookup(&self, name: &str) -> Option<&dyn DataBlock>;
}

/// Blocks in declaration order, addressed by [`BlockKey`].
#[derive(Debug)]
pub struct BlockArena<B> {
    blocks: Vec<B>,
}

impl<B> Default for BlockArena<B> {
    fn default() -> Self {
        Self { blocks: Vec::new() }
    }
}

impl<B: DataBlock> BlockArena<B> {
    /// Wrap blocks whose keys already match their positions.
    #[must_use]
    pub const fn from_blocks(blocks: Vec<B>) -> Self {
        Self { blocks }
    }

    /// Key the next pushed block will receive.
    #[must_use]
    pub fn next_key(&self) -> BlockKey {
        BlockKey(self.blocks.len())
    }

    /// Append a block and return its key.
    pub fn push(&mut self, block: B) -> BlockKey {
        let key = self.next_key();
        self.blocks.push(block);
        key
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no block has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block stored under `key`.
    #[must_use]
    pub fn get(&self, key: BlockKey) -> Option<&B> {
        self.blocks.get(key.0)
    }

    /// Mutable block stored under `key`.
    pub fn get_mut(&mut self, key: BlockKey) -> Option<&mut B> {
        self.blocks.get_mut(key.0)
    }

    /// Key of the block called `name`.
    #[must_use]
    pub fn key_of(&self, name: &str) -> Option<BlockKey> {
        self.blocks
            .iter()
            .position(|block| block.name() == name)
            .map(BlockKey)
    }

    /// Block called `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&B> {
        self.blocks.iter().find(|block| block.name() == name)
    }

    /// Mutable block called `name`.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut B> {
        self.blocks.iter_mut().find(|block| block.name() == name)
    }

    /// Blocks in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &B> {
        self.blocks.iter()
    }

    /// Mutable blocks in declaration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut B> {
        self.blocks.iter_mut()
    }

    /// Borrow one block mutably alongside a read-only view of the others.
    pub fn split_at_key(&mut self, key: BlockKey) -> Option<(&mut B, ArenaView<'_, B>)> {
        if key.0 >= self.blocks.len() {
            return None;
        }
        let (before, rest) = self.blocks.split_at_mut(key.0);
        let (target, after) = rest.split_first_mut()?;
        Some((target, ArenaView { before, after }))
    }
}

impl<B: DataBlock> BlockLookup for BlockArena<B> {
    fn lookup(&self, name: &str) -> Option<&dyn DataBlock> {
        self.find(name).map(|block| block as &dyn DataBlock)
    }
}

/// Every block except the one borrowed by [`BlockArena::split_at_key`].
#[derive(Debug)]
pub struct ArenaView<'a, B> {
    before: &'a [B],
    after: &'a [B],
}

impl<B: DataBlock> BlockLookup for ArenaView<'_, B> {
    fn lookup(&self, name: &str) -> Option<&dyn DataBlock> {
        self.before
            .iter()
            .chain(self.after)
            .find(|block| block.name() == name)
            .map(|block| block as &dyn DataBlock)
    }
}
