//! The top-level compiled unit (ambient): a named platform-bound collection
//! of [`Block`]s with a distinguished entry block, the object a
//! `qcc-pass` `Pass` tree actually mutates.

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, Link};
use crate::platform::Platform;
use crate::statement::{Block, SubBlock};

/// A compiled program: one platform plus a named, goto-addressable set of
/// blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// The program's name (used in debug-artifact substitution, §4.9).
    pub name: String,
    /// The platform this program is compiled against.
    pub platform: Platform,
    /// Every block, including the entry block.
    pub blocks: Arena<Block>,
    /// The block execution starts at.
    pub entry: Link<Block>,
}

impl Program {
    /// Create a new program with a single empty `"main"` entry block.
    pub fn new(name: impl Into<String>, platform: Platform) -> Self {
        let mut blocks = Arena::new();
        let entry = blocks.insert(Block::new("main"));
        Self {
            name: name.into(),
            platform,
            blocks,
            entry,
        }
    }

    /// The entry block.
    pub fn entry_block(&self) -> &Block {
        &self.blocks[self.entry]
    }

    /// The entry block, mutably.
    pub fn entry_block_mut(&mut self) -> &mut Block {
        &mut self.blocks[self.entry]
    }

    /// Add a new named block, returning its link.
    pub fn add_block(&mut self, block: Block) -> Link<Block> {
        self.blocks.insert(block)
    }

    /// Find a block by name.
    pub fn find_block(&self, name: &str) -> Option<Link<Block>> {
        self.blocks.iter().find(|(_, b)| b.name == name).map(|(l, _)| l)
    }

    /// Visit every [`SubBlock`] reachable from every block's top-level body,
    /// recursing into nested control-flow bodies — the unit a scheduling or
    /// access-mode pass operates on independently (control-flow statements
    /// are opaque single nodes to their *enclosing* block's DDG, but their
    /// own nested bodies are themselves schedulable sub-blocks).
    pub fn for_each_sub_block_mut(&mut self, mut f: impl FnMut(&mut SubBlock)) {
        for (_, block) in self.blocks.iter_mut() {
            visit_sub_block_mut(&mut block.body, &mut f);
        }
    }
}

fn visit_sub_block_mut(body: &mut SubBlock, f: &mut impl FnMut(&mut SubBlock)) {
    use crate::statement::Statement;

    f(body);
    for stmt in &mut body.statements {
        match stmt {
            Statement::IfElse { branches, otherwise } => {
                for branch in branches {
                    visit_sub_block_mut(&mut branch.body, f);
                }
                if let Some(otherwise) = otherwise {
                    visit_sub_block_mut(otherwise, f);
                }
            }
            Statement::StaticLoop { body, .. }
            | Statement::ForLoop { body, .. }
            | Statement::RepeatUntilLoop { body, .. } => {
                visit_sub_block_mut(body, f);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Topology;

    #[test]
    fn new_program_has_main_entry() {
        let platform = Platform::new("t", Topology::linear(2));
        let program = Program::new("prog", platform);
        assert_eq!(program.entry_block().name, "main");
    }

    #[test]
    fn for_each_sub_block_mut_visits_nested_bodies() {
        let platform = Platform::new("t", Topology::linear(2));
        let mut program = Program::new("prog", platform);
        let mut inner = SubBlock::new();
        inner.push(crate::statement::Statement::dummy());
        program.entry_block_mut().body.push(crate::statement::Statement::IfElse {
            branches: vec![crate::statement::IfBranch {
                condition: crate::expr::Expr::true_condition(),
                body: inner,
            }],
            otherwise: None,
        });

        let mut visited = 0;
        program.for_each_sub_block_mut(|_| visited += 1);
        assert_eq!(visited, 2); // the top-level body and the nested if-branch body
    }
}
