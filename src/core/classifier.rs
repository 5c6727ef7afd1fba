//! 指令分类器
//!
//! 把外层指令与其 CPI 内层指令展平成一个按执行顺序排列的列表：
//! 外层序号升序，同一外层内按内层序号升序。

use std::collections::HashMap;

use smallvec::SmallVec;
use solana_sdk::pubkey::Pubkey;

use crate::core::adapter::{Instruction, TransactionAdapter};
use crate::core::events::InstructionIndex;

/// 带位置的指令；`inner_index` 仅对 CPI 指令存在
#[derive(Debug, Clone, Copy)]
pub struct ClassifiedInstruction<'a> {
    pub program_id: Pubkey,
    pub instruction: &'a Instruction,
    pub outer_index: u32,
    pub inner_index: Option<u32>,
}

impl<'a> ClassifiedInstruction<'a> {
    #[inline]
    pub fn idx(&self) -> InstructionIndex {
        InstructionIndex { outer: self.outer_index, inner: self.inner_index }
    }

    #[inline]
    pub fn data(&self) -> &'a [u8] {
        &self.instruction.data
    }

    #[inline]
    pub fn accounts(&self) -> &'a [Pubkey] {
        &self.instruction.accounts
    }

    #[inline]
    pub fn starts_with(&self, discriminator: &[u8]) -> bool {
        self.instruction.data.starts_with(discriminator)
    }
}

pub struct InstructionClassifier<'a> {
    adapter: &'a TransactionAdapter,
    flat: Vec<ClassifiedInstruction<'a>>,
    by_program: HashMap<Pubkey, SmallVec<[usize; 4]>>,
    program_ids: Vec<Pubkey>,
}

impl<'a> InstructionClassifier<'a> {
    pub fn new(adapter: &'a TransactionAdapter) -> Self {
        let mut flat = Vec::with_capacity(adapter.instructions().len() * 4);
        for (outer, ix) in adapter.instructions().iter().enumerate() {
            let outer = outer as u32;
            flat.push(ClassifiedInstruction {
                program_id: ix.program_id,
                instruction: ix,
                outer_index: outer,
                inner_index: None,
            });
            for (inner, inner_ix) in adapter.inner_instructions_of(outer).iter().enumerate() {
                flat.push(ClassifiedInstruction {
                    program_id: inner_ix.program_id,
                    instruction: inner_ix,
                    outer_index: outer,
                    inner_index: Some(inner as u32),
                });
            }
        }

        let mut by_program: HashMap<Pubkey, SmallVec<[usize; 4]>> = HashMap::new();
        let mut program_ids = Vec::new();
        for (pos, ci) in flat.iter().enumerate() {
            let entry = by_program.entry(ci.program_id).or_default();
            if entry.is_empty() {
                program_ids.push(ci.program_id);
            }
            entry.push(pos);
        }

        Self { adapter, flat, by_program, program_ids }
    }

    /// 全部指令（执行顺序）
    #[inline]
    pub fn all(&self) -> &[ClassifiedInstruction<'a>] {
        &self.flat
    }

    /// 出现过的程序（首次出现顺序）
    #[inline]
    pub fn program_ids(&self) -> &[Pubkey] {
        &self.program_ids
    }

    pub fn instructions_for(&self, program_id: &Pubkey) -> Vec<ClassifiedInstruction<'a>> {
        self.by_program
            .get(program_id)
            .map(|positions| positions.iter().map(|&p| self.flat[p]).collect())
            .unwrap_or_default()
    }

    /// 多个程序的指令，合并后仍保持执行顺序
    pub fn instructions_for_any(&self, program_ids: &[Pubkey]) -> Vec<ClassifiedInstruction<'a>> {
        self.flat.iter().filter(|ci| program_ids.contains(&ci.program_id)).copied().collect()
    }

    /// 第一条前缀等于 `discriminator` 的指令，可限定程序与外层序号
    pub fn find_by_discriminator(
        &self,
        program_id: Option<&Pubkey>,
        discriminator: &[u8],
        outer_index: Option<u32>,
    ) -> Option<ClassifiedInstruction<'a>> {
        self.flat
            .iter()
            .filter(|ci| program_id.map_or(true, |p| ci.program_id == *p))
            .filter(|ci| outer_index.map_or(true, |o| ci.outer_index == o))
            .find(|ci| ci.starts_with(discriminator))
            .copied()
    }

    /// 紧随其后的内层指令（外层指令对应其第 0 条 CPI）
    pub fn next_inner(&self, after: &ClassifiedInstruction<'a>) -> Option<ClassifiedInstruction<'a>> {
        let next = after.inner_index.map_or(0, |i| i + 1);
        self.adapter
            .inner_instructions_of(after.outer_index)
            .get(next as usize)
            .map(|ix| ClassifiedInstruction {
                program_id: ix.program_id,
                instruction: ix,
                outer_index: after.outer_index,
                inner_index: Some(next),
            })
    }

    /// 同一外层下，位于 `after` 之后、满足条件的第一条内层指令
    pub fn find_inner_after<F>(
        &self,
        after: &ClassifiedInstruction<'a>,
        mut predicate: F,
    ) -> Option<ClassifiedInstruction<'a>>
    where
        F: FnMut(&ClassifiedInstruction<'a>) -> bool,
    {
        let mut cursor = *after;
        while let Some(next) = self.next_inner(&cursor) {
            if predicate(&next) {
                return Some(next);
            }
            cursor = next;
        }
        None
    }

    /// 内层指令的直接父指令：同一外层内之前最近的一条给定程序的指令，否则外层指令本身
    pub fn parent_of(
        &self,
        child: &ClassifiedInstruction<'a>,
        program_id: &Pubkey,
    ) -> Option<ClassifiedInstruction<'a>> {
        let inner = child.inner_index?;
        let siblings = self.adapter.inner_instructions_of(child.outer_index);
        for j in (0..inner as usize).rev() {
            if siblings[j].program_id == *program_id {
                return Some(ClassifiedInstruction {
                    program_id: *program_id,
                    instruction: &siblings[j],
                    outer_index: child.outer_index,
                    inner_index: Some(j as u32),
                });
            }
        }
        let outer = self.adapter.instructions().get(child.outer_index as usize)?;
        (outer.program_id == *program_id).then_some(ClassifiedInstruction {
            program_id: *program_id,
            instruction: outer,
            outer_index: child.outer_index,
            inner_index: None,
        })
    }
}
