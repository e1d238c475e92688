//! Tail call plans: which program the loader puts in which slot.
//!
//! A plan is written with raw stage names or numbers, so this is where the
//! closed enumerations are enforced. Every entry is checked once, when the
//! plan is built, and the resulting [`TailCallPlan`] only holds typed indices.

use std::{collections::HashSet, fmt};

use kdispatch_common::{
    CgroupTailCallIndex, TailCallIndex, XdpTailCallIndex, MAP_SIZE_OF_TAIL_CALL_PROG,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DispatchError, Result},
    table::ProgramRegistry,
};

/// The two jump tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// The connect-hook table.
    Cgroup,
    /// The edge pipeline table.
    Xdp,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cgroup => "cgroup",
            Self::Xdp => "xdp",
        })
    }
}

/// A slot, by name or by number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageRef {
    Index(u32),
    Name(String),
}

impl fmt::Display for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// One line of a plan: install `program` at `stage` of `table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TailCallEntry {
    pub table: Table,
    pub stage: StageRef,
    /// Name of the program in the loaded eBPF object.
    pub program: String,
}

impl TailCallEntry {
    pub fn new(table: Table, stage: StageRef, program: impl Into<String>) -> Self {
        Self {
            table,
            stage,
            program: program.into(),
        }
    }

    fn resolve<I: TailCallIndex>(&self) -> Result<I> {
        let unknown = || DispatchError::UnknownStage {
            table: self.table,
            stage: self.stage.to_string(),
        };
        match &self.stage {
            StageRef::Index(index) if *index >= MAP_SIZE_OF_TAIL_CALL_PROG => {
                Err(DispatchError::OutOfBounds {
                    index: *index,
                    max_entries: MAP_SIZE_OF_TAIL_CALL_PROG,
                })
            }
            StageRef::Index(index) => I::from_index(*index).ok_or_else(unknown),
            StageRef::Name(name) => I::from_name(name).ok_or_else(unknown),
        }
    }
}

/// A validated assignment of programs to slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailCallPlan {
    cgroup: Vec<(CgroupTailCallIndex, String)>,
    xdp: Vec<(XdpTailCallIndex, String)>,
}

impl TailCallPlan {
    /// Validates `entries`.
    ///
    /// Rejects numeric slots outside the table capacity, slots that are not
    /// part of the table's enumeration, and slots assigned twice.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a TailCallEntry>) -> Result<Self> {
        let mut plan = Self::default();
        let mut seen_cgroup = HashSet::new();
        let mut seen_xdp = HashSet::new();
        for entry in entries {
            match entry.table {
                Table::Cgroup => {
                    let index = entry.resolve::<CgroupTailCallIndex>()?;
                    push(&mut plan.cgroup, &mut seen_cgroup, entry, index)?;
                }
                Table::Xdp => {
                    let index = entry.resolve::<XdpTailCallIndex>()?;
                    push(&mut plan.xdp, &mut seen_xdp, entry, index)?;
                }
            }
        }
        Ok(plan)
    }

    /// Connect handlers, in plan order.
    pub fn cgroup(&self) -> &[(CgroupTailCallIndex, String)] {
        &self.cgroup
    }

    /// Edge pipeline stages, in plan order.
    pub fn xdp(&self) -> &[(XdpTailCallIndex, String)] {
        &self.xdp
    }

    pub fn is_empty(&self) -> bool {
        self.cgroup.is_empty() && self.xdp.is_empty()
    }

    /// Looks up the program of every entry, connect handlers with `cgroup`
    /// and edge stages with `xdp`.
    ///
    /// Nothing is installed here. Every name is resolved before the first
    /// slot of either table is written, so a plan naming a missing program
    /// fails without touching the tables.
    pub fn resolve<C, X>(
        &self,
        mut cgroup: impl FnMut(&str) -> Result<C>,
        mut xdp: impl FnMut(&str) -> Result<X>,
    ) -> Result<ResolvedPlan<C, X>> {
        Ok(ResolvedPlan {
            cgroup: self
                .cgroup
                .iter()
                .map(|(index, name)| Ok((*index, cgroup(name)?)))
                .collect::<Result<_>>()?,
            xdp: self
                .xdp
                .iter()
                .map(|(index, name)| Ok((*index, xdp(name)?)))
                .collect::<Result<_>>()?,
        })
    }
}

/// A [`TailCallPlan`] whose program names have been turned into programs.
pub struct ResolvedPlan<C, X> {
    cgroup: Vec<(CgroupTailCallIndex, C)>,
    xdp: Vec<(XdpTailCallIndex, X)>,
}

impl<C, X> fmt::Debug for ResolvedPlan<C, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPlan")
            .field(
                "cgroup",
                &self
                    .cgroup
                    .iter()
                    .map(|(index, _)| index.name())
                    .collect::<Vec<_>>(),
            )
            .field(
                "xdp",
                &self
                    .xdp
                    .iter()
                    .map(|(index, _)| index.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<C, X> ResolvedPlan<C, X> {
    /// Writes every program into its slot, connect handlers first.
    pub fn install(
        self,
        cgroup: &mut impl ProgramRegistry<CgroupTailCallIndex, Program = C>,
        xdp: &mut impl ProgramRegistry<XdpTailCallIndex, Program = X>,
    ) -> Result<()> {
        let Self {
            cgroup: handlers,
            xdp: stages,
        } = self;
        for (index, program) in handlers {
            cgroup.install(index, program)?;
        }
        for (index, program) in stages {
            xdp.install(index, program)?;
        }
        Ok(())
    }
}

fn push<I: TailCallIndex + std::hash::Hash>(
    entries: &mut Vec<(I, String)>,
    seen: &mut HashSet<I>,
    entry: &TailCallEntry,
    index: I,
) -> Result<()> {
    if !seen.insert(index) {
        return Err(DispatchError::DuplicateEntry {
            table: entry.table,
            stage: index.name(),
        });
    }
    entries.push((index, entry.program.clone()));
    Ok(())
}
