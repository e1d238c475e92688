use crate::{CGROUP_TAIL_CALL_MAP, XDP_TAIL_CALL_MAP};

/// A closed enumeration of the slots of one jump table.
///
/// Each implementor is bound to exactly one table through [`Self::MAP_NAME`],
/// so an index of one domain cannot be used to address the other table.
pub trait TailCallIndex: Copy + Eq + Sized + 'static {
    /// Name of the program array this enumeration indexes.
    const MAP_NAME: &'static str;

    /// Every slot of the enumeration, in pipeline order.
    const ALL: &'static [Self];

    /// The slot number used as the `bpf_tail_call` key.
    fn index(self) -> u32;

    /// The stable name of the slot, as used in tail-call plans.
    fn name(self) -> &'static str;

    /// Returns the enumerated slot with the given number, if any.
    fn from_index(index: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.index() == index)
    }

    /// Returns the enumerated slot with the given name, if any.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.name() == name)
    }
}

/// Slots of the connect-hook table, one handler per address family.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CgroupTailCallIndex {
    /// `cgroup/connect4` handler.
    Connect4 = 0,
    /// `cgroup/connect6` handler.
    Connect6 = 1,
}

impl TailCallIndex for CgroupTailCallIndex {
    const MAP_NAME: &'static str = CGROUP_TAIL_CALL_MAP;
    const ALL: &'static [Self] = &[Self::Connect4, Self::Connect6];

    #[inline(always)]
    fn index(self) -> u32 {
        self as u32
    }

    fn name(self) -> &'static str {
        match self {
            Self::Connect4 => "connect4",
            Self::Connect6 => "connect6",
        }
    }
}

/// Slots of the edge (XDP) pipeline.
///
/// The order is the intended pipeline order: cheap coarse filtering first,
/// fine-grained evaluation second, and deferral to the user-space assisted
/// authorization last. Nothing sequences them automatically; a stage that
/// wants the next one must tail call it.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum XdpTailCallIndex {
    /// Coarse policy filtering.
    PoliciesCheck = 0,
    /// Fine-grained policy evaluation.
    PolicyCheck = 1,
    /// Hand the decision to the user-space assisted authorization path.
    AuthInUserSpace = 2,
}

impl XdpTailCallIndex {
    /// The stage that follows `self` in the pipeline.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::PoliciesCheck => Some(Self::PolicyCheck),
            Self::PolicyCheck => Some(Self::AuthInUserSpace),
            Self::AuthInUserSpace => None,
        }
    }
}

impl TailCallIndex for XdpTailCallIndex {
    const MAP_NAME: &'static str = XDP_TAIL_CALL_MAP;
    const ALL: &'static [Self] = &[
        Self::PoliciesCheck,
        Self::PolicyCheck,
        Self::AuthInUserSpace,
    ];

    #[inline(always)]
    fn index(self) -> u32 {
        self as u32
    }

    fn name(self) -> &'static str {
        match self {
            Self::PoliciesCheck => "policies_check",
            Self::PolicyCheck => "policy_check",
            Self::AuthInUserSpace => "auth_in_user_space",
        }
    }
}
