//! Dispatch-table upgrade planning.
//!
//! With A = old module selectors and B = new module selectors:
//! `B \ A` is added, `A ∩ B` is replaced, `A \ B` is removed (target zero).
//! Empty edit kinds are dropped; the registry rejects empty-selector edits.

use alloy_primitives::{Address, Selector};
use std::collections::BTreeSet;

use crate::selector::INTROSPECTION_SELECTOR;
use crate::{abi, AbiValue};

pub const APPLY_DISPATCH_EDITS_SIGNATURE: &str =
    "applyDispatchEdits((address,uint8,bytes4[])[],address,bytes)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DispatchAction {
    Add = 0,
    Replace = 1,
    Remove = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEdit {
    /// Zero address for removals.
    pub target: Address,
    pub action: DispatchAction,
    pub selectors: BTreeSet<Selector>,
}

impl DispatchEdit {
    pub fn to_abi(&self) -> AbiValue {
        AbiValue::Tuple(vec![
            AbiValue::Address(self.target),
            AbiValue::uint(self.action as u64),
            AbiValue::Array(self.selectors.iter().copied().map(AbiValue::selector).collect()),
        ])
    }
}

/// Selector partition between two module versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradePlan {
    pub added: BTreeSet<Selector>,
    pub replaced: BTreeSet<Selector>,
    pub removed: BTreeSet<Selector>,
}

impl UpgradePlan {
    pub fn diff(old: &BTreeSet<Selector>, new: &BTreeSet<Selector>) -> Self {
        let keep = |sel: &&Selector| **sel != INTROSPECTION_SELECTOR;
        Self {
            added: new.difference(old).filter(keep).copied().collect(),
            replaced: new.intersection(old).filter(keep).copied().collect(),
            removed: old.difference(new).filter(keep).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.replaced.is_empty() && self.removed.is_empty()
    }

    /// Edits in Add, Replace, Remove order, skipping empty sets.
    pub fn edits(&self, new_target: Address) -> Vec<DispatchEdit> {
        [
            (DispatchAction::Add, new_target, &self.added),
            (DispatchAction::Replace, new_target, &self.replaced),
            (DispatchAction::Remove, Address::ZERO, &self.removed),
        ]
        .into_iter()
        .filter(|(_, _, selectors)| !selectors.is_empty())
        .map(|(action, target, selectors)| DispatchEdit {
            target,
            action,
            selectors: selectors.clone(),
        })
        .collect()
    }
}

/// Minimal edit set moving a module from `old` to `new`.
pub fn plan_upgrade(
    old: &BTreeSet<Selector>,
    new: &BTreeSet<Selector>,
    new_target: Address,
) -> Vec<DispatchEdit> {
    UpgradePlan::diff(old, new).edits(new_target)
}

/// `applyDispatchEdits(edits, initTarget, initData)` calldata.
pub fn apply_dispatch_edits_calldata(
    edits: &[DispatchEdit],
    init_target: Address,
    init_data: &[u8],
) -> Vec<u8> {
    abi::encode_call(
        APPLY_DISPATCH_EDITS_SIGNATURE,
        &[
            AbiValue::Array(edits.iter().map(DispatchEdit::to_abi).collect()),
            AbiValue::Address(init_target),
            AbiValue::Bytes(init_data.to_vec()),
        ],
    )
}
