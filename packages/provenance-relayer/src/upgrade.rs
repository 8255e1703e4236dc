//! Module upgrades: diff two compiled ABIs into dispatch edits and apply them
//! through the custody account.

use alloy_primitives::{Address, Selector};
use provenance_types::dispatch::apply_dispatch_edits_calldata;
use provenance_types::selector::module_selectors;
use provenance_types::{plan_upgrade, DispatchEdit};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use crate::custody::CustodyAccount;
use crate::ledger::Receipt;
use crate::Error;

pub struct UpgradeExecutor {
    dispatcher: Address,
    custody: Arc<dyn CustodyAccount>,
}

impl UpgradeExecutor {
    /// `dispatcher` owns the dispatch table (the relay diamond).
    pub fn new(dispatcher: Address, custody: Arc<dyn CustodyAccount>) -> Self {
        Self {
            dispatcher,
            custody,
        }
    }

    /// Edits moving a module from `old_abi` (absent for a fresh install) to `new_abi`.
    pub fn plan(
        old_abi: Option<&Value>,
        new_abi: &Value,
        new_target: Address,
    ) -> Result<Vec<DispatchEdit>, Error> {
        let old: BTreeSet<Selector> = match old_abi {
            Some(abi) => module_selectors(abi)?,
            None => BTreeSet::new(),
        };
        let new = module_selectors(new_abi)?;
        Ok(plan_upgrade(&old, &new, new_target))
    }

    /// Plan and apply. `Ok(None)` when the dispatch table is already current.
    pub async fn upgrade(
        &self,
        old_abi: Option<&Value>,
        new_abi: &Value,
        new_target: Address,
        init: Option<(Address, Vec<u8>)>,
    ) -> Result<Option<Receipt>, Error> {
        let edits = Self::plan(old_abi, new_abi, new_target)?;
        if edits.is_empty() && init.is_none() {
            info!(target = %new_target, "Dispatch table already current");
            return Ok(None);
        }
        let (init_target, init_data) = init.unwrap_or((Address::ZERO, Vec::new()));
        self.apply(&edits, init_target, init_data).await.map(Some)
    }

    pub async fn apply(
        &self,
        edits: &[DispatchEdit],
        init_target: Address,
        init_data: Vec<u8>,
    ) -> Result<Receipt, Error> {
        for edit in edits {
            info!(
                action = ?edit.action,
                target = %edit.target,
                selectors = edit.selectors.len(),
                "Dispatch edit"
            );
        }
        let calldata = apply_dispatch_edits_calldata(edits, init_target, &init_data);
        self.custody.execute_call(self.dispatcher, calldata).await
    }
}
