use crate::utils::setup;
use alloy_primitives::Address;
use anyhow::Result;
use provenance_relayer::{Error, LedgerCustody, UpgradeExecutor};
use provenance_types::abi::function_selector;
use provenance_types::selector::INTROSPECTION_SELECTOR;
use serde_json::{json, Value};
use std::sync::Arc;

/// Compiled-artifact shape: `{"abi": [...]}` with the introspection entry every module exposes.
fn artifact(functions: &[(&str, &[&str])]) -> Value {
    let mut abi: Vec<Value> = functions
        .iter()
        .map(|(name, inputs)| {
            let inputs: Vec<Value> = inputs
                .iter()
                .enumerate()
                .map(|(i, ty)| json!({"name": format!("arg{i}"), "type": ty}))
                .collect();
            json!({"type": "function", "name": name, "inputs": inputs, "stateMutability": "nonpayable"})
        })
        .collect();
    abi.push(json!({"type": "function", "name": "supportsInterface",
                    "inputs": [{"name": "interfaceId", "type": "bytes4"}]}));
    abi.push(json!({"type": "event", "name": "RecordRegistered", "inputs": []}));
    json!({ "abi": abi })
}

fn executor(ctx: &Arc<provenance_relayer::RelayContext>) -> UpgradeExecutor {
    UpgradeExecutor::new(
        ctx.config.relay_address,
        Arc::new(LedgerCustody::new(Arc::clone(ctx))),
    )
}

#[tokio::test]
async fn test_install_then_upgrade_module() -> Result<()> {
    let (ledger, ctx) = setup()?;
    let executor = executor(&ctx);
    let v1_target = Address::repeat_byte(0x71);
    let v2_target = Address::repeat_byte(0x72);
    let v1 = artifact(&[
        ("registerRecord", &["bytes32", "bytes32", "string"]),
        ("transferRecord", &["bytes32", "address"]),
    ]);
    let v2 = artifact(&[
        ("registerRecord", &["bytes32", "bytes32", "string"]),
        ("attestRecord", &["bytes32", "string[]"]),
    ]);

    assert!(executor.upgrade(None, &v1, v1_target, None).await?.is_some());
    let register = function_selector("registerRecord(bytes32,bytes32,string)");
    let transfer = function_selector("transferRecord(bytes32,address)");
    let attest = function_selector("attestRecord(bytes32,string[])");
    let table = ledger.snapshot().dispatch;
    assert_eq!(table.get(&register), Some(&v1_target));
    assert_eq!(table.get(&transfer), Some(&v1_target));
    assert!(!table.contains_key(&INTROSPECTION_SELECTOR));

    executor.upgrade(Some(&v1), &v2, v2_target, None).await?;
    let table = ledger.snapshot().dispatch;
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(&register), Some(&v2_target));
    assert_eq!(table.get(&attest), Some(&v2_target));
    assert!(!table.contains_key(&transfer));
    Ok(())
}

#[tokio::test]
async fn test_adding_routed_selector_reverts() -> Result<()> {
    let (ledger, ctx) = setup()?;
    let executor = executor(&ctx);
    let module = artifact(&[("mintToken", &["uint256", "string"])]);
    executor
        .upgrade(None, &module, Address::repeat_byte(0x02), None)
        .await?;

    // Treating an installed module as fresh re-adds its selectors.
    let err = executor
        .upgrade(None, &module, Address::repeat_byte(0x03), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExecutionReverted { .. }), "got {err:?}");
    assert_eq!(
        ledger
            .snapshot()
            .dispatch
            .get(&function_selector("mintToken(uint256,string)")),
        Some(&Address::repeat_byte(0x02))
    );
    Ok(())
}

#[tokio::test]
async fn test_nothing_to_apply_sends_nothing() -> Result<()> {
    let (ledger, ctx) = setup()?;
    let empty = artifact(&[]);
    let outcome = executor(&ctx)
        .upgrade(Some(&empty), &empty, Address::repeat_byte(0x09), None)
        .await?;
    assert!(outcome.is_none());
    assert_eq!(ledger.snapshot().transactions, 0);
    Ok(())
}
