use crate::utils::{setup, CUSTODY};
use alloy_primitives::{Address, B256};
use anyhow::Result;
use provenance_auth::AccountPolicy;
use provenance_relayer::{CustodyAccount, Error, LedgerCustody, Registrar};
use std::sync::Arc;

fn registrar(ctx: &Arc<provenance_relayer::RelayContext>) -> Registrar {
    Registrar::new(
        ctx.config.relay_address,
        Arc::new(LedgerCustody::new(Arc::clone(ctx))),
    )
}

#[tokio::test]
async fn test_catalog_registers_in_one_transaction() -> Result<()> {
    let (ledger, ctx) = setup()?;
    registrar(&ctx).register(ctx.catalog.iter()).await?;

    let state = ledger.snapshot();
    assert_eq!(state.transactions, 1);
    assert_eq!(state.registered.len(), ctx.catalog.len());
    for op in ctx.catalog.iter() {
        assert_eq!(state.registered.get(&op.type_hash()), Some(&op.type_string()));
    }
    Ok(())
}

#[tokio::test]
async fn test_duplicate_in_batch_reverts_everything() -> Result<()> {
    let (ledger, ctx) = setup()?;
    let registrar = registrar(&ctx);
    let mint = ctx.catalog.get("MintToken").expect("built-in kind");
    registrar.register([mint]).await?;

    let err = registrar.register(ctx.catalog.iter()).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyRegistered(_)), "got {err:?}");
    assert_eq!(ledger.snapshot().registered.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unregister() -> Result<()> {
    let (ledger, ctx) = setup()?;
    let registrar = registrar(&ctx);
    registrar.register(ctx.catalog.iter()).await?;

    let burn = ctx.catalog.get("BurnToken").expect("built-in kind").type_hash();
    let wallet = ctx.catalog.get("ConfigureWallet").expect("built-in kind").type_hash();
    registrar.unregister(&[burn, wallet]).await?;
    let state = ledger.snapshot();
    assert_eq!(state.registered.len(), ctx.catalog.len() - 2);
    assert!(!state.registered.contains_key(&burn));

    let err = registrar.unregister(&[burn]).await.unwrap_err();
    assert!(matches!(err, Error::NotRegistered(_)), "got {err:?}");

    let err = registrar
        .unregister(&[B256::repeat_byte(0x99)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotRegistered(_)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn test_misconfigured_custody_address_reverts() -> Result<()> {
    let (ledger, ctx) = setup()?;
    let stray = Registrar::new(
        ctx.config.relay_address,
        Arc::new(LedgerCustody::at(Arc::clone(&ctx), Address::repeat_byte(0x12))),
    );
    let op = ctx.catalog.get("RegisterRecord").expect("built-in kind");
    let err = stray.register([op]).await.unwrap_err();
    assert!(matches!(err, Error::ExecutionReverted { .. }), "got {err:?}");
    assert!(ledger.snapshot().registered.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_custody_policy_read() -> Result<()> {
    let (ledger, ctx) = setup()?;
    let owners = vec![Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3)];
    ledger.set_owner_set(CUSTODY, owners.clone(), 2);

    let custody = LedgerCustody::new(Arc::clone(&ctx));
    assert_eq!(custody.address(), CUSTODY);
    assert_eq!(
        custody.policy().await?,
        AccountPolicy::Threshold {
            owners,
            threshold: 2
        }
    );

    let plain = LedgerCustody::at(Arc::clone(&ctx), Address::repeat_byte(0x44));
    assert_eq!(plain.policy().await?, AccountPolicy::SingleKey);
    Ok(())
}
