use crate::utils::{payload, setup};
use alloy_primitives::Address;
use anyhow::Result;
use provenance_auth::{sign_request, AccountPolicy, LocalSigner};
use provenance_relayer::custody::fetch_policy;
use provenance_relayer::{Error, LedgerCustody, Registrar, RelayState, RelaySubmitter};
use serde_json::json;
use std::sync::Arc;

async fn register_catalog(ctx: &Arc<provenance_relayer::RelayContext>) -> Result<()> {
    let custody = Arc::new(LedgerCustody::new(Arc::clone(ctx)));
    Registrar::new(ctx.config.relay_address, custody)
        .register(ctx.catalog.iter())
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_single_key_relay_advances_sequence() -> Result<()> {
    let (ledger, ctx) = setup()?;
    register_catalog(&ctx).await?;
    let signer = LocalSigner::random()?;
    let submitter = RelaySubmitter::new(Arc::clone(&ctx));

    let receipt = submitter
        .relay(
            "MintToken",
            signer.address(),
            payload(json!({"tokenId": 1, "metadataCID": "bafybeigdyrzt"})),
            &AccountPolicy::SingleKey,
            std::slice::from_ref(&signer),
        )
        .await?;

    assert!(receipt.success);
    assert_eq!(ledger.nonce(signer.address()), 1);
    assert_eq!(
        ledger.snapshot().executed,
        vec![("MintToken".to_string(), signer.address())]
    );
    Ok(())
}

#[tokio::test]
async fn test_replayed_request_is_sequence_mismatch() -> Result<()> {
    let (ledger, ctx) = setup()?;
    register_catalog(&ctx).await?;
    let signer = LocalSigner::random()?;
    let submitter = RelaySubmitter::new(Arc::clone(&ctx));

    let request = submitter
        .assembler()
        .assemble(
            "TransferRecord",
            signer.address(),
            payload(json!({
                "recordId": format!("0x{}", "ab".repeat(32)),
                "to": format!("{}", Address::repeat_byte(0x42)),
            })),
        )
        .await?;
    let encoded = submitter.assembler().encode(&request)?;
    let signatures = sign_request(&encoded, &ctx.domain, std::slice::from_ref(&signer))?;

    submitter
        .submit(&request, &AccountPolicy::SingleKey, &signatures)
        .await?;
    let err = submitter
        .submit(&request, &AccountPolicy::SingleKey, &signatures)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SequenceMismatch(_)), "got {err:?}");
    assert!(err.is_resubmittable());
    assert_eq!(ledger.nonce(signer.address()), 1);
    Ok(())
}

#[tokio::test]
async fn test_module_revert_leaves_sequence_unchanged() -> Result<()> {
    let (ledger, ctx) = setup()?;
    register_catalog(&ctx).await?;
    let signer = LocalSigner::random()?;
    let submitter = RelaySubmitter::new(Arc::clone(&ctx));

    let request = submitter
        .assembler()
        .assemble("BurnToken", signer.address(), payload(json!({"tokenId": "0x07"})))
        .await?;
    let encoded = submitter.assembler().encode(&request)?;
    let signatures = sign_request(&encoded, &ctx.domain, std::slice::from_ref(&signer))?;

    ledger.set_module_revert(Some("Token: caller does not own token"));
    let outcome = submitter
        .dispatch(&request, &AccountPolicy::SingleKey, &signatures)
        .await?;
    assert_eq!(outcome.state, RelayState::Reverted);
    assert_eq!(
        outcome.receipt.revert_reason.as_deref(),
        Some("Token: caller does not own token")
    );
    assert_eq!(ledger.nonce(signer.address()), 0);

    // The same signed request is still valid once the module accepts it.
    ledger.set_module_revert(None);
    let outcome = submitter
        .dispatch(&request, &AccountPolicy::SingleKey, &signatures)
        .await?;
    assert_eq!(outcome.state, RelayState::Confirmed);
    assert_eq!(ledger.nonce(signer.address()), 1);
    Ok(())
}

#[tokio::test]
async fn test_threshold_account_relay() -> Result<()> {
    let (ledger, ctx) = setup()?;
    register_catalog(&ctx).await?;
    let account = Address::repeat_byte(0xa1);
    let owners: Vec<LocalSigner> = (0..3).map(|_| LocalSigner::random()).collect::<Result<_, _>>()?;
    ledger.set_owner_set(account, owners.iter().map(LocalSigner::address).collect(), 2);

    let policy = fetch_policy(ctx.ledger.as_ref(), account).await?;
    assert!(matches!(policy, AccountPolicy::Threshold { threshold: 2, .. }));

    let submitter = RelaySubmitter::new(Arc::clone(&ctx));
    let request = submitter
        .assembler()
        .assemble(
            "AttestRecord",
            account,
            payload(json!({
                "recordId": format!("0x{}", "01".repeat(32)),
                "tags": ["origin-verified", "archival"],
            })),
        )
        .await?;
    let encoded = submitter.assembler().encode(&request)?;

    // One of two required signatures: rejected locally, nothing submitted.
    let one = sign_request(&encoded, &ctx.domain, &owners[2..])?;
    let before = ledger.snapshot().transactions;
    let err = submitter.submit(&request, &policy, &one).await.unwrap_err();
    assert!(matches!(err, Error::InvalidPath(_)), "got {err:?}");
    assert_eq!(ledger.snapshot().transactions, before);

    let two = sign_request(&encoded, &ctx.domain, &owners[..2])?;
    let receipt = submitter.submit(&request, &policy, &two).await?;
    assert!(receipt.success);
    assert_eq!(ledger.nonce(account), 1);
    Ok(())
}

#[tokio::test]
async fn test_unregistered_type_is_rejected() -> Result<()> {
    let (ledger, ctx) = setup()?;
    let signer = LocalSigner::random()?;
    let err = RelaySubmitter::new(Arc::clone(&ctx))
        .relay(
            "BurnToken",
            signer.address(),
            payload(json!({"tokenId": 9})),
            &AccountPolicy::SingleKey,
            std::slice::from_ref(&signer),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotRegistered(_)), "got {err:?}");
    assert_eq!(ledger.nonce(signer.address()), 0);
    Ok(())
}

#[tokio::test]
async fn test_stale_sequence_read_is_rebuilt_once() -> Result<()> {
    let (ledger, ctx) = setup()?;
    register_catalog(&ctx).await?;
    let signer = LocalSigner::random()?;
    let submitter = RelaySubmitter::new(Arc::clone(&ctx));
    let mint = |id: u64| payload(json!({"tokenId": id, "metadataCID": "bafy"}));

    submitter
        .relay("MintToken", signer.address(), mint(1), &AccountPolicy::SingleKey, std::slice::from_ref(&signer))
        .await?;
    ledger.lag_nonce_reads(1);
    submitter
        .relay("MintToken", signer.address(), mint(2), &AccountPolicy::SingleKey, std::slice::from_ref(&signer))
        .await?;

    assert_eq!(ledger.nonce(signer.address()), 2);
    Ok(())
}

#[tokio::test]
async fn test_wrong_signer_is_execution_revert() -> Result<()> {
    let (ledger, ctx) = setup()?;
    register_catalog(&ctx).await?;
    let sender = Address::repeat_byte(0x77);
    let stranger = LocalSigner::random()?;
    let err = RelaySubmitter::new(Arc::clone(&ctx))
        .relay(
            "UpdateRecordMetadata",
            sender,
            payload(json!({"recordId": format!("0x{}", "cd".repeat(32)), "metadataCID": "bafy2"})),
            &AccountPolicy::SingleKey,
            std::slice::from_ref(&stranger),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(&err, Error::ExecutionReverted { reason } if reason.contains("invalid signature")),
        "got {err:?}"
    );
    assert_eq!(ledger.nonce(sender), 0);
    Ok(())
}

#[tokio::test]
async fn test_module_nonce_revert_is_not_resubmitted() -> Result<()> {
    let (ledger, ctx) = setup()?;
    register_catalog(&ctx).await?;
    let signer = LocalSigner::random()?;
    let before = ledger.snapshot().transactions;

    ledger.set_module_revert(Some("Token: nonce of token expired"));
    let err = RelaySubmitter::new(Arc::clone(&ctx))
        .relay(
            "MintToken",
            signer.address(),
            payload(json!({"tokenId": 5, "metadataCID": "bafy"})),
            &AccountPolicy::SingleKey,
            std::slice::from_ref(&signer),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(&err, Error::ExecutionReverted { reason } if reason == "Token: nonce of token expired"),
        "got {err:?}"
    );
    assert_eq!(ledger.snapshot().transactions, before + 1);
    assert_eq!(ledger.nonce(signer.address()), 0);
    Ok(())
}
