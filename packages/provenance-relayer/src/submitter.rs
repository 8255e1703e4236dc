//! Relay submission: execution-path selection, the relay call, and the
//! `Built → Submitted → Confirmed | Reverted` lifecycle.

use alloy_primitives::Address;
use provenance_auth::{sign_request, AccountPolicy, LocalSigner, RelayPath, SignatureSet};
use provenance_types::request::{execute_eoa_signature, execute_luw_signature};
use provenance_types::{abi, AbiValue, EncodedRequest, Request};
use serde_json::{Map, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use crate::assembler::RequestAssembler;
use crate::ledger::{submit_and_confirm, Receipt, RelayState};
use crate::metrics::METRICS;
use crate::{Error, RelayContext};

/// Final state of a submitted request and its receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub state: RelayState,
    pub receipt: Receipt,
}

impl RelayOutcome {
    pub fn into_result(self) -> Result<Receipt, Error> {
        self.receipt.into_result()
    }
}

/// `executeEOA` / `executeLUW` calldata for a signed request.
///
/// Rejects a signature set that does not fit `policy`, before any network call.
pub fn relay_calldata(
    encoded: &EncodedRequest,
    policy: &AccountPolicy,
    signatures: &SignatureSet,
) -> Result<Vec<u8>, Error> {
    let calldata = match policy.select_path(signatures)? {
        RelayPath::SingleKey => {
            let signature = signatures
                .entries()
                .first()
                .ok_or(Error::NoSignersProvided)?;
            abi::encode_call(
                &execute_eoa_signature(),
                &[encoded.to_abi(), AbiValue::Bytes(signature.signature.to_vec())],
            )
        }
        RelayPath::Threshold => abi::encode_call(
            &execute_luw_signature(),
            &[
                encoded.to_abi(),
                AbiValue::Array(
                    signatures
                        .signature_bytes()
                        .into_iter()
                        .map(AbiValue::Bytes)
                        .collect(),
                ),
            ],
        ),
    };
    Ok(calldata)
}

pub struct RelaySubmitter {
    ctx: Arc<RelayContext>,
    assembler: RequestAssembler,
}

impl RelaySubmitter {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        Self {
            assembler: RequestAssembler::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    pub fn assembler(&self) -> &RequestAssembler {
        &self.assembler
    }

    /// Submit a signed request and wait for it. A revert is returned as the
    /// outcome's `Reverted` state; the sequence counter is then unchanged and
    /// the same signed request may be resubmitted.
    pub async fn dispatch(
        &self,
        request: &Request,
        policy: &AccountPolicy,
        signatures: &SignatureSet,
    ) -> Result<RelayOutcome, Error> {
        let mut state = RelayState::Built;
        let encoded = self.assembler.encode(request)?;
        let calldata = relay_calldata(&encoded, policy, signatures)?;

        let relay = self.ctx.config.relay_address;
        METRICS.relays_submitted.fetch_add(1, Ordering::Relaxed);
        info!(
            operation = %request.operation_key,
            sender = %request.sender,
            sequence = request.sequence_number,
            signatures = signatures.len(),
            ?state,
            "Submitting relay request"
        );
        state = RelayState::Submitted;
        let receipt = submit_and_confirm(
            self.ctx.ledger.as_ref(),
            relay,
            calldata,
            self.ctx.confirmations(),
            self.ctx.poll_interval(),
        )
        .await?;

        if receipt.success {
            METRICS.relays_confirmed.fetch_add(1, Ordering::Relaxed);
            state = RelayState::Confirmed;
        } else {
            METRICS.relays_reverted.fetch_add(1, Ordering::Relaxed);
            state = RelayState::Reverted;
        }
        info!(tx_hash = %receipt.tx_hash, ?state, "Relay request settled");
        Ok(RelayOutcome { state, receipt })
    }

    /// [`dispatch`](Self::dispatch) with reverts surfaced as errors.
    pub async fn submit(
        &self,
        request: &Request,
        policy: &AccountPolicy,
        signatures: &SignatureSet,
    ) -> Result<Receipt, Error> {
        let result = self.dispatch(request, policy, signatures).await?.into_result();
        if let Err(e) = &result {
            if e.is_resubmittable() {
                METRICS.sequence_mismatches.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Assemble, sign with local keys and submit. After a sequence mismatch the
    /// request is rebuilt with a fresh sequence number and submitted once more.
    pub async fn relay(
        &self,
        key: &str,
        sender: Address,
        payload: Map<String, Value>,
        policy: &AccountPolicy,
        signers: &[LocalSigner],
    ) -> Result<Receipt, Error> {
        if signers.is_empty() {
            return Err(Error::NoSignersProvided);
        }
        match self.sign_and_submit(key, sender, payload.clone(), policy, signers).await {
            Err(e) if e.is_resubmittable() => {
                warn!(operation = key, sender = %sender, error = %e, "Sequence mismatch, rebuilding request");
                self.sign_and_submit(key, sender, payload, policy, signers).await
            }
            other => other,
        }
    }

    async fn sign_and_submit(
        &self,
        key: &str,
        sender: Address,
        payload: Map<String, Value>,
        policy: &AccountPolicy,
        signers: &[LocalSigner],
    ) -> Result<Receipt, Error> {
        let request = self.assembler.assemble(key, sender, payload).await?;
        let encoded = self.assembler.encode(&request)?;
        let signatures = sign_request(&encoded, &self.ctx.domain, signers)?;
        self.submit(&request, policy, &signatures).await
    }
}
