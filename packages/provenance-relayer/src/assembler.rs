//! Request assembly: validates a caller payload against the catalog and
//! pairs it with the sender's live sequence number.

use alloy_primitives::Address;
use provenance_auth::nonce::get_nonce_calldata;
use provenance_types::{abi, CodecError, EncodedRequest, OperationType, Request};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::{Error, RelayContext};

pub struct RequestAssembler {
    ctx: Arc<RelayContext>,
}

impl RequestAssembler {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        Self { ctx }
    }

    pub fn operation(&self, key: &str) -> Result<&OperationType, Error> {
        self.ctx
            .catalog
            .get(key)
            .ok_or_else(|| Error::UnknownOperationKind(key.to_string()))
    }

    /// Sender's live counter on channel 0.
    pub async fn sequence_number(&self, sender: Address) -> Result<u64, Error> {
        let raw = self
            .ctx
            .ledger
            .call(self.ctx.config.relay_address, get_nonce_calldata(sender))
            .await?;
        let value = abi::decode_uint(&raw)?;
        u64::try_from(value).map_err(|_| {
            Error::Codec(CodecError::InvalidAbi(format!(
                "sequence number {value} exceeds u64"
            )))
        })
    }

    /// Validate `payload` for `key`, then fetch the live sequence number.
    /// Catalog and payload checks run before any network call.
    pub async fn assemble(
        &self,
        key: &str,
        sender: Address,
        payload: Map<String, Value>,
    ) -> Result<Request, Error> {
        let op = self.operation(key)?;
        let mut request = Request {
            operation_key: op.key.clone(),
            sender,
            sequence_number: 0,
            payload,
        };
        request
            .body_values(op)
            .map_err(|e| Error::InvalidPayload(e.to_string()))?;

        request.sequence_number = self.sequence_number(sender).await?;
        debug!(
            operation = key,
            sender = %sender,
            sequence = request.sequence_number,
            "Request assembled"
        );
        Ok(request)
    }

    /// Encode an assembled request against its catalog entry.
    pub fn encode(&self, request: &Request) -> Result<EncodedRequest, Error> {
        let op = self.operation(&request.operation_key)?;
        request
            .encode(op)
            .map_err(|e| Error::InvalidPayload(e.to_string()))
    }
}
