//! In-memory chain that plays the relay verifier, the registry, the
//! dispatch table and the custody account, enough to drive the relayer
//! end to end without a node.

use alloy_primitives::{keccak256, Address, Selector, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use provenance_auth::nonce::GET_NONCE_SIGNATURE;
use provenance_auth::recover_signer;
use provenance_relayer::custody::{
    GET_OWNERS_SIGNATURE, GET_THRESHOLD_SIGNATURE, PROPOSE_AND_EXECUTE_SIGNATURE,
};
use provenance_relayer::registrar::{REGISTER_SIGNATURE, UNREGISTER_SIGNATURE};
use provenance_relayer::{Config, Error, Ledger, Receipt, RelayContext};
use provenance_types::batch::MULTI_SEND_SIGNATURE;
use provenance_types::dispatch::APPLY_DISPATCH_EDITS_SIGNATURE;
use provenance_types::typed_data::signing_digest;
use provenance_types::{
    abi, decode_batch, AbiValue, BatchMode, CodecError, Domain, ModuleAddresses, PrimitiveType,
    RelayCall, TypeCatalog,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub const CHAIN_ID: u64 = 31337;
pub const RELAY: Address = Address::repeat_byte(0xee);
pub const CUSTODY: Address = Address::repeat_byte(0xc0);
pub const MULTI_SEND: Address = Address::repeat_byte(0x5e);

pub fn modules() -> ModuleAddresses {
    ModuleAddresses {
        registry: Address::repeat_byte(0x01),
        token: Address::repeat_byte(0x02),
        wallet: Address::repeat_byte(0x03),
    }
}

pub fn test_config() -> Config {
    Config {
        relay_address: RELAY,
        custody_address: CUSTODY,
        multi_send_address: MULTI_SEND,
        modules: modules(),
        poll_interval_ms: 1,
        ..Config::default()
    }
}

pub fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Fake chain plus a context wired to it.
pub fn setup() -> Result<(Arc<FakeLedger>, Arc<RelayContext>)> {
    let config = test_config();
    let ledger = Arc::new(FakeLedger::new(&config, CHAIN_ID)?);
    let ctx = RelayContext::new(config, CHAIN_ID, ledger.clone())?;
    Ok((ledger, Arc::new(ctx)))
}

#[derive(Debug, Clone, Default)]
pub struct ChainState {
    pub block: u64,
    pub transactions: usize,
    pub nonces: HashMap<Address, u64>,
    /// type hash → type string
    pub registered: HashMap<B256, String>,
    pub dispatch: BTreeMap<Selector, Address>,
    pub owner_sets: HashMap<Address, (Vec<Address>, u64)>,
    /// (operation key, sender) of every forwarded request.
    pub executed: Vec<(String, Address)>,
    receipts: HashMap<B256, Receipt>,
    module_revert: Option<String>,
    stale_nonce_reads: usize,
}

pub struct FakeLedger {
    chain_id: u64,
    relay: Address,
    custody: Address,
    multi_send: Address,
    catalog: TypeCatalog,
    domain: Domain,
    state: Mutex<ChainState>,
}

type Revert = String;

impl FakeLedger {
    pub fn new(config: &Config, chain_id: u64) -> Result<Self> {
        let domain = Domain {
            name: config.domain_name.clone(),
            version: config.domain_version.clone(),
            chain_id,
            verifying_contract: config.relay_address,
        };
        Ok(Self {
            chain_id,
            relay: config.relay_address,
            custody: config.custody_address,
            multi_send: config.multi_send_address,
            catalog: TypeCatalog::from_kinds(&config.modules)?,
            domain,
            state: Mutex::new(ChainState::default()),
        })
    }

    pub fn snapshot(&self) -> ChainState {
        self.state.lock().unwrap().clone()
    }

    pub fn nonce(&self, sender: Address) -> u64 {
        self.snapshot().nonces.get(&sender).copied().unwrap_or(0)
    }

    pub fn set_owner_set(&self, account: Address, owners: Vec<Address>, threshold: u64) {
        self.state
            .lock()
            .unwrap()
            .owner_sets
            .insert(account, (owners, threshold));
    }

    /// Every forwarded request reverts in its module with `reason` until cleared.
    pub fn set_module_revert(&self, reason: Option<&str>) {
        self.state.lock().unwrap().module_revert = reason.map(str::to_string);
    }

    /// The next `count` sequence reads answer one behind the live counter.
    pub fn lag_nonce_reads(&self, count: usize) {
        self.state.lock().unwrap().stale_nonce_reads = count;
    }

    fn execute(&self, state: &mut ChainState, from: Address, to: Address, data: &[u8]) -> Result<(), Revert> {
        let (selector, args) = split_selector(data)?;
        if to == self.custody && selector == abi::function_selector(PROPOSE_AND_EXECUTE_SIGNATURE) {
            return self.execute_proposal(state, args);
        }
        if to != self.relay {
            return Err(format!("no contract at {to}"));
        }
        if let Ok(call) = RelayCall::decode(data) {
            return self.execute_relay(state, call);
        }
        if from != self.custody {
            return Err("Relay: caller is not the owner".into());
        }
        if selector == abi::function_selector(REGISTER_SIGNATURE) {
            let values = abi::decode(
                &[
                    PrimitiveType::String,
                    PrimitiveType::String,
                    PrimitiveType::Address,
                    PrimitiveType::FixedBytes(4),
                ],
                args,
            )
            .map_err(codec_revert)?;
            let AbiValue::String(type_string) = &values[1] else {
                return Err("Registry: malformed type string".into());
            };
            let type_hash = keccak256(type_string.as_bytes());
            if state.registered.contains_key(&type_hash) {
                return Err("Registry: type already registered".into());
            }
            state.registered.insert(type_hash, type_string.clone());
            Ok(())
        } else if selector == abi::function_selector(UNREGISTER_SIGNATURE) {
            let values = abi::decode(&[PrimitiveType::FixedBytes(32)], args).map_err(codec_revert)?;
            let AbiValue::FixedBytes(type_hash) = values[0] else {
                return Err("Registry: malformed type hash".into());
            };
            state
                .registered
                .remove(&type_hash)
                .map(|_| ())
                .ok_or_else(|| "Registry: type not registered".to_string())
        } else if selector == abi::function_selector(APPLY_DISPATCH_EDITS_SIGNATURE) {
            let edits = decode_dispatch_edits(args).map_err(codec_revert)?;
            for (target, action, selectors) in edits {
                for sel in selectors {
                    match action {
                        0 if state.dispatch.contains_key(&sel) => {
                            return Err(format!("Dispatch: {sel} exists"))
                        }
                        1 | 2 if !state.dispatch.contains_key(&sel) => {
                            return Err(format!("Dispatch: {sel} missing"))
                        }
                        0 | 1 => {
                            state.dispatch.insert(sel, target);
                        }
                        2 => {
                            state.dispatch.remove(&sel);
                        }
                        other => return Err(format!("Dispatch: bad action {other}")),
                    }
                }
            }
            Ok(())
        } else {
            Err("Relay: unknown function".into())
        }
    }

    fn execute_proposal(&self, state: &mut ChainState, args: &[u8]) -> Result<(), Revert> {
        let values = abi::decode(
            &[PrimitiveType::Address, PrimitiveType::Bytes, PrimitiveType::Uint(8)],
            args,
        )
        .map_err(codec_revert)?;
        let (to, data, mode) = match values.as_slice() {
            [AbiValue::Address(to), AbiValue::Bytes(data), AbiValue::Uint(mode)] => (*to, data, *mode),
            _ => return Err("Custody: malformed proposal".into()),
        };
        if mode == U256::from(BatchMode::Direct as u8) {
            return self.execute(state, self.custody, to, data);
        }
        if to != self.multi_send {
            return Err("Custody: delegate target not allowed".into());
        }
        let (selector, inner) = split_selector(data)?;
        if selector != abi::function_selector(MULTI_SEND_SIGNATURE) {
            return Err("MultiSend: unknown function".into());
        }
        let blob = match abi::decode(&[PrimitiveType::Bytes], inner).map_err(codec_revert)?.pop() {
            Some(AbiValue::Bytes(blob)) => blob,
            _ => return Err("MultiSend: malformed blob".into()),
        };
        for op in decode_batch(&blob).map_err(codec_revert)? {
            // Delegated: inner calls run as the custody account.
            self.execute(state, self.custody, op.target, &op.payload)?;
        }
        Ok(())
    }

    fn execute_relay(&self, state: &mut ChainState, call: RelayCall) -> Result<(), Revert> {
        let request = &call.request;
        if !state.registered.contains_key(&request.type_hash) {
            return Err("Relay: operation type not registered".into());
        }
        let op = self
            .catalog
            .by_type_hash(&request.type_hash)
            .ok_or_else(|| "Relay: operation type not registered".to_string())?;
        let struct_hash = request.struct_hash(op).map_err(codec_revert)?;
        let digest = signing_digest(self.domain.separator(), struct_hash);

        let live = state.nonces.get(&request.sender).copied().unwrap_or(0);
        if request.nonce != U256::from(live) {
            return Err("Relay: invalid nonce".into());
        }

        if call.threshold_path {
            let (owners, threshold) = state
                .owner_sets
                .get(&request.sender)
                .cloned()
                .ok_or_else(|| "Relay: sender has no owner set".to_string())?;
            let mut last = Address::ZERO;
            for sig in &call.signatures {
                let signer = recover_signer(digest, sig).map_err(|e| e.to_string())?;
                if signer <= last || !owners.contains(&signer) {
                    return Err("Relay: invalid signature".into());
                }
                last = signer;
            }
            if (call.signatures.len() as u64) < threshold {
                return Err("Relay: threshold not met".into());
            }
        } else {
            let sig = call.signatures.first().ok_or("Relay: invalid signature")?;
            if recover_signer(digest, sig).ok() != Some(request.sender) {
                return Err("Relay: invalid signature".into());
            }
        }

        if let Some(reason) = &state.module_revert {
            return Err(reason.clone());
        }
        state.nonces.insert(request.sender, live + 1);
        state.executed.push((op.key.clone(), request.sender));
        Ok(())
    }

    fn view(&self, state: &mut ChainState, to: Address, data: &[u8]) -> Option<Vec<u8>> {
        let (selector, args) = split_selector(data).ok()?;
        if to == self.relay && selector == abi::function_selector(GET_NONCE_SIGNATURE) {
            let AbiValue::Address(sender) = abi::decode_at(&PrimitiveType::Address, args, 0).ok()?
            else {
                return None;
            };
            let mut nonce = state.nonces.get(&sender).copied().unwrap_or(0);
            if state.stale_nonce_reads > 0 {
                state.stale_nonce_reads -= 1;
                nonce = nonce.saturating_sub(1);
            }
            return Some(abi::encode(&[AbiValue::uint(nonce)]));
        }
        let owner_set = state.owner_sets.get(&to).cloned();
        if selector == abi::function_selector(GET_OWNERS_SIGNATURE) {
            return Some(match owner_set {
                Some((owners, _)) => abi::encode(&[AbiValue::Array(
                    owners.into_iter().map(AbiValue::Address).collect(),
                )]),
                None => Vec::new(),
            });
        }
        if selector == abi::function_selector(GET_THRESHOLD_SIGNATURE) {
            return Some(match owner_set {
                Some((_, threshold)) => abi::encode(&[AbiValue::uint(threshold)]),
                None => Vec::new(),
            });
        }
        None
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(out) = self.view(&mut state, to, &data) {
            return Ok(out);
        }
        // Replay against a scratch copy, from the relayer account.
        let mut scratch = state.clone();
        match self.execute(&mut scratch, Address::ZERO, to, &data) {
            Ok(()) => Ok(Vec::new()),
            Err(reason) => Err(Error::from_revert(reason)),
        }
    }

    async fn send_transaction(&self, to: Address, data: Vec<u8>) -> Result<B256, Error> {
        let mut state = self.state.lock().unwrap();
        state.block += 1;
        state.transactions += 1;
        let mut seed = state.block.to_be_bytes().to_vec();
        seed.extend_from_slice(&data);
        let tx_hash = keccak256(seed);

        // All-or-nothing: state changes land only when execution succeeds.
        let mut scratch = state.clone();
        let success = self.execute(&mut scratch, Address::ZERO, to, &data).is_ok();
        if success {
            *state = scratch;
        }
        let block_number = state.block;
        state.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                block_number,
                success,
                // Nodes report no reason; the relayer replays for it.
                revert_reason: None,
            },
        );
        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>, Error> {
        Ok(self.state.lock().unwrap().receipts.get(&tx_hash).cloned())
    }

    async fn block_number(&self) -> Result<u64, Error> {
        let mut state = self.state.lock().unwrap();
        state.block += 1;
        Ok(state.block)
    }

    async fn chain_id(&self) -> Result<u64, Error> {
        Ok(self.chain_id)
    }
}

fn split_selector(data: &[u8]) -> Result<(Selector, &[u8]), Revert> {
    if data.len() < 4 {
        return Err("calldata shorter than a selector".into());
    }
    let (selector, args) = data.split_at(4);
    Ok((Selector::from_slice(selector), args))
}

fn codec_revert(e: CodecError) -> Revert {
    format!("malformed calldata: {e}")
}

/// `((address,uint8,bytes4[])[] edits, address initTarget, bytes initData)`.
fn decode_dispatch_edits(args: &[u8]) -> Result<Vec<(Address, u8, Vec<Selector>)>, CodecError> {
    let array_at = abi::read_offset(args, 0)?;
    let len = abi::read_offset(args, array_at)?;
    let elements = array_at + 32;
    let mut edits = Vec::with_capacity(len);
    for i in 0..len {
        let tuple_at = elements + abi::read_offset(args, elements + i * 32)?;
        let target = abi::decode_at(&PrimitiveType::Address, args, tuple_at)?;
        let action = abi::decode_at(&PrimitiveType::Uint(8), args, tuple_at + 32)?;
        let selectors_at = tuple_at + abi::read_offset(args, tuple_at + 64)?;
        let selectors = abi::decode_at(
            &PrimitiveType::Array(Box::new(PrimitiveType::FixedBytes(4))),
            args,
            selectors_at,
        )?;
        match (target, action, selectors) {
            (AbiValue::Address(target), AbiValue::Uint(action), AbiValue::Array(items)) => {
                let selectors = items
                    .into_iter()
                    .filter_map(|item| match item {
                        AbiValue::FixedBytes(word) => Some(Selector::from_slice(&word[..4])),
                        _ => None,
                    })
                    .collect();
                edits.push((target, action.to::<u8>(), selectors));
            }
            _ => return Err(CodecError::InvalidAbi("malformed dispatch edit".into())),
        }
    }
    Ok(edits)
}
