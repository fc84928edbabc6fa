//! The simulator session: genesis, deployment, calls and mining.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use simnet_crypto::keys::Keypair;
use simnet_storage::delta::StateDelta;
use simnet_storage::state_store::StateStore;
use simnet_storage::traits::Namespace;
use simnet_storage::transaction::Transaction;
use simnet_types::account::Account;
use simnet_types::primitives::{Address, Amount, BlockHeight, Hash};
use simnet_types::principal::{Principal, ProgramId};
use simnet_types::value::Value;
use simnet_vm::engine::Engine;
use simnet_vm::error::VmError;
use simnet_vm::registry::{Deployment, ProgramInterface, Registry};
use simnet_vm::result::{CallMode, CallRequest, CallResult};
use simnet_vm::state;

use crate::block::{build_block, Block, Receipt};
use crate::clock::NetworkClock;
use crate::config::{SimnetConfig, DEPLOYER};
use crate::error::SimnetError;
use crate::genesis::{create_genesis, miner_keypair, DerivedAccount};
use crate::logging;

/// A transaction that can be mined into a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tx {
    /// Call a public function.
    CallPublic {
        program: String,
        function: String,
        args: Vec<Value>,
        sender: Principal,
    },
    /// Call any function, private ones included, with public permissions.
    CallPrivate {
        program: String,
        function: String,
        args: Vec<Value>,
        sender: Principal,
    },
    /// Native token transfer from `sender`.
    Transfer {
        amount: Amount,
        recipient: Principal,
        sender: Principal,
    },
}

impl Tx {
    pub fn call_public(
        program: impl Into<String>,
        function: impl Into<String>,
        args: Vec<Value>,
        sender: impl Into<Principal>,
    ) -> Self {
        Tx::CallPublic {
            program: program.into(),
            function: function.into(),
            args,
            sender: sender.into(),
        }
    }

    pub fn call_private(
        program: impl Into<String>,
        function: impl Into<String>,
        args: Vec<Value>,
        sender: impl Into<Principal>,
    ) -> Self {
        Tx::CallPrivate {
            program: program.into(),
            function: function.into(),
            args,
            sender: sender.into(),
        }
    }

    pub fn transfer(amount: Amount, recipient: impl Into<Principal>, sender: impl Into<Principal>) -> Self {
        Tx::Transfer {
            amount,
            recipient: recipient.into(),
            sender: sender.into(),
        }
    }

    pub fn sender(&self) -> &Principal {
        match self {
            Tx::CallPublic { sender, .. } | Tx::CallPrivate { sender, .. } | Tx::Transfer { sender, .. } => {
                sender
            }
        }
    }

    fn target(&self) -> String {
        match self {
            Tx::CallPublic {
                program, function, ..
            }
            | Tx::CallPrivate {
                program, function, ..
            } => format!("{program}::{function}"),
            Tx::Transfer { .. } => "stx-transfer".to_string(),
        }
    }
}

/// A single-writer simulated chain.
///
/// Read-only calls run against the latest committed state. Every mutation
/// goes through [`Simnet::mine_block`] or one of its auto-mining wrappers.
pub struct Simnet {
    config: SimnetConfig,
    store: StateStore,
    registry: Registry,
    clock: NetworkClock,
    accounts: BTreeMap<String, DerivedAccount>,
    miner: Keypair,
}

impl Simnet {
    /// Start a session from genesis.
    ///
    /// Installs the `[logging]` subscriber unless one is already set.
    pub fn new(config: SimnetConfig) -> Result<Self, SimnetError> {
        logging::init(&config.logging.level);
        let store = StateStore::new();
        let miner = miner_keypair(&config.genesis.chain_id);
        let (accounts, genesis) = create_genesis(&config.genesis, &store, &miner)?;
        let mut clock = NetworkClock::new();
        clock.push(genesis)?;
        info!(
            network = %config.network_id,
            chain_id = %config.genesis.chain_id,
            accounts = accounts.len(),
            "simnet initialized"
        );
        Ok(Self {
            config,
            store,
            registry: Registry::new(),
            clock,
            accounts,
            miner,
        })
    }

    /// Session with the default accounts.
    pub fn with_defaults() -> Result<Self, SimnetError> {
        Self::new(SimnetConfig::default())
    }

    pub fn config(&self) -> &SimnetConfig {
        &self.config
    }

    // ─── Accounts ───────────────────────────────────────────────────────────

    /// Addresses of the genesis accounts by name.
    pub fn get_accounts(&self) -> BTreeMap<String, Address> {
        self.accounts
            .iter()
            .map(|(name, account)| (name.clone(), account.address))
            .collect()
    }

    /// Address of the named genesis account.
    pub fn account(&self, name: &str) -> Result<Address, SimnetError> {
        self.accounts
            .get(name)
            .map(|a| a.address)
            .ok_or_else(|| SimnetError::UnknownAccount {
                name: name.to_string(),
            })
    }

    /// Address of the `deployer` account.
    pub fn deployer(&self) -> Result<Address, SimnetError> {
        self.account(DEPLOYER)
    }

    /// Current account record; principals never seen have a zero balance.
    pub fn get_account(&self, principal: &Principal) -> Result<Account, SimnetError> {
        let snapshot = self.store.snapshot()?;
        Ok(state::read_account_or_default(&snapshot, principal)?)
    }

    /// Balances of every account with a record.
    pub fn get_assets_map(&self) -> Result<BTreeMap<Principal, Amount>, SimnetError> {
        let snapshot = self.store.snapshot()?;
        snapshot
            .scan(&Namespace::Accounts)?
            .into_iter()
            .map(|(_, bytes)| -> Result<(Principal, Amount), SimnetError> {
                let account = state::decode_account(&bytes)?;
                Ok((account.principal, account.balance))
            })
            .collect()
    }

    // ─── Chain ──────────────────────────────────────────────────────────────

    pub fn block_height(&self) -> BlockHeight {
        self.clock.block_height()
    }

    /// Root of the latest committed state.
    pub fn state_root(&self) -> Result<Hash, SimnetError> {
        Ok(self.store.snapshot()?.state_root())
    }

    pub fn blocks(&self) -> &[Block] {
        self.clock.blocks()
    }

    pub fn block(&self, height: BlockHeight) -> Option<&Block> {
        self.clock.block(height)
    }

    /// Mine `count` blocks without transactions. Returns the new height.
    pub fn mine_empty_blocks(&mut self, count: u64) -> Result<BlockHeight, SimnetError> {
        for _ in 0..count {
            self.seal_block(Vec::new())?;
        }
        Ok(self.block_height())
    }

    /// Execute `txs` in order and seal them into one block.
    pub fn mine_block(&mut self, txs: Vec<Tx>) -> Result<Block, SimnetError> {
        let (_, block) = self.process_batch(txs, true)?;
        block.ok_or_else(|| SimnetError::InvalidBlock {
            reason: "batch produced no block".to_string(),
        })
    }

    // ─── Programs ───────────────────────────────────────────────────────────

    /// Deploy a program immediately, without mining a block.
    pub fn deploy_contract(
        &mut self,
        name: &str,
        source: &str,
        owner: Address,
    ) -> Result<ProgramId, SimnetError> {
        let height = self.block_height();
        let snapshot = self.store.snapshot()?;
        let Deployment { program, delta } =
            self.registry.prepare(snapshot, name, source, owner, height)?;
        self.commit(delta)?;
        Ok(self.registry.install(program))
    }

    pub fn contract_interface(&self, program: &str) -> Result<ProgramInterface, SimnetError> {
        Ok(self.registry.interface(program)?)
    }

    pub fn programs(&self) -> Vec<ProgramId> {
        self.registry.list()
    }

    /// Source text of a deployed program.
    pub fn get_contract_source(&self, program: &str) -> Result<String, SimnetError> {
        Ok(self.registry.resolve(program)?.source.clone())
    }

    /// Current value of a data variable.
    pub fn get_data_var(&self, program: &str, var: &str) -> Result<Value, SimnetError> {
        let program = self.registry.resolve(program)?;
        if !program.data_vars.contains_key(var) {
            return Err(VmError::NotFound {
                what: format!("data variable '{var}' in '{}'", program.name()),
            }
            .into());
        }
        let snapshot = self.store.snapshot()?;
        let value = state::read_value(
            &snapshot,
            &Namespace::program(program.name()),
            &state::data_var_key(var),
        )?;
        value.ok_or_else(|| {
            VmError::NotFound {
                what: format!("value of '{var}' in '{}'", program.name()),
            }
            .into()
        })
    }

    /// Entry of a map, or `None` if the key is absent.
    pub fn get_map_entry(&self, program: &str, map: &str, key: &Value) -> Result<Option<Value>, SimnetError> {
        let program = self.registry.resolve(program)?;
        if !program.maps.contains_key(map) {
            return Err(VmError::NotFound {
                what: format!("map '{map}' in '{}'", program.name()),
            }
            .into());
        }
        let snapshot = self.store.snapshot()?;
        Ok(state::read_value(
            &snapshot,
            &Namespace::program(program.name()),
            &state::map_entry_key(map, key),
        )?)
    }

    /// Every entry of a map as `(key, value)` pairs, in stored key order.
    pub fn get_map_entries(&self, program: &str, map: &str) -> Result<Vec<(Value, Value)>, SimnetError> {
        let program = self.registry.resolve(program)?;
        if !program.maps.contains_key(map) {
            return Err(VmError::NotFound {
                what: format!("map '{map}' in '{}'", program.name()),
            }
            .into());
        }
        let snapshot = self.store.snapshot()?;
        let entries = snapshot.prefix_scan(&Namespace::program(program.name()), &state::map_prefix(map))?;
        let mut pairs = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            pairs.push((state::decode_map_key(map, &key)?, state::decode_value(&value)?));
        }
        Ok(pairs)
    }

    // ─── Calls ──────────────────────────────────────────────────────────────

    /// Run a public or read-only function without changing any state.
    pub fn call_read_only_fn(
        &self,
        program: &str,
        function: &str,
        args: Vec<Value>,
        sender: impl Into<Principal>,
    ) -> CallResult {
        let request = CallRequest {
            program: program.to_string(),
            function: function.to_string(),
            args,
            sender: sender.into(),
            mode: CallMode::ReadOnly,
            block_height: self.block_height(),
        };
        let snapshot = match self.store.snapshot() {
            Ok(s) => s,
            Err(e) => return CallResult::from_error(VmError::from(e)),
        };
        // The transaction is dropped; nothing reaches the store.
        let mut tx = Transaction::new(snapshot);
        Engine::new(&self.registry).call(&mut tx, &request)
    }

    /// Call a public function in a block of its own.
    pub fn call_public_fn(
        &mut self,
        program: &str,
        function: &str,
        args: Vec<Value>,
        sender: impl Into<Principal>,
    ) -> Result<CallResult, SimnetError> {
        self.auto_mine(Tx::call_public(program, function, args, sender))
    }

    /// Call any function, private ones included, in a block of its own.
    pub fn call_private_fn(
        &mut self,
        program: &str,
        function: &str,
        args: Vec<Value>,
        sender: impl Into<Principal>,
    ) -> Result<CallResult, SimnetError> {
        self.auto_mine(Tx::call_private(program, function, args, sender))
    }

    /// Transfer native tokens in a block of its own.
    pub fn transfer_stx(
        &mut self,
        amount: Amount,
        recipient: impl Into<Principal>,
        sender: impl Into<Principal>,
    ) -> Result<CallResult, SimnetError> {
        self.auto_mine(Tx::transfer(amount, recipient, sender))
    }

    fn auto_mine(&mut self, tx: Tx) -> Result<CallResult, SimnetError> {
        let always_seal = self.config.mining.failed_calls_advance_height;
        let (mut receipts, _) = self.process_batch(vec![tx], always_seal)?;
        receipts
            .pop()
            .map(|r| r.result)
            .ok_or_else(|| SimnetError::InvalidBlock {
                reason: "batch produced no receipt".to_string(),
            })
    }

    /// The single commit path.
    ///
    /// Each transaction runs against the state left by the previous one and
    /// sees the height of the block being mined. A block is sealed if
    /// `always_seal` is set or at least one transaction succeeded.
    fn process_batch(
        &mut self,
        txs: Vec<Tx>,
        always_seal: bool,
    ) -> Result<(Vec<Receipt>, Option<Block>), SimnetError> {
        let height = self.clock.next_height();
        let mut receipts = Vec::with_capacity(txs.len());
        for tx in txs {
            let result = self.execute(&tx, height)?;
            receipts.push(Receipt {
                sender: tx.sender().clone(),
                target: tx.target(),
                result,
            });
        }

        let any_success = receipts.iter().any(|r| r.result.is_success());
        if !always_seal && !any_success {
            debug!(height, "no successful transactions, block not sealed");
            return Ok((receipts, None));
        }
        let block = self.seal_block(receipts.clone())?;
        Ok((receipts, Some(block)))
    }

    /// Run one transaction and commit its delta. On success the sender's
    /// nonce is bumped in the same delta.
    fn execute(&self, tx: &Tx, height: BlockHeight) -> Result<CallResult, SimnetError> {
        let engine = Engine::new(&self.registry);
        let mut transaction = Transaction::new(self.store.snapshot()?);
        let result = match tx {
            Tx::CallPublic {
                program,
                function,
                args,
                sender,
            }
            | Tx::CallPrivate {
                program,
                function,
                args,
                sender,
            } => {
                let mode = if matches!(tx, Tx::CallPublic { .. }) {
                    CallMode::Public
                } else {
                    CallMode::Private
                };
                let request = CallRequest {
                    program: program.clone(),
                    function: function.clone(),
                    args: args.clone(),
                    sender: sender.clone(),
                    mode,
                    block_height: height,
                };
                engine.call(&mut transaction, &request)
            }
            Tx::Transfer {
                amount,
                recipient,
                sender,
            } => engine.transfer(&mut transaction, *amount, sender, recipient, height),
        };

        if result.is_success() {
            let mut account = state::read_account_or_default(&transaction, tx.sender())?;
            account.bump_nonce()?;
            state::write_account(&mut transaction, &account)?;
        } else {
            warn!(
                target_call = %tx.target(),
                kind = ?result.error_kind(),
                "transaction failed, delta discarded"
            );
        }
        if transaction.is_dirty() {
            self.commit(transaction.into_delta())?;
        }
        Ok(result)
    }

    /// The one place state changes after genesis.
    fn commit(&self, delta: StateDelta) -> Result<(), SimnetError> {
        let ops = delta.len();
        let version = self.store.apply(delta)?;
        debug!(version, ops, "delta committed");
        Ok(())
    }

    fn seal_block(&mut self, receipts: Vec<Receipt>) -> Result<Block, SimnetError> {
        let height = self.clock.next_height();
        let state_root = self.store.snapshot()?.state_root();
        let block = build_block(
            height,
            self.clock.tip_hash(),
            self.config.genesis.timestamp_at(height),
            state_root,
            receipts,
            &self.miner,
        )?;
        self.clock.push(block.clone())?;
        Ok(block)
    }
}
