//! Stellar Raffle Contract
//!
//! An automated lottery. Players buy in with a fixed entrance fee paid in the
//! configured token. Once the round interval has elapsed and at least one
//! player is in, an upkeep caller closes the round and asks the randomness
//! coordinator for a word. When the coordinator calls back, the winner is
//! picked as `players[word mod players.len()]` and receives the whole pool.
//!
//! ## Storage Strategy
//! - `instance()`: admin, `RaffleConfig`, round state, last round timestamp,
//!   recent winner and the pending request id.
//! - `persistent()`: the player list, bumped on every write.
//!
//! ## State Machine
//!
//!   Open --perform_upkeep--> Calculating --raw_fulfill_random_words--> Open
//!
//! Entry is only accepted while `Open`. Only one randomness request can be
//! outstanding, since `perform_upkeep` requires `Open` and fulfilment is the
//! only way back.
//!
//! A failed payout leaves the round untouched, but the coordinator still
//! consumes the request. The round then stays `Calculating` with the pool
//! locked, as there is no operation to cancel a round or re-request.
#![no_std]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, log, token::TokenClient,
    Address, Bytes, BytesN, Env, Vec, U256,
};
use stellar_raffle_shared::VrfCoordinatorClient;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const PERSISTENT_BUMP_LEDGERS: u32 = 518_400; // ~30 days
const PERSISTENT_BUMP_THRESHOLD: u32 = PERSISTENT_BUMP_LEDGERS - 100_800; // Renew ~7 days early

/// Confirmations the coordinator waits for before answering.
pub const REQUEST_CONFIRMATIONS: u32 = 3;
/// Random words requested per round.
pub const NUM_WORDS: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    InvalidConfig = 3,
    InsufficientPayment = 4,
    RoundNotOpen = 5,
    UpkeepNotNeeded = 6,
    NonexistentRequest = 7,
    PayoutTransferFailed = 8,
    PlayerIndexOutOfBounds = 9,
    InvalidRandomWords = 10,
    Overflow = 11,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum RaffleState {
    Open = 0,
    Calculating = 1,
}

/// Immutable parameters fixed at `init`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RaffleConfig {
    /// Randomness coordinator the raffle requests from and accepts answers from.
    pub coordinator: Address,
    /// Token players pay in and the winner is paid out in.
    pub token: Address,
    /// Minimum amount accepted per entry.
    pub entrance_fee: i128,
    /// Coordinator key identifier ("gas lane").
    pub key_hash: BytesN<32>,
    /// Coordinator subscription billed for each request.
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    /// Minimum seconds between the last round and the next upkeep.
    pub interval: u64,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    // --- instance() ---
    Admin,
    Config,
    State,
    LastTimestamp,
    RecentWinner,
    PendingRequest,
    // --- persistent() ---
    Players,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct ContractInitialized {
    #[topic]
    pub admin: Address,
    pub entrance_fee: i128,
    pub interval: u64,
}

#[contractevent]
pub struct RaffleEnter {
    #[topic]
    pub player: Address,
    pub amount: i128,
}

#[contractevent]
pub struct RequestedRaffleWinner {
    #[topic]
    pub request_id: u64,
}

#[contractevent]
pub struct WinnerPicked {
    #[topic]
    pub winner: Address,
    pub prize: i128,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct Raffle;

#[contractimpl]
impl Raffle {
    /// Initialise the raffle. The first round opens immediately.
    pub fn init(env: Env, admin: Address, config: RaffleConfig) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        if config.entrance_fee <= 0 || config.interval == 0 || config.callback_gas_limit == 0 {
            return Err(Error::InvalidConfig);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Config, &config);
        env.storage().instance().set(&DataKey::State, &RaffleState::Open);
        env.storage()
            .instance()
            .set(&DataKey::LastTimestamp, &env.ledger().timestamp());
        Self::save_players(&env, &Vec::new(&env));

        ContractInitialized {
            admin,
            entrance_fee: config.entrance_fee,
            interval: config.interval,
        }
        .publish(&env);

        Ok(())
    }

    /// Buy into the current round by paying at least the entrance fee.
    ///
    /// The full `amount` goes into the pool. The same player may enter more
    /// than once; each entry is one more chance to win.
    pub fn enter_raffle(env: Env, player: Address, amount: i128) -> Result<(), Error> {
        let config = Self::load_config(&env)?;

        if amount < config.entrance_fee {
            return Err(Error::InsufficientPayment);
        }
        if Self::load_state(&env)? != RaffleState::Open {
            return Err(Error::RoundNotOpen);
        }

        player.require_auth();

        TokenClient::new(&env, &config.token).transfer(
            &player,
            &env.current_contract_address(),
            &amount,
        );

        let mut players = Self::load_players(&env);
        players.push_back(player.clone());
        Self::save_players(&env, &players);

        RaffleEnter { player, amount }.publish(&env);

        Ok(())
    }

    /// Read-only upkeep probe for the automation service.
    ///
    /// Returns `true` only when the round is open, has players, holds a
    /// non-zero pool and at least `interval` seconds have passed since the
    /// last round. `check_data` is ignored and `perform_data` is empty.
    pub fn check_upkeep(env: Env, _check_data: Bytes) -> Result<(bool, Bytes), Error> {
        let upkeep_needed = Self::upkeep_status(&env)?.needed();
        Ok((upkeep_needed, Bytes::new(&env)))
    }

    /// Close the round and request randomness. Returns the request id.
    ///
    /// Eligibility is re-evaluated here rather than trusted from a previous
    /// `check_upkeep`.
    pub fn perform_upkeep(env: Env, _perform_data: Bytes) -> Result<u64, Error> {
        let config = Self::load_config(&env)?;

        let status = Self::upkeep_status(&env)?;
        if !status.needed() {
            log!(
                &env,
                "upkeep not needed",
                status.balance,
                status.players,
                status.state as u32
            );
            return Err(Error::UpkeepNotNeeded);
        }

        env.storage()
            .instance()
            .set(&DataKey::State, &RaffleState::Calculating);

        let request_id = VrfCoordinatorClient::new(&env, &config.coordinator).request_random_words(
            &env.current_contract_address(),
            &config.key_hash,
            &config.subscription_id,
            &REQUEST_CONFIRMATIONS,
            &config.callback_gas_limit,
            &NUM_WORDS,
        );
        env.storage()
            .instance()
            .set(&DataKey::PendingRequest, &request_id);

        RequestedRaffleWinner { request_id }.publish(&env);

        Ok(request_id)
    }

    /// Randomness callback. Only the configured coordinator may deliver it,
    /// and only for the pending request.
    ///
    /// The pool is paid out before the round is reset; if the payout fails
    /// nothing changes and the round stays `Calculating`.
    pub fn raw_fulfill_random_words(
        env: Env,
        request_id: u64,
        random_words: Vec<U256>,
    ) -> Result<(), Error> {
        let config = Self::load_config(&env)?;
        config.coordinator.require_auth();

        let pending: Option<u64> = env.storage().instance().get(&DataKey::PendingRequest);
        if pending != Some(request_id) || Self::load_state(&env)? != RaffleState::Calculating {
            return Err(Error::NonexistentRequest);
        }

        let word = random_words.get(0).ok_or(Error::InvalidRandomWords)?;
        let players = Self::load_players(&env);
        if players.is_empty() {
            return Err(Error::NonexistentRequest);
        }

        let index = word
            .rem_euclid(&U256::from_u32(&env, players.len()))
            .to_u128()
            .ok_or(Error::Overflow)? as u32;
        let winner = players.get(index).ok_or(Error::PlayerIndexOutOfBounds)?;

        let token = TokenClient::new(&env, &config.token);
        let contract = env.current_contract_address();
        let prize = token.balance(&contract);
        if !matches!(token.try_transfer(&contract, &winner, &prize), Ok(Ok(()))) {
            log!(&env, "payout failed", request_id, winner, prize);
            return Err(Error::PayoutTransferFailed);
        }

        Self::save_players(&env, &Vec::new(&env));
        env.storage().instance().set(&DataKey::RecentWinner, &winner);
        env.storage()
            .instance()
            .set(&DataKey::LastTimestamp, &env.ledger().timestamp());
        env.storage().instance().remove(&DataKey::PendingRequest);
        env.storage().instance().set(&DataKey::State, &RaffleState::Open);

        WinnerPicked { winner, prize }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn entrance_fee(env: Env) -> Result<i128, Error> {
        Ok(Self::load_config(&env)?.entrance_fee)
    }

    pub fn interval(env: Env) -> Result<u64, Error> {
        Ok(Self::load_config(&env)?.interval)
    }

    pub fn config(env: Env) -> Result<RaffleConfig, Error> {
        Self::load_config(&env)
    }

    pub fn raffle_state(env: Env) -> Result<RaffleState, Error> {
        Self::load_state(&env)
    }

    pub fn player(env: Env, index: u32) -> Result<Address, Error> {
        Self::load_players(&env)
            .get(index)
            .ok_or(Error::PlayerIndexOutOfBounds)
    }

    pub fn number_of_players(env: Env) -> u32 {
        Self::load_players(&env).len()
    }

    pub fn recent_winner(env: Env) -> Option<Address> {
        env.storage().instance().get(&DataKey::RecentWinner)
    }

    pub fn latest_timestamp(env: Env) -> Result<u64, Error> {
        env.storage()
            .instance()
            .get(&DataKey::LastTimestamp)
            .ok_or(Error::NotInitialized)
    }

    pub fn pending_request(env: Env) -> Option<u64> {
        env.storage().instance().get(&DataKey::PendingRequest)
    }

    /// Current pool, i.e. the contract's token balance.
    pub fn prize_pool(env: Env) -> Result<i128, Error> {
        let config = Self::load_config(&env)?;
        Ok(TokenClient::new(&env, &config.token).balance(&env.current_contract_address()))
    }

    pub fn num_words(_env: Env) -> u32 {
        NUM_WORDS
    }

    pub fn request_confirmations(_env: Env) -> u32 {
        REQUEST_CONFIRMATIONS
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn load_config(env: &Env) -> Result<RaffleConfig, Error> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(Error::NotInitialized)
    }

    fn load_state(env: &Env) -> Result<RaffleState, Error> {
        env.storage()
            .instance()
            .get(&DataKey::State)
            .ok_or(Error::NotInitialized)
    }

    fn load_players(env: &Env) -> Vec<Address> {
        env.storage()
            .persistent()
            .get(&DataKey::Players)
            .unwrap_or_else(|| Vec::new(env))
    }

    fn save_players(env: &Env, players: &Vec<Address>) {
        env.storage().persistent().set(&DataKey::Players, players);
        env.storage().persistent().extend_ttl(
            &DataKey::Players,
            PERSISTENT_BUMP_THRESHOLD,
            PERSISTENT_BUMP_LEDGERS,
        );
    }

    fn upkeep_status(env: &Env) -> Result<UpkeepStatus, Error> {
        let config = Self::load_config(env)?;
        let last = Self::latest_timestamp(env.clone())?;
        Ok(UpkeepStatus {
            state: Self::load_state(env)?,
            players: Self::load_players(env).len(),
            balance: TokenClient::new(env, &config.token).balance(&env.current_contract_address()),
            elapsed: env.ledger().timestamp().saturating_sub(last),
            interval: config.interval,
        })
    }
}

/// Snapshot of everything upkeep eligibility depends on.
struct UpkeepStatus {
    state: RaffleState,
    players: u32,
    balance: i128,
    elapsed: u64,
    interval: u64,
}

impl UpkeepStatus {
    fn needed(&self) -> bool {
        self.state == RaffleState::Open
            && self.players > 0
            && self.balance > 0
            && self.elapsed >= self.interval
    }
}
