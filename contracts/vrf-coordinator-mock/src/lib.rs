//! Subscription-billed randomness coordinator for local networks and tests.
//!
//! Consumers submit requests against a funded subscription and receive a
//! strictly increasing request id. Anyone may later fulfil a pending request,
//! either with words derived from the request id or with caller-supplied
//! words, at which point the consumer's `raw_fulfill_random_words` callback is
//! invoked and the subscription is billed
//! `base_fee + gas_price_link * callback_gas_limit`.
//!
//! ## Storage Strategy
//! - `instance()`: admin, fee parameters and the id counters.
//! - `persistent()`: one entry per subscription and per pending request,
//!   bumped on every write.
#![no_std]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, log, Address, Bytes,
    BytesN, Env, Vec, U256,
};
use stellar_raffle_shared::{VrfConsumerClient, MAX_NUM_WORDS};

// ---------------------------------------------------------------------------
// TTL / storage constants
// ---------------------------------------------------------------------------

const PERSISTENT_BUMP_LEDGERS: u32 = 518_400; // ~30 days
const PERSISTENT_BUMP_THRESHOLD: u32 = PERSISTENT_BUMP_LEDGERS - 100_800; // Renew ~7 days early

/// Maximum number of consumers a single subscription may register.
pub const MAX_CONSUMERS: u32 = 100;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    InvalidInput = 3,
    InvalidSubscription = 4,
    InvalidConsumer = 5,
    TooManyConsumers = 6,
    ConsumerNotFound = 7,
    NumWordsTooHigh = 8,
    NonexistentRequest = 9,
    InvalidRandomWords = 10,
    InsufficientBalance = 11,
    Overflow = 12,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Clone)]
#[contracttype]
pub enum DataKey {
    Admin,
    BaseFee,
    GasPriceLink,
    CurrentSubId,
    CurrentRequestId,
    Subscription(u64),
    Request(u64),
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Subscription {
    pub owner: Address,
    pub balance: i128,
    pub req_count: u64,
    pub consumers: Vec<Address>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RandomnessRequest {
    pub sub_id: u64,
    pub consumer: Address,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct SubscriptionCreated {
    #[topic]
    pub sub_id: u64,
    pub owner: Address,
}

#[contractevent]
pub struct SubscriptionFunded {
    #[topic]
    pub sub_id: u64,
    pub old_balance: i128,
    pub new_balance: i128,
}

#[contractevent]
pub struct SubscriptionCanceled {
    #[topic]
    pub sub_id: u64,
    pub to: Address,
    pub amount: i128,
}

#[contractevent]
pub struct ConsumerAdded {
    #[topic]
    pub sub_id: u64,
    pub consumer: Address,
}

#[contractevent]
pub struct ConsumerRemoved {
    #[topic]
    pub sub_id: u64,
    pub consumer: Address,
}

#[contractevent]
pub struct RandomWordsRequested {
    #[topic]
    pub key_hash: BytesN<32>,
    pub request_id: u64,
    pub sub_id: u64,
    pub minimum_request_confirmations: u32,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    pub sender: Address,
}

#[contractevent]
pub struct RandomWordsFulfilled {
    #[topic]
    pub request_id: u64,
    pub payment: i128,
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct VrfCoordinatorMock;

#[contractimpl]
impl VrfCoordinatorMock {
    /// Initialise the coordinator with its billing parameters.
    ///
    /// `base_fee` is the flat premium charged per fulfilment and
    /// `gas_price_link` the price of one unit of callback gas, both in the
    /// subscription's billing unit.
    pub fn init(
        env: Env,
        admin: Address,
        base_fee: i128,
        gas_price_link: i128,
    ) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        if base_fee < 0 || gas_price_link < 0 {
            return Err(Error::InvalidInput);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::BaseFee, &base_fee);
        env.storage().instance().set(&DataKey::GasPriceLink, &gas_price_link);
        env.storage().instance().set(&DataKey::CurrentSubId, &0u64);
        env.storage().instance().set(&DataKey::CurrentRequestId, &0u64);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn create_subscription(env: Env, owner: Address) -> Result<u64, Error> {
        Self::require_initialized(&env)?;
        owner.require_auth();

        let sub_id = Self::next_id(&env, DataKey::CurrentSubId)?;
        let subscription = Subscription {
            owner: owner.clone(),
            balance: 0,
            req_count: 0,
            consumers: Vec::new(&env),
        };
        Self::save_subscription(&env, sub_id, &subscription);

        SubscriptionCreated { sub_id, owner }.publish(&env);

        Ok(sub_id)
    }

    /// Credit a subscription. The mock keeps billing balances as plain
    /// accounting, no token moves.
    pub fn fund_subscription(env: Env, sub_id: u64, amount: i128) -> Result<(), Error> {
        if amount <= 0 {
            return Err(Error::InvalidInput);
        }

        let mut subscription = Self::load_subscription(&env, sub_id)?;
        let old_balance = subscription.balance;
        subscription.balance = old_balance.checked_add(amount).ok_or(Error::Overflow)?;
        Self::save_subscription(&env, sub_id, &subscription);

        SubscriptionFunded {
            sub_id,
            old_balance,
            new_balance: subscription.balance,
        }
        .publish(&env);

        Ok(())
    }

    pub fn add_consumer(env: Env, sub_id: u64, consumer: Address) -> Result<(), Error> {
        let mut subscription = Self::load_subscription(&env, sub_id)?;
        subscription.owner.require_auth();

        if subscription.consumers.contains(&consumer) {
            // Adding twice is a no-op.
            return Ok(());
        }
        if subscription.consumers.len() >= MAX_CONSUMERS {
            return Err(Error::TooManyConsumers);
        }

        subscription.consumers.push_back(consumer.clone());
        Self::save_subscription(&env, sub_id, &subscription);

        ConsumerAdded { sub_id, consumer }.publish(&env);

        Ok(())
    }

    pub fn remove_consumer(env: Env, sub_id: u64, consumer: Address) -> Result<(), Error> {
        let mut subscription = Self::load_subscription(&env, sub_id)?;
        subscription.owner.require_auth();

        let index = subscription
            .consumers
            .first_index_of(&consumer)
            .ok_or(Error::ConsumerNotFound)?;
        subscription.consumers.remove(index);
        Self::save_subscription(&env, sub_id, &subscription);

        ConsumerRemoved { sub_id, consumer }.publish(&env);

        Ok(())
    }

    /// Drop a subscription. The remaining balance is reported as refunded to
    /// `to`.
    pub fn cancel_subscription(env: Env, sub_id: u64, to: Address) -> Result<(), Error> {
        let subscription = Self::load_subscription(&env, sub_id)?;
        subscription.owner.require_auth();

        env.storage()
            .persistent()
            .remove(&DataKey::Subscription(sub_id));

        SubscriptionCanceled {
            sub_id,
            to,
            amount: subscription.balance,
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Register a randomness request on behalf of `consumer` and return its id.
    ///
    /// Ids start at 1 and strictly increase.
    pub fn request_random_words(
        env: Env,
        consumer: Address,
        key_hash: BytesN<32>,
        sub_id: u64,
        minimum_request_confirmations: u32,
        callback_gas_limit: u32,
        num_words: u32,
    ) -> Result<u64, Error> {
        let subscription = Self::load_subscription(&env, sub_id)?;
        if !subscription.consumers.contains(&consumer) {
            return Err(Error::InvalidConsumer);
        }
        if num_words == 0 {
            return Err(Error::InvalidInput);
        }
        if num_words > MAX_NUM_WORDS {
            return Err(Error::NumWordsTooHigh);
        }

        consumer.require_auth();

        let request_id = Self::next_id(&env, DataKey::CurrentRequestId)?;
        let request = RandomnessRequest {
            sub_id,
            consumer: consumer.clone(),
            callback_gas_limit,
            num_words,
        };
        let key = DataKey::Request(request_id);
        env.storage().persistent().set(&key, &request);
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_THRESHOLD, PERSISTENT_BUMP_LEDGERS);

        RandomWordsRequested {
            key_hash,
            request_id,
            sub_id,
            minimum_request_confirmations,
            callback_gas_limit,
            num_words,
            sender: consumer,
        }
        .publish(&env);

        Ok(request_id)
    }

    /// Fulfil a pending request with words derived from its id.
    pub fn fulfill_random_words(env: Env, request_id: u64, consumer: Address) -> Result<(), Error> {
        Self::fulfill_random_words_override(env.clone(), request_id, consumer, Vec::new(&env))
    }

    /// Fulfil a pending request. An empty `words` list means "derive them";
    /// otherwise its length must match the request's `num_words`.
    pub fn fulfill_random_words_override(
        env: Env,
        request_id: u64,
        consumer: Address,
        words: Vec<U256>,
    ) -> Result<(), Error> {
        let key = DataKey::Request(request_id);
        let request: RandomnessRequest = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(Error::NonexistentRequest)?;

        if request.consumer != consumer {
            return Err(Error::InvalidConsumer);
        }

        let words = if words.is_empty() {
            Self::derive_words(&env, request_id, request.num_words)
        } else if words.len() == request.num_words {
            words
        } else {
            return Err(Error::InvalidRandomWords);
        };

        let mut subscription = Self::load_subscription(&env, request.sub_id)?;
        let payment = Self::payment_for(&env, request.callback_gas_limit)?;
        if subscription.balance < payment {
            return Err(Error::InsufficientBalance);
        }

        env.storage().persistent().remove(&key);

        let success = matches!(
            VrfConsumerClient::new(&env, &consumer).try_raw_fulfill_random_words(&request_id, &words),
            Ok(Ok(()))
        );
        if !success {
            log!(&env, "consumer callback failed", request_id, consumer);
        }

        subscription.balance -= payment;
        subscription.req_count = subscription
            .req_count
            .checked_add(1)
            .ok_or(Error::Overflow)?;
        Self::save_subscription(&env, request.sub_id, &subscription);

        RandomWordsFulfilled {
            request_id,
            payment,
            success,
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn get_subscription(env: Env, sub_id: u64) -> Option<Subscription> {
        env.storage().persistent().get(&DataKey::Subscription(sub_id))
    }

    pub fn consumer_is_added(env: Env, sub_id: u64, consumer: Address) -> bool {
        Self::get_subscription(env, sub_id)
            .map(|s| s.consumers.contains(&consumer))
            .unwrap_or(false)
    }

    pub fn get_request(env: Env, request_id: u64) -> Option<RandomnessRequest> {
        env.storage().persistent().get(&DataKey::Request(request_id))
    }

    pub fn base_fee(env: Env) -> Result<i128, Error> {
        env.storage()
            .instance()
            .get(&DataKey::BaseFee)
            .ok_or(Error::NotInitialized)
    }

    pub fn gas_price_link(env: Env) -> Result<i128, Error> {
        env.storage()
            .instance()
            .get(&DataKey::GasPriceLink)
            .ok_or(Error::NotInitialized)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn require_initialized(env: &Env) -> Result<Address, Error> {
        env.storage()
            .instance()
            .get(&DataKey::Admin)
            .ok_or(Error::NotInitialized)
    }

    fn next_id(env: &Env, counter: DataKey) -> Result<u64, Error> {
        let current: u64 = env
            .storage()
            .instance()
            .get(&counter)
            .ok_or(Error::NotInitialized)?;
        let next = current.checked_add(1).ok_or(Error::Overflow)?;
        env.storage().instance().set(&counter, &next);
        Ok(next)
    }

    fn load_subscription(env: &Env, sub_id: u64) -> Result<Subscription, Error> {
        env.storage()
            .persistent()
            .get(&DataKey::Subscription(sub_id))
            .ok_or(Error::InvalidSubscription)
    }

    fn save_subscription(env: &Env, sub_id: u64, subscription: &Subscription) {
        let key = DataKey::Subscription(sub_id);
        env.storage().persistent().set(&key, subscription);
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_THRESHOLD, PERSISTENT_BUMP_LEDGERS);
    }

    fn payment_for(env: &Env, callback_gas_limit: u32) -> Result<i128, Error> {
        let base_fee = Self::base_fee(env.clone())?;
        let gas_price_link = Self::gas_price_link(env.clone())?;
        gas_price_link
            .checked_mul(callback_gas_limit as i128)
            .and_then(|gas| gas.checked_add(base_fee))
            .ok_or(Error::Overflow)
    }

    /// `keccak256(request_id || index)` for every requested word.
    fn derive_words(env: &Env, request_id: u64, num_words: u32) -> Vec<U256> {
        let mut words = Vec::new(env);
        for index in 0..num_words {
            let mut preimage = [0u8; 16];
            preimage[..8].copy_from_slice(&request_id.to_be_bytes());
            preimage[8..].copy_from_slice(&(index as u64).to_be_bytes());
            let digest: BytesN<32> = env
                .crypto()
                .keccak256(&Bytes::from_slice(env, &preimage))
                .into();
            words.push_back(U256::from_be_bytes(env, &Bytes::from(digest)));
        }
        words
    }
}
