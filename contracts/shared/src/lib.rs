//! Cross-contract interfaces shared by the raffle and its randomness
//! coordinator.
//!
//! The raffle only knows the coordinator through [`VrfCoordinatorClient`], and
//! the coordinator only knows its consumers through [`VrfConsumerClient`]. Both
//! clients are generated from the traits below, so neither contract crate has
//! to depend on the other.
#![no_std]

use soroban_sdk::{contractclient, Address, BytesN, Env, Vec, U256};

/// Upper bound on the number of random words a single request may ask for.
pub const MAX_NUM_WORDS: u32 = 500;

/// Outbound side of the randomness protocol: submit a request, get back the
/// correlation id the fulfilment will carry.
#[contractclient(name = "VrfCoordinatorClient")]
pub trait VrfCoordinatorInterface {
    fn request_random_words(
        env: Env,
        consumer: Address,
        key_hash: BytesN<32>,
        sub_id: u64,
        minimum_request_confirmations: u32,
        callback_gas_limit: u32,
        num_words: u32,
    ) -> u64;
}

/// Inbound side of the randomness protocol, implemented by every consumer.
#[contractclient(name = "VrfConsumerClient")]
pub trait VrfConsumerInterface {
    fn raw_fulfill_random_words(env: Env, request_id: u64, random_words: Vec<U256>);
}
