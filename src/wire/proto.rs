//! Protobuf messages exchanged between participants.
//!
//! Declared by hand with the prost derive macros, so building the crate does
//! not need `protoc`. The equivalent schema:
//!
//! ```protobuf
//! syntax = "proto3";
//! package forcemove;
//!
//! message AllocationItem { bytes destination = 1; bytes amount = 2; }
//! message Allocation { repeated AllocationItem items = 1; }
//! message Guarantee { bytes target_channel_id = 1; repeated bytes destinations = 2; }
//! message AssetOutcome {
//!   bytes asset_holder = 1;
//!   oneof content { Allocation allocation = 2; Guarantee guarantee = 3; }
//! }
//! message Outcome { repeated AssetOutcome assets = 1; }
//! message State {
//!   bytes channel_id = 1; uint64 turn_num = 2; bool is_final = 3;
//!   Outcome outcome = 4; bytes app_definition = 5; bytes app_data = 6;
//!   uint64 challenge_duration = 7;
//! }
//! message SignedState { State state = 1; bytes signer = 2; bytes signature = 3; }
//! message SignedStates { repeated SignedState states = 1; }
//! message ConsensusData { uint32 further_votes_required = 1; Outcome proposed_outcome = 2; }
//! enum Strategy { DIRECT = 0; LEDGER = 1; VIRTUAL = 2; }
//! message StrategyProposal { bytes target_channel_id = 1; Strategy strategy = 2; uint32 attempt = 3; }
//! message StrategyAgreed { bytes target_channel_id = 1; Strategy strategy = 2; }
//! message StrategyRejected { bytes target_channel_id = 1; Strategy strategy = 2; }
//! message Envelope {
//!   bytes sender = 1; bytes recipient = 2;
//!   oneof msg {
//!     SignedStates signed_states = 3; StrategyProposal strategy_proposal = 4;
//!     StrategyAgreed strategy_agreed = 5; StrategyRejected strategy_rejected = 6;
//!   }
//! }
//! ```

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AllocationItem {
    #[prost(bytes = "vec", tag = "1")]
    pub destination: Vec<u8>,
    /// Big-endian, at most 32 bytes.
    #[prost(bytes = "vec", tag = "2")]
    pub amount: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Allocation {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<AllocationItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Guarantee {
    #[prost(bytes = "vec", tag = "1")]
    pub target_channel_id: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub destinations: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AssetOutcome {
    #[prost(bytes = "vec", tag = "1")]
    pub asset_holder: Vec<u8>,
    #[prost(oneof = "asset_outcome::Content", tags = "2, 3")]
    pub content: Option<asset_outcome::Content>,
}

pub mod asset_outcome {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Content {
        #[prost(message, tag = "2")]
        Allocation(super::Allocation),
        #[prost(message, tag = "3")]
        Guarantee(super::Guarantee),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Outcome {
    #[prost(message, repeated, tag = "1")]
    pub assets: Vec<AssetOutcome>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct State {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_id: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub turn_num: u64,
    #[prost(bool, tag = "3")]
    pub is_final: bool,
    #[prost(message, optional, tag = "4")]
    pub outcome: Option<Outcome>,
    #[prost(bytes = "vec", tag = "5")]
    pub app_definition: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub app_data: Vec<u8>,
    #[prost(uint64, tag = "7")]
    pub challenge_duration: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedState {
    #[prost(message, optional, tag = "1")]
    pub state: Option<State>,
    #[prost(bytes = "vec", tag = "2")]
    pub signer: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub signature: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedStates {
    #[prost(message, repeated, tag = "1")]
    pub states: Vec<SignedState>,
}

/// Ledger consensus data, stored in `State::app_data`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConsensusData {
    #[prost(uint32, tag = "1")]
    pub further_votes_required: u32,
    #[prost(message, optional, tag = "2")]
    pub proposed_outcome: Option<Outcome>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Strategy {
    Direct = 0,
    Ledger = 1,
    Virtual = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StrategyProposal {
    #[prost(bytes = "vec", tag = "1")]
    pub target_channel_id: Vec<u8>,
    #[prost(enumeration = "Strategy", tag = "2")]
    pub strategy: i32,
    #[prost(uint32, tag = "3")]
    pub attempt: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StrategyAgreed {
    #[prost(bytes = "vec", tag = "1")]
    pub target_channel_id: Vec<u8>,
    #[prost(enumeration = "Strategy", tag = "2")]
    pub strategy: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StrategyRejected {
    #[prost(bytes = "vec", tag = "1")]
    pub target_channel_id: Vec<u8>,
    #[prost(enumeration = "Strategy", tag = "2")]
    pub strategy: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub recipient: Vec<u8>,
    #[prost(oneof = "envelope::Msg", tags = "3, 4, 5, 6")]
    pub msg: Option<envelope::Msg>,
}

pub mod envelope {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "3")]
        SignedStates(super::SignedStates),
        #[prost(message, tag = "4")]
        StrategyProposal(super::StrategyProposal),
        #[prost(message, tag = "5")]
        StrategyAgreed(super::StrategyAgreed),
        #[prost(message, tag = "6")]
        StrategyRejected(super::StrategyRejected),
    }
}
