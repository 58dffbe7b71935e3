// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

pub const BAZAAR_NODE_ENV: &str = "BAZAAR_NODE_REMOTE";

/// Command-line tool for working with a bazaar node
#[derive(Parser, Clone, PartialEq, Eq, Debug)]
#[command(name = "bazaar-cli", bin_name = "bazaar-cli", author, version)]
pub struct Args {
    /// Set a verbosity level
    ///
    /// Can be used multiple times to increase verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Remote address of the bazaar node to connect to
    #[arg(short, long, default_value = "127.0.0.1:9735", env = BAZAAR_NODE_ENV)]
    pub remote: String,

    /// Hex-encoded guid of the peer the request targets
    #[arg(short, long)]
    pub peer: String,

    /// Print the response as YAML instead of a plain hex dump
    #[arg(long, global = true)]
    pub yaml: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("'{s}' has an odd number of hex digits"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

/// Command-line commands, one per protocol opcode.
#[derive(Subcommand, Clone, PartialEq, Eq, Debug, Display)]
pub enum Command {
    /// Fetch a contract document by its hash
    #[display("get-contract")]
    GetContract {
        #[arg(value_parser = parse_hex)]
        contract_hash: Vec<u8>,
    },

    /// Fetch a stored file by its hash (e.g. a listing image)
    #[display("get-image")]
    GetImage {
        #[arg(value_parser = parse_hex)]
        image_hash: Vec<u8>,
    },

    /// Fetch the peer's signed profile
    #[display("get-profile")]
    GetProfile,

    /// Fetch the peer's signed user metadata
    #[display("get-user-metadata")]
    GetUserMetadata,

    /// Fetch the peer's signed listings index
    #[display("get-listings")]
    GetListings,

    /// Fetch a single signed listing entry by contract hash
    #[display("get-contract-metadata")]
    GetContractMetadata {
        #[arg(value_parser = parse_hex)]
        contract_hash: Vec<u8>,
    },

    /// Register as a follower of the peer
    #[display("follow")]
    Follow {
        #[arg(value_parser = parse_hex)]
        follower: Vec<u8>,
        #[arg(value_parser = parse_hex)]
        sig: Vec<u8>,
    },

    /// Unregister as a follower of the peer
    #[display("unfollow")]
    Unfollow {
        #[arg(value_parser = parse_hex)]
        sig: Vec<u8>,
    },

    /// Fetch the peer's followers
    #[display("get-followers")]
    GetFollowers,

    /// Fetch who the peer is following
    #[display("get-following")]
    GetFollowing,

    /// Send a broadcast message to a peer that follows us
    #[display("broadcast")]
    Broadcast {
        #[arg(value_parser = parse_hex)]
        message: Vec<u8>,
        #[arg(value_parser = parse_hex)]
        sig: Vec<u8>,
    },

    /// Send a sealed-box private message
    #[display("message")]
    Message {
        #[arg(value_parser = parse_hex)]
        ephem_pubkey: Vec<u8>,
        #[arg(value_parser = parse_hex)]
        ciphertext: Vec<u8>,
    },

    /// Submit a sealed-box purchase order
    #[display("order")]
    Order {
        #[arg(value_parser = parse_hex)]
        ephem_pubkey: Vec<u8>,
        #[arg(value_parser = parse_hex)]
        ciphertext: Vec<u8>,
    },

    /// Submit a sealed-box vendor order confirmation
    #[display("order-confirmation")]
    OrderConfirmation {
        #[arg(value_parser = parse_hex)]
        ephem_pubkey: Vec<u8>,
        #[arg(value_parser = parse_hex)]
        ciphertext: Vec<u8>,
    },

    /// Submit a sealed-box buyer receipt, releasing escrow
    #[display("complete-order")]
    CompleteOrder {
        #[arg(value_parser = parse_hex)]
        ephem_pubkey: Vec<u8>,
        #[arg(value_parser = parse_hex)]
        ciphertext: Vec<u8>,
    },

    /// Open a sealed-box dispute claim
    #[display("dispute-open")]
    DisputeOpen {
        #[arg(value_parser = parse_hex)]
        ephem_pubkey: Vec<u8>,
        #[arg(value_parser = parse_hex)]
        ciphertext: Vec<u8>,
    },

    /// Close a sealed-box dispute with a resolution
    #[display("dispute-close")]
    DisputeClose {
        #[arg(value_parser = parse_hex)]
        ephem_pubkey: Vec<u8>,
        #[arg(value_parser = parse_hex)]
        ciphertext: Vec<u8>,
    },

    /// Fetch ratings, optionally scoped to one listing
    #[display("get-ratings")]
    GetRatings {
        #[arg(value_parser = parse_hex)]
        listing_hash: Option<Vec<u8>>,
    },

    /// Submit a sealed-box refund request
    #[display("refund")]
    Refund {
        #[arg(value_parser = parse_hex)]
        ephem_pubkey: Vec<u8>,
        #[arg(value_parser = parse_hex)]
        ciphertext: Vec<u8>,
    },
}
