// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

use std::io;

use bazaarrpc::{Guid, GuidParseError, RpcClient, RpcResponse};

use crate::args::Command;
use crate::client::{MemoryRouting, TcpTransport};

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ExecError {
    /// transport I/O error.
    ///
    /// {0}
    #[from]
    Io(io::Error),

    /// invalid peer guid: {0}
    BadPeer(GuidParseError),
}

fn print_response(resp: &RpcResponse, as_yaml: bool) {
    if resp.0.is_empty() {
        println!("not found");
        return;
    }
    if as_yaml {
        let hex_parts: Vec<String> = resp.0.iter().map(|part| part.iter().map(|b| format!("{b:02x}")).collect()).collect();
        println!("{}", serde_yaml::to_string(&hex_parts).expect("Vec<String> serializes infallibly"));
        return;
    }
    for (i, part) in resp.0.iter().enumerate() {
        let hex: String = part.iter().map(|b| format!("{b:02x}")).collect();
        println!("[{i}] {hex}");
    }
}

impl Command {
    pub fn exec(self, remote: String, peer_hex: &str, as_yaml: bool) -> Result<(), ExecError> {
        let peer = Guid::from_hex(peer_hex).map_err(ExecError::BadPeer)?;
        let transport = TcpTransport::new(remote);
        let routing = MemoryRouting::new();
        let client = RpcClient::new(&transport, &routing);

        let response = match self {
            Command::GetContract { contract_hash } => client.get_contract(&peer, contract_hash)?,
            Command::GetImage { image_hash } => client.get_image(&peer, image_hash)?,
            Command::GetProfile => client.get_profile(&peer)?,
            Command::GetUserMetadata => client.get_user_metadata(&peer)?,
            Command::GetListings => client.get_listings(&peer)?,
            Command::GetContractMetadata { contract_hash } => client.get_contract_metadata(&peer, contract_hash)?,
            Command::Follow { follower, sig } => client.follow(&peer, follower, sig)?,
            Command::Unfollow { sig } => client.unfollow(&peer, sig)?,
            Command::GetFollowers => client.get_followers(&peer)?,
            Command::GetFollowing => client.get_following(&peer)?,
            Command::Broadcast { message, sig } => client.broadcast(&peer, message, sig)?,
            Command::Message { ephem_pubkey, ciphertext } => client.message(&peer, ephem_pubkey, ciphertext)?,
            Command::Order { ephem_pubkey, ciphertext } => client.order(&peer, ephem_pubkey, ciphertext)?,
            Command::OrderConfirmation { ephem_pubkey, ciphertext } => {
                client.order_confirmation(&peer, ephem_pubkey, ciphertext)?
            }
            Command::CompleteOrder { ephem_pubkey, ciphertext } => {
                client.complete_order(&peer, ephem_pubkey, ciphertext)?
            }
            Command::DisputeOpen { ephem_pubkey, ciphertext } => client.dispute_open(&peer, ephem_pubkey, ciphertext)?,
            Command::DisputeClose { ephem_pubkey, ciphertext } => {
                client.dispute_close(&peer, ephem_pubkey, ciphertext)?
            }
            Command::GetRatings { listing_hash } => client.get_ratings(&peer, listing_hash)?,
            Command::Refund { ephem_pubkey, ciphertext } => client.refund(&peer, ephem_pubkey, ciphertext)?,
        };

        print_response(&response, as_yaml);
        Ok(())
    }
}
