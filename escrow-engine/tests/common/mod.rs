//! Shared fixtures for the escrow integration tests

#![allow(dead_code)]

use deedlock_core::{tokens, Address, Amount, TokenId};
use deedlock_escrow::{EscrowNode, EscrowNodeConfig, RoleTable};

pub const URI: &str = "https://ipfs.io/ipfs/QmQVcpsjrA6cr1iJjZAodYwmPekYgbnXGo4DFubJiLc2EB/1.json";

/// Starting balance of every funded account, in whole tokens
pub const STARTING_TOKENS: u64 = 100;

pub struct Sale {
    pub node: EscrowNode,
    pub buyer: Address,
    pub seller: Address,
    pub inspector: Address,
    pub lender: Address,
}

impl Sale {
    pub async fn deploy() -> Self {
        Self::deploy_with(EscrowNodeConfig::default()).await
    }

    pub async fn deploy_with(config: EscrowNodeConfig) -> Self {
        let buyer = Address::random();
        let seller = Address::random();
        let inspector = Address::random();
        let lender = Address::random();

        let node = EscrowNode::deploy(config, seller, RoleTable::new(seller, inspector, lender))
            .expect("deploy");

        for account in [buyer, lender] {
            node.fund_account(account, tokens(STARTING_TOKENS))
                .await
                .expect("fund");
        }

        Self {
            node,
            buyer,
            seller,
            inspector,
            lender,
        }
    }

    /// Mint a property and list it for `buyer`
    pub async fn list_for(&self, buyer: Address, price: Amount, escrow: Amount) -> TokenId {
        let id = self.node.mint(self.seller, URI).await.expect("mint");
        self.node
            .approve(self.seller, self.node.escrow_address(), id)
            .await
            .expect("approve");
        self.node
            .list(self.seller, id, buyer, price, escrow)
            .await
            .expect("list");
        id
    }

    /// Listing for the default buyer at 10 tokens with 5 in escrow
    pub async fn listed(&self) -> TokenId {
        self.list_for(self.buyer, tokens(10), tokens(5)).await
    }

    /// Everything but the lender's funds and the finalize call
    pub async fn approved(&self) -> TokenId {
        let id = self.listed().await;
        self.node
            .deposit_earnest(self.buyer, id, tokens(5))
            .await
            .expect("deposit");
        self.node
            .update_inspection_status(self.inspector, id, true)
            .await
            .expect("inspect");
        for approver in [self.buyer, self.seller, self.lender] {
            self.node.approve_sale(approver, id).await.expect("approve");
        }
        id
    }
}
