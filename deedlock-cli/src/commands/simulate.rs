//! Simulate command implementation.

use anyhow::Context;
use clap::Args;
use deedlock_core::{Address, Amount, TokenId};
use deedlock_escrow::{EscrowEvent, EscrowNode, EscrowNodeConfig, ListingState, RoleTable};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::output;

const DEFAULT_URI: &str =
    "https://ipfs.io/ipfs/QmQVcpsjrA6cr1iJjZAodYwmPekYgbnXGo4DFubJiLc2EB/1.json";

/// Arguments for the simulate command.
#[derive(Args)]
pub struct SimulateArgs {
    /// TOML file layered over the defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Purchase price in whole tokens
    #[arg(long, default_value = "10")]
    pub price: String,

    /// Earnest money in whole tokens
    #[arg(long, default_value = "5")]
    pub escrow: String,

    /// Metadata URI of the minted property
    #[arg(long, default_value = DEFAULT_URI)]
    pub uri: String,

    /// Inspector reports a failed inspection; the sale is then cancelled
    #[arg(long)]
    pub fail_inspection: bool,

    /// Buyer cancels instead of settling
    #[arg(long)]
    pub cancel: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Sale terms driven through the node.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub purchase_price: Amount,
    pub escrow_amount: Amount,
    pub metadata_uri: String,
    pub inspection_passes: bool,
    pub cancel: bool,
}

impl Scenario {
    fn settles(&self) -> bool {
        self.inspection_passes && !self.cancel
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Parties {
    pub buyer: Address,
    pub seller: Address,
    pub inspector: Address,
    pub lender: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct Balances {
    pub buyer: Amount,
    pub seller: Amount,
    pub lender: Amount,
    pub escrow: Amount,
}

/// JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReport {
    pub token_id: TokenId,
    pub state: ListingState,
    pub owner: Address,
    pub registry: Address,
    pub escrow: Address,
    pub parties: Parties,
    pub balances: Balances,
    pub events: Vec<EscrowEvent>,
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let config = EscrowNodeConfig::load(args.config.as_deref())
        .context("Failed to load node configuration")?;

    let scenario = Scenario {
        purchase_price: Amount::parse_tokens(&args.price).context("Invalid --price")?,
        escrow_amount: Amount::parse_tokens(&args.escrow).context("Invalid --escrow")?,
        metadata_uri: args.uri,
        inspection_passes: !args.fail_inspection,
        cancel: args.cancel,
    };

    let report = run_sale(config, &scenario).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

/// Drive one sale from mint to settlement or cancellation.
pub async fn run_sale(config: EscrowNodeConfig, scenario: &Scenario) -> anyhow::Result<SaleReport> {
    let parties = Parties {
        buyer: Address::random(),
        seller: Address::random(),
        inspector: Address::random(),
        lender: Address::random(),
    };

    let node = EscrowNode::deploy(
        config,
        parties.seller,
        RoleTable::new(parties.seller, parties.inspector, parties.lender),
    )?;

    let financed = scenario
        .purchase_price
        .checked_sub(scenario.escrow_amount)
        .context("Escrow amount exceeds purchase price")?;

    node.fund_account(parties.buyer, scenario.escrow_amount).await?;
    if !financed.is_zero() {
        node.fund_account(parties.lender, financed).await?;
    }

    let token_id = node.mint(parties.seller, &scenario.metadata_uri).await?;
    node.approve(parties.seller, node.escrow_address(), token_id)
        .await?;
    node.list(
        parties.seller,
        token_id,
        parties.buyer,
        scenario.purchase_price,
        scenario.escrow_amount,
    )
    .await
    .context("Listing failed")?;

    node.deposit_earnest(parties.buyer, token_id, scenario.escrow_amount)
        .await
        .context("Earnest deposit failed")?;
    node.update_inspection_status(parties.inspector, token_id, scenario.inspection_passes)
        .await?;

    if scenario.settles() {
        for approver in [parties.buyer, parties.seller, parties.lender] {
            node.approve_sale(approver, token_id).await?;
        }
        if !financed.is_zero() {
            node.contribute(parties.lender, token_id, financed)
                .await
                .context("Lender funding failed")?;
        }
        node.finalize_sale(parties.seller, token_id)
            .await
            .context("Settlement failed")?;
    } else {
        node.cancel_sale(parties.buyer, token_id)
            .await
            .context("Cancellation failed")?;
    }

    let listing = node.listing(token_id).await?;
    info!("Sale of property {} ended {}", token_id, listing.state);

    Ok(SaleReport {
        token_id,
        state: listing.state,
        owner: node.owner_of(token_id).await?,
        registry: node.registry_address(),
        escrow: node.escrow_address(),
        balances: Balances {
            buyer: node.balance_of(parties.buyer).await,
            seller: node.balance_of(parties.seller).await,
            lender: node.balance_of(parties.lender).await,
            escrow: node.get_balance().await,
        },
        parties,
        events: node.events().await,
    })
}

fn print_report(report: &SaleReport) {
    output::header(&format!("Property #{}", report.token_id));
    output::kv("Registry", &report.registry.to_string());
    output::kv("Escrow", &report.escrow.to_string());
    output::kv("Owner", &report.owner.to_string());

    output::header("Balances");
    output::kv("Buyer", &output::tokens(report.balances.buyer));
    output::kv("Seller", &output::tokens(report.balances.seller));
    output::kv("Lender", &output::tokens(report.balances.lender));
    output::kv("Escrow", &output::tokens(report.balances.escrow));

    output::header("Events");
    for event in &report.events {
        output::event(event);
    }

    println!();
    match report.state {
        ListingState::Finalized => output::success("Sale finalized, property delivered to buyer"),
        _ => output::warn("Sale cancelled, property returned to seller"),
    }
}
