use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{modifiers, presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::sync::Arc;
use swapdesk::{
    arguments,
    balances::{BalanceAggregator, WalletSnapshot},
    config::{self, Config, CONFIG_FILE_PATH},
    logger::{self, LogTag},
    orchestrator::{SettlementTracker, SwapOrchestrator, TransferOrchestrator},
    quotes::{Quote, QuoteService},
    routers::JupiterClient,
    rpc::RpcClient,
    tokens::{Asset, AssetRegistry},
    transactions::{PendingTransaction, TransactionBuilder, TransactionResult},
    utils::{format_age_string, short_address},
    wallet::{KeypairSigner, WalletSession},
};

#[derive(Parser, Debug)]
#[command(name = "swapdesk")]
#[command(about = "Balances, quotes, swaps and transfers for a Solana wallet")]
#[command(after_help = "Logging: --verbose, --quiet, --debug-<tag> (e.g. --debug-quote, --debug-all)")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, default_value = CONFIG_FILE_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show holdings and recent activity
    Balances {
        /// Address to inspect instead of the configured wallet
        address: Option<String>,
    },
    /// Price a swap without executing it
    Quote {
        from: String,
        to: String,
        amount: String,
        #[arg(long)]
        slippage_bps: Option<u16>,
    },
    /// Quote, confirm and execute a swap
    Swap {
        from: String,
        to: String,
        amount: String,
        #[arg(long)]
        slippage_bps: Option<u16>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Send SOL or a token to another address
    Transfer {
        asset: String,
        recipient: String,
        amount: String,
        #[arg(long)]
        yes: bool,
    },
    /// Search the asset registry by symbol, name or address
    Tokens { query: String },
}

/// Shared clients built from config
struct Desk {
    config: Config,
    rpc: Arc<RpcClient>,
    registry: Arc<AssetRegistry>,
    aggregator: Arc<BalanceAggregator>,
    jupiter: Arc<JupiterClient>,
}

impl Desk {
    async fn build(config: Config) -> Result<Self> {
        let rpc = Arc::new(RpcClient::from_config(&config.rpc).context("RPC client")?);

        let registry = Arc::new(AssetRegistry::with_builtin());
        if config.registry.load_remote {
            registry
                .load_remote_or_keep(
                    &config.registry.token_list_url,
                    config.registry.timeout(),
                )
                .await;
        }

        let aggregator = Arc::new(BalanceAggregator::new(
            rpc.clone(),
            registry.clone(),
            config.rpc.timeout(),
            config.rpc.history_limit,
        ));
        let jupiter = Arc::new(JupiterClient::new(&config.quotes, &config.swaps));

        Ok(Self {
            config,
            rpc,
            registry,
            aggregator,
            jupiter,
        })
    }

    fn quote_service(&self) -> Arc<QuoteService> {
        Arc::new(QuoteService::new(
            self.jupiter.clone(),
            self.config.quotes.timeout(),
            self.config.quotes.validity(),
        ))
    }

    fn builder(&self) -> Arc<TransactionBuilder> {
        Arc::new(TransactionBuilder::new(
            self.rpc.clone(),
            self.jupiter.clone(),
            self.config.rpc.timeout(),
            self.config.swaps.timeout(),
        ))
    }

    fn settlement(&self) -> SettlementTracker {
        SettlementTracker::from_config(self.rpc.clone(), &self.config.settlement)
    }

    /// Connect the configured keypair; `ask_to_sign` prompts before each signature
    async fn connect(&self, ask_to_sign: bool) -> Result<Arc<WalletSession>> {
        let keypair = config::get_wallet_keypair().map_err(|e| anyhow!(e))?;
        let mut signer = KeypairSigner::new(keypair, self.rpc.clone());
        if ask_to_sign {
            signer = signer.with_approval(Arc::new(|pending: &PendingTransaction| {
                let question = format!("Sign and send {}?", pending.intent.describe());
                tokio::task::block_in_place(|| ask(&question))
            }));
        }
        let signer = Arc::new(signer);
        let session = Arc::new(WalletSession::new(signer, self.aggregator.clone()));
        session.connect().await?;
        Ok(session)
    }

    /// Registry entry by symbol or address, else a holding of the wallet
    fn resolve_asset(&self, query: &str, snapshot: Option<&WalletSnapshot>) -> Result<Asset> {
        if let Some(asset) = self.registry.find(query) {
            return Ok(asset);
        }
        snapshot
            .and_then(|s| {
                s.holdings()
                    .into_iter()
                    .find(|b| b.asset.address == query)
                    .map(|b| b.asset)
            })
            .ok_or_else(|| anyhow!("Unknown asset '{}'", query))
    }
}

fn styled_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        header
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn print_snapshot(snapshot: &WalletSnapshot) {
    let mut holdings = styled_table(&["Asset", "Name", "Amount", "Account"]);
    for balance in snapshot.holdings() {
        holdings.add_row(vec![
            Cell::new(&balance.asset.symbol),
            Cell::new(&balance.asset.name),
            Cell::new(&balance.ui_amount),
            Cell::new(
                balance
                    .token_account
                    .as_deref()
                    .map(short_address)
                    .unwrap_or_else(|| "native".to_string()),
            ),
        ]);
    }
    println!("Wallet {}", snapshot.owner);
    println!("{}", holdings);

    if let Ok(activity) = &snapshot.recent_activity {
        let mut table = styled_table(&["Signature", "Slot", "Age", "Status"]);
        for entry in activity {
            let block_time = entry
                .block_time
                .and_then(|t| chrono::DateTime::from_timestamp(t, 0));
            let status = if entry.succeeded {
                Cell::new("ok").fg(Color::Green)
            } else {
                Cell::new("failed").fg(Color::Red)
            };
            table.add_row(vec![
                Cell::new(short_address(&entry.signature)),
                Cell::new(entry.slot),
                Cell::new(format_age_string(block_time)),
                status,
            ]);
        }
        println!("Recent activity");
        println!("{}", table);
    }

    if !snapshot.is_complete() {
        println!("Snapshot is partial:");
        for error in snapshot.errors() {
            println!("⚠️  {}", error);
        }
    }
}

fn print_quote(quote: &Quote) {
    let mut table = styled_table(&["", ""]);
    table.add_row(vec![
        Cell::new("You pay"),
        Cell::new(format!("{} {}", quote.input_amount(), quote.source.symbol)),
    ]);
    table.add_row(vec![
        Cell::new("You receive (est.)"),
        Cell::new(format!(
            "{} {}",
            quote.output_estimate(),
            quote.destination.symbol
        )),
    ]);
    table.add_row(vec![
        Cell::new("Minimum received"),
        Cell::new(format!(
            "{} {}",
            quote.minimum_received(),
            quote.destination.symbol
        )),
    ]);
    if let Some(rate) = quote.rate() {
        table.add_row(vec![
            Cell::new("Rate"),
            Cell::new(format!(
                "1 {} ≈ {} {}",
                quote.source.symbol, rate, quote.destination.symbol
            )),
        ]);
    }
    table.add_row(vec![
        Cell::new("Price impact"),
        Cell::new(format!("{:.4}%", quote.price_impact_pct)),
    ]);
    table.add_row(vec![
        Cell::new("Slippage"),
        Cell::new(format!("{} bps", quote.slippage_bps)),
    ]);
    table.add_row(vec![Cell::new("Route"), Cell::new(&quote.route_label)]);
    table.add_row(vec![
        Cell::new("Valid for"),
        Cell::new(format!("{}s", quote.expires_in().as_secs())),
    ]);
    println!("{}", table);
}

fn print_result(result: &TransactionResult) {
    println!(
        "✅ {} {:?}: {}",
        result.kind,
        result.status,
        result.signature.as_deref().unwrap_or("-")
    );
}

/// Ask on stdin; anything but y/yes declines, and so does a closed stdin
fn ask(question: &str) -> bool {
    use std::io::Write;
    print!("{} [y/N]: ", question);
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    match std::io::stdin().read_line(&mut input) {
        Ok(_) => matches!(input.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

async fn confirm_prompt(question: String) -> Result<bool> {
    Ok(tokio::task::spawn_blocking(move || ask(&question)).await?)
}

async fn run(cli: Cli) -> Result<()> {
    config::load_config_from_path(&cli.config).map_err(|e| anyhow!(e))?;
    let config = config::get_config_clone();
    if !config.logging.file_path.is_empty() {
        logger::init_file(&config.logging.file_path);
    }

    let desk = Desk::build(config).await?;

    match cli.command {
        Command::Balances { address } => {
            let address = match address {
                Some(address) => address,
                None => config::get_wallet_pubkey()
                    .map_err(|e| anyhow!(e))?
                    .to_string(),
            };
            let snapshot = desk.aggregator.fetch(&address).await?;
            print_snapshot(&snapshot);
        }

        Command::Quote {
            from,
            to,
            amount,
            slippage_bps,
        } => {
            let source = desk.resolve_asset(&from, None)?;
            let destination = desk.resolve_asset(&to, None)?;
            let slippage = slippage_bps.unwrap_or(desk.config.quotes.default_slippage_bps);
            let quote = desk
                .quote_service()
                .quote(&source, &destination, &amount, slippage)
                .await?;
            print_quote(&quote);
        }

        Command::Swap {
            from,
            to,
            amount,
            slippage_bps,
            yes,
        } => {
            let session = desk.connect(false).await?;
            let snapshot = session.snapshot();
            let source = desk.resolve_asset(&from, snapshot.as_ref())?;
            let destination = desk.resolve_asset(&to, snapshot.as_ref())?;

            let swap = SwapOrchestrator::new(
                session,
                desk.quote_service(),
                desk.builder(),
                desk.settlement(),
                desk.config.wallet.signer_timeout(),
                desk.config.quotes.default_slippage_bps,
            );
            swap.set_source(source)?;
            swap.set_destination(destination)?;
            swap.set_amount(&amount)?;
            if let Some(bps) = slippage_bps {
                swap.set_slippage(bps)?;
            }

            let quote = swap.submit().await?;
            print_quote(&quote);

            if !yes && !confirm_prompt("Execute this swap?".to_string()).await? {
                logger::info(LogTag::Swap, "Swap not confirmed");
                return Ok(());
            }

            let result = swap.confirm().await?;
            print_result(&result);
        }

        Command::Transfer {
            asset,
            recipient,
            amount,
            yes,
        } => {
            // The wallet's signing prompt is the confirmation step for transfers
            let session = desk.connect(!yes).await?;
            let snapshot = session.snapshot();
            let asset = desk.resolve_asset(&asset, snapshot.as_ref())?;

            let transfer = TransferOrchestrator::new(
                session,
                desk.builder(),
                desk.settlement(),
                desk.config.wallet.signer_timeout(),
            );
            transfer.set_asset(asset)?;
            transfer.set_recipient(&recipient)?;
            transfer.set_amount(&amount)?;

            let result = transfer.submit().await?;
            print_result(&result);
        }

        Command::Tokens { query } => {
            let matches = desk.registry.search(&query, 20);
            if matches.is_empty() {
                bail!("No asset matches '{}'", query);
            }
            let mut table = styled_table(&["Symbol", "Name", "Decimals", "Address"]);
            for asset in matches {
                table.add_row(vec![
                    Cell::new(&asset.symbol),
                    Cell::new(&asset.name),
                    Cell::new(asset.decimals),
                    Cell::new(&asset.address),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    arguments::set_cmd_args(args.clone());
    logger::init();

    let cli = Cli::parse_from(args.into_iter().filter(|a| !arguments::is_logging_flag(a)));

    let outcome = run(cli).await;
    if let Err(e) = &outcome {
        match e.downcast_ref::<swapdesk::errors::FlowError>() {
            Some(flow) => logger::error(LogTag::System, &flow.user_message()),
            None => logger::error(LogTag::System, &format!("{:#}", e)),
        }
    }
    logger::flush();

    if outcome.is_err() {
        std::process::exit(1);
    }
}
