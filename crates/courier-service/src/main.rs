//! Command-line driver for the courier fulfillment engine.
//!
//! Lists the partner's orders, walks a single order through pickup,
//! delivery, feedback and earnings finalization while printing the timeline,
//! and requests withdrawals of the available balance.

use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use courier_config::{BankAccount, Config};
use courier_core::{
	demo_orders, load_seed_file, FeedbackStep, FulfillmentEngine, FulfillmentState,
	MemoryFeedbackSink,
};
use courier_types::{Feedback, OrderRecord, OrderStage, PhotoRef};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

mod factory_registry;

/// Command-line arguments for the courier service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/config.toml", env = "COURIER_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List orders with their origin status and earnings
	Orders,
	/// Drive an order from pickup to payout
	Deliver(DeliverArgs),
	/// Show the balance or withdraw part of it
	Payout(PayoutArgs),
}

#[derive(ClapArgs, Debug)]
struct DeliverArgs {
	/// Order to deliver, e.g. ORD-001
	order_id: String,

	/// OTP given by the restaurant
	#[arg(long)]
	pickup_otp: String,

	/// Reference to the photo of the packed order
	#[arg(long)]
	photo: Option<String>,

	/// OTP given by the customer
	#[arg(long)]
	delivery_otp: String,

	/// Restaurant rating, 1 to 5 (0 for not rated)
	#[arg(long, default_value_t = 0, conflicts_with = "skip_feedback")]
	restaurant_rating: u8,

	#[arg(long, default_value = "", conflicts_with = "skip_feedback")]
	restaurant_comment: String,

	/// Customer rating, 1 to 5 (0 for not rated)
	#[arg(long, default_value_t = 0, conflicts_with = "skip_feedback")]
	customer_rating: u8,

	#[arg(long, default_value = "", conflicts_with = "skip_feedback")]
	customer_comment: String,

	/// Close the order without leaving feedback
	#[arg(long)]
	skip_feedback: bool,
}

#[derive(ClapArgs, Debug)]
struct PayoutArgs {
	/// Amount to withdraw. Without it the balance and accounts are shown.
	#[arg(long)]
	amount: Option<Decimal>,

	/// Bank account id, defaults to the first configured account
	#[arg(long)]
	account: Option<String>,

	/// Submit the request instead of only checking it
	#[arg(long, requires = "amount")]
	confirm: bool,
}

impl DeliverArgs {
	fn feedback(&self) -> Feedback {
		Feedback {
			restaurant_rating: self.restaurant_rating,
			restaurant_comment: self.restaurant_comment.clone(),
			customer_rating: self.customer_rating,
			customer_comment: self.customer_comment.clone(),
		}
	}
}

/// Main entry point for the courier service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration and order records
/// 4. Builds the engine and runs the requested command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.partner.id);

	let orders = match &config.orders.seed_file {
		Some(path) => load_seed_file(path).await?,
		None => demo_orders(),
	};

	let otp_length = config.fulfillment.otp_length;
	let sink = MemoryFeedbackSink::new();
	let engine =
		factory_registry::build_engine_from_config(config, orders, Arc::new(sink.clone())).await?;

	match args.command {
		Command::Orders => list_orders(&engine).await?,
		Command::Deliver(deliver) => {
			validate_otp(&deliver.pickup_otp, otp_length)?;
			validate_otp(&deliver.delivery_otp, otp_length)?;
			run_delivery(&engine, &deliver).await?;
			for (order_id, feedback) in sink.records().await {
				println!(
					"Feedback for {}: restaurant {}/5, customer {}/5",
					order_id, feedback.restaurant_rating, feedback.customer_rating
				);
			}
		},
		Command::Payout(payout) => run_payout(&engine, &payout).await?,
	}

	Ok(())
}

/// Checks that an OTP is exactly `length` ASCII digits.
fn validate_otp(otp: &str, length: usize) -> Result<(), String> {
	if otp.len() == length && otp.chars().all(|c| c.is_ascii_digit()) {
		Ok(())
	} else {
		Err(format!("Please enter a {}-digit OTP", length))
	}
}

async fn list_orders(engine: &FulfillmentEngine) -> Result<(), Box<dyn std::error::Error>> {
	for order in engine.list_orders().await? {
		println!("{}", describe_order(&order));
	}
	Ok(())
}

fn describe_order(order: &OrderRecord) -> String {
	format!(
		"{:<8} {:<12} {:<16} {} item(s)  {} km  Rs {}",
		order.id,
		order.status.to_string(),
		order.restaurant.name,
		order.item_count(),
		order.distance_km,
		order.earnings.total
	)
}

/// Runs the whole flow for one order, stopping at the first rejection.
async fn run_delivery(
	engine: &FulfillmentEngine,
	args: &DeliverArgs,
) -> Result<(), Box<dyn std::error::Error>> {
	let order_id = args.order_id.as_str();
	let order = engine.order(order_id).await?;
	println!("{}", describe_order(&order));

	let state = engine.open_order(order_id).await?;
	println!("Stage: {}", state.stage().label());

	engine.advance(order_id).await?;
	engine
		.confirm_pickup(order_id, &args.pickup_otp, args.photo.clone().map(PhotoRef::new))
		.await?;
	engine.advance(order_id).await?;
	engine.confirm_delivery(order_id, &args.delivery_otp).await?;
	println!("Finalizing earnings...");

	let state = if args.skip_feedback {
		engine.skip_feedback(order_id).await?
	} else {
		engine.submit_feedback(order_id, args.feedback()).await?
	};

	let payout = engine.await_payout(order_id).await?;
	print!("{}", render_timeline(&state));
	println!("Payout {}: {} {}", payout.id, payout.amount, payout.currency);
	println!("Available balance: Rs {}", engine.balance().await?);

	engine.close_order(order_id).await?;
	Ok(())
}

/// Shows the balance, checks a withdrawal, or submits it with `--confirm`.
async fn run_payout(
	engine: &FulfillmentEngine,
	args: &PayoutArgs,
) -> Result<(), Box<dyn std::error::Error>> {
	let accounts = &engine.config().payout.accounts;
	let Some(amount) = args.amount else {
		println!("Available balance: Rs {}", engine.balance().await?);
		for account in accounts {
			println!("  {}", describe_account(account));
		}
		return Ok(());
	};

	let account = match &args.account {
		Some(id) => accounts.iter().find(|account| &account.id == id),
		None => accounts.first(),
	}
	.ok_or("No matching bank account configured")?;

	let balance = engine.check_withdrawal(amount, &account.id).await?;
	println!("Withdraw Rs {} of Rs {} to {}", amount, balance, describe_account(account));
	if !args.confirm {
		println!("Re-run with --confirm to submit the request");
		return Ok(());
	}

	let withdrawal = engine.request_withdrawal(amount, &account.id).await?;
	println!("Processing withdrawal {}...", withdrawal.id);
	let submitted = engine.await_withdrawal(withdrawal.id).await?;
	println!(
		"Withdrawal {} ({}, requested {}). The money arrives within 24 hours.",
		submitted.id,
		submitted.status,
		format_time(submitted.requested_at)
	);
	println!("Available balance: Rs {}", engine.balance().await?);
	Ok(())
}

fn describe_account(account: &BankAccount) -> String {
	format!("{:<6} {} {}", account.id, account.bank_name, account.account_number)
}

fn render_timeline(state: &FulfillmentState) -> String {
	let mut out = String::new();
	for stage in OrderStage::TIMED {
		let at = state
			.stage_timestamps()
			.get(stage)
			.map(format_time)
			.unwrap_or_else(|| "--:--:--".to_string());
		out.push_str(&format!("  {}  {}\n", at, stage.label()));
	}
	let feedback = match state.feedback_step() {
		FeedbackStep::Pending => "pending",
		FeedbackStep::Submitted(_) => "submitted",
		FeedbackStep::Skipped => "skipped",
	};
	out.push_str(&format!("  Feedback: {}\n", feedback));
	out
}

fn format_time(at: DateTime<Utc>) -> String {
	at.format("%H:%M:%S").to_string()
}
