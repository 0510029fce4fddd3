//! # Till Operator CLI
//!
//! Runs the order operations against the configured database.
//!
//! ## Usage
//! ```bash
//! # Price two lines without taking stock
//! cargo run -p till-engine --bin till -- subtotal 1:2 4:1
//!
//! # Ring up an order paid 50000 with payment 1, cashier 2
//! cargo run -p till-engine --bin till -- order 1 50000 --cashier 2 1:2 4:1
//!
//! # Look an order up by id or receipt code
//! cargo run -p till-engine --bin till -- detail 12
//! cargo run -p till-engine --bin till -- detail S482Q
//!
//! # Newest orders first
//! cargo run -p till-engine --bin till -- list 20 0
//!
//! # Hand out an order's receipt file, or ask whether it was handed out
//! cargo run -p till-engine --bin till -- receipt 12
//! cargo run -p till-engine --bin till -- downloaded 12
//!
//! # Use a specific config file
//! cargo run -p till-engine --bin till -- --config ./till.toml list
//! ```

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use serde::Serialize;
use till_core::receipt::is_receipt_code;
use till_core::{AddOrderRequest, OrderLineRequest};
use till_engine::{EngineConfig, OrderLookup, OrderService};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: till [--config PATH] <command>

commands:
  subtotal ID:QTY...
  order PAYMENT_ID PAID [--cashier ID] ID:QTY...
  detail ID|RECEIPT
  list [LIMIT] [SKIP]
  receipt ORDER_ID
  downloaded ORDER_ID";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();

    let mut config_path = None;
    if let Some(at) = args.iter().position(|a| a == "--config") {
        let path = args.get(at + 1).context("--config needs a path")?.clone();
        config_path = Some(PathBuf::from(path));
        args.drain(at..=at + 1);
    }

    let Some((command, rest)) = args.split_first() else {
        bail!(USAGE);
    };

    let config = EngineConfig::load(config_path).context("loading configuration")?;
    let service = OrderService::bootstrap(&config)
        .await
        .context("starting order service")?;

    let outcome = run(&service, command, rest).await;
    service.shutdown().await;
    outcome
}

async fn run(service: &OrderService, command: &str, args: &[String]) -> anyhow::Result<()> {
    match command {
        "subtotal" => {
            let lines = parse_lines(args)?;
            print_json(&service.subtotal(&lines).await?)
        }
        "order" => {
            let request = parse_order(args)?;
            print_json(&service.add_order(request).await?)
        }
        "detail" => {
            let key = args.first().context("detail needs an order id or receipt code")?;
            print_json(&service.order_detail(parse_lookup(key)?).await?)
        }
        "list" => {
            let limit = parse_or(args.first(), 20)?;
            let skip = parse_or(args.get(1), 0)?;
            print_json(&service.list_orders(limit, skip).await?)
        }
        "receipt" => {
            let id = parse_order_id(args)?;
            let path = service.download_receipt(id).await?;
            print_json(&serde_json::json!({ "receiptFilePath": path }))
        }
        "downloaded" => {
            let id = parse_order_id(args)?;
            let downloaded = service.receipt_downloaded(id).await?;
            print_json(&serde_json::json!({ "isDownload": downloaded }))
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn parse_order(args: &[String]) -> anyhow::Result<AddOrderRequest> {
    let payment_id = args
        .first()
        .context("order needs a payment id")?
        .parse()
        .context("payment id must be a number")?;
    let total_paid = args
        .get(1)
        .context("order needs the amount paid")?
        .parse()
        .context("amount paid must be a number")?;

    let mut cashier_id = None;
    let mut rest: Vec<String> = args.iter().skip(2).cloned().collect();
    if let Some(at) = rest.iter().position(|a| a == "--cashier") {
        let id = rest.get(at + 1).context("--cashier needs an id")?;
        cashier_id = Some(id.parse().context("cashier id must be a number")?);
        rest.drain(at..=at + 1);
    }

    Ok(AddOrderRequest {
        payment_id,
        cashier_id,
        total_paid,
        products: parse_lines(&rest)?,
    })
}

/// `ID:QTY` pairs.
fn parse_lines(args: &[String]) -> anyhow::Result<Vec<OrderLineRequest>> {
    args.iter()
        .map(|arg| {
            let (id, qty) = arg
                .split_once(':')
                .with_context(|| format!("expected ID:QTY, got '{}'", arg))?;
            Ok(OrderLineRequest::new(
                id.parse().with_context(|| format!("bad product id in '{}'", arg))?,
                qty.parse().with_context(|| format!("bad quantity in '{}'", arg))?,
            ))
        })
        .collect()
}

fn parse_lookup(key: &str) -> anyhow::Result<OrderLookup> {
    if let Ok(id) = key.parse::<i64>() {
        return Ok(OrderLookup::Id(id));
    }
    if is_receipt_code(key) {
        return Ok(OrderLookup::ReceiptCode(key.to_string()));
    }
    bail!("'{}' is neither an order id nor a receipt code", key)
}

fn parse_order_id(args: &[String]) -> anyhow::Result<i64> {
    let id = args.first().context("expected an order id")?;
    id.parse()
        .with_context(|| format!("order id must be a number, got '{}'", id))
}

fn parse_or(arg: Option<&String>, default: i64) -> anyhow::Result<i64> {
    match arg {
        Some(value) => value
            .parse()
            .with_context(|| format!("expected a number, got '{}'", value)),
        None => Ok(default),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
