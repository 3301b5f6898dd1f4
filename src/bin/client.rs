use clap::{Args, Parser, Subcommand};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "pos-client")]
#[command(about = "client cli used by restaurant staffs to interact with the server", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// menu related ops
    Menu,
    /// order related ops
    #[command(arg_required_else_help = true)]
    Order(OrderArgs),
    /// show the floor plan
    Tables,
}

#[derive(Debug, Args)]
struct OrderArgs {
    #[command(subcommand)]
    command: OrderCmds,
}

#[derive(Debug, Subcommand)]
enum OrderCmds {
    /// list orders, optionally filtered by status (comma-separated set)
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// place a demo dine-in order with random items, useful for smoke tests
    Demo,
    /// move an order to another status
    #[command(arg_required_else_help = true)]
    Status {
        #[arg(help = "Order id to operate")]
        id: i32,
        #[arg(help = "Target status, e.g. confirmed")]
        status: String,
    },
    /// mark an order as served and print the QR payment payload
    #[command(arg_required_else_help = true)]
    Serve {
        #[arg(help = "Order id to operate")]
        id: i32,
    },
    /// delete an order
    #[command(arg_required_else_help = true)]
    Delete {
        #[arg(help = "Order id to operate")]
        id: i32,
    },
}

const HOST: &str = "http://localhost:8080";

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    order_id: i32,
    table_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServedResponse {
    qr_code_data: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();

    match args.command {
        Commands::Menu => {
            let res = Client::new().get(format!("{HOST}/v1/menu")).send().await?;
            println!("{}", res.text().await?);
        }
        Commands::Tables => {
            let res = Client::new().get(format!("{HOST}/v1/tables")).send().await?;
            println!("{}", res.text().await?);
        }
        Commands::Order(order) => match order.command {
            OrderCmds::List { status } => {
                let mut req = Client::new().get(format!("{HOST}/v1/orders"));
                if let Some(status) = status {
                    req = req.query(&[("status", status)]);
                }
                let res = req.send().await?;
                println!("{}", res.text().await?);
            }
            OrderCmds::Demo => {
                let mut rng = rand::thread_rng();
                let customer = ["An", "Binh", "Chi", "Dung", "Huy"]
                    .choose(&mut rng)
                    .unwrap()
                    .to_string();
                let items: Vec<_> = (0..rng.gen_range(1..=3))
                    .map(|_| {
                        serde_json::json!({
                            "item_id": rng.gen_range(1..=8),
                            "quantity": rng.gen_range(1..=3),
                        })
                    })
                    .collect();
                let res = Client::new()
                    .post(format!("{HOST}/v1/orders"))
                    .json(&serde_json::json!({
                        "customer_name": customer.as_str(),
                        "items": items,
                        "order_type": "dine-in",
                    }))
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::CREATED => {
                        let created = res
                            .json::<CreateOrderResponse>()
                            .await
                            .expect("failed to get response, aborting");
                        println!(
                            "order {} placed for {}, table {}",
                            created.order_id,
                            customer,
                            created.table_number.as_deref().unwrap_or("-")
                        );
                    }
                    StatusCode::CONFLICT => {
                        println!("no table could be assigned, the floor may be full");
                    }
                    unexpected => {
                        println!("got unexpected status code, {}", unexpected);
                    }
                }
            }
            OrderCmds::Status { id, status } => {
                let res = Client::new()
                    .post(format!("{HOST}/v1/orders/{id}/status"))
                    .json(&serde_json::json!({ "status": status }))
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => println!("order {id} moved to {status}"),
                    StatusCode::CONFLICT => {
                        println!("order {id} cannot move to {status} from its current status")
                    }
                    StatusCode::NOT_FOUND => println!("order {id} does not exist"),
                    unexpected => println!("got unexpected status code, {}", unexpected),
                }
            }
            OrderCmds::Serve { id } => {
                let res = Client::new()
                    .post(format!("{HOST}/v1/orders/{id}/status"))
                    .json(&serde_json::json!({ "status": "served" }))
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => {
                        let served = res
                            .json::<ServedResponse>()
                            .await
                            .expect("failed to get response, aborting");
                        println!("order {id} served, qr payload: {}", served.qr_code_data);
                    }
                    StatusCode::CONFLICT => println!("order {id} is not ready to be served"),
                    StatusCode::NOT_FOUND => println!("order {id} does not exist"),
                    unexpected => println!("got unexpected status code, {}", unexpected),
                }
            }
            OrderCmds::Delete { id } => {
                let res = Client::new()
                    .delete(format!("{HOST}/v1/orders/{id}"))
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => println!("order {id} deleted"),
                    StatusCode::NOT_FOUND => println!("order {id} does not exist"),
                    unexpected => println!("got unexpected status code, {}", unexpected),
                }
            }
        },
    };
    Ok(())
}
