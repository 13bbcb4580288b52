//! Line-oriented calculator client.
//!
//! ```text
//! calc-client [HOST] [PORT]
//! ```
//!
//! Sends each line of stdin as one command and prints the reply. Empty
//! results print nothing. Error replies are printed and the session
//! continues; a broken connection ends it.

use tokio::io::{AsyncBufReadExt, BufReader};
use turnwire::prelude::*;
use turnwire::DEFAULT_PORT;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    turnwire::logging::init("warn");

    let mut args = std::env::args().skip(1);
    let host = args.next();
    let port = match args.next() {
        Some(p) => p.parse()?,
        None => DEFAULT_PORT,
    };

    let mut client = Client::connect(host.as_deref(), port).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match client.request(&line).await {
            Ok(value) if value.is_empty() => {}
            Ok(value) => println!("{value}"),
            Err(TurnwireError::Application(message)) => println!("error: {message}"),
            Err(e) => {
                eprintln!("connection lost: {e}");
                return Err(e.into());
            }
        }
    }

    client.close().await;
    Ok(())
}
