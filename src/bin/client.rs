//! Interactive client for a sharevote peer
//!
//! Usage: `client [addr]`, then commands such as
//! `invoke write2 bob s1 yes` or `query read2 bob s1`.

use sharevote::protocol::{parse_command, Command};
use sharevote::Client;
use std::env;
use std::io::{self, Write};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server_addr = env::args().nth(1).unwrap_or_else(|| "127.0.0.1:7052".to_string());

    println!("Connecting to sharevote peer at {}...", server_addr);
    let mut client = Client::connect(&server_addr).await?;
    println!("Connected! Type 'help' for available commands or 'quit' to exit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "quit" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "help" => print_help(),
            _ => {
                if let Err(e) = handle_command(&mut client, input).await {
                    println!("Error: {}", e);
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}

async fn handle_command(client: &mut Client, input: &str) -> Result<(), Box<dyn std::error::Error>> {
    // Reuse the wire grammar so quoting works the same as on the peer
    let (verb, rest) = input.split_once(' ').unwrap_or((input, ""));
    let line = format!("{} {}\r\n", verb.to_ascii_uppercase(), rest);

    let command = match parse_command(line.as_bytes()) {
        Ok(command) => command,
        Err(_) => {
            println!("Unknown command: {}. Type 'help' for available commands.", input);
            return Ok(());
        }
    };

    let payload = match &command {
        Command::Init { args } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            client.init(&args).await?;
            None
        }
        Command::Invoke { function, args } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            client.invoke(function, &args).await?
        }
        Command::Query { function, args } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            client.query(function, &args).await?
        }
    };

    match payload {
        Some(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
        None => println!("OK"),
    }

    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!("  init <value>                - Store <value> under the init key");
    println!("  invoke <function> <args>... - write, write2, write3, write4");
    println!("  query <function> <args>...  - read, read2, read3, read4");
    println!("  help                        - Show this help message");
    println!("  quit                        - Exit the client");
    println!("Quote arguments containing spaces: \"two words\"");
}
