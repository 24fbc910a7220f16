//! Operator CLI over the encrypted store. The store location and secret come
//! from the environment (see `StoreConfig::from_env`).

use std::env;
use std::process::ExitCode;

use secure_store::{Persist, SecureStore, StoreConfig};
use serde_json::Value;

fn print_usage() {
    eprintln!("Commands:\n  get <key>\n  set <key> <json-or-text>\n  remove <key>\n  reset\n  print\n  print-formatted\n  print-pretty\n  fingerprint\n  path\n\nEnvironment:\n  SECURE_STORE_SECRET  secret used to encrypt the store\n  SECURE_STORE_PATH    backing file (defaults to the platform data dir)\n  SECURE_STORE_CONFIG  JSON config file, overrides the two above");
}

/// Command-line values that are valid JSON are stored as JSON; anything else
/// is stored as a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::FAILURE;
    }

    let config = match StoreConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("config load failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut store = match SecureStore::open(&config) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("store open failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match (args[1].as_str(), args.len()) {
        ("get", 3) => {
            println!("{}", store.get(&args[2], Value::Null));
            Ok(())
        }
        ("set", 4) => store.set(args[2].as_str(), parse_value(&args[3]), Persist::Immediately),
        ("remove", 3) => store.remove(&args[2], Persist::Immediately).map(|removed| {
            if removed.is_none() {
                eprintln!("no entry named {}", args[2]);
            }
        }),
        ("reset", 2) => store.reset_all(),
        ("print", 2) => {
            println!("{}", store.print());
            Ok(())
        }
        ("print-formatted", 2) => {
            print!("{}", store.print_formatted());
            Ok(())
        }
        ("print-pretty", 2) => {
            println!("{}", store.print_pretty());
            Ok(())
        }
        ("fingerprint", 2) => store.fingerprint().map(|digest| println!("{digest}")),
        ("path", 2) => {
            println!("{}", store.path().display());
            Ok(())
        }
        _ => {
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} failed: {err}", args[1]);
            ExitCode::FAILURE
        }
    }
}
