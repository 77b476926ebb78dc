// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use clap::Parser;
use cli::{Cli, Commands};
use keygate_core::auth::keys::{KeyManager, generate_private_key_pem};

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match &args.command {
        Commands::Keygen { out, force } => {
            let pem = generate_private_key_pem()?;
            match out {
                Some(path) => {
                    write_key(path, &pem, *force)?;
                    log::info!("wrote signing key to {}", path.display());
                }
                None => print!("{pem}"),
            }
        }
        Commands::Jwks { key } => {
            let pem = std::fs::read_to_string(key)?;
            let keys = KeyManager::from_pem(&pem)?;
            println!("{}", serde_json::to_string_pretty(&keys.export_jwks())?);
        }
        Commands::Version => {
            println!(
                "{} {} (keygate_core {})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                keygate_core::version()
            );
        }
    }

    Ok(())
}

/// Write `pem` to `path`, owner-readable only on Unix.
fn write_key(path: &Path, pem: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Custom(format!(
            "{} already exists; pass --force to overwrite",
            path.display()
        )));
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(pem.as_bytes())?;
    Ok(())
}
