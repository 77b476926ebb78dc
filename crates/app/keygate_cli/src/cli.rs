use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "keygate", about = "Keygate signing key tooling", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an RSA signing key for personal API keys (PKCS#8 PEM).
    Keygen {
        /// Write the key to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Overwrite `--out` if it already exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Print the JWKS document for a signing key.
    Jwks {
        /// PEM file holding the private key.
        #[arg(short, long, env = "PAK_PRIVATE_KEY_PATH")]
        key: PathBuf,
    },

    /// Print the version.
    Version,
}
