// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stacklink")]
#[command(about = "Hand identifiers from one stack to another and repoint a function at a new image")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only final results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new stacklink.yml configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Publish stack outputs to the shared exchange location
    Publish {
        /// JSON file of stack outputs; may be repeated, later files win
        #[arg(long = "from-file", value_name = "PATH")]
        from_file: Vec<PathBuf>,

        /// Set a single export; may be repeated
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        set: Vec<(String, String)>,

        /// Require every configured export key before uploading
        #[arg(long)]
        validate: bool,
    },

    /// Print the published export document
    Fetch {
        /// Print only this key
        #[arg(long)]
        key: Option<String>,
    },

    /// Build and push the image, update the function, and declare the gateway
    Deploy {
        /// Refuse exports whose digest differs from this one
        #[arg(long, value_name = "DIGEST")]
        expect_digest: Option<String>,

        /// Write the gateway declaration to this file
        #[arg(long, value_name = "PATH")]
        gateway_out: Option<PathBuf>,
    },

    /// Detach the update resource from the declared graph
    Remove {
        /// Leave the function on its current image
        #[arg(long, conflicts_with = "restore_image", required_unless_present = "restore_image")]
        acknowledge: bool,

        /// Point the function at this image before detaching
        #[arg(long, value_name = "IMAGE")]
        restore_image: Option<String>,
    },

    /// Show the recorded state of the update resource
    Status,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
