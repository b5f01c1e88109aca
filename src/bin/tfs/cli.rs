use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tiny_fs::{DEFAULT_MAX_DNUM, DEFAULT_MAX_INUM};

/// Inspect and edit a tiny-fs image without mounting it
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about)]
pub struct Cli {
    /// Image file
    #[arg(long, short, default_value = "tfs.img")]
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Create (or overwrite) the image and format it
    Mkfs {
        /// Number of inodes
        #[arg(long, default_value_t = DEFAULT_MAX_INUM)]
        inodes: u32,
        /// Number of data blocks
        #[arg(long, default_value_t = DEFAULT_MAX_DNUM)]
        blocks: u32,
    },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show the attributes of a file or directory
    Stat { path: String },
    /// Create a directory
    Mkdir {
        path: String,
        /// Permission bits, octal
        #[arg(long, short, default_value = "755", value_parser = parse_mode)]
        mode: u32,
    },
    /// Remove an empty directory
    Rmdir { path: String },
    /// Copy a host file into the image
    Put {
        source: PathBuf,
        path: String,
        /// Permission bits, octal
        #[arg(long, short, default_value = "644", value_parser = parse_mode)]
        mode: u32,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Remove a file
    Rm { path: String },
    /// Show free inodes and blocks
    Df,
}

fn parse_mode(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| format!("{:?} is not an octal mode", s))
}
