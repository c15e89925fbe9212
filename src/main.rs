// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use kura::commands::clean_trash::CleanTrashCommand;
use kura::commands::lock::LockCommand;
use kura::commands::remove::RemoveCommand;
use kura::error::{Result, format_error_chain};
use kura::logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kura")]
#[command(author, version, about = "Prefix lock and trash maintenance tool", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reclaim quarantined trash files under a prefix
    CleanTrash {
        /// Managed prefix to clean
        prefix: PathBuf,

        /// Scan the whole prefix instead of reading the trash index
        #[arg(long)]
        deep: bool,

        /// Output the report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Safely remove a file or directory, quarantining it if needed
    Remove {
        /// Managed prefix the path belongs to
        prefix: PathBuf,

        /// File or directory to remove
        path: PathBuf,
    },

    /// Acquire the lock for a path and hold it until interrupted
    Lock {
        /// File or directory to lock
        path: PathBuf,

        /// Seconds to wait for a contended lock (0 waits indefinitely)
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::setup_logger(cli.verbose);

    let result = run(cli.command);
    if let Err(err) = result {
        eprintln!("{}", format_error_chain(&err));
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::CleanTrash { prefix, deep, json } => {
            CleanTrashCommand::new()?.execute(&prefix, deep, json)
        }
        Commands::Remove { prefix, path } => RemoveCommand::new()?.execute(&prefix, &path),
        Commands::Lock { path, timeout } => LockCommand::new()?.execute(&path, timeout),
    }
}
