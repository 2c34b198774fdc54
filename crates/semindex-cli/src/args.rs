use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "semindex", version, about = "semindex CLI")]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Index store root directory (overrides SEMINDEX_STORE_PATH and the OS default).
    #[arg(long, global = true)]
    pub store_root: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run (or re-run) an index by name against its configured Source.
    Index {
        /// Index name.
        name: String,
        /// Source kind on first run: localfs|github|gitlab|bitbucket|web.
        #[arg(long)]
        source_type: Option<String>,
        /// Source configuration as a JSON object, shape matching the
        /// chosen source type's config (e.g. `{"owner":"o","repo":"r"}`).
        #[arg(long)]
        source_config: Option<String>,
    },

    /// Run a semantic search query against a named index.
    Search {
        name: String,
        query: String,
        #[arg(long)]
        max_chars: Option<u32>,
    },

    /// List files under a directory in a named index's bound Source.
    List {
        name: String,
        #[arg(long)]
        directory: Option<String>,
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        depth: Option<u32>,
        #[arg(long)]
        show_hidden: bool,
    },

    /// Read a file (optionally a line range or pattern match) from a named index's bound Source.
    Read {
        name: String,
        path: String,
        #[arg(long)]
        start_line: Option<u32>,
        #[arg(long)]
        end_line: Option<i64>,
        #[arg(long)]
        search_pattern: Option<String>,
        #[arg(long, default_value_t = 0)]
        context_before: u32,
        #[arg(long, default_value_t = 0)]
        context_after: u32,
        #[arg(long)]
        line_numbers: bool,
    },

    /// List all index names known to the store.
    Indexes,

    /// Delete a named index's persisted state.
    Delete { name: String },

    /// Run environment checks.
    Doctor,

    /// Run the JSON-RPC tool server.
    Serve {
        /// stdio|http
        #[arg(long, default_value = "stdio")]
        transport: String,
        /// Advertise and serve only the `search` tool.
        #[arg(long)]
        search_only: bool,
    },
}
