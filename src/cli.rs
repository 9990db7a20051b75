use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize a new repository in the current directory
    Init,

    /// Print the content, type or size of a stored object
    CatFile {
        #[clap(short = 'p')]
        pretty_print: bool,

        #[clap(short = 't')]
        show_type: bool,

        #[clap(short = 's')]
        show_size: bool,

        object_hash: String,
    },

    /// Hash a file as a blob, optionally storing it
    HashObject {
        #[clap(short = 'w')]
        write: bool,

        file_path: String,
    },

    /// List the entries of a tree object
    LsTree {
        #[clap(long = "name-only")]
        name_only: bool,

        tree_hash: String,
    },

    /// Write the current directory as a tree object
    WriteTree,

    /// Create a commit object for a tree
    CommitTree {
        tree_hash: String,

        #[clap(short = 'p')]
        parent: Option<String>,

        #[clap(short = 'm')]
        message: String,
    },

    /// Clone a remote repository over Smart HTTP
    Clone { url: String, target_dir: String },
}
