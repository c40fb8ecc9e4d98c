use clap::{Parser, Subcommand};

/// Sparse-kernel dependency built before the extension itself.
pub const DEFAULT_STK_URL: &str = "https://github.com/stanford-futuredata/stk";

/// Mixture-of-experts extension repository.
pub const DEFAULT_MOE_URL: &str = "https://github.com/databricks/megablocks";

#[derive(Parser)]
#[command(
    name = "rocforge",
    about = "Rocforge: hipify mapping-table patching and MoE extension source builds",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Insert the CUB mapping entry into the installed package's hipify table
    Patch {
        /// Package whose conversion table is patched
        #[arg(long, default_value = rocforge_patch::DEFAULT_PACKAGE)]
        package: String,

        /// pip executable used for package discovery
        #[arg(long, default_value = "pip")]
        pip: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report the patch state of the installed mapping file without writing
    Status {
        /// Package whose conversion table is inspected
        #[arg(long, default_value = rocforge_patch::DEFAULT_PACKAGE)]
        package: String,

        /// pip executable used for package discovery
        #[arg(long, default_value = "pip")]
        pip: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the whole recipe: patch the table, then clone and build the extension stack
    Provision {
        /// Directory that receives the cloned source trees
        #[arg(long, default_value = "build")]
        workdir: String,

        /// Sparse-kernel dependency repository
        #[arg(long, default_value = DEFAULT_STK_URL)]
        stk_url: String,

        /// Branch or tag for the sparse-kernel dependency
        #[arg(long)]
        stk_rev: Option<String>,

        /// MoE extension repository
        #[arg(long, default_value = DEFAULT_MOE_URL)]
        moe_url: String,

        /// Branch or tag for the MoE extension
        #[arg(long)]
        moe_rev: Option<String>,

        /// Package whose conversion table is patched
        #[arg(long, default_value = rocforge_patch::DEFAULT_PACKAGE)]
        package: String,

        /// pip executable used for discovery and source builds
        #[arg(long, default_value = "pip")]
        pip: String,

        /// git executable used for cloning
        #[arg(long, default_value = "git")]
        git: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
