//! Command-line front end for signed containers.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signed_container::{
    archive::ZipArchive,
    authority::HttpAuthority,
    config::Settings,
    container::{self, ContainerSigner, Creator},
    signature::ManifestSigner,
};

#[derive(Parser)]
#[command(name = "signed-container")]
#[command(about = "Create signed data containers and manage their signatures", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file with the signing authority endpoint and credentials
    #[arg(
        long,
        global = true,
        env = "SIGNED_CONTAINER_SETTINGS",
        default_value = Settings::DEFAULT_FILE
    )]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a container from data files and sign it
    Create {
        /// Destination container path
        container: PathBuf,

        /// Comma-separated list of data files
        #[arg(value_delimiter = ',', required = true)]
        files: Vec<PathBuf>,
    },

    /// Extract a container
    Open {
        /// Container to extract
        container: PathBuf,

        /// Destination directory; defaults to the container name without extension
        #[arg(long)]
        into: Option<PathBuf>,
    },

    /// Add a signature over the container's data files
    AddSignature {
        /// Container to sign
        container: PathBuf,
    },

    /// Remove a signature entry
    RemoveSignature {
        /// Container to modify
        container: PathBuf,

        /// Index of the signature entry
        signature_id: u32,
    },

    /// List data files and signature entries
    List {
        /// Container to inspect
        container: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        println!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(&cli.settings)
        .with_context(|| format!("Failed to load settings from {}", cli.settings.display()))?;

    let authority = HttpAuthority::from_settings(&settings)?;
    let signatures =
        Arc::new(ManifestSigner::new(Arc::new(authority)).with_algorithm(settings.hash_algorithm));
    let archive = Arc::new(ZipArchive::new());

    match cli.command {
        Commands::Create { container, files } => {
            Creator::new(signatures, archive)
                .with_scratch_dir(settings.scratch_dir.clone())
                .create(&files, &container)
                .await?;
            println!("created {}", container.display());
        }
        Commands::Open { container, into } => {
            let destination = match into {
                Some(dir) => dir,
                None => default_destination(&container)?,
            };
            let paths = container::open(archive.as_ref(), &container, &destination)?;
            println!("extracted container files:");
            for path in paths {
                println!("  {}", path.display());
            }
        }
        Commands::AddSignature { container } => {
            let index = ContainerSigner::new(signatures, archive)
                .with_scratch_dir(settings.scratch_dir.clone())
                .add_signature(&container)
                .await?;
            println!("{index}");
        }
        Commands::RemoveSignature {
            container,
            signature_id,
        } => {
            ContainerSigner::new(signatures, archive)
                .with_scratch_dir(settings.scratch_dir.clone())
                .remove_signature(&container, signature_id)
                .await?;
            println!("removed signature {signature_id}");
        }
        Commands::List { container } => {
            let listing = container::list(archive.as_ref(), &container)?;
            println!("data files:");
            for name in &listing.data_files {
                println!("  {name}");
            }
            println!("signatures:");
            for index in &listing.signatures {
                println!("  {index}");
            }
        }
    }

    Ok(())
}

/// `./<container file stem>`, e.g. `./bundle` for `bundle.zip`.
fn default_destination(container: &Path) -> Result<PathBuf> {
    let stem = container
        .file_stem()
        .with_context(|| format!("Container path {} has no file name", container.display()))?;
    Ok(PathBuf::from(".").join(stem))
}
