//! Card Sync - Pokémon card identity resolution and enrichment
//!
//! Builds the set mapping artifact and serves enriched cards and sets on the
//! command line. All components are wired up here.

use card_sync::config::Config;
use card_sync::set_mapping::{
    build_mappings, fetch_catalog_a, fetch_catalog_b, read_catalog_a, read_catalog_b,
    read_overrides, Overrides,
};
use card_sync::{
    CardService, FileArtifactLoader, MappingIndex, MemoryCache, PokeDataClient, PokemonTcgClient,
    ServiceSettings, SetResolver, SqliteStore, SyncResult, VolatileCache,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tcg_common::CardSource;

/// Pokémon card sync - set mapping and card enrichment across two catalogs
#[derive(Parser, Debug)]
#[command(name = "card_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long, global = true, env = "CARD_SYNC_DATABASE")]
    database: Option<PathBuf>,

    /// Path to the set mapping artifact
    #[arg(long, global = true)]
    mapping: Option<PathBuf>,

    /// Pokémon TCG API key
    #[arg(long, global = true, env = "POKEMON_TCG_API_KEY", hide_env_values = true)]
    pokemon_tcg_api_key: Option<String>,

    /// PokeData API key
    #[arg(long, global = true, env = "POKEDATA_API_KEY", hide_env_values = true)]
    pokedata_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve set identities between the catalogs and write the mapping artifact
    BuildMappings {
        /// Catalog A `/sets` dump (fetched from the API when omitted)
        #[arg(long)]
        catalog_a: Option<PathBuf>,
        /// Catalog B `/sets` dump (fetched from the API when omitted)
        #[arg(long)]
        catalog_b: Option<PathBuf>,
        /// JSON object of manual `catalogASetId: catalogBSetId` pairs
        #[arg(long)]
        overrides: Option<PathBuf>,
        /// Output path (defaults to the configured mapping path)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print an enriched card as JSON
    Card {
        id: String,
        #[arg(long)]
        force_refresh: bool,
    },
    /// Print one page of a set's cards as JSON
    SetCards {
        set_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// 0 uses the configured default
        #[arg(long, default_value_t = 0)]
        page_size: u32,
        #[arg(long)]
        force_refresh: bool,
    },
    /// Print the set list as JSON
    Sets {
        /// Only sets released within the configured window
        #[arg(long)]
        current: bool,
        #[arg(long)]
        force_refresh: bool,
    },
    /// Query the set mapping artifact
    Mapping {
        #[command(subcommand)]
        command: MappingCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MappingCommand {
    /// Catalog A set for a Catalog B set id
    Lookup { catalog_b_set_id: u64 },
    /// Artifact metadata
    Stats,
    /// Sets one catalog could not map
    Unmapped {
        #[arg(value_enum)]
        side: Side,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Side {
    A,
    B,
}

impl From<Side> for CardSource {
    fn from(side: Side) -> Self {
        match side {
            Side::A => CardSource::CatalogA,
            Side::B => CardSource::CatalogB,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupOutput {
    catalog_b_set_id: u64,
    catalog_a_set_id: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args.command, &config).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

/// Config file first, then flags and environment
fn load_config(args: &Args) -> SyncResult<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.database = database.clone();
    }
    if let Some(mapping) = &args.mapping {
        config.mapping_path = mapping.clone();
    }
    if let Some(key) = &args.pokemon_tcg_api_key {
        config.pokemon_tcg.api_key = Some(key.clone());
    }
    if let Some(key) = &args.pokedata_api_key {
        config.pokedata.api_key = Some(key.clone());
    }
    Ok(config)
}

async fn run(command: Command, config: &Config) -> SyncResult<()> {
    match command {
        Command::BuildMappings {
            catalog_a,
            catalog_b,
            overrides,
            output,
        } => {
            let timeout = config.http_timeout();
            let catalog_a = match catalog_a {
                Some(path) => read_catalog_a(&path)?,
                None => {
                    let client = PokemonTcgClient::new(&config.pokemon_tcg, timeout)?;
                    fetch_catalog_a(&client).await?
                }
            };
            let catalog_b = match catalog_b {
                Some(path) => read_catalog_b(&path)?,
                None => {
                    let client = PokeDataClient::new(&config.pokedata, timeout)?;
                    fetch_catalog_b(&client).await?
                }
            };
            let overrides = match overrides {
                Some(path) => read_overrides(&path)?,
                None => Overrides::new(),
            };
            let output = output.unwrap_or_else(|| config.mapping_path.clone());

            let artifact = build_mappings(
                &SetResolver::default(),
                &catalog_a,
                &catalog_b,
                &overrides,
                &output,
            )?;
            println!(
                "{} mappings, {} unmapped Catalog A sets, {} unmapped Catalog B sets -> {}",
                artifact.metadata.total_mappings,
                artifact.metadata.unmapped_a,
                artifact.metadata.unmapped_b,
                output.display()
            );
        }
        Command::Card { id, force_refresh } => {
            let service = build_service(config)?;
            let response = service.get_card(&id, force_refresh).await?;
            print_json(&response)?;
        }
        Command::SetCards {
            set_id,
            page,
            page_size,
            force_refresh,
        } => {
            let service = build_service(config)?;
            let page = service
                .list_cards_in_set(&set_id, page, page_size, force_refresh)
                .await?;
            print_json(&page)?;
        }
        Command::Sets {
            current,
            force_refresh,
        } => {
            let service = build_service(config)?;
            let sets = if current {
                service.current_sets(force_refresh).await?
            } else {
                service.list_sets(force_refresh).await?
            };
            print_json(&sets)?;
        }
        Command::Mapping { command } => {
            let index = MappingIndex::new(FileArtifactLoader::new(&config.mapping_path));
            match command {
                MappingCommand::Lookup { catalog_b_set_id } => print_json(&LookupOutput {
                    catalog_b_set_id,
                    catalog_a_set_id: index.lookup(catalog_b_set_id),
                })?,
                MappingCommand::Stats => print_json(&index.stats())?,
                MappingCommand::Unmapped { side } => {
                    print_json(&index.list_unmapped(side.into()))?
                }
            }
        }
    }
    Ok(())
}

/// Wire the card service from configuration
fn build_service(config: &Config) -> SyncResult<CardService> {
    let timeout = config.http_timeout();
    let catalog_a = Arc::new(PokemonTcgClient::new(&config.pokemon_tcg, timeout)?);
    let catalog_b = Arc::new(PokeDataClient::new(&config.pokedata, timeout)?);
    let store = Arc::new(SqliteStore::open(&config.database)?);
    let cache = Arc::new(VolatileCache::with_backend(
        Arc::new(MemoryCache::new()),
        config.cache.clone(),
    ));
    let mappings = Arc::new(MappingIndex::new(FileArtifactLoader::new(
        &config.mapping_path,
    )));

    Ok(CardService::new(
        catalog_a,
        catalog_b,
        store,
        cache,
        mappings,
        ServiceSettings::from(config),
    ))
}

fn print_json<T: Serialize>(value: &T) -> SyncResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
