//! Subcommand implementations: cartridge management, grain inspection, and
//! running a query through the cascade.

use crate::output::{Output, OutputFormat};
use anyhow::Result;
use clap::Subcommand;
use reflex_core::cartridge::{Annotation, CartridgeStore};
use reflex_core::engine::{CartridgeEngine, GrainEngine, InferenceEngine};
use reflex_core::grain::{GrainRouter, GrainStore};
use reflex_core::heartbeat::HeartbeatService;
use reflex_core::orchestrator::{CascadeLayer, QueryOrchestrator};
use reflex_core::resonance::ResonanceWeightStore;
use reflex_core::types::EpistemicLevel;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum CartridgeCommands {
    /// Add a single fact to a cartridge, creating it if absent.
    Add {
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        text: String,
        #[arg(long, default_value_t = 0.8)]
        confidence: f64,
    },
    /// Run a keyword query against a cartridge's index.
    Query {
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long, num_args = 1..)]
        terms: Vec<String>,
    },
    /// Print a cartridge's manifest.
    Show {
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
pub enum GrainCommands {
    /// List every grain loaded from `root`.
    List {
        #[arg(long)]
        root: PathBuf,
    },
    /// Look up a single grain's routing decision.
    Route {
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        grain_id: String,
    },
}

#[derive(Serialize)]
struct FactAdded {
    fact_id: u64,
}

impl Output for FactAdded {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "added fact {}", self.fact_id)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct QueryHits {
    hits: Vec<u64>,
}

impl Output for QueryHits {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        if self.hits.is_empty() {
            writeln!(writer, "no matches")?;
        } else {
            for id in &self.hits {
                writeln!(writer, "{id}")?;
            }
        }
        Ok(())
    }
}

pub fn run_cartridge(cmd: CartridgeCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        CartridgeCommands::Add {
            root,
            name,
            text,
            confidence,
        } => {
            let store = match CartridgeStore::load(&root, name.as_str()) {
                Ok(store) => store,
                Err(_) => CartridgeStore::create(&root, name.as_str()),
            };
            let annotation = Annotation::new(0, confidence, EpistemicLevel::L0Empirical);
            let fact_id = store.add_fact(&text, annotation)?;
            store.save()?;
            format.print_output(&FactAdded { fact_id })?;
        }
        CartridgeCommands::Query { root, name, terms } => {
            let store = CartridgeStore::load(&root, name.as_str())?;
            let hits = store.query(&terms, true);
            format.print_output(&QueryHits { hits })?;
        }
        CartridgeCommands::Show { root, name } => {
            let store = CartridgeStore::load(&root, name.as_str())?;
            let manifest = store.manifest();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&manifest)?),
                OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&manifest)?),
                OutputFormat::Human => println!(
                    "{} — {} facts, avg confidence {:.3}",
                    manifest.name, manifest.fact_count, manifest.average_confidence
                ),
            }
        }
    }
    Ok(())
}

pub fn run_grain(cmd: GrainCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        GrainCommands::List { root } => {
            let store = GrainStore::load(&root)?;
            let grains = store.all();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&grains)?),
                OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&grains)?),
                OutputFormat::Human => {
                    for grain in &grains {
                        println!(
                            "{} [{}] confidence={:.3}",
                            grain.grain_id, grain.cartridge, grain.confidence
                        );
                    }
                }
            }
        }
        GrainCommands::Route { root, grain_id } => {
            let store = GrainStore::load(&root)?;
            let router = GrainRouter::new(Arc::new(store));
            match router.routing_decision(&grain_id) {
                Some((grain, layer)) => match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&(grain, layer))?);
                    }
                    _ => println!("{} -> {:?}", grain.grain_id, layer),
                },
                None => println!("grain {grain_id} not found"),
            }
        }
    }
    Ok(())
}

/// Run a query through a two-layer cascade: the cartridge's grain store
/// first, then its raw keyword index.
pub async fn run_query(root: PathBuf, name: String, text: String) -> Result<()> {
    let cartridge_store = Arc::new(CartridgeStore::load(&root, name.as_str())?);
    let grain_store = Arc::new(GrainStore::load(&root)?);
    let router = Arc::new(GrainRouter::new(grain_store));

    let layers: Vec<CascadeLayer> = vec![
        CascadeLayer {
            name: "grain",
            engine: Arc::new(GrainEngine::new(router)) as Arc<dyn InferenceEngine>,
            threshold: reflex_core::constants::FALLBACK_THRESHOLD_GRAIN,
        },
        CascadeLayer {
            name: "cartridge",
            engine: Arc::new(CartridgeEngine::new(cartridge_store)) as Arc<dyn InferenceEngine>,
            threshold: reflex_core::constants::FALLBACK_THRESHOLD_CARTRIDGE,
        },
    ];

    let orchestrator = QueryOrchestrator::new(
        layers,
        Arc::new(ResonanceWeightStore::new(Default::default())),
        Arc::new(HeartbeatService::new()),
    );

    let result = orchestrator.process_query(&text).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
