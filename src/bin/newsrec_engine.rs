use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use newsrec_core::toolkit::graph::EntityType;
use newsrec_core::{EngineConfig, MemoryStore, NewsrecEngine, Snapshot, CONFIG_PATH_ENV, DEFAULT_TOP_K};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "newsrec-engine", version, about = "News recommendation and tagging over a JSON snapshot")]
struct Cli {
    /// JSON snapshot with articles, tags, users, article tags, user tags and events.
    snapshot: PathBuf,

    /// Engine config file (YAML, TOML or JSON).
    #[arg(long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Rank recent articles for a user.
    Recommend {
        user_id: i64,

        #[arg(default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },

    /// Predict tags for a title.
    Classify {
        title: String,

        top_k: Option<usize>,
    },

    /// Dump the knowledge graph, optionally around one entity type.
    Graph {
        #[arg(value_parser = parse_entity_type)]
        focus: Option<EntityType>,
    },
}

fn parse_entity_type(raw: &str) -> Result<EntityType, String> {
    EntityType::from_str(raw).map_err(|_| format!("unknown entity type '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,newsrec_core=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("loading engine config")?;

    let raw = std::fs::read_to_string(&cli.snapshot)
        .with_context(|| format!("reading snapshot {}", cli.snapshot.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw).context("parsing snapshot")?;
    info!(
        "Loaded snapshot with {} articles and {} tags",
        snapshot.articles.len(),
        snapshot.tags.len()
    );

    let store = Arc::new(MemoryStore::from_snapshot(snapshot));
    let engine = NewsrecEngine::from_config(store, config);
    engine.init().await?;

    let output = match cli.command {
        Commands::Recommend { user_id, top_k } => {
            serde_json::to_string_pretty(&engine.recommend_for_user(user_id, top_k).await?)?
        }
        Commands::Classify { title, top_k } => {
            serde_json::to_string_pretty(&engine.predict_tags(&title, top_k, None))?
        }
        Commands::Graph { focus } => {
            serde_json::to_string_pretty(&engine.load_graph_summary(focus).await?)?
        }
    };

    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommend_defaults_top_k() {
        let cli = Cli::try_parse_from(["newsrec-engine", "snap.json", "recommend", "7"]).unwrap();
        assert_eq!(cli.snapshot, PathBuf::from("snap.json"));
        assert_eq!(cli.command, Commands::Recommend { user_id: 7, top_k: DEFAULT_TOP_K });
    }

    #[test]
    fn test_classify_with_top_k() {
        let cli = Cli::try_parse_from(["newsrec-engine", "snap.json", "classify", "HarmonyOS 新品", "2"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Classify {
                title: "HarmonyOS 新品".to_string(),
                top_k: Some(2),
            }
        );
    }

    #[test]
    fn test_graph_focus_is_case_insensitive() {
        let cli = Cli::try_parse_from(["newsrec-engine", "snap.json", "graph", "media_object"]).unwrap();
        assert_eq!(cli.command, Commands::Graph { focus: Some(EntityType::MediaObject) });

        let cli = Cli::try_parse_from(["newsrec-engine", "snap.json", "graph"]).unwrap();
        assert_eq!(cli.command, Commands::Graph { focus: None });
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Cli::try_parse_from(["newsrec-engine", "snap.json", "graph", "planet"]).is_err());
        assert!(Cli::try_parse_from(["newsrec-engine", "snap.json", "recommend", "abc"]).is_err());
        assert!(Cli::try_parse_from(["newsrec-engine", "snap.json"]).is_err());
    }
}
