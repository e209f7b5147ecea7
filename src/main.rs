use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use overlord_editor::backend::{race_names, BackendClient, GenerateWorldRequest};
use overlord_editor::config::EditorConfig;
use overlord_editor::controller::MapController;
use overlord_editor::dispatch::Dispatcher;
use overlord_editor::explorer::{run_editor, EditorOptions};
use overlord_editor::geometry::HexLayout;
use overlord_editor::naming::{NamingConfig, SettlementNameGenerator};
use overlord_editor::terrain::TerrainCatalog;
use overlord_editor::world::World;
use overlord_editor::world_file::{read_world, write_world};

const DEFAULT_WIDTH: u32 = 20;
const DEFAULT_HEIGHT: u32 = 15;

#[derive(Parser, Debug)]
#[command(name = "overlord_editor")]
#[command(about = "Hex map editor and world console for New Overlord")]
struct Args {
    /// Editor configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides the config file and OVERLORD_BACKEND_URL)
    #[arg(short, long, global = true)]
    backend: Option<String>,

    /// Hex layout
    #[arg(long, value_enum, global = true)]
    layout: Option<LayoutArg>,

    /// Log file used while the terminal editor is open
    #[arg(long, global = true, default_value = "overlord_editor.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    Row,
    Column,
}

impl From<LayoutArg> for HexLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Row => HexLayout::RowOffset,
            LayoutArg::Column => HexLayout::ColumnOffset,
        }
    }
}

/// Grid size written as `WIDTHxHEIGHT`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Dims {
    width: u32,
    height: u32,
}

impl FromStr for Dims {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", s))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("bad width {:?}", w))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("bad height {:?}", h))?;
        if width == 0 || height == 0 {
            return Err("width and height must be positive".to_string());
        }
        Ok(Dims { width, height })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the terminal map editor
    Edit {
        /// Local world file; created on first write when missing
        #[arg(long, conflicts_with = "load")]
        world: Option<PathBuf>,

        /// Load a saved world from the backend
        #[arg(long, conflicts_with_all = ["generate", "new"])]
        load: Option<String>,

        /// Ask the backend for a fresh WIDTHxHEIGHT world
        #[arg(long, conflicts_with = "new")]
        generate: Option<Dims>,

        /// Start from an empty WIDTHxHEIGHT plains map
        #[arg(long)]
        new: Option<Dims>,

        /// Name for new or generated worlds
        #[arg(long)]
        name: Option<String>,
    },
    /// Generate a world on the backend
    Generate {
        #[arg(short = 'W', long, default_value_t = DEFAULT_WIDTH)]
        width: u32,

        #[arg(short = 'H', long, default_value_t = DEFAULT_HEIGHT)]
        height: u32,

        #[arg(long)]
        name: Option<String>,

        /// Fraction of hexes that get a settlement
        #[arg(long, default_value_t = 0.3)]
        density: f64,

        #[arg(short, long)]
        seed: Option<u64>,

        /// Write the generated world to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List worlds saved on the backend
    List,
    /// Download a saved world to a local file
    Fetch {
        name: String,

        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Everything the subcommands share.
struct Session {
    config: EditorConfig,
    runtime: Runtime,
    client: BackendClient,
    catalog: Arc<TerrainCatalog>,
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<EditorConfig> {
    let mut config = match &args.config {
        Some(path) => EditorConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => EditorConfig::default(),
    }
    .with_env();
    if let Some(url) = &args.backend {
        config.backend.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(layout) = args.layout {
        config.geometry.layout = layout.into();
    }
    Ok(config)
}

impl Session {
    fn open(config: EditorConfig) -> Result<Self> {
        let runtime = Runtime::new().context("starting async runtime")?;
        let client = BackendClient::new(&config.backend)?;

        let mut catalog = match &config.data_dir {
            Some(dir) => TerrainCatalog::load_from(dir),
            None => TerrainCatalog::defaults(),
        };
        // The backend listing wins; an unreachable backend keeps local data
        match runtime.block_on(client.terrain_types()) {
            Ok(listing) => match catalog.merge_backend(&listing) {
                Ok(merged) => info!(merged, "terrain types merged from backend"),
                Err(err) => warn!(error = %err, "backend terrain types ignored"),
            },
            Err(err) => warn!(error = %err, "backend terrain types unavailable"),
        }

        info!(backend = client.base_url(), terrains = catalog.len(), "session ready");
        Ok(Self {
            config,
            runtime,
            client,
            catalog: Arc::new(catalog),
        })
    }

    fn naming(&self) -> NamingConfig {
        let local = || match &self.config.data_dir {
            Some(dir) => NamingConfig::load_from(dir),
            None => NamingConfig::defaults(),
        };
        match self.runtime.block_on(self.client.settlement_names()) {
            Ok(value) => NamingConfig::from_value(value).unwrap_or_else(|err| {
                warn!(error = %err, "backend naming styles unusable");
                local()
            }),
            Err(err) => {
                warn!(error = %err, "backend naming styles unavailable");
                local()
            }
        }
    }

    fn generate_request(
        &self,
        width: u32,
        height: u32,
        name: Option<String>,
    ) -> GenerateWorldRequest {
        let name = name.unwrap_or_else(|| {
            format!("Generated World {}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
        });
        let mut request = GenerateWorldRequest::new(width, height, name);
        request.terrain_types = self.catalog.kinds().map(|k| k.to_string()).collect();
        request.race_types = match self.runtime.block_on(self.client.race_types()) {
            Ok(value) => race_names(&value),
            Err(err) => {
                warn!(error = %err, "race types unavailable, backend picks its own");
                Vec::new()
            }
        };
        request
    }

    fn generate(&self, request: &GenerateWorldRequest) -> Result<World> {
        let payload = self
            .runtime
            .block_on(self.client.generate_world(request))
            .context("generating world")?;
        Ok(World::load(payload, self.catalog.clone())?)
    }

    fn fetch(&self, name: &str) -> Result<World> {
        let payload = self
            .runtime
            .block_on(self.client.load_world(name))
            .with_context(|| format!("loading world {}", name))?;
        Ok(World::load(payload, self.catalog.clone())?)
    }
}

fn run_edit(
    session: Session,
    world_path: Option<PathBuf>,
    load: Option<String>,
    generate: Option<Dims>,
    new: Option<Dims>,
    name: Option<String>,
) -> Result<()> {
    let generate_template =
        generate.map(|dims| session.generate_request(dims.width, dims.height, name.clone()));

    let world = if let Some(filename) = &load {
        session.fetch(filename)?
    } else if let Some(request) = &generate_template {
        session.generate(request)?
    } else if let Some(path) = world_path.as_ref().filter(|p| p.exists() && new.is_none()) {
        read_world(path, session.catalog.clone())?
    } else {
        let dims = new.unwrap_or(Dims {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        });
        let mut world = World::create_empty(dims.width, dims.height, session.catalog.clone());
        world.set_name(name.clone().unwrap_or_else(|| "New World".to_string()));
        world
    };

    let naming = session.naming();
    let names = match session.config.seed {
        Some(seed) => SettlementNameGenerator::new(naming, seed),
        None => SettlementNameGenerator::from_entropy(naming),
    };
    let controller = MapController::new(world, names, session.config.geometry);
    let (dispatcher, events) =
        Dispatcher::new(session.client.clone(), session.runtime.handle().clone());

    let options = EditorOptions {
        world_path,
        generate: generate_template,
    };
    run_editor(controller, dispatcher, events, options)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let tui = matches!(args.command, Command::Edit { .. });
    init_logging(tui.then_some(args.log_file.as_path()))?;

    let session = Session::open(config)?;

    match args.command {
        Command::Edit {
            world,
            load,
            generate,
            new,
            name,
        } => run_edit(session, world, load, generate, new, name)?,
        Command::Generate {
            width,
            height,
            name,
            density,
            seed,
            out,
        } => {
            let mut request = session.generate_request(width, height, name);
            request.params.settlement_density = density;
            request.params.seed = seed;
            println!("Generating {}x{} world {:?}...", width, height, request.params.name);
            let world = session.generate(&request)?;
            println!(
                "Generated {}: {}x{}, {} settlements",
                world.name(),
                world.width(),
                world.height(),
                world.settlement_names().count()
            );
            if let Some(path) = out {
                write_world(&path, &world)?;
                println!("Written to {}", path.display());
            }
        }
        Command::List => {
            let worlds = session
                .runtime
                .block_on(session.client.list_worlds())
                .context("listing worlds")?;
            if worlds.is_empty() {
                println!("No saved worlds");
            }
            for world in worlds {
                println!("{}", world);
            }
        }
        Command::Fetch { name, out } => {
            let world = session.fetch(&name)?;
            write_world(&out, &world)?;
            println!(
                "Wrote {} ({}x{}) to {}",
                world.name(),
                world.width(),
                world.height(),
                out.display()
            );
        }
    }
    Ok(())
}
