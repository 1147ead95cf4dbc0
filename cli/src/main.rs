use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mapview::camera::{Point, Size};
use mapview::fog::FogAction;
use mapview::map::{MapDescriptor, MapError};
use mapview::nav::{Direction, NavigationCommand, ZoomCommand};
use serde::Serialize;
use session::store::{FogStore, MapConfigStore, NavigationChannel, ViewportTelemetry};
use session::{
    GmBackends, GmEvent, GmRuntime, GmSession, HttpBackend, PreviewRuntime, PreviewSession, PreviewUpdate,
    SessionConfig, SessionError,
};
use tokio::sync::mpsc;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid map: {0}")]
    Map(#[from] MapError),
    #[error("invalid grid: {0}")]
    Grid(#[from] mapview::grid::GridError),
    #[error("no grid configured for {0}")]
    NoGrid(String),
    #[error("{count} fog edits were not persisted")]
    Unflushed { count: usize },
    #[error("runtime task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "fogmap-cli", about = "Fog-of-war map store CLI")]
struct Cli {
    #[arg(long, env = "FOGMAP_BASE_URL", default_value = session::config::DEFAULT_BASE_URL)]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

struct CliContext {
    config: SessionConfig,
    backend: Arc<HttpBackend>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Fog(FogCommand),
    Grid(GridCommand),
    Nav(NavCommand),
    Preview(PreviewCommand),
    Viewport(ViewportCommand),
}

/// Map name plus image size, which every GM-side edit needs.
#[derive(Args, Debug, Clone)]
struct MapArgs {
    map: String,
    #[arg(long)]
    width: f64,
    #[arg(long)]
    height: f64,
}

impl MapArgs {
    fn descriptor(&self) -> Result<MapDescriptor, MapError> {
        MapDescriptor::new(self.map.clone(), self.width, self.height)
    }
}

#[derive(Args, Debug)]
struct EditArgs {
    #[command(flatten)]
    map: MapArgs,
    /// Image-space x.
    #[arg(long)]
    x: f64,
    /// Image-space y.
    #[arg(long)]
    y: f64,
    /// Brush size in cells; ignored without a grid.
    #[arg(long)]
    brush: Option<u32>,
}

#[derive(Args, Debug)]
struct FogCommand {
    #[command(subcommand)]
    command: FogSubcommand,
}

#[derive(Subcommand, Debug)]
enum FogSubcommand {
    Show { map: String },
    Hash { map: String },
    /// Erase fog at a point.
    Reveal(EditArgs),
    /// Paint fog back at a point.
    Hide(EditArgs),
    Reset { map: String },
}

#[derive(Args, Debug)]
struct GridCommand {
    #[command(subcommand)]
    command: GridSubcommand,
}

#[derive(Subcommand, Debug)]
enum GridSubcommand {
    Show {
        map: String,
    },
    /// Calibrate from a column/row count over the whole image.
    Count {
        #[command(flatten)]
        map: MapArgs,
        #[arg(long)]
        cols: u32,
        #[arg(long)]
        rows: u32,
    },
    /// Calibrate from two image points spanning `cells` cells.
    Points {
        #[command(flatten)]
        map: MapArgs,
        #[arg(long)]
        ax: f64,
        #[arg(long)]
        ay: f64,
        #[arg(long)]
        bx: f64,
        #[arg(long)]
        by: f64,
        #[arg(long, default_value_t = 1)]
        cells: u32,
    },
    Clear {
        map: String,
    },
}

#[derive(Args, Debug)]
struct NavCommand {
    #[command(subcommand)]
    command: NavSubcommand,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum PanDirection {
    Up,
    Down,
    Left,
    Right,
}

impl From<PanDirection> for Direction {
    fn from(d: PanDirection) -> Self {
        match d {
            PanDirection::Up => Direction::Up,
            PanDirection::Down => Direction::Down,
            PanDirection::Left => Direction::Left,
            PanDirection::Right => Direction::Right,
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
enum ZoomSubcommand {
    In {
        #[arg(long, default_value_t = mapview::consts::DEFAULT_ZOOM_STEP_PERCENT)]
        step: u32,
    },
    Out {
        #[arg(long, default_value_t = mapview::consts::DEFAULT_ZOOM_STEP_PERCENT)]
        step: u32,
    },
    /// Absolute zoom factor (1.0 = 100 %).
    Set { value: f64 },
}

#[derive(Subcommand, Debug)]
enum NavSubcommand {
    Pan {
        #[arg(value_enum)]
        direction: PanDirection,
    },
    #[command(subcommand)]
    Zoom(ZoomSubcommand),
    /// Absolute rotation in degrees.
    Rotate { degrees: f64 },
    /// Rotate the preview relative to its current angle.
    RotatePreview {
        #[arg(default_value_t = mapview::consts::DEFAULT_PREVIEW_ROTATE_DEG)]
        degrees: f64,
    },
    Center,
    Reload,
}

#[derive(Args, Debug)]
struct PreviewCommand {
    #[command(subcommand)]
    command: PreviewSubcommand,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
enum PreviewSubcommand {
    SetMap {
        map: String,
    },
    Status,
    Frame {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Run a preview session and print each camera and fog change.
    Follow {
        #[command(flatten)]
        map: MapArgs,
        /// Display width; defaults to the image width.
        #[arg(long)]
        container_width: Option<f64>,
        /// Display height; defaults to the image height.
        #[arg(long)]
        container_height: Option<f64>,
    },
}

#[derive(Args, Debug)]
struct ViewportCommand {
    #[command(subcommand)]
    command: ViewportSubcommand,
}

#[derive(Subcommand, Debug)]
enum ViewportSubcommand {
    Show,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SessionConfig { base_url: cli.base_url, ..SessionConfig::from_env() };
    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let ctx = CliContext { config, backend };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Fog(fog) => run_fog(&ctx, fog).await,
        Command::Grid(grid) => run_grid(&ctx, grid).await,
        Command::Nav(nav) => run_nav(&ctx, nav).await,
        Command::Preview(preview) => run_preview(&ctx, preview).await,
        Command::Viewport(viewport) => run_viewport(&ctx, viewport).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    cli.backend.healthz().await?;
    println!("ok");
    Ok(())
}

// =============================================================================
// FOG
// =============================================================================

async fn run_fog(cli: &CliContext, fog: FogCommand) -> Result<(), CliError> {
    match fog.command {
        FogSubcommand::Show { map } => {
            let areas = cli.backend.load_fog(&map).await?;
            print_json(&wire::FogSnapshot::new(map, areas))
        }
        FogSubcommand::Hash { map } => {
            println!("{}", cli.backend.fog_hash(&map).await?);
            Ok(())
        }
        FogSubcommand::Reveal(args) => run_edit(cli, args, FogAction::Reveal).await,
        FogSubcommand::Hide(args) => run_edit(cli, args, FogAction::Hide).await,
        FogSubcommand::Reset { map } => {
            cli.backend.reset_fog(&map).await?;
            println!("ok");
            Ok(())
        }
    }
}

/// Load the map as the GM would, apply one brush edit and let the runtime
/// flush it on shutdown.
async fn run_edit(cli: &CliContext, args: EditArgs, action: FogAction) -> Result<(), CliError> {
    let map = args.map.descriptor()?;
    let mut gm = load_gm(cli, map).await?;
    if let Some(brush) = args.brush {
        gm.set_brush(brush);
    }

    let (tx, rx) = mpsc::channel(1);
    let runtime = GmRuntime::new(gm, backends(cli), cli.config.clone());
    let handle = tokio::spawn(runtime.run(rx));
    // A closed channel only means the runtime already stopped; its join
    // result below reports why.
    if tx.send(GmEvent::Edit { at: Point::new(args.x, args.y), action }).await.is_err() {
        tracing::warn!("gm runtime stopped before the edit was delivered");
    }
    drop(tx);
    let gm = handle.await?;

    let pending = gm.sync().pending().len();
    if pending > 0 {
        return Err(CliError::Unflushed { count: pending });
    }
    print_json(&EditSummary { action: action.as_str(), areas: gm.fog().len(), hash: gm.fog().hash() })
}

#[derive(Serialize)]
struct EditSummary<'a> {
    action: &'static str,
    areas: usize,
    hash: &'a str,
}

async fn load_gm(cli: &CliContext, map: MapDescriptor) -> Result<GmSession, CliError> {
    let name = map.name.clone();
    let container = map.size();
    let mut gm = GmSession::new(map, container, &cli.config);
    gm.load_grid(cli.backend.load_grid(&name).await?.as_ref());
    if let Some(settings) = cli.backend.load_settings(&name).await? {
        gm.load_settings(settings);
    }
    gm.load_fog(cli.backend.load_fog(&name).await?);
    Ok(gm)
}

fn backends(cli: &CliContext) -> GmBackends {
    GmBackends {
        fog: cli.backend.clone(),
        nav: cli.backend.clone(),
        telemetry: cli.backend.clone(),
        config: cli.backend.clone(),
    }
}

// =============================================================================
// GRID
// =============================================================================

async fn run_grid(cli: &CliContext, grid: GridCommand) -> Result<(), CliError> {
    match grid.command {
        GridSubcommand::Show { map } => match cli.backend.load_grid(&map).await? {
            Some(dto) => print_json(&dto),
            None => Err(CliError::NoGrid(map)),
        },
        GridSubcommand::Count { map, cols, rows } => {
            let mut gm = GmSession::new(map.descriptor()?, Size::new(map.width, map.height), &cli.config);
            gm.calibrate_count(cols, rows)?;
            save_grid(cli, &gm).await
        }
        GridSubcommand::Points { map, ax, ay, bx, by, cells } => {
            let mut gm = load_gm(cli, map.descriptor()?).await?;
            gm.calibrate_two_point(Point::new(ax, ay), Point::new(bx, by), cells)?;
            save_grid(cli, &gm).await
        }
        GridSubcommand::Clear { map } => {
            cli.backend.clear_grid(&map).await?;
            println!("ok");
            Ok(())
        }
    }
}

async fn save_grid(cli: &CliContext, gm: &GmSession) -> Result<(), CliError> {
    let Some(dto) = gm.grid_dto() else {
        return Err(CliError::NoGrid(gm.map().name.clone()));
    };
    cli.backend.save_grid(&gm.map().name, &dto).await?;
    print_json(&dto)
}

// =============================================================================
// NAVIGATION
// =============================================================================

fn nav_command(nav: NavSubcommand) -> NavigationCommand {
    match nav {
        NavSubcommand::Pan { direction } => NavigationCommand::Pan { direction: direction.into() },
        NavSubcommand::Zoom(ZoomSubcommand::In { step }) => NavigationCommand::Zoom(ZoomCommand::In { step_percent: step }),
        NavSubcommand::Zoom(ZoomSubcommand::Out { step }) => {
            NavigationCommand::Zoom(ZoomCommand::Out { step_percent: step })
        }
        NavSubcommand::Zoom(ZoomSubcommand::Set { value }) => NavigationCommand::Zoom(ZoomCommand::Set { zoom: value }),
        NavSubcommand::Rotate { degrees } => NavigationCommand::Rotate { degrees },
        NavSubcommand::RotatePreview { degrees } => NavigationCommand::RotatePreview { degrees },
        NavSubcommand::Center => NavigationCommand::Center,
        NavSubcommand::Reload => NavigationCommand::Reload,
    }
}

async fn run_nav(cli: &CliContext, nav: NavCommand) -> Result<(), CliError> {
    let command = nav_command(nav.command);
    cli.backend.enqueue(&command).await?;
    print_json(&wire::encode_command(&command))
}

// =============================================================================
// PREVIEW
// =============================================================================

async fn run_preview(cli: &CliContext, preview: PreviewCommand) -> Result<(), CliError> {
    match preview.command {
        PreviewSubcommand::SetMap { map } => {
            cli.backend.set_preview_map(&map).await?;
            println!("ok");
            Ok(())
        }
        PreviewSubcommand::Status => print_json(&cli.backend.status().await?),
        PreviewSubcommand::Frame { state } => {
            cli.backend.set_frame_enabled(state == Toggle::On).await?;
            println!("ok");
            Ok(())
        }
        PreviewSubcommand::Follow { map, container_width, container_height } => {
            let container = Size::new(container_width.unwrap_or(map.width), container_height.unwrap_or(map.height));
            follow(cli, map.descriptor()?, container).await
        }
    }
}

/// Run the preview loop until Ctrl-C or until the GM picks another map.
async fn follow(cli: &CliContext, map: MapDescriptor, container: Size) -> Result<(), CliError> {
    let name = map.name.clone();
    let mut session = PreviewSession::new(map, container, &cli.config);
    if let Some(color) = cli.backend.load_settings(&name).await?.and_then(|s| s.fog_color) {
        session.set_fog_color(color);
    }
    let mut runtime = PreviewRuntime::new(session, cli.backend.clone(), cli.backend.clone(), cli.config.clone())
        .with_telemetry(cli.backend.clone());
    runtime.load().await;
    println!("following {name}: {} areas revealed", runtime.session().fog().len());

    let (tx, mut rx) = mpsc::channel(16);
    let mut handle = tokio::spawn(runtime.run(tx));
    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(update) => print_update(&update)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.abort();
                println!("stopped");
                return Ok(());
            }
            exit = &mut handle => {
                println!("preview ended: {:?}", exit?);
                return Ok(());
            }
        }
    }
    println!("preview ended: {:?}", handle.await?);
    Ok(())
}

fn print_update(update: &PreviewUpdate) -> Result<(), CliError> {
    match update {
        PreviewUpdate::Camera(camera) => {
            println!(
                "camera pan=({:.1}, {:.1}) zoom={:.2} rotation={:.0}",
                camera.pan_x, camera.pan_y, camera.zoom, camera.rotation_deg
            );
            Ok(())
        }
        PreviewUpdate::Fog(hash) => {
            println!("fog {hash}");
            Ok(())
        }
        PreviewUpdate::Viewport(Some(viewport)) => print_json(viewport),
        PreviewUpdate::Viewport(None) => {
            println!("viewport cleared");
            Ok(())
        }
        PreviewUpdate::Reloaded => {
            println!("reloaded");
            Ok(())
        }
    }
}

// =============================================================================
// VIEWPORT
// =============================================================================

async fn run_viewport(cli: &CliContext, viewport: ViewportCommand) -> Result<(), CliError> {
    match viewport.command {
        ViewportSubcommand::Show => match cli.backend.latest().await? {
            Some(descriptor) => print_json(&descriptor),
            None => {
                println!("no viewport reported");
                Ok(())
            }
        },
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let pretty = serde_json::to_string_pretty(value)?;
    println!("{pretty}");
    Ok(())
}
