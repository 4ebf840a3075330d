use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pageturn::config::ConfigError;
use pageturn::host::{Host, Renderer};
use pageturn::{Book, BookView, Corner, Direction, FlipCalculation, FlipController, FlipSettings, Point, PointerTracker};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read settings file {path}: {source}")]
    ReadSettings { path: PathBuf, source: std::io::Error },
    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid page geometry: {0}")]
    Geometry(#[from] pageturn::GeometryError),
    #[error("frame interval must be positive, got {0}")]
    InvalidFrameInterval(f64),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "pageturn", about = "Page-turn geometry and animation simulator")]
struct Cli {
    /// JSON settings file; overrides --width and --height.
    #[arg(long, env = "PAGETURN_SETTINGS")]
    settings: Option<PathBuf>,

    #[arg(long, default_value_t = 800.0)]
    width: f64,

    #[arg(long, default_value_t = 600.0)]
    height: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve one frame for a page-local drag point.
    Calc(CalcArgs),
    /// Animate a turn to the next page.
    Next(BookArgs),
    /// Animate a turn to the previous page.
    Prev(BookArgs),
    /// Jump next to a page and animate the last turn.
    Goto {
        page: usize,
        #[command(flatten)]
        book: BookArgs,
    },
    /// Press, drag and release the pointer.
    Drag {
        #[arg(value_parser = parse_point)]
        from: Point,
        #[arg(value_parser = parse_point)]
        to: Point,
        /// Pointer move events between press and release.
        #[arg(long, default_value_t = 10)]
        steps: usize,
        /// Time from press to release; quick horizontal touches are swipes.
        #[arg(long, default_value_t = 500.0)]
        duration_ms: f64,
        #[command(flatten)]
        book: BookArgs,
    },
}

#[derive(Args, Debug)]
struct CalcArgs {
    #[arg(long, value_enum, default_value_t = DirectionArg::Forward)]
    direction: DirectionArg,
    #[arg(long, value_enum, default_value_t = CornerArg::Top)]
    corner: CornerArg,
    /// Drag point as `x,y`.
    #[arg(value_parser = parse_point)]
    point: Point,
}

#[derive(Args, Debug)]
struct BookArgs {
    #[arg(long, default_value_t = 8)]
    pages: usize,
    /// Page currently open before the turn.
    #[arg(long)]
    start_page: Option<usize>,
    #[arg(long, default_value_t = 1000.0)]
    container_width: f64,
    #[arg(long, value_enum, default_value_t = CornerArg::Top)]
    corner: CornerArg,
    /// Simulated display refresh interval in milliseconds.
    #[arg(long, default_value_t = 16.0)]
    frame_ms: f64,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum DirectionArg {
    Forward,
    Back,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Forward => Direction::Forward,
            DirectionArg::Back => Direction::Back,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum CornerArg {
    Top,
    Bottom,
}

impl From<CornerArg> for Corner {
    fn from(arg: CornerArg) -> Self {
        match arg {
            CornerArg::Top => Corner::Top,
            CornerArg::Bottom => Corner::Bottom,
        }
    }
}

fn parse_point(raw: &str) -> Result<Point, String> {
    let (x, y) = raw.split_once(',').ok_or_else(|| format!("expected `x,y`, got `{raw}`"))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("bad x in `{raw}`: {e}"))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("bad y in `{raw}`: {e}"))?;
    Ok(Point::new(x, y))
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    match cli.command {
        Command::Calc(args) => run_calc(&settings, &args),
        Command::Next(book) => {
            let corner: Corner = book.corner.into();
            simulate(settings, &book, |c| c.flip_next(corner))
        }
        Command::Prev(book) => {
            let corner: Corner = book.corner.into();
            simulate(settings, &book, |c| c.flip_prev(corner))
        }
        Command::Goto { page, book } => {
            let corner: Corner = book.corner.into();
            simulate(settings, &book, |c| c.flip_to_page(page, corner))
        }
        Command::Drag { from, to, steps, duration_ms, book } => {
            simulate(settings, &book, |c| drag(c, from, to, steps, duration_ms))
        }
    }
}

fn load_settings(cli: &Cli) -> Result<FlipSettings, CliError> {
    let settings = match &cli.settings {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|source| CliError::ReadSettings { path: path.clone(), source })?;
            FlipSettings::from_json(&raw)?
        }
        None => FlipSettings::with_size(cli.width, cli.height),
    };
    Ok(settings.with_env_overrides()?)
}

fn run_calc(settings: &FlipSettings, args: &CalcArgs) -> Result<(), CliError> {
    let view = BookView::new(settings.clone(), settings.width);
    let rect = view.rect();
    let mut calc = FlipCalculation::new(args.direction.into(), args.corner.into(), rect.page_width, rect.height)?;
    calc.calc(args.point)?;
    println!("{}", serde_json::to_string_pretty(&frame_json(&calc))?);
    Ok(())
}

fn frame_json(calc: &FlipCalculation) -> Value {
    json!({
        "direction": calc.direction(),
        "corner": calc.corner(),
        "position": calc.position(),
        "angle": calc.angle(),
        "progress": calc.flipping_progress(),
        "rect": calc.rect(),
        "intersections": calc.intersections(),
        "flippingClipArea": calc.flipping_clip_area(),
        "bottomClipArea": calc.bottom_clip_area(),
        "shadowStart": calc.shadow_start_point(),
        "shadowAngle": calc.shadow_angle(),
    })
}

type Controller = FlipController<BookView, Book>;

/// Run `action` on a fresh book, then tick the clock until the book is idle,
/// printing one JSON line per displayed frame followed by the book's events.
fn simulate(mut settings: FlipSettings, args: &BookArgs, action: impl FnOnce(&mut Controller)) -> Result<(), CliError> {
    if !(args.frame_ms > 0.0) {
        return Err(CliError::InvalidFrameInterval(args.frame_ms));
    }
    if let Some(page) = args.start_page {
        settings.start_page = page;
    }

    let view = BookView::new(settings.clone(), args.container_width);
    let mut controller = FlipController::new(view, Book::new(settings, args.pages));
    controller.on_frame(0.0);
    action(&mut controller);

    let mut timer = 0.0;
    let mut frames = 0_usize;
    while controller.renderer().is_animating() {
        timer += args.frame_ms;
        controller.on_frame(timer);
        frames += 1;
        println!("{}", serde_json::to_string(&tick_json(&controller, timer))?);
    }

    for event in controller.book_mut().drain_events() {
        println!("{}", serde_json::to_string(&event)?);
    }
    tracing::info!(page = controller.book().current_page_index(), frames, elapsed_ms = timer, "simulation finished");
    Ok(())
}

fn tick_json(controller: &Controller, timer: f64) -> Value {
    let view = controller.renderer();
    json!({
        "timer": timer,
        "state": controller.state(),
        "frame": controller.calculation().map(frame_json),
        "flippingPage": view.flipping_page(),
        "bottomPage": view.bottom_page(),
        "shadow": view.shadow(),
    })
}

#[allow(clippy::cast_precision_loss)]
fn drag(controller: &mut Controller, from: Point, to: Point, steps: usize, duration_ms: f64) {
    let mut pointer = PointerTracker::new();
    pointer.touch_start(from, 0.0);
    let steps = steps.max(1);
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let p = Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t);
        pointer.touch_move(controller, p, true);
    }
    pointer.touch_end(controller, to, duration_ms, true);
}
