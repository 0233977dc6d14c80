use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use packed_contracts::chat::{parse_intent, Intent, STUDIO_HELP_COMMANDS};
use packed_contracts::design::{default_brand_assets, BrandAssetKind, Design, DesignId, TechPack};
use packed_contracts::events::EventWriter;
use packed_contracts::session::{Screen, Session, View};
use packed_contracts::trends::TrendReport;
use packed_engine::{build_client, export_design, NoticeKind, Studio, StudioConfig, StudioError};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "packed", version, about = "Packed apparel design studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive studio session.
    Studio(StudioArgs),
    /// Generate one design, apply edits in order, optionally extract its tech pack, export.
    Generate(GenerateArgs),
    /// Fetch and print the current trend report.
    Trends(TrendsArgs),
}

#[derive(Debug, Args)]
struct ClientArgs {
    /// Use the offline dryrun client instead of the configured provider.
    #[arg(long)]
    dryrun: bool,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    text_model: Option<String>,
    /// Request timeout in seconds (clamped to 15..=300).
    #[arg(long)]
    timeout: Option<f64>,
}

#[derive(Debug, Parser)]
struct StudioArgs {
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    client: ClientArgs,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long = "edit")]
    edits: Vec<String>,
    #[arg(long)]
    techpack: bool,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    client: ClientArgs,
}

#[derive(Debug, Parser)]
struct TrendsArgs {
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    client: ClientArgs,
}

const BAR_WIDTH: usize = 30;
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(200);

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("packed error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Studio(args) => {
            run_studio(args)?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
        Command::Trends(args) => run_trends(args),
    }
}

fn studio_config(args: &ClientArgs) -> StudioConfig {
    let mut config = StudioConfig::from_env().with_request_timeout_secs(args.timeout);
    if args.dryrun {
        config.provider = "dryrun".to_string();
    }
    if args.image_model.is_some() {
        config.image_model = args.image_model.clone();
    }
    if args.text_model.is_some() {
        config.text_model = args.text_model.clone();
    }
    config
}

fn new_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("session-{millis}-{}", std::process::id())
}

fn open_studio(client: &ClientArgs, events: Option<&Path>) -> Result<(Studio, Duration)> {
    let config = studio_config(client);
    let wait_limit = config.request_timeout + Duration::from_secs(30);
    let client = build_client(&config)?;
    let events = events
        .map(|path| EventWriter::open(path, new_session_id()))
        .transpose()?;
    Ok((
        Studio::new(client, Session::new(default_brand_assets()), events),
        wait_limit,
    ))
}

/// Waits for outstanding work and prints its notices. Returns true when any request failed.
fn settle(studio: &mut Studio, wait_limit: Duration) -> Result<bool> {
    if !studio.wait_idle(wait_limit) {
        bail!(
            "timed out waiting for {} request(s) after {}s",
            studio.in_flight(),
            wait_limit.as_secs()
        );
    }
    let mut failed = false;
    for notice in studio.take_notices() {
        match notice.kind {
            NoticeKind::Error => {
                failed = true;
                eprintln!("{}: {}", notice.screen, notice.message);
            }
            NoticeKind::Info => println!("{}", notice.message),
        }
    }
    Ok(failed)
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let (mut studio, wait_limit) = open_studio(&args.client, args.events.as_deref())?;

    studio.generate(&args.prompt)?;
    if settle(&mut studio, wait_limit)? {
        return Ok(1);
    }
    for instruction in &args.edits {
        studio.edit(instruction)?;
        if settle(&mut studio, wait_limit)? {
            return Ok(1);
        }
    }
    if args.techpack {
        studio.generate_tech_pack()?;
        if settle(&mut studio, wait_limit)? {
            return Ok(1);
        }
    }

    let design = studio
        .session()
        .active_design()
        .context("generation finished without an active design")?;
    print_design(design);
    if let Some(tech_pack) = design.tech_pack() {
        print_tech_pack(tech_pack);
    }
    for path in export_design(design, &args.out)? {
        println!("Wrote {}", path.display());
    }
    Ok(0)
}

fn run_trends(args: TrendsArgs) -> Result<i32> {
    let (mut studio, wait_limit) = open_studio(&args.client, args.events.as_deref())?;
    studio.show_trends()?;
    let failed = settle(&mut studio, wait_limit)?;
    if let View::Trends(trends) = studio.session().view() {
        if let Some(report) = trends.report() {
            print_trend_report(report);
        }
    }
    Ok(if failed { 1 } else { 0 })
}

fn spawn_stdin_reader() -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("packed-stdin".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(line.trim_end_matches(['\n', '\r']).to_string()).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        })
        .context("failed to start stdin reader")?;
    Ok(rx)
}

fn print_prompt(studio: &Studio) -> Result<()> {
    let screen = studio.session().screen();
    let marker = if studio.is_loading(screen) { "…" } else { "" };
    print!("[{screen}{marker}] > ");
    io::stdout().flush()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn run_studio(args: StudioArgs) -> Result<()> {
    let (mut studio, wait_limit) = open_studio(&args.client, args.events.as_deref())?;
    let lines = spawn_stdin_reader()?;

    println!(
        "Packed studio started ({} client). Type a prompt to generate, /help for commands.",
        studio.client_name()
    );
    render_screen(&studio);

    'session: loop {
        print_prompt(&studio)?;
        let line = loop {
            match lines.recv_timeout(INPUT_POLL_INTERVAL) {
                Ok(line) => break line,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if studio.poll() > 0 {
                        println!();
                        print_notices(&mut studio);
                        render_screen(&studio);
                        print_prompt(&studio)?;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break 'session,
            }
        };

        let flow = handle_line(&mut studio, &line, wait_limit);
        studio.poll();
        print_notices(&mut studio);
        if flow == Flow::Quit {
            break;
        }
    }

    if studio.in_flight() > 0 {
        println!("Waiting for {} request(s) to finish…", studio.in_flight());
        studio.wait_idle(wait_limit);
        print_notices(&mut studio);
    }
    Ok(())
}

fn handle_line(studio: &mut Studio, line: &str, wait_limit: Duration) -> Flow {
    let intent = parse_intent(line);
    debug!(action = %intent.action, "studio command");
    match intent.action.as_str() {
        "noop" => {}
        "generate" => match intent.prompt.as_deref() {
            Some(prompt) => report_started(studio.generate(prompt), "Generating design"),
            None => println!("/generate requires a prompt"),
        },
        "edit" => match intent.prompt.as_deref() {
            Some(instruction) => report_started(studio.edit(instruction), "Applying edit"),
            None => println!("/edit requires an instruction"),
        },
        "tech_pack" => report_started(studio.generate_tech_pack(), "Extracting tech pack"),
        "new_design" | "show_ideation" => {
            studio.show_ideation();
            render_screen(studio);
        }
        "show_workspace" => {
            studio.show_workspace();
            render_screen(studio);
        }
        "open_design" => {
            let id = intent.arg_str("id").unwrap_or_default();
            if id.is_empty() {
                println!("/open requires a design id (see /designs)");
            } else {
                match studio.open_design(&DesignId::from(id)) {
                    Ok(()) => render_screen(studio),
                    Err(err) => println!("{err}"),
                }
            }
        }
        "show_production" => match studio.show_production() {
            Ok(()) => render_screen(studio),
            Err(err) => println!("{err}"),
        },
        "show_trends" => match studio.show_trends() {
            Ok(_) => render_screen(studio),
            Err(err) => println!("{err}"),
        },
        "show" => render_screen(studio),
        "list_designs" => print_design_list(studio),
        "list_brand" => print_brand_assets(studio),
        "add_brand" => add_brand_asset(studio, &intent),
        "remove_brand" => {
            let id = intent.arg_str("id").unwrap_or_default();
            if studio.remove_brand_asset(id) {
                println!("Removed brand asset {id}");
            } else {
                println!("No brand asset with id '{id}'");
            }
        }
        "clear_brand" => {
            studio.set_brand_assets(Vec::new());
            println!("Brand assets cleared; generation uses generic framing.");
        }
        "export" => {
            let dir = intent.arg_str("dir").unwrap_or(".");
            match studio.session().active_design() {
                Some(design) => match export_design(design, Path::new(dir)) {
                    Ok(paths) => {
                        for path in paths {
                            println!("Wrote {}", path.display());
                        }
                    }
                    Err(err) => println!("Export failed: {err:#}"),
                },
                None => println!("Nothing to export; generate or open a design first."),
            }
        }
        "wait" => {
            if !studio.wait_idle(wait_limit) {
                println!("Still waiting on {} request(s).", studio.in_flight());
            }
            print_notices(studio);
            render_screen(studio);
        }
        "help" => {
            println!("Free text generates a design from the ideation screen.");
            println!("Commands: {}", STUDIO_HELP_COMMANDS.join(" "));
        }
        "quit" => return Flow::Quit,
        _ => {
            let command = intent.arg_str("command").unwrap_or_default();
            println!("Unknown command: /{command}. Type /help for commands.");
        }
    }
    Flow::Continue
}

fn report_started<T>(started: Result<T, StudioError>, label: &str) {
    match started {
        Ok(_) => println!("{label}…"),
        Err(err) => println!("{err}"),
    }
}

fn add_brand_asset(studio: &mut Studio, intent: &Intent) {
    const USAGE: &str = "/brand_add <color|logo|fit> <name> <value>";
    let kind = match intent
        .arg_str("kind")
        .unwrap_or_default()
        .parse::<BrandAssetKind>()
    {
        Ok(kind) => kind,
        Err(err) => {
            println!("{err} Usage: {USAGE}");
            return;
        }
    };
    let name = intent.arg_str("name").unwrap_or_default();
    let value = intent.arg_str("value").unwrap_or_default();
    if name.trim().is_empty() || value.trim().is_empty() {
        println!("Usage: {USAGE}");
        return;
    }
    let asset = studio.add_brand_asset(kind, name, value);
    println!("Added {} asset {}: {} = {}", asset.kind, asset.id, asset.name, asset.value);
}

fn print_notices(studio: &mut Studio) {
    for notice in studio.take_notices() {
        match notice.kind {
            NoticeKind::Error => println!("! [{}] {}", notice.screen, notice.message),
            NoticeKind::Info => println!("* {}", notice.message),
        }
    }
}

fn render_screen(studio: &Studio) {
    let session = studio.session();
    match session.view() {
        View::Workspace => {
            println!("== Workspace ==");
            print_design_list(studio);
        }
        View::Ideation => {
            println!("== Ideation ==");
            if studio.is_loading(Screen::Ideation) {
                println!("Working on it…");
            }
            match session.active_design() {
                Some(design) => print_design(design),
                None => println!("No design yet. Describe a garment to generate one."),
            }
        }
        View::Production(_) => {
            println!("== Production ==");
            let Some(design) = session.production_design() else {
                println!("The selected design is no longer available.");
                return;
            };
            print_design(design);
            match design.tech_pack() {
                Some(tech_pack) => print_tech_pack(tech_pack),
                None if studio.is_loading(Screen::Production) => {
                    println!("Extracting tech pack…")
                }
                None => println!("No tech pack yet. Run /techpack to generate one."),
            }
        }
        View::Trends(trends) => {
            println!("== Trends ==");
            if trends.is_loading() {
                println!("Researching current trends…");
                return;
            }
            if let Some(report) = trends.report() {
                print_trend_report(report);
            }
        }
    }
}

fn print_design(design: &Design) {
    let size = design
        .image()
        .decode_bytes()
        .map(|bytes| format!("{} bytes", bytes.len()))
        .unwrap_or_else(|_| "unreadable".to_string());
    println!("Design {}", design.id());
    println!("  prompt:  {}", design.prompt());
    println!("  image:   {} ({size})", design.image().mime_type());
    println!(
        "  created: {}",
        design.created_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn print_design_list(studio: &Studio) {
    let store = studio.session().store();
    if store.designs().is_empty() {
        println!("No designs yet. Use /new to start one.");
        return;
    }
    let active = store.active_id();
    for design in store.designs() {
        let marker = if Some(design.id()) == active { "*" } else { " " };
        let pack = if design.tech_pack().is_some() {
            " [tech pack]"
        } else {
            ""
        };
        println!("{marker} {}  {}{pack}", design.id(), design.prompt());
    }
}

fn print_brand_assets(studio: &Studio) {
    let assets = studio.session().store().brand_assets();
    if assets.is_empty() {
        println!("No brand assets.");
        return;
    }
    for asset in assets {
        println!("{:>3}  {:<5}  {}: {}", asset.id, asset.kind, asset.name, asset.value);
    }
}

fn print_tech_pack(tech_pack: &TechPack) {
    println!("Bill of materials:");
    for item in &tech_pack.bom {
        println!("  - {} | {} | {}", item.component, item.material, item.details);
    }
    println!("Measurements:");
    for measurement in &tech_pack.measurements {
        let sizes = measurement
            .sizes
            .entries()
            .iter()
            .map(|(label, value)| format!("{label} {value}"))
            .collect::<Vec<String>>()
            .join("  ");
        match measurement.tolerance.as_deref() {
            Some(tolerance) => println!("  - {} (±{tolerance}): {sizes}", measurement.point),
            None => println!("  - {}: {sizes}", measurement.point),
        }
    }
    if !tech_pack.construction_notes.is_empty() {
        println!("Construction notes:");
        for note in &tech_pack.construction_notes {
            println!("  - {note}");
        }
    }
}

fn text_bar(value: u32, max: u32, width: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let filled = (u64::from(value) * width as u64 + u64::from(max) / 2) / u64::from(max);
    "█".repeat((filled as usize).min(width))
}

fn print_trend_report(report: &TrendReport) {
    println!("Emerging palettes:");
    for palette in &report.palettes {
        println!(
            "  {:<12} {:>3}% {} {}",
            palette.name,
            palette.value,
            text_bar(palette.value, 100, BAR_WIDTH),
            palette.color
        );
    }
    println!("Volume momentum:");
    let max = report
        .momentum
        .iter()
        .map(|point| point.volume)
        .max()
        .unwrap_or(0);
    for point in &report.momentum {
        println!(
            "  {:<4} {:>4} {}",
            point.month,
            point.volume,
            text_bar(point.volume, max, BAR_WIDTH)
        );
    }
    println!();
    if report.is_empty() {
        println!("No trend notes were returned.");
    } else {
        println!("{}", report.text.trim());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use clap::Parser;
    use packed_contracts::session::{Screen, Session};
    use packed_engine::{DryrunClient, Studio};

    use super::{handle_line, studio_config, text_bar, Cli, Command, Flow};

    const WAIT: Duration = Duration::from_secs(10);

    fn dryrun_studio() -> Studio {
        Studio::new(Arc::new(DryrunClient::new()), Session::default(), None)
    }

    #[test]
    fn text_bar_scales_to_width() {
        assert_eq!(text_bar(50, 100, 10).chars().count(), 5);
        assert_eq!(text_bar(900, 900, 30).chars().count(), 30);
        assert_eq!(text_bar(0, 100, 10), "");
        assert_eq!(text_bar(5, 0, 10), "");
    }

    #[test]
    fn generate_args_collect_repeated_edits() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "packed",
            "generate",
            "--prompt",
            "red wool coat",
            "--edit",
            "add gold buttons",
            "--edit",
            "shorter hem",
            "--techpack",
            "--dryrun",
            "--timeout",
            "30",
        ])?;
        let Command::Generate(args) = cli.command else {
            panic!("expected generate command");
        };
        assert_eq!(args.edits, vec!["add gold buttons", "shorter hem"]);
        assert!(args.techpack);
        assert_eq!(args.out, std::path::PathBuf::from("."));

        let config = studio_config(&args.client);
        assert_eq!(config.provider, "dryrun");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn repl_lines_drive_the_studio() {
        let mut studio = dryrun_studio();
        assert_eq!(handle_line(&mut studio, "red wool coat", WAIT), Flow::Continue);
        assert_eq!(handle_line(&mut studio, "/wait", WAIT), Flow::Continue);
        assert_eq!(studio.session().screen(), Screen::Ideation);
        assert_eq!(studio.session().store().designs().len(), 1);

        handle_line(&mut studio, "/edit add gold buttons", WAIT);
        handle_line(&mut studio, "/wait", WAIT);
        let prompt = studio
            .session()
            .active_design()
            .map(|design| design.prompt().to_string());
        assert_eq!(prompt.as_deref(), Some("red wool coat (add gold buttons)"));

        handle_line(&mut studio, "/production", WAIT);
        handle_line(&mut studio, "/techpack", WAIT);
        handle_line(&mut studio, "/wait", WAIT);
        assert_eq!(studio.session().screen(), Screen::Production);
        assert!(studio
            .session()
            .active_design()
            .and_then(|design| design.tech_pack())
            .is_some());

        handle_line(&mut studio, "/brand_add colour \"Signal Red\" #d62828", WAIT);
        assert_eq!(studio.session().store().brand_assets().len(), 1);
        assert_eq!(handle_line(&mut studio, "/quit", WAIT), Flow::Quit);
    }

    #[test]
    fn export_command_writes_active_design() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut studio = dryrun_studio();
        handle_line(&mut studio, "linen shirt", WAIT);
        handle_line(&mut studio, "/wait", WAIT);
        let line = format!("/export \"{}\"", temp.path().display());
        handle_line(&mut studio, &line, WAIT);

        let id = studio
            .session()
            .active_design()
            .map(|design| design.id().to_string())
            .unwrap_or_default();
        assert!(temp.path().join(format!("{id}.png")).is_file());
        Ok(())
    }
}
