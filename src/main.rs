use std::io::Read;

use clap::Parser;

use asana2phab::conduit::ArcConduit;
use asana2phab::engine::{self, MigrationStats, Migrator};
use asana2phab::error::{ImportError, Result};
use asana2phab::model::AsanaExport;
use asana2phab::output::{self, Format};
use asana2phab::progress::Progress;
use asana2phab::users::UserDirectory;

#[derive(Parser)]
#[command(
    name = "asana2phab",
    version,
    about = "One-shot importer from an Asana JSON export into Phabricator Maniphest"
)]
struct Cli {
    /// Path to the Asana export JSON ("-" for stdin)
    export: String,
    /// Conduit API token (falls back to $CONDUIT_TOKEN)
    #[arg(long)]
    conduit_token: Option<String>,
    /// Arcanist binary used for `arc call-conduit`
    #[arg(long, default_value = "arc")]
    arc_bin: String,
    /// Preview what would be created without calling conduit
    #[arg(long)]
    dry_run: bool,
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
}

fn read_export(source: &str) -> Result<String> {
    if source == "-" {
        let mut contents = String::new();
        std::io::stdin().read_to_string(&mut contents)?;
        return Ok(contents);
    }
    Ok(std::fs::read_to_string(source)?)
}

fn resolve_token(flag: Option<String>) -> Result<String> {
    flag.or_else(|| std::env::var("CONDUIT_TOKEN").ok())
        .filter(|token| !token.trim().is_empty())
        .ok_or(ImportError::MissingToken)
}

fn run(cli: Cli, format: Format) -> Result<()> {
    let raw = read_export(&cli.export)?;
    let export: AsanaExport = serde_json::from_str(&raw)?;

    if cli.dry_run {
        let preview = engine::preview(&export.data);
        return output::print_preview(&cli.export, &preview, format);
    }

    let token = resolve_token(cli.conduit_token)?;
    let conduit = ArcConduit::new(token, cli.arc_bin);
    let users = UserDirectory::build(&conduit)?;
    let migrator = Migrator::new(&conduit, &users);

    let mut progress = Progress::new(export.data.len());
    let mut totals = MigrationStats::default();
    for task in &export.data {
        totals.absorb(migrator.migrate(task)?);
        progress.tick();
    }
    progress.finish();

    output::print_report(&cli.export, &totals, format)
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.pretty { Format::Pretty } else { cli.format };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
