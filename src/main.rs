use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use certmail::certificate::CertificateTemplate;
use certmail::config::Settings;
use certmail::db::Database;
use certmail::email::{DryRunMailer, EmailClient, MailgunClient};
use certmail::inflect::NameInflector;
use certmail::sheets::{CsvWorkbook, SpreadsheetDocument};
use certmail::webinar::{SendOptions, WebinarService};
use certmail::{logging, models::Webinar};

#[derive(Parser)]
#[command(name = "certmail", about = "Webinar certificate import and mailing", version)]
struct Cli {
    /// Verbose logging (debug level for this crate)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the SQLite database path from the configuration
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a registration workbook into the local database
    Import {
        /// Workbook directory (workbook.json plus per-sheet CSV files);
        /// defaults to the configured sheets.workbook_dir
        #[arg(long)]
        workbook: Option<PathBuf>,
        /// Document reference stored with the webinar; defaults to the
        /// workbook path
        #[arg(long)]
        url: Option<String>,
    },
    /// Build the mailing ledger for an imported webinar
    Prepare {
        #[arg(long)]
        workbook: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        /// Rebuild even when sent rows would be lost
        #[arg(long)]
        force: bool,
    },
    /// Send certificates for every pending ledger row
    Send {
        #[arg(long)]
        workbook: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        /// Render and log everything without mailing or marking rows
        #[arg(long)]
        dry_run: bool,
    },
    /// Export webinar participants as a vCard group file
    Contacts {
        #[arg(long)]
        workbook: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        /// Directory the `.vcf` file is written into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// List imported webinars
    List,
    /// Inspect and correct the name inflection cache
    Inflect {
        #[command(subcommand)]
        command: InflectCommand,
    },
}

#[derive(Subcommand)]
enum InflectCommand {
    /// Show cached guesses nobody has reviewed yet
    Review,
    /// Mark a cached guess as correct
    Confirm { base: String },
    /// Record the correct dative form for a name fragment; omit the form
    /// to mark the fragment as not inflectable
    Set { base: String, dative: Option<String> },
    /// Preview the dative form of a full name
    Preview { full_name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose);

    let mut settings = Settings::load().context("loading configuration")?;
    if let Some(database) = cli.database {
        settings.database_path = database;
    }
    let db = Database::open(&settings.database_path)
        .with_context(|| format!("opening database {}", settings.database_path.display()))?;
    let service = WebinarService::new(&db);

    match cli.command {
        Command::Import { workbook, url } => {
            let workbook = resolve_workbook(workbook, &settings)?;
            let document = CsvWorkbook::open(&workbook)?;
            let url = url.unwrap_or_else(|| workbook_url(&workbook));
            let summary = service.import(&document, &url)?;
            println!(
                "Imported webinar #{} ({}): {} new, {} duplicate",
                summary.webinar.id,
                document.title(),
                summary.imported,
                summary.duplicates
            );
        }
        Command::Prepare { workbook, url, force } => {
            let workbook = resolve_workbook(workbook, &settings)?;
            let mut document = CsvWorkbook::open(&workbook)?;
            let url = url.unwrap_or_else(|| workbook_url(&workbook));
            let rows = service.prepare(&mut document, &url, force)?;
            println!("Prepared mailing ledger with {rows} row(s)");
        }
        Command::Send { workbook, url, dry_run } => {
            let workbook = resolve_workbook(workbook, &settings)?;
            let document = CsvWorkbook::open(&workbook)?;
            let url = url.unwrap_or_else(|| workbook_url(&workbook));
            let template = CertificateTemplate::load(
                &settings.assets.template,
                &settings.assets.name_font,
                &settings.assets.text_font,
            )?;
            let mailer: Box<dyn EmailClient> = if dry_run {
                Box::new(DryRunMailer)
            } else {
                settings.validate_for_sending()?;
                Box::new(MailgunClient::new(
                    settings.email.base_url.clone(),
                    settings.email.domain.clone(),
                    settings.email.api_key.clone(),
                    settings.email.sender.clone(),
                    settings.email.timeout(),
                )?)
            };
            let options = SendOptions {
                send_delay: settings.email.send_delay(),
                dry_run,
                bcc: settings.email.bcc_list(),
            };
            let report =
                service.send(&document, &url, mailer.as_ref(), &template, &options).await?;
            println!(
                "{} certificate(s) {}, {} row(s) skipped for missing email",
                report.sent,
                if dry_run { "rendered (dry run)" } else { "sent" },
                report.skipped_no_email
            );
        }
        Command::Contacts { workbook, url, out } => {
            let workbook = resolve_workbook(workbook, &settings)?;
            let url = url.unwrap_or_else(|| workbook_url(&workbook));
            let path = service.export_contacts(&url, &out)?;
            println!("Saved contacts to {}", path.display());
        }
        Command::List => {
            let webinars = service.list()?;
            if webinars.is_empty() {
                println!("No webinars imported yet");
            }
            for webinar in webinars {
                print_webinar(&webinar);
            }
        }
        Command::Inflect { command } => run_inflect(&db, command)?,
    }
    Ok(())
}

fn run_inflect(db: &Database, command: InflectCommand) -> anyhow::Result<()> {
    let inflector = NameInflector::new(db);
    match command {
        InflectCommand::Review => {
            let pending = db.list_unconfirmed_inflections()?;
            if pending.is_empty() {
                println!("No unreviewed inflections");
            }
            for inflection in pending {
                println!("{} -> {}", inflection.base, inflection.dative_or_base());
            }
        }
        InflectCommand::Confirm { base } => {
            db.confirm_inflection(&base)?;
            println!("Confirmed {base}");
        }
        InflectCommand::Set { base, dative } => {
            inflector.set_confirmed(&base, dative.as_deref())?;
            match dative {
                Some(dative) => println!("{base} -> {dative}"),
                None => println!("{base} marked as not inflectable"),
            }
        }
        InflectCommand::Preview { full_name } => {
            println!("{}", inflector.dative_full_name(&full_name)?);
        }
    }
    Ok(())
}

fn resolve_workbook(arg: Option<PathBuf>, settings: &Settings) -> anyhow::Result<PathBuf> {
    arg.or_else(|| settings.sheets.workbook_dir.clone()).ok_or_else(|| {
        anyhow::Error::new(certmail::Error::MissingEnv("CERTMAIL_SHEETS__WORKBOOK_DIR"))
    })
}

fn workbook_url(path: &Path) -> String {
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

fn print_webinar(webinar: &Webinar) {
    println!(
        "#{}  {}  {} .. {}  {}",
        webinar.id,
        webinar.topic.as_text(),
        webinar.started_at,
        webinar.finished_at,
        webinar.url
    );
}
