use std::io::Read;

use clap::Parser;
use roadview::{
    DataDir,
    Domain,
    DomainUpdate,
    Roadview,
    StoreDb,
    error,
    indexer::IndexReport,
    mcp,
    search,
    service::batch_entries,
    settings::Settings,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ConfigAction, DomainAction};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ROADVIEW_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    if !data_dir.has_store() {
        tracing::info!(path = %data_dir.store_db().display(), "creating store");
    }
    let store = StoreDb::open(&data_dir.store_db())?;

    if let Command::Config { action } = &cli.command {
        return cmd_config(&store, action);
    }

    let service = Roadview::open(store)?;

    match cli.command {
        Command::Domain { action } => cmd_domain(&service, action)?,
        Command::Index(args) => cmd_index(&service, &args)?,
        Command::Search(args) => {
            let response = service.search(&args.to_request());
            if args.json {
                search::format_json(&response)?;
            } else {
                search::format_human(&response);
            }
        }
        Command::Status(args) => cmd_status(&service, &data_dir, args.json)?,
        Command::Mcp => mcp::run_mcp(service)?,
        Command::Config { .. } | Command::Completions(_) => {}
    }

    Ok(())
}

fn print_domain(domain: &Domain) {
    println!(
        "{}\t{}\tbias={}\tcred={}\t{}",
        domain.name,
        domain.policy,
        domain.bias,
        domain.base_cred,
        domain.display_name.as_deref().unwrap_or("-")
    );
}

fn cmd_domain(service: &Roadview, action: DomainAction) -> error::Result<()> {
    match action {
        DomainAction::Upsert {
            name,
            policy,
            bias,
            base_cred,
            display_name,
            json,
        } => {
            let (domain, created) = service.update_domain(
                &name,
                DomainUpdate {
                    policy,
                    bias,
                    base_cred,
                    display_name,
                },
            )?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(
                        &json!({ "domain": domain, "created": created })
                    )?
                );
            } else {
                let verb = if created { "Created" } else { "Updated" };
                println!("{verb} domain '{}' ({})", domain.name, domain.policy);
            }
        }
        DomainAction::List { json } => {
            let domains = service.list_domains();
            if json {
                println!("{}", serde_json::to_string_pretty(&domains)?);
            } else if domains.is_empty() {
                println!("No domains registered.");
            } else {
                for domain in &domains {
                    print_domain(domain);
                }
            }
        }
        DomainAction::Show { name, json } => {
            let domain = service.domain(&name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&domain)?);
            } else {
                print_domain(&domain);
                println!("updated: {}", domain.updated_at.to_rfc3339());
            }
        }
    }
    Ok(())
}

fn cmd_index(service: &Roadview, args: &cli::IndexArgs) -> error::Result<()> {
    let raw = if args.path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.path)?
    };

    let payload = serde_json::from_str(&raw)?;
    let report = service.bulk_index_values(batch_entries(payload)?)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &IndexReport) {
    println!(
        "Indexed {} document(s), blocked {}, rejected {}",
        report.indexed,
        report.blocked,
        report.rejected.len()
    );
    for rejection in &report.rejected {
        println!(
            "  [{}] {}: {}",
            rejection.position,
            rejection.url.as_deref().unwrap_or("-"),
            rejection.reason
        );
    }
}

fn cmd_status(
    service: &Roadview,
    data_dir: &DataDir,
    json: bool,
) -> error::Result<()> {
    let stats = service.stats();
    let settings = service.settings();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "dataDir": data_dir.root(),
                "dataDirSource": data_dir.source(),
                "stats": stats,
                "settings": settings,
            }))?
        );
    } else {
        println!(
            "Data directory: {} (from {})",
            data_dir.root().display(),
            data_dir.source()
        );
        println!("Documents: {}", stats.document_count);
        println!("Domains: {}", stats.domain_count);
        println!("Terms: {}", stats.term_count);
    }
    Ok(())
}

fn cmd_config(store: &StoreDb, action: &ConfigAction) -> error::Result<()> {
    match action {
        ConfigAction::Show { json } => {
            let settings = Settings::load(store)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                println!("default_page_size = {}", settings.default_page_size);
                println!("max_page_size = {}", settings.max_page_size);
                println!("snippet_chars = {}", settings.snippet_chars);
            }
        }
        ConfigAction::Set { key, value } => {
            Settings::set(store, key, value)?;
            println!("Set {key} = {}", value.trim());
        }
    }
    Ok(())
}
