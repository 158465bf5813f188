//! Command-line front end for the update importer.
//!
//! Plays the part of the updater UI: it hands the package to the importer as
//! if it had been picked, prints the progress events and the install request,
//! and cancels the import on Ctrl-C.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use update_importer::host::{
    ChannelInstallTrigger, CommandVerifier, DefaultLocalizer, InMemoryRegistry, LocalFileSource,
    REQUEST_PICK,
};
use update_importer::metadata::{extract_timestamp, parse_properties};
use update_importer::zip::read_entry_to_string;
use update_importer::{Cli, ImportEvent, Importer, PickOutcome, Services, UpdateRecord};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.inspect {
        return inspect(&cli).await;
    }

    import(&cli).await
}

/// Print the manifest properties and the build timestamp the importer would use.
async fn inspect(cli: &Cli) -> Result<()> {
    let config = cli.importer_config();
    let manifest = read_entry_to_string(&cli.file, &config.metadata_path, &CancellationToken::new())
        .await
        .with_context(|| format!("failed to read metadata from {}", cli.file.display()))?;

    for (key, value) in parse_properties(&manifest) {
        println!("{key}={value}");
    }

    match extract_timestamp(&manifest) {
        Ok(timestamp) => println!("\nBuild timestamp: {timestamp}"),
        Err(e) => eprintln!("\nNo usable build timestamp: {e}"),
    }
    Ok(())
}

async fn import(cli: &Cli) -> Result<()> {
    let Some(program) = cli.verify_cmd.as_deref() else {
        bail!("--verify-cmd is required to import a package");
    };
    let verifier = cli
        .verify_args
        .iter()
        .fold(CommandVerifier::new(program), |v, arg| v.arg(arg));

    let (installer, mut installs) = ChannelInstallTrigger::new();
    let (importer, mut events) = Importer::new(
        cli.importer_config(),
        Services {
            verifier: Arc::new(verifier),
            registry: Arc::new(InMemoryRegistry::new()),
            installer: Arc::new(installer),
            localizer: Arc::new(DefaultLocalizer),
            picker: None,
        },
    );

    let source = Box::new(LocalFileSource::new(&cli.file));
    if !importer.handle_pick_result(REQUEST_PICK, PickOutcome::Ok, Some(source))? {
        bail!("package was not accepted for import");
    }

    let mut notices = Vec::new();
    let record = loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                importer.cancel();
                continue;
            }
        };
        match event {
            Some(ImportEvent::Started { id }) => {
                if !cli.is_quiet() {
                    eprintln!("Importing {} (import #{id})...", cli.file.display());
                }
            }
            Some(ImportEvent::Notice { message, .. }) => notices.push(message),
            Some(ImportEvent::Completed { record, .. }) => break record,
            None => bail!("importer stopped without completing"),
        }
    };

    let Some(record) = record else {
        for notice in &notices {
            eprintln!("{notice}");
        }
        bail!("import of {} failed", cli.file.display());
    };

    print_record(&record);
    while let Ok(request) = installs.try_recv() {
        println!("Install requested for update '{}'", request.download_id);
    }
    Ok(())
}

fn print_record(record: &UpdateRecord) {
    println!("  version:   {}", record.version);
    println!("  file:      {}", record.file.display());
    println!("  size:      {} bytes", record.file_size);
    println!("  timestamp: {}", record.timestamp);
    println!(
        "  status:    {} (persisted as {})",
        record.status,
        record.persistent_status.code()
    );
}
