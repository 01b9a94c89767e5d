use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::core::{
    error::ReadError,
    file::PersonalDataFile,
    profile::CardProfile,
    read_identity_with_profile,
    session::SessionManager,
    utils::{describe_status_word, format_hex, format_hex_dump, format_hex_spaced, parse_hex},
};

#[derive(Parser)]
#[command(name = "ecard-reader")]
#[command(about = "Offline identity extraction from the Austrian e-card over PC/SC")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available PC/SC readers
    List {
        /// Show card presence and ATR per reader
        #[arg(short = 'l', long)]
        detailed: bool,
    },

    /// Read the identity record from the card
    Read {
        /// Reader name or index (defaults to the first reader)
        reader: Option<String>,

        /// Print the record as JSON
        #[arg(short, long)]
        json: bool,

        /// Card profile file (JSON); defaults to the Austrian e-card
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Override the application identifier, in hex (e.g. "D0 40 00 00 17 01 01 01")
        #[arg(short, long)]
        aid: Option<String>,
    },

    /// Dump the raw personal-data file without decoding it
    Dump {
        /// Reader name or index (defaults to the first reader)
        reader: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "dump")]
        format: DumpFormat,

        /// Card profile file (JSON); defaults to the Austrian e-card
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Override the application identifier, in hex
        #[arg(short, long)]
        aid: Option<String>,
    },
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum DumpFormat {
    Hex,
    Spaced,
    Dump,
}

/// JSON envelope for `read --json`
#[derive(Serialize)]
struct ReadEnvelope<'a> {
    timestamp: DateTime<Utc>,
    reader: &'a str,
    record: &'a crate::core::identity::IdentityRecord,
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        log::LevelFilter::Debug
    } else if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match cli.command {
        Commands::List { detailed } => cmd_list(detailed),
        Commands::Read {
            reader,
            json,
            profile,
            aid,
        } => cmd_read(reader.as_deref(), json, profile.as_deref(), aid.as_deref()),
        Commands::Dump {
            reader,
            format,
            profile,
            aid,
        } => cmd_dump(reader.as_deref(), &format, profile.as_deref(), aid.as_deref()),
    }
}

fn cmd_list(detailed: bool) -> Result<()> {
    let manager = SessionManager::new().context("Failed to initialize PC/SC")?;

    if detailed {
        let infos = manager.reader_infos().context("Failed to list readers")?;
        if infos.is_empty() {
            println!("No PC/SC readers found.");
            return Ok(());
        }

        println!("Available PC/SC readers:");
        for (i, info) in infos.iter().enumerate() {
            println!("  [{}] {}", i, info.name);
            println!(
                "      Status: {}",
                if info.card_present {
                    "Card present"
                } else {
                    "No card"
                }
            );
            if let Some(ref atr) = info.atr {
                println!("      ATR: {}", format_hex_spaced(atr));
            }
        }
    } else {
        let readers = manager.list_readers().context("Failed to list readers")?;
        if readers.is_empty() {
            println!("No PC/SC readers found.");
            return Ok(());
        }

        println!("Available PC/SC readers:");
        for (i, name) in readers.iter().enumerate() {
            println!("  [{i}] {name}");
        }
    }

    Ok(())
}

fn cmd_read(
    reader: Option<&str>,
    json: bool,
    profile_path: Option<&std::path::Path>,
    aid_override: Option<&str>,
) -> Result<()> {
    let profile = load_profile(profile_path, aid_override)?;
    let reader_name = resolve_reader(reader)?;

    let record = read_identity_with_profile(reader_name.as_deref(), &profile)
        .map_err(describe_read_error)
        .context("Failed to read identity from card")?;

    if json {
        let envelope = ReadEnvelope {
            timestamp: Utc::now(),
            reader: reader_name.as_deref().unwrap_or("(first reader)"),
            record: &record,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("Last name:  {}", record.last_name);
        println!("First name: {}", record.first_name);
        println!(
            "Born:       {}",
            record.date_of_birth.as_deref().unwrap_or("(not on card)")
        );
        println!(
            "SVNR:       {}",
            record.svnr.as_deref().unwrap_or("(not on card)")
        );
        println!("Sex:        {}", record.sex);
    }

    Ok(())
}

fn cmd_dump(
    reader: Option<&str>,
    format: &DumpFormat,
    profile_path: Option<&std::path::Path>,
    aid_override: Option<&str>,
) -> Result<()> {
    let profile = load_profile(profile_path, aid_override)?;
    let reader_name = resolve_reader(reader)?;

    let manager = SessionManager::new().context("Failed to initialize PC/SC")?;
    let reader_name = match reader_name {
        Some(name) => name,
        None => manager
            .list_readers()
            .context("Failed to list readers")?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No smart card readers found"))?,
    };

    let mut session = manager
        .connect(&reader_name)
        .map_err(describe_read_error)
        .context("Failed to connect to card")?;

    println!("Reader:   {}", session.reader_name());
    match session.protocol() {
        Some(protocol) => println!("Protocol: {protocol:?}"),
        None => println!("Protocol: (unknown)"),
    }

    let result = {
        let mut file = PersonalDataFile::new(&mut session, &profile);
        file.select_application().and_then(|_| file.read_file())
    };
    session.disconnect();

    let payload = result
        .map_err(describe_read_error)
        .context("Failed to read personal-data file")?;

    println!("Read {} bytes:", payload.len());
    match format {
        DumpFormat::Hex => println!("{}", format_hex(&payload)),
        DumpFormat::Spaced => println!("{}", format_hex_spaced(&payload)),
        DumpFormat::Dump => println!("{}", format_hex_dump(&payload)),
    }

    Ok(())
}

fn load_profile(path: Option<&std::path::Path>, aid_override: Option<&str>) -> Result<CardProfile> {
    let mut profile = match path {
        Some(path) => CardProfile::from_file(path)?,
        None => CardProfile::default(),
    };

    if let Some(aid) = aid_override {
        profile.aid = parse_hex(aid).context("Invalid hex in --aid override")?;
        profile.validate().context("Invalid AID override")?;
    }

    Ok(profile)
}

/// Augment card status-word failures with the human-readable meaning so the
/// CLI reports e.g. "6A 82 (File not found)" instead of the bare code.
fn describe_read_error(err: ReadError) -> anyhow::Error {
    match err {
        ReadError::CardStatus { sw1, sw2 } => anyhow::anyhow!(
            "{} ({})",
            ReadError::CardStatus { sw1, sw2 },
            describe_status_word(sw1, sw2)
        ),
        other => anyhow::Error::new(other),
    }
}

/// Accept a reader by index into the current listing or by name; `None`
/// passes through and lets the core pick the first reader.
fn resolve_reader(name_or_index: Option<&str>) -> Result<Option<String>> {
    let Some(name_or_index) = name_or_index else {
        return Ok(None);
    };

    if let Ok(index) = name_or_index.parse::<usize>() {
        let manager = SessionManager::new().context("Failed to initialize PC/SC")?;
        let readers = manager.list_readers().context("Failed to list readers")?;
        if index >= readers.len() {
            bail!(
                "Reader index {} out of range ({} readers available)",
                index,
                readers.len()
            );
        }
        return Ok(Some(readers[index].clone()));
    }

    Ok(Some(name_or_index.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_reader_passthrough() {
        assert_eq!(resolve_reader(None).unwrap(), None);
        assert_eq!(
            resolve_reader(Some("ACS ACR122 0")).unwrap(),
            Some("ACS ACR122 0".to_string())
        );
    }

    #[test]
    fn test_describe_read_error_explains_status_words() {
        let err = describe_read_error(ReadError::CardStatus {
            sw1: 0x6A,
            sw2: 0x82,
        });
        let message = err.to_string();
        assert!(message.contains("6A 82"), "unexpected message: {message}");
        assert!(
            message.contains("File not found"),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn test_describe_read_error_passes_other_errors_through() {
        let err = describe_read_error(ReadError::CardRemoved);
        assert_eq!(err.to_string(), ReadError::CardRemoved.to_string());
    }

    #[test]
    fn test_load_profile_aid_override() {
        let profile = load_profile(None, Some("A0 00 00 00 18")).unwrap();
        assert_eq!(profile.aid, vec![0xA0, 0x00, 0x00, 0x00, 0x18]);

        assert!(load_profile(None, Some("not hex")).is_err());
        assert!(load_profile(None, Some("")).is_err());
    }
}
