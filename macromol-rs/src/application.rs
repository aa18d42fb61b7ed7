extern crate clap;

use crate::parsers::chains::{ChainView, PartitionStrategy};
use crate::parsers::{open_structure, read_document, ReadError, ReadOptions};
use clap::Parser;
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Read a PDB or mmCIF file and describe its chains.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the structure file to read.
    #[clap(value_parser)]
    pub input_path: String,
    /// The model to read.
    #[clap(short, long, value_parser)]
    pub model: Option<i32>,
    /// Only describe the chains with this author chain code.
    #[clap(short, long, value_parser)]
    pub chain: Option<String>,
    /// Fail if a residue has an insertion code.
    #[clap(long, value_parser, default_value_t = false)]
    pub forbid_insertion_codes: bool,
    /// Do not compare the residues with the declared sequences.
    #[clap(long, value_parser, default_value_t = false)]
    pub no_sequence_check: bool,
    /// JSON file with the read options.
    #[clap(short, long, value_parser)]
    pub options: Option<String>,
    /// Write the description as JSON.
    #[clap(long, value_parser, default_value_t = false)]
    pub json: bool,
    /// Display more information about what the software does.
    #[clap(short, long, value_parser, default_value_t = false)]
    pub verbose: bool,
    /// Be very verbose about what the software does.
    #[clap(short, long, value_parser, default_value_t = false)]
    pub trace: bool,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Cannot open the options file.")]
    CannotOpenOptionsFile(std::io::Error),
    #[error("Cannot parse the options file: {0}")]
    CannotParseOptionsFile(#[from] serde_json::Error),
    #[error("Cannot read the structure: {0}")]
    CannotReadStructure(#[from] ReadError),
}

#[derive(Debug, Serialize)]
pub struct ChainSummary {
    pub chain_code: String,
    pub pdb_chain_code: String,
    pub is_polymer: bool,
    pub atom_count: usize,
    pub sequence: String,
}

#[derive(Debug, Serialize)]
pub struct StructureSummary {
    pub pdb_code: Option<String>,
    pub models: Vec<i32>,
    pub model: i32,
    pub strategy: PartitionStrategy,
    pub alt_location: String,
    pub chains: Vec<ChainSummary>,
}

impl fmt::Display for StructureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Identifier: {}", self.pdb_code.as_deref().unwrap_or("unknown"))?;
        let models: Vec<String> = self.models.iter().map(i32::to_string).collect();
        writeln!(f, "Models: {} (reading model {})", models.join(", "), self.model)?;
        writeln!(f, "Alternate location: {}", self.alt_location)?;
        for chain in &self.chains {
            let kind = if chain.is_polymer { "polymer" } else { "non-polymer" };
            writeln!(
                f,
                "{:>4} {:>4} {:<11} {:>6} atoms  {}",
                chain.chain_code, chain.pdb_chain_code, kind, chain.atom_count, chain.sequence
            )?;
        }
        Ok(())
    }
}

/// Build the read options from the options file, if any, then the command line flags.
pub fn read_options(cli: &Cli) -> Result<ReadOptions, AppError> {
    let mut options = match &cli.options {
        None => ReadOptions::default(),
        Some(path) => {
            let file = File::open(path).map_err(AppError::CannotOpenOptionsFile)?;
            serde_json::from_reader(BufReader::new(file))?
        }
    };
    if let Some(model) = cli.model {
        options.model = model;
    }
    if cli.forbid_insertion_codes {
        options.allow_insertion_codes = false;
    }
    if cli.no_sequence_check {
        options.check_sequence = false;
    }
    debug!("Read options: {options:?}");
    Ok(options)
}

fn summarize_chain(chain: &ChainView, sequence: Option<String>) -> ChainSummary {
    ChainSummary {
        chain_code: chain.chain_code().to_owned(),
        pdb_chain_code: chain.pdb_chain_code().to_owned(),
        is_polymer: !chain.is_non_poly(),
        atom_count: chain.atom_count(),
        sequence: sequence.unwrap_or_default(),
    }
}

/// Read a structure file and describe the chains of one of its models.
pub fn summarize<P>(
    path: P,
    options: &ReadOptions,
    chain: Option<&str>,
) -> Result<StructureSummary, AppError>
where
    P: AsRef<Path>,
{
    let mut reader = open_structure(path)?;
    let models = reader.models()?;
    let document = read_document(reader.as_mut(), options)?;
    let chains = match chain {
        Some(pdb_chain_code) => document.read_chain(pdb_chain_code)?,
        None => document.iter_chains().collect(),
    };
    let chains = chains
        .iter()
        .map(|chain| summarize_chain(chain, document.sequence(chain.chain_code())))
        .collect();
    Ok(StructureSummary {
        pdb_code: document.pdb_code().map(String::from),
        models,
        model: document.model(),
        strategy: document.strategy(),
        alt_location: document.alt_location().to_owned(),
        chains,
    })
}

pub fn run(cli: Cli) -> Result<(), AppError> {
    let options = read_options(&cli)?;
    info!("Reading {}.", cli.input_path);
    let summary = summarize(&cli.input_path, &options, cli.chain.as_deref())?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_ressource;
    use rstest::rstest;

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "macromol-cli",
            "structure.pdb",
            "--model",
            "2",
            "--forbid-insertion-codes",
        ]);
        let options = read_options(&cli).unwrap();
        assert_eq!(options.model, 2);
        assert!(!options.allow_insertion_codes);
        assert!(options.check_sequence);
    }

    #[test]
    fn test_missing_options_file() {
        let cli = Cli::parse_from(["macromol-cli", "structure.pdb", "--options", "does/not/exist.json"]);
        assert!(matches!(
            read_options(&cli),
            Err(AppError::CannotOpenOptionsFile(_))
        ));
    }

    #[rstest]
    #[case(None, 2)]
    #[case(Some("A"), 2)]
    fn test_summarize_cif(#[case] chain: Option<&str>, #[case] expected_chains: usize) {
        let summary = summarize(
            test_ressource!("1abc_fragment.cif"),
            &ReadOptions::default(),
            chain,
        )
        .unwrap();
        assert_eq!(summary.pdb_code.as_deref(), Some("1abc"));
        assert_eq!(summary.models, vec![1]);
        assert_eq!(summary.chains.len(), expected_chains);
        assert_eq!(summary.chains[0].sequence, "GASK");
        // Serine has two conformers.
        assert_eq!(summary.chains[0].atom_count, 17);
        assert!(summary.chains[0].is_polymer);
        assert!(!summary.chains[1].is_polymer);
    }

    #[test]
    fn test_summary_as_json() {
        let summary = summarize(
            test_ressource!("2xyz_fragment.pdb"),
            &ReadOptions::default(),
            Some("B"),
        )
        .unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["strategy"], "Terminated");
        assert_eq!(json["chains"][0]["chain_code"], "B");
        assert_eq!(json["chains"][0]["sequence"], "WG");
    }
}
