use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{debug, warn};
use pnlab::core::petri_net::pnml::{
    export_petri_net_to_pnml_path_with_options, import_pnml_from_path_with_options,
};
use pnlab::{Dialect, Node, PetriNet, PnmlExportOptions, PnmlImportOptions, PnmlStyle};

/// Filter variable of the logger (`RUST_LOG` syntax)
const LOG_ENV: &str = "PNLAB_LOG";
const LOG_STYLE_ENV: &str = "PNLAB_LOG_STYLE";

fn dialect_arg(name: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(long)
        .help(help)
        .value_parser(["pnlab", "pipe"])
        .default_value("pnlab")
}

fn make_parser() -> Command {
    Command::new("pnlab")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect and convert PNML files")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help(format!("Log debug output (overridden by {LOG_ENV})"))
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("info")
                .about("Print a summary of every net in a file")
                .arg(Arg::new("file").value_name("FILE").required(true))
                .arg(dialect_arg("dialect", "dialect", "Dialect of the file")),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert the first net of a file")
                .arg(Arg::new("input").value_name("INPUT").required(true))
                .arg(Arg::new("output").value_name("OUTPUT").required(true))
                .arg(dialect_arg("from", "from", "Dialect of the input file"))
                .arg(dialect_arg("to", "to", "Dialect of the output file"))
                .arg(
                    Arg::new("style")
                        .long("style")
                        .value_name("FILE")
                        .help("JSON file with presentation settings"),
                )
                .arg(
                    Arg::new("indent")
                        .long("indent")
                        .help("Spaces per nesting level (0 for a single line)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("2"),
                ),
        )
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let env = env_logger::Env::new()
        .filter_or(LOG_ENV, default_filter)
        .write_style(LOG_STYLE_ENV);
    env_logger::init_from_env(env);
}

fn dialect(matches: &ArgMatches, id: &str) -> Result<Dialect> {
    let name = matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default();
    Ok(name.parse::<Dialect>()?)
}

fn import(path: &Path, dialect: Dialect) -> Result<Vec<PetriNet>> {
    let options = PnmlImportOptions {
        dialect,
        ..Default::default()
    };
    import_pnml_from_path_with_options(path, &options)
        .with_context(|| format!("Failed to import {}", path.display()))
}

fn load_style(path: &Path) -> Result<PnmlStyle> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid style file {}", path.display()))
}

fn info(matches: &ArgMatches) -> Result<()> {
    let path = PathBuf::from(required(matches, "file")?);
    let nets = import(&path, dialect(matches, "dialect")?)?;
    if nets.is_empty() {
        println!("{}: no nets", path.display());
    }
    for net in &nets {
        println!("{}", net.name());
        println!("  Places: {}", net.places().len());
        println!("  Transitions: {}", net.transitions().len());
        println!("  Arcs: {}", net.arcs().count());
        println!("  Scale: {}", net.scale());
        let mut ids: Vec<&str> = net.places().values().map(|p| p.id()).collect();
        ids.sort_unstable();
        debug!("Places of {}: {}", net.name(), ids.join(", "));
    }
    Ok(())
}

fn convert(matches: &ArgMatches) -> Result<()> {
    let input = PathBuf::from(required(matches, "input")?);
    let output = PathBuf::from(required(matches, "output")?);
    let mut nets = import(&input, dialect(matches, "from")?)?;
    if nets.is_empty() {
        bail!("{} does not contain a net", input.display());
    }
    if nets.len() > 1 {
        warn!(
            "{} contains {} nets, only converting the first",
            input.display(),
            nets.len()
        );
    }
    let net = nets.swap_remove(0);

    let style = match matches.get_one::<String>("style") {
        Some(path) => load_style(Path::new(path))?,
        None => PnmlStyle::default(),
    };
    let options = PnmlExportOptions {
        style,
        indent: matches.get_one::<usize>("indent").copied().unwrap_or(2),
        dialect: dialect(matches, "to")?,
    };
    export_petri_net_to_pnml_path_with_options(&net, &output, &options)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Converted {:?} ({} places, {} transitions) to {}",
        net.name(),
        net.places().len(),
        net.transitions().len(),
        output.display()
    );
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("Missing argument {id}"))
}

fn main() -> Result<()> {
    let matches = make_parser().get_matches();
    init_logging(matches.get_flag("verbose"));
    match matches.subcommand() {
        Some(("info", sub)) => info(sub),
        Some(("convert", sub)) => convert(sub),
        _ => bail!("Unknown command"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_is_valid() {
        make_parser().debug_assert();
    }

    #[test]
    fn convert_arguments() {
        let matches = make_parser()
            .try_get_matches_from(["pnlab", "convert", "a.xml", "b.pnml", "--from", "pipe", "-v"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "convert");
        assert_eq!(dialect(sub, "from").unwrap(), Dialect::Pipe);
        assert_eq!(dialect(sub, "to").unwrap(), Dialect::PnLab);
        assert_eq!(sub.get_one::<usize>("indent").copied(), Some(2));
        assert!(matches.get_flag("verbose"));
    }

    #[test]
    fn help_names_log_variable() {
        let help = make_parser().render_help().to_string();
        assert!(help.contains(LOG_ENV));
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        assert!(make_parser()
            .try_get_matches_from(["pnlab", "info", "a.pnml", "--dialect", "tina"])
            .is_err());
    }
}
