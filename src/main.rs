//! mn-collection - assemble Metanorma document collections.

use anyhow::{Result, bail};
use clap::Parser;
use mn_collection::{
    cli::{Cli, Commands},
    collection::{BuildContext, Collection},
    config::{CollectionConfig, defaults, normalize_path},
    flavor::FlavorRegistry,
    log,
    sectionsplit::{self, SplitOptions},
};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => build(&cli),
        Commands::Split {
            input,
            identifier,
            flavor,
        } => split(&cli, input, identifier, flavor),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<CollectionConfig> {
    if !cli.config.exists() {
        bail!("Config file not found: {}", cli.config.display());
    }
    let mut config = CollectionConfig::from_path(&cli.config)?;
    config.update_with_cli(cli);
    config.validate()?;
    Ok(config)
}

fn build(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let flavors = FlavorRegistry::with_builtin();
    let ctx = BuildContext::new(&flavors);

    let output = Collection::build(&config, &ctx)?;
    log!(
        "collection";
        "wrote {} file(s) to {}",
        output.files.len(),
        config.build.output.display()
    );

    if !output.errors.is_empty() {
        for err in &output.errors {
            log!("error"; "{err}");
        }
        bail!("{} output task(s) failed", output.errors.len());
    }
    Ok(())
}

fn split(cli: &Cli, input: &Path, identifier: &str, flavor: &str) -> Result<()> {
    let output = normalize_path(
        cli.output
            .clone()
            .unwrap_or_else(defaults::build::output)
            .as_path(),
    );
    let base = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_owned());
    let opts = SplitOptions {
        identifier: identifier.to_owned(),
        source: input.to_path_buf(),
        output,
        base,
        parallel: cli.parallel.unwrap_or_else(defaults::build::parallel),
        flavor: flavor.to_owned(),
        formats: defaults::build::formats(),
    };

    let chunks = sectionsplit::split(input, &opts)?;
    for chunk in &chunks {
        log!("split"; "{:>4}  {}  {}", chunk.order, chunk.url, chunk.title);
    }
    log!("split"; "manifest: {}", opts.manifest_path().display());
    Ok(())
}
