use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ferrotex_mml::MmlNode;
use ferrotex_mml::serialize::{AttributeLayers, to_mathml_with};
use ferrotex_texmath::{Catalog, ErrorPolicy, HandlerType, Outcome, TexCompiler, TexOptions};
use std::io::Read;
use std::path::PathBuf;

/// Packages a single expression may pull in before we give up.
const MAX_LOADS: usize = 16;

#[derive(Parser)]
#[command(name = "ferrotex")]
#[command(about = "FerroTeX math compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Input {
    /// TeX math source; read from stdin when omitted
    #[arg(value_name = "TEX")]
    source: Option<String>,

    /// Compile as display math
    #[arg(short, long)]
    display: bool,

    /// JSON options file (camelCase keys, as TexOptions)
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Numbering scheme: none, ams or all
    #[arg(long)]
    tags: Option<String>,

    /// Extra packages to load up front
    #[arg(short, long = "package", value_name = "NAME")]
    packages: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile TeX math and print MathML markup
    Compile {
        #[command(flatten)]
        input: Input,

        /// Also print inherited attribute values
        #[arg(long)]
        inherited: bool,
    },
    /// Compile TeX math and print the tree as JSON
    Json {
        #[command(flatten)]
        input: Input,
    },
    /// List the packages in the catalog
    Packages,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let catalog = Catalog::with_defaults()?;

    match cli.command {
        Commands::Compile { input, inherited } => {
            let tree = run(&catalog, &input)?;
            let layers = if inherited {
                AttributeLayers::ExplicitAndInherited
            } else {
                AttributeLayers::Explicit
            };
            println!("{}", to_mathml_with(&tree, layers));
        }
        Commands::Json { input } => {
            let tree = run(&catalog, &input)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Commands::Packages => {
            for name in catalog.names() {
                let Some(package) = catalog.get(name) else {
                    continue;
                };
                let macros: usize = package
                    .handler_list(HandlerType::Macro)
                    .iter()
                    .filter_map(|map| package.symbol_map(map))
                    .map(|map| map.len())
                    .sum();
                let requires = package.requires().join(", ");
                if requires.is_empty() {
                    println!("{name:<12} {macros:>4} macros");
                } else {
                    println!("{name:<12} {macros:>4} macros  (requires {requires})");
                }
            }
        }
    }
    Ok(())
}

fn load_options(input: &Input) -> anyhow::Result<TexOptions> {
    let mut options = match &input.options {
        Some(path) => TexOptions::load_from_path(path)
            .with_context(|| format!("reading options from {}", path.display()))?,
        None => TexOptions::default(),
    };
    if let Some(tags) = &input.tags {
        options.tags = tags.clone();
    }
    for package in &input.packages {
        if !options.packages.contains(package) {
            options.packages.push(package.clone());
        }
    }
    options.format_error = ErrorPolicy::Raise;
    Ok(options)
}

fn read_source(input: &Input) -> anyhow::Result<String> {
    match &input.source {
        Some(source) => Ok(source.clone()),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

/// Compiles the input, loading requested packages until the parse completes.
fn run(catalog: &Catalog, input: &Input) -> anyhow::Result<MmlNode> {
    let options = load_options(input)?;
    let source = read_source(input)?;
    let mut compiler = TexCompiler::new(catalog, options)?;
    for _ in 0..MAX_LOADS {
        match compiler.compile(source.trim(), input.display)? {
            Outcome::Done(tree) => return Ok(tree),
            Outcome::NeedsResource(package) => {
                log::info!("loading '{}' and retrying", package);
                compiler.add_package(package.as_str())?;
            }
        }
    }
    bail!("gave up after loading {MAX_LOADS} packages")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(source: &str) -> Input {
        Input {
            source: Some(source.to_string()),
            display: false,
            options: None,
            tags: None,
            packages: Vec::new(),
        }
    }

    #[test]
    fn test_run_loads_packages() {
        let catalog = Catalog::with_defaults().unwrap();
        let tree = run(&catalog, &input(r"\boldsymbol{x}")).unwrap();
        assert_eq!(tree.children[0].text(), "x");
    }

    #[test]
    fn test_run_reports_errors() {
        let catalog = Catalog::with_defaults().unwrap();
        let err = run(&catalog, &input("{x")).unwrap_err();
        assert!(err.to_string().contains("Missing close brace"), "{err}");
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
