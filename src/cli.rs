use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::core::{CallGraphOptions, Engine};

#[derive(Parser, Debug)]
#[command(name = "javalens")]
#[command(about = "Structural analysis for Java source trees")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Root directory of the Java sources
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List HTTP endpoints declared by controllers
    #[command(alias = "API")]
    Api {
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write one symbol analysis per controller, as <DIR>/<Controller>.json
        #[arg(long, value_name = "DIR")]
        split_dir: Option<PathBuf>,
    },

    /// Find references to a symbol
    #[command(alias = "REF")]
    Ref {
        /// Symbol name
        #[arg(short, long)]
        symbol: String,

        /// Only references in files whose path contains this
        #[arg(short, long, requires = "line")]
        file: Option<String>,

        /// Only references on this line (1-based)
        #[arg(short, long, requires = "file")]
        line: Option<usize>,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Find definitions of a symbol or `Type.member`
    #[command(alias = "DEF")]
    Def {
        /// Simple name or qualified `Type.member`
        #[arg(short, long)]
        symbol: String,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the method call graph and draw it.
    /// The long flags are also accepted with a single dash (`-img`, `-no-image`).
    #[command(alias = "CG")]
    Cg {
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Image path (svg, png or dot); defaults next to the JSON output
        #[arg(long)]
        img: Option<PathBuf>,

        /// Graphviz layout engine (dot, neato)
        #[arg(long)]
        layout: Option<String>,

        /// Comma separated class name fragments to keep
        #[arg(long, value_delimiter = ',')]
        filter: Vec<String>,

        /// Keep methods without any call edge in the image
        #[arg(long)]
        keep_isolated: bool,

        /// Skip image rendering
        #[arg(long)]
        no_image: bool,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        let root = self.root;
        match self.command {
            Commands::Api { output, split_dir } => engine.api(&root, output, split_dir).await,
            Commands::Ref {
                symbol,
                file,
                line,
                output,
            } => engine.find_references(&root, &symbol, file, line, output).await,
            Commands::Def { symbol, output } => engine.find_definitions(&root, &symbol, output).await,
            Commands::Cg {
                output,
                img,
                layout,
                filter,
                keep_isolated,
                no_image,
            } => {
                let options = CallGraphOptions {
                    output,
                    image: img,
                    layout,
                    class_filters: filter,
                    keep_isolated,
                    no_image,
                };
                engine.analyze_call_graph(&root, options).await
            }
        }
    }
}

/// Long `cg` flags that are also written with a single dash
const SINGLE_DASH_FLAGS: [&str; 5] = ["-img", "-layout", "-filter", "-keep-isolated", "-no-image"];

/// Rewrite single-dash spellings of the long `cg` flags to their `--` form
pub fn expand_single_dash_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let expanded = arg.to_str().and_then(|text| {
                let (flag, value) = match text.split_once('=') {
                    Some((flag, value)) => (flag, Some(value)),
                    None => (text, None),
                };
                SINGLE_DASH_FLAGS.contains(&flag).then(|| match value {
                    Some(value) => format!("-{}={}", flag, value),
                    None => format!("-{}", flag),
                })
            });
            expanded.map(OsString::from).unwrap_or(arg)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_with_file_and_line() {
        let cli = Cli::try_parse_from([
            "javalens", "proj", "REF", "-s", "save", "-f", "A.java", "-l", "12",
        ])
        .unwrap();

        assert_eq!(cli.root, PathBuf::from("proj"));
        match cli.command {
            Commands::Ref { symbol, file, line, output } => {
                assert_eq!(symbol, "save");
                assert_eq!(file.as_deref(), Some("A.java"));
                assert_eq!(line, Some(12));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_file_requires_line() {
        assert!(Cli::try_parse_from(["javalens", "proj", "ref", "-s", "x", "-f", "A.java"]).is_err());
        assert!(Cli::try_parse_from(["javalens", "proj", "def"]).is_err());
    }

    #[test]
    fn test_call_graph_flags() {
        let cli = Cli::try_parse_from([
            "javalens", "proj", "cg", "-o", "cg.json", "--filter", "Order,User",
            "--layout", "neato", "--keep-isolated",
        ])
        .unwrap();

        match cli.command {
            Commands::Cg { output, filter, layout, keep_isolated, no_image, img } => {
                assert_eq!(output, Some(PathBuf::from("cg.json")));
                assert_eq!(filter, vec!["Order".to_string(), "User".to_string()]);
                assert_eq!(layout.as_deref(), Some("neato"));
                assert!(keep_isolated);
                assert!(!no_image);
                assert!(img.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_single_dash_call_graph_flags() {
        let args = expand_single_dash_flags(
            [
                "javalens", "proj", "cg", "-o", "cg.json", "-img", "cg.svg", "-filter=Order",
                "-layout", "neato", "-no-image",
            ]
            .map(OsString::from),
        );
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Cg { output, img, filter, layout, no_image, keep_isolated } => {
                assert_eq!(output, Some(PathBuf::from("cg.json")));
                assert_eq!(img, Some(PathBuf::from("cg.svg")));
                assert_eq!(filter, vec!["Order".to_string()]);
                assert_eq!(layout.as_deref(), Some("neato"));
                assert!(no_image);
                assert!(!keep_isolated);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_api_split_dir() {
        let cli = Cli::try_parse_from(["javalens", "proj", "api", "--split-dir", "out/controllers"]).unwrap();

        match cli.command {
            Commands::Api { output, split_dir } => {
                assert!(output.is_none());
                assert_eq!(split_dir, Some(PathBuf::from("out/controllers")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
