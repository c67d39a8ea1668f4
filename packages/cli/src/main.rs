//! `halite`: HAL resource command-line interface.
//!
//! Provides two subcommands:
//!
//! - **`render`**: turn a resource in flat form into HAL JSON.
//! - **`new`**: build a resource from flags and print it.
//!
//! Output options come from the `HALITE_*` environment variables and can be
//! overridden per invocation with flags. Logging goes to stderr and is
//! controlled by `RUST_LOG`.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use halite::{HalObject, HalWriter, Resource, Uri, WriterOptions};
use serde_json::ser::Formatter;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// halite: HAL resource CLI
///
/// Build resources and render them as HAL JSON.
#[derive(Parser)]
#[command(name = "halite", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct OutputArgs {
    /// Indent the output.
    #[arg(long, global = true)]
    pretty: bool,

    /// Write absent values as `null` instead of omitting them.
    #[arg(long, global = true)]
    write_nulls: bool,

    /// Write `"_embedded": {}` for resources without embedded resources.
    #[arg(long, global = true)]
    write_empty_embedded: bool,

    /// Leave out `_links` for resources without links.
    #[arg(long, global = true)]
    omit_empty_links: bool,

    /// Escape every non-ASCII character as `\uXXXX`.
    #[arg(long, global = true)]
    escape_non_ascii: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Render a resource as HAL JSON.
    ///
    /// Reads a resource in flat form:
    ///   {"links": [{"rel": "self", "href": "/a"}], "embedded": [...], "<property>": ...}
    ///
    /// Pass `-` as FILE to read from stdin.
    Render {
        /// Path to a JSON file, or `-` for stdin.
        file: PathBuf,
    },

    /// Create a new resource and print it.
    ///
    /// Examples:
    ///   halite new /orders/1 --link customer=/customers/7 --property total=30.5
    ///   halite new https://api.example.com/ --link next=/?page=2 --flat
    New {
        /// The resource URI, also used as the `self` link.
        uri: String,

        /// A link to add: <rel>=<href>. Repeat for multiple links.
        #[arg(long = "link", value_name = "REL=HREF")]
        links: Vec<String>,

        /// A property to set: <name>=<json>. A value that is not valid JSON
        /// is taken as a string. Repeat for multiple properties.
        #[arg(long = "property", value_name = "NAME=JSON")]
        properties: Vec<String>,

        /// Print the flat form instead of HAL JSON.
        #[arg(long)]
        flat: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "halite=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render { file } => {
            let json = read_input(&file);
            let resource: Resource = serde_json::from_str(&json)
                .unwrap_or_else(|e| fatal(&format!("failed to parse input as a resource: {e}")));
            emit(&resource, &cli.output);
        }

        Command::New {
            uri,
            links,
            properties,
            flat,
        } => {
            let uri = Uri::parse(&uri).unwrap_or_else(|e| fatal(&e.to_string()));
            let mut resource = Resource::with_uri(uri);

            for raw in &links {
                let (rel, href) = split_pair(raw, "--link", "<rel>=<href>");
                resource.add_link(rel, href);
            }
            for raw in &properties {
                let (name, value) = split_pair(raw, "--property", "<name>=<json>");
                let value = serde_json::from_str::<Value>(value)
                    .unwrap_or_else(|_| Value::String(value.to_string()));
                if let Err(e) = resource.set_property(name, value) {
                    fatal(&format!("invalid --property {raw:?}: {e}"));
                }
            }

            if flat {
                let out = if cli.output.pretty {
                    serde_json::to_string_pretty(&resource)
                } else {
                    serde_json::to_string(&resource)
                };
                println!("{}", out.unwrap_or_else(|e| fatal(&e.to_string())));
            } else {
                emit(&resource, &cli.output);
            }
        }
    }
}

impl OutputArgs {
    /// Environment defaults with this invocation's flags applied on top.
    fn options(&self) -> WriterOptions {
        let mut options = WriterOptions::from_env().unwrap_or_else(|e| fatal(&e.to_string()));
        if self.write_nulls {
            options.write_nulls = true;
        }
        if self.write_empty_embedded {
            options.write_empty_embedded = true;
        }
        if self.omit_empty_links {
            options.write_empty_links = false;
        }
        if self.escape_non_ascii {
            options.escape_non_ascii = true;
        }
        options
    }
}

/// Write `value` to stdout as HAL JSON followed by a newline.
fn emit(value: &dyn HalObject, args: &OutputArgs) {
    let options = args.options();
    let stdout = io::stdout().lock();
    if args.pretty {
        write_document(HalWriter::pretty(stdout).with_options(options), value);
    } else {
        write_document(HalWriter::new(stdout).with_options(options), value);
    }
    println!();
}

fn write_document<W: Write, F: Formatter>(mut writer: HalWriter<'_, W, F>, value: &dyn HalObject) {
    if let Err(e) = writer.write(value) {
        fatal(&format!("failed to write output: {e}"));
    }
    for failure in writer.diagnostics() {
        tracing::warn!("{failure}");
    }
}

/// Split `<left>=<right>`, exiting with a usage message otherwise.
fn split_pair<'a>(raw: &'a str, flag: &str, format: &str) -> (&'a str, &'a str) {
    raw.split_once('=')
        .unwrap_or_else(|| fatal(&format!("invalid {flag} {raw:?}: expected format {format}")))
}

/// Read the full contents of a file, or stdin when the path is `"-"`.
fn read_input(path: &PathBuf) -> String {
    if path.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {e}")));
        buf
    } else {
        fs::read_to_string(path)
            .unwrap_or_else(|e| fatal(&format!("failed to read {}: {e}", path.display())))
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("halite: {msg}");
    process::exit(2);
}
