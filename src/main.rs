use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use docxide_roundtrip::docx::metadata::get_metadata;
use docxide_roundtrip::layout::FontMetrics;
use docxide_roundtrip::{CommentsExportMode, Converter, Error, ExportOptions, InsertContent};

#[derive(Parser)]
#[command(version, about = "Import, inspect and re-export DOCX files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a DOCX file and export it again
    Roundtrip {
        input: PathBuf,
        /// Output path (defaults to <input>.roundtrip.docx)
        output: Option<PathBuf>,
        /// Strip comments and comment markers from the output
        #[arg(long)]
        clean_comments: bool,
    },
    /// Print the structured document tree as JSON
    Json { input: PathBuf },
    /// Print core properties and counts as JSON
    Metadata { input: PathBuf },
    /// Print the document body as Markdown
    Markdown { input: PathBuf },
    /// Append a Markdown file to the end of a document
    Append {
        input: PathBuf,
        markdown: PathBuf,
        /// Output path (defaults to <input>.appended.docx)
        output: Option<PathBuf>,
    },
    /// Print the computed layout of every paragraph as JSON
    Layout {
        input: PathBuf,
        /// TrueType/OpenType font used to measure list markers
        #[arg(long)]
        font: Option<PathBuf>,
    },
}

fn load(input: &Path) -> Result<Converter, Error> {
    let mut converter = Converter::new();
    converter.open(input)?;
    Ok(converter)
}

fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::Roundtrip {
            input,
            output,
            clean_comments,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("roundtrip.docx"));
            let options = ExportOptions {
                comments: if clean_comments {
                    CommentsExportMode::Clean
                } else {
                    CommentsExportMode::External
                },
            };
            docxide_roundtrip::roundtrip_file(&input, &output, &options)?;
            println!("Wrote {}", output.display());
        }
        Command::Json { input } => {
            let converter = load(&input)?;
            if let Some(doc) = converter.document() {
                println!("{}", serde_json::to_string_pretty(doc)?);
            }
        }
        Command::Metadata { input } => {
            let converter = load(&input)?;
            if let (Some(package), Some(doc)) = (converter.package(), converter.document()) {
                println!("{}", serde_json::to_string_pretty(&get_metadata(package, doc))?);
            }
        }
        Command::Markdown { input } => {
            let converter = load(&input)?;
            print!("{}", converter.to_markdown()?);
        }
        Command::Append {
            input,
            markdown,
            output,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("appended.docx"));
            let mut converter = load(&input)?;
            let added = converter.insert_content(InsertContent::Markdown(std::fs::read_to_string(&markdown)?))?;
            converter.export(&ExportOptions::default())?.save(&output)?;
            println!("Appended {added} blocks, wrote {}", output.display());
        }
        Command::Layout { input, font } => {
            let converter = load(&input)?;
            let metrics = match font {
                Some(path) => {
                    let data = std::fs::read(&path)?;
                    FontMetrics::from_font_data(&data, 0, "\u{2022}\u{25E6}\u{25AA}").unwrap_or_else(|| {
                        log::warn!("Could not parse {}, using built-in metrics", path.display());
                        FontMetrics::helvetica()
                    })
                }
                None => FontMetrics::helvetica(),
            };
            let layouts = converter.layout_document(Some(&metrics));
            println!("{}", serde_json::to_string_pretty(&layouts)?);
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
