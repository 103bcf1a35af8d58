use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use ignore::WalkBuilder;
use miette::{IntoDiagnostic, Result};
use tracing::{debug, info, warn};
use webcraft_dom::DomTree;
use webcraft_editor_core::persist::{self, RECENT_COLORS_KEY, push_recent_color};
use webcraft_editor_core::{ColorScanner, EditorConfig, FileStore};
use webcraft_project::{
    ExportArtifact, ImportOptions, ProjectFile, ProjectFileNode, build_file_tree, default_packer,
    export_project, import_project,
};

#[derive(Parser)]
#[command(version, about = "WebCraft - import, inspect and export HTML projects", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding persisted editor state
    #[arg(long, global = true, env = "WEBCRAFT_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a project folder into one self-contained HTML document
    Import {
        /// Project directory
        dir: PathBuf,

        /// Where to write the document (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Largest image, in bytes, inlined as a data URI
        #[arg(long, env = "WEBCRAFT_IMAGE_LIMIT", default_value_t = 500_000)]
        image_limit: u64,
    },
    /// Split a document into HTML, CSS and JS files packed in an archive
    Export {
        file: PathBuf,

        /// Archive path (defaults to a timestamped name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the colours a document uses, most used first
    Colors { file: PathBuf },
    /// Replace one colour everywhere it is used
    ReplaceColor {
        file: PathBuf,
        old: String,
        new: String,

        /// Where to write the result (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the file tree an import would display
    Tree { dir: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            dir,
            output,
            image_limit,
        } => {
            let options = ImportOptions {
                image_size_limit: image_limit,
                ..ImportOptions::default()
            };
            import_dir(&dir, output.as_deref(), &options).await?;
        }
        Commands::Export { file, output } => export_file(&file, output).await?,
        Commands::Colors { file } => list_colors(&file).await?,
        Commands::ReplaceColor {
            file,
            old,
            new,
            output,
        } => {
            let state_dir = match cli.state_dir {
                Some(dir) => dir,
                None => default_state_dir()?,
            };
            replace_color(&file, &old, &new, output.as_deref(), &state_dir).await?;
        }
        Commands::Tree { dir } => {
            let files = collect_files(&dir).await?;
            let mut out = std::io::stdout().lock();
            print_tree(&mut out, &build_file_tree(&files), 0).into_diagnostic()?;
        }
    }

    Ok(())
}

async fn import_dir(dir: &Path, output: Option<&Path>, options: &ImportOptions) -> Result<()> {
    let files = collect_files(dir).await?;
    let project = import_project(&files, options)?;
    for warning in &project.warnings {
        eprintln!("⚠ {warning}");
    }
    for skipped in &project.skipped {
        eprintln!("⚠ skipped {}: {}", skipped.path, skipped.reason);
    }
    eprintln!(
        "✓ Imported {} files ({} styles, {} scripts, {} images inlined)",
        project.file_count, project.inlined.styles, project.inlined.scripts, project.inlined.images
    );
    write_output(output, project.html.as_bytes()).await
}

async fn export_file(file: &Path, output: Option<PathBuf>) -> Result<()> {
    let html = read_document(file).await?;
    let packer = default_packer();
    let artifact = export_project(&html, packer.as_ref(), Utc::now());
    let dest = output.unwrap_or_else(|| PathBuf::from(artifact.file_name()));
    if let ExportArtifact::SingleFile { notice, .. } = &artifact {
        eprintln!("⚠ {notice}");
    }
    write_output(Some(&dest), artifact.bytes()).await?;
    eprintln!("✓ Output: {}", dest.display());
    Ok(())
}

async fn list_colors(file: &Path) -> Result<()> {
    let html = read_document(file).await?;
    let tree = DomTree::parse(&html);
    let colors = ColorScanner::default().scan(&tree, |progress| {
        debug!(
            processed = progress.processed,
            total = progress.total,
            "scanning colours"
        );
    });
    for usage in &colors {
        println!("{:>6}  {}", usage.count, usage.color);
    }
    eprintln!("Found {} unique colors", colors.len());
    Ok(())
}

async fn replace_color(
    file: &Path,
    old: &str,
    new: &str,
    output: Option<&Path>,
    state_dir: &Path,
) -> Result<()> {
    let html = read_document(file).await?;
    let mut tree = DomTree::parse(&html);
    let replaced = ColorScanner::default().replace(&mut tree, old, new);
    if replaced == 0 {
        eprintln!("No instances of {old} found");
        return write_output(output, html.as_bytes()).await;
    }

    let store = FileStore::new(state_dir);
    let mut recent: Vec<String> = persist::load(&store, RECENT_COLORS_KEY)
        .unwrap_or_else(|err| {
            warn!(%err, "ignoring unreadable recent colours");
            None
        })
        .unwrap_or_default();
    push_recent_color(
        &mut recent,
        new.trim(),
        EditorConfig::default().recent_colors_limit,
    );
    persist::save(&store, RECENT_COLORS_KEY, &recent)?;

    eprintln!("✓ Replaced {replaced} instances of the color");
    write_output(output, tree.to_html().as_bytes()).await
}

async fn read_document(file: &Path) -> Result<String> {
    if !file.exists() {
        return Err(miette::miette!("Document not found: {}", file.display()));
    }
    tokio::fs::read_to_string(file).await.into_diagnostic()
}

/// Every file under `dir`, as paths relative to it. Unreadable files are
/// kept as failed entries so the import can report them.
async fn collect_files(dir: &Path) -> Result<Vec<ProjectFile>> {
    if !dir.is_dir() {
        return Err(miette::miette!(
            "Project directory not found: {}",
            dir.display()
        ));
    }
    let mut files = Vec::new();
    for entry in WalkBuilder::new(dir).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        match tokio::fs::read(entry.path()).await {
            Ok(bytes) => files.push(ProjectFile::new(relative, bytes)),
            Err(err) => {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                files.push(ProjectFile::failed(relative, size, err.to_string()));
            }
        }
    }
    info!(count = files.len(), dir = %dir.display(), "collected project files");
    Ok(files)
}

async fn write_output(output: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    tokio::fs::create_dir_all(parent).await.into_diagnostic()?;
                }
            }
            tokio::fs::write(path, bytes).await.into_diagnostic()
        }
        None => {
            let mut out = std::io::stdout().lock();
            out.write_all(bytes).into_diagnostic()?;
            out.flush().into_diagnostic()
        }
    }
}

fn print_tree(out: &mut impl Write, nodes: &[ProjectFileNode], depth: usize) -> std::io::Result<()> {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            ProjectFileNode::Folder { name, children } => {
                writeln!(out, "{indent}{name}/")?;
                print_tree(out, children, depth + 1)?;
            }
            ProjectFileNode::File { name, size, .. } => {
                writeln!(out, "{indent}{name} ({size} bytes)")?;
            }
        }
    }
    Ok(())
}

fn default_state_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("webcraft"))
        .ok_or_else(|| miette::miette!("Could not determine the data directory; pass --state-dir"))
}

fn init_tracing() {
    let default = if cfg!(debug_assertions) { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
