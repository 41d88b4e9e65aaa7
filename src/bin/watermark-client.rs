use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use watermark_mask_client::submit::collect_folder;
use watermark_mask_client::{
    mask_filename, Backend, ClientOptions, EditorTab, Event, HttpBackend, MaskCatalog,
    MaskEditor, Mode, Outcome, Rect, ResultView, Session,
};

#[derive(Parser)]
#[command(
    name = "watermark-client",
    about = "Submit image pairs to a watermark removal service and paint mask templates",
    version,
    after_help = "Simple usage: watermark-client single high.jpg low.jpg -m vertical"
)]
struct Cli {
    /// Base URL of the watermark removal service
    #[arg(short, long, default_value = "http://127.0.0.1:8000", global = true)]
    server: String,

    /// Request timeout in seconds (0 waits indefinitely)
    #[arg(long, default_value = "300", global = true)]
    timeout: u64,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the available mask templates
    Masks,

    /// Remove the watermark from one high/low image pair
    Single {
        /// High-quality (watermarked) image
        high: PathBuf,
        /// Low-quality (clean) image
        low: PathBuf,
        /// Mask template id (default: first in catalog)
        #[arg(short, long)]
        mask: Option<String>,
        /// Directory the result is saved into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Remove watermarks from two folders of matching images
    Batch {
        /// Folder of high-quality images
        high_dir: PathBuf,
        /// Folder of low-quality images
        low_dir: PathBuf,
        /// Mask template id (default: first in catalog)
        #[arg(short, long)]
        mask: Option<String>,
        /// Directory result.zip is saved into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Replace a mask template with an image file
    UpdateMask {
        /// Black/white mask image
        file: PathBuf,
        /// Mask template id to replace
        #[arg(short, long)]
        mask: String,
    },

    /// Paint a mask from rectangles over a reference image
    Paint {
        /// Reference image (sets the mask size)
        image: PathBuf,
        /// Rectangle in image pixels, repeatable
        #[arg(short, long = "rect", value_name = "X,Y,W,H", required = true)]
        rects: Vec<Rect>,
        /// Mask template id the mask is saved as
        #[arg(short, long)]
        mask: String,
        /// Directory mask_<id>.png is saved into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Also write the highlighted editor view to this file
        #[arg(long)]
        overlay: Option<PathBuf>,
        /// Also upload the mask as the template after saving it
        #[arg(long)]
        upload: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let opts = ClientOptions {
        server_url: cli.server.clone(),
        timeout: (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)),
        ..ClientOptions::default()
    };

    let code = match run(cli.command, opts, cli.quiet) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {msg}");
            1
        }
    };
    process::exit(code);
}

fn backend(opts: &ClientOptions) -> Result<HttpBackend, String> {
    HttpBackend::new(opts).map_err(|e| e.to_string())
}

fn run(command: Command, opts: ClientOptions, quiet: bool) -> Result<(), String> {
    match command {
        Command::Masks => list_masks(&backend(&opts)?),
        Command::Single {
            high,
            low,
            mask,
            output,
        } => {
            let events = vec![
                Event::SwitchMode(Mode::Single),
                Event::SetHighImage(Some(high)),
                Event::SetLowImage(Some(low)),
            ];
            process(opts, mask, output, events, quiet)
        }
        Command::Batch {
            high_dir,
            low_dir,
            mask,
            output,
        } => {
            let high = collect_folder(&high_dir).map_err(|e| e.to_string())?;
            let low = collect_folder(&low_dir).map_err(|e| e.to_string())?;
            let events = vec![
                Event::SwitchMode(Mode::Batch),
                Event::SetHighFolder(high),
                Event::SetLowFolder(low),
            ];
            process(opts, mask, output, events, quiet)
        }
        Command::UpdateMask { file, mask } => {
            let backend = backend(&opts)?;
            let mut session = Session::start(backend, opts, PathBuf::from("."));
            let outcome = [
                Event::OpenEditor,
                Event::SwitchTab(EditorTab::Upload),
                Event::SelectUploadType(mask.clone()),
                Event::ChooseUploadFile(Some(file)),
                Event::UploadMask,
            ]
            .into_iter()
            .fold(Outcome::None, |_, ev| session.dispatch(ev));
            match outcome {
                Outcome::Reloaded => {
                    if !quiet {
                        eprintln!("[OK] mask {mask} updated");
                    }
                    Ok(())
                }
                Outcome::Alert(msg) => Err(msg),
                other => Err(format!("unexpected outcome {other:?}")),
            }
        }
        Command::Paint {
            image,
            rects,
            mask,
            output,
            overlay,
            upload,
        } => paint(
            &opts,
            &image,
            &rects,
            &mask,
            &output,
            overlay.as_deref(),
            upload,
            quiet,
        ),
    }
}

fn list_masks(backend: &HttpBackend) -> Result<(), String> {
    let catalog = backend.masks().map_err(|e| e.to_string())?;
    if catalog.is_empty() {
        eprintln!("No mask templates available");
    }
    for t in catalog.templates() {
        let thumb = backend
            .resolve(&t.thumb)
            .map_or_else(|_| t.thumb.clone(), |u| u.to_string());
        println!("{:<14} {:<16} {thumb}", t.kind, t.name);
    }
    Ok(())
}

fn process(
    opts: ClientOptions,
    mask: Option<String>,
    output: PathBuf,
    events: Vec<Event>,
    quiet: bool,
) -> Result<(), String> {
    let backend = backend(&opts)?;
    let mut session = Session::start(backend, opts, output);

    if let Some(kind) = mask {
        // an unreachable catalog cannot vouch for any type, so pass it through
        if !session.catalog().is_empty() && !session.catalog().contains(&kind) {
            return Err(format!("unknown mask type {kind:?}"));
        }
        session.dispatch(Event::SelectMask(kind));
    }
    for ev in events {
        session.dispatch(ev);
    }

    if let Outcome::Alert(msg) = session.dispatch(Event::Process) {
        return Err(msg);
    }
    match session.result() {
        ResultView::Image(_) | ResultView::Archive(_) => {}
        ResultView::Failed => return Err("processing failed".to_string()),
        ResultView::Empty => return Err("no result".to_string()),
    }
    match session.dispatch(Event::SaveResult) {
        Outcome::Saved(path) => {
            if !quiet {
                eprintln!("[OK] {}", path.display());
            }
            Ok(())
        }
        Outcome::Alert(msg) => Err(msg),
        other => Err(format!("unexpected outcome {other:?}")),
    }
}

#[allow(clippy::too_many_arguments)]
fn paint(
    opts: &ClientOptions,
    image: &Path,
    rects: &[Rect],
    mask: &str,
    output: &Path,
    overlay: Option<&Path>,
    upload: bool,
    quiet: bool,
) -> Result<(), String> {
    let mut editor = MaskEditor::open(&MaskCatalog::default());
    editor.switch_tab(EditorTab::Create);
    editor.select_target_type(mask);
    editor.load_image(image).map_err(|e| e.to_string())?;

    for r in rects {
        if editor.painter_mut().drag_rect(*r).is_none() && !quiet {
            eprintln!("[SKIP] rect {r}: 5px or smaller after clamping to the image");
        }
    }

    if let Some(path) = overlay {
        if let Some(view) = editor.painter().render() {
            view.save(path).map_err(|e| e.to_string())?;
            if !quiet {
                eprintln!("[OK] overlay {}", path.display());
            }
        }
    }

    editor.finish_preview().map_err(|e| e.to_string())?;
    let saved = editor.download(output).map_err(|e| e.to_string())?;
    if !quiet {
        eprintln!("[OK] {}", saved.display());
    }

    if upload {
        let backend = backend(opts)?;
        editor
            .upload_painted(&backend)
            .map_err(|e| e.to_string())?;
        if !quiet {
            eprintln!("[OK] uploaded as {}", mask_filename(mask));
        }
    }
    Ok(())
}
