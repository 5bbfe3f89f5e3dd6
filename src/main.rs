// src/main.rs
use clap::Parser;
use sds_extractor::config::ExtractionConfig;
use sds_extractor::lines::ocr::{DisabledOcr, HttpOcrClient, OcrEngine};
use sds_extractor::pipeline;
use sds_extractor::storage::StorageManager;
use sds_extractor::utils::{self, debug_dump, AppError};
use std::path::{Path, PathBuf};

/// Command Line Interface for the safety data sheet extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PDF safety data sheets to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory for extracted content
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// URL of the OCR service used for scanned documents (optional)
    #[arg(long)]
    ocr_endpoint: Option<String>,

    /// Maximum number of pages sent to OCR (overrides SDS_OCR_MAX_PAGES)
    #[arg(long)]
    ocr_max_pages: Option<usize>,

    /// Debug mode - save an annotated HTML dump of the section tree
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var, --debug raises the default level)
    utils::logging::setup_logging(args.debug);
    tracing::info!("Starting processing for args: {:?}", args);

    // 3. Configuration: defaults, then environment, then command line
    let mut config = ExtractionConfig::from_env();
    if let Some(pages) = args.ocr_max_pages {
        tracing::debug!("Setting OCR page cap to {} from command-line argument", pages);
        config.ocr_max_pages = pages;
    }
    if config.ocr_max_pages == 0 {
        return Err(AppError::Config("OCR page cap must be at least 1".to_string()));
    }

    // 4. OCR engine
    let ocr: Box<dyn OcrEngine> = match &args.ocr_endpoint {
        Some(endpoint) => Box::new(
            HttpOcrClient::new(endpoint.as_str(), config.ocr_timeout)
                .map_err(|e| AppError::Config(e.to_string()))?,
        ),
        None => {
            tracing::info!("No OCR endpoint given, scanned documents will fail");
            Box::new(DisabledOcr)
        }
    };

    // 5. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;

    // 6. Process each file
    let mut success_count = 0;
    let mut failure_count = 0;

    for file in &args.files {
        tracing::info!("Processing {}", file.display());
        match process_file(file, &config, ocr.as_ref(), &storage, args.debug).await {
            Ok(()) => success_count += 1,
            Err(e) => {
                tracing::error!("Failed to process {}: {}", file.display(), e);
                failure_count += 1;

                if args.debug {
                    let failure_info_path = storage.path_for(&file_stem(file), "_failure.txt");
                    let failure_info = format!("Failed to extract {}: {}\n", file.display(), e);
                    if let Err(e) = std::fs::write(&failure_info_path, failure_info) {
                        tracing::error!("Failed to save failure info: {}", e);
                    }
                }
            }
        }
    }

    tracing::info!("Processing finished. Success: {}, Failures: {}", success_count, failure_count);

    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!("Failed to extract any data from {} files", failure_count)));
    }

    Ok(())
}

async fn process_file(
    file: &Path,
    config: &ExtractionConfig,
    ocr: &dyn OcrEngine,
    storage: &StorageManager,
    debug: bool,
) -> Result<(), AppError> {
    let run = pipeline::run_detailed(file, config, ocr).await?;
    let stem = file_stem(file);

    let path = storage.save_result(&stem, &run.output)?;
    tracing::info!("Saved extracted data to: {}", path.display());

    let sections: Vec<u32> = run.tree.keys().copied().collect();
    let source_file = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    match storage.save_metadata(&stem, &source_file, run.line_count, &sections, run.output.from_image) {
        Ok(path) => tracing::info!("Saved run metadata to: {}", path.display()),
        Err(e) => tracing::error!("Failed to save run metadata: {}", e),
    }

    if debug {
        let dump_path = storage.path_for(&stem, "_tree.html");
        if let Err(e) = debug_dump::create_tree_dump(&run.tree, &dump_path, &debug_dump::DEFAULT_PATTERNS) {
            tracing::warn!("Failed to create tree dump: {}", e);
        }
    }

    Ok(())
}

fn file_stem(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
