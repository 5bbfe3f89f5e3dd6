// src/pipeline.rs
use crate::config::ExtractionConfig;
use crate::extractors::{self, RuleContext};
use crate::lines::{self, ocr::OcrEngine, ExtractedLines};
use crate::models::{ExtractionOutput, FdsTree, PageDimension};
use crate::tree::{self, CleanOptions};
use crate::utils::error::ExtractError;
use std::path::Path;

/// Result of one document run, with the intermediate state the CLI reports
/// on and dumps in debug mode.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub output: ExtractionOutput,
    pub tree: FdsTree,
    pub line_count: usize,
    pub page_dimension: PageDimension,
}

/// Extracts the structured data of one safety data sheet.
pub async fn run(path: &Path, config: &ExtractionConfig, ocr: &dyn OcrEngine) -> Result<ExtractionOutput, ExtractError> {
    Ok(run_detailed(path, config, ocr).await?.output)
}

/// Same as [`run`], keeping the cleaned tree and the line count.
pub async fn run_detailed(
    path: &Path,
    config: &ExtractionConfig,
    ocr: &dyn OcrEngine,
) -> Result<PipelineRun, ExtractError> {
    let extracted = lines::extract_lines(path, config, ocr).await?;
    Ok(process_lines(extracted, config))
}

/// Builder, cleaner and rules over already extracted lines. Never fails:
/// a sheet with no recognizable structure gives an empty result.
pub fn process_lines(extracted: ExtractedLines, config: &ExtractionConfig) -> PipelineRun {
    let ExtractedLines { lines, strokes, page_dimension, from_image } = extracted;
    let line_count = lines.len();

    let built = tree::build_tree(lines, &strokes);

    let cleaned = tree::clean(
        built.fds_tree,
        &CleanOptions {
            x_counts: &built.x_counts,
            from_image,
            stroke_max_proportion: config.stroke_max_proportion,
            column_tolerance: config.column_tolerance,
        },
    );
    tracing::debug!("Sections after cleaning: {:?}", cleaned.keys().collect::<Vec<_>>());

    let data_extracted = extractors::apply(&RuleContext {
        tree: &cleaned,
        full_text: &built.full_text,
        page_dimension: &page_dimension,
        column_tolerance: config.column_tolerance,
    });

    PipelineRun {
        output: ExtractionOutput { data_extracted, from_image },
        tree: cleaned,
        line_count,
        page_dimension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::fixtures::write_pdf;
    use crate::lines::ocr::DisabledOcr;
    use crate::models::{ExtractedData, Line, PhysicalState, Position, Text, WarningNotice};
    use crate::utils::error::OcrError;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn sheet_pdf(dir: &Path) -> std::path::PathBuf {
        write_pdf(
            dir,
            "sheet.pdf",
            &[vec![
                (50, 800, "FICHE DE DONNEES DE SECURITE"),
                (50, 785, "Date de revision : 12/03/2021"),
                (50, 760, "RUBRIQUE 1: Identification du melange et de la societe"),
                (50, 745, "1.1 Identificateur de produit"),
                (50, 730, "DEGRAISSANT X200"),
                (50, 715, "1.3 Renseignements concernant le fournisseur"),
                (50, 700, "ACME Chimie SAS"),
                (50, 685, "12 rue des Lilas 69000 Lyon"),
                (50, 660, "RUBRIQUE 2: Identification des dangers"),
                (50, 645, "2.2 Elements d'etiquetage"),
                (50, 630, "Mention d'avertissement : Danger"),
                (50, 615, "H225 Liquide et vapeurs tres inflammables."),
                (50, 600, "P210 Tenir a l'ecart de la chaleur."),
                (50, 575, "RUBRIQUE 3: Composition/informations sur les composants"),
                (50, 560, "3.2 Melanges"),
                (50, 545, "Nom"),
                (150, 545, "N CAS"),
                (230, 545, "N CE"),
                (320, 545, "%"),
                (400, 545, "Classification"),
                (50, 530, "Acetone"),
                (150, 530, "67-64-1"),
                (230, 530, "200-662-2"),
                (320, 530, "25 - 50 %"),
                (400, 530, "H225, H319"),
                (400, 515, "H336"),
                (50, 500, "Ethanol"),
                (150, 500, "64-17-5"),
                (230, 500, "200-578-6"),
                (320, 500, "< 10 %"),
                (400, 500, "H225"),
                (50, 475, "RUBRIQUE 9: Proprietes physiques et chimiques"),
                (50, 460, "9.1 Informations sur les proprietes physiques"),
                (50, 445, "Etat physique : Liquide"),
            ]],
        )
    }

    #[test]
    fn test_native_sheet_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = sheet_pdf(dir.path());

        let run = tokio_test::block_on(run_detailed(&path, &ExtractionConfig::default(), &DisabledOcr)).unwrap();
        let data = &run.output.data_extracted;

        assert!(!run.output.from_image);
        assert_eq!(run.line_count, 22);
        assert_eq!(run.tree.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 9]);

        let product = data.product.as_ref().unwrap();
        let product_line = &run.tree[&1].subsections[&1].lines[0];
        assert_eq!(product.value, product_line.clean_text());
        assert_eq!(product.value, "DEGRAISSANT X200");
        assert_eq!(product.metadata, product_line.metadata());

        assert_eq!(data.producer.as_ref().unwrap().value, "ACME Chimie SAS");
        assert_eq!(data.date.as_ref().unwrap().value, NaiveDate::from_ymd_opt(2021, 3, 12).unwrap());
        assert_eq!(data.warning_notice.as_ref().unwrap().value, WarningNotice::Danger);
        assert!(data.dangers.iter().any(|d| d.value == "H225"));
        assert_eq!(data.physical_state.as_ref().unwrap().value, PhysicalState::Liquid);

        let substances: Vec<(&str, &str, &str, Vec<&str>)> = data
            .substances
            .iter()
            .map(|s| {
                (
                    s.cas.as_ref().unwrap().value.as_str(),
                    s.ce.as_ref().unwrap().value.as_str(),
                    s.concentration.as_ref().unwrap().value.as_str(),
                    s.dangers.iter().map(|d| d.value.as_str()).collect(),
                )
            })
            .collect();
        assert_eq!(
            substances,
            vec![
                ("67-64-1", "200-662-2", "25 - 50 %", vec!["H225", "H319", "H336"]),
                ("64-17-5", "200-578-6", "< 10 %", vec!["H225"]),
            ]
        );
    }

    #[test]
    fn test_runs_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = sheet_pdf(dir.path());
        let config = ExtractionConfig::default();

        let first = tokio_test::block_on(run(&path, &config, &DisabledOcr)).unwrap();
        let second = tokio_test::block_on(run(&path, &config, &DisabledOcr)).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_sheet_without_sections_gives_empty_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(
            dir.path(),
            "letter.pdf",
            &[vec![(50, 800, "Madame, Monsieur, veuillez trouver ci-joint notre catalogue 2024 complet.")]],
        );

        let output = tokio_test::block_on(run(&path, &ExtractionConfig::default(), &DisabledOcr)).unwrap();

        assert!(!output.from_image);
        assert_eq!(output.data_extracted, ExtractedData::default());
    }

    struct ScannedSheetOcr;

    #[async_trait]
    impl OcrEngine for ScannedSheetOcr {
        async fn recognize(&self, _path: &Path, _max_pages: usize) -> Result<Vec<Line>, OcrError> {
            let lines = ["RUBRIQUE 1 : Identification", "1.l Identificateur de produit", "Nom du produit : SOLVANT 45"];
            Ok(lines
                .iter()
                .enumerate()
                .filter_map(|(i, text)| {
                    let position = Position { page_number: 1, x_proportion: 0.1, y_proportion: 0.1 + i as f64 * 0.02 };
                    Line::new(vec![Text::new(position, *text)], None)
                })
                .collect())
        }
    }

    #[test]
    fn test_scanned_sheet_goes_through_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "scan.pdf", &[Vec::new()]);

        let output = tokio_test::block_on(run(&path, &ExtractionConfig::default(), &ScannedSheetOcr)).unwrap();

        assert!(output.from_image);
        assert_eq!(output.data_extracted.product.unwrap().value, "SOLVANT 45");
    }

    #[test]
    fn test_scanned_sheet_without_ocr_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "scan.pdf", &[Vec::new()]);

        let result = tokio_test::block_on(run(&path, &ExtractionConfig::default(), &DisabledOcr));

        assert!(matches!(result, Err(ExtractError::Ocr(OcrError::Failure(_)))));
    }
}
