//! File-backed collaborators: page images, OCR word lists, candidate rosters.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use unredact::{
    Candidate, CandidateSource, EngineError, OcrEngine, PageRaster, Rasterizer,
    ReferenceObservation,
};

/// Serves an already-rasterized page image.
///
/// The image is taken to be at `native_ppi`; rendering at another resolution
/// resamples it.
#[derive(Debug, Clone, Copy)]
pub struct PageImageRasterizer {
    pub native_ppi: f32,
}

impl Rasterizer for PageImageRasterizer {
    fn render(
        &self,
        document: &Path,
        dpi: f32,
        page_index: usize,
    ) -> Result<PageRaster, EngineError> {
        if page_index != 0 {
            return Err(EngineError::collaborator(
                "rasterizer",
                format!(
                    "{} is a single-page image, no page {page_index}",
                    document.display()
                ),
            ));
        }
        let img = image::open(document)?;
        tracing::info!(
            "Loaded page {} ({}x{} at {} ppi)",
            document.display(),
            img.width(),
            img.height(),
            self.native_ppi
        );
        if (dpi - self.native_ppi).abs() < 1e-3 {
            return Ok(PageRaster::from_dynamic(&img, dpi));
        }
        let s = dpi / self.native_ppi;
        let w = ((img.width() as f32 * s).round() as u32).max(1);
        let h = ((img.height() as f32 * s).round() as u32).max(1);
        let resized = img.resize_exact(w, h, FilterType::CatmullRom);
        tracing::info!("Resampled page to {}x{} at {} ppi", w, h, dpi);
        Ok(PageRaster::from_dynamic(&resized, dpi))
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum WordFile {
    Bare(Vec<ReferenceObservation>),
    WithPpi {
        ppi: f32,
        words: Vec<ReferenceObservation>,
    },
}

/// OCR engine replaying a JSON word list produced by an external OCR run.
///
/// The file is either an array of words or `{ "ppi": N, "words": [...] }`;
/// with a `ppi`, boxes are rescaled to the page they are queried against.
#[derive(Debug, Clone)]
pub struct WordListOcr {
    words: Vec<ReferenceObservation>,
    ppi: Option<f32>,
}

impl WordListOcr {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            EngineError::collaborator("ocr", format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        Ok(match serde_json::from_str::<WordFile>(json)? {
            WordFile::Bare(words) => Self { words, ppi: None },
            WordFile::WithPpi { ppi, words } => Self {
                words,
                ppi: Some(ppi),
            },
        })
    }
}

fn scale_px(v: u32, s: f32) -> u32 {
    (v as f32 * s).round() as u32
}

impl OcrEngine for WordListOcr {
    fn detect_words(&self, page: &PageRaster) -> Result<Vec<ReferenceObservation>, EngineError> {
        let s = match self.ppi {
            Some(ppi) if ppi > 0.0 => page.ppi() / ppi,
            _ => return Ok(self.words.clone()),
        };
        Ok(self
            .words
            .iter()
            .map(|w| ReferenceObservation {
                x: scale_px(w.x, s),
                y: scale_px(w.y, s),
                width: scale_px(w.width, s),
                height: scale_px(w.height, s),
                ..w.clone()
            })
            .collect())
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RosterEntry {
    Name(String),
    Full(Candidate),
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum JsonRosterFile {
    List(Vec<RosterEntry>),
    Wrapped { candidates: Vec<RosterEntry> },
}

/// One row of a `name,confidence,notes` roster.
#[derive(serde::Deserialize)]
struct CsvRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    notes: Option<String>,
}

/// Candidate roster file, JSON or CSV by extension.
///
/// JSON entries are plain strings (confidence 0) or objects with
/// `text`/`name` and an optional `confidence`. CSV files carry a
/// `name,confidence,notes` header; rows with an empty name or a name starting
/// with `#` are skipped and an empty confidence counts as 0.
#[derive(Debug, Clone)]
pub struct FileRoster {
    pub path: PathBuf,
}

impl FileRoster {
    fn is_csv(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
    }
}

pub fn parse_roster(json: &str) -> Result<Vec<Candidate>, EngineError> {
    let entries = match serde_json::from_str::<JsonRosterFile>(json)? {
        JsonRosterFile::List(e) | JsonRosterFile::Wrapped { candidates: e } => e,
    };
    Ok(entries
        .into_iter()
        .map(|e| match e {
            RosterEntry::Name(text) => Candidate::new(text, 0.0),
            RosterEntry::Full(c) => c,
        })
        .collect())
}

pub fn parse_csv_roster(data: &str) -> Result<Vec<Candidate>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());
    let mut out = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(|e| EngineError::collaborator("roster", e))?;
        if row.name.is_empty() || row.name.starts_with('#') {
            continue;
        }
        let candidate = Candidate::new(row.name, row.confidence.unwrap_or(0.0));
        out.push(match row.notes.filter(|n| !n.is_empty()) {
            Some(notes) => candidate.with_notes(notes),
            None => candidate,
        });
    }
    Ok(out)
}

impl CandidateSource for FileRoster {
    fn candidates(&self) -> Result<Vec<Candidate>, EngineError> {
        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            EngineError::collaborator("roster", format!("{}: {e}", self.path.display()))
        })?;
        let candidates = if self.is_csv() {
            parse_csv_roster(&data)?
        } else {
            parse_roster(&data)?
        };
        tracing::info!(
            "Loaded {} candidates from {}",
            candidates.len(),
            self.path.display()
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_accepts_strings_and_objects() {
        let list = parse_roster(
            r#"["Jeffrey Epstein", {"name": "Nadia Marcinkova", "confidence": 8}]"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].text, "Jeffrey Epstein");
        assert_eq!(list[0].confidence(), 0.0);
        assert_eq!(list[1].text, "Nadia Marcinkova");
        assert_eq!(list[1].confidence(), 8.0);

        let wrapped = parse_roster(r#"{"candidates": [{"text": "A. Person"}]}"#).unwrap();
        assert_eq!(wrapped[0].text, "A. Person");
    }

    #[test]
    fn csv_roster_skips_comments_and_blank_names() {
        let data = "name,confidence,notes\n\
                    # suspects from the flight logs,,\n\
                    Nadia Marcinkova,8,pilot\n\
                    ,5,orphan row\n\
                    Jeffrey Epstein,,\n\
                    \"Doe, Jane\",3.5\n";
        let list = parse_csv_roster(data).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].text, "Nadia Marcinkova");
        assert_eq!(list[0].confidence(), 8.0);
        assert_eq!(list[0].notes.as_deref(), Some("pilot"));
        assert_eq!(list[1].text, "Jeffrey Epstein");
        assert_eq!(list[1].confidence(), 0.0);
        assert_eq!(list[1].notes, None);
        assert_eq!(list[2].text, "Doe, Jane");
        assert_eq!(list[2].confidence(), 3.5);
    }

    #[test]
    fn csv_roster_rejects_non_numeric_confidence() {
        let err = parse_csv_roster("name,confidence\nJane Doe,high\n").unwrap_err();
        assert!(matches!(err, EngineError::Collaborator { .. }));
    }

    #[test]
    fn roster_format_follows_extension() {
        let dir = std::env::temp_dir().join(format!("unredact-roster-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let csv_path = dir.join("candidates.CSV");
        std::fs::write(&csv_path, "name,confidence,notes\nJane Doe,7,\n").unwrap();
        let json_path = dir.join("candidates.json");
        std::fs::write(&json_path, r#"["John Roe"]"#).unwrap();

        let from_csv = FileRoster { path: csv_path }.candidates().unwrap();
        let from_json = FileRoster { path: json_path }.candidates().unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(from_csv[0].text, "Jane Doe");
        assert_eq!(from_csv[0].confidence(), 7.0);
        assert_eq!(from_json[0].text, "John Roe");
    }

    #[test]
    fn malformed_roster_is_a_json_error() {
        assert!(matches!(parse_roster("{"), Err(EngineError::Json(_))));
    }

    #[test]
    fn word_list_rescales_to_page_resolution() {
        let ocr = WordListOcr::from_json_str(
            r#"{"ppi": 150, "words": [
                {"text": "Company", "x": 10, "y": 20, "width": 100, "height": 15, "conf": 96}
            ]}"#,
        )
        .unwrap();
        let page = PageRaster::new(image::GrayImage::new(100, 100), 300.0);
        let words = ocr.detect_words(&page).unwrap();
        let w = &words[0];
        assert_eq!((w.x, w.y, w.width, w.height), (20, 40, 200, 30));
        assert_eq!(w.ocr_confidence, 96.0);
    }

    #[test]
    fn bare_word_list_is_used_as_is() {
        let ocr = WordListOcr::from_json_str(
            r#"[{"text": "agreement", "x": 5, "y": 6, "width": 70, "height": 12,
                 "ocr_confidence": 90}]"#,
        )
        .unwrap();
        let page = PageRaster::new(image::GrayImage::new(10, 10), 600.0);
        assert_eq!(ocr.detect_words(&page).unwrap()[0].width, 70);
    }

    #[test]
    fn image_rasterizer_rejects_later_pages() {
        let r = PageImageRasterizer { native_ppi: 300.0 };
        let err = r.render(Path::new("page.png"), 300.0, 2).unwrap_err();
        assert!(matches!(err, EngineError::Collaborator { .. }));
    }
}
