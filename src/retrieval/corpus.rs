//! Startup loading of the precomputed corpus: an `N × D` `.npy` embedding
//! matrix plus a headered CSV whose row `i` describes matrix row `i`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use ndarray::Array2;

use super::document::Document;
use super::error::{CorpusError, IndexError};
use super::index::VectorIndex;
use super::npy;
use crate::core::config::{AppPaths, ColumnSettings, RetrievalSettings};

pub fn load_corpus(paths: &AppPaths, settings: &RetrievalSettings) -> Result<VectorIndex, CorpusError> {
    let embeddings_path = paths.resolve(&settings.embeddings_path);
    let metadata_path = paths.resolve(&settings.metadata_path);
    load_corpus_files(&embeddings_path, &metadata_path, settings)
}

pub fn load_corpus_files(
    embeddings_path: &Path,
    metadata_path: &Path,
    settings: &RetrievalSettings,
) -> Result<VectorIndex, CorpusError> {
    let vectors = load_embeddings(embeddings_path)?;
    if vectors.ncols() != settings.dimension {
        return Err(IndexError::DimensionMismatch {
            subject: "embedding matrix columns",
            expected: settings.dimension,
            actual: vectors.ncols(),
        }
        .into());
    }

    let documents = load_documents(metadata_path, &settings.columns)?;
    let index = VectorIndex::build(vectors, documents)?;

    tracing::info!(
        documents = index.len(),
        dimension = index.dimension(),
        "Loaded corpus from {} and {}",
        embeddings_path.display(),
        metadata_path.display()
    );
    Ok(index)
}

pub fn load_embeddings(path: &Path) -> Result<Array2<f32>, CorpusError> {
    let file = File::open(path).map_err(|source| CorpusError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let matrix = npy::read_matrix(BufReader::new(file)).map_err(|message| CorpusError::Npy {
        path: path.display().to_string(),
        message,
    })?;

    if let Some(row) = matrix
        .rows()
        .into_iter()
        .position(|row| row.iter().any(|value| !value.is_finite()))
    {
        return Err(CorpusError::NonFinite {
            path: path.display().to_string(),
            row,
        });
    }
    Ok(matrix)
}

pub fn load_documents(path: &Path, columns: &ColumnSettings) -> Result<Vec<Document>, CorpusError> {
    let file = File::open(path).map_err(|source| CorpusError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_documents(BufReader::new(file), columns, &path.display().to_string())
}

/// Parses metadata rows in file order. `label` names the source in errors.
pub fn read_documents<R: Read>(
    reader: R,
    columns: &ColumnSettings,
    label: &str,
) -> Result<Vec<Document>, CorpusError> {
    let csv_error = |source| CorpusError::Csv {
        path: label.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);
    let headers = reader.headers().map_err(csv_error)?.clone();
    let find = |name: &str| headers.iter().position(|header| header == name);

    let content_idx = find(columns.content.as_str()).ok_or_else(|| CorpusError::MissingColumn {
        path: label.to_string(),
        column: columns.content.clone(),
    })?;
    let optional = |column: &Option<String>| column.as_deref().and_then(find);
    let title_idx = optional(&columns.title);
    let category_idx = optional(&columns.category);
    let score_idx = optional(&columns.score);
    let price_idx = optional(&columns.price);

    let mapped = [Some(content_idx), title_idx, category_idx, score_idx, price_idx];
    let extra_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, name)| !mapped.contains(&Some(*idx)) && is_named_column(name))
        .map(|(idx, name)| (idx, name.to_string()))
        .collect();

    let mut documents = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        let text = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let mut extra = BTreeMap::new();
        for (idx, name) in &extra_columns {
            if let Some(value) = text(Some(*idx)) {
                extra.insert(name.clone(), value);
            }
        }

        documents.push(Document {
            position,
            content: record.get(content_idx).unwrap_or_default().to_string(),
            title: text(title_idx),
            category: text(category_idx),
            score: text(score_idx),
            price: text(price_idx),
            extra,
        });
    }

    Ok(documents)
}

/// pandas writes its row index as an unnamed (or "Unnamed: 0") column.
fn is_named_column(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && !name.starts_with("Unnamed:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const WINES: &str = "\
,country,description,points,price,title,variety
0,US,\"Blackberry and cassis, firm tannins.\",91,45.0,Ridge 2019 Cabernet Sauvignon,Cabernet Sauvignon
1,France,Crisp green apple and flint.,88,,Domaine Laroche 2021 Chablis,Chardonnay
2,US,Bright cherry and forest floor.,90,  ,Cristom 2020 Pinot Noir,Pinot Noir
";

    fn settings(dimension: usize) -> RetrievalSettings {
        RetrievalSettings {
            dimension,
            ..RetrievalSettings::default()
        }
    }

    fn write_fixture(dir: &Path, matrix: &Array2<f32>, csv: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let npy_path = dir.join("wine_embeddings.npy");
        let csv_path = dir.join("wine_metadata.csv");
        npy::write_matrix(File::create(&npy_path).unwrap(), matrix).unwrap();
        std::fs::write(&csv_path, csv).unwrap();
        (npy_path, csv_path)
    }

    #[test]
    fn maps_wine_columns_onto_documents() {
        let docs = read_documents(WINES.as_bytes(), &ColumnSettings::default(), "wines").unwrap();
        assert_eq!(docs.len(), 3);

        let cab = &docs[0];
        assert_eq!(cab.position, 0);
        assert_eq!(cab.content, "Blackberry and cassis, firm tannins.");
        assert_eq!(cab.title.as_deref(), Some("Ridge 2019 Cabernet Sauvignon"));
        assert_eq!(cab.category.as_deref(), Some("US"));
        assert_eq!(cab.score.as_deref(), Some("91"));
        assert_eq!(cab.price.as_deref(), Some("45.0"));
        assert_eq!(cab.extra.get("variety").map(String::as_str), Some("Cabernet Sauvignon"));
        assert!(!cab.extra.contains_key(""));

        assert_eq!(docs[1].price, None);
        assert_eq!(docs[2].price, None, "blank cells are treated as missing");
    }

    #[test]
    fn score_and_price_keep_their_cell_text() {
        let csv = "\
country,description,points,price,title
US,Plush.,91,45.50,Ridge
FR,Crisp.,88,\"1,200\",Petrus
";
        let docs = read_documents(csv.as_bytes(), &ColumnSettings::default(), "wines").unwrap();
        assert_eq!(docs[0].price.as_deref(), Some("45.50"));
        assert_eq!(docs[1].price.as_deref(), Some("1,200"));
        assert_eq!(docs[1].score.as_deref(), Some("88"));
    }

    #[test]
    fn missing_content_column_is_reported() {
        let columns = ColumnSettings {
            content: "tasting_notes".to_string(),
            ..ColumnSettings::default()
        };
        let err = read_documents(WINES.as_bytes(), &columns, "wines").unwrap_err();
        assert!(matches!(err, CorpusError::MissingColumn { ref column, .. } if column == "tasting_notes"));
    }

    #[test]
    fn loads_matching_files_in_row_order() {
        let dir = tempfile::tempdir().unwrap();
        let matrix = array![[1.0f32, 0.0], [0.0, 1.0], [0.9, 0.2]];
        let (npy_path, csv_path) = write_fixture(dir.path(), &matrix, WINES);

        let index = load_corpus_files(&npy_path, &csv_path, &settings(2)).unwrap();
        assert_eq!(index.len(), 3);
        for (position, doc) in index.documents().iter().enumerate() {
            assert_eq!(doc.position, position);
            assert_eq!(index.embedding(position).unwrap(), matrix.row(position));
        }
        assert_eq!(index.documents()[1].title.as_deref(), Some("Domaine Laroche 2021 Chablis"));
    }

    #[test]
    fn row_count_drift_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let matrix = array![[1.0f32, 0.0], [0.0, 1.0]];
        let (npy_path, csv_path) = write_fixture(dir.path(), &matrix, WINES);

        let err = load_corpus_files(&npy_path, &csv_path, &settings(2)).unwrap_err();
        assert!(matches!(
            err,
            CorpusError::Index(IndexError::DimensionMismatch {
                subject: "metadata rows",
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn configured_dimension_must_match_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let matrix = array![[1.0f32, 0.0], [0.0, 1.0], [0.5, 0.5]];
        let (npy_path, csv_path) = write_fixture(dir.path(), &matrix, WINES);

        let err = load_corpus_files(&npy_path, &csv_path, &settings(384)).unwrap_err();
        assert!(err.to_string().contains("expected 384, got 2"));
    }

    #[test]
    fn non_finite_rows_are_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let matrix = array![[1.0f32, 0.0], [-f32::NAN, 0.0], [0.5, f32::INFINITY]];
        let (npy_path, csv_path) = write_fixture(dir.path(), &matrix, WINES);

        let err = load_corpus_files(&npy_path, &csv_path, &settings(2)).unwrap_err();
        assert!(matches!(err, CorpusError::NonFinite { row: 1, .. }));
    }

    #[test]
    fn missing_embedding_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_embeddings(&dir.path().join("absent.npy")).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
    }

    #[test]
    fn header_only_metadata_and_empty_matrix_give_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let matrix = Array2::<f32>::zeros((0, 4));
        let (npy_path, csv_path) =
            write_fixture(dir.path(), &matrix, "description,title\n");

        let index = load_corpus_files(&npy_path, &csv_path, &settings(4)).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 4);
    }
}
