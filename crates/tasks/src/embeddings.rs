//! Text embedding matrices and the embeddings task
//!
//! The remote model returns one fixed-width `f32` vector per input text.
//! [`EmbeddingsMatrix`] stores them row-major and refuses ragged or
//! wrongly-sized rows, both when built and when decoded from a cache entry.

use crate::task::Task;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Task name for embedding requests
pub const EMBEDDINGS_TASK: &str = "embeddings";

/// Width of text-embedding-ada-002 vectors
pub const ADA_002_DIMENSION: usize = 1536;

/// Row-major matrix with one embedding per input text
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingsMatrix {
    dimension: usize,
    data: Vec<f32>,
}

impl EmbeddingsMatrix {
    /// Build a matrix from rows that must all be `dimension` wide
    pub fn from_rows(dimension: usize, rows: Vec<Vec<f32>>) -> Result<Self> {
        check_dimension(dimension)?;
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dimension {
                return Err(Error::shape(
                    EMBEDDINGS_TASK,
                    format!("row {i} has {} values, expected {dimension}", row.len()),
                ));
            }
            data.extend(row);
        }
        Ok(Self { dimension, data })
    }

    /// Build a matrix from row-major values
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        check_dimension(dimension)?;
        if data.len() % dimension != 0 {
            return Err(Error::shape(
                EMBEDDINGS_TASK,
                format!(
                    "{} values do not divide into rows of {dimension}",
                    data.len()
                ),
            ));
        }
        Ok(Self { dimension, data })
    }

    /// Number of rows (input texts)
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.len() / self.dimension
    }

    /// Width of each row
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Whether the matrix has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row `index`, if present
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dimension)?;
        self.data.get(start..start.checked_add(self.dimension)?)
    }

    /// Iterate over rows in input order
    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.dimension)
    }

    /// All values, row-major
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

fn check_dimension(dimension: usize) -> Result<()> {
    if dimension == 0 {
        return Err(Error::shape(EMBEDDINGS_TASK, "dimension must be positive"));
    }
    Ok(())
}

/// Wire form: `{ "dimension": n, "rows": [[...], ...] }`
#[derive(Serialize)]
struct MatrixRef<'a> {
    dimension: usize,
    rows: Vec<&'a [f32]>,
}

#[derive(Deserialize)]
struct MatrixOwned {
    dimension: usize,
    rows: Vec<Vec<f32>>,
}

impl Serialize for EmbeddingsMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        MatrixRef {
            dimension: self.dimension,
            rows: self.iter_rows().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EmbeddingsMatrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = MatrixOwned::deserialize(deserializer)?;
        Self::from_rows(raw.dimension, raw.rows).map_err(serde::de::Error::custom)
    }
}

/// Embeddings task over a remote client
///
/// The client returns one vector per text; the task checks the count and the
/// width before handing back an [`EmbeddingsMatrix`]. Tasks for a width other
/// than [`ADA_002_DIMENSION`] are named `embeddings-{width}`, so entries of
/// different widths never share a cache key.
pub struct EmbeddingsTask<F> {
    client: F,
    dimension: usize,
    name: String,
}

impl<F> EmbeddingsTask<F> {
    /// Task for text-embedding-ada-002 sized vectors
    pub fn new(client: F) -> Self {
        Self::with_dimension(client, ADA_002_DIMENSION)
    }

    /// Task for a model with a different vector width
    pub fn with_dimension(client: F, dimension: usize) -> Self {
        let name = if dimension == ADA_002_DIMENSION {
            EMBEDDINGS_TASK.to_string()
        } else {
            format!("{EMBEDDINGS_TASK}-{dimension}")
        };
        Self {
            client,
            dimension,
            name,
        }
    }

    /// Width every returned vector must have
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width == self.dimension {
            Ok(())
        } else {
            Err(Error::shape(
                &self.name,
                format!("got {width}-wide embeddings, expected {}", self.dimension),
            ))
        }
    }
}

impl<F, E> EmbeddingsTask<F>
where
    F: Fn(&[String]) -> std::result::Result<Vec<Vec<f32>>, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    /// Embed a single text, bypassing any cache
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        tracing::debug!(task = %self.name, "Querying embeddings endpoint for one text");
        let rows = (self.client)(&[text.to_string()]).map_err(|e| Error::remote(&self.name, e))?;
        let [row] = <[Vec<f32>; 1]>::try_from(rows).map_err(|rows| {
            Error::shape(&self.name, format!("{} embeddings for 1 text", rows.len()))
        })?;
        self.check_width(row.len())?;
        Ok(row)
    }
}

impl<F> std::fmt::Debug for EmbeddingsTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingsTask")
            .field("name", &self.name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl<F, E> Task for EmbeddingsTask<F>
where
    F: Fn(&[String]) -> std::result::Result<Vec<Vec<f32>>, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Output = EmbeddingsMatrix;
    type Error = Error;

    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, texts: &[String]) -> Result<EmbeddingsMatrix> {
        tracing::info!(task = %self.name, texts = texts.len(), "Querying embeddings endpoint");
        let rows = (self.client)(texts).map_err(|e| Error::remote(&self.name, e))?;
        if rows.len() != texts.len() {
            return Err(Error::shape(
                &self.name,
                format!("{} embeddings for {} texts", rows.len(), texts.len()),
            ));
        }
        let matrix = EmbeddingsMatrix::from_rows(self.dimension, rows)?;
        self.check_output(texts, &matrix)?;
        Ok(matrix)
    }

    fn check_output(&self, texts: &[String], output: &EmbeddingsMatrix) -> Result<()> {
        self.check_width(output.dimension())?;
        if output.rows() != texts.len() {
            return Err(Error::shape(
                &self.name,
                format!("{} embeddings for {} texts", output.rows(), texts.len()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_from_rows() {
        let m = EmbeddingsMatrix::from_rows(3, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
            .unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.dimension(), 3);
        assert_eq!(m.row(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(m.row(2), None);
        assert_eq!(m.as_slice().len(), 6);
        assert_eq!(m.iter_rows().count(), 2);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = EmbeddingsMatrix::from_rows(3, vec![vec![1.0, 2.0, 3.0], vec![4.0]]).unwrap_err();
        assert!(err.to_string().contains("row 1 has 1 values, expected 3"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(EmbeddingsMatrix::from_rows(0, vec![]).is_err());
        assert!(EmbeddingsMatrix::from_flat(0, vec![]).is_err());
    }

    #[test]
    fn test_from_flat() {
        let m = EmbeddingsMatrix::from_flat(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m.rows(), 2);
        assert!(EmbeddingsMatrix::from_flat(2, vec![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_empty_matrix_keeps_dimension() {
        let m = EmbeddingsMatrix::from_rows(ADA_002_DIMENSION, vec![]).unwrap();
        assert!(m.is_empty());
        let json = serde_json::to_string(&m).unwrap();
        let back: EmbeddingsMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dimension(), ADA_002_DIMENSION);
        assert_eq!(back.rows(), 0);
    }

    #[test]
    fn test_serialized_form() {
        let m = EmbeddingsMatrix::from_rows(2, vec![vec![0.5, -1.0]]).unwrap();
        assert_eq!(
            serde_json::to_string(&m).unwrap(),
            r#"{"dimension":2,"rows":[[0.5,-1.0]]}"#
        );
    }

    #[test]
    fn test_deserialize_rejects_wrong_width() {
        let err = serde_json::from_str::<EmbeddingsMatrix>(r#"{"dimension":2,"rows":[[1.0]]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn test_msgpack_round_trip_is_bit_exact() {
        let m = EmbeddingsMatrix::from_rows(
            3,
            vec![vec![0.1, f32::MIN_POSITIVE, -0.0], vec![1.0e-40, 3.0, f32::MAX]],
        )
        .unwrap();
        let bytes = rmp_serde::to_vec_named(&m).unwrap();
        let back: EmbeddingsMatrix = rmp_serde::from_slice(&bytes).unwrap();
        let bits = |m: &EmbeddingsMatrix| m.as_slice().iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back), bits(&m));
    }

    #[test]
    fn test_task_validates_row_count() {
        let task = EmbeddingsTask::with_dimension(
            |_: &[String]| Ok::<_, std::io::Error>(vec![vec![0.0f32, 1.0]]),
            2,
        );
        let err = task.compute(&texts(&["a", "b"])).unwrap_err();
        assert!(matches!(err, Error::Shape { .. }));
    }

    #[test]
    fn test_task_wraps_client_error() {
        let task = EmbeddingsTask::new(|_: &[String]| {
            Err::<Vec<Vec<f32>>, _>(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
        });
        let err = task.compute(&texts(&["a"])).unwrap_err();
        assert!(matches!(err, Error::Remote { ref task, .. } if task == EMBEDDINGS_TASK));
    }

    #[test]
    fn test_task_builds_matrix() {
        let task = EmbeddingsTask::with_dimension(
            |texts: &[String]| {
                Ok::<_, std::io::Error>(
                    texts
                        .iter()
                        .map(|t| vec![t.len() as f32, 0.0])
                        .collect::<Vec<_>>(),
                )
            },
            2,
        );
        assert_eq!(task.name(), "embeddings-2");
        let m = task.compute(&texts(&["a", "bcd"])).unwrap();
        assert_eq!(m.row(1), Some(&[3.0, 0.0][..]));
    }

    #[test]
    fn test_default_width_keeps_plain_name() {
        let task =
            EmbeddingsTask::new(|_: &[String]| Ok::<_, std::io::Error>(Vec::<Vec<f32>>::new()));
        assert_eq!(task.name(), EMBEDDINGS_TASK);
        assert_eq!(task.dimension(), ADA_002_DIMENSION);
    }

    #[test]
    fn test_check_output_rejects_other_width() {
        let task = EmbeddingsTask::with_dimension(
            |_: &[String]| Ok::<_, std::io::Error>(Vec::<Vec<f32>>::new()),
            2,
        );
        let wide = EmbeddingsMatrix::from_rows(4, vec![vec![0.0; 4]]).unwrap();
        let err = task.check_output(&texts(&["a"]), &wide).unwrap_err();
        assert!(err.to_string().contains("got 4-wide embeddings, expected 2"));

        let narrow = EmbeddingsMatrix::from_rows(2, vec![vec![0.0; 2]]).unwrap();
        assert!(task.check_output(&texts(&["a"]), &narrow).is_ok());
        assert!(task.check_output(&texts(&["a", "b"]), &narrow).is_err());
    }

    #[test]
    fn test_embed_one() {
        let task = EmbeddingsTask::new(|texts: &[String]| {
            Ok::<_, std::io::Error>(vec![vec![0.25f32; ADA_002_DIMENSION]; texts.len()])
        });
        let vector = task.embed_one("hello").unwrap();
        assert_eq!(vector.len(), ADA_002_DIMENSION);
        assert_eq!(vector[0], 0.25);
    }

    #[test]
    fn test_embed_one_checks_width() {
        let task = EmbeddingsTask::new(|_: &[String]| {
            Ok::<_, std::io::Error>(vec![vec![1.0f32, 2.0, 3.0]])
        });
        let err = task.embed_one("hello").unwrap_err();
        assert!(matches!(err, Error::Shape { .. }));
        assert!(err.to_string().contains("expected 1536"));
    }

    #[test]
    fn test_embed_one_checks_count() {
        let task = EmbeddingsTask::with_dimension(
            |_: &[String]| Ok::<_, std::io::Error>(vec![vec![1.0f32], vec![2.0]]),
            1,
        );
        let err = task.embed_one("hello").unwrap_err();
        assert!(err.to_string().contains("2 embeddings for 1 text"));
    }
}
