//! Dataset types for muestra.
//!
//! Provides the [`Dataset`] trait and the [`ArrowDataset`] implementation
//! that every split operates on. Rows are addressed by their 0-based global
//! position across batches; splits are expressed as vectors of those
//! positions and materialized with [`ArrowDataset::take`].

use std::{
    io::{Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};

use arrow::{
    array::{Array, ArrayRef, RecordBatch, UInt64Array},
    datatypes::{Field, Schema, SchemaRef},
};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    file::properties::WriterProperties,
};

use crate::error::{Error, Result};

/// A dataset that can be iterated over.
///
/// Datasets provide access to tabular data stored as Arrow RecordBatches.
/// All implementations must be thread-safe (Send + Sync).
pub trait Dataset: Send + Sync {
    /// Returns the total number of rows in the dataset.
    fn len(&self) -> usize;

    /// Returns true if the dataset contains no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the schema of the dataset.
    fn schema(&self) -> SchemaRef;

    /// Returns an iterator over all RecordBatches in the dataset.
    fn iter(&self) -> Box<dyn Iterator<Item = RecordBatch> + Send + '_>;

    /// Returns the number of batches in the dataset.
    fn num_batches(&self) -> usize;

    /// Returns a specific batch by index.
    fn get_batch(&self, index: usize) -> Option<&RecordBatch>;
}

/// An in-memory dataset backed by Arrow RecordBatches.
///
/// # Example
///
/// ```no_run
/// use muestra::{ArrowDataset, Dataset};
///
/// let housing = ArrowDataset::from_csv("datasets/housing/housing.csv").unwrap();
/// println!("Dataset has {} rows", housing.len());
/// ```
#[derive(Debug, Clone)]
pub struct ArrowDataset {
    batches: Vec<RecordBatch>,
    schema: SchemaRef,
    row_count: usize,
}

impl ArrowDataset {
    /// Creates a new ArrowDataset from a vector of RecordBatches.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The batches vector is empty
    /// - The batches have inconsistent schemas
    pub fn new(batches: Vec<RecordBatch>) -> Result<Self> {
        let Some(first) = batches.first() else {
            return Err(Error::EmptyDataset);
        };
        let schema = first.schema();

        for (i, batch) in batches.iter().enumerate().skip(1) {
            if batch.schema() != schema {
                return Err(Error::schema_mismatch(format!(
                    "Batch {} has different schema than batch 0",
                    i
                )));
            }
        }

        let row_count = batches.iter().map(|b| b.num_rows()).sum();

        Ok(Self {
            batches,
            schema,
            row_count,
        })
    }

    /// Creates an ArrowDataset from a single RecordBatch.
    ///
    /// A batch with zero rows is accepted; it yields an empty dataset that
    /// still carries its schema.
    ///
    /// # Errors
    ///
    /// Never fails for a single batch; the signature matches [`Self::new`].
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        Self::new(vec![batch])
    }

    /// Builds a dataset from reader output, keeping `schema` when the
    /// source held a header but no rows.
    fn from_read(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        if batches.is_empty() {
            return Self::from_batch(RecordBatch::new_empty(schema));
        }
        Self::new(batches)
    }

    /// Loads a dataset from a Parquet file.
    ///
    /// A file without row groups yields an empty dataset with its schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not valid Parquet.
    pub fn from_parquet(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(e, path))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let batches = builder
            .build()?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Self::from_read(schema, batches)
    }

    /// Saves the dataset to a Parquet file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    pub fn to_parquet(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(e, path))?;

        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(file, self.schema.clone(), Some(props))?;
        for batch in &self.batches {
            writer.write(batch)?;
        }
        writer.close()?;
        Ok(())
    }

    /// Loads a dataset from a CSV file with a header row.
    ///
    /// A header without data rows yields an empty dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not valid CSV.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_csv_with_options(path, &CsvOptions::default())
    }

    /// Loads a dataset from a CSV file with options.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    pub fn from_csv_with_options(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(e, path))?;
        read_csv(std::io::BufReader::new(file), options)
    }

    /// Loads a dataset from a CSV string with a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid CSV.
    pub fn from_csv_str(data: &str) -> Result<Self> {
        read_csv(std::io::Cursor::new(data.as_bytes()), &CsvOptions::default())
    }

    /// Saves the dataset to a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(e, path))?;

        let mut writer = arrow_csv::WriterBuilder::new().with_header(true).build(file);
        for batch in &self.batches {
            writer.write(batch)?;
        }
        Ok(())
    }

    /// Loads a dataset from a JSON Lines (JSONL) file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        use std::io::BufReader;

        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(e, path))?;
        let mut reader = BufReader::new(file);

        let (inferred, _) =
            arrow_json::reader::infer_json_schema(&mut reader, Some(SCHEMA_INFER_ROWS))?;
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io(e, path))?;

        let schema = Arc::new(inferred);
        let batches = arrow_json::ReaderBuilder::new(schema.clone())
            .with_batch_size(DEFAULT_BATCH_SIZE)
            .build(reader)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Self::from_read(schema, batches)
    }

    /// Saves the dataset to a JSON Lines (JSONL) file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    pub fn to_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(e, path))?;

        let mut writer = arrow_json::LineDelimitedWriter::new(std::io::BufWriter::new(file));
        for batch in &self.batches {
            writer.write(batch)?;
        }
        writer.finish()?;
        Ok(())
    }

    /// Returns the underlying batches.
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Returns the position of a field in the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] if no field has that name.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.schema
            .index_of(name)
            .map_err(|_| Error::missing_field(name))
    }

    /// Returns a whole column as one array spanning every batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] if the column does not exist.
    pub fn column(&self, name: &str) -> Result<ArrayRef> {
        let idx = self.column_index(name)?;

        if let [batch] = self.batches.as_slice() {
            return Ok(Arc::clone(batch.column(idx)));
        }

        let parts: Vec<&dyn Array> = self
            .batches
            .iter()
            .map(|b| b.column(idx).as_ref())
            .collect();
        arrow::compute::concat(&parts).map_err(Error::Arrow)
    }

    /// Concatenates all batches into a single batch.
    ///
    /// # Errors
    ///
    /// Returns an error if Arrow fails to concatenate.
    pub fn to_single_batch(&self) -> Result<RecordBatch> {
        if let [batch] = self.batches.as_slice() {
            return Ok(batch.clone());
        }
        arrow::compute::concat_batches(&self.schema, &self.batches).map_err(Error::Arrow)
    }

    /// Builds a new dataset from the rows at `indices`, in that order.
    ///
    /// An empty index slice yields an empty dataset with the same schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if an index is out of range.
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.row_count) {
            return Err(Error::invalid_argument(format!(
                "Row index {} out of bounds for dataset with {} rows",
                bad, self.row_count
            )));
        }

        let batch = self.to_single_batch()?;
        let indices_array = UInt64Array::from(indices.iter().map(|&i| i as u64).collect::<Vec<_>>());

        let columns: Vec<ArrayRef> = batch
            .columns()
            .iter()
            .map(|col| {
                arrow::compute::take(col.as_ref(), &indices_array, None).map_err(Error::Arrow)
            })
            .collect::<Result<Vec<_>>>()?;

        let taken = RecordBatch::try_new(batch.schema(), columns).map_err(Error::Arrow)?;
        Self::from_batch(taken)
    }

    /// Returns a copy of the dataset with one extra column appended.
    ///
    /// # Errors
    ///
    /// Returns an error if a field of the same name exists or the array
    /// length differs from the row count.
    pub fn with_column(&self, field: Field, values: ArrayRef) -> Result<Self> {
        if self.schema.index_of(field.name()).is_ok() {
            return Err(Error::invalid_argument(format!(
                "Field '{}' already exists",
                field.name()
            )));
        }
        if values.len() != self.row_count {
            return Err(Error::schema_mismatch(format!(
                "Column '{}' has {} values, dataset has {} rows",
                field.name(),
                values.len(),
                self.row_count
            )));
        }

        let batch = self.to_single_batch()?;

        let mut fields: Vec<_> = batch.schema().fields().iter().cloned().collect();
        fields.push(Arc::new(field));
        let schema = Arc::new(Schema::new(fields));

        let mut columns = batch.columns().to_vec();
        columns.push(values);

        let batch = RecordBatch::try_new(schema, columns).map_err(Error::Arrow)?;
        Self::from_batch(batch)
    }
}

impl Dataset for ArrowDataset {
    fn len(&self) -> usize {
        self.row_count
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = RecordBatch> + Send + '_> {
        Box::new(self.batches.iter().cloned())
    }

    fn num_batches(&self) -> usize {
        self.batches.len()
    }

    fn get_batch(&self, index: usize) -> Option<&RecordBatch> {
        self.batches.get(index)
    }
}

/// Rows sampled when inferring a schema from text input.
const SCHEMA_INFER_ROWS: usize = 1000;

/// Rows per batch when reading text input.
const DEFAULT_BATCH_SIZE: usize = 8192;

/// Infers a schema from the first rows, rewinds, then reads every batch.
fn read_csv<R: Read + Seek>(mut input: R, options: &CsvOptions) -> Result<ArrowDataset> {
    use arrow_csv::{reader::Format, ReaderBuilder};

    let mut format = Format::default().with_header(options.has_header);
    if let Some(delim) = options.delimiter {
        format = format.with_delimiter(delim);
    }
    let (inferred, _) = format.infer_schema(&mut input, Some(SCHEMA_INFER_ROWS))?;
    input
        .seek(SeekFrom::Start(0))
        .map_err(Error::io_no_path)?;

    let schema = Arc::new(inferred);
    let mut builder = ReaderBuilder::new(schema.clone())
        .with_batch_size(options.batch_size)
        .with_header(options.has_header);
    if let Some(delim) = options.delimiter {
        builder = builder.with_delimiter(delim);
    }
    let batches = builder
        .build(input)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    ArrowDataset::from_read(schema, batches)
}

/// Options for CSV parsing.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Whether the CSV file has a header row.
    pub has_header: bool,
    /// Delimiter character (default is comma).
    pub delimiter: Option<u8>,
    /// Batch size for reading.
    pub batch_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl CsvOptions {
    /// Creates new CSV options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the file has a header row.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Sets the delimiter character.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Sets the batch size for reading.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Float64Array, Int32Array, Int64Array, StringArray},
        datatypes::DataType,
    };

    use super::*;

    fn create_test_batch(start: i32, count: usize) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("ocean_proximity", DataType::Utf8, false),
        ]));

        let ids: Vec<i32> = (start..start + count as i32).collect();
        let names: Vec<&str> = ids
            .iter()
            .map(|i| if i % 2 == 0 { "INLAND" } else { "NEAR BAY" })
            .collect();

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(ids)),
                Arc::new(StringArray::from(names)),
            ],
        )
        .expect("batch creation failed")
    }

    fn ids_of(dataset: &ArrowDataset) -> Vec<i32> {
        let col = dataset.column("id").expect("id column");
        let ids = col
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("Int32Array");
        ids.values().to_vec()
    }

    #[test]
    fn test_new_counts_rows_across_batches() {
        let dataset =
            ArrowDataset::new(vec![create_test_batch(0, 5), create_test_batch(5, 7)]).unwrap();
        assert_eq!(dataset.len(), 12);
        assert_eq!(dataset.num_batches(), 2);
        assert!(dataset.get_batch(1).is_some());
        assert!(dataset.get_batch(2).is_none());
    }

    #[test]
    fn test_new_rejects_empty_batch_list() {
        let result = ArrowDataset::new(Vec::new());
        assert!(matches!(result, Err(Error::EmptyDataset)));
    }

    #[test]
    fn test_new_rejects_schema_mismatch() {
        let other_schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
        let other = RecordBatch::try_new(other_schema, vec![Arc::new(Int64Array::from(vec![1]))])
            .expect("batch");

        let result = ArrowDataset::new(vec![create_test_batch(0, 3), other]);
        assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn test_zero_row_batch_is_an_empty_dataset() {
        let dataset = ArrowDataset::from_batch(create_test_batch(0, 0)).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.schema().fields().len(), 2);
    }

    #[test]
    fn test_column_index_missing_field() {
        let dataset = ArrowDataset::from_batch(create_test_batch(0, 3)).unwrap();
        assert_eq!(dataset.column_index("ocean_proximity").unwrap(), 1);
        assert!(matches!(
            dataset.column_index("median_income"),
            Err(Error::MissingField { .. })
        ));
    }

    #[test]
    fn test_column_spans_batches() {
        let dataset =
            ArrowDataset::new(vec![create_test_batch(0, 3), create_test_batch(3, 2)]).unwrap();
        assert_eq!(ids_of(&dataset), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_take_follows_index_order() {
        let dataset =
            ArrowDataset::new(vec![create_test_batch(0, 4), create_test_batch(4, 4)]).unwrap();
        let taken = dataset.take(&[7, 0, 5]).unwrap();
        assert_eq!(taken.len(), 3);
        assert_eq!(ids_of(&taken), vec![7, 0, 5]);
        assert_eq!(taken.schema(), dataset.schema());
    }

    #[test]
    fn test_take_empty_keeps_schema() {
        let dataset = ArrowDataset::from_batch(create_test_batch(0, 4)).unwrap();
        let taken = dataset.take(&[]).unwrap();
        assert!(taken.is_empty());
        assert_eq!(taken.schema(), dataset.schema());
    }

    #[test]
    fn test_take_rejects_out_of_bounds() {
        let dataset = ArrowDataset::from_batch(create_test_batch(0, 4)).unwrap();
        assert!(matches!(
            dataset.take(&[1, 4]),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_with_column_appends_field() {
        let dataset =
            ArrowDataset::new(vec![create_test_batch(0, 2), create_test_batch(2, 1)]).unwrap();
        let values: ArrayRef = Arc::new(Float64Array::from(vec![8.3, 7.2, 5.6]));
        let extended = dataset
            .with_column(Field::new("median_income", DataType::Float64, false), values)
            .unwrap();

        assert_eq!(extended.schema().fields().len(), 3);
        assert_eq!(extended.column_index("median_income").unwrap(), 2);
        assert_eq!(extended.len(), 3);
    }

    #[test]
    fn test_with_column_rejects_duplicate_and_length_mismatch() {
        let dataset = ArrowDataset::from_batch(create_test_batch(0, 2)).unwrap();

        let dup: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
        assert!(dataset
            .with_column(Field::new("id", DataType::Int32, false), dup)
            .is_err());

        let short: ArrayRef = Arc::new(Int32Array::from(vec![1]));
        assert!(matches!(
            dataset.with_column(Field::new("extra", DataType::Int32, false), short),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_csv_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("housing.csv");

        let original = ArrowDataset::from_batch(create_test_batch(0, 25)).unwrap();
        original.to_csv(&path).unwrap();

        let loaded = ArrowDataset::from_csv(&path).unwrap();
        assert_eq!(loaded.len(), 25);
        assert_eq!(loaded.schema().fields().len(), 2);
        assert_eq!(loaded.column_index("ocean_proximity").unwrap(), 1);
    }

    #[test]
    fn test_csv_with_options_small_batches() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("housing.csv");
        std::fs::write(&path, "a;b\n1;x\n2;y\n3;z\n").unwrap();

        let loaded = ArrowDataset::from_csv_with_options(
            &path,
            &CsvOptions::new().with_delimiter(b';').with_batch_size(2),
        )
        .unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.num_batches(), 2);
    }

    #[test]
    fn test_csv_header_only_keeps_schema() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.csv");
        std::fs::write(&path, "median_income,income_cat\n").unwrap();

        let dataset = ArrowDataset::from_csv(&path).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.column_index("income_cat").unwrap(), 1);
    }

    #[test]
    fn test_empty_dataset_survives_parquet_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.parquet");

        let original = ArrowDataset::from_batch(create_test_batch(0, 0)).unwrap();
        original.to_parquet(&path).unwrap();

        let loaded = ArrowDataset::from_parquet(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.schema(), original.schema());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ArrowDataset::from_csv("/nonexistent/housing.csv");
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_parquet_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("housing.parquet");

        let original = ArrowDataset::from_batch(create_test_batch(0, 40)).unwrap();
        original.to_parquet(&path).unwrap();

        let loaded = ArrowDataset::from_parquet(&path).unwrap();
        assert_eq!(loaded.len(), 40);
        assert_eq!(loaded.schema(), original.schema());
        assert_eq!(ids_of(&loaded), ids_of(&original));
    }

    #[test]
    fn test_json_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("housing.jsonl");

        let original = ArrowDataset::from_batch(create_test_batch(0, 10)).unwrap();
        original.to_json(&path).unwrap();

        let loaded = ArrowDataset::from_json(&path).unwrap();
        assert_eq!(loaded.len(), 10);
    }

    #[test]
    fn test_from_csv_str() {
        let dataset = ArrowDataset::from_csv_str("median_income,income_cat\n8.3,5\n1.2,1\n").unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.column_index("income_cat").unwrap(), 1);
    }

    #[test]
    fn test_csv_options_builder() {
        let opts = CsvOptions::new()
            .with_header(false)
            .with_batch_size(0);
        assert!(!opts.has_header);
        assert_eq!(opts.batch_size, 1);
        assert!(opts.delimiter.is_none());
    }
}
