use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, ListArray, ListBuilder, StringArray,
    StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::align::BeatLabel;
use crate::dataset::{Dataset, DatasetRecord};
use crate::ecg_types::{BeatType, HeartRhythm};

const TARGET_RATE_KEY: &str = "target_rate";

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", item, true)))
}

fn split_schema(target_rate: f64) -> Schema {
    Schema::new(vec![
        Field::new("record", DataType::Utf8, false),
        Field::new("channel_label", DataType::Utf8, false),
        Field::new("units", DataType::Utf8, false),
        Field::new("source_rate", DataType::Float64, false),
        Field::new("signal", list_of(DataType::Float64), false),
        Field::new("label_time", list_of(DataType::Float64), false),
        Field::new("label_beat", list_of(DataType::Utf8), false),
        Field::new("label_rhythm", list_of(DataType::Utf8), false),
    ])
    .with_metadata(HashMap::from([(
        TARGET_RATE_KEY.to_string(),
        target_rate.to_string(),
    )]))
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write one split as a Parquet file, one row per record.
pub fn write_split(path: &Path, dataset: &Dataset) -> Result<()> {
    let mut record = StringBuilder::new();
    let mut channel_label = StringBuilder::new();
    let mut units = StringBuilder::new();
    let mut source_rate = Float64Builder::new();
    let mut signal = ListBuilder::new(Float64Builder::new());
    let mut label_time = ListBuilder::new(Float64Builder::new());
    let mut label_beat = ListBuilder::new(StringBuilder::new());
    let mut label_rhythm = ListBuilder::new(StringBuilder::new());

    for r in &dataset.records {
        record.append_value(&r.record);
        channel_label.append_value(&r.channel_label);
        units.append_value(&r.units);
        source_rate.append_value(r.source_rate);

        signal.values().append_slice(&r.signal);
        signal.append(true);

        for label in &r.labels {
            label_time.values().append_value(label.time);
            label_beat.values().append_value(label.beat.code());
            label_rhythm.values().append_value(label.rhythm.code());
        }
        label_time.append(true);
        label_beat.append(true);
        label_rhythm.append(true);
    }

    let schema = Arc::new(split_schema(dataset.target_rate));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(record.finish()),
        Arc::new(channel_label.finish()),
        Arc::new(units.finish()),
        Arc::new(source_rate.finish()),
        Arc::new(signal.finish()),
        Arc::new(label_time.finish()),
        Arc::new(label_beat.finish()),
        Arc::new(label_rhythm.finish()),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    log::info!(
        "wrote {} records ({} labels) to {}",
        dataset.records.len(),
        dataset.label_count(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read a split written by [`write_split`].
pub fn read_split(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;

    let target_rate: f64 = builder
        .schema()
        .metadata()
        .get(TARGET_RATE_KEY)
        .context("missing target_rate metadata")?
        .parse()
        .context("bad target_rate metadata")?;

    let reader = builder.build().context("building parquet reader")?;
    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.context("reading parquet record batch")?;
        records.extend(records_from_batch(&batch)?);
    }

    Ok(Dataset {
        target_rate,
        records,
    })
}

fn records_from_batch(batch: &RecordBatch) -> Result<Vec<DatasetRecord>> {
    let record = column::<StringArray>(batch, "record")?;
    let channel_label = column::<StringArray>(batch, "channel_label")?;
    let units = column::<StringArray>(batch, "units")?;
    let source_rate = column::<Float64Array>(batch, "source_rate")?;
    let signal = column::<ListArray>(batch, "signal")?;
    let label_time = column::<ListArray>(batch, "label_time")?;
    let label_beat = column::<ListArray>(batch, "label_beat")?;
    let label_rhythm = column::<ListArray>(batch, "label_rhythm")?;

    (0..batch.num_rows())
        .map(|row| {
            let times = f64_list(label_time, row)?;
            let beats = string_list(label_beat, row)?;
            let rhythms = string_list(label_rhythm, row)?;
            if times.len() != beats.len() || times.len() != rhythms.len() {
                bail!("row {row}: label columns have different lengths");
            }

            let labels = times
                .into_iter()
                .zip(beats)
                .zip(rhythms)
                .map(|((time, beat), rhythm)| {
                    Ok(BeatLabel {
                        time,
                        beat: BeatType::from_code(&beat)
                            .with_context(|| format!("row {row}: unknown beat code {beat:?}"))?,
                        rhythm: HeartRhythm::from_code(&rhythm)
                            .with_context(|| format!("row {row}: unknown rhythm code {rhythm:?}"))?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(DatasetRecord {
                record: record.value(row).to_string(),
                channel_label: channel_label.value(row).to_string(),
                units: units.value(row).to_string(),
                source_rate: source_rate.value(row),
                signal: f64_list(signal, row)?,
                labels,
            })
        })
        .collect()
}

// -- Arrow helpers --

fn column<'b, T: Array + 'static>(batch: &'b RecordBatch, name: &str) -> Result<&'b T> {
    batch
        .column_by_name(name)
        .with_context(|| format!("missing column {name:?}"))?
        .as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("column {name:?} has unexpected type"))
}

fn f64_list(col: &ListArray, row: usize) -> Result<Vec<f64>> {
    let values = col.value(row);
    let values = values
        .as_any()
        .downcast_ref::<Float64Array>()
        .context("expected Float64 list items")?;
    Ok(values.values().to_vec())
}

fn string_list(col: &ListArray, row: usize) -> Result<Vec<String>> {
    let values = col.value(row);
    let values = values
        .as_any()
        .downcast_ref::<StringArray>()
        .context("expected Utf8 list items")?;
    values
        .iter()
        .map(|v| v.map(str::to_string).context("null label code"))
        .collect()
}
