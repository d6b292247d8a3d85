// In: src/ffi/python.rs

use std::fs::OpenOptions;
use std::sync::{Arc, Once};

use arrow::array::{make_array, ArrayData};
use arrow::pyarrow::{PyArrowType, ToPyArrow};
use arrow::record_batch::RecordBatch;
use log::LevelFilter;
use pyo3::prelude::*;
use pyo3::types::PyString;

use crate::error::MessageError;
use crate::messages::{total_rows, MultiMessage, RowRange, Windowed};
use crate::meta::MessageMeta;

//==================================================================================
// I. Metadata Batch
//==================================================================================

#[pyclass(name = "MessageMeta", module = "batchmsg")]
#[derive(Clone)]
pub struct PyMessageMeta {
    inner: Arc<MessageMeta>,
}

#[pymethods]
impl PyMessageMeta {
    /// Wraps a PyArrow RecordBatch. The batch's buffers are shared, not copied.
    #[new]
    fn new(batch: PyArrowType<RecordBatch>) -> Self {
        Self {
            inner: Arc::new(MessageMeta::new(batch.0)),
        }
    }

    #[getter]
    fn count(&self) -> PyResult<usize> {
        Ok(self.inner.count()?)
    }

    fn column_names(&self) -> PyResult<Vec<String>> {
        Ok(self.inner.column_names()?)
    }

    /// Returns the whole batch as a PyArrow RecordBatch.
    fn copy_dataframe(&self) -> PyResult<PyArrowType<RecordBatch>> {
        Ok(PyArrowType(self.inner.snapshot()?))
    }
}

//==================================================================================
// II. Windowed Message
//==================================================================================

#[pyclass(name = "MultiMessage", module = "batchmsg")]
pub struct PyMultiMessage {
    inner: MultiMessage,
}

#[pymethods]
impl PyMultiMessage {
    /// A negative `mess_count` selects every row from `mess_offset` to the end.
    #[new]
    #[pyo3(signature = (meta, mess_offset = 0, mess_count = -1))]
    fn new(meta: PyRef<'_, PyMessageMeta>, mess_offset: i64, mess_count: i64) -> PyResult<Self> {
        let offset = to_index("mess_offset", mess_offset)?;
        let count = if mess_count < 0 {
            None
        } else {
            Some(to_index("mess_count", mess_count)?)
        };

        let inner = MultiMessage::new(meta.inner.clone(), offset, count)?;
        Ok(Self { inner })
    }

    #[getter]
    fn meta(&self) -> PyMessageMeta {
        PyMessageMeta {
            inner: self.inner.meta().clone(),
        }
    }

    #[getter]
    fn mess_offset(&self) -> usize {
        self.inner.mess_offset()
    }

    #[getter]
    fn mess_count(&self) -> usize {
        self.inner.mess_count()
    }

    fn get_meta_column_names(&self) -> PyResult<Vec<String>> {
        Ok(self.inner.column_names()?)
    }

    /// `None` returns every column as a RecordBatch, a string returns that column
    /// as an Array, and a list returns those columns as a RecordBatch.
    #[pyo3(signature = (columns = None))]
    fn get_meta(&self, py: Python<'_>, columns: Option<Bound<'_, PyAny>>) -> PyResult<PyObject> {
        match columns {
            None => Ok(PyArrowType(self.inner.read_all()?).into_py(py)),
            Some(obj) if obj.is_instance_of::<PyString>() => {
                let name: String = obj.extract()?;
                let batch = self.inner.read_column(&name)?;
                batch.column(0).to_data().to_pyarrow(py)
            }
            Some(obj) => {
                let names: Vec<String> = obj.extract()?;
                Ok(PyArrowType(self.inner.read_columns(names.as_slice())?).into_py(py))
            }
        }
    }

    /// A string name takes a PyArrow Array; a list of names takes a RecordBatch
    /// whose columns are written in order.
    fn set_meta(&self, columns: &Bound<'_, PyAny>, value: &Bound<'_, PyAny>) -> PyResult<()> {
        if columns.is_instance_of::<PyString>() {
            let name: String = columns.extract()?;
            let PyArrowType(data) = value.extract::<PyArrowType<ArrayData>>()?;
            self.inner.write_column(&name, make_array(data))?;
        } else {
            let names: Vec<String> = columns.extract()?;
            let PyArrowType(batch) = value.extract::<PyArrowType<RecordBatch>>()?;
            if batch.num_columns() != names.len() {
                return Err(MessageError::size_mismatch(
                    "columns in value batch",
                    names.len(),
                    batch.num_columns(),
                )
                .into());
            }
            self.inner.write_columns(names.as_slice(), batch.columns())?;
        }
        Ok(())
    }

    fn get_slice(&self, start: i64, stop: i64) -> PyResult<Self> {
        let start = to_index("start", start)?;
        let stop = to_index("stop", stop)?;
        Ok(Self {
            inner: self.inner.get_slice(start, stop)?,
        })
    }

    /// When `num_selected_rows` is omitted it is computed from `ranges`.
    #[pyo3(signature = (ranges, num_selected_rows = None))]
    fn copy_ranges(
        &self,
        py: Python<'_>,
        ranges: Vec<(i64, i64)>,
        num_selected_rows: Option<i64>,
    ) -> PyResult<Self> {
        let ranges = ranges
            .into_iter()
            .map(|(start, stop)| -> Result<RowRange, MessageError> {
                Ok(RowRange::new(to_index("start", start)?, to_index("stop", stop)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let num_selected_rows = match num_selected_rows {
            Some(rows) => to_index("num_selected_rows", rows)?,
            None => total_rows(&ranges),
        };

        let inner = &self.inner;
        let copied = py.allow_threads(move || inner.copy_ranges(&ranges, num_selected_rows))?;
        Ok(Self { inner: copied })
    }

    fn __len__(&self) -> usize {
        self.inner.mess_count()
    }

    fn __repr__(&self) -> String {
        format!(
            "MultiMessage(mess_offset={}, mess_count={})",
            self.inner.mess_offset(),
            self.inner.mess_count()
        )
    }
}

fn to_index(name: &str, value: i64) -> Result<usize, MessageError> {
    usize::try_from(value).map_err(|_| {
        MessageError::InvalidArgument(format!("{} must be non-negative, got {}", name, value))
    })
}

//==================================================================================
// III. Logging
//==================================================================================

static INIT_LOGGER: Once = Once::new();

#[pyfunction]
#[pyo3(name = "enable_verbose_logging", signature = (log_file = None))]
pub fn enable_verbose_logging_py(log_file: Option<String>) -> PyResult<()> {
    let file = match log_file {
        Some(filename) => Some(OpenOptions::new().append(true).create(true).open(filename)?),
        None => None,
    };

    INIT_LOGGER.call_once(move || {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(LevelFilter::Debug);

        // Custom formatter: just print the level, target and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}
