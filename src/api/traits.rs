//! The lifecycle shared by every data source.

use polars::prelude::{DataFrame, LazyFrame};
use serde_json::{Map, Value};

use super::schema::Schema;
use crate::error::ReaderError;
use crate::frame::GeoFrame;
use crate::regions::Regions;

/// Open/discover/read contract implemented by each driver.
///
/// Sources load lazily: `schema`, `read` and `read_partition` open the source
/// first when needed, and `close` drops the loaded table so the next call
/// loads it again.
pub trait DataSource {
    /// What `read` returns.
    type Output;

    /// Driver name the source is registered under.
    fn name(&self) -> &'static str;

    /// Load the table. Does nothing when already open.
    fn open(&mut self) -> Result<(), ReaderError>;

    fn is_open(&self) -> bool;

    fn schema(&mut self) -> Result<Schema, ReaderError>;

    /// Alias of [`DataSource::schema`] under the host's name.
    fn discover(&mut self) -> Result<Schema, ReaderError> {
        self.schema()
    }

    fn read(&mut self) -> Result<Self::Output, ReaderError>;

    /// Partition `index`; single-partition sources only accept 0.
    fn read_partition(&mut self, index: usize) -> Result<Self::Output, ReaderError>;

    fn to_lazy(&mut self) -> Result<LazyFrame, ReaderError> {
        Err(ReaderError::Unsupported(format!(
            "{} sources are read in memory and have no lazy form",
            self.name()
        )))
    }

    fn close(&mut self);

    /// User metadata passed at construction.
    fn metadata(&self) -> &Map<String, Value>;
}

/// Load state of a source.
#[derive(Debug, Clone, Default)]
pub enum SourceState<T> {
    #[default]
    Unopened,
    Open(T),
    Closed,
}

impl<T> SourceState<T> {
    pub fn is_open(&self) -> bool {
        matches!(self, SourceState::Open(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            SourceState::Open(value) => Some(value),
            _ => None,
        }
    }

    /// The loaded value, running `open` first unless already open.
    ///
    /// A failing `open` leaves the state untouched.
    pub fn get_or_try_open<E>(&mut self, open: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if !self.is_open() {
            *self = SourceState::Open(open()?);
        }
        match self {
            SourceState::Open(value) => Ok(value),
            _ => unreachable!("source state set to open above"),
        }
    }

    pub fn close(&mut self) {
        *self = SourceState::Closed;
    }
}

/// Output of any source, for callers that work through [`DynSource`].
#[derive(Debug, Clone)]
pub enum Container {
    GeoFrame(GeoFrame),
    DataFrame(DataFrame),
    Regions(Regions),
}

impl Container {
    /// Plain table view; regions have none.
    pub fn as_frame(&self) -> Option<&DataFrame> {
        match self {
            Container::GeoFrame(frame) => Some(frame.frame()),
            Container::DataFrame(frame) => Some(frame),
            Container::Regions(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Container::GeoFrame(_) => "geodataframe",
            Container::DataFrame(_) => "dataframe",
            Container::Regions(_) => "regions",
        }
    }
}

impl From<GeoFrame> for Container {
    fn from(frame: GeoFrame) -> Self {
        Container::GeoFrame(frame)
    }
}

impl From<DataFrame> for Container {
    fn from(frame: DataFrame) -> Self {
        Container::DataFrame(frame)
    }
}

impl From<Regions> for Container {
    fn from(regions: Regions) -> Self {
        Container::Regions(regions)
    }
}

/// Object-safe view of a [`DataSource`], used by the driver registry.
pub trait DynSource: Send {
    fn name(&self) -> &'static str;
    fn open(&mut self) -> Result<(), ReaderError>;
    fn is_open(&self) -> bool;
    fn schema(&mut self) -> Result<Schema, ReaderError>;
    fn read(&mut self) -> Result<Container, ReaderError>;
    fn read_partition(&mut self, index: usize) -> Result<Container, ReaderError>;
    fn to_lazy(&mut self) -> Result<LazyFrame, ReaderError>;
    fn close(&mut self);
    fn metadata(&self) -> &Map<String, Value>;
}

impl<S> DynSource for S
where
    S: DataSource + Send,
    S::Output: Into<Container>,
{
    fn name(&self) -> &'static str {
        DataSource::name(self)
    }

    fn open(&mut self) -> Result<(), ReaderError> {
        DataSource::open(self)
    }

    fn is_open(&self) -> bool {
        DataSource::is_open(self)
    }

    fn schema(&mut self) -> Result<Schema, ReaderError> {
        DataSource::schema(self)
    }

    fn read(&mut self) -> Result<Container, ReaderError> {
        DataSource::read(self).map(Into::into)
    }

    fn read_partition(&mut self, index: usize) -> Result<Container, ReaderError> {
        DataSource::read_partition(self, index).map(Into::into)
    }

    fn to_lazy(&mut self) -> Result<LazyFrame, ReaderError> {
        DataSource::to_lazy(self)
    }

    fn close(&mut self) {
        DataSource::close(self)
    }

    fn metadata(&self) -> &Map<String, Value> {
        DataSource::metadata(self)
    }
}

/// Reject any partition other than 0 of a single-partition source.
pub(crate) fn check_single_partition(index: usize) -> Result<(), ReaderError> {
    if index == 0 {
        Ok(())
    } else {
        Err(ReaderError::PartitionOutOfRange {
            index,
            npartitions: 1,
        })
    }
}
