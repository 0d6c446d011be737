use thiserror::Error;

/// Any failure reading or parsing the static corpus aborts the whole load;
/// the previously published index, if any, is left untouched by the
/// caller.
#[derive(Error, Debug)]
pub enum StaticLoadError {
    #[error("could not read {table} for system {system}: {source}")]
    Csv {
        system: String,
        table: &'static str,
        #[source]
        source: csv::Error,
    },
}

/// A malformed realtime feed is dropped; it never fails a request that
/// doesn't strictly need it (the calling engine falls back to scheduled
/// data instead).
#[derive(Error, Debug)]
pub enum FeedDecodeError {
    #[error("malformed protobuf feed message: {0}")]
    Protobuf(#[from] prost::DecodeError),
}
