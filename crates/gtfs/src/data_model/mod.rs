/// Prost-generated bindings for the vendored `gtfs-realtime.proto` (plus
/// the NYCT/MTA Railroad extension fields, compiled in by `build.rs`
/// alongside the base message set).
pub mod realtime {
    include!(concat!(env!("OUT_DIR"), "/protobuf/transit_realtime.rs"));
}
