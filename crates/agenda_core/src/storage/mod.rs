pub mod json_snapshot;
