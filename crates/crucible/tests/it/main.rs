mod api;
mod artifact_sync;
mod utils;
