//! Root crate facade for pastecat: storage core and HTTP server.

pub use pastecat_core::{
    bytesize, config, constants, context, error, id, models, scheduler, stats, store, AppError,
    BackendKind, ByteSize, Config, DeletionScheduler, FileStore, Header, MemStore, MmapStore,
    Paste, PasteId, RetryPolicy, Stats, StatsSnapshot, Store, StoreContext,
};
pub use pastecat_server::{create_app, resolve_bind_address, serve_router, AppState, HttpError};
