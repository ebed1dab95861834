pub mod batch;
pub mod build;
pub mod loop_runner;
pub mod pace;
pub mod reconcile;
pub mod transport;

pub use batch::{
    parse_incremental, parse_initial, Action, FatalInputError, FireValue, GridDims,
    IncrementalBatch, InitialBatch, ParseError, PoiTransition, Scoreboard,
};
pub use build::{build_grid, build_scene};
pub use loop_runner::{run_session, SessionError, SessionSummary};
pub use pace::Pacer;
pub use reconcile::{Phase, ReconcileError, ReconcileScheduler};
pub use transport::{BatchSource, HttpSource, TransportError, DEFAULT_SERVER_URL};
