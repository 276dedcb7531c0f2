use thiserror::Error;


/// Errors raised by the dispatch simulator.  Infeasibility (no route, no vehicle that can
/// serve a request) is not an error; those are reported through return values.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("unknown vehicle: {0}")]
    UnknownVehicle(String),

    #[error("vehicle not available: {0}")]
    VehicleUnavailable(String),

    #[error("unknown request: {0}")]
    UnknownRequest(String),

    #[error("unknown search strategy: {0}")]
    UnknownStrategy(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("congestion factor must be at least 1.0, got {0}")]
    InvalidCongestion(f64),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] yaml_rust::ScanError),
}
