// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// The detector configuration is inconsistent and can never produce
    /// detections. Raised by `DetectorBuilder::build`.
    InvalidConfig(String),
    /// No configuration source was given to the builder.
    NoConfig,
    /// Neither an anchor set nor an anchor configuration was given.
    NoAnchors,
    /// A raw buffer handed to a decode call does not match the configured
    /// geometry. No partial results are produced.
    InvalidInput(String),
    Shape(ndarray::ShapeError),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::Shape(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::NoConfig => write!(f, "No configuration provided"),
            Error::NoAnchors => write!(f, "No anchors or anchor configuration provided"),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::Shape(e) => write!(f, "Shape error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Yaml(e) => write!(f, "YAML error: {}", e),
            Error::ThreadPool(e) => write!(f, "Thread pool error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Shape(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Yaml(e) => Some(e),
            Error::ThreadPool(e) => Some(e),
            _ => None,
        }
    }
}
