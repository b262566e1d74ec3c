use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub mod podfriend_controller;

/// Log and trace integrations
pub mod telemetry;
