use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("failed to bind to tcp: {0}")]
    TcpBind(#[source] std::io::Error),
    #[error("failed to serve: {0}")]
    Serve(#[source] std::io::Error),
}
