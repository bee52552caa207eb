use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("reading timeline {path}: {source:#}")]
    Timeline {
        path: String,
        source: anyhow::Error,
    },
    #[error("sending {verb} command: {source:#}")]
    Command {
        verb: &'static str,
        source: anyhow::Error,
    },
    #[error("could not create window {title}: {source:#}")]
    WindowCreation {
        title: String,
        source: anyhow::Error,
    },
    #[error("reading window body: {source:#}")]
    Body { source: anyhow::Error },
    #[error("writing rendered timeline: {0}")]
    Output(#[from] std::io::Error),
}
