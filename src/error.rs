use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(
        "could not invoke conduit method `{method}`: {detail}\n  replay: echo '{input}' | {bin} call-conduit --conduit-token <token> {method}"
    )]
    Transport {
        method: String,
        input: String,
        bin: String,
        detail: String,
    },

    #[error(
        "conduit method `{method}` was rejected by the server: {message}\n  replay: echo '{input}' | {bin} call-conduit --conduit-token <token> {method}"
    )]
    ConduitRejected {
        method: String,
        input: String,
        bin: String,
        message: String,
    },

    #[error("conduit method `{method}` returned an unexpected response shape: {detail}")]
    UnexpectedResponse { method: String, detail: String },

    #[error("asana task {0} ('{1}') has no project; cannot derive its Asana URL")]
    MissingProject(u64, String),

    #[error("no conduit token provided (pass --conduit-token or set CONDUIT_TOKEN)")]
    MissingToken,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::ConduitRejected { .. } => "conduit_rejected",
            Self::UnexpectedResponse { .. } => "unexpected_response",
            Self::MissingProject(_, _) => "missing_project",
            Self::MissingToken => "missing_token",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
