use std::borrow::Cow;
use std::path::PathBuf;

use thiserror::Error;

use crate::frame::FrameType;

#[derive(Error, Debug)]
pub enum NightstackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No {frame_type} frames found for session {session}, config {config} in {}", .dir.display())]
    NotFound {
        frame_type: FrameType,
        session: String,
        config: String,
        dir: PathBuf,
    },

    #[error("{stage}: missing input: {what}")]
    MissingInput { stage: String, what: String },

    #[error(
        "{stage} failed (exit status {}, {} input frame(s)): {diagnostic}",
        .status.map(|s| s.to_string()).unwrap_or_else(|| "signal".into()),
        .inputs.len()
    )]
    EngineFailure {
        stage: String,
        inputs: Vec<PathBuf>,
        status: Option<i32>,
        diagnostic: String,
    },

    #[error("{stage}: engine reported success but {} was not written", .path.display())]
    MissingOutput { stage: String, path: PathBuf },

    #[error("Could not start processing engine `{program}`: {source}")]
    EngineUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),
}

impl NightstackError {
    /// Name of the stage that failed, when the error came from one.
    ///
    /// Missing raw frames are named after the stage that looked for them:
    /// biases feed the master bias, flats the master flat, lights the
    /// calibrated lights of the same session and config.
    pub fn stage(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::MissingInput { stage, .. }
            | Self::EngineFailure { stage, .. }
            | Self::MissingOutput { stage, .. } => Some(Cow::Borrowed(stage)),
            Self::NotFound {
                frame_type,
                session,
                config,
                ..
            } => match frame_type {
                FrameType::Bias => Some(format!("master bias {session}").into()),
                FrameType::Flat => Some(format!("master flat {session}/{config}").into()),
                FrameType::Light => Some(format!("calibrated lights {session}/{config}").into()),
                FrameType::Dark => None,
            },
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, NightstackError>;
