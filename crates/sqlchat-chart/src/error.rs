use sqlchat_core::VisualizationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("query result has no numeric column to plot")]
    NoNumericColumn,

    #[error("nothing to plot")]
    EmptySeries,

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to write chart file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ChartError> for VisualizationError {
    fn from(err: ChartError) -> Self {
        match err {
            ChartError::Io(_) => VisualizationError::Output(err.to_string()),
            _ => VisualizationError::Render(err.to_string()),
        }
    }
}
