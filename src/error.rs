use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("The sum of motion cost weights should be 1, got {sum}")]
    InvalidMotionCostWeights { sum: f32 },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Assignment Error: {0}")]
    Assignment(String),
}
