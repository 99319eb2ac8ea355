use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;

/// How ONNX sessions are built for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Run the full graph optimizer instead of basic constant folding.
    pub optimize_fully: bool,
    pub intra_threads: Option<usize>,
}

/// Load an ONNX model from the given path.
pub fn load_session(path: &Path, options: &SessionOptions) -> Result<Session, ort::Error> {
    let level = if options.optimize_fully {
        GraphOptimizationLevel::Level3
    } else {
        GraphOptimizationLevel::Level1
    };
    let mut builder = Session::builder()?.with_optimization_level(level)?;
    if let Some(threads) = options.intra_threads {
        builder = builder.with_intra_threads(threads)?;
    }
    let session = builder.commit_from_file(path)?;
    tracing::debug!(
        "{}: inputs {:?}, outputs {:?}",
        path.display(),
        input_names(&session),
        output_names(&session)
    );
    Ok(session)
}

/// Return the names of the model's inputs.
pub fn input_names(session: &Session) -> Vec<&str> {
    session.inputs().iter().map(|i| i.name()).collect()
}

/// Return the names of the model's outputs.
pub fn output_names(session: &Session) -> Vec<&str> {
    session.outputs().iter().map(|o| o.name()).collect()
}
