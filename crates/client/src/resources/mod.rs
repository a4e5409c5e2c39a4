//! REST resources: agents and threads

mod agents;
mod threads;

pub use agents::AgentsClient;
pub use threads::ThreadsClient;

use a2abase_core::Error;

/// Turn a remote failure into the error the caller can act on.
fn map_remote(err: Error, what: &str) -> Error {
    match err {
        Error::Remote { status: 400 | 422, body } => Error::Validation(body),
        Error::Remote { status: 404, body } if body.is_empty() => {
            Error::NotFound(format!("{} not found", what))
        }
        Error::Remote { status: 404, body } => Error::NotFound(format!("{}: {}", what, body)),
        Error::Remote { status: 409, body } => Error::Conflict(body),
        other => other,
    }
}

fn segment(id: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id)
}
