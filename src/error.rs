use thiserror::Error;

use crate::graph::ValueKind;

/// Failure to read or write a property on a scene-graph object.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("{class} has no property `{path}`")]
    UnknownProperty { class: String, path: String },
    #[error("`{path}` expects a {expected} value, got {found}")]
    KindMismatch {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("`{component}` is not a component of {kind} property `{path}`")]
    UnknownComponent {
        path: String,
        component: String,
        kind: ValueKind,
    },
}

/// A library constructor rejected its arguments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructError {
    #[error("{class} takes at most {max} argument(s), got {given}")]
    TooManyArguments {
        class: String,
        max: usize,
        given: usize,
    },
    #[error("argument {index} of {class} must be a {expected} value, got {found}")]
    InvalidArgument {
        class: String,
        index: usize,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Structural misuse of the node operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
    #[error("cannot insert node {child} into itself or one of its descendants")]
    Cycle { child: String },
    #[error("{tag} nodes cannot hold children")]
    InvalidParent { tag: String },
    #[error("node {uuid} has already been removed")]
    Disposed { uuid: String },
    #[error("event property `{key}` expects a handler")]
    ExpectedHandler { key: String },
    #[error("property `{key}` expects a value, got a handler")]
    UnexpectedHandler { key: String },
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error(transparent)]
    Construct(#[from] ConstructError),
}

/// Errors surfaced while mounting or unmounting an app.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MountError {
    #[error("mount target `{0}` not found")]
    TargetNotFound(String),
    #[error("app is already mounted")]
    AlreadyMounted,
    #[error("app is not mounted")]
    NotMounted,
    #[error("failed to build the scene tree: {0}")]
    Build(#[from] NodeError),
}

/// Configuration errors of the bridge component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("app or root required as bridge prop")]
    MissingAppOrRoot,
}

/// Renderer failure during a single frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(String),
    #[error("GPU is out of memory")]
    OutOfMemory,
}
