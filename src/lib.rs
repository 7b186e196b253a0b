//! Lunchbox: a custom renderer that lets a declarative component tree drive
//! a retained 3D scene graph.
//!
//! An [`App`] binds a root component to a set of node operations, a render
//! loop and a per-app globals record. Mounting builds the tree under a root
//! node bound to an output [`Surface`]; every frame runs the registered
//! callbacks around a [`SceneRenderer`]. Window integration lives in the
//! `lunchbox-viewer` binary so the library stays usable headless.

pub mod app;
pub mod bridge;
pub mod callbacks;
pub mod components;
pub mod context;
pub mod element;
pub mod error;
pub mod extend;
pub mod globals;
pub mod graph;
pub mod interactables;
pub mod minidom;
pub mod node_ops;
pub mod reconciler;
pub mod render;
pub mod render_loop;
pub mod surface;

pub use app::{App, AppConfig};
pub use bridge::{Bridge, BridgeProps};
pub use callbacks::{CallbackRegistry, UpdateCallback, UpdateContext};
pub use components::{Component, ComponentRegistry, AUTO_GENERATED_COMPONENTS};
pub use context::{keys, AppContext, InjectionKey, Provides};
pub use element::{Element, ElementKind, PropValue, Props};
pub use error::{BridgeError, ConstructError, MountError, NodeError, PropertyError, RenderError};
pub use extend::ClassRegistry;
pub use globals::{AppGlobals, Globals, GlobalsUpdate, WatchStopHandle};
pub use graph::{Category, ClassDescriptor, ObjectHandle, SceneObject, Value};
pub use interactables::{EventHandler, InteractionEvent, Interactables};
pub use minidom::{MetaType, Node};
pub use node_ops::{NodeOps, SceneNodeOps};
pub use reconciler::{Reconciler, VNode};
pub use render::{renderer_handle, HeadlessRenderer, RendererHandle, SceneRenderer};
pub use render_loop::{FrameReport, LoopState, RenderLoop};
pub use surface::{MountTarget, Surface, SurfaceRegistry};
