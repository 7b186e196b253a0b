//! Embeds a child app inside a host app.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use uuid::Uuid;

use crate::app::{App, AppConfig};
use crate::components::Component;
use crate::context::AppContext;
use crate::element::Props;
use crate::error::{BridgeError, MountError};
use crate::minidom::Node;
use crate::surface::{MountTarget, Surface};

/// Hook run on a freshly resolved app before it is mounted.
pub type AppSetup = Box<dyn FnOnce(App) -> App + Send>;

#[derive(Default)]
pub struct BridgeProps {
    /// Existing app to mount. Takes precedence over `root`.
    pub app: Option<App>,
    pub root: Option<Arc<dyn Component>>,
    pub app_setup: Option<AppSetup>,
    /// Merged into the child app's root props.
    pub attrs: Props,
}

impl BridgeProps {
    pub fn with_app(app: App) -> Self {
        Self {
            app: Some(app),
            ..Self::default()
        }
    }

    pub fn with_root<C: Component + 'static>(root: C) -> Self {
        Self {
            root: Some(Arc::new(root)),
            ..Self::default()
        }
    }

    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(App) -> App + Send + 'static,
    {
        self.app_setup = Some(Box::new(setup));
        self
    }

    pub fn attrs(mut self, attrs: Props) -> Self {
        self.attrs.extend(attrs);
        self
    }
}

/// Owns a child app and the container surface it renders into. Dropping
/// the bridge unmounts the child.
pub struct Bridge {
    app: App,
    container: Surface,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("container", &self.container.id())
            .field("mounted", &self.app.is_mounted())
            .finish()
    }
}

impl Bridge {
    pub fn new(props: BridgeProps) -> Result<Self, BridgeError> {
        let BridgeProps {
            app,
            root,
            app_setup,
            attrs,
        } = props;
        let mut app = match (app, root) {
            (Some(app), _) => app,
            (None, Some(root)) => App::from_component(root, AppConfig::default()),
            (None, None) => return Err(BridgeError::MissingAppOrRoot),
        };
        if let Some(setup) = app_setup {
            app = setup(app);
        }
        app.merge_root_props(attrs);
        let container = Surface::new(format!("lunchbox-bridge-{}", Uuid::new_v4()), 300, 150);
        Ok(Self { app, container })
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    pub fn container(&self) -> &Surface {
        &self.container
    }

    /// Copies the host's provided values the child does not provide
    /// itself, then mounts the child into the container. Later provides
    /// on the host are not forwarded.
    pub fn mount(&mut self, host: &AppContext) -> Result<Node, MountError> {
        let copied = self.app.context().provides().extend_missing(host.provides());
        debug!(
            "bridge {} forwarded {copied} provided value(s)",
            self.container.id()
        );
        self.app.mount(MountTarget::Surface(self.container.clone()))
    }

    pub fn unmount(&mut self) -> Result<(), MountError> {
        self.app.unmount()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if self.app.is_mounted() {
            if let Err(err) = self.app.unmount() {
                warn!("failed to unmount bridged app: {err}");
            }
        }
    }
}
